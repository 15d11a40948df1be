//! Native-endian sample field access (`spec.md` §9 "Endianness of in-memory
//! samples"): the caller's chunk and model buffers hold fields packed
//! back-to-back in host byte order; only the wire entity is canonical
//! big-endian. [`BitWriter::put_bits`]/[`BitReader::get_bits`] already encode
//! MSB-first, so converting a field to/from a host-native `u32` here is the
//! only endian-sensitive step the codec needs.

use smallvec::SmallVec;

use crate::data_model::FieldName;

/// Read one field's raw value out of a native-endian packed sample.
fn read_field(bytes: &[u8], bits: u8) -> u32 {
    match bits {
        8 => u32::from(bytes[0]),
        16 => u32::from(u16::from_ne_bytes([bytes[0], bytes[1]])),
        32 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        other => unreachable!("unsupported field width {other}"),
    }
}

/// Write one field's raw value into a native-endian packed sample.
fn write_field(bytes: &mut [u8], bits: u8, value: u32) {
    match bits {
        8 => bytes[0] = value as u8,
        16 => bytes[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
        32 => bytes[..4].copy_from_slice(&value.to_ne_bytes()),
        other => unreachable!("unsupported field width {other}"),
    }
}

/// Read every field of one sample, in layout order, from a native-endian
/// packed byte slice exactly `sample_byte_len` long.
pub fn read_sample(bytes: &[u8], fields: &[FieldName]) -> SmallVec<[u32; 6]> {
    let mut values = SmallVec::new();
    let mut offset = 0usize;
    for field in fields {
        let bits = field.max_bits();
        let width = usize::from(bits) / 8;
        values.push(read_field(&bytes[offset..offset + width], bits));
        offset += width;
    }
    values
}

/// Inverse of [`read_sample`]: pack field values back into native-endian bytes.
pub fn write_sample(bytes: &mut [u8], fields: &[FieldName], values: &[u32]) {
    let mut offset = 0usize;
    for (field, &value) in fields.iter().zip(values) {
        let bits = field.max_bits();
        let width = usize::from(bits) / 8;
        write_field(&mut bytes[offset..offset + width], bits, value);
        offset += width;
    }
}

/// Read a bare imagette pixel (a native-endian 16-bit value).
pub fn read_imagette_pixel(bytes: &[u8]) -> u32 {
    u32::from(u16::from_ne_bytes([bytes[0], bytes[1]]))
}

/// Inverse of [`read_imagette_pixel`].
pub fn write_imagette_pixel(bytes: &mut [u8], value: u32) {
    bytes[..2].copy_from_slice(&(value as u16).to_ne_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::Subservice;

    #[test]
    fn sample_fields_round_trip() {
        let subservice = Subservice::SFxEfxNcobEcob;
        let fields = subservice.fields();
        let original = [0xAAu32, 0x1234_5678, 0x0BAD_F00D, 1, 2];
        let mut bytes = vec![0u8; subservice.sample_byte_len()];
        write_sample(&mut bytes, &fields, &original);
        let decoded = read_sample(&bytes, &fields);
        assert_eq!(&decoded[..], &original[..]);
    }

    #[test]
    fn imagette_pixel_round_trips() {
        let mut bytes = [0u8; 2];
        write_imagette_pixel(&mut bytes, 0xBEEF);
        assert_eq!(read_imagette_pixel(&bytes), 0xBEEF);
    }
}
