//! Collection header framing and per-sample iteration (`spec.md` §3, §4.5).
//!
//! A collection is `{ header, sample[0..N-1] }`. The 12-byte header is
//! bit-packed (not byte-aligned field by field): 48-bit timestamp, 16-bit
//! configuration id, a 1-bit packet-type flag, the 6-bit subservice tag,
//! a 4-bit CCD id, a 5-bit sequence number, and a 16-bit data length in
//! bytes — 48+16+1+6+4+5+16 = 96 bits exactly.

use crate::bitio::{BitReader, BitWriter};
use crate::data_model::Subservice;
use crate::error::{Error, Result};

/// Size in bytes of a collection header, fixed by `spec.md` §3.
pub const COLLECTION_HEADER_SIZE: usize = 12;

/// The fixed 12-byte collection header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionHeader {
    /// 48-bit timestamp (seconds:32 high bits, sub-seconds:16 low bits; see
    /// [`crate::entity::cmp_ent_create_timestamp`]).
    pub timestamp: u64,
    pub config_id: u16,
    pub packet_type: bool,
    pub subservice: Subservice,
    pub ccd_id: u8,
    pub sequence_number: u8,
    /// Data length in bytes; `spec.md` §3 invariant:
    /// `data_length == sample_count * sample_byte_len(subservice)` and
    /// `data_length <= 65535`.
    pub data_length: u16,
}

impl CollectionHeader {
    pub fn write(&self, writer: &mut BitWriter<'_>) {
        debug_assert!(self.timestamp < (1u64 << 48));
        writer.put_bits((self.timestamp >> 16) as u32, 32);
        writer.put_bits((self.timestamp & 0xFFFF) as u32, 16);
        writer.put_bits(u32::from(self.config_id), 16);
        writer.put_bits(u32::from(self.packet_type), 1);
        writer.put_bits(u32::from(self.subservice.code()), 6);
        writer.put_bits(u32::from(self.ccd_id), 4);
        writer.put_bits(u32::from(self.sequence_number), 5);
        writer.put_bits(u32::from(self.data_length), 16);
    }

    pub fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let high = u64::from(reader.get_bits(32)?);
        let low = u64::from(reader.get_bits(16)?);
        let timestamp = (high << 16) | low;
        let config_id = reader.get_bits(16)? as u16;
        let packet_type = reader.get_bit()?;
        let subservice = Subservice::from_code(reader.get_bits(6)? as u8)?;
        let ccd_id = reader.get_bits(4)? as u8;
        let sequence_number = reader.get_bits(5)? as u8;
        let data_length = reader.get_bits(16)? as u16;

        let header = Self { timestamp, config_id, packet_type, subservice, ccd_id, sequence_number, data_length };
        header.validate()?;
        Ok(header)
    }

    /// Number of samples implied by `data_length` and the subservice's
    /// sample layout.
    pub fn sample_count(&self) -> Result<usize> {
        let sample_len = self.subservice.sample_byte_len();
        if sample_len == 0 || usize::from(self.data_length) % sample_len != 0 {
            return Err(Error::EntityHeader("collection data_length is not a multiple of the sample size"));
        }
        Ok(usize::from(self.data_length) / sample_len)
    }

    fn validate(&self) -> Result<()> {
        let expected_len = self.subservice.sample_byte_len() * self.sample_count()?;
        if expected_len != usize::from(self.data_length) {
            return Err(Error::EntityHeader("collection data_length does not match subservice sample layout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> CollectionHeader {
        CollectionHeader {
            timestamp: 0x0001_0203_0405,
            config_id: 0xBEEF,
            packet_type: true,
            subservice: Subservice::SFxEfxNcobEcob,
            ccd_id: 9,
            sequence_number: 17,
            data_length: (Subservice::SFxEfxNcobEcob.sample_byte_len() * 3) as u16,
        }
    }

    #[test]
    fn header_round_trips_through_the_wire_format() {
        let header = sample_header();
        let mut buffer = [0u8; COLLECTION_HEADER_SIZE];
        {
            let mut writer = BitWriter::new(&mut buffer);
            header.write(&mut writer);
            assert_eq!(writer.flush().unwrap(), COLLECTION_HEADER_SIZE);
        }

        let mut reader = BitReader::new(&buffer);
        let decoded = CollectionHeader::read(&mut reader).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.sample_count().unwrap(), 3);
    }

    #[test]
    fn mismatched_data_length_is_rejected() {
        let mut header = sample_header();
        header.data_length += 1;
        let mut buffer = [0u8; COLLECTION_HEADER_SIZE];
        let mut writer = BitWriter::new(&mut buffer);
        header.write(&mut writer);
        writer.flush().unwrap();

        let mut reader = BitReader::new(&buffer);
        assert!(CollectionHeader::read(&mut reader).is_err());
    }
}
