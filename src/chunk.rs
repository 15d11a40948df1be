//! Chunk codec: per-collection dispatch, worst-case fallback, and the
//! top-level `compress_chunk` / `decompress_cmp_entity` entry points
//! (`spec.md` §4.5, §6).
//!
//! Layout of a non-raw chunk body is a repeated
//! `{ compressed_collection_length:16, collection_header:12, collection_body }`.
//! Raw-mode chunks omit the length prefix entirely and carry a verbatim,
//! big-endian re-serialization of the input (`spec.md` §4.5, §9 endianness
//! note).

use smallvec::SmallVec;

use crate::bitio::{BitReader, BitWriter};
use crate::codec::GolombParams;
use crate::collection::{CollectionHeader, COLLECTION_HEADER_SIZE};
use crate::data_model::{Cadence, CmpMode, CmpParams, FieldName, Subservice};
use crate::entity::{
    cmp_ent_create_timestamp, imagette_param_pair, non_imagette_param_pair, DataType,
    EntityHeader, ImagetteParamPair, NonImagetteParamPair, ParamBlock, TimestampSource,
    GENERIC_HEADER_SIZE, NON_IMAGETTE_HEADER_SIZE,
};
use crate::error::{Error, Result};
use crate::model;
use crate::sample;

/// Format version stamped into every entity header this crate produces.
pub const VERSION_ID: u32 = 1;

/// Conservative compressed-size upper bound (`spec.md` §4.5): the proved
/// worst case after every collection has fallen back to raw. Uses
/// `NON_IMAGETTE_HEADER_SIZE`, the largest header any non-raw entity can
/// write, since `compress_chunk` picks the header shape from the chunk's
/// family and must fit it before any body byte is written.
pub fn compress_chunk_bound(uncompressed_chunk_bytes: usize, collection_count: usize) -> usize {
    NON_IMAGETTE_HEADER_SIZE + collection_count * 2 + uncompressed_chunk_bytes
}

struct ParsedCollection {
    header: CollectionHeader,
    data_offset: usize,
}

fn parse_collections(chunk: &[u8]) -> Result<Vec<ParsedCollection>> {
    let mut collections = Vec::new();
    let mut offset = 0usize;
    while offset < chunk.len() {
        if offset + COLLECTION_HEADER_SIZE > chunk.len() {
            return Err(Error::EntityHeader("chunk ends mid collection header"));
        }
        let mut reader = BitReader::new(&chunk[offset..offset + COLLECTION_HEADER_SIZE]);
        let header = CollectionHeader::read(&mut reader)?;
        if header.subservice.is_fast_flux() {
            return Err(Error::ColSubserviceUnsupported { subservice: header.subservice.code() });
        }
        let data_offset = offset + COLLECTION_HEADER_SIZE;
        let data_len = usize::from(header.data_length);
        if data_offset + data_len > chunk.len() {
            return Err(Error::EntityHeader("collection data_length overruns the chunk"));
        }
        collections.push(ParsedCollection { header, data_offset });
        offset = data_offset + data_len;
    }
    Ok(collections)
}

/// Which parameter-block family a chunk's non-raw collections belong to.
enum Family {
    Imagette,
    NonImagette(Cadence),
}

fn chunk_family(collections: &[ParsedCollection]) -> Result<Family> {
    let mut family: Option<Family> = None;
    for collection in collections {
        let this = if collection.header.subservice == Subservice::Imagette {
            Family::Imagette
        } else {
            let cadence = collection.header.subservice.cadence()
                .ok_or(Error::Generic("non-imagette subservice has no cadence"))?;
            Family::NonImagette(cadence)
        };
        match (&family, &this) {
            (None, _) => family = Some(this),
            (Some(Family::Imagette), Family::Imagette) => {}
            (Some(Family::NonImagette(a)), Family::NonImagette(b)) if cadences_eq(*a, *b) => {}
            _ => return Err(Error::Generic("chunk mixes incompatible subservice families or cadences")),
        }
    }
    family.ok_or(Error::ChunkNull)
}

fn cadences_eq(a: Cadence, b: Cadence) -> bool {
    matches!((a, b), (Cadence::Short, Cadence::Short) | (Cadence::Fast, Cadence::Fast) | (Cadence::Long, Cadence::Long))
}

const NON_IMAGETTE_FIELDS: [FieldName; 6] = [
    FieldName::ExpFlags, FieldName::Fx, FieldName::Efx, FieldName::Ncob, FieldName::Ecob, FieldName::Variance,
];

fn build_non_imagette_params(params: &CmpParams, cadence: Cadence) -> Result<[NonImagetteParamPair; 6]> {
    let mut pairs = [NonImagetteParamPair { spill: 0, cmp_par: 0 }; 6];
    for (slot, field) in pairs.iter_mut().zip(NON_IMAGETTE_FIELDS) {
        *slot = non_imagette_param_pair(&params.field_golomb(field, cadence))?;
    }
    Ok(pairs)
}

/// Top-level compression entry point (`spec.md` §6 `compress_chunk`).
///
/// `model`/`updated_model` must be `Some` (and the same length as `chunk`)
/// iff `params.cmp_mode` is a model mode; `updated_model` may alias `model`.
pub fn compress_chunk(
    chunk: &[u8],
    model: Option<&[u8]>,
    updated_model: Option<&mut [u8]>,
    dst: &mut [u8],
    params: &CmpParams,
    start_timestamp: u64,
    end_timestamp: u64,
) -> Result<usize> {
    params.validate()?;
    if chunk.is_empty() {
        return Err(Error::ChunkNull);
    }

    let collections = parse_collections(chunk)?;

    if params.cmp_mode.is_raw() {
        return encode_raw_chunk(&collections, chunk, dst, start_timestamp, end_timestamp);
    }

    let model_needed = params.cmp_mode.is_model();
    if model_needed && (model.is_none() || updated_model.is_none()) {
        return Err(Error::Generic("model buffer is required in a model cmp_mode"));
    }

    let family = chunk_family(&collections)?;

    let mut updated_model = updated_model;
    if let (Some(model), Some(updated)) = (model, updated_model.as_deref_mut()) {
        if updated.as_ptr() != model.as_ptr() {
            updated.copy_from_slice(model);
        }
    }

    let params_block = match family {
        Family::Imagette => ParamBlock::Imagette { ima: imagette_param_pair(&params.imagette_golomb())? },
        Family::NonImagette(cadence) => {
            ParamBlock::NonImagette { fields: build_non_imagette_params(params, cadence)? }
        }
    };

    let data_type = match params_block {
        ParamBlock::Imagette { .. } => DataType::Imagette,
        ParamBlock::ImagetteAdaptive { .. } => DataType::ImagetteAdaptive,
        ParamBlock::NonImagette { .. } => DataType::NonImagette,
    };

    let mut header = EntityHeader {
        version_id: VERSION_ID,
        size: 0,
        original_size: chunk.len() as u32,
        start_timestamp,
        end_timestamp,
        data_type,
        raw: false,
        cmp_mode: params.cmp_mode,
        model_value: params.model_value,
        model_id: 0,
        model_counter: 0,
        lossy_par: params.lossy_par,
        params: Some(params_block),
    };

    let header_size = header.header_size();
    if dst.len() < header_size {
        return Err(Error::SmallBuffer { needed: header_size as u32, available: dst.len() as u32 });
    }

    let mut compressed_count = 0u32;
    let body_bytes = {
        let mut writer = BitWriter::new(&mut dst[header_size..]);
        for collection in &collections {
            let raw_sample_bytes = &chunk[collection.data_offset..collection.data_offset + usize::from(collection.header.data_length)];
            let model_bytes = updated_model.as_deref_mut().map(|m| &mut m[collection.data_offset..collection.data_offset + usize::from(collection.header.data_length)]);

            let used_compression = encode_collection(
                &mut writer,
                &collection.header,
                raw_sample_bytes,
                model_bytes,
                params,
            )?;
            if used_compression {
                compressed_count += 1;
            }
        }
        writer.flush()?
    };

    header.model_counter = (compressed_count % 256) as u8;
    header.size = (header_size + body_bytes) as u32;
    header.write(dst)?;

    Ok(header_size + body_bytes)
}

/// Encode one collection's framing + body into `writer`, applying the
/// worst-case fallback to raw (`spec.md` §4.4). Returns whether the
/// compressed form (not the raw fallback) was used.
fn encode_collection(
    writer: &mut BitWriter<'_>,
    header: &CollectionHeader,
    raw_sample_bytes: &[u8],
    model_bytes: Option<&mut [u8]>,
    params: &CmpParams,
) -> Result<bool> {
    let length_prefix_bit_pos = writer.position_bits();
    writer.put_bits(0, 16); // reserved, patched below
    header.write(writer);

    let body_start_byte = writer.byte_position();
    let body_start_bit_pos = writer.position_bits();

    let model_snapshot: Option<Vec<u8>> = model_bytes.as_deref().map(|m| m.to_vec());

    let used_compression = if header.subservice == Subservice::Imagette {
        encode_imagette_collection(writer, header, raw_sample_bytes, model_bytes.as_deref_mut(), params)?
    } else {
        encode_field_collection(writer, header, raw_sample_bytes, model_bytes.as_deref_mut(), params)?
    };

    writer.align_to_byte();
    let compressed_byte_len = writer.byte_position() - body_start_byte;

    let final_used_compression = if compressed_byte_len < raw_sample_bytes.len() {
        used_compression
    } else {
        writer.seek_to(body_start_bit_pos);
        if let (Some(model_bytes), Some(snapshot)) = (model_bytes, model_snapshot) {
            model_bytes.copy_from_slice(&snapshot);
        }
        write_raw_fallback(writer, header, raw_sample_bytes);
        writer.align_to_byte();
        false
    };

    let final_byte_len = writer.byte_position() - body_start_byte;
    writer.patch_u16_be(length_prefix_bit_pos / 8, final_byte_len as u16);

    Ok(final_used_compression)
}

fn write_raw_fallback(writer: &mut BitWriter<'_>, header: &CollectionHeader, raw_sample_bytes: &[u8]) {
    if header.subservice == Subservice::Imagette {
        for chunk in raw_sample_bytes.chunks_exact(2) {
            writer.put_bits(sample::read_imagette_pixel(chunk), 16);
        }
    } else {
        let fields = header.subservice.fields();
        let sample_len = header.subservice.sample_byte_len();
        for sample_bytes in raw_sample_bytes.chunks_exact(sample_len) {
            for (field, value) in fields.iter().zip(sample::read_sample(sample_bytes, &fields)) {
                writer.put_bits(value, u32::from(field.max_bits()));
            }
        }
    }
}

fn encode_imagette_collection(
    writer: &mut BitWriter<'_>,
    _header: &CollectionHeader,
    raw_sample_bytes: &[u8],
    model_bytes: Option<&mut [u8]>,
    params: &CmpParams,
) -> Result<bool> {
    let golomb = params.imagette_golomb();
    let mut model_bytes = model_bytes;
    let mut previous = 0u32;
    for (i, chunk) in raw_sample_bytes.chunks_exact(2).enumerate() {
        let current = model::lossy_round_down(sample::read_imagette_pixel(chunk), params.lossy_par);
        let (residue, model_sample) = compute_residue(params, current, previous, &mut model_bytes, i, 2, 16);
        golomb.encode(residue, writer);
        previous = current;
        let _ = model_sample;
    }
    Ok(true)
}

fn encode_field_collection(
    writer: &mut BitWriter<'_>,
    header: &CollectionHeader,
    raw_sample_bytes: &[u8],
    mut model_bytes: Option<&mut [u8]>,
    params: &CmpParams,
) -> Result<bool> {
    let subservice = header.subservice;
    let cadence = subservice.cadence().ok_or(Error::Generic("field collection has no cadence"))?;
    let fields = subservice.fields();
    let sample_len = subservice.sample_byte_len();

    let golombs: SmallVec<[GolombParams; 6]> = fields.iter().map(|&f| params.field_golomb(f, cadence)).collect();
    let mut previous: SmallVec<[u32; 6]> = fields.iter().map(|_| 0u32).collect();

    for (i, sample_bytes) in raw_sample_bytes.chunks_exact(sample_len).enumerate() {
        let values = sample::read_sample(sample_bytes, &fields);
        for f in 0..fields.len() {
            let field = fields[f];
            let current = model::lossy_round_down(values[f], params.lossy_par);
            let field_offset = i * sample_len + field_byte_offset(&fields, f);
            let (residue, _model_sample) = compute_residue(
                params, current, previous[f], &mut model_bytes, field_offset,
                usize::from(field.max_bits()) / 8, field.max_bits(),
            );
            golombs[f].encode(residue, writer);
            previous[f] = current;
        }
    }
    Ok(true)
}

fn field_byte_offset(fields: &[FieldName], index: usize) -> usize {
    fields[..index].iter().map(|f| usize::from(f.max_bits()) / 8).sum()
}

/// Compute the residue to encode and, in model modes, update the model
/// buffer in place (`spec.md` §4.4).
fn compute_residue(
    params: &CmpParams,
    current: u32,
    previous: u32,
    model_bytes: &mut Option<&mut [u8]>,
    byte_offset: usize,
    width_bytes: usize,
    bits: u8,
) -> (u32, u32) {
    match params.cmp_mode {
        CmpMode::DiffZero | CmpMode::DiffMulti => (model::diff_encode(current, previous, bits), 0),
        CmpMode::ModelZero | CmpMode::ModelMulti => {
            let bytes = model_bytes.as_deref_mut().expect("model buffer validated present");
            let field_bytes = &mut bytes[byte_offset..byte_offset + width_bytes];
            let model_sample = read_width(field_bytes, bits);
            let residue = model::model_encode(current, model_sample, bits);
            let updated = model::update_model(current, model_sample, params.model_value, bits);
            write_width(field_bytes, bits, updated);
            (residue, model_sample)
        }
        CmpMode::Raw => unreachable!("raw chunks never reach the per-field encoder"),
    }
}

fn read_width(bytes: &[u8], bits: u8) -> u32 {
    match bits {
        8 => u32::from(bytes[0]),
        16 => u32::from(u16::from_ne_bytes([bytes[0], bytes[1]])),
        32 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        other => unreachable!("unsupported field width {other}"),
    }
}

fn write_width(bytes: &mut [u8], bits: u8, value: u32) {
    match bits {
        8 => bytes[0] = value as u8,
        16 => bytes[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
        32 => bytes[..4].copy_from_slice(&value.to_ne_bytes()),
        other => unreachable!("unsupported field width {other}"),
    }
}

fn encode_raw_chunk(
    collections: &[ParsedCollection],
    chunk: &[u8],
    dst: &mut [u8],
    start_timestamp: u64,
    end_timestamp: u64,
) -> Result<usize> {
    if dst.len() < GENERIC_HEADER_SIZE {
        return Err(Error::SmallBuffer { needed: GENERIC_HEADER_SIZE as u32, available: dst.len() as u32 });
    }

    let body_bytes = {
        let mut writer = BitWriter::new(&mut dst[GENERIC_HEADER_SIZE..]);
        for collection in collections {
            collection.header.write(&mut writer);
            let raw = &chunk[collection.data_offset..collection.data_offset + usize::from(collection.header.data_length)];
            write_raw_fallback(&mut writer, &collection.header, raw);
        }
        writer.flush()?
    };

    let header = EntityHeader {
        version_id: VERSION_ID,
        size: (GENERIC_HEADER_SIZE + body_bytes) as u32,
        original_size: chunk.len() as u32,
        start_timestamp,
        end_timestamp,
        data_type: DataType::NonImagette,
        raw: true,
        cmp_mode: CmpMode::Raw,
        model_value: 0,
        model_id: 0,
        model_counter: 0,
        lossy_par: 0,
        params: None,
    };
    header.write(dst)?;

    Ok(GENERIC_HEADER_SIZE + body_bytes)
}

/// Convenience wrapper that stamps `start_timestamp`/`end_timestamp` from an
/// injected clock, per `spec.md` §1 "the telemetry timestamp source is an
/// injected clock".
pub fn compress_chunk_with_clock(
    chunk: &[u8],
    model: Option<&[u8]>,
    updated_model: Option<&mut [u8]>,
    dst: &mut [u8],
    params: &CmpParams,
    clock: &dyn TimestampSource,
) -> Result<usize> {
    let (unix_seconds, fraction) = clock.now();
    let timestamp = cmp_ent_create_timestamp(unix_seconds, fraction);
    compress_chunk(chunk, model, updated_model, dst, params, timestamp, timestamp)
}

/// Top-level decompression entry point (`spec.md` §6 `decompress_cmp_entity`).
///
/// Passing `dst = None` returns the required size without writing.
pub fn decompress_cmp_entity(
    entity: &[u8],
    model: Option<&[u8]>,
    updated_model: Option<&mut [u8]>,
    dst: Option<&mut [u8]>,
) -> Result<usize> {
    let header = EntityHeader::read(entity)?;
    let original_size = header.original_size as usize;

    let dst = match dst {
        None => return Ok(original_size),
        Some(dst) => dst,
    };
    if dst.len() < original_size {
        return Err(Error::SmallBuffer { needed: original_size as u32, available: dst.len() as u32 });
    }

    if header.raw {
        return decode_raw_chunk(&header, entity, dst);
    }

    let model_needed = header.cmp_mode.is_model();
    if model_needed && (model.is_none() || updated_model.is_none()) {
        return Err(Error::Generic("model buffer is required to decode a model-mode entity"));
    }

    let mut updated_model = updated_model;
    if let (Some(model), Some(updated)) = (model, updated_model.as_deref_mut()) {
        if updated.as_ptr() != model.as_ptr() {
            updated.copy_from_slice(model);
        }
    }

    let header_size = header.header_size();
    let mut reader = BitReader::new(&entity[header_size..]);
    let mut dst_offset = 0usize;

    while dst_offset < original_size {
        let compressed_len = reader.get_bits(16)? as usize;
        let collection_header = CollectionHeader::read(&mut reader)?;
        let data_len = usize::from(collection_header.data_length);

        collection_header.write(&mut BitWriter::new(&mut dst[dst_offset..dst_offset + COLLECTION_HEADER_SIZE]));
        let sample_region = &mut dst[dst_offset + COLLECTION_HEADER_SIZE..dst_offset + COLLECTION_HEADER_SIZE + data_len];
        let model_region = updated_model.as_deref_mut().map(|m| &mut m[dst_offset + COLLECTION_HEADER_SIZE..dst_offset + COLLECTION_HEADER_SIZE + data_len]);

        // A compressed body's byte length is always strictly smaller than
        // the collection's raw sample bytes (`encode_collection`'s fallback
        // condition); equal length is the decoder's signal that this
        // collection took the raw-within-chunk path.
        if compressed_len >= data_len {
            decode_raw_collection_body(&mut reader, &collection_header, sample_region)?;
        } else {
            decode_collection_body(&mut reader, &collection_header, sample_region, model_region, header.cmp_mode, header.model_value, header.lossy_par, &header.params)?;
        }
        reader.align_to_byte();

        dst_offset += COLLECTION_HEADER_SIZE + data_len;
    }

    Ok(original_size)
}

fn decode_raw_collection_body(reader: &mut BitReader<'_>, header: &CollectionHeader, sample_region: &mut [u8]) -> Result<()> {
    if header.subservice == Subservice::Imagette {
        for pixel_bytes in sample_region.chunks_exact_mut(2) {
            let value = reader.get_bits(16)?;
            sample::write_imagette_pixel(pixel_bytes, value);
        }
    } else {
        let fields = header.subservice.fields();
        let sample_len = header.subservice.sample_byte_len();
        for sample_bytes in sample_region.chunks_exact_mut(sample_len) {
            let mut values: SmallVec<[u32; 6]> = SmallVec::new();
            for field in &fields {
                values.push(reader.get_bits(u32::from(field.max_bits()))?);
            }
            sample::write_sample(sample_bytes, &fields, &values);
        }
    }
    Ok(())
}

fn decode_raw_chunk(header: &EntityHeader, entity: &[u8], dst: &mut [u8]) -> Result<usize> {
    let mut reader = BitReader::new(&entity[GENERIC_HEADER_SIZE..]);
    let mut offset = 0usize;
    while offset < dst.len() {
        let collection_header = CollectionHeader::read(&mut reader)?;
        collection_header.write(&mut BitWriter::new(&mut dst[offset..offset + COLLECTION_HEADER_SIZE]));
        let data_len = usize::from(collection_header.data_length);
        let sample_region = &mut dst[offset + COLLECTION_HEADER_SIZE..offset + COLLECTION_HEADER_SIZE + data_len];
        decode_raw_collection_body(&mut reader, &collection_header, sample_region)?;
        offset += COLLECTION_HEADER_SIZE + data_len;
    }
    let _ = header;
    Ok(dst.len())
}

#[allow(clippy::too_many_arguments)]
fn decode_collection_body(
    reader: &mut BitReader<'_>,
    header: &CollectionHeader,
    sample_region: &mut [u8],
    mut model_bytes: Option<&mut [u8]>,
    cmp_mode: CmpMode,
    model_value: u8,
    lossy_par: u8,
    params_block: &Option<ParamBlock>,
) -> Result<()> {
    if header.subservice == Subservice::Imagette {
        let golomb = imagette_golomb_from_params(params_block)?;
        let mut previous = 0u32;
        for pixel_bytes in sample_region.chunks_exact_mut(2) {
            let (current, _) = decode_residue(reader, &golomb, previous, &mut model_bytes, 0, 2, 16, cmp_mode, model_value)?;
            let restored = model::lossy_round_up(current, lossy_par, 16);
            sample::write_imagette_pixel(pixel_bytes, restored);
            previous = current;
        }
        return Ok(());
    }

    let subservice = header.subservice;
    let cadence = subservice.cadence().ok_or(Error::Generic("field collection has no cadence"))?;
    let fields = subservice.fields();
    let sample_len = subservice.sample_byte_len();
    let golombs = non_imagette_golombs_from_params(params_block, &fields, cadence, cmp_mode)?;
    let mut previous: SmallVec<[u32; 6]> = fields.iter().map(|_| 0u32).collect();

    for (i, sample_bytes) in sample_region.chunks_exact_mut(sample_len).enumerate() {
        let mut values: SmallVec<[u32; 6]> = SmallVec::new();
        for (f, (field, golomb)) in fields.iter().zip(golombs.iter()).enumerate() {
            let field_offset = i * sample_len + field_byte_offset(&fields, f);
            let (current, _) = decode_residue(reader, golomb, previous[f], &mut model_bytes, field_offset, field.max_bits() as usize / 8, field.max_bits(), cmp_mode, model_value)?;
            let restored = model::lossy_round_up(current, lossy_par, field.max_bits());
            values.push(restored);
            previous[f] = current;
        }
        sample::write_sample(sample_bytes, &fields, &values);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn decode_residue(
    reader: &mut BitReader<'_>,
    golomb: &GolombParams,
    previous: u32,
    model_bytes: &mut Option<&mut [u8]>,
    byte_offset: usize,
    width_bytes: usize,
    bits: u8,
    cmp_mode: CmpMode,
    model_value: u8,
) -> Result<(u32, u32)> {
    let residue = golomb.decode(reader)?;
    match cmp_mode {
        CmpMode::DiffZero | CmpMode::DiffMulti => Ok((model::diff_decode(residue, previous, bits), 0)),
        CmpMode::ModelZero | CmpMode::ModelMulti => {
            let bytes = model_bytes.as_deref_mut().expect("model buffer validated present");
            let field_bytes = &mut bytes[byte_offset..byte_offset + width_bytes];
            let model_sample = read_width(field_bytes, bits);
            let current = model::model_decode(residue, model_sample, bits);
            let updated = model::update_model(current, model_sample, model_value, bits);
            write_width(field_bytes, bits, updated);
            Ok((current, model_sample))
        }
        CmpMode::Raw => unreachable!("raw entities never reach the per-field decoder"),
    }
}

fn imagette_golomb_from_params(params_block: &Option<ParamBlock>) -> Result<GolombParams> {
    match params_block {
        Some(ParamBlock::Imagette { ima }) | Some(ParamBlock::ImagetteAdaptive { ima, .. }) => {
            Ok(golomb_from_imagette_pair(ima))
        }
        _ => Err(Error::EntityHeader("expected an imagette parameter block")),
    }
}

fn golomb_from_imagette_pair(pair: &ImagetteParamPair) -> GolombParams {
    GolombParams { m: u32::from(pair.golomb), spill: pair.spill, max_data_bits: 16, multi_bits: None }
}

fn non_imagette_golombs_from_params(
    params_block: &Option<ParamBlock>,
    fields: &[FieldName],
    _cadence: Cadence,
    cmp_mode: CmpMode,
) -> Result<SmallVec<[GolombParams; 6]>> {
    let pairs = match params_block {
        Some(ParamBlock::NonImagette { fields: pairs }) => pairs,
        _ => return Err(Error::EntityHeader("expected a non-imagette parameter block")),
    };

    let mut result = SmallVec::new();
    for &field in fields {
        let slot = NON_IMAGETTE_FIELDS.iter().position(|&f| f == field)
            .ok_or(Error::EntityHeader("unrecognized field in layout"))?;
        let pair = pairs[slot];
        let max_data_bits = field.max_bits();
        result.push(GolombParams {
            m: u32::from(pair.cmp_par),
            spill: pair.spill,
            max_data_bits,
            multi_bits: if cmp_mode.is_multi() { Some(crate::data_model::multi_bits_for(max_data_bits)) } else { None },
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::CmpMode;
    use crate::entity::ConstantClock;

    fn params_for(cmp_mode: CmpMode) -> CmpParams {
        CmpParams {
            cmp_mode,
            model_value: 4,
            lossy_par: 0,
            nc_imagette: 4, saturated_imagette: 4,
            s_exp_flags: 2, s_fx: 8, s_efx: 8, s_ncob: 8, s_ecob: 8, s_variance: 8,
            l_exp_flags: 2, l_fx: 8, l_efx: 8, l_ncob: 8, l_ecob: 8, l_variance: 8,
        }
    }

    fn build_sfx_chunk(samples: &[(u8, u32)]) -> Vec<u8> {
        let subservice = Subservice::SFx;
        let sample_len = subservice.sample_byte_len();
        let mut bytes = vec![0u8; COLLECTION_HEADER_SIZE + sample_len * samples.len()];
        let header = CollectionHeader {
            timestamp: 0,
            config_id: 1,
            packet_type: false,
            subservice,
            ccd_id: 0,
            sequence_number: 0,
            data_length: (sample_len * samples.len()) as u16,
        };
        let mut writer = BitWriter::new(&mut bytes[..COLLECTION_HEADER_SIZE]);
        header.write(&mut writer);
        writer.flush().unwrap();

        for (i, &(exp_flags, fx)) in samples.iter().enumerate() {
            let offset = COLLECTION_HEADER_SIZE + i * sample_len;
            bytes[offset] = exp_flags;
            bytes[offset + 1..offset + 5].copy_from_slice(&fx.to_ne_bytes());
        }
        bytes
    }

    #[test]
    fn raw_mode_round_trips() {
        let chunk = build_sfx_chunk(&[(0x00, 0x0000_0000), (0xF0, 0xABCD_E0FF)]);
        let params = params_for(CmpMode::Raw);
        let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
        let clock = ConstantClock { unix_seconds: 1_577_836_800, subsecond_fraction: 0 };
        let written = compress_chunk_with_clock(&chunk, None, None, &mut dst, &params, &clock).unwrap();
        dst.truncate(written);

        let mut decoded = vec![0u8; chunk.len()];
        let decoded_size = decompress_cmp_entity(&dst, None, None, Some(&mut decoded)).unwrap();
        assert_eq!(decoded_size, chunk.len());
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn diff_zero_mode_round_trips() {
        let chunk = build_sfx_chunk(&[(0, 0), (1, 1), (2, 5), (1, 3)]);
        let params = params_for(CmpMode::DiffZero);
        let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
        let written = compress_chunk(&chunk, None, None, &mut dst, &params, 0, 0).unwrap();
        dst.truncate(written);

        let mut decoded = vec![0u8; chunk.len()];
        let decoded_size = decompress_cmp_entity(&dst, None, None, Some(&mut decoded)).unwrap();
        assert_eq!(decoded_size, chunk.len());
        assert_eq!(decoded, chunk);
    }

    #[test]
    fn model_zero_mode_keeps_models_in_sync() {
        let chunk = build_sfx_chunk(&[(0, 100), (0, 105), (0, 80)]);
        let params = params_for(CmpMode::ModelZero);
        let mut model = vec![0u8; chunk.len()];
        let mut updated_model_enc = model.clone();
        let mut dst = vec![0u8; compress_chunk_bound(chunk.len(), 1)];
        let written = compress_chunk(&chunk, Some(&model), Some(&mut updated_model_enc), &mut dst, &params, 0, 0).unwrap();
        dst.truncate(written);

        let mut decoded = vec![0u8; chunk.len()];
        let mut updated_model_dec = model.clone();
        decompress_cmp_entity(&dst, Some(&model), Some(&mut updated_model_dec), Some(&mut decoded)).unwrap();

        assert_eq!(decoded, chunk);
        assert_eq!(updated_model_enc, updated_model_dec);
        let _ = &mut model;
    }

    #[test]
    fn fast_cadence_flux_is_rejected() {
        let subservice = Subservice::FFx;
        let sample_len = subservice.sample_byte_len();
        let mut bytes = vec![0u8; COLLECTION_HEADER_SIZE + sample_len];
        let header = CollectionHeader {
            timestamp: 0, config_id: 0, packet_type: false, subservice, ccd_id: 0, sequence_number: 0,
            data_length: sample_len as u16,
        };
        let mut writer = BitWriter::new(&mut bytes[..COLLECTION_HEADER_SIZE]);
        header.write(&mut writer);
        writer.flush().unwrap();

        let params = params_for(CmpMode::DiffZero);
        let mut dst = vec![0u8; compress_chunk_bound(bytes.len(), 1)];
        let result = compress_chunk(&bytes, None, None, &mut dst, &params, 0, 0);
        assert!(matches!(result, Err(Error::ColSubserviceUnsupported { .. })));
    }

    #[test]
    fn destination_too_small_is_reported() {
        let chunk = build_sfx_chunk(&[(0, 0), (1, 1)]);
        let params = params_for(CmpMode::Raw);
        let mut dst = vec![0u8; 4];
        let result = compress_chunk(&chunk, None, None, &mut dst, &params, 0, 0);
        assert!(matches!(result, Err(Error::SmallBuffer { .. })));
    }
}
