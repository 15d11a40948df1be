//! Entity framing: the compressed-output header (`spec.md` §4.3) and the
//! 48-bit mission-epoch timestamp (`spec.md` §6).
//!
//! Three header sizes exist, selected by the raw bit and, when not raw, by
//! `data_type`: `GENERIC` (32 bytes, raw mode only), `IMAGETTE` (36 bytes),
//! `IMAGETTE_ADAPTIVE` (40 bytes), and `NON_IMAGETTE` (62 bytes). The fixed
//! part of the header (everything up to and including `lossy_par`) is
//! exactly 256 bits / 32 bytes — the entirety of `GENERIC` — and every
//! other header size appends a type-discriminated parameter block after it.

use crate::bitio::{BitReader, BitWriter};
use crate::codec::GolombParams;
use crate::data_model::CmpMode;
use crate::error::{Error, Result};

/// Size of the fixed header part / the `GENERIC` (raw-mode) header.
pub const GENERIC_HEADER_SIZE: usize = 32;
pub const IMAGETTE_HEADER_SIZE: usize = 36;
pub const IMAGETTE_ADAPTIVE_HEADER_SIZE: usize = 40;
pub const NON_IMAGETTE_HEADER_SIZE: usize = 62;

/// Seconds between the Unix epoch and the mission epoch, 2020-01-01T00:00:00Z
/// (`spec.md` §6).
pub const MISSION_EPOCH_UNIX_SECONDS: i64 = 1_577_836_800;

/// An injected wall-clock source, so `compress_chunk` never reads global
/// state directly (`spec.md` §5 "the telemetry timestamp source is an
/// injected clock").
pub trait TimestampSource {
    /// Returns `(unix_seconds, subsecond_fraction_1_over_65536)`.
    fn now(&self) -> (i64, u16);
}

/// A fixed clock, for tests and for callers that only need a constant
/// timestamp (`spec.md` §5: "may be null, in which case the timestamp is a
/// caller-supplied constant").
#[derive(Debug, Clone, Copy)]
pub struct ConstantClock {
    pub unix_seconds: i64,
    pub subsecond_fraction: u16,
}

impl TimestampSource for ConstantClock {
    fn now(&self) -> (i64, u16) {
        (self.unix_seconds, self.subsecond_fraction)
    }
}

/// `cmp_ent_create_timestamp`: pack a Unix time into the 48-bit mission-epoch
/// wire timestamp, returning `0` if `unix_seconds` is before the epoch.
pub fn cmp_ent_create_timestamp(unix_seconds: i64, subsecond_fraction: u16) -> u64 {
    if unix_seconds < MISSION_EPOCH_UNIX_SECONDS {
        return 0;
    }
    let seconds_since_epoch = (unix_seconds - MISSION_EPOCH_UNIX_SECONDS) as u64;
    debug_assert!(seconds_since_epoch <= u64::from(u32::MAX));
    (seconds_since_epoch << 16) | u64::from(subsecond_fraction)
}

/// The three header shapes of `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Imagette,
    ImagetteAdaptive,
    NonImagette,
}

impl DataType {
    const fn code(self) -> u16 {
        match self {
            DataType::Imagette => 0,
            DataType::ImagetteAdaptive => 1,
            DataType::NonImagette => 2,
        }
    }

    fn from_code(code: u16) -> Result<Self> {
        match code {
            0 => Ok(DataType::Imagette),
            1 => Ok(DataType::ImagetteAdaptive),
            2 => Ok(DataType::NonImagette),
            _ => Err(Error::EntityHeader("unrecognized data_type code")),
        }
    }
}

/// One `{spill, golomb}` pair of the imagette parameter block. Widths were
/// chosen (24-bit spill, 8-bit golomb = 4 bytes/pair) to make `IMAGETTE`
/// (one pair) and `IMAGETTE_ADAPTIVE` (two pairs) land exactly on the
/// documented 36- and 40-byte header sizes; see `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagetteParamPair {
    pub spill: u32,
    pub golomb: u8,
}

impl ImagetteParamPair {
    /// `params.m` must fit the 8-bit wire slot; imagette profiles are only
    /// ever configured with small divisors in practice (`spec.md` §6), so
    /// this rejects a misconfigured `nc_imagette`/`saturated_imagette`
    /// rather than silently truncating it.
    fn from_golomb(params: &GolombParams) -> Result<Self> {
        if params.m > u32::from(u8::MAX) {
            return Err(Error::ParGolomb { field: "imagette golomb parameter", value: params.m });
        }
        Ok(Self { spill: params.spill, golomb: params.m as u8 })
    }

    fn write(&self, writer: &mut BitWriter<'_>) {
        writer.put_bits(self.spill, 24);
        writer.put_bits(u32::from(self.golomb), 8);
    }

    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let spill = reader.get_bits(24)?;
        let golomb = reader.get_bits(8)? as u8;
        Ok(Self { spill, golomb })
    }
}

/// One `{spill, cmp_par}` pair of the non-imagette parameter block (24-bit
/// spill, 16-bit Golomb parameter = 5 bytes/pair; six pairs land exactly on
/// the documented 62-byte `NON_IMAGETTE` header size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonImagetteParamPair {
    pub spill: u32,
    pub cmp_par: u16,
}

impl NonImagetteParamPair {
    /// `params.m` must fit the 16-bit wire slot; see
    /// [`ImagetteParamPair::from_golomb`] for the same reasoning.
    fn from_golomb(params: &GolombParams) -> Result<Self> {
        if params.m > u32::from(u16::MAX) {
            return Err(Error::ParGolomb { field: "field golomb parameter", value: params.m });
        }
        Ok(Self { spill: params.spill, cmp_par: params.m as u16 })
    }

    fn write(&self, writer: &mut BitWriter<'_>) {
        writer.put_bits(self.spill, 24);
        writer.put_bits(u32::from(self.cmp_par), 16);
    }

    fn read(reader: &mut BitReader<'_>) -> Result<Self> {
        let spill = reader.get_bits(24)?;
        let cmp_par = reader.get_bits(16)? as u16;
        Ok(Self { spill, cmp_par })
    }
}

/// The type-discriminated parameter block following the fixed header part.
/// Absent entirely when the raw bit is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamBlock {
    Imagette { ima: ImagetteParamPair },
    ImagetteAdaptive { ima: ImagetteParamPair, ap1: ImagetteParamPair },
    /// Six pairs in field order: exp_flags, fx, efx, ncob, ecob, variance.
    NonImagette { fields: [NonImagetteParamPair; 6] },
}

impl ParamBlock {
    fn byte_len(&self) -> usize {
        match self {
            ParamBlock::Imagette { .. } => 4,
            ParamBlock::ImagetteAdaptive { .. } => 8,
            ParamBlock::NonImagette { .. } => 30,
        }
    }

    fn write(&self, writer: &mut BitWriter<'_>) {
        match self {
            ParamBlock::Imagette { ima } => ima.write(writer),
            ParamBlock::ImagetteAdaptive { ima, ap1 } => {
                ima.write(writer);
                ap1.write(writer);
            }
            ParamBlock::NonImagette { fields } => {
                for pair in fields {
                    pair.write(writer);
                }
            }
        }
    }

    fn read(reader: &mut BitReader<'_>, data_type: DataType) -> Result<Self> {
        Ok(match data_type {
            DataType::Imagette => ParamBlock::Imagette { ima: ImagetteParamPair::read(reader)? },
            DataType::ImagetteAdaptive => ParamBlock::ImagetteAdaptive {
                ima: ImagetteParamPair::read(reader)?,
                ap1: ImagetteParamPair::read(reader)?,
            },
            DataType::NonImagette => {
                let mut fields = [NonImagetteParamPair { spill: 0, cmp_par: 0 }; 6];
                for pair in &mut fields {
                    *pair = NonImagetteParamPair::read(reader)?;
                }
                ParamBlock::NonImagette { fields }
            }
        })
    }
}

/// The full entity header of `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityHeader {
    pub version_id: u32,
    pub size: u32,
    pub original_size: u32,
    pub start_timestamp: u64,
    pub end_timestamp: u64,
    pub data_type: DataType,
    pub raw: bool,
    pub cmp_mode: CmpMode,
    pub model_value: u8,
    pub model_id: u16,
    pub model_counter: u8,
    pub lossy_par: u8,
    pub params: Option<ParamBlock>,
}

impl EntityHeader {
    /// Serialized header size in bytes, per `spec.md` §4.3/§6.
    pub fn header_size(&self) -> usize {
        if self.raw {
            return GENERIC_HEADER_SIZE;
        }
        match self.params {
            Some(ParamBlock::Imagette { .. }) => IMAGETTE_HEADER_SIZE,
            Some(ParamBlock::ImagetteAdaptive { .. }) => IMAGETTE_ADAPTIVE_HEADER_SIZE,
            Some(ParamBlock::NonImagette { .. }) => NON_IMAGETTE_HEADER_SIZE,
            None => GENERIC_HEADER_SIZE,
        }
    }

    pub fn write(&self, buffer: &mut [u8]) -> Result<()> {
        if buffer.len() < self.header_size() {
            return Err(Error::SmallBuffer { needed: self.header_size() as u32, available: buffer.len() as u32 });
        }

        let mut writer = BitWriter::new(&mut buffer[..self.header_size()]);
        writer.put_bits(self.version_id, 32);
        writer.put_bits(self.size, 24);
        writer.put_bits(self.original_size, 24);
        writer.put_bits((self.start_timestamp >> 16) as u32, 32);
        writer.put_bits((self.start_timestamp & 0xFFFF) as u32, 16);
        writer.put_bits((self.end_timestamp >> 16) as u32, 32);
        writer.put_bits((self.end_timestamp & 0xFFFF) as u32, 16);
        writer.put_bits(u32::from(self.raw), 1);
        writer.put_bits(u32::from(data_type_code(self)), 15);
        writer.put_bits(u32::from(cmp_mode_code(self.cmp_mode)), 8);
        writer.put_bits(u32::from(self.model_value), 8);
        writer.put_bits(u32::from(self.model_id), 16);
        writer.put_bits(u32::from(self.model_counter), 8);
        writer.put_bits(0, 8); // reserved
        writer.put_bits(u32::from(self.lossy_par), 16);

        if let Some(params) = &self.params {
            params.write(&mut writer);
        }

        writer.flush()?;
        Ok(())
    }

    pub fn read(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < GENERIC_HEADER_SIZE {
            return Err(Error::SmallBuffer { needed: GENERIC_HEADER_SIZE as u32, available: buffer.len() as u32 });
        }

        let mut reader = BitReader::new(buffer);
        let version_id = reader.get_bits(32)?;
        let size = reader.get_bits(24)?;
        let original_size = reader.get_bits(24)?;
        let start_high = u64::from(reader.get_bits(32)?);
        let start_low = u64::from(reader.get_bits(16)?);
        let end_high = u64::from(reader.get_bits(32)?);
        let end_low = u64::from(reader.get_bits(16)?);
        let raw = reader.get_bit()?;
        let data_type_raw = reader.get_bits(15)?;
        let cmp_mode_raw = reader.get_bits(8)? as u8;
        let model_value = reader.get_bits(8)? as u8;
        let model_id = reader.get_bits(16)? as u16;
        let model_counter = reader.get_bits(8)? as u8;
        let _reserved = reader.get_bits(8)?;
        let lossy_par = reader.get_bits(16)?;
        if lossy_par > u32::from(u8::MAX) {
            return Err(Error::EntityHeader("lossy_par field exceeds one byte"));
        }

        let cmp_mode = cmp_mode_from_code(cmp_mode_raw)?;

        let params = if raw {
            None
        } else {
            let data_type = DataType::from_code(data_type_raw as u16)?;
            if buffer.len() < GENERIC_HEADER_SIZE + data_type_param_block_len(data_type) {
                return Err(Error::SmallBuffer {
                    needed: (GENERIC_HEADER_SIZE + data_type_param_block_len(data_type)) as u32,
                    available: buffer.len() as u32,
                });
            }
            Some(ParamBlock::read(&mut reader, data_type)?)
        };

        let header = Self {
            version_id,
            size,
            original_size,
            start_timestamp: (start_high << 16) | start_low,
            end_timestamp: (end_high << 16) | end_low,
            data_type: if raw { DataType::NonImagette } else { DataType::from_code(data_type_raw as u16)? },
            raw,
            cmp_mode,
            model_value,
            model_id,
            model_counter,
            lossy_par: lossy_par as u8,
            params,
        };

        if usize::from(header.size) < header.header_size() {
            return Err(Error::EntityHeader("size is smaller than the header itself"));
        }

        Ok(header)
    }
}

fn data_type_code(header: &EntityHeader) -> u16 {
    if header.raw { 0 } else { header.data_type.code() }
}

fn data_type_param_block_len(data_type: DataType) -> usize {
    match data_type {
        DataType::Imagette => 4,
        DataType::ImagetteAdaptive => 8,
        DataType::NonImagette => 30,
    }
}

fn cmp_mode_code(mode: CmpMode) -> u8 {
    match mode {
        CmpMode::Raw => 0,
        CmpMode::DiffZero => 1,
        CmpMode::DiffMulti => 2,
        CmpMode::ModelZero => 3,
        CmpMode::ModelMulti => 4,
    }
}

fn cmp_mode_from_code(code: u8) -> Result<CmpMode> {
    match code {
        0 => Ok(CmpMode::Raw),
        1 => Ok(CmpMode::DiffZero),
        2 => Ok(CmpMode::DiffMulti),
        3 => Ok(CmpMode::ModelZero),
        4 => Ok(CmpMode::ModelMulti),
        // Covers the reserved, never-implemented CMP_MODE_STUFF and any
        // other unrecognized code (spec.md §9 Open Question).
        _ => Err(Error::Generic("unrecognized or unsupported cmp_mode")),
    }
}

pub(crate) fn imagette_param_pair(params: &GolombParams) -> Result<ImagetteParamPair> {
    ImagetteParamPair::from_golomb(params)
}

pub(crate) fn non_imagette_param_pair(params: &GolombParams) -> Result<NonImagetteParamPair> {
    NonImagetteParamPair::from_golomb(params)
}
