//! Golomb-power-of-2 entropy codec with spill/escape fallback (`spec.md` §4.2).
//!
//! A non-negative residue `x` is split into a unary-coded quotient and a
//! truncated-binary remainder against divisor `m`. Residues at or above the
//! spill threshold `S` escape to a fixed-width raw encoding instead, so a
//! single outlier never produces a pathologically long unary run. The
//! explicit one-bit "multi" marker mentioned as a design note in `spec.md`
//! §9 is defined here, at the position documented on [`GolombParams`].

use crate::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Largest permitted Golomb divisor `m` (`spec.md` §4.2).
pub const MAX_GOLOMB_PAR: u32 = 0x0010_0000;

/// Largest permitted `lossy_par` right-shift amount (`spec.md` §4.3/§4.4).
pub const MAX_ICU_ROUND: u8 = 16;

/// Conservative spill threshold for a Golomb divisor `m` over a field with
/// `max_data_bits` bits: caps the unary quotient run at 16 ones, and never
/// exceeds what the field can represent. `spec.md` does not give a formula
/// for this directly ("implicit spill = cmp_*_max_spill(m) unless set
/// explicitly"); this is the one used throughout this crate and documented
/// as an Open-Question resolution in `DESIGN.md`.
pub fn cmp_max_spill(golomb_par: u32, max_data_bits: u8) -> u32 {
    debug_assert!(golomb_par >= 1);
    let field_max: u32 = if max_data_bits >= 32 { u32::MAX } else { (1u32 << max_data_bits) - 1 };
    let unary_cap = golomb_par.saturating_mul(16);
    unary_cap.min(field_max).max(1)
}

/// Map a signed residue to a non-negative value (`spec.md` §4.2).
pub fn zigzag_encode(x: i32) -> u32 {
    ((x << 1) ^ (x >> 31)) as u32
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(z: u32) -> i32 {
    ((z >> 1) as i32) ^ -((z & 1) as i32)
}

/// Per-field Golomb parameters, plus the escape widths needed for the spill
/// fallback.
///
/// The explicit "multi" marker bit (spec.md §9) is written immediately
/// after the escape prefix, before the raw remainder: `1` selects
/// `multi_bits`, `0` selects `max_data_bits`. It is only present when
/// `multi_bits` is `Some` (i.e. in `DIFF_MULTI`/`MODEL_MULTI`); `DIFF_ZERO`/
/// `MODEL_ZERO` never write the marker and always use `max_data_bits` on
/// escape.
#[derive(Debug, Clone, Copy)]
pub struct GolombParams {
    pub m: u32,
    pub spill: u32,
    pub max_data_bits: u8,
    pub multi_bits: Option<u8>,
}

impl GolombParams {
    pub fn validate(&self, field: &'static str) -> Result<()> {
        if self.m < 1 || self.m > MAX_GOLOMB_PAR {
            return Err(Error::ParGolomb { field, value: self.m });
        }
        let max_spill = cmp_max_spill(self.m, self.max_data_bits);
        if self.spill < 1 || self.spill > max_spill {
            return Err(Error::ParSpill { field, value: self.spill, max: max_spill });
        }
        Ok(())
    }

    fn bits_for_m(&self) -> u8 {
        if self.m == 1 { 0 } else {
            let mut b = 0u8;
            while (1u64 << b) < u64::from(self.m) { b += 1; }
            b
        }
    }

    fn cutoff(&self, b: u8) -> u32 {
        if b == 0 { 0 } else { (1u32 << b) - self.m }
    }

    /// Encode `value` (already non-negative, e.g. post-zigzag) against this
    /// field's Golomb parameters.
    pub fn encode(&self, value: u32, writer: &mut BitWriter<'_>) {
        if value < self.spill {
            self.encode_prefix(value, writer);
        } else {
            self.encode_prefix(self.spill, writer);
            match self.multi_bits {
                Some(w) if value < (1u32 << w) => {
                    writer.put_bits(1, 1);
                    writer.put_bits(value, u32::from(w));
                }
                Some(_) => {
                    writer.put_bits(0, 1);
                    writer.put_bits(value, u32::from(self.max_data_bits));
                }
                None => writer.put_bits(value, u32::from(self.max_data_bits)),
            }
        }
    }

    /// Inverse of [`GolombParams::encode`].
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u32> {
        let candidate = self.decode_prefix(reader)?;
        if candidate < self.spill {
            return Ok(candidate);
        }

        debug_assert_eq!(candidate, self.spill, "golomb prefix decoded past the escape marker");
        match self.multi_bits {
            Some(w) => {
                if reader.get_bit()? {
                    reader.get_bits(u32::from(w))
                } else {
                    reader.get_bits(u32::from(self.max_data_bits))
                }
            }
            None => reader.get_bits(u32::from(self.max_data_bits)),
        }
    }

    fn encode_prefix(&self, value: u32, writer: &mut BitWriter<'_>) {
        let quotient = value / self.m;
        let remainder = value % self.m;
        for _ in 0..quotient {
            writer.put_bits(1, 1);
        }
        writer.put_bits(0, 1);

        let b = self.bits_for_m();
        if b == 0 { return; }
        let cutoff = self.cutoff(b);
        let prefix_bits = b - 1;
        if remainder < cutoff {
            if prefix_bits > 0 {
                writer.put_bits(remainder, u32::from(prefix_bits));
            }
        } else {
            writer.put_bits(remainder + cutoff, u32::from(b));
        }
    }

    fn decode_prefix(&self, reader: &mut BitReader<'_>) -> Result<u32> {
        let mut quotient = 0u32;
        while reader.get_bit()? {
            quotient += 1;
        }

        let b = self.bits_for_m();
        let remainder = if b == 0 {
            0
        } else {
            let cutoff = self.cutoff(b);
            let prefix_bits = b - 1;
            let first = if prefix_bits == 0 { 0 } else { reader.get_bits(u32::from(prefix_bits))? };
            if first < cutoff {
                first
            } else {
                let extra = reader.get_bits(1)?;
                first * 2 + extra - cutoff
            }
        };

        Ok(quotient * self.m + remainder)
    }
}
