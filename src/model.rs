//! Per-sample prediction (`spec.md` §4.4): raw copy, differential residues,
//! and the model-based predictor with its exponential update rule.
//!
//! Residues are computed as a wrapping difference within the field's own
//! bit width, sign-extended, then zig-zag mapped — this is what keeps a
//! residue representable in exactly `max_data_bits(field)` bits even when
//! the two operands sit near opposite ends of the field's range (`spec.md`
//! leaves the exact arithmetic unstated beyond "residue = zigzag(x_i -
//! x_{i-1})"; see `DESIGN.md` for this resolution).

use crate::data_model::MAX_MODEL_VALUE;

/// Mask `value` down to its low `bits` bits.
pub fn mask_to_bits(value: u32, bits: u8) -> u32 {
    if bits >= 32 { value } else { value & ((1u32 << bits) - 1) }
}

fn sign_extend(value: u32, bits: u8) -> i32 {
    if bits >= 32 { return value as i32; }
    let shift = 32 - u32::from(bits);
    ((value << shift) as i32) >> shift
}

fn zigzag_encode_n(signed: i32, bits: u8) -> u32 {
    if bits >= 32 {
        ((signed << 1) ^ (signed >> 31)) as u32
    } else {
        let z = ((signed << 1) ^ (signed >> (i32::from(bits) - 1))) as u32;
        mask_to_bits(z, bits)
    }
}

fn zigzag_decode_n(z: u32, bits: u8) -> i32 {
    let shifted = sign_extend(z, bits);
    (shifted >> 1) ^ -(shifted & 1)
}

/// The zig-zag-mapped, wrapped `bits`-wide residue of `current - reference`.
fn wrapped_residue(current: u32, reference: u32, bits: u8) -> u32 {
    let diff = mask_to_bits(current.wrapping_sub(reference), bits);
    let signed = sign_extend(diff, bits);
    zigzag_encode_n(signed, bits)
}

/// Invert [`wrapped_residue`]: recover `current` from `residue` and `reference`.
fn unwrap_residue(residue: u32, reference: u32, bits: u8) -> u32 {
    let signed = zigzag_decode_n(residue, bits);
    mask_to_bits(reference.wrapping_add(signed as u32), bits)
}

/// `DIFF_*` encode step: residue against the previous sample in this
/// collection (`x_{-1} = 0` for the first sample).
pub fn diff_encode(current: u32, previous: u32, bits: u8) -> u32 {
    wrapped_residue(current, previous, bits)
}

/// `DIFF_*` decode step: inverse of [`diff_encode`].
pub fn diff_decode(residue: u32, previous: u32, bits: u8) -> u32 {
    unwrap_residue(residue, previous, bits)
}

/// `MODEL_*` encode step: residue against the model sample.
pub fn model_encode(current: u32, model_sample: u32, bits: u8) -> u32 {
    wrapped_residue(current, model_sample, bits)
}

/// `MODEL_*` decode step: inverse of [`model_encode`].
pub fn model_decode(residue: u32, model_sample: u32, bits: u8) -> u32 {
    unwrap_residue(residue, model_sample, bits)
}

/// The exponential model-update blend of `spec.md` §4.4:
/// `m' = ((MAX_MODEL_VALUE - model_value)*x + model_value*m + MAX_MODEL_VALUE/2) / MAX_MODEL_VALUE`,
/// masked to the field's bit width.
pub fn update_model(current: u32, model_sample: u32, model_value: u8, bits: u8) -> u32 {
    let max_model = u64::from(MAX_MODEL_VALUE);
    let weight_current = max_model - u64::from(model_value);
    let weight_model = u64::from(model_value);
    let blended = (weight_current * u64::from(current) + weight_model * u64::from(model_sample) + max_model / 2) / max_model;
    mask_to_bits(blended as u32, bits)
}

/// `lossy_par` right-shift applied before prediction (`spec.md` §4.4).
pub fn lossy_round_down(value: u32, lossy_par: u8) -> u32 {
    value >> lossy_par
}

/// `lossy_par` left-shift applied after decoding; exact modulo `2^lossy_par`.
pub fn lossy_round_up(value: u32, lossy_par: u8, bits: u8) -> u32 {
    mask_to_bits(value << lossy_par, bits)
}
