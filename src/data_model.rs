//! Typed sample layouts, the subservice ↔ layout mapping, and the parameter
//! set (`spec.md` §3, DataModel in §2).
//!
//! The eighteen non-imagette sample layouts are a closed sum type indexed by
//! a 6-bit subservice tag (`spec.md` §9 "Duck-typed layouts → tagged
//! variants"): a central dispatch table ([`Subservice::fields`]) maps each
//! tag to the field list that is present, instead of any virtual dispatch.

use smallvec::SmallVec;

use crate::codec::{cmp_max_spill, GolombParams, MAX_GOLOMB_PAR, MAX_ICU_ROUND};
use crate::error::{Error, Result};

/// One of the six named fields a sample may carry (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldName {
    ExpFlags,
    Fx,
    Efx,
    Ncob,
    Ecob,
    Variance,
}

impl FieldName {
    /// The documented maximum bit width for this field.
    pub const fn max_bits(self) -> u8 {
        match self {
            FieldName::ExpFlags => 8,
            FieldName::Fx | FieldName::Efx | FieldName::Ncob | FieldName::Ecob | FieldName::Variance => 32,
        }
    }
}

/// Acquisition cadence: short, fast, or long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    Short,
    Fast,
    Long,
}

/// Up to six fields per sample layout; `smallvec` avoids a heap allocation
/// for what is always a small, statically-bounded list.
pub type FieldList = SmallVec<[FieldName; 6]>;

/// One of the eighteen non-imagette sample layouts, plus the bare imagette
/// pixel. The 6-bit subservice tag in a collection header (`spec.md` §3)
/// selects one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subservice {
    SFx, SFxEfx, SFxNcob, SFxEfxNcobEcob,
    FFx, FFxEfx, FFxNcob, FFxEfxNcobEcob,
    LFx, LFxEfx, LFxNcob, LFxEfxNcobEcob,
    SOffset, SBackground, SSmearing,
    LOffset, LBackground, LSmearing,
    Imagette,
}

impl Subservice {
    /// All eighteen telemetry layouts plus imagette, in wire-code order.
    pub const ALL: [Subservice; 19] = [
        Subservice::SFx, Subservice::SFxEfx, Subservice::SFxNcob, Subservice::SFxEfxNcobEcob,
        Subservice::FFx, Subservice::FFxEfx, Subservice::FFxNcob, Subservice::FFxEfxNcobEcob,
        Subservice::LFx, Subservice::LFxEfx, Subservice::LFxNcob, Subservice::LFxEfxNcobEcob,
        Subservice::SOffset, Subservice::SBackground, Subservice::SSmearing,
        Subservice::LOffset, Subservice::LBackground, Subservice::LSmearing,
        Subservice::Imagette,
    ];

    /// The 6-bit wire code stored in a collection header.
    pub const fn code(self) -> u8 {
        match self {
            Subservice::SFx => 0, Subservice::SFxEfx => 1, Subservice::SFxNcob => 2, Subservice::SFxEfxNcobEcob => 3,
            Subservice::FFx => 4, Subservice::FFxEfx => 5, Subservice::FFxNcob => 6, Subservice::FFxEfxNcobEcob => 7,
            Subservice::LFx => 8, Subservice::LFxEfx => 9, Subservice::LFxNcob => 10, Subservice::LFxEfxNcobEcob => 11,
            Subservice::SOffset => 12, Subservice::SBackground => 13, Subservice::SSmearing => 14,
            Subservice::LOffset => 15, Subservice::LBackground => 16, Subservice::LSmearing => 17,
            Subservice::Imagette => 18,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
            .ok_or(Error::ColSubserviceUnsupported { subservice: code })
    }

    /// The cadence this layout belongs to, or `None` for the bare imagette
    /// (imagette samples have no cadence-specific Golomb profile).
    pub const fn cadence(self) -> Option<Cadence> {
        use Subservice::*;
        match self {
            SFx | SFxEfx | SFxNcob | SFxEfxNcobEcob | SOffset | SBackground | SSmearing => Some(Cadence::Short),
            FFx | FFxEfx | FFxNcob | FFxEfxNcobEcob => Some(Cadence::Fast),
            LFx | LFxEfx | LFxNcob | LFxEfxNcobEcob | LOffset | LBackground | LSmearing => Some(Cadence::Long),
            Imagette => None,
        }
    }

    /// `spec.md` §3: "Fast-cadence flux subservices ... are not permitted
    /// in chunks".
    pub const fn is_fast_flux(self) -> bool {
        matches!(self, Subservice::FFx | Subservice::FFxEfx | Subservice::FFxNcob | Subservice::FFxEfxNcobEcob)
    }

    /// The ordered field list making up one sample of this layout.
    pub fn fields(self) -> FieldList {
        use FieldName::*;
        use Subservice::*;
        let slice: &[FieldName] = match self {
            SFx | FFx | LFx => &[ExpFlags, Fx],
            SFxEfx | FFxEfx | LFxEfx => &[ExpFlags, Fx, Efx],
            SFxNcob | FFxNcob | LFxNcob => &[ExpFlags, Fx, Ncob],
            SFxEfxNcobEcob | FFxEfxNcobEcob | LFxEfxNcobEcob => &[ExpFlags, Fx, Efx, Ncob, Ecob],
            SOffset | LOffset => &[Variance],
            SBackground | LBackground => &[Variance],
            SSmearing | LSmearing => &[Variance],
            Imagette => &[],
        };
        slice.iter().copied().collect()
    }

    /// Byte length of one sample of this layout (all field widths are
    /// whole-byte multiples, so no padding is needed between fields).
    pub fn sample_byte_len(self) -> usize {
        if self == Subservice::Imagette {
            return 2; // bare 16-bit pixel
        }
        self.fields().iter().map(|f| usize::from(f.max_bits()) / 8).sum()
    }
}

/// Which predictor family a chunk uses (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpMode {
    Raw,
    DiffZero,
    DiffMulti,
    ModelZero,
    ModelMulti,
}

impl CmpMode {
    pub const fn is_raw(self) -> bool {
        matches!(self, CmpMode::Raw)
    }

    pub const fn is_model(self) -> bool {
        matches!(self, CmpMode::ModelZero | CmpMode::ModelMulti)
    }

    /// `DIFF_MULTI`/`MODEL_MULTI` use the narrower escape width described in
    /// `spec.md` §4.4.
    pub const fn is_multi(self) -> bool {
        matches!(self, CmpMode::DiffMulti | CmpMode::ModelMulti)
    }
}

impl core::fmt::Display for CmpMode {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            CmpMode::Raw => "raw",
            CmpMode::DiffZero => "diff-zero",
            CmpMode::DiffMulti => "diff-multi",
            CmpMode::ModelZero => "model-zero",
            CmpMode::ModelMulti => "model-multi",
        };
        write!(formatter, "{text}")
    }
}

/// `MAX_MODEL_VALUE` of `spec.md` §4.4: pure-model blend weight.
pub const MAX_MODEL_VALUE: u8 = 16;

/// Narrower escape width used for `DIFF_MULTI`/`MODEL_MULTI` (`spec.md` §4.4
/// design note: "a field-specific multi width"). This implementation fixes
/// it at half the field's maximum width, rounded down to at least one bit;
/// see `DESIGN.md` for why no separate per-field multi-width knob is
/// exposed in `CmpParams`.
pub fn multi_bits_for(max_data_bits: u8) -> u8 {
    (max_data_bits / 2).max(1)
}

/// The full compression parameter set (`spec.md` §3 "Parameter set", §6
/// "Configuration options"). Spill thresholds are always the implicit
/// `cmp_*_max_spill(m)` default (`spec.md` §6: "(implicit) spill =
/// cmp_*_max_spill(m) unless set explicitly" — this crate does not expose
/// the explicit-override knob; see `DESIGN.md`).
#[derive(Debug, Clone, Copy)]
pub struct CmpParams {
    pub cmp_mode: CmpMode,
    pub model_value: u8,
    pub lossy_par: u8,

    pub nc_imagette: u32,
    pub saturated_imagette: u32,

    pub s_exp_flags: u32,
    pub s_fx: u32,
    pub s_efx: u32,
    pub s_ncob: u32,
    pub s_ecob: u32,
    pub s_variance: u32,

    pub l_exp_flags: u32,
    pub l_fx: u32,
    pub l_efx: u32,
    pub l_ncob: u32,
    pub l_ecob: u32,
    pub l_variance: u32,
}

impl CmpParams {
    /// Validate every field against its documented range
    /// (`spec.md` §3 / §4.6 `PAR_*` codes). Called once at encode entry and
    /// once, independently, against the header recovered at decode time
    /// (`spec.md` §7).
    pub fn validate(&self) -> Result<()> {
        if self.model_value > MAX_MODEL_VALUE {
            return Err(Error::ParModelValue(self.model_value));
        }
        if self.lossy_par > MAX_ICU_ROUND {
            return Err(Error::ParLossyPar(self.lossy_par));
        }

        let imagette_bits = 16u8;
        validate_golomb_par("nc_imagette", self.nc_imagette, imagette_bits)?;
        validate_golomb_par("saturated_imagette", self.saturated_imagette, imagette_bits)?;

        for (name, value) in [
            ("s_exp_flags", self.s_exp_flags), ("l_exp_flags", self.l_exp_flags),
        ] {
            validate_golomb_par(name, value, FieldName::ExpFlags.max_bits())?;
        }
        for (name, value) in [
            ("s_fx", self.s_fx), ("l_fx", self.l_fx),
            ("s_efx", self.s_efx), ("l_efx", self.l_efx),
            ("s_ncob", self.s_ncob), ("l_ncob", self.l_ncob),
            ("s_ecob", self.s_ecob), ("l_ecob", self.l_ecob),
            ("s_variance", self.s_variance), ("l_variance", self.l_variance),
        ] {
            validate_golomb_par(name, value, FieldName::Fx.max_bits())?;
        }

        Ok(())
    }

    /// Golomb divisor configured for `field` at the given `cadence`.
    fn golomb_par(&self, field: FieldName, cadence: Cadence) -> u32 {
        match (field, cadence) {
            (FieldName::ExpFlags, Cadence::Short) => self.s_exp_flags,
            (FieldName::ExpFlags, Cadence::Long) => self.l_exp_flags,
            (FieldName::Fx, Cadence::Short) => self.s_fx,
            (FieldName::Fx, Cadence::Long) => self.l_fx,
            (FieldName::Efx, Cadence::Short) => self.s_efx,
            (FieldName::Efx, Cadence::Long) => self.l_efx,
            (FieldName::Ncob, Cadence::Short) => self.s_ncob,
            (FieldName::Ncob, Cadence::Long) => self.l_ncob,
            (FieldName::Ecob, Cadence::Short) => self.s_ecob,
            (FieldName::Ecob, Cadence::Long) => self.l_ecob,
            (FieldName::Variance, Cadence::Short) => self.s_variance,
            (FieldName::Variance, Cadence::Long) => self.l_variance,
            (_, Cadence::Fast) => unreachable!("fast-cadence flux is rejected before parameter lookup"),
        }
    }

    /// Build the [`GolombParams`] used to encode/decode one field at the
    /// given cadence, honoring the active `cmp_mode`'s multi-escape choice.
    pub fn field_golomb(&self, field: FieldName, cadence: Cadence) -> GolombParams {
        let m = self.golomb_par(field, cadence);
        let max_data_bits = field.max_bits();
        GolombParams {
            m,
            spill: cmp_max_spill(m, max_data_bits),
            max_data_bits,
            multi_bits: if self.cmp_mode.is_multi() { Some(multi_bits_for(max_data_bits)) } else { None },
        }
    }

    /// Golomb parameters for the bare imagette pixel layout.
    pub fn imagette_golomb(&self) -> GolombParams {
        let max_data_bits = 16u8;
        GolombParams {
            m: self.nc_imagette,
            spill: cmp_max_spill(self.nc_imagette, max_data_bits),
            max_data_bits,
            multi_bits: if self.cmp_mode.is_multi() { Some(multi_bits_for(max_data_bits)) } else { None },
        }
    }

    /// Golomb parameters for the secondary ("adaptive") imagette profile
    /// serialized into an `IMAGETTE_ADAPTIVE` entity header (`spec.md`
    /// §4.3). `compress_chunk` never emits this profile (see `DESIGN.md`);
    /// this stays available so a hand-built adaptive entity still decodes.
    pub fn imagette_adaptive_golomb(&self) -> GolombParams {
        let max_data_bits = 16u8;
        let m = self.saturated_imagette;
        GolombParams {
            m,
            spill: cmp_max_spill(m, max_data_bits),
            max_data_bits,
            multi_bits: if self.cmp_mode.is_multi() { Some(multi_bits_for(max_data_bits)) } else { None },
        }
    }
}

fn validate_golomb_par(field: &'static str, value: u32, _max_data_bits: u8) -> Result<()> {
    if value < 1 || value > MAX_GOLOMB_PAR {
        return Err(Error::ParGolomb { field, value });
    }
    Ok(())
}
