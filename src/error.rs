//! Error surface for the compression core.
//!
//! Every fallible core operation returns a packed `u32`: bit 31 set marks an
//! error, and the low bits carry one of the [`ErrorCode`] variants below.
//! This mirrors how the ground software calls the library through a C ABI,
//! where a signed/unsigned size doubles as the error channel (see `spec.md`
//! §4.6). [`Error`] is the richer Rust-side type; [`Error::code`] maps it
//! down to the wire representation and [`cmp_is_error`]/[`cmp_get_error_code`]
//! do the reverse for callers that only see the packed value.

use core::fmt;

/// Bit that marks a packed `u32` result as an error.
const ERROR_BIT: u32 = 1 << 31;

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// The complete, closed set of failure codes the core can report.
///
/// This is a full enumeration, not a catch-all: the core never returns an
/// error outside this set (`spec.md` §1 "Error reporting beyond an
/// enumerated code set is out of scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// No error; the call succeeded.
    NoError,
    /// Destination capacity was insufficient to hold the result.
    SmallBuffer,
    /// A chunk contained a subservice not permitted in chunks.
    ColSubserviceUnsupported,
    /// Parameter validation failed for a reason with no dedicated code.
    Generic,
    /// A decoded entity header was internally inconsistent.
    EntityHeader,
    /// An input field value exceeded its layout's `max_data_bits`.
    DataValueTooLarge,
    /// A null chunk buffer was passed together with a non-zero size.
    ChunkNull,
    /// `model_value` was outside `[0, MAX_MODEL_VALUE]`.
    ParModelValue,
    /// `lossy_par` was outside `[0, MAX_ICU_ROUND]`.
    ParLossyPar,
    /// A Golomb parameter `m` was outside `[1, MAX_GOLOMB_PAR]`.
    ParGolomb,
    /// A spill threshold was outside `[1, cmp_max_spill(m)]`.
    ParSpill,
}

impl ErrorCode {
    /// The packed wire value for this code (low bits of the `u32` result).
    const fn wire_value(self) -> u32 {
        match self {
            ErrorCode::NoError => 0,
            ErrorCode::SmallBuffer => 1,
            ErrorCode::ColSubserviceUnsupported => 2,
            ErrorCode::Generic => 3,
            ErrorCode::EntityHeader => 4,
            ErrorCode::DataValueTooLarge => 5,
            ErrorCode::ChunkNull => 6,
            ErrorCode::ParModelValue => 7,
            ErrorCode::ParLossyPar => 8,
            ErrorCode::ParGolomb => 9,
            ErrorCode::ParSpill => 10,
        }
    }

    fn from_wire_value(value: u32) -> Self {
        match value {
            1 => ErrorCode::SmallBuffer,
            2 => ErrorCode::ColSubserviceUnsupported,
            3 => ErrorCode::Generic,
            4 => ErrorCode::EntityHeader,
            5 => ErrorCode::DataValueTooLarge,
            6 => ErrorCode::ChunkNull,
            7 => ErrorCode::ParModelValue,
            8 => ErrorCode::ParLossyPar,
            9 => ErrorCode::ParGolomb,
            10 => ErrorCode::ParSpill,
            _ => ErrorCode::Generic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::NoError => "no error",
            ErrorCode::SmallBuffer => "destination buffer too small",
            ErrorCode::ColSubserviceUnsupported => "collection subservice not permitted in a chunk",
            ErrorCode::Generic => "parameter validation failed",
            ErrorCode::EntityHeader => "entity header is internally inconsistent",
            ErrorCode::DataValueTooLarge => "field value exceeds its maximum bit width",
            ErrorCode::ChunkNull => "null chunk buffer with non-zero size",
            ErrorCode::ParModelValue => "model_value out of range",
            ErrorCode::ParLossyPar => "lossy_par out of range",
            ErrorCode::ParGolomb => "golomb parameter out of range",
            ErrorCode::ParSpill => "spill threshold out of range",
        };
        write!(formatter, "{text}")
    }
}

/// An error raised by the compression core, carrying a code plus (for a few
/// variants) the context needed for a useful diagnostic message. Conversion
/// to the wire `u32` only ever uses [`Error::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    SmallBuffer { needed: u32, available: u32 },
    ColSubserviceUnsupported { subservice: u8 },
    Generic(&'static str),
    EntityHeader(&'static str),
    DataValueTooLarge { field: &'static str, max_bits: u8 },
    ChunkNull,
    ParModelValue(u8),
    ParLossyPar(u8),
    ParGolomb { field: &'static str, value: u32 },
    ParSpill { field: &'static str, value: u32, max: u32 },
}

impl Error {
    /// The [`ErrorCode`] this error maps to in the packed wire representation.
    pub const fn code(self) -> ErrorCode {
        match self {
            Error::SmallBuffer { .. } => ErrorCode::SmallBuffer,
            Error::ColSubserviceUnsupported { .. } => ErrorCode::ColSubserviceUnsupported,
            Error::Generic(_) => ErrorCode::Generic,
            Error::EntityHeader(_) => ErrorCode::EntityHeader,
            Error::DataValueTooLarge { .. } => ErrorCode::DataValueTooLarge,
            Error::ChunkNull => ErrorCode::ChunkNull,
            Error::ParModelValue(_) => ErrorCode::ParModelValue,
            Error::ParLossyPar(_) => ErrorCode::ParLossyPar,
            Error::ParGolomb { .. } => ErrorCode::ParGolomb,
            Error::ParSpill { .. } => ErrorCode::ParSpill,
        }
    }

    /// Pack this error into the `u32` wire representation (bit 31 set).
    pub fn to_packed(self) -> u32 {
        log::debug!("cmp error: {self}");
        ERROR_BIT | self.code().wire_value()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SmallBuffer { needed, available } => write!(
                formatter, "destination buffer too small: need {needed} bytes, have {available}"
            ),
            Error::ColSubserviceUnsupported { subservice } => write!(
                formatter, "subservice {subservice} is not permitted in a chunk"
            ),
            Error::Generic(message) => write!(formatter, "{message}"),
            Error::EntityHeader(message) => write!(formatter, "entity header inconsistent: {message}"),
            Error::DataValueTooLarge { field, max_bits } => write!(
                formatter, "field '{field}' value exceeds {max_bits} bits"
            ),
            Error::ChunkNull => write!(formatter, "null chunk buffer with non-zero size"),
            Error::ParModelValue(value) => write!(formatter, "model_value {value} out of range [0, 16]"),
            Error::ParLossyPar(value) => write!(formatter, "lossy_par {value} out of range"),
            Error::ParGolomb { field, value } => write!(formatter, "golomb parameter for '{field}' ({value}) out of range"),
            Error::ParSpill { field, value, max } => write!(
                formatter, "spill threshold for '{field}' ({value}) out of range [1, {max}]"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Pack a successful size as a wire result (bit 31 clear).
pub fn pack_size(size: u32) -> u32 {
    debug_assert!(size & ERROR_BIT == 0, "compressed size overflowed the 31-bit size field");
    size
}

/// `cmp_is_error(v)`: test whether a packed wire value denotes an error.
pub fn cmp_is_error(value: u32) -> bool {
    value & ERROR_BIT != 0
}

/// `cmp_get_error_code(v)`: extract the [`ErrorCode`] from a packed wire value.
/// Returns [`ErrorCode::NoError`] if `value` does not have the error bit set.
pub fn cmp_get_error_code(value: u32) -> ErrorCode {
    if !cmp_is_error(value) { return ErrorCode::NoError; }
    ErrorCode::from_wire_value(value & !ERROR_BIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_round_trips() {
        let error = Error::SmallBuffer { needed: 10, available: 4 };
        let packed = error.to_packed();
        assert!(cmp_is_error(packed));
        assert_eq!(cmp_get_error_code(packed), ErrorCode::SmallBuffer);
    }

    #[test]
    fn success_is_not_an_error() {
        let packed = pack_size(128);
        assert!(!cmp_is_error(packed));
        assert_eq!(cmp_get_error_code(packed), ErrorCode::NoError);
    }
}
