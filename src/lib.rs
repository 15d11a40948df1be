//! Lossless/near-lossless compression of focal-plane telemetry chunks.
//!
//! A *chunk* is a concatenation of typed *collections* (imagette pixels,
//! offset/background/smearing statistics, flux/centroid samples at three
//! cadences). [`compress_chunk`] frames it into a self-describing
//! *compression entity* — header plus per-collection compressed bodies —
//! and [`decompress_cmp_entity`] inverts the transform bit-exactly.

#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused_extern_crates,
    unused,

    missing_copy_implementations,
    missing_debug_implementations,

    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
)]

#![deny(
    unused_variables,
    unused_assignments,
    dead_code,
    unused_must_use,
    trivial_numeric_casts,
    redundant_semicolon
)]

#![forbid(unsafe_code)]

// TODO #![warn(missing_docs)]

pub mod bitio;
pub mod codec;
pub mod data_model;
pub mod model;
pub mod sample;
pub mod collection;
pub mod entity;
pub mod chunk;
pub mod error;

#[macro_use]
extern crate smallvec;

/// Re-exports of the types needed to compress and decompress a chunk.
pub mod prelude {
    // main entry points
    pub use crate::chunk::{
        compress_chunk, compress_chunk_bound, compress_chunk_with_clock, decompress_cmp_entity,
    };

    // parameter set and data model
    pub use crate::data_model::{Cadence, CmpMode, CmpParams, FieldName, Subservice};

    // entity framing
    pub use crate::entity::{
        cmp_ent_create_timestamp, ConstantClock, DataType, EntityHeader, TimestampSource,
        GENERIC_HEADER_SIZE, IMAGETTE_ADAPTIVE_HEADER_SIZE, IMAGETTE_HEADER_SIZE,
        NON_IMAGETTE_HEADER_SIZE,
    };

    // codec-level building blocks, for callers composing their own framing
    pub use crate::bitio::{BitReader, BitWriter};
    pub use crate::codec::{cmp_max_spill, GolombParams, MAX_GOLOMB_PAR};

    pub use crate::error;
    pub use error::{cmp_get_error_code, cmp_is_error, Error, ErrorCode, Result};
}
