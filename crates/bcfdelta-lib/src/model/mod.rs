//! Typed value model for genotype payloads: per-width integer, float, char
//! and string cells, flat ragged storage, and the record shape the engine
//! operates on.

mod ragged;
mod record;
mod value;

pub use ragged::Ragged;
pub use record::{GenotypeField, Record};
pub use value::{
    f32_is_missing, missing_f32, widen_i8, widen_i16, Payload, MISSING_CHAR, MISSING_F32_BITS,
    MISSING_I16, MISSING_I32, MISSING_I8,
};
