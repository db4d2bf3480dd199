use super::ragged::Ragged;

/// In-band missing sentinels, matching the reserved values of the binary
/// call format: the minimum of each signed integer width, a reserved NaN-space
/// bit pattern for floats, and `.` for characters.
pub const MISSING_I8: i8 = i8::MIN;
pub const MISSING_I16: i16 = i16::MIN;
pub const MISSING_I32: i32 = i32::MIN;
pub const MISSING_F32_BITS: u32 = 0x7F80_0001;
pub const MISSING_CHAR: u8 = b'.';

pub fn missing_f32() -> f32 {
    f32::from_bits(MISSING_F32_BITS)
}

pub fn f32_is_missing(value: f32) -> bool {
    value.to_bits() == MISSING_F32_BITS
}

/// Widen an `i8` to `i32`, carrying missing-ness across the width change.
pub fn widen_i8(value: i8) -> i32 {
    if value == MISSING_I8 {
        MISSING_I32
    } else {
        i32::from(value)
    }
}

/// Widen an `i16` to `i32`, carrying missing-ness across the width change.
pub fn widen_i16(value: i16) -> i32 {
    if value == MISSING_I16 {
        MISSING_I32
    } else {
        i32::from(value)
    }
}

/// One genotype field's per-sample values.
///
/// Scalar variants hold one element per sample; `*Vec` variants hold one inner
/// vector per sample. Strings are carried for pass-through only; the
/// transformation engine refuses to touch them.
#[derive(Clone, Debug)]
pub enum Payload {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float(Vec<f32>),
    Char(Vec<u8>),
    String(Vec<String>),
    Int8Vec(Ragged<i8>),
    Int16Vec(Ragged<i16>),
    Int32Vec(Ragged<i32>),
    FloatVec(Ragged<f32>),
    CharVec(Ragged<u8>),
    StringVec(Ragged<String>),
}

impl Payload {
    /// Outer length: the number of per-sample entries.
    pub fn sample_count(&self) -> usize {
        match self {
            Payload::Int8(v) => v.len(),
            Payload::Int16(v) => v.len(),
            Payload::Int32(v) => v.len(),
            Payload::Float(v) => v.len(),
            Payload::Char(v) => v.len(),
            Payload::String(v) => v.len(),
            Payload::Int8Vec(r) => r.len(),
            Payload::Int16Vec(r) => r.len(),
            Payload::Int32Vec(r) => r.len(),
            Payload::FloatVec(r) => r.len(),
            Payload::CharVec(r) => r.len(),
            Payload::StringVec(r) => r.len(),
        }
    }
}

fn f32_slices_eq(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.to_bits() == y.to_bits())
}

fn f32_ragged_eq(a: &Ragged<f32>, b: &Ragged<f32>) -> bool {
    a.len() == b.len()
        && (0..a.len()).all(|i| a.row_len(i) == b.row_len(i))
        && f32_slices_eq(a.data(), b.data())
}

// Floats compare bitwise so that sentinel NaNs and signed zeros are
// distinguishable; this is the equality the lossless round trip promises.
impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Int8(a), Payload::Int8(b)) => a == b,
            (Payload::Int16(a), Payload::Int16(b)) => a == b,
            (Payload::Int32(a), Payload::Int32(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => f32_slices_eq(a, b),
            (Payload::Char(a), Payload::Char(b)) => a == b,
            (Payload::String(a), Payload::String(b)) => a == b,
            (Payload::Int8Vec(a), Payload::Int8Vec(b)) => a == b,
            (Payload::Int16Vec(a), Payload::Int16Vec(b)) => a == b,
            (Payload::Int32Vec(a), Payload::Int32Vec(b)) => a == b,
            (Payload::FloatVec(a), Payload::FloatVec(b)) => f32_ragged_eq(a, b),
            (Payload::CharVec(a), Payload::CharVec(b)) => a == b,
            (Payload::StringVec(a), Payload::StringVec(b)) => a == b,
            _ => false,
        }
    }
}
