use thiserror::Error;

/// Errors raised by the genotype transformation engine.
///
/// Everything here is fatal to the pipeline except [`DeltaError::DimensionMismatch`],
/// which the `skip_problematic` policy downgrades to a silent per-sample skip.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("genotype field {id}: type is not compatible with the previous record's field")]
    IncompatibleTypes { id: String },

    #[error("genotype field {id}, sample {sample}: expected inner length {expected}, got {actual}")]
    DimensionMismatch {
        id: String,
        sample: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{0}")]
    HeaderConflict(String),

    #[error("genotype field {id} has {entries} entries but the header declares {samples} samples")]
    ShapeAssertion {
        id: String,
        entries: usize,
        samples: usize,
    },

    #[error("{0}")]
    Unsupported(String),
}
