//! The per-record genotype transformation engine: a type-dispatched,
//! dimension-aware, number-tag-aware walk over paired anchor/current
//! per-sample payloads, applying a difference (integers, chars) or a
//! bit-level XOR (floats), with the exact inverse on decode.

mod kernel;
mod promote;

pub use kernel::{DeltaVisitor, Direction};
pub(crate) use kernel::{IntRows, RowSource};
pub use promote::PromotePool;

use crate::error::DeltaError;
use crate::header::FormatSpecs;
use crate::model::Record;

/// Declared arity of a FORMAT field per sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldNumber {
    /// A fixed count, including the scalar case `1`.
    Count(usize),
    /// `A`: one value per alternate allele.
    Alt,
    /// `R`: one value per allele, reference included.
    RefAlt,
    /// `G`: one value per genotype.
    Genotypes,
    /// `.`: variable or unknown arity.
    Unknown,
}

/// Linear index of genotype `(a, b)` with `a <= b` in a `Number=G` vector.
pub fn vcf_gt_index(a: usize, b: usize) -> usize {
    b * (b + 1) / 2 + a
}

/// Apply the forward (encode) transformation to every delta-eligible field of
/// `cur`, pairing each against the same-named field of the anchor `last`.
/// Fields absent from the anchor pass through unchanged.
pub fn do_delta(
    last: &Record,
    cur: &mut Record,
    specs: &FormatSpecs,
    n_samples: usize,
    skip_problematic: bool,
    pool: &mut PromotePool,
) -> Result<(), DeltaError> {
    apply(
        last,
        cur,
        specs,
        n_samples,
        skip_problematic,
        Direction::Encode,
        pool,
    )
}

/// Apply the inverse (decode) transformation; the exact mirror of [`do_delta`].
pub fn undo_delta(
    last: &Record,
    cur: &mut Record,
    specs: &FormatSpecs,
    n_samples: usize,
    skip_problematic: bool,
    pool: &mut PromotePool,
) -> Result<(), DeltaError> {
    apply(
        last,
        cur,
        specs,
        n_samples,
        skip_problematic,
        Direction::Decode,
        pool,
    )
}

fn apply(
    last: &Record,
    cur: &mut Record,
    specs: &FormatSpecs,
    n_samples: usize,
    skip_problematic: bool,
    direction: Direction,
    pool: &mut PromotePool,
) -> Result<(), DeltaError> {
    let n_alts = cur.alts.len();

    for idx in 0..cur.genotypes.len() {
        let Some(spec) = specs.get(&cur.genotypes[idx].id) else {
            continue;
        };
        if !spec.delta {
            continue;
        }
        let Some(last_field) = last.genotype(&cur.genotypes[idx].id) else {
            continue;
        };

        let field = &mut cur.genotypes[idx];
        // Narrow integer payloads are lifted to i32 before the op, in both
        // directions, so differences can never overflow their storage.
        promote::promote_payload(&mut field.payload, pool);

        let visitor = DeltaVisitor {
            id: &field.id,
            number: spec.number,
            n_alts,
            n_samples,
            skip_problematic,
            direction,
        };
        visitor.apply(&last_field.payload, &mut field.payload)?;
    }

    Ok(())
}
