//! Pre-pass restructuring of `AD` and `PL` into separately compressible
//! sub-fields, and the decode-side inverse.
//!
//! `AD` becomes `AD_REF` (scalar) + `AD_ALT` (one value per alt); `PL` is
//! partitioned by genotype class into `PL1` (0/0), `PL2` (0/k) and `PL3`
//! (j/k with j >= 1). The children take the parent's position in the FORMAT
//! order, so the inverse restores the record exactly.

use std::mem;

use crate::delta::{vcf_gt_index, IntRows, RowSource};
use crate::error::DeltaError;
use crate::model::{GenotypeField, Payload, Ragged, Record, MISSING_I32};

/// Reusable storages for the five split fields. After a split record has been
/// written, [`salvage_split_buffers`] returns the storages here so the next
/// record allocates nothing.
#[derive(Default)]
pub struct SplitBuffers {
    ad_ref: Vec<i32>,
    ad_alt: Ragged<i32>,
    pl1: Vec<i32>,
    pl2: Ragged<i32>,
    pl3: Ragged<i32>,
}

/// Split `AD` and `PL` in place. A malformed sample abandons that field's
/// split entirely and the original field is retained.
pub fn split_record(record: &mut Record, buffers: &mut SplitBuffers) -> Result<(), DeltaError> {
    let n_alts = record.n_alts();
    split_ad(record, buffers, n_alts)?;
    split_pl(record, buffers, n_alts)?;
    Ok(())
}

fn split_ad(
    record: &mut Record,
    buffers: &mut SplitBuffers,
    n_alts: usize,
) -> Result<(), DeltaError> {
    let Some(idx) = record.genotype_position("AD") else {
        return Ok(());
    };

    let ad_size = n_alts + 1;
    let mut ad_ref = mem::take(&mut buffers.ad_ref);
    let mut ad_alt = mem::take(&mut buffers.ad_alt);
    ad_ref.clear();
    ad_alt.clear();

    let rows = IntRows::from_payload(&record.genotypes[idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("AD field is not a collection of integers".to_string())
    })?;

    let mut fail = false;
    for i in 0..rows.n_rows() {
        let len = rows.row_len(i);
        if len == 1 {
            // Reference-only sample: AD_REF filled, AD_ALT stays empty.
            ad_ref.push(rows.at(i, 0));
            ad_alt.push_empty_row();
        } else if len == ad_size {
            ad_ref.push(rows.at(i, 0));
            ad_alt.push_row_iter((1..len).map(|j| rows.at(i, j)));
        } else {
            fail = true;
            break;
        }
    }

    if fail {
        buffers.ad_ref = ad_ref;
        buffers.ad_alt = ad_alt;
        return Ok(());
    }

    record.genotypes[idx] = GenotypeField {
        id: "AD_REF".to_string(),
        payload: Payload::Int32(ad_ref),
    };
    record.genotypes.insert(
        idx + 1,
        GenotypeField {
            id: "AD_ALT".to_string(),
            payload: Payload::Int32Vec(ad_alt),
        },
    );
    Ok(())
}

fn split_pl(
    record: &mut Record,
    buffers: &mut SplitBuffers,
    n_alts: usize,
) -> Result<(), DeltaError> {
    let Some(idx) = record.genotype_position("PL") else {
        return Ok(());
    };

    let pl_size = vcf_gt_index(n_alts, n_alts) + 1;
    let mut pl1 = mem::take(&mut buffers.pl1);
    let mut pl2 = mem::take(&mut buffers.pl2);
    let mut pl3 = mem::take(&mut buffers.pl3);
    pl1.clear();
    pl2.clear();
    pl3.clear();

    let rows = IntRows::from_payload(&record.genotypes[idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("PL field is not a collection of integers".to_string())
    })?;

    let mut fail = false;
    for i in 0..rows.n_rows() {
        pl2.push_empty_row();
        pl3.push_empty_row();

        let len = rows.row_len(i);
        if len == 0 {
            // Empty vectors are fine; the missing sentinel marks them.
            pl1.push(MISSING_I32);
            continue;
        }
        if len != pl_size {
            fail = true;
            break;
        }

        pl1.push(rows.at(i, 0));
        for k in 1..=n_alts {
            pl2.last_push(rows.at(i, vcf_gt_index(0, k)));
        }
        for j in 1..=n_alts {
            for k in j..=n_alts {
                pl3.last_push(rows.at(i, vcf_gt_index(j, k)));
            }
        }
    }

    if fail {
        buffers.pl1 = pl1;
        buffers.pl2 = pl2;
        buffers.pl3 = pl3;
        return Ok(());
    }

    record.genotypes[idx] = GenotypeField {
        id: "PL1".to_string(),
        payload: Payload::Int32(pl1),
    };
    record.genotypes.insert(
        idx + 1,
        GenotypeField {
            id: "PL2".to_string(),
            payload: Payload::Int32Vec(pl2),
        },
    );
    record.genotypes.insert(
        idx + 2,
        GenotypeField {
            id: "PL3".to_string(),
            payload: Payload::Int32Vec(pl3),
        },
    );
    Ok(())
}

/// Take the split-field storages back from a record that has been written.
pub fn salvage_split_buffers(record: &mut Record, buffers: &mut SplitBuffers) {
    for field in &mut record.genotypes {
        match (field.id.as_str(), &mut field.payload) {
            ("AD_REF", Payload::Int32(v)) => {
                v.clear();
                buffers.ad_ref = mem::take(v);
            }
            ("AD_ALT", Payload::Int32Vec(r)) => {
                r.clear();
                buffers.ad_alt = mem::take(r);
            }
            ("PL1", Payload::Int32(v)) => {
                v.clear();
                buffers.pl1 = mem::take(v);
            }
            ("PL2", Payload::Int32Vec(r)) => {
                r.clear();
                buffers.pl2 = mem::take(r);
            }
            ("PL3", Payload::Int32Vec(r)) => {
                r.clear();
                buffers.pl3 = mem::take(r);
            }
            _ => {}
        }
    }
}

/// Decode-side inverse: reassemble `AD` and `PL` from the split fields, at
/// the position the first child occupies. Records without split fields pass
/// through untouched.
pub fn unsplit_record(record: &mut Record) -> Result<(), DeltaError> {
    let n_alts = record.n_alts();
    unsplit_ad(record)?;
    unsplit_pl(record, n_alts)?;
    Ok(())
}

fn scalar_int_view(payload: &Payload) -> Option<Vec<i32>> {
    match payload {
        Payload::Int8(v) => Some(v.iter().map(|&x| crate::model::widen_i8(x)).collect()),
        Payload::Int16(v) => Some(v.iter().map(|&x| crate::model::widen_i16(x)).collect()),
        Payload::Int32(v) => Some(v.clone()),
        _ => None,
    }
}

fn unsplit_ad(record: &mut Record) -> Result<(), DeltaError> {
    let Some(ref_idx) = record.genotype_position("AD_REF") else {
        return Ok(());
    };
    let alt_idx = record.genotype_position("AD_ALT").ok_or_else(|| {
        DeltaError::Unsupported("record carries AD_REF without AD_ALT".to_string())
    })?;

    let ad_ref = scalar_int_view(&record.genotypes[ref_idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("AD_REF field is not an integer scalar".to_string())
    })?;
    let ad_alt = IntRows::from_payload(&record.genotypes[alt_idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("AD_ALT field is not a collection of integers".to_string())
    })?;

    if ad_alt.n_rows() != ad_ref.len() {
        return Err(DeltaError::ShapeAssertion {
            id: "AD_ALT".to_string(),
            entries: ad_alt.n_rows(),
            samples: ad_ref.len(),
        });
    }

    let mut merged = Ragged::with_capacity(ad_ref.len(), ad_ref.len() + ad_alt.total_len());
    for (i, &ref_val) in ad_ref.iter().enumerate() {
        merged.push_row_iter(
            std::iter::once(ref_val).chain((0..ad_alt.row_len(i)).map(|j| ad_alt.at(i, j))),
        );
    }

    record.genotypes[ref_idx] = GenotypeField {
        id: "AD".to_string(),
        payload: Payload::Int32Vec(merged),
    };
    record.genotypes.remove(alt_idx);
    Ok(())
}

fn unsplit_pl(record: &mut Record, n_alts: usize) -> Result<(), DeltaError> {
    let Some(pl1_idx) = record.genotype_position("PL1") else {
        return Ok(());
    };
    let (Some(pl2_idx), Some(pl3_idx)) = (
        record.genotype_position("PL2"),
        record.genotype_position("PL3"),
    ) else {
        return Err(DeltaError::Unsupported(
            "record carries PL1 without PL2/PL3".to_string(),
        ));
    };

    let pl1 = scalar_int_view(&record.genotypes[pl1_idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("PL1 field is not an integer scalar".to_string())
    })?;
    let pl2 = IntRows::from_payload(&record.genotypes[pl2_idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("PL2 field is not a collection of integers".to_string())
    })?;
    let pl3 = IntRows::from_payload(&record.genotypes[pl3_idx].payload).ok_or_else(|| {
        DeltaError::Unsupported("PL3 field is not a collection of integers".to_string())
    })?;

    let pl_size = vcf_gt_index(n_alts, n_alts) + 1;
    let mut merged = Ragged::with_capacity(pl1.len(), pl1.len() * pl_size);

    for (i, &first) in pl1.iter().enumerate() {
        let empty = pl2.row_len(i) == 0 && pl3.row_len(i) == 0;
        if first == MISSING_I32 && empty {
            merged.push_empty_row();
            continue;
        }
        dim_eq("PL2", i, n_alts, pl2.row_len(i))?;
        dim_eq("PL3", i, pl_size - 1 - n_alts, pl3.row_len(i))?;

        let mut row = vec![0i32; pl_size];
        row[0] = first;
        for k in 1..=n_alts {
            row[vcf_gt_index(0, k)] = pl2.at(i, k - 1);
        }
        let mut next = 0;
        for j in 1..=n_alts {
            for k in j..=n_alts {
                row[vcf_gt_index(j, k)] = pl3.at(i, next);
                next += 1;
            }
        }
        merged.push_row_iter(row);
    }

    record.genotypes[pl1_idx] = GenotypeField {
        id: "PL".to_string(),
        payload: Payload::Int32Vec(merged),
    };
    // Remove the later child first so the earlier index stays valid.
    let (a, b) = (pl2_idx.max(pl3_idx), pl2_idx.min(pl3_idx));
    record.genotypes.remove(a);
    record.genotypes.remove(b);
    Ok(())
}

fn dim_eq(id: &str, sample: usize, expected: usize, actual: usize) -> Result<(), DeltaError> {
    if actual == expected {
        Ok(())
    } else {
        Err(DeltaError::DimensionMismatch {
            id: id.to_string(),
            sample,
            expected,
            actual,
        })
    }
}
