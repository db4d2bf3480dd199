use crate::error::DeltaError;
use crate::model::{widen_i16, widen_i8, Payload, Ragged, MISSING_CHAR, MISSING_I32};

use super::{vcf_gt_index, FieldNumber};

/// Which half of the inverse pair is running. Integers and chars subtract on
/// encode and add on decode; floats XOR in both directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Encode,
    Decode,
}

/// Read-only view over an integer scalar payload of any width, yielding `i32`
/// with missing-ness carried across the width change.
pub(crate) enum IntSlice<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
}

impl IntSlice<'_> {
    fn len(&self) -> usize {
        match self {
            IntSlice::I8(s) => s.len(),
            IntSlice::I16(s) => s.len(),
            IntSlice::I32(s) => s.len(),
        }
    }

    pub(crate) fn get(&self, i: usize) -> i32 {
        match self {
            IntSlice::I8(s) => widen_i8(s[i]),
            IntSlice::I16(s) => widen_i16(s[i]),
            IntSlice::I32(s) => s[i],
        }
    }
}

/// The ragged counterpart of [`IntSlice`].
pub(crate) enum IntRows<'a> {
    I8(&'a Ragged<i8>),
    I16(&'a Ragged<i16>),
    I32(&'a Ragged<i32>),
}

impl<'a> IntRows<'a> {
    pub(crate) fn from_payload(payload: &'a Payload) -> Option<Self> {
        match payload {
            Payload::Int8Vec(r) => Some(IntRows::I8(r)),
            Payload::Int16Vec(r) => Some(IntRows::I16(r)),
            Payload::Int32Vec(r) => Some(IntRows::I32(r)),
            _ => None,
        }
    }
}

/// Anchor-side access for the scalar kernel.
trait ColSource {
    type Elem: Copy;
    fn len(&self) -> usize;
    fn get(&self, i: usize) -> Self::Elem;
}

impl<T: Copy> ColSource for [T] {
    type Elem = T;

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn get(&self, i: usize) -> T {
        self[i]
    }
}

impl ColSource for IntSlice<'_> {
    type Elem = i32;

    fn len(&self) -> usize {
        IntSlice::len(self)
    }

    fn get(&self, i: usize) -> i32 {
        IntSlice::get(self, i)
    }
}

/// Anchor-side access for the vector kernel.
pub(crate) trait RowSource {
    type Elem: Copy;
    fn n_rows(&self) -> usize;
    fn row_len(&self, i: usize) -> usize;
    fn at(&self, i: usize, j: usize) -> Self::Elem;
    fn total_len(&self) -> usize;
    fn flat_at(&self, k: usize) -> Self::Elem;
}

impl<T: Copy> RowSource for Ragged<T> {
    type Elem = T;

    fn n_rows(&self) -> usize {
        self.len()
    }

    fn row_len(&self, i: usize) -> usize {
        Ragged::row_len(self, i)
    }

    fn at(&self, i: usize, j: usize) -> T {
        self.row(i)[j]
    }

    fn total_len(&self) -> usize {
        Ragged::total_len(self)
    }

    fn flat_at(&self, k: usize) -> T {
        self.data()[k]
    }
}

impl RowSource for IntRows<'_> {
    type Elem = i32;

    fn n_rows(&self) -> usize {
        match self {
            IntRows::I8(r) => r.len(),
            IntRows::I16(r) => r.len(),
            IntRows::I32(r) => r.len(),
        }
    }

    fn row_len(&self, i: usize) -> usize {
        match self {
            IntRows::I8(r) => r.row_len(i),
            IntRows::I16(r) => r.row_len(i),
            IntRows::I32(r) => r.row_len(i),
        }
    }

    fn at(&self, i: usize, j: usize) -> i32 {
        match self {
            IntRows::I8(r) => widen_i8(r.row(i)[j]),
            IntRows::I16(r) => widen_i16(r.row(i)[j]),
            IntRows::I32(r) => r.row(i)[j],
        }
    }

    fn total_len(&self) -> usize {
        match self {
            IntRows::I8(r) => r.total_len(),
            IntRows::I16(r) => r.total_len(),
            IntRows::I32(r) => r.total_len(),
        }
    }

    fn flat_at(&self, k: usize) -> i32 {
        match self {
            IntRows::I8(r) => widen_i8(r.data()[k]),
            IntRows::I16(r) => widen_i16(r.data()[k]),
            IntRows::I32(r) => r.data()[k],
        }
    }
}

fn int_op(direction: Direction) -> impl Fn(&mut i32, i32) {
    move |cur, last| {
        if *cur == MISSING_I32 || last == MISSING_I32 {
            return;
        }
        *cur = match direction {
            Direction::Encode => cur.wrapping_sub(last),
            Direction::Decode => cur.wrapping_add(last),
        };
    }
}

fn char_op(direction: Direction) -> impl Fn(&mut u8, u8) {
    move |cur, last| {
        if *cur == MISSING_CHAR || last == MISSING_CHAR {
            return;
        }
        *cur = match direction {
            Direction::Encode => cur.wrapping_sub(last),
            Direction::Decode => cur.wrapping_add(last),
        };
    }
}

// Floats are never subtracted; XOR of the bit patterns is its own inverse and
// round-trips NaNs and signed zeros exactly.
fn float_op() -> impl Fn(&mut f32, f32) {
    |cur, last| *cur = f32::from_bits(cur.to_bits() ^ last.to_bits())
}

/// Pairs one anchor payload with one current payload and applies the element
/// operation across matched dimensions, following the field's `Number` tag.
///
/// Integer current payloads must already be promoted to i32 (see
/// [`super::promote`]); the anchor side keeps its original width.
pub struct DeltaVisitor<'a> {
    pub id: &'a str,
    pub number: FieldNumber,
    pub n_alts: usize,
    pub n_samples: usize,
    pub skip_problematic: bool,
    pub direction: Direction,
}

impl DeltaVisitor<'_> {
    pub fn apply(&self, last: &Payload, cur: &mut Payload) -> Result<(), DeltaError> {
        use Payload as P;

        match (last, cur) {
            (P::Int8(l), P::Int32(c)) => self.scalar(&IntSlice::I8(l), c, int_op(self.direction)),
            (P::Int16(l), P::Int32(c)) => self.scalar(&IntSlice::I16(l), c, int_op(self.direction)),
            (P::Int32(l), P::Int32(c)) => self.scalar(&IntSlice::I32(l), c, int_op(self.direction)),
            (P::Float(l), P::Float(c)) => self.scalar(l.as_slice(), c, float_op()),
            (P::Char(l), P::Char(c)) => self.scalar(l.as_slice(), c, char_op(self.direction)),
            (P::Int8Vec(l), P::Int32Vec(c)) => {
                self.ragged(&IntRows::I8(l), c, int_op(self.direction), true)
            }
            (P::Int16Vec(l), P::Int32Vec(c)) => {
                self.ragged(&IntRows::I16(l), c, int_op(self.direction), true)
            }
            (P::Int32Vec(l), P::Int32Vec(c)) => {
                self.ragged(&IntRows::I32(l), c, int_op(self.direction), true)
            }
            (P::FloatVec(l), P::FloatVec(c)) => self.ragged(l, c, float_op(), true),
            (P::CharVec(l), P::CharVec(c)) => self.ragged(l, c, char_op(self.direction), false),
            (P::String(_) | P::StringVec(_), _) | (_, P::String(_) | P::StringVec(_)) => {
                Err(DeltaError::Unsupported(format!(
                    "genotype field {}: string payloads cannot be delta-compressed",
                    self.id
                )))
            }
            _ => Err(DeltaError::IncompatibleTypes {
                id: self.id.to_string(),
            }),
        }
    }

    fn check_shape(&self, entries: usize) -> Result<(), DeltaError> {
        if entries > self.n_samples {
            return Err(DeltaError::ShapeAssertion {
                id: self.id.to_string(),
                entries,
                samples: self.n_samples,
            });
        }
        Ok(())
    }

    /// Inner-length check under the `skip_problematic` policy: `Ok(false)`
    /// means "skip this sample", which must stay symmetric between encode and
    /// decode.
    fn dim_ok(&self, sample: usize, expected: usize, actual: usize) -> Result<bool, DeltaError> {
        if actual == expected {
            return Ok(true);
        }
        if self.skip_problematic {
            Ok(false)
        } else {
            Err(DeltaError::DimensionMismatch {
                id: self.id.to_string(),
                sample,
                expected,
                actual,
            })
        }
    }

    fn scalar<S>(
        &self,
        last: &S,
        cur: &mut [S::Elem],
        op: impl Fn(&mut S::Elem, S::Elem),
    ) -> Result<(), DeltaError>
    where
        S: ColSource + ?Sized,
    {
        if self.number != FieldNumber::Count(1) {
            return Err(DeltaError::IncompatibleTypes {
                id: self.id.to_string(),
            });
        }

        let n_sample = last.len().min(cur.len());
        self.check_shape(n_sample)?;

        for j in 0..n_sample {
            op(&mut cur[j], last.get(j));
        }
        Ok(())
    }

    fn ragged<S: RowSource>(
        &self,
        last: &S,
        cur: &mut Ragged<S::Elem>,
        op: impl Fn(&mut S::Elem, S::Elem),
        allow_fast: bool,
    ) -> Result<(), DeltaError> {
        let n_sample = last.n_rows().min(cur.len());
        self.check_shape(n_sample)?;

        // If the flat concatenations line up, operate on them directly and
        // skip the per-inner-length dispatch. Inner lengths are not checked
        // here; the inverse reproduces the same shape by construction. Char
        // payloads always take the checked path.
        if allow_fast && last.n_rows() == cur.len() && last.total_len() == cur.total_len() {
            let data = cur.data_mut();
            for k in 0..data.len() {
                op(&mut data[k], last.flat_at(k));
            }
            return Ok(());
        }

        match self.number {
            FieldNumber::Count(0) => Err(DeltaError::Unsupported(format!(
                "genotype field {} is declared as a flag and has no payload",
                self.id
            ))),
            FieldNumber::Count(1) => Err(DeltaError::IncompatibleTypes {
                id: self.id.to_string(),
            }),
            FieldNumber::Count(n) => {
                for i in 0..n_sample {
                    if !self.dim_ok(i, n, last.row_len(i))? {
                        continue;
                    }
                    if !self.dim_ok(i, n, cur.row_len(i))? {
                        continue;
                    }
                    let row = cur.row_mut(i);
                    for (j, v) in row.iter_mut().enumerate() {
                        op(v, last.at(i, j));
                    }
                }
                Ok(())
            }
            FieldNumber::Alt => {
                for i in 0..n_sample {
                    if !self.dim_ok(i, 1, last.row_len(i))? {
                        continue;
                    }
                    if !self.dim_ok(i, self.n_alts, cur.row_len(i))? {
                        continue;
                    }
                    let base = last.at(i, 0);
                    for v in cur.row_mut(i).iter_mut() {
                        op(v, base);
                    }
                }
                Ok(())
            }
            FieldNumber::RefAlt => {
                for i in 0..n_sample {
                    if !self.dim_ok(i, 2, last.row_len(i))? {
                        continue;
                    }
                    if !self.dim_ok(i, self.n_alts + 1, cur.row_len(i))? {
                        continue;
                    }
                    let ref_val = last.at(i, 0);
                    let alt_val = last.at(i, 1);
                    let row = cur.row_mut(i);
                    op(&mut row[0], ref_val);
                    for v in row[1..].iter_mut() {
                        op(v, alt_val);
                    }
                }
                Ok(())
            }
            FieldNumber::Genotypes => {
                let inner = vcf_gt_index(self.n_alts, self.n_alts) + 1;
                for i in 0..n_sample {
                    if !self.dim_ok(i, 3, last.row_len(i))? {
                        continue;
                    }
                    if !self.dim_ok(i, inner, cur.row_len(i))? {
                        continue;
                    }
                    let hom_ref = last.at(i, 0);
                    let het = last.at(i, 1);
                    let hom_alt = last.at(i, 2);
                    let row = cur.row_mut(i);
                    // (0, 0) pairs with the anchor's first value.
                    op(&mut row[0], hom_ref);
                    // (0, k >= 1) with the second.
                    for k in 1..=self.n_alts {
                        op(&mut row[vcf_gt_index(0, k)], het);
                    }
                    // (j >= 1, k >= j) with the third.
                    for j in 1..=self.n_alts {
                        for k in j..=self.n_alts {
                            op(&mut row[vcf_gt_index(j, k)], hom_alt);
                        }
                    }
                }
                Ok(())
            }
            FieldNumber::Unknown => {
                if self.n_alts == 1 {
                    for i in 0..n_sample {
                        // Variable arity: nothing can be assumed, only pair
                        // samples whose lengths happen to agree.
                        if last.row_len(i) != cur.row_len(i) {
                            continue;
                        }
                        let row = cur.row_mut(i);
                        for (j, v) in row.iter_mut().enumerate() {
                            op(v, last.at(i, j));
                        }
                    }
                } else if self.id == "PL3" {
                    // The anchor holds one value per sample, broadcast over
                    // the whole current row.
                    for i in 0..n_sample {
                        if last.row_len(i) != 1 {
                            continue;
                        }
                        let base = last.at(i, 0);
                        for v in cur.row_mut(i).iter_mut() {
                            op(v, base);
                        }
                    }
                }
                // Anything else cannot be compressed.
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{missing_f32, MISSING_I16, MISSING_I8};

    fn visitor(number: FieldNumber, n_alts: usize, direction: Direction) -> DeltaVisitor<'static> {
        DeltaVisitor {
            id: "XX",
            number,
            n_alts,
            n_samples: 16,
            skip_problematic: true,
            direction,
        }
    }

    fn ragged_i32(rows: &[&[i32]]) -> Ragged<i32> {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_scalar_int_roundtrip_with_missing() {
        let last = Payload::Int32(vec![10, MISSING_I32, 7]);
        let original = vec![12, 5, MISSING_I32];
        let mut cur = Payload::Int32(original.clone());

        visitor(FieldNumber::Count(1), 1, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32(vec![2, 5, MISSING_I32]));

        visitor(FieldNumber::Count(1), 1, Direction::Decode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32(original));
    }

    #[test]
    fn test_scalar_narrow_anchor_widths() {
        let last = Payload::Int8(vec![100, MISSING_I8]);
        let mut cur = Payload::Int32(vec![110, 4]);

        visitor(FieldNumber::Count(1), 1, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        // The missing i8 anchor acts as zero, not as -128.
        assert_eq!(cur, Payload::Int32(vec![10, 4]));

        let last16 = Payload::Int16(vec![1000, MISSING_I16]);
        let mut cur16 = Payload::Int32(vec![1010, 4]);
        visitor(FieldNumber::Count(1), 1, Direction::Encode)
            .apply(&last16, &mut cur16)
            .unwrap();
        assert_eq!(cur16, Payload::Int32(vec![10, 4]));
    }

    #[test]
    fn test_float_xor_is_involutive_on_nan_and_zero() {
        let last = Payload::Float(vec![1.5, -0.0, f32::NAN, missing_f32()]);
        let original = vec![2.5, 0.0, 3.0, f32::from_bits(0xFFC0_0001)];
        let mut cur = Payload::Float(original.clone());

        let enc = visitor(FieldNumber::Count(1), 1, Direction::Encode);
        enc.apply(&last, &mut cur).unwrap();
        let dec = visitor(FieldNumber::Count(1), 1, Direction::Decode);
        dec.apply(&last, &mut cur).unwrap();

        assert_eq!(cur, Payload::Float(original));
    }

    #[test]
    fn test_char_delta_respects_missing() {
        let last = Payload::Char(vec![b'A', b'.', b'C']);
        let original = vec![b'C', b'G', b'.'];
        let mut cur = Payload::Char(original.clone());

        visitor(FieldNumber::Count(1), 1, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Char(vec![2, b'G', b'.']));

        visitor(FieldNumber::Count(1), 1, Direction::Decode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Char(original));
    }

    #[test]
    fn test_fast_path_on_matching_shapes() {
        // Declared Number=A, but shapes match flat: the concats are paired
        // directly without inner-length checks.
        let last = Payload::Int32Vec(ragged_i32(&[&[1, 2], &[3, 4]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[5, 6], &[7, 8]]));

        visitor(FieldNumber::Alt, 2, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32Vec(ragged_i32(&[&[4, 4], &[4, 4]])));
    }

    #[test]
    fn test_alt_broadcast_roundtrip() {
        // Anchor rows have one value; current rows have n_alts values.
        let last = Payload::Int32Vec(ragged_i32(&[&[10], &[20]]));
        let original = ragged_i32(&[&[11, 13], &[25, MISSING_I32]]);
        let mut cur = Payload::Int32Vec(original.clone());

        visitor(FieldNumber::Alt, 2, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(
            cur,
            Payload::Int32Vec(ragged_i32(&[&[1, 3], &[5, MISSING_I32]]))
        );

        visitor(FieldNumber::Alt, 2, Direction::Decode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32Vec(original));
    }

    #[test]
    fn test_ref_alt_pairing() {
        let last = Payload::Int32Vec(ragged_i32(&[&[100, 50]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[102, 51, 53]]));

        visitor(FieldNumber::RefAlt, 2, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32Vec(ragged_i32(&[&[2, 1, 3]])));
    }

    #[test]
    fn test_genotypes_broadcast_over_triple() {
        // Anchor is bi-allelic (3 likelihoods); current has 3 alts (10).
        let last = Payload::Int32Vec(ragged_i32(&[&[0, 30, 60]]));
        let original = ragged_i32(&[&[1, 31, 61, 32, 62, 63, 33, 64, 65, 66]]);
        let mut cur = Payload::Int32Vec(original.clone());

        visitor(FieldNumber::Genotypes, 3, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(
            cur,
            Payload::Int32Vec(ragged_i32(&[&[1, 1, 1, 2, 2, 3, 3, 4, 5, 6]]))
        );

        visitor(FieldNumber::Genotypes, 3, Direction::Decode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(cur, Payload::Int32Vec(original));
    }

    #[test]
    fn test_unknown_number_pairs_equal_lengths_when_biallelic() {
        let last = Payload::Int32Vec(ragged_i32(&[&[5, 5], &[9]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[7, 8], &[1, 2]]));

        visitor(FieldNumber::Unknown, 1, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        // Sample 0 pairs; sample 1 lengths disagree and is left untouched.
        assert_eq!(cur, Payload::Int32Vec(ragged_i32(&[&[2, 3], &[1, 2]])));
    }

    #[test]
    fn test_pl3_broadcasts_single_anchor_value() {
        let last = Payload::Int32Vec(ragged_i32(&[&[40]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[41, 42, 43]]));

        let enc = DeltaVisitor {
            id: "PL3",
            ..visitor(FieldNumber::Unknown, 2, Direction::Encode)
        };
        enc.apply(&last, &mut cur).unwrap();
        assert_eq!(cur, Payload::Int32Vec(ragged_i32(&[&[1, 2, 3]])));
    }

    #[test]
    fn test_dimension_mismatch_skipped_or_fatal() {
        let last = Payload::Int32Vec(ragged_i32(&[&[10], &[20, 21]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[11, 12], &[22, 23, 24]]));

        // Permissive: sample 1's anchor row is not length 1, so it is skipped.
        visitor(FieldNumber::Alt, 2, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(
            cur,
            Payload::Int32Vec(ragged_i32(&[&[1, 2], &[22, 23, 24]]))
        );

        // Strict: the same mismatch is fatal.
        let strict = DeltaVisitor {
            skip_problematic: false,
            ..visitor(FieldNumber::Alt, 2, Direction::Encode)
        };
        let mut cur2 = Payload::Int32Vec(ragged_i32(&[&[11, 12], &[22, 23, 24]]));
        let err = strict.apply(&last, &mut cur2).unwrap_err();
        assert!(matches!(
            err,
            DeltaError::DimensionMismatch {
                sample: 1,
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_shape_assertion_on_excess_entries() {
        let last = Payload::Int32(vec![1, 2, 3]);
        let mut cur = Payload::Int32(vec![1, 2, 3]);
        let v = DeltaVisitor {
            n_samples: 2,
            ..visitor(FieldNumber::Count(1), 1, Direction::Encode)
        };
        assert!(matches!(
            v.apply(&last, &mut cur),
            Err(DeltaError::ShapeAssertion { entries: 3, samples: 2, .. })
        ));
    }

    #[test]
    fn test_incompatible_categories_fail() {
        let last = Payload::Float(vec![1.0]);
        let mut cur = Payload::Int32(vec![1]);
        assert!(matches!(
            visitor(FieldNumber::Count(1), 1, Direction::Encode).apply(&last, &mut cur),
            Err(DeltaError::IncompatibleTypes { .. })
        ));

        // Scalar vs vector is a dimensionality conflict.
        let last = Payload::Int32Vec(ragged_i32(&[&[1]]));
        let mut cur = Payload::Int32(vec![1]);
        assert!(matches!(
            visitor(FieldNumber::Count(1), 1, Direction::Encode).apply(&last, &mut cur),
            Err(DeltaError::IncompatibleTypes { .. })
        ));
    }

    #[test]
    fn test_string_payloads_are_unsupported() {
        let last = Payload::String(vec!["a".into()]);
        let mut cur = Payload::String(vec!["b".into()]);
        assert!(matches!(
            visitor(FieldNumber::Count(1), 1, Direction::Encode).apply(&last, &mut cur),
            Err(DeltaError::Unsupported(_))
        ));
    }

    #[test]
    fn test_char_rows_never_take_fast_path() {
        // Identical shapes, but the declared number is scalar: for chars the
        // checked path runs and reports the dimensionality conflict instead
        // of silently pairing the concats.
        let last = Payload::CharVec(vec![vec![b'A', b'C']].into_iter().collect());
        let mut cur = Payload::CharVec(vec![vec![b'C', b'G']].into_iter().collect());
        assert!(matches!(
            visitor(FieldNumber::Count(1), 1, Direction::Encode).apply(&last, &mut cur),
            Err(DeltaError::IncompatibleTypes { .. })
        ));
    }

    #[test]
    fn test_fixed_count_pairs_elementwise() {
        let last = Payload::Int32Vec(ragged_i32(&[&[1, 2, 3], &[4, 5]]));
        let mut cur = Payload::Int32Vec(ragged_i32(&[&[2, 4, 6], &[5, 6, 7]]));

        // Sample 1 has the wrong length on both sides and is skipped.
        visitor(FieldNumber::Count(3), 1, Direction::Encode)
            .apply(&last, &mut cur)
            .unwrap();
        assert_eq!(
            cur,
            Payload::Int32Vec(ragged_i32(&[&[1, 2, 3], &[5, 6, 7]]))
        );
    }
}
