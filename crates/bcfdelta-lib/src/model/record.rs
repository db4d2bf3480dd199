use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;

use super::value::Payload;

/// One FORMAT field of a record: its id and per-sample payload.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeField {
    pub id: String,
    pub payload: Payload,
}

/// A decoded variant record, owned by the transformation engine.
///
/// The io layer converts library record buffers into this shape and back;
/// the engine mutates genotype payloads and the info vector in place.
/// `pos` is 1-based; 0 means unset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    pub chrom: String,
    pub pos: i64,
    pub ids: Vec<String>,
    pub reference_bases: String,
    pub alts: Vec<String>,
    pub qual: Option<f32>,
    pub filters: Vec<String>,
    pub info: Vec<(String, Option<InfoValue>)>,
    pub genotypes: Vec<GenotypeField>,
}

impl Record {
    /// The initial anchor slot value: guaranteed to differ from any real
    /// record in both chromosome and bucket.
    pub fn sentinel() -> Self {
        Self {
            chrom: "invalid".to_string(),
            pos: -1,
            ..Self::default()
        }
    }

    pub fn n_alts(&self) -> usize {
        self.alts.len()
    }

    pub fn has_info(&self, id: &str) -> bool {
        self.info.iter().any(|(k, _)| k == id)
    }

    pub fn push_info_flag(&mut self, id: &str) {
        self.info.push((id.to_string(), Some(InfoValue::Flag)));
    }

    pub fn genotype(&self, id: &str) -> Option<&GenotypeField> {
        self.genotypes.iter().find(|g| g.id == id)
    }

    pub fn genotype_position(&self, id: &str) -> Option<usize> {
        self.genotypes.iter().position(|g| g.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_never_matches_real_records() {
        let s = Record::sentinel();
        assert_eq!(s.chrom, "invalid");
        assert_eq!(s.pos, -1);
        assert!(s.genotypes.is_empty());
    }

    #[test]
    fn test_info_flag_push_and_lookup() {
        let mut r = Record::default();
        assert!(!r.has_info("DELTA_REF"));
        r.push_info_flag("DELTA_REF");
        assert!(r.has_info("DELTA_REF"));
    }
}
