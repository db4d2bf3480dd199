//! Header mutation protocol: the `DELTA_REF`/`DELTA_COMP` info flags, the
//! per-format `Encoding=Delta` markers, and the split-field definitions.

use noodles::vcf::header::record::value::map::{self, Format, Info, Map};
use noodles::vcf::Header;
use rustc_hash::FxHashMap;

use crate::cli::EncodeConfig;
use crate::delta::FieldNumber;
use crate::error::DeltaError;

pub const DELTA_REF: &str = "DELTA_REF";
pub const DELTA_COMP: &str = "DELTA_COMP";

const DELTA_REF_DESC: &str = "This record is an 'anchor' for subsequent compressed records.";
const DELTA_COMP_DESC: &str = "Records with this flag have delta-compressed fields.";

const ENCODING_KEY: &str = "Encoding";
const ENCODING_DELTA: &str = "Delta";

const AD_REF_DESC: &str = "REF entry of AD field.";
const AD_ALT_DESC: &str = "ALT entries of AD field.";
const PL1_DESC: &str = "PL values for 00.";
const PL2_DESC: &str = "PL values for ab where a == 0 and b >= 1.";
const PL3_DESC: &str = "PL values for ab where a >= 1 and b >= 1.";

macro_rules! format_other_tag {
    ($name:expr) => {
        match map::format::Tag::from(String::from($name)) {
            map::format::Tag::Other(tag) => tag,
            // "Encoding" is not a standard FORMAT tag.
            _ => unreachable!(),
        }
    };
}

fn split_format_defs() -> [(&'static str, Map<Format>); 5] {
    use map::format::{Number, Type};
    [
        (
            "AD_REF",
            Map::<Format>::new(Number::Count(1), Type::Integer, AD_REF_DESC),
        ),
        (
            "AD_ALT",
            Map::<Format>::new(Number::AlternateBases, Type::Integer, AD_ALT_DESC),
        ),
        (
            "PL1",
            Map::<Format>::new(Number::Count(1), Type::Integer, PL1_DESC),
        ),
        (
            "PL2",
            Map::<Format>::new(Number::AlternateBases, Type::Integer, PL2_DESC),
        ),
        (
            "PL3",
            Map::<Format>::new(Number::Unknown, Type::Integer, PL3_DESC),
        ),
    ]
}

/// Rewrite the output header for encoding: plant the anchor/delta info flags,
/// mark eligible formats with `Encoding=Delta`, and declare the split fields.
///
/// The split definitions go in before the eligibility pass so they are
/// themselves marked delta-eligible.
pub fn prepare_encode_header(header: &mut Header, config: &EncodeConfig) -> Result<(), DeltaError> {
    if config.split_fields {
        for (id, def) in split_format_defs() {
            if header.formats().contains_key(id) {
                return Err(DeltaError::HeaderConflict(format!(
                    "the input file already defines the split field {id}"
                )));
            }
            header.formats_mut().insert(id.to_string(), def);
        }
    }

    if config.delta_compress {
        if header.infos().contains_key(DELTA_REF) || header.infos().contains_key(DELTA_COMP) {
            return Err(DeltaError::HeaderConflict(
                "the input file seems to be delta-compressed already".to_string(),
            ));
        }

        use map::info::{Number, Type};
        header.infos_mut().insert(
            DELTA_COMP.to_string(),
            Map::<Info>::new(Number::Count(0), Type::Flag, DELTA_COMP_DESC),
        );
        header.infos_mut().insert(
            DELTA_REF.to_string(),
            Map::<Info>::new(Number::Count(0), Type::Flag, DELTA_REF_DESC),
        );

        let encoding = format_other_tag!(ENCODING_KEY);
        for (_, format) in header.formats_mut().iter_mut() {
            let eligible = match format.ty() {
                map::format::Type::Integer => config.compress_ints,
                map::format::Type::Float => config.compress_floats,
                map::format::Type::Character => config.compress_chars,
                // Strings are never delta-compressed.
                _ => false,
            };
            if eligible {
                format
                    .other_fields_mut()
                    .insert(encoding.clone(), ENCODING_DELTA.to_string());
            }
        }
    }

    Ok(())
}

/// Rewrite the output header for decoding: require and remove the markers,
/// strip every format's `Encoding` key, and drop the split definitions this
/// tool plants (a file that owns an unrelated `PL1` keeps it).
pub fn prepare_decode_header(header: &mut Header) -> Result<(), DeltaError> {
    if !header.infos().contains_key(DELTA_REF) || !header.infos().contains_key(DELTA_COMP) {
        return Err(DeltaError::HeaderConflict(
            "the input file does not seem to be delta-compressed".to_string(),
        ));
    }

    header.infos_mut().shift_remove(DELTA_REF);
    header.infos_mut().shift_remove(DELTA_COMP);

    let encoding = format_other_tag!(ENCODING_KEY);
    for (_, format) in header.formats_mut().iter_mut() {
        format.other_fields_mut().shift_remove(&encoding);
    }

    for (id, def) in split_format_defs() {
        let planted = header
            .formats()
            .get(id)
            .is_some_and(|f| f.description() == def.description());
        if planted {
            header.formats_mut().shift_remove(id);
        }
    }

    Ok(())
}

/// Per-field transformation spec, resolved once per header: the interpreted
/// `Number` tag and whether the format is marked `Encoding=Delta`.
pub struct FieldSpec {
    pub number: FieldNumber,
    pub delta: bool,
}

pub struct FormatSpecs(FxHashMap<String, FieldSpec>);

impl FormatSpecs {
    pub fn from_header(header: &Header) -> Self {
        let encoding = format_other_tag!(ENCODING_KEY);
        let mut specs = FxHashMap::default();
        for (id, format) in header.formats() {
            let number = match format.number() {
                map::format::Number::Count(n) => FieldNumber::Count(n),
                map::format::Number::AlternateBases => FieldNumber::Alt,
                map::format::Number::ReferenceAlternateBases => FieldNumber::RefAlt,
                map::format::Number::Samples => FieldNumber::Genotypes,
                _ => FieldNumber::Unknown,
            };
            let delta = format
                .other_fields()
                .get(&encoding)
                .is_some_and(|v| v.as_str() == ENCODING_DELTA);
            specs.insert(id.clone(), FieldSpec { number, delta });
        }
        Self(specs)
    }

    pub fn get(&self, id: &str) -> Option<&FieldSpec> {
        self.0.get(id)
    }
}
