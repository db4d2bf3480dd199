//! Conversion between the library record buffer and the engine's typed
//! [`Record`] model.
//!
//! Integer series are narrowed to the smallest width whose non-reserved range
//! holds every value, which restores the width structure BCF carries on the
//! wire; missing entries become that width's sentinel. The inverse mapping
//! runs on write.

use anyhow::{anyhow, bail, Context, Result};
use noodles::core::Position;
use noodles::vcf::header::record::value::map::{self, Format, Map};
use noodles::vcf::header::FileFormat;
use noodles::vcf::variant::record::samples::series::value::genotype::Phasing;
use noodles::vcf::variant::record_buf::samples::sample::value::{Array, Genotype};
use noodles::vcf::variant::record_buf::samples::sample::Value;
use noodles::vcf::variant::record_buf::samples::Keys;
use noodles::vcf::variant::record_buf::{AlternateBases, Samples};
use noodles::vcf::variant::RecordBuf;
use noodles::vcf::Header;

use crate::model::{
    f32_is_missing, missing_f32, GenotypeField, Payload, Ragged, Record, MISSING_CHAR,
    MISSING_I16, MISSING_I32, MISSING_I8,
};

const VCF_4_4: FileFormat = FileFormat::new(4, 4);

// BCF reserves the low end of each integer width for missing and
// end-of-vector values.
fn fits_i8(v: i32) -> bool {
    (-120..=127).contains(&v)
}

fn fits_i16(v: i32) -> bool {
    (-32760..=32767).contains(&v)
}

pub fn from_record_buf(buf: &RecordBuf, header: &Header) -> Result<Record> {
    let n_samples = header.sample_names().len();

    let mut genotypes = Vec::new();
    for key in buf.samples().keys().as_ref().iter() {
        let format = header
            .formats()
            .get(key)
            .with_context(|| format!("FORMAT {key} is not declared in the header"))?;

        let cells: Vec<Option<&Value>> = (0..n_samples)
            .map(|i| {
                buf.samples()
                    .get_index(i)
                    .and_then(|sample| sample.get(key.as_str()))
                    .flatten()
            })
            .collect();

        let payload = build_payload(key, format, &cells, header.file_format())?;
        genotypes.push(GenotypeField {
            id: key.clone(),
            payload,
        });
    }

    Ok(Record {
        chrom: buf.reference_sequence_name().to_string(),
        pos: buf.variant_start().map(|p| p.get() as i64).unwrap_or(0),
        ids: buf.ids().as_ref().iter().cloned().collect(),
        reference_bases: buf.reference_bases().to_string(),
        alts: buf.alternate_bases().as_ref().to_vec(),
        qual: buf.quality_score(),
        filters: buf.filters().as_ref().iter().cloned().collect(),
        info: buf
            .info()
            .as_ref()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        genotypes,
    })
}

fn build_payload(
    key: &str,
    format: &Map<Format>,
    cells: &[Option<&Value>],
    file_format: FileFormat,
) -> Result<Payload> {
    if key == "GT" {
        let mut out = Vec::with_capacity(cells.len());
        for cell in cells {
            out.push(match cell {
                None => ".".to_string(),
                Some(Value::Genotype(genotype)) => genotype_to_string(genotype, file_format),
                Some(Value::String(s)) => s.clone(),
                Some(other) => bail!("unexpected GT value {other:?}"),
            });
        }
        return Ok(Payload::String(out));
    }

    let scalar = matches!(format.number(), map::format::Number::Count(1));
    match (format.ty(), scalar) {
        (map::format::Type::Integer, true) => {
            let mut values = Vec::with_capacity(cells.len());
            for (i, cell) in cells.iter().enumerate() {
                values.push(match cell {
                    None => None,
                    Some(Value::Integer(x)) => Some(*x),
                    Some(other) => bail!("sample {i}: FORMAT {key} is not an integer: {other:?}"),
                });
            }
            Ok(narrow_scalar_ints(&values))
        }
        (map::format::Type::Integer, false) => {
            let mut rows: Vec<Vec<Option<i32>>> = Vec::with_capacity(cells.len());
            for (i, cell) in cells.iter().enumerate() {
                rows.push(match cell {
                    None => Vec::new(),
                    Some(Value::Array(Array::Integer(v))) => v.clone(),
                    Some(Value::Integer(x)) => vec![Some(*x)],
                    Some(other) => {
                        bail!("sample {i}: FORMAT {key} is not an integer array: {other:?}")
                    }
                });
            }
            Ok(narrow_int_rows(&rows))
        }
        (map::format::Type::Float, true) => {
            let mut values = Vec::with_capacity(cells.len());
            for (i, cell) in cells.iter().enumerate() {
                values.push(match cell {
                    None => missing_f32(),
                    Some(Value::Float(x)) => *x,
                    Some(other) => bail!("sample {i}: FORMAT {key} is not a float: {other:?}"),
                });
            }
            Ok(Payload::Float(values))
        }
        (map::format::Type::Float, false) => {
            let mut rows = Ragged::new();
            for (i, cell) in cells.iter().enumerate() {
                match cell {
                    None => rows.push_empty_row(),
                    Some(Value::Array(Array::Float(v))) => {
                        rows.push_row_iter(v.iter().map(|x| x.unwrap_or_else(missing_f32)));
                    }
                    Some(Value::Float(x)) => rows.push_row_iter(std::iter::once(*x)),
                    Some(other) => {
                        bail!("sample {i}: FORMAT {key} is not a float array: {other:?}")
                    }
                }
            }
            Ok(Payload::FloatVec(rows))
        }
        (map::format::Type::Character, true) => {
            let mut values = Vec::with_capacity(cells.len());
            for (i, cell) in cells.iter().enumerate() {
                values.push(match cell {
                    None => MISSING_CHAR,
                    Some(Value::Character(c)) => *c as u8,
                    Some(other) => bail!("sample {i}: FORMAT {key} is not a character: {other:?}"),
                });
            }
            Ok(Payload::Char(values))
        }
        (map::format::Type::Character, false) => {
            let mut rows = Ragged::new();
            for (i, cell) in cells.iter().enumerate() {
                match cell {
                    None => rows.push_empty_row(),
                    Some(Value::Array(Array::Character(v))) => {
                        rows.push_row_iter(v.iter().map(|c| c.map(|c| c as u8).unwrap_or(MISSING_CHAR)));
                    }
                    Some(Value::Character(c)) => rows.push_row_iter(std::iter::once(*c as u8)),
                    Some(other) => {
                        bail!("sample {i}: FORMAT {key} is not a character array: {other:?}")
                    }
                }
            }
            Ok(Payload::CharVec(rows))
        }
        (_, true) => {
            let mut values = Vec::with_capacity(cells.len());
            for (i, cell) in cells.iter().enumerate() {
                values.push(match cell {
                    None => ".".to_string(),
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => bail!("sample {i}: FORMAT {key} is not a string: {other:?}"),
                });
            }
            Ok(Payload::String(values))
        }
        (_, false) => {
            let mut rows = Ragged::new();
            for (i, cell) in cells.iter().enumerate() {
                match cell {
                    None => rows.push_empty_row(),
                    Some(Value::Array(Array::String(v))) => {
                        rows.push_row_iter(
                            v.iter()
                                .map(|s| s.clone().unwrap_or_else(|| ".".to_string())),
                        );
                    }
                    Some(Value::String(s)) => rows.push_row_iter(std::iter::once(s.clone())),
                    Some(other) => {
                        bail!("sample {i}: FORMAT {key} is not a string array: {other:?}")
                    }
                }
            }
            Ok(Payload::StringVec(rows))
        }
    }
}

fn narrow_scalar_ints(values: &[Option<i32>]) -> Payload {
    let mut w8 = true;
    let mut w16 = true;
    for v in values.iter().flatten() {
        w8 &= fits_i8(*v);
        w16 &= fits_i16(*v);
    }

    if w8 {
        Payload::Int8(
            values
                .iter()
                .map(|v| v.map(|x| x as i8).unwrap_or(MISSING_I8))
                .collect(),
        )
    } else if w16 {
        Payload::Int16(
            values
                .iter()
                .map(|v| v.map(|x| x as i16).unwrap_or(MISSING_I16))
                .collect(),
        )
    } else {
        Payload::Int32(values.iter().map(|v| v.unwrap_or(MISSING_I32)).collect())
    }
}

fn narrow_int_rows(rows: &[Vec<Option<i32>>]) -> Payload {
    let mut w8 = true;
    let mut w16 = true;
    for v in rows.iter().flatten().flatten() {
        w8 &= fits_i8(*v);
        w16 &= fits_i16(*v);
    }

    if w8 {
        Payload::Int8Vec(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.map(|x| x as i8).unwrap_or(MISSING_I8))
                        .collect()
                })
                .collect(),
        )
    } else if w16 {
        Payload::Int16Vec(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|v| v.map(|x| x as i16).unwrap_or(MISSING_I16))
                        .collect()
                })
                .collect(),
        )
    } else {
        Payload::Int32Vec(
            rows.iter()
                .map(|row| row.iter().map(|v| v.unwrap_or(MISSING_I32)).collect())
                .collect(),
        )
    }
}

pub fn to_record_buf(record: &Record, header: &Header) -> Result<RecordBuf> {
    let n_samples = header.sample_names().len();

    let mut builder = RecordBuf::builder()
        .set_reference_sequence_name(record.chrom.clone())
        .set_ids(record.ids.iter().cloned().collect())
        .set_reference_bases(record.reference_bases.clone())
        .set_alternate_bases(AlternateBases::from(record.alts.clone()))
        .set_filters(record.filters.iter().cloned().collect())
        .set_info(record.info.iter().cloned().collect());

    if record.pos > 0 {
        let position = Position::new(record.pos as usize)
            .ok_or_else(|| anyhow!("invalid record position {}", record.pos))?;
        builder = builder.set_variant_start(position);
    }
    if let Some(qual) = record.qual {
        builder = builder.set_quality_score(qual);
    }

    if !record.genotypes.is_empty() {
        let keys: Keys = record.genotypes.iter().map(|g| g.id.clone()).collect();
        let mut values = vec![Vec::with_capacity(record.genotypes.len()); n_samples];
        for field in &record.genotypes {
            let is_gt = field.id == "GT";
            for (i, row) in values.iter_mut().enumerate() {
                row.push(cell_value(&field.payload, i, is_gt));
            }
        }
        builder = builder.set_samples(Samples::new(keys, values));
    }

    Ok(builder.build())
}

fn cell_value(payload: &Payload, i: usize, is_gt: bool) -> Option<Value> {
    match payload {
        Payload::Int8(v) => match v.get(i) {
            Some(&x) if x != MISSING_I8 => Some(Value::Integer(i32::from(x))),
            _ => None,
        },
        Payload::Int16(v) => match v.get(i) {
            Some(&x) if x != MISSING_I16 => Some(Value::Integer(i32::from(x))),
            _ => None,
        },
        Payload::Int32(v) => match v.get(i) {
            Some(&x) if x != MISSING_I32 => Some(Value::Integer(x)),
            _ => None,
        },
        Payload::Float(v) => match v.get(i) {
            Some(&x) if !f32_is_missing(x) => Some(Value::Float(x)),
            _ => None,
        },
        Payload::Char(v) => match v.get(i) {
            Some(&x) if x != MISSING_CHAR => Some(Value::Character(x as char)),
            _ => None,
        },
        Payload::String(v) => match v.get(i) {
            Some(s) if s != "." => Some(if is_gt {
                s.parse::<Genotype>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(s.clone()))
            } else {
                Value::String(s.clone())
            }),
            _ => None,
        },
        Payload::Int8Vec(r) => ragged_cell(r, i, |&x| {
            (x != MISSING_I8).then(|| i32::from(x))
        })
        .map(Array::Integer)
        .map(Value::Array),
        Payload::Int16Vec(r) => ragged_cell(r, i, |&x| {
            (x != MISSING_I16).then(|| i32::from(x))
        })
        .map(Array::Integer)
        .map(Value::Array),
        Payload::Int32Vec(r) => ragged_cell(r, i, |&x| (x != MISSING_I32).then_some(x))
            .map(Array::Integer)
            .map(Value::Array),
        Payload::FloatVec(r) => ragged_cell(r, i, |&x| (!f32_is_missing(x)).then_some(x))
            .map(Array::Float)
            .map(Value::Array),
        Payload::CharVec(r) => ragged_cell(r, i, |&x| (x != MISSING_CHAR).then(|| x as char))
            .map(Array::Character)
            .map(Value::Array),
        Payload::StringVec(r) => ragged_cell(r, i, |s: &String| {
            (s != ".").then(|| s.clone())
        })
        .map(Array::String)
        .map(Value::Array),
    }
}

fn ragged_cell<T, U>(
    rows: &Ragged<T>,
    i: usize,
    element: impl Fn(&T) -> Option<U>,
) -> Option<Vec<Option<U>>> {
    if i >= rows.len() || rows.row_len(i) == 0 {
        return None;
    }
    Some(rows.row(i).iter().map(element).collect())
}

// The library's genotype serialization is not public, so the VCF string form
// is rebuilt here: every allele carries its phasing, and the leading
// indicator is dropped below VCF 4.4.
fn genotype_to_string(genotype: &Genotype, file_format: FileFormat) -> String {
    let mut out = String::new();
    for allele in genotype.as_ref() {
        out.push(match allele.phasing() {
            Phasing::Phased => '|',
            Phasing::Unphased => '/',
        });
        match allele.position() {
            Some(position) => out.push_str(&position.to_string()),
            None => out.push('.'),
        }
    }

    if file_format < VCF_4_4 && out.starts_with(['/', '|']) {
        out.remove(0);
    }
    out
}
