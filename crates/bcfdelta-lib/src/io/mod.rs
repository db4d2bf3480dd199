//! Container plumbing: VCF, BGZF-compressed VCF and BCF readers/writers over
//! the `noodles` stack, plus the record-buffer conversion layer.

pub mod convert;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use anyhow::{Context, Result};
use noodles::vcf::variant::io::Write as _;
use noodles::vcf::variant::RecordBuf;
use noodles::vcf::Header;
use noodles::{bcf, bgzf, vcf};

/// The on-disk container, dictated by the file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Vcf,
    VcfGz,
    Bcf,
}

impl Container {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bcf") => Container::Bcf,
            Some("gz") | Some("bgz") => Container::VcfGz,
            _ => Container::Vcf,
        }
    }
}

fn worker_pool(worker_count: usize) -> NonZeroUsize {
    NonZeroUsize::new(worker_count).unwrap_or(NonZeroUsize::MIN)
}

/// Format-dispatched input stream. BGZF decompression runs on its own worker
/// pool when more than one reader thread is budgeted.
pub enum VariantReader {
    Vcf(vcf::io::Reader<Box<dyn BufRead>>),
    Bcf(bcf::io::Reader<Box<dyn Read>>),
}

impl VariantReader {
    pub fn open(path: &Path, worker_count: usize) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let workers = worker_pool(worker_count);

        let reader = match Container::from_path(path) {
            Container::Vcf => {
                let inner: Box<dyn BufRead> = Box::new(BufReader::new(file));
                Self::Vcf(vcf::io::Reader::new(inner))
            }
            Container::VcfGz => {
                let inner: Box<dyn BufRead> = if workers.get() > 1 {
                    Box::new(BufReader::new(
                        bgzf::MultithreadedReader::with_worker_count(workers, file),
                    ))
                } else {
                    Box::new(bgzf::Reader::new(file))
                };
                Self::Vcf(vcf::io::Reader::new(inner))
            }
            Container::Bcf => {
                let inner: Box<dyn Read> = if workers.get() > 1 {
                    Box::new(bgzf::MultithreadedReader::with_worker_count(
                        workers, file,
                    ))
                } else {
                    Box::new(bgzf::Reader::new(file))
                };
                Self::Bcf(bcf::io::Reader::from(inner))
            }
        };

        Ok(reader)
    }

    pub fn read_header(&mut self) -> Result<Header> {
        let header = match self {
            Self::Vcf(reader) => reader.read_header()?,
            Self::Bcf(reader) => reader.read_header()?,
        };
        Ok(header)
    }

    pub fn next_record(&mut self, header: &Header) -> Result<Option<RecordBuf>> {
        let record = match self {
            Self::Vcf(reader) => reader.record_bufs(header).next(),
            Self::Bcf(reader) => reader.record_bufs(header).next(),
        };
        record.transpose().map_err(Into::into)
    }
}

/// Format-dispatched output stream; the mirror of [`VariantReader`].
pub enum VariantWriter {
    Vcf(vcf::io::Writer<Box<dyn Write>>),
    Bcf(bcf::io::Writer<Box<dyn Write>>),
}

impl VariantWriter {
    pub fn create(path: &Path, worker_count: usize) -> Result<Self> {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let workers = worker_pool(worker_count);

        let writer = match Container::from_path(path) {
            Container::Vcf => {
                let inner: Box<dyn Write> = Box::new(BufWriter::new(file));
                Self::Vcf(vcf::io::Writer::new(inner))
            }
            Container::VcfGz => {
                let inner: Box<dyn Write> = if workers.get() > 1 {
                    Box::new(bgzf::MultithreadedWriter::with_worker_count(
                        workers, file,
                    ))
                } else {
                    Box::new(bgzf::Writer::new(file))
                };
                Self::Vcf(vcf::io::Writer::new(inner))
            }
            Container::Bcf => {
                let inner: Box<dyn Write> = if workers.get() > 1 {
                    Box::new(bgzf::MultithreadedWriter::with_worker_count(
                        workers, file,
                    ))
                } else {
                    Box::new(bgzf::Writer::new(file))
                };
                Self::Bcf(bcf::io::Writer::from(inner))
            }
        };

        Ok(writer)
    }

    pub fn write_header(&mut self, header: &Header) -> Result<()> {
        match self {
            Self::Vcf(writer) => writer.write_header(header)?,
            Self::Bcf(writer) => writer.write_header(header)?,
        }
        Ok(())
    }

    pub fn write_record(&mut self, header: &Header, record: &RecordBuf) -> Result<()> {
        match self {
            Self::Vcf(writer) => writer.write_variant_record(header, record)?,
            Self::Bcf(writer) => writer.write_variant_record(header, record)?,
        }
        Ok(())
    }

    /// Flush buffered output. BGZF end-of-stream blocks are written when the
    /// inner writer drops.
    pub fn finish(&mut self) -> Result<()> {
        match self {
            Self::Vcf(writer) => writer.get_mut().flush()?,
            Self::Bcf(writer) => writer.get_mut().flush()?,
        }
        Ok(())
    }
}
