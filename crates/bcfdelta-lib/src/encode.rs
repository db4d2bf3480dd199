//! The encode driver: one record at a time through the split pre-pass, the
//! anchor decision and the delta kernel, in input order.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::EncodeConfig;
use crate::delta::{self, PromotePool};
use crate::header::{self, FormatSpecs};
use crate::io::{convert, VariantReader, VariantWriter};
use crate::model::Record;
use crate::split::{self, SplitBuffers};

/// Split the configured thread budget: one main thread, roughly one third of
/// the rest for the reader, the remainder for the writer.
pub(crate) fn io_thread_split(total: usize) -> (usize, usize) {
    let workers = total.max(2) - 1;
    let reader_threads = (workers / 3).max(1);
    let writer_threads = (workers - workers / 3).max(1);
    (reader_threads, writer_threads)
}

/// A record opens a new bucket iff its chromosome or `pos / ref_freq` differs
/// from the last anchor's; only bi-allelic records may become anchors, so a
/// multi-allelic record in a brand-new chromosome still delta-compresses.
pub(crate) fn is_anchor(last: &Record, record: &Record, ref_freq: u64) -> bool {
    if record.n_alts() != 1 {
        return false;
    }
    last.chrom != record.chrom || bucket(last.pos, ref_freq) != bucket(record.pos, ref_freq)
}

fn bucket(pos: i64, ref_freq: u64) -> i64 {
    pos / ref_freq as i64
}

pub fn encode(config: &EncodeConfig) -> Result<()> {
    let start = Instant::now();
    let (reader_threads, writer_threads) = io_thread_split(config.threads);
    debug!(
        reader_threads,
        writer_threads, "thread budget after reserving the main thread"
    );

    let mut reader = VariantReader::open(&config.input, reader_threads)?;
    let in_header = reader.read_header().context("failed to read the header")?;

    let mut out_header = in_header.clone();
    header::prepare_encode_header(&mut out_header, config)?;

    let mut writer = VariantWriter::create(&config.output, writer_threads)?;
    writer
        .write_header(&out_header)
        .context("failed to write the header")?;

    // Eligibility is read from the output header so the split fields carry
    // their markers too.
    let specs = FormatSpecs::from_header(&out_header);
    let n_samples = out_header.sample_names().len();

    let mut split_buffers = SplitBuffers::default();
    let mut pool = PromotePool::new();

    // The anchor slot and the pre-mutation backup swap ownership instead of
    // copying whole records.
    let mut last = Box::new(Record::sentinel());
    let mut backup = Box::new(Record::default());

    let mut n_records = 0u64;
    let mut n_anchors = 0u64;

    while let Some(buf) = reader.next_record(&in_header)? {
        let mut record = convert::from_record_buf(&buf, &in_header)?;

        if config.split_fields {
            split::split_record(&mut record, &mut split_buffers)
                .with_context(|| format!("record {}:{}", record.chrom, record.pos))?;
        }

        let mut anchored = false;
        if config.delta_compress {
            // Backed up before mutation: if this becomes the next anchor, the
            // pre-delta form is what later records must pair against.
            (*backup).clone_from(&record);

            if is_anchor(&last, &record, config.ref_freq) {
                record.push_info_flag(header::DELTA_REF);
                anchored = true;
                n_anchors += 1;
            } else {
                record.push_info_flag(header::DELTA_COMP);
                delta::do_delta(
                    &last,
                    &mut record,
                    &specs,
                    n_samples,
                    config.skip_problematic,
                    &mut pool,
                )
                .with_context(|| format!("record {}:{}", record.chrom, record.pos))?;
            }
        }

        let out = convert::to_record_buf(&record, &out_header)?;
        writer.write_record(&out_header, &out)?;

        if config.split_fields {
            split::salvage_split_buffers(&mut record, &mut split_buffers);
        }
        pool.reclaim_record(&mut record);

        if anchored {
            std::mem::swap(&mut last, &mut backup);
        }
        n_records += 1;
    }

    writer.finish()?;
    info!(
        "encoded {} records ({} anchors) in {:.2?}",
        n_records,
        n_anchors,
        start.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(chrom: &str, pos: i64, n_alts: usize) -> Record {
        Record {
            chrom: chrom.to_string(),
            pos,
            alts: vec!["G".to_string(); n_alts],
            ..Record::default()
        }
    }

    #[test]
    fn test_first_biallelic_record_is_an_anchor() {
        let last = Record::sentinel();
        assert!(is_anchor(&last, &record("1", 500, 1), 10_000));
    }

    #[test]
    fn test_same_bucket_delta_compresses() {
        let last = record("1", 500, 1);
        assert!(!is_anchor(&last, &record("1", 700, 1), 10_000));
    }

    #[test]
    fn test_new_bucket_or_chromosome_reanchors() {
        let last = record("1", 500, 1);
        assert!(is_anchor(&last, &record("1", 10_500, 1), 10_000));
        assert!(is_anchor(&last, &record("2", 600, 1), 10_000));
    }

    #[test]
    fn test_multiallelic_never_anchors() {
        let last = record("1", 500, 1);
        // Even in a brand-new chromosome.
        assert!(!is_anchor(&last, &record("2", 600, 3), 10_000));
        assert!(!is_anchor(&Record::sentinel(), &record("1", 500, 0), 10_000));
    }

    #[test]
    fn test_thread_split_reserves_the_main_thread() {
        assert_eq!(io_thread_split(2), (1, 1));
        assert_eq!(io_thread_split(8), (2, 5));
        // Undersized budgets are clamped rather than rejected.
        assert_eq!(io_thread_split(0), (1, 1));
    }
}
