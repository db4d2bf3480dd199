//! The decode driver: the exact inverse of the encode pipeline.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::DecodeConfig;
use crate::delta::{self, PromotePool};
use crate::encode::io_thread_split;
use crate::header::{self, FormatSpecs};
use crate::io::{convert, VariantReader, VariantWriter};
use crate::model::Record;
use crate::split;

pub fn decode(config: &DecodeConfig) -> Result<()> {
    let start = Instant::now();
    let (reader_threads, writer_threads) = io_thread_split(config.threads);
    debug!(
        reader_threads,
        writer_threads, "thread budget after reserving the main thread"
    );

    let mut reader = VariantReader::open(&config.input, reader_threads)?;
    let in_header = reader.read_header().context("failed to read the header")?;

    let mut out_header = in_header.clone();
    header::prepare_decode_header(&mut out_header)?;

    let mut writer = VariantWriter::create(&config.output, writer_threads)?;
    writer
        .write_header(&out_header)
        .context("failed to write the header")?;

    // The input header still carries the Encoding markers that drive the
    // inverse kernel.
    let specs = FormatSpecs::from_header(&in_header);
    let n_samples = in_header.sample_names().len();

    let mut pool = PromotePool::new();
    let mut anchor = Box::new(Record::default());
    let mut backup = Box::new(Record::default());
    let mut n_records = 0u64;

    while let Some(buf) = reader.next_record(&in_header)? {
        let mut record = convert::from_record_buf(&buf, &in_header)?;

        let is_reference = record.has_info(header::DELTA_REF);
        let is_compressed = record.has_info(header::DELTA_COMP);
        record
            .info
            .retain(|(id, _)| id != header::DELTA_REF && id != header::DELTA_COMP);

        if is_compressed {
            delta::undo_delta(&anchor, &mut record, &specs, n_samples, true, &mut pool)
                .with_context(|| format!("record {}:{}", record.chrom, record.pos))?;
        }

        // Snapshot the anchor before unsplitting; later delta records pair
        // against the split form the encoder stored.
        if is_reference {
            (*backup).clone_from(&record);
        }

        split::unsplit_record(&mut record)
            .with_context(|| format!("record {}:{}", record.chrom, record.pos))?;

        let out = convert::to_record_buf(&record, &out_header)?;
        writer.write_record(&out_header, &out)?;
        pool.reclaim_record(&mut record);

        if is_reference {
            std::mem::swap(&mut anchor, &mut backup);
        }
        n_records += 1;
    }

    writer.finish()?;
    info!("decoded {} records in {:.2?}", n_records, start.elapsed());
    Ok(())
}
