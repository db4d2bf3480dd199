use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use bcfdelta_lib::cli::{default_threads, DecodeConfig, EncodeConfig};

#[derive(Parser)]
#[command(name = "bcfdelta")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Losslessly compress VCF and BCF files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform genotype payloads into a better-compressible form
    Encode(EncodeArgs),
    /// Undo the transformation, restoring the original record stream
    Decode(DecodeArgs),
}

#[derive(Parser)]
struct EncodeArgs {
    /// The input file (.vcf, .vcf.gz or .bcf)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// The output file (.vcf, .vcf.gz or .bcf)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Encode genotype values as the difference to the anchor record's values
    #[arg(
        short = 'd',
        long,
        value_name = "BOOL",
        default_value_t = true,
        default_missing_value = "true",
        num_args = 0..=1,
        action = ArgAction::Set,
        hide = true
    )]
    delta_compress: bool,

    /// Split certain fields so that their layout becomes better compressible
    #[arg(short = 's', long)]
    split_fields: bool,

    /// Delta-compress integer fields
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        default_missing_value = "true",
        num_args = 0..=1,
        action = ArgAction::Set
    )]
    compress_ints: bool,

    /// XOR-compress float fields (good for BCF output, possibly bad for VCF output)
    #[arg(long)]
    compress_floats: bool,

    /// Delta-compress character fields (CHAR fields, not STRING fields)
    #[arg(long)]
    compress_chars: bool,

    /// Skip sub-ranges that do not have the expected size
    #[arg(
        long,
        value_name = "BOOL",
        default_value_t = true,
        default_missing_value = "true",
        num_args = 0..=1,
        action = ArgAction::Set
    )]
    skip_problematic: bool,

    /// Keep an uncompressed record every N basepairs
    #[arg(
        short = 'f',
        long,
        value_name = "N",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(100..=1_000_000)
    )]
    ref_freq: u64,

    /// Maximum number of threads to use
    #[arg(short = '@', long, value_name = "N", default_value_t = default_threads())]
    threads: usize,
}

#[derive(Parser)]
struct DecodeArgs {
    /// The input file (.vcf, .vcf.gz or .bcf)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// The output file (.vcf, .vcf.gz or .bcf)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Maximum number of threads to use
    #[arg(short = '@', long, value_name = "N", default_value_t = default_threads())]
    threads: usize,
}

impl EncodeArgs {
    fn into_config(self) -> EncodeConfig {
        EncodeConfig {
            input: self.input,
            output: self.output,
            delta_compress: self.delta_compress,
            split_fields: self.split_fields,
            compress_ints: self.compress_ints,
            compress_floats: self.compress_floats,
            compress_chars: self.compress_chars,
            skip_problematic: self.skip_problematic,
            ref_freq: self.ref_freq,
            threads: self.threads,
        }
    }
}

impl DecodeArgs {
    fn into_config(self) -> DecodeConfig {
        DecodeConfig {
            input: self.input,
            output: self.output,
            threads: self.threads,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // User errors exit with status 1; help and version keep clap's behavior.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            let _ = err.print();
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Encode(args) => {
            info!("Starting encoding...");
            bcfdelta_lib::encode(&args.into_config())?;
            info!("Encoding complete");
        }
        Commands::Decode(args) => {
            info!("Starting decoding...");
            bcfdelta_lib::decode(&args.into_config())?;
            info!("Decoding complete");
        }
    }

    Ok(())
}
