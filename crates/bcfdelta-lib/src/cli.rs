use std::path::PathBuf;

/// Settings for the encode pipeline.
#[derive(Clone, Debug)]
pub struct EncodeConfig {
    /// Input VCF/BCF file
    pub input: PathBuf,
    /// Output VCF/BCF file
    pub output: PathBuf,
    /// Encode genotype values as the difference to the anchor record's values
    pub delta_compress: bool,
    /// Split AD and PL so that their layout becomes better compressible
    pub split_fields: bool,
    /// Delta-compress integer fields
    pub compress_ints: bool,
    /// XOR-compress float fields
    pub compress_floats: bool,
    /// Delta-compress character fields (CHAR fields, not STRING fields)
    pub compress_chars: bool,
    /// Skip sub-ranges that do not have the expected size
    pub skip_problematic: bool,
    /// Keep an uncompressed anchor record every N basepairs
    pub ref_freq: u64,
    /// Maximum number of threads to use
    pub threads: usize,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            delta_compress: true,
            split_fields: false,
            compress_ints: true,
            compress_floats: false,
            compress_chars: false,
            skip_problematic: true,
            ref_freq: 10_000,
            threads: default_threads(),
        }
    }
}

/// Settings for the decode pipeline.
#[derive(Clone, Debug)]
pub struct DecodeConfig {
    /// Input VCF/BCF file
    pub input: PathBuf,
    /// Output VCF/BCF file
    pub output: PathBuf,
    /// Maximum number of threads to use
    pub threads: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::new(),
            threads: default_threads(),
        }
    }
}

pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

/// Default thread budget: one for the main loop plus I/O workers, capped so
/// small machines are not oversubscribed.
pub fn default_threads() -> usize {
    num_cpus().min(8).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_behavior() {
        let config = EncodeConfig::default();
        assert!(config.delta_compress);
        assert!(config.compress_ints);
        assert!(!config.compress_floats);
        assert!(!config.compress_chars);
        assert!(config.skip_problematic);
        assert!(!config.split_fields);
        assert_eq!(config.ref_freq, 10_000);
        assert!(config.threads >= 2);
    }
}
