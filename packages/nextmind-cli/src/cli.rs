use clap::{Args, Parser, Subcommand, ValueEnum};
use nextmind_rs::reader::DEFAULT_MAX_PAYLOAD_BYTES;
use nextmind_rs::inf::{check_channel_count, check_sample_rate};
use nextmind_rs::{ArtifactAction, InfMetadata, ReaderConfig, SampleDtype};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "nextmind",
    version,
    about = "Read and shield NextMind .raw/.inf EEG recordings",
    long_about = "Inspect NextMind recordings, then bandpass, notch and clean threshold artifacts.\n\
                  Layouts missing from the .inf sidecar are inferred from the payload size."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show resolved metadata for recordings without decoding samples
    Inspect(InspectArgs),
    /// Shield a single recording and save the cleaned data
    Shield(ShieldArgs),
    /// Shield every recording under a directory
    Batch(BatchArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `.raw` payload plus `.inf` sidecar
    Raw,
    /// One row per sample: time followed by each channel
    Csv,
}

/// Metadata hints and reader limits shared by all commands
#[derive(Args, Clone, Debug)]
pub struct ReadArgs {
    /// Sampling rate in Hz (overrides the .inf)
    #[arg(long, value_parser = parse_sample_rate)]
    pub sample_rate: Option<f64>,

    /// Channel count (overrides the .inf)
    #[arg(long, value_parser = parse_channels)]
    pub channels: Option<usize>,

    /// Sample type of the payload: int16, float32, int32, float64 (overrides the .inf)
    #[arg(long, value_parser = parse_dtype)]
    pub dtype_hint: Option<SampleDtype>,

    /// Refuse payloads larger than this many bytes
    #[arg(long, env = "NEXTMIND_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_payload_bytes: u64,
}

impl ReadArgs {
    pub fn overrides(&self) -> InfMetadata {
        InfMetadata {
            sample_rate: self.sample_rate,
            channel_count: self.channels,
            dtype: self.dtype_hint,
            ..Default::default()
        }
    }

    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            max_payload_bytes: self.max_payload_bytes,
            ..Default::default()
        }
    }
}

/// Shielding stages; flags override values from --config
#[derive(Args, Clone, Debug, Default)]
pub struct StageArgs {
    /// JSON file with a shielding configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bandpass low cutoff (Hz)
    #[arg(long)]
    pub low: Option<f64>,

    /// Bandpass high cutoff (Hz)
    #[arg(long)]
    pub high: Option<f64>,

    /// Butterworth order
    #[arg(long)]
    pub order: Option<usize>,

    /// Skip the bandpass stage
    #[arg(long, default_value_t = false)]
    pub no_bandpass: bool,

    /// Notch frequency (Hz), typically 50 or 60
    #[arg(long)]
    pub notch: Option<f64>,

    /// Notch quality factor
    #[arg(long)]
    pub q: Option<f64>,

    /// Skip the notch stage
    #[arg(long, default_value_t = false)]
    pub no_notch: bool,

    /// Absolute amplitude above which a sample is an artifact
    #[arg(long)]
    pub abs_limit: Option<f64>,

    /// What to do with artifacts: reject or interpolate
    #[arg(long, value_parser = parse_action)]
    pub action: Option<ArtifactAction>,

    /// Skip artifact handling
    #[arg(long, default_value_t = false)]
    pub no_threshold: bool,
}

/// Where and how cleaned recordings are written
#[derive(Args, Clone, Debug)]
pub struct OutputArgs {
    /// Output directory (default: next to the input)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    pub format: OutputFormat,

    /// Sample type of the written .raw
    #[arg(long, value_parser = parse_dtype, default_value = "float32")]
    pub dtype: SampleDtype,
}

#[derive(Args)]
pub struct InspectArgs {
    /// A .raw file or a directory of recordings
    pub path: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Include event, stim and target_info streams and raw EEG next to a preprocessed one
    #[arg(long, default_value_t = false)]
    pub all_streams: bool,

    #[command(flatten)]
    pub read: ReadArgs,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}

#[derive(Args)]
pub struct ShieldArgs {
    /// A .raw file, or a directory holding exactly one recording
    pub path: PathBuf,

    #[command(flatten)]
    pub read: ReadArgs,

    #[command(flatten)]
    pub stages: StageArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Write a JSON report of the run to this file ("-" for stdout)
    #[arg(long)]
    pub report: Option<String>,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct BatchArgs {
    /// Directory of recordings
    pub dir: PathBuf,

    /// Descend into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// Also shield raw EEG that has a preprocessed sibling
    #[arg(long, default_value_t = false)]
    pub keep_raw_eeg: bool,

    /// Recordings processed at once (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    #[command(flatten)]
    pub read: ReadArgs,

    #[command(flatten)]
    pub stages: StageArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Keep going after a recording fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// List the recordings that would be processed and exit
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Print the batch summary as JSON on stdout
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

/// Parse a sample type name such as "int16" or "f32".
pub fn parse_dtype(s: &str) -> Result<SampleDtype, String> {
    SampleDtype::from_name(s).ok_or_else(|| {
        format!(
            "Invalid sample type '{}': expected one of int16, float32, int32, float64",
            s
        )
    })
}

/// Parse a sampling rate: a positive, finite number of Hz.
pub fn parse_sample_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s
        .parse()
        .map_err(|_| format!("Invalid sample rate '{}': expected a number", s))?;
    check_sample_rate(rate).map_err(|reason| format!("Invalid sample rate '{}': {}", s, reason))?;
    Ok(rate)
}

/// Parse a channel count of at least one.
pub fn parse_channels(s: &str) -> Result<usize, String> {
    let count: usize = s
        .parse()
        .map_err(|_| format!("Invalid channel count '{}': expected a positive integer", s))?;
    check_channel_count(count).map_err(|reason| format!("Invalid channel count '{}': {}", s, reason))?;
    Ok(count)
}

/// Parse an artifact action name.
pub fn parse_action(s: &str) -> Result<ArtifactAction, String> {
    ArtifactAction::from_name(s)
        .ok_or_else(|| format!("Invalid action '{}': expected 'reject' or 'interpolate'", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dtype_valid() {
        assert_eq!(parse_dtype("int16").unwrap(), SampleDtype::Int16);
        assert_eq!(parse_dtype("f64").unwrap(), SampleDtype::Float64);
        assert_eq!(parse_dtype("Float").unwrap(), SampleDtype::Float32);
    }

    #[test]
    fn test_parse_dtype_invalid() {
        assert!(parse_dtype("uint8").is_err());
        assert!(parse_dtype("").is_err());
    }

    #[test]
    fn test_parse_sample_rate() {
        assert_eq!(parse_sample_rate("256").unwrap(), 256.0);
        assert!(parse_sample_rate("0").is_err());
        assert!(parse_sample_rate("-500").is_err());
        assert!(parse_sample_rate("NaN").is_err());
        assert!(parse_sample_rate("inf").is_err());
        assert!(parse_sample_rate("fast").is_err());
    }

    #[test]
    fn test_parse_channels() {
        assert_eq!(parse_channels("8").unwrap(), 8);
        assert!(parse_channels("0").unwrap_err().contains("positive"));
        assert!(parse_channels("-1").is_err());
        assert!(parse_channels("4611686018427387904").is_err());
    }

    #[test]
    fn test_parse_action() {
        assert_eq!(parse_action("reject").unwrap(), ArtifactAction::Reject);
        assert!(parse_action("drop").unwrap_err().contains("interpolate"));
    }

    #[test]
    fn test_read_overrides() {
        let read = ReadArgs {
            sample_rate: Some(500.0),
            channels: None,
            dtype_hint: Some(SampleDtype::Int32),
            max_payload_bytes: 1024,
        };
        let inf = read.overrides();
        assert_eq!(inf.sample_rate, Some(500.0));
        assert_eq!(inf.channel_count, None);
        assert_eq!(inf.dtype, Some(SampleDtype::Int32));
        assert_eq!(read.reader_config().max_payload_bytes, 1024);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
