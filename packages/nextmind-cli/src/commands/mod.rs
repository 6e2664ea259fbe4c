pub mod batch;
pub mod inspect;
pub mod shield;

use crate::cli::{OutputArgs, OutputFormat, ReadArgs, StageArgs};
use crate::exit_codes;
use crate::output;
use nextmind_rs::shielding::{self, BandpassConfig, NotchConfig, ThresholdConfig};
use nextmind_rs::{
    open_recording_with, write_recording, NextMindError, RecordingMetadata, RecordingRef,
    ShieldingConfig, ShieldingReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A failure with the exit code it maps to
#[derive(Debug)]
pub struct CommandError {
    pub code: i32,
    pub message: String,
}

impl CommandError {
    pub fn input(message: impl Into<String>) -> Self {
        Self {
            code: exit_codes::INPUT_ERROR,
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self {
            code: exit_codes::EXECUTION_ERROR,
            message: message.into(),
        }
    }
}

impl From<NextMindError> for CommandError {
    fn from(err: NextMindError) -> Self {
        Self {
            code: exit_codes::for_error(&err),
            message: err.to_string(),
        }
    }
}

/// Load the --config file (or defaults) and apply stage flags on top
pub fn build_config(stages: &StageArgs) -> Result<ShieldingConfig, CommandError> {
    let mut config = match &stages.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|e| {
                CommandError::input(format!("Failed to read config '{}': {}", path.display(), e))
            })?;
            serde_json::from_str::<ShieldingConfig>(&text).map_err(|e| {
                CommandError::input(format!("Invalid config '{}': {}", path.display(), e))
            })?
        }
        None => ShieldingConfig::default(),
    };

    if stages.low.is_some() || stages.high.is_some() || stages.order.is_some() {
        let base = config.bandpass.or(ShieldingConfig::default().bandpass);
        let base = base.unwrap_or(BandpassConfig {
            low_hz: 1.0,
            high_hz: 40.0,
            order: 4,
        });
        config.bandpass = Some(BandpassConfig {
            low_hz: stages.low.unwrap_or(base.low_hz),
            high_hz: stages.high.unwrap_or(base.high_hz),
            order: stages.order.unwrap_or(base.order),
        });
    }
    if stages.notch.is_some() || stages.q.is_some() {
        let base = config.notch.or(ShieldingConfig::default().notch);
        let base = base.unwrap_or(NotchConfig {
            freq_hz: 50.0,
            quality_factor: 30.0,
        });
        config.notch = Some(NotchConfig {
            freq_hz: stages.notch.unwrap_or(base.freq_hz),
            quality_factor: stages.q.unwrap_or(base.quality_factor),
        });
    }
    if stages.abs_limit.is_some() || stages.action.is_some() {
        let base = config.threshold.or(ShieldingConfig::default().threshold);
        let base = base.unwrap_or(ThresholdConfig {
            abs_limit: 100.0,
            action: Default::default(),
        });
        config.threshold = Some(ThresholdConfig {
            abs_limit: stages.abs_limit.unwrap_or(base.abs_limit),
            action: stages.action.unwrap_or(base.action),
        });
    }

    if stages.no_bandpass {
        config.bandpass = None;
    }
    if stages.no_notch {
        config.notch = None;
    }
    if stages.no_threshold {
        config.threshold = None;
    }

    log::debug!("Shielding config: {:?}", config);
    Ok(config)
}

/// What happened to one recording
#[derive(Debug, Serialize)]
pub struct ShieldOutcome {
    pub recording: String,
    pub input: PathBuf,
    pub output: PathBuf,
    pub metadata: RecordingMetadata,
    pub n_samples: usize,
    pub report: ShieldingReport,
}

/// Output location for a recording.
///
/// With an explicit --out-dir, recordings found under `root` keep their
/// relative directory so same-named recordings from different folders do not collide.
pub fn output_dir_for(recording: &RecordingRef, output: &OutputArgs, root: Option<&Path>) -> PathBuf {
    let parent = recording
        .raw_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    match &output.out_dir {
        None => parent,
        Some(out_dir) => {
            let relative = root.and_then(|r| parent.strip_prefix(r).ok());
            match relative {
                Some(rel) => out_dir.join(rel),
                None => out_dir.clone(),
            }
        }
    }
}

/// Read, shield and save one recording
pub fn shield_recording(
    recording: &RecordingRef,
    read: &ReadArgs,
    config: &ShieldingConfig,
    output: &OutputArgs,
    out_dir: &Path,
) -> Result<ShieldOutcome, CommandError> {
    let buffer = open_recording_with(recording, &read.overrides(), &read.reader_config())?;
    let metadata = buffer.metadata().clone();

    let (cleaned, report) = shielding::run(buffer, config)?;

    let stem = format!("{}_shielded", recording.name());
    let output_path = match output.format {
        OutputFormat::Raw => write_recording(&cleaned, out_dir, &stem, output.dtype)?.raw_path,
        OutputFormat::Csv => {
            std::fs::create_dir_all(out_dir).map_err(|e| {
                CommandError::execution(format!(
                    "Failed to create output directory '{}': {}",
                    out_dir.display(),
                    e
                ))
            })?;
            let path = out_dir.join(format!("{}.csv", stem));
            output::write_csv(&cleaned, &path).map_err(CommandError::execution)?;
            path
        }
    };

    Ok(ShieldOutcome {
        recording: recording.name(),
        input: recording.raw_path.clone(),
        output: output_path,
        metadata,
        n_samples: cleaned.n_samples(),
        report,
    })
}
