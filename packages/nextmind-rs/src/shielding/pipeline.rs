//! Shielding Pipeline
//!
//! Conditions a decoded recording in fixed order:
//! 1. Bandpass filter (frequency band selection)
//! 2. Notch filter (power line noise removal)
//! 3. Threshold artifact rejection or interpolation
//!
//! Every stage takes the buffer by value and hands back a new one of the same
//! shape and metadata. Channels are processed in parallel.

use super::artifacts::{clean_channel, validate_abs_limit, ArtifactAction, ArtifactReport};
use super::filters::{design_bandpass, design_notch, validate_bandpass, validate_notch, SosFilter};
use crate::error::{NextMindError, Result};
use crate::signal::SignalBuffer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandpassConfig {
    pub low_hz: f64,
    pub high_hz: f64,
    /// Butterworth order of each edge (highpass and lowpass)
    #[serde(default = "default_filter_order")]
    pub order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchConfig {
    pub freq_hz: f64,
    /// Center frequency over -3 dB bandwidth (higher = narrower, typical: 30)
    #[serde(default = "default_notch_q")]
    pub quality_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub abs_limit: f64,
    #[serde(default)]
    pub action: ArtifactAction,
}

/// Configuration for the shielding pipeline.
///
/// A missing stage in JSON takes its default; an explicit `null` disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShieldingConfig {
    #[serde(default = "default_bandpass")]
    pub bandpass: Option<BandpassConfig>,

    #[serde(default = "default_notch")]
    pub notch: Option<NotchConfig>,

    #[serde(default = "default_threshold")]
    pub threshold: Option<ThresholdConfig>,
}

fn default_filter_order() -> usize {
    4
}
fn default_notch_q() -> f64 {
    30.0
}
fn default_bandpass() -> Option<BandpassConfig> {
    Some(BandpassConfig {
        low_hz: 1.0,
        high_hz: 40.0,
        order: default_filter_order(),
    })
}
fn default_notch() -> Option<NotchConfig> {
    Some(NotchConfig {
        freq_hz: 50.0,
        quality_factor: default_notch_q(),
    })
}
fn default_threshold() -> Option<ThresholdConfig> {
    Some(ThresholdConfig {
        abs_limit: 100.0,
        action: ArtifactAction::Interpolate,
    })
}

impl Default for ShieldingConfig {
    fn default() -> Self {
        Self {
            bandpass: default_bandpass(),
            notch: default_notch(),
            threshold: default_threshold(),
        }
    }
}

impl ShieldingConfig {
    /// Create a standard EEG shielding config for the given mains frequency
    pub fn standard_eeg(powerline_freq: f64) -> Self {
        Self {
            notch: Some(NotchConfig {
                freq_hz: powerline_freq,
                quality_factor: default_notch_q(),
            }),
            ..Default::default()
        }
    }

    /// A config that runs no stage
    pub fn passthrough() -> Self {
        Self {
            bandpass: None,
            notch: None,
            threshold: None,
        }
    }

    /// Check every configured stage against a sampling rate
    pub fn validate(&self, sample_rate: f64) -> Result<()> {
        if let Some(bp) = &self.bandpass {
            validate_bandpass(bp.low_hz, bp.high_hz, bp.order, sample_rate)?;
        }
        if let Some(n) = &self.notch {
            validate_notch(n.freq_hz, n.quality_factor, sample_rate)?;
        }
        if let Some(t) = &self.threshold {
            validate_abs_limit(t.abs_limit)?;
        }
        Ok(())
    }

    /// Names of the stages that will run, in order
    pub fn stage_names(&self) -> Vec<&'static str> {
        let mut stages = Vec::new();
        if self.bandpass.is_some() {
            stages.push("bandpass");
        }
        if self.notch.is_some() {
            stages.push("notch");
        }
        if self.threshold.is_some() {
            stages.push("threshold");
        }
        stages
    }
}

/// Result of shielding one buffer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldingReport {
    /// Stages applied, in order
    pub stages: Vec<String>,
    /// Applied configuration
    pub config: ShieldingConfig,
    /// Artifact summary, when the threshold stage ran
    pub artifacts: Option<ArtifactReport>,
    /// Processing time in milliseconds
    pub processing_time_ms: f64,
}

/// Run a designed filter zero-phase over every channel
fn apply_filter(buffer: SignalBuffer, filter: &SosFilter) -> Result<SignalBuffer> {
    let n_samples = buffer.n_samples();
    if n_samples <= filter.pad_len() {
        return Err(NextMindError::InvalidFilterParams(format!(
            "buffer of {} samples is too short to filter (needs more than {})",
            n_samples,
            filter.pad_len()
        )));
    }

    let channels = buffer.to_channels();
    let filtered = channels
        .par_iter()
        .map(|channel| filter.clone().filtfilt(channel))
        .collect::<Result<Vec<_>>>()?;

    Ok(buffer.with_channels(filtered))
}

/// Zero-phase Butterworth bandpass on every channel
pub fn bandpass(buffer: SignalBuffer, low_hz: f64, high_hz: f64, order: usize) -> Result<SignalBuffer> {
    let filter = design_bandpass(low_hz, high_hz, order, buffer.sample_rate())?;
    apply_filter(buffer, &filter)
}

/// Zero-phase notch on every channel
pub fn notch(buffer: SignalBuffer, freq_hz: f64, quality_factor: f64) -> Result<SignalBuffer> {
    let filter = design_notch(freq_hz, quality_factor, buffer.sample_rate())?;
    apply_filter(buffer, &filter)
}

/// Flag samples beyond `abs_limit` on every channel and reject or interpolate them
pub fn reject_artifacts(
    buffer: SignalBuffer,
    abs_limit: f64,
    action: ArtifactAction,
) -> Result<(SignalBuffer, ArtifactReport)> {
    validate_abs_limit(abs_limit)?;

    let names = buffer.channel_names();
    let mut channels = buffer.to_channels();
    let reports: Vec<_> = channels
        .par_iter_mut()
        .zip(names.par_iter())
        .map(|(values, name)| clean_channel(name, values, abs_limit, action))
        .collect();

    for report in reports.iter().filter(|r| !r.is_clean()) {
        log::debug!(
            "{}: {} sample(s) over {} in {} run(s)",
            report.name,
            report.flagged_samples,
            abs_limit,
            report.runs.len()
        );
    }

    let report = ArtifactReport {
        abs_limit,
        action,
        channels: reports,
    };
    Ok((buffer.with_channels(channels), report))
}

/// Run every configured stage: bandpass, then notch, then artifacts.
///
/// The first failing stage aborts the run with its error.
pub fn run(buffer: SignalBuffer, config: &ShieldingConfig) -> Result<(SignalBuffer, ShieldingReport)> {
    let start = std::time::Instant::now();
    config.validate(buffer.sample_rate())?;

    let mut buffer = buffer;
    if let Some(bp) = &config.bandpass {
        log::info!("Bandpass {} - {} Hz (order {})", bp.low_hz, bp.high_hz, bp.order);
        buffer = bandpass(buffer, bp.low_hz, bp.high_hz, bp.order)?;
    }
    if let Some(n) = &config.notch {
        log::info!("Notch {} Hz (Q={})", n.freq_hz, n.quality_factor);
        buffer = notch(buffer, n.freq_hz, n.quality_factor)?;
    }

    let mut artifacts = None;
    if let Some(t) = &config.threshold {
        log::info!("Artifact {} above {}", t.action.name(), t.abs_limit);
        let (cleaned, report) = reject_artifacts(buffer, t.abs_limit, t.action)?;
        if report.total_flagged() > 0 {
            log::info!("Flagged {} sample(s)", report.total_flagged());
        }
        for name in report.unrecoverable_channels() {
            log::warn!("Channel {} could not be recovered", name);
        }
        buffer = cleaned;
        artifacts = Some(report);
    }

    let processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok((
        buffer,
        ShieldingReport {
            stages: config.stage_names().into_iter().map(String::from).collect(),
            config: config.clone(),
            artifacts,
            processing_time_ms,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetadataFields, RecordingMetadata, SampleDtype};
    use std::f64::consts::PI;

    fn buffer(sample_rate: f64, channels: Vec<Vec<f64>>) -> SignalBuffer {
        let meta = RecordingMetadata::Explicit(MetadataFields::new(
            sample_rate,
            channels.len(),
            SampleDtype::Float32,
        ));
        SignalBuffer::from_channels(&channels, meta).unwrap()
    }

    fn sine(freq: f64, amp: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| amp * (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_run_preserves_shape_and_metadata() {
        let buf = buffer(256.0, vec![sine(10.0, 5.0, 256.0, 1024); 4]);
        let meta = buf.metadata().clone();
        let (out, report) = run(buf, &ShieldingConfig::standard_eeg(60.0)).unwrap();
        assert_eq!(out.n_channels(), 4);
        assert_eq!(out.n_samples(), 1024);
        assert_eq!(out.metadata(), &meta);
        assert_eq!(report.stages, vec!["bandpass", "notch", "threshold"]);
    }

    #[test]
    fn test_passthrough_is_identity() {
        let buf = buffer(256.0, vec![vec![1.0, 2.0, 3.0]]);
        let (out, report) = run(buf.clone(), &ShieldingConfig::passthrough()).unwrap();
        assert_eq!(out, buf);
        assert!(report.stages.is_empty());
        assert!(report.artifacts.is_none());
    }

    #[test]
    fn test_notch_removes_mains() {
        let n = 2560;
        let mixed: Vec<f64> = sine(10.0, 1.0, 256.0, n)
            .iter()
            .zip(sine(50.0, 1.0, 256.0, n))
            .map(|(a, b)| a + b)
            .collect();
        let out = notch(buffer(256.0, vec![mixed]), 50.0, 30.0).unwrap();
        let clean = sine(10.0, 1.0, 256.0, n);
        let ch = out.channel(0);
        for i in 512..2048 {
            assert!((ch[i] - clean[i]).abs() < 0.05, "sample {}", i);
        }
    }

    #[test]
    fn test_invalid_stage_aborts_run() {
        let buf = buffer(128.0, vec![vec![0.0; 512]]);
        let config = ShieldingConfig {
            bandpass: Some(BandpassConfig {
                low_hz: 1.0,
                high_hz: 64.0,
                order: 4,
            }),
            ..Default::default()
        };
        let err = run(buf, &config).unwrap_err();
        assert!(matches!(err, NextMindError::InvalidFilterParams(_)));
    }

    #[test]
    fn test_nyquist_checked_per_sample_rate() {
        for sample_rate in [128.0, 256.0, 1000.0] {
            let nyq = sample_rate / 2.0;
            let buf = buffer(sample_rate, vec![vec![0.0; 2048]]);
            assert!(bandpass(buf.clone(), 1.0, nyq, 4).is_err());
            assert!(notch(buf.clone(), nyq, 30.0).is_err());
            assert!(notch(buf, nyq + 5.0, 30.0).is_err());
        }
    }

    #[test]
    fn test_short_buffer_rejected() {
        let buf = buffer(256.0, vec![vec![0.0; 10]]);
        assert!(matches!(
            bandpass(buf, 1.0, 40.0, 4),
            Err(NextMindError::InvalidFilterParams(_))
        ));
    }

    #[test]
    fn test_reject_artifacts_counts_per_channel() {
        let mut ch0 = sine(5.0, 10.0, 256.0, 2560);
        ch0[1280] = 1000.0;
        let ch1 = sine(5.0, 10.0, 256.0, 2560);
        let (out, report) =
            reject_artifacts(buffer(256.0, vec![ch0, ch1]), 50.0, ArtifactAction::Interpolate).unwrap();

        assert_eq!(report.channels[0].flagged_samples, 1);
        assert_eq!(report.channels[1].flagged_samples, 0);
        let ch = out.channel(0);
        let expected = (ch[1279] + ch[1281]) / 2.0;
        assert!((ch[1280] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_config_json_defaults_and_disable() {
        let config: ShieldingConfig = serde_json::from_str(r#"{"notch": null}"#).unwrap();
        assert!(config.notch.is_none());
        assert_eq!(config.bandpass, default_bandpass());

        let config: ShieldingConfig =
            serde_json::from_str(r#"{"threshold": {"abs_limit": 75.0, "action": "reject"}}"#).unwrap();
        let t = config.threshold.unwrap();
        assert_eq!(t.action, ArtifactAction::Reject);
        assert_eq!(t.abs_limit, 75.0);
    }
}
