//! Layout inference for `.raw` payloads without (complete) metadata
//!
//! Every (dtype, channel count) pair is a hypothesis. A hypothesis is valid when
//! the payload splits into whole frames, and plausible when the implied duration
//! at the assumed sample rate falls inside a configured window. The best
//! hypothesis is picked by implausibility, then dtype priority, then fewer
//! channels.

use crate::error::{NextMindError, Result};
use crate::inf::InfMetadata;
use crate::mmap_utils::payload_len;
use crate::types::{
    ConfidenceLevel, Inference, LayoutHypothesis, MetadataFields, RecordingMetadata, SampleDtype,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Assumptions used when a payload does not describe itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Sample rate assumed when none is known (Hz)
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: f64,

    /// Shortest recording considered plausible (seconds)
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: f64,

    /// Longest recording considered plausible (seconds)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f64,

    /// Candidate dtypes, highest priority first
    #[serde(default = "default_dtype_candidates")]
    pub dtype_candidates: Vec<SampleDtype>,

    /// Candidate channel counts
    #[serde(default = "default_channel_candidates")]
    pub channel_candidates: Vec<usize>,
}

fn default_sample_rate() -> f64 {
    256.0
}
fn default_min_duration() -> f64 {
    1.0
}
fn default_max_duration() -> f64 {
    24.0 * 3600.0
}
fn default_dtype_candidates() -> Vec<SampleDtype> {
    SampleDtype::ALL.to_vec()
}
fn default_channel_candidates() -> Vec<usize> {
    vec![1, 2, 4, 8, 16, 32, 64]
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            default_sample_rate: default_sample_rate(),
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            dtype_candidates: default_dtype_candidates(),
            channel_candidates: default_channel_candidates(),
        }
    }
}

impl InferenceOptions {
    fn implausibility(&self, duration_secs: f64) -> f64 {
        if duration_secs < self.min_duration_secs {
            (self.min_duration_secs / duration_secs).log10()
        } else if duration_secs > self.max_duration_secs {
            (duration_secs / self.max_duration_secs).log10()
        } else {
            0.0
        }
    }
}

/// Enumerate every hypothesis that splits `byte_len` into whole frames, ranked best first.
///
/// `hints` narrows the search: a known dtype or channel count replaces the
/// candidate list, and a known sample rate replaces the default.
pub fn rank_hypotheses(
    byte_len: u64,
    hints: &InfMetadata,
    options: &InferenceOptions,
) -> Vec<LayoutHypothesis> {
    if byte_len == 0 {
        return Vec::new();
    }

    let dtypes: Vec<SampleDtype> = match hints.dtype {
        Some(dtype) => vec![dtype],
        None => options.dtype_candidates.clone(),
    };
    let mut channel_counts: Vec<usize> = match hints.channel_count {
        Some(count) => vec![count],
        None => options.channel_candidates.clone(),
    };
    channel_counts.retain(|&c| c > 0);
    channel_counts.sort_unstable();
    channel_counts.dedup();

    let sample_rate = hints.sample_rate.unwrap_or(options.default_sample_rate);

    // (priority, hypothesis) so ties fall back to candidate order
    let mut ranked: Vec<(usize, LayoutHypothesis)> = Vec::new();
    for (priority, &dtype) in dtypes.iter().enumerate() {
        for &channel_count in &channel_counts {
            let Some(frame_bytes) = dtype.bytes_per_sample().checked_mul(channel_count) else {
                continue;
            };
            let frame_bytes = frame_bytes as u64;
            if byte_len % frame_bytes != 0 {
                continue;
            }
            let n_samples = byte_len / frame_bytes;
            let duration_secs = n_samples as f64 / sample_rate;
            ranked.push((
                priority,
                LayoutHypothesis {
                    dtype,
                    channel_count,
                    n_samples,
                    duration_secs,
                    implausibility: options.implausibility(duration_secs),
                },
            ));
        }
    }

    ranked.sort_by(|(pa, a), (pb, b)| {
        a.implausibility
            .total_cmp(&b.implausibility)
            .then(pa.cmp(pb))
            .then(a.channel_count.cmp(&b.channel_count))
    });

    for (_, h) in &ranked {
        log::debug!("Hypothesis {} implausibility {:.3}", h, h.implausibility);
    }

    ranked.into_iter().map(|(_, h)| h).collect()
}

/// Infer a complete layout for a payload of `byte_len` bytes.
///
/// Pure function of its inputs: no file access, so it can be driven with
/// synthetic sizes. Fields already known from `hints` are kept as-is.
pub fn infer_layout(
    byte_len: u64,
    hints: &InfMetadata,
    options: &InferenceOptions,
    path: &Path,
) -> Result<RecordingMetadata> {
    let mut ranked = rank_hypotheses(byte_len, hints, options).into_iter();
    let Some(chosen) = ranked.next() else {
        let dtypes = match hints.dtype {
            Some(d) => d.to_string(),
            None => options
                .dtype_candidates
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join("/"),
        };
        let channels = match hints.channel_count {
            Some(c) => c.to_string(),
            None => format!("{:?}", options.channel_candidates),
        };
        return Err(NextMindError::Inference {
            path: path.to_path_buf(),
            byte_len,
            reason: format!(
                "no dtype ({}) x channel count ({}) divides the payload evenly",
                dtypes, channels
            ),
        });
    };
    let alternatives: Vec<LayoutHypothesis> = ranked.collect();

    let sample_rate_assumed = hints.sample_rate.is_none();
    let ambiguous = alternatives
        .iter()
        .any(|h| h.implausibility == chosen.implausibility);
    let confidence = if sample_rate_assumed || ambiguous || !chosen.is_plausible() {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::High
    };

    if !chosen.is_plausible() {
        log::warn!(
            "{}: no hypothesis gives a plausible duration; using {}",
            path.display(),
            chosen
        );
    } else if confidence == ConfidenceLevel::Low {
        log::warn!(
            "{}: guessed layout {} (sample rate assumed: {}, {} alternatives)",
            path.display(),
            chosen,
            sample_rate_assumed,
            alternatives.len()
        );
    } else {
        log::info!("{}: inferred layout {}", path.display(), chosen);
    }

    let channel_names = hints
        .channel_names
        .clone()
        .filter(|names| names.len() == chosen.channel_count);

    let fields = MetadataFields {
        sample_rate: hints.sample_rate.unwrap_or(options.default_sample_rate),
        channel_count: chosen.channel_count,
        dtype: chosen.dtype,
        channel_names,
        units: hints.units.clone(),
        byte_order: hints.byte_order.unwrap_or_default(),
        layout: hints.layout.unwrap_or_default(),
    };

    Ok(RecordingMetadata::Inferred {
        fields,
        inference: Inference {
            confidence,
            sample_rate_assumed,
            ambiguous,
            chosen,
            alternatives,
        },
    })
}

/// Infer metadata for a `.raw` file from its size, keeping whatever `hints` already state
pub fn infer_metadata(
    raw_path: &Path,
    hints: &InfMetadata,
    options: &InferenceOptions,
) -> Result<RecordingMetadata> {
    let byte_len = payload_len(raw_path)?;
    infer_layout(byte_len, hints, options, raw_path)
}

/// Use the `.inf` as-is when complete, otherwise fill the gaps by inference
pub fn resolve_metadata(
    raw_path: &Path,
    inf: &InfMetadata,
    options: &InferenceOptions,
) -> Result<RecordingMetadata> {
    match inf.to_explicit() {
        Some(explicit) => Ok(explicit),
        None => infer_metadata(raw_path, inf, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(byte_len: u64, hints: &InfMetadata) -> Result<RecordingMetadata> {
        infer_layout(byte_len, hints, &InferenceOptions::default(), Path::new("test.raw"))
    }

    #[test]
    fn test_overflowing_channel_hint_is_skipped() {
        let hints = InfMetadata {
            channel_count: Some(1 << 62),
            ..Default::default()
        };
        let err = infer(16, &hints).unwrap_err();
        assert!(matches!(err, NextMindError::Inference { byte_len: 16, .. }));
    }

    #[test]
    fn test_odd_length_fails() {
        let err = infer(1001, &InfMetadata::default()).unwrap_err();
        assert!(matches!(err, NextMindError::Inference { byte_len: 1001, .. }));
    }

    #[test]
    fn test_empty_payload_fails() {
        assert!(infer(0, &InfMetadata::default()).is_err());
    }

    #[test]
    fn test_prefers_int16_single_channel_when_plausible() {
        // 60 s of int16 mono at 256 Hz
        let meta = infer(256 * 60 * 2, &InfMetadata::default()).unwrap();
        assert_eq!(meta.dtype(), SampleDtype::Int16);
        assert_eq!(meta.channel_count(), 1);
        assert_eq!(meta.sample_rate(), 256.0);

        let inference = meta.inference().unwrap();
        assert!(inference.sample_rate_assumed);
        assert!(inference.ambiguous);
        assert_eq!(inference.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn test_duration_window_drives_channel_choice() {
        // 4 channels of int16 for 20 hours at 256 Hz: one and two channels would
        // imply 80 h and 40 h, beyond the 24 h window.
        let n_samples: u64 = 256 * 3600 * 20;
        let meta = infer(n_samples * 4 * 2, &InfMetadata::default()).unwrap();
        assert_eq!(meta.dtype(), SampleDtype::Int16);
        assert_eq!(meta.channel_count(), 4);
        assert_eq!(meta.inference().unwrap().chosen.n_samples, n_samples);
    }

    #[test]
    fn test_hints_restrict_search() {
        let hints = InfMetadata {
            sample_rate: Some(500.0),
            dtype: Some(SampleDtype::Float32),
            channel_count: Some(8),
            ..Default::default()
        };
        let ranked = rank_hypotheses(500 * 10 * 8 * 4, &hints, &InferenceOptions::default());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].channel_count, 8);
        assert_eq!(ranked[0].duration_secs, 10.0);
    }

    #[test]
    fn test_unique_plausible_hypothesis_is_high_confidence() {
        // int16, 4 channels, an odd number of frames just under 24 h at 256 Hz.
        // Fewer channels imply more than 24 h; 8 channels do not divide evenly.
        let n_frames: u64 = 256 * 86_400 - 1;
        let hints = InfMetadata {
            sample_rate: Some(256.0),
            dtype: Some(SampleDtype::Int16),
            ..Default::default()
        };
        let meta = infer(n_frames * 4 * 2, &hints).unwrap();
        assert_eq!(meta.channel_count(), 4);

        let inference = meta.inference().unwrap();
        assert!(!inference.sample_rate_assumed);
        assert!(!inference.ambiguous);
        assert_eq!(inference.confidence, ConfidenceLevel::High);
        assert!(inference.alternatives.iter().all(|h| !h.is_plausible()));
    }

    #[test]
    fn test_equally_plausible_dtypes_are_flagged_ambiguous() {
        // Same payload without a dtype hint: float32 x 2 channels is just as plausible
        let n_frames: u64 = 256 * 86_400 - 1;
        let hints = InfMetadata {
            sample_rate: Some(256.0),
            ..Default::default()
        };
        let meta = infer(n_frames * 4 * 2, &hints).unwrap();
        assert_eq!(meta.dtype(), SampleDtype::Int16);
        assert_eq!(meta.channel_count(), 4);
        let inference = meta.inference().unwrap();
        assert!(inference.ambiguous);
        assert_eq!(inference.confidence, ConfidenceLevel::Low);
        assert!(inference
            .alternatives
            .iter()
            .any(|h| h.dtype == SampleDtype::Float32 && h.channel_count == 2 && h.is_plausible()));
    }

    #[test]
    fn test_implausible_everywhere_is_low_confidence() {
        // 2 bytes: one int16 sample, far below a second of data
        let meta = infer(2, &InfMetadata::default()).unwrap();
        let inference = meta.inference().unwrap();
        assert!(!inference.chosen.is_plausible());
        assert_eq!(inference.confidence, ConfidenceLevel::Low);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let a = rank_hypotheses(1 << 20, &InfMetadata::default(), &InferenceOptions::default());
        let b = rank_hypotheses(1 << 20, &InfMetadata::default(), &InferenceOptions::default());
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].implausibility <= w[1].implausibility));
    }
}
