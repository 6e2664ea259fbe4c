use crate::codec::decode_bytes;
use crate::error::{NextMindError, Result};
use crate::inf::{read_inf, InfMetadata};
use crate::inference::{resolve_metadata, InferenceOptions};
use crate::locator::RecordingRef;
use crate::mmap_utils::{mmap_file, payload_len};
use crate::signal::SignalBuffer;
use crate::types::RecordingMetadata;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Payloads above this are refused before anything is allocated
pub const DEFAULT_MAX_PAYLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,

    #[serde(default)]
    pub inference: InferenceOptions,
}

fn default_max_payload_bytes() -> u64 {
    DEFAULT_MAX_PAYLOAD_BYTES
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            inference: InferenceOptions::default(),
        }
    }
}

/// Decode a `.raw` file with known metadata
pub fn decode(raw_path: &Path, metadata: RecordingMetadata, config: &ReaderConfig) -> Result<SignalBuffer> {
    let byte_len = payload_len(raw_path)?;
    if byte_len > config.max_payload_bytes {
        return Err(NextMindError::OversizedFile {
            path: raw_path.to_path_buf(),
            byte_len,
            limit: config.max_payload_bytes,
        });
    }

    let frame_bytes = metadata.fields().frame_bytes() as u64;
    if byte_len == 0 || frame_bytes == 0 || byte_len % frame_bytes != 0 {
        return Err(NextMindError::TruncatedFile {
            path: raw_path.to_path_buf(),
            byte_len,
            frame_bytes,
            hypothesis: format!("{} x {} ch", metadata.dtype(), metadata.channel_count()),
        });
    }

    let mmap = mmap_file(raw_path)?;
    decode_bytes(&mmap, metadata, raw_path)
}

/// Metadata for a recording: a complete `.inf` as-is, otherwise inferred with the `.inf` as hints
pub fn read_metadata(recording: &RecordingRef, config: &ReaderConfig) -> Result<RecordingMetadata> {
    read_metadata_with(recording, &InfMetadata::default(), config)
}

/// Like [`read_metadata`], with caller-supplied fields taking precedence over the `.inf`
pub fn read_metadata_with(
    recording: &RecordingRef,
    overrides: &InfMetadata,
    config: &ReaderConfig,
) -> Result<RecordingMetadata> {
    let mut inf = match &recording.inf_path {
        Some(path) => read_inf(path)?,
        None => {
            log::debug!("{} has no .inf sidecar", recording.raw_path.display());
            InfMetadata::default()
        }
    };
    inf.overlay(overrides);
    inf.validate(recording.inf_path.as_deref().unwrap_or(recording.raw_path.as_path()))?;
    resolve_metadata(&recording.raw_path, &inf, &config.inference)
}

/// Resolve metadata and decode a recording in one step
pub fn open_recording(recording: &RecordingRef, config: &ReaderConfig) -> Result<SignalBuffer> {
    open_recording_with(recording, &InfMetadata::default(), config)
}

/// Like [`open_recording`], with caller-supplied metadata overrides
pub fn open_recording_with(
    recording: &RecordingRef,
    overrides: &InfMetadata,
    config: &ReaderConfig,
) -> Result<SignalBuffer> {
    let metadata = read_metadata_with(recording, overrides, config)?;
    if let Some(inference) = metadata.inference() {
        for alt in inference.alternatives.iter().take(3) {
            log::debug!("  alternative: {}", alt);
        }
    }
    log::info!(
        "Reading {} as {} x {} ch at {} Hz{}",
        recording.raw_path.display(),
        metadata.dtype(),
        metadata.channel_count(),
        metadata.sample_rate(),
        if metadata.is_low_confidence() { " (low confidence)" } else { "" }
    );
    decode(&recording.raw_path, metadata, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetadataFields, SampleDtype};
    use std::fs;

    #[test]
    fn test_oversized_payload_rejected_before_decode() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("big.raw");
        fs::write(&raw, vec![0u8; 4096]).unwrap();

        let config = ReaderConfig {
            max_payload_bytes: 1024,
            ..Default::default()
        };
        let meta = RecordingMetadata::Explicit(MetadataFields::new(256.0, 1, SampleDtype::Int16));
        let err = decode(&raw, meta, &config).unwrap_err();
        assert!(matches!(
            err,
            NextMindError::OversizedFile { byte_len: 4096, limit: 1024, .. }
        ));
    }

    #[test]
    fn test_truncated_file() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("t.raw");
        fs::write(&raw, vec![0u8; 10]).unwrap();
        let meta = RecordingMetadata::Explicit(MetadataFields::new(256.0, 4, SampleDtype::Int16));
        let err = decode(&raw, meta, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(err, NextMindError::TruncatedFile { byte_len: 10, frame_bytes: 8, .. }));
    }

    #[test]
    fn test_open_recording_with_complete_inf() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("eeg.raw");
        let samples: Vec<u8> = [1i16, 2, 3, 4, 5, 6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        fs::write(&raw, samples).unwrap();
        fs::write(
            tmp.path().join("eeg.inf"),
            "sample_rate=500\nchannels=2\ndtype=int16\nchannel_names=C3,C4\n",
        )
        .unwrap();

        let buf = open_recording(&RecordingRef::from_raw(&raw), &ReaderConfig::default()).unwrap();
        assert!(!buf.metadata().is_inferred());
        assert_eq!(buf.sample_rate(), 500.0);
        assert_eq!(buf.channel_names(), vec!["C3", "C4"]);
        assert_eq!(buf.channel(1), vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_overrides_complete_a_partial_inf() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("eeg.raw");
        fs::write(&raw, vec![0u8; 4 * 600 * 2]).unwrap();
        fs::write(tmp.path().join("eeg.inf"), "dtype: int16\n").unwrap();

        let overrides = InfMetadata {
            sample_rate: Some(600.0),
            channel_count: Some(4),
            ..Default::default()
        };
        let buf = open_recording_with(&RecordingRef::from_raw(&raw), &overrides, &ReaderConfig::default())
            .unwrap();
        assert!(!buf.metadata().is_inferred());
        assert_eq!(buf.n_samples(), 600);
        assert_eq!(buf.duration_secs(), 1.0);
    }

    #[test]
    fn test_huge_channel_count_in_inf_is_metadata_error() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("eeg.raw");
        fs::write(&raw, [0u8; 16]).unwrap();
        fs::write(tmp.path().join("eeg.inf"), "channels: 4611686018427387904\n").unwrap();

        let err = open_recording(&RecordingRef::from_raw(&raw), &ReaderConfig::default()).unwrap_err();
        assert!(matches!(err, NextMindError::MetadataParse { ref key, .. } if key == "channels"));
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("eeg.raw");
        fs::write(&raw, [0u8; 16]).unwrap();
        let recording = RecordingRef::from_raw(&raw);

        let zero_channels = InfMetadata {
            sample_rate: Some(256.0),
            channel_count: Some(0),
            dtype: Some(SampleDtype::Int16),
            ..Default::default()
        };
        let err = read_metadata_with(&recording, &zero_channels, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(err, NextMindError::MetadataParse { ref key, .. } if key == "channels"));

        let zero_rate = InfMetadata {
            sample_rate: Some(0.0),
            ..Default::default()
        };
        let err = open_recording_with(&recording, &zero_rate, &ReaderConfig::default()).unwrap_err();
        assert!(matches!(err, NextMindError::MetadataParse { ref key, .. } if key == "sample_rate"));
    }

    #[test]
    fn test_open_recording_partial_inf_uses_hints() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = tmp.path().join("eeg.raw");
        // 2 channels x 1000 frames of float32
        fs::write(&raw, vec![0u8; 2 * 1000 * 4]).unwrap();
        fs::write(tmp.path().join("eeg.inf"), "channels: 2\ndtype: float32\n").unwrap();

        let buf = open_recording(&RecordingRef::from_raw(&raw), &ReaderConfig::default()).unwrap();
        let inference = buf.metadata().inference().unwrap();
        assert!(inference.sample_rate_assumed);
        assert_eq!(buf.n_channels(), 2);
        assert_eq!(buf.n_samples(), 1000);
        assert_eq!(buf.sample_rate(), 256.0);
    }
}
