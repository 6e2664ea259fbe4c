//! Save a buffer as a `.raw` payload plus `.inf` sidecar

use crate::codec::encode;
use crate::error::{NextMindError, Result};
use crate::locator::{RecordingRef, INF_EXTENSION, RAW_EXTENSION};
use crate::signal::SignalBuffer;
use crate::types::SampleDtype;
use std::fmt::Write as _;
use std::path::Path;

/// Render `key: value` metadata describing `buffer` encoded as `dtype`
pub fn render_inf(buffer: &SignalBuffer, dtype: SampleDtype) -> String {
    let fields = buffer.fields();
    let mut out = String::new();
    let _ = writeln!(out, "sample_rate: {}", fields.sample_rate);
    let _ = writeln!(out, "channels: {}", fields.channel_count);
    let _ = writeln!(out, "dtype: {}", dtype.name());
    let names: Vec<String> = buffer
        .channel_names()
        .iter()
        .enumerate()
        .map(|(i, name)| inf_safe_name(i, name))
        .collect();
    let _ = writeln!(out, "channel_names: {}", names.join(","));
    if let Some(units) = &fields.units {
        let _ = writeln!(out, "units: {}", units);
    }
    let _ = writeln!(out, "byte_order: {}", fields.byte_order.name());
    let _ = writeln!(out, "layout: {}", fields.layout.name());
    out
}

/// A channel name that survives the comma-separated `channel_names` line
fn inf_safe_name(index: usize, name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| if c == ',' || c.is_control() { '_' } else { c })
        .collect();
    let cleaned = if cleaned.is_empty() { format!("Ch{}", index) } else { cleaned };
    if cleaned != name {
        log::warn!("Channel name {:?} written as {:?}", name, cleaned);
    }
    cleaned
}

/// Write `<dir>/<stem>.raw` and `<dir>/<stem>.inf`.
///
/// The `.inf` is complete, so reading the pair back yields explicit metadata.
pub fn write_recording(buffer: &SignalBuffer, dir: &Path, stem: &str, dtype: SampleDtype) -> Result<RecordingRef> {
    std::fs::create_dir_all(dir).map_err(|e| NextMindError::io(dir, e))?;

    let base = dir.join(stem);
    let raw_path = base.with_extension(RAW_EXTENSION);
    let inf_path = base.with_extension(INF_EXTENSION);

    if dtype.is_integer() && buffer.samples().iter().any(|v| v.is_nan()) {
        log::warn!(
            "{} contains NaN samples; they are stored as 0 in {}",
            raw_path.display(),
            dtype
        );
    }

    let bytes = encode(buffer, dtype);
    std::fs::write(&raw_path, &bytes).map_err(|e| NextMindError::io(&raw_path, e))?;
    std::fs::write(&inf_path, render_inf(buffer, dtype)).map_err(|e| NextMindError::io(&inf_path, e))?;

    log::info!("Wrote {} ({} bytes)", raw_path.display(), bytes.len());
    Ok(RecordingRef::from_pair(raw_path, Some(inf_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{open_recording, ReaderConfig};
    use crate::types::{ByteOrder, MetadataFields, RecordingMetadata};

    #[test]
    fn test_names_with_separators_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let fields = MetadataFields::new(128.0, 3, SampleDtype::Float32).with_channel_names(vec![
            "Fp1,ref".into(),
            " ".into(),
            "O2\n".into(),
        ]);
        let buf = SignalBuffer::from_channels(&[vec![1.0], vec![2.0], vec![3.0]], RecordingMetadata::Explicit(fields))
            .unwrap();

        let written = write_recording(&buf, tmp.path(), "names", SampleDtype::Float32).unwrap();
        let back = open_recording(&written, &ReaderConfig::default()).unwrap();
        assert_eq!(back.channel_names(), vec!["Fp1_ref", "Ch1", "O2"]);
    }

    #[test]
    fn test_written_pair_reads_back_explicit() {
        let tmp = tempfile::tempdir().unwrap();
        let fields = MetadataFields::new(250.0, 2, SampleDtype::Int16)
            .with_channel_names(vec!["C3".into(), "C4".into()])
            .with_units("uV");
        let buf = SignalBuffer::from_channels(
            &[vec![0.5, -1.25, 3.0], vec![10.0, 20.0, f64::NAN]],
            RecordingMetadata::Explicit(fields),
        )
        .unwrap();

        let written = write_recording(&buf, tmp.path(), "out_shielded", SampleDtype::Float64).unwrap();
        assert!(written.raw_path.ends_with("out_shielded.raw"));

        let back = open_recording(&written, &ReaderConfig::default()).unwrap();
        assert!(!back.metadata().is_inferred());
        assert_eq!(back.metadata().dtype(), SampleDtype::Float64);
        assert_eq!(back.sample_rate(), 250.0);
        assert_eq!(back.channel_names(), vec!["C3", "C4"]);
        assert_eq!(back.fields().units.as_deref(), Some("uV"));
        assert_eq!(back.channel(0), vec![0.5, -1.25, 3.0]);
        assert!(back.get(2, 1).unwrap().is_nan());
    }

    #[test]
    fn test_render_inf_keeps_byte_order() {
        let mut fields = MetadataFields::new(128.0, 1, SampleDtype::Int32);
        fields.byte_order = ByteOrder::Big;
        let buf = SignalBuffer::from_frames(vec![1.0], RecordingMetadata::Explicit(fields)).unwrap();
        let text = render_inf(&buf, SampleDtype::Int32);
        assert!(text.contains("byte_order: big"));
        assert!(text.contains("channel_names: Ch0"));
    }
}
