//! `.inf` metadata parsing
//!
//! An `.inf` file is line-oriented `key: value` / `key=value` text. Some exports
//! write a JSON object instead; both are accepted. Keys are case-insensitive and
//! unknown keys are ignored, so a file may describe only part of a recording.

use crate::error::{NextMindError, Result};
use crate::types::{ByteOrder, FrameLayout, MetadataFields, RecordingMetadata, SampleDtype};
use serde::Serialize;
use std::path::Path;

/// Whatever an `.inf` file states about its recording. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InfMetadata {
    pub sample_rate: Option<f64>,
    pub channel_count: Option<usize>,
    pub dtype: Option<SampleDtype>,
    pub channel_names: Option<Vec<String>>,
    pub units: Option<String>,
    pub byte_order: Option<ByteOrder>,
    pub layout: Option<FrameLayout>,
}

impl InfMetadata {
    pub fn is_empty(&self) -> bool {
        *self == InfMetadata::default()
    }

    /// True when no inference is needed to decode the payload
    pub fn is_complete(&self) -> bool {
        self.sample_rate.is_some() && self.channel_count.is_some() && self.dtype.is_some()
    }

    /// Complete fields, or `None` if the sample rate, channel count or dtype is missing
    pub fn to_fields(&self) -> Option<MetadataFields> {
        Some(MetadataFields {
            sample_rate: self.sample_rate?,
            channel_count: self.channel_count?,
            dtype: self.dtype?,
            channel_names: self.channel_names.clone(),
            units: self.units.clone(),
            byte_order: self.byte_order.unwrap_or_default(),
            layout: self.layout.unwrap_or_default(),
        })
    }

    pub fn to_explicit(&self) -> Option<RecordingMetadata> {
        self.to_fields().map(RecordingMetadata::Explicit)
    }

    /// Replace fields with the ones `overrides` sets.
    ///
    /// Channel names that no longer match an overridden channel count are dropped.
    pub fn overlay(&mut self, overrides: &InfMetadata) {
        if overrides.sample_rate.is_some() {
            self.sample_rate = overrides.sample_rate;
        }
        if overrides.dtype.is_some() {
            self.dtype = overrides.dtype;
        }
        if overrides.units.is_some() {
            self.units = overrides.units.clone();
        }
        if overrides.byte_order.is_some() {
            self.byte_order = overrides.byte_order;
        }
        if overrides.layout.is_some() {
            self.layout = overrides.layout;
        }
        if overrides.channel_names.is_some() {
            self.channel_names = overrides.channel_names.clone();
        }
        if let Some(count) = overrides.channel_count {
            self.channel_count = Some(count);
            if self.channel_names.as_ref().is_some_and(|n| n.len() != count) {
                log::warn!("Dropping channel names that do not match {} channels", count);
                self.channel_names = None;
            }
        }
    }

    /// Check the fields that are set, the same way `.inf` parsing does.
    ///
    /// Used on metadata that did not come from [`parse_inf`], such as caller overrides.
    pub fn validate(&self, path: &Path) -> Result<()> {
        if let Some(rate) = self.sample_rate {
            check_sample_rate(rate).map_err(|reason| malformed(path, "sample_rate", &rate.to_string(), reason))?;
        }
        if let Some(count) = self.channel_count {
            check_channel_count(count)
                .map_err(|reason| malformed(path, "channels", &count.to_string(), reason))?;
        }
        if let Some(names) = &self.channel_names {
            if let Some(name) = names.iter().find(|n| n.contains(',')) {
                return Err(malformed(path, "channel_names", name, "channel names may not contain commas"));
            }
            if let Some(count) = self.channel_count.filter(|&c| c != names.len()) {
                return Err(malformed(
                    path,
                    "channel_names",
                    &names.join(","),
                    &format!("{} names for {} channels", names.len(), count),
                ));
            }
        }
        Ok(())
    }
}

/// Sample rates must be positive and finite
pub fn check_sample_rate(rate: f64) -> std::result::Result<(), &'static str> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err("sample rate must be positive");
    }
    Ok(())
}

/// Channel counts must be positive, and a frame of the widest dtype must fit in memory arithmetic
pub fn check_channel_count(count: usize) -> std::result::Result<(), &'static str> {
    if count == 0 {
        return Err("channel count must be positive");
    }
    if count.checked_mul(SampleDtype::Float64.bytes_per_sample()).is_none() {
        return Err("channel count is too large for a sample frame");
    }
    Ok(())
}

/// Read and parse an `.inf` file
pub fn read_inf(path: &Path) -> Result<InfMetadata> {
    let raw = std::fs::read(path).map_err(|e| NextMindError::io(path, e))?;
    let text = String::from_utf8_lossy(&raw);
    let inf = parse_inf(&text, path)?;
    if inf.is_empty() {
        log::warn!("{} contains no recognized metadata keys", path.display());
    } else {
        log::debug!("Parsed {}: {:?}", path.display(), inf);
    }
    Ok(inf)
}

/// Parse `.inf` text. `path` is only used for error context.
pub fn parse_inf(text: &str, path: &Path) -> Result<InfMetadata> {
    let text = text.trim_start_matches('\u{feff}');
    let mut inf = InfMetadata::default();

    if text.trim_start().starts_with('{') {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => {
                for (key, value) in &map {
                    if let serde_json::Value::Array(items) = value {
                        if let Some(item) = items.iter().filter_map(|v| v.as_str()).find(|v| v.contains(',')) {
                            return Err(malformed(path, key, item, "list items may not contain commas"));
                        }
                    }
                    let value = json_value_to_text(value);
                    apply_key(&mut inf, key, &value, path)?;
                }
                return finish(inf, path);
            }
            Ok(_) | Err(_) => {
                log::debug!(
                    "{} looks like JSON but is not an object; parsing as key/value lines",
                    path.display()
                );
            }
        }
    }

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        let Some(split_at) = line.find(|c: char| c == ':' || c == '=') else {
            log::debug!("Skipping line without separator: {}", line);
            continue;
        };
        let (key, value) = (&line[..split_at], &line[split_at + 1..]);
        apply_key(&mut inf, key, value.trim(), path)?;
    }

    finish(inf, path)
}

fn json_value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(json_value_to_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

fn malformed(path: &Path, key: &str, value: &str, reason: &str) -> NextMindError {
    NextMindError::MetadataParse {
        path: path.to_path_buf(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn apply_key(inf: &mut InfMetadata, key: &str, value: &str, path: &Path) -> Result<()> {
    let key = normalize_key(key);
    match key.as_str() {
        "sample_rate" | "samplerate" | "sampling_rate" | "srate" | "fs" => {
            let rate: f64 = value
                .parse()
                .map_err(|_| malformed(path, &key, value, "expected a number"))?;
            check_sample_rate(rate).map_err(|reason| malformed(path, &key, value, reason))?;
            inf.sample_rate = Some(rate);
        }
        "channels" | "n_channels" | "num_channels" | "channel_count" | "nchannels" => {
            let count: usize = value
                .parse()
                .map_err(|_| malformed(path, &key, value, "expected a positive integer"))?;
            check_channel_count(count).map_err(|reason| malformed(path, &key, value, reason))?;
            inf.channel_count = Some(count);
        }
        "dtype" | "data_type" | "sample_type" => {
            let dtype = SampleDtype::from_name(value).ok_or_else(|| {
                malformed(path, &key, value, "expected int16, float32, int32 or float64")
            })?;
            inf.dtype = Some(dtype);
        }
        "channel_names" | "channel_labels" | "labels" => {
            let names: Vec<String> = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                inf.channel_names = Some(names);
            }
        }
        "units" | "unit" => {
            if !value.is_empty() {
                inf.units = Some(value.to_string());
            }
        }
        "byte_order" | "endianness" | "endian" => {
            let order = ByteOrder::from_name(value)
                .ok_or_else(|| malformed(path, &key, value, "expected little or big"))?;
            inf.byte_order = Some(order);
        }
        "layout" | "frame_layout" => {
            let layout = FrameLayout::from_name(value)
                .ok_or_else(|| malformed(path, &key, value, "expected interleaved or sequential"))?;
            inf.layout = Some(layout);
        }
        _ => {
            log::trace!("Ignoring unrecognized .inf key '{}'", key);
        }
    }
    Ok(())
}

fn finish(mut inf: InfMetadata, path: &Path) -> Result<InfMetadata> {
    if let Some(names) = &inf.channel_names {
        match inf.channel_count {
            Some(count) if count != names.len() => {
                return Err(malformed(
                    path,
                    "channel_names",
                    &names.join(","),
                    &format!("{} names for {} channels", names.len(), count),
                ));
            }
            None => inf.channel_count = Some(names.len()),
            _ => {}
        }
    }
    Ok(inf)
}
