use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-width sample encodings found in `.raw` payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleDtype {
    Int16,
    Float32,
    Int32,
    Float64,
}

impl SampleDtype {
    /// Inference priority order
    pub const ALL: [SampleDtype; 4] = [
        SampleDtype::Int16,
        SampleDtype::Float32,
        SampleDtype::Int32,
        SampleDtype::Float64,
    ];

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleDtype::Int16 => 2,
            SampleDtype::Float32 | SampleDtype::Int32 => 4,
            SampleDtype::Float64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, SampleDtype::Int16 | SampleDtype::Int32)
    }

    pub fn name(self) -> &'static str {
        match self {
            SampleDtype::Int16 => "int16",
            SampleDtype::Float32 => "float32",
            SampleDtype::Int32 => "int32",
            SampleDtype::Float64 => "float64",
        }
    }

    /// Parse a dtype name as written in `.inf` files or on the command line.
    ///
    /// Accepts the canonical names plus the usual numpy/C spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int16" | "i16" | "short" | "<i2" | "i2" => Some(SampleDtype::Int16),
            "float32" | "f32" | "float" | "single" | "<f4" | "f4" => Some(SampleDtype::Float32),
            "int32" | "i32" | "int" | "<i4" | "i4" => Some(SampleDtype::Int32),
            "float64" | "f64" | "double" | "<f8" | "f8" => Some(SampleDtype::Float64),
            _ => None,
        }
    }
}

impl fmt::Display for SampleDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "little" | "le" | "little_endian" | "little-endian" => Some(ByteOrder::Little),
            "big" | "be" | "big_endian" | "big-endian" => Some(ByteOrder::Big),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

/// How consecutive samples in a `.raw` payload map onto channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameLayout {
    /// sample0_ch0, sample0_ch1, ..., sample1_ch0, ...
    #[default]
    Interleaved,
    /// All of channel 0, then all of channel 1, ...
    Sequential,
}

impl FrameLayout {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "interleaved" | "frame" | "frames" => Some(FrameLayout::Interleaved),
            "sequential" | "planar" | "blocked" => Some(FrameLayout::Sequential),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FrameLayout::Interleaved => "interleaved",
            FrameLayout::Sequential => "sequential",
        }
    }
}

/// Resolved description of a recording payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFields {
    pub sample_rate: f64,
    pub channel_count: usize,
    pub dtype: SampleDtype,
    pub channel_names: Option<Vec<String>>,
    pub units: Option<String>,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub layout: FrameLayout,
}

impl MetadataFields {
    pub fn new(sample_rate: f64, channel_count: usize, dtype: SampleDtype) -> Self {
        Self {
            sample_rate,
            channel_count,
            dtype,
            channel_names: None,
            units: None,
            byte_order: ByteOrder::Little,
            layout: FrameLayout::Interleaved,
        }
    }

    pub fn with_channel_names(mut self, names: Vec<String>) -> Self {
        self.channel_names = Some(names);
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Bytes per frame. Saturates instead of wrapping, so an absurd channel count
    /// can never divide a payload.
    pub fn frame_bytes(&self) -> usize {
        self.channel_count.saturating_mul(self.dtype.bytes_per_sample())
    }

    /// Channel labels, falling back to `Ch0`, `Ch1`, ... when the recording has none
    pub fn labels(&self) -> Vec<String> {
        match &self.channel_names {
            Some(names) => names.clone(),
            None => (0..self.channel_count).map(|i| format!("Ch{}", i)).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Low,
}

/// One candidate (dtype, channel count) reading of a payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutHypothesis {
    pub dtype: SampleDtype,
    pub channel_count: usize,
    pub n_samples: u64,
    pub duration_secs: f64,
    /// 0.0 inside the plausible duration window, else log10 distance to it
    pub implausibility: f64,
}

impl LayoutHypothesis {
    pub fn is_plausible(&self) -> bool {
        self.implausibility == 0.0
    }
}

impl fmt::Display for LayoutHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x {} ch ({} samples, {:.1}s)",
            self.dtype, self.channel_count, self.n_samples, self.duration_secs
        )
    }
}

/// How an inferred layout was arrived at, and how much to trust it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub confidence: ConfidenceLevel,
    pub sample_rate_assumed: bool,
    /// Another valid hypothesis scored exactly as well as the chosen one
    pub ambiguous: bool,
    pub chosen: LayoutHypothesis,
    /// Every other hypothesis that satisfied divisibility, best first
    pub alternatives: Vec<LayoutHypothesis>,
}

/// Recording metadata, either read from a complete `.inf` or guessed from the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum RecordingMetadata {
    Explicit(MetadataFields),
    Inferred {
        fields: MetadataFields,
        inference: Inference,
    },
}

impl RecordingMetadata {
    pub fn fields(&self) -> &MetadataFields {
        match self {
            RecordingMetadata::Explicit(fields) => fields,
            RecordingMetadata::Inferred { fields, .. } => fields,
        }
    }

    pub fn fields_mut(&mut self) -> &mut MetadataFields {
        match self {
            RecordingMetadata::Explicit(fields) => fields,
            RecordingMetadata::Inferred { fields, .. } => fields,
        }
    }

    pub fn inference(&self) -> Option<&Inference> {
        match self {
            RecordingMetadata::Explicit(_) => None,
            RecordingMetadata::Inferred { inference, .. } => Some(inference),
        }
    }

    pub fn is_inferred(&self) -> bool {
        matches!(self, RecordingMetadata::Inferred { .. })
    }

    pub fn is_low_confidence(&self) -> bool {
        self.inference()
            .map(|i| i.confidence == ConfidenceLevel::Low)
            .unwrap_or(false)
    }

    pub fn sample_rate(&self) -> f64 {
        self.fields().sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.fields().channel_count
    }

    pub fn dtype(&self) -> SampleDtype {
        self.fields().dtype
    }
}
