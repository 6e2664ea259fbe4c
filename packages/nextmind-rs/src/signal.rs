use crate::types::{MetadataFields, RecordingMetadata};

/// Decoded recording: a samples-major (n_samples × n_channels) matrix of `f64`
/// paired with the metadata it was decoded with.
///
/// The buffer is moved from stage to stage; nothing hands out mutable aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBuffer {
    data: Vec<f64>,
    metadata: RecordingMetadata,
}

impl SignalBuffer {
    /// Build a buffer from frame-ordered samples.
    ///
    /// Returns `None` when `data` does not hold a whole number of frames.
    pub fn from_frames(data: Vec<f64>, metadata: RecordingMetadata) -> Option<Self> {
        let n_channels = metadata.channel_count();
        if n_channels == 0 || data.len() % n_channels != 0 {
            return None;
        }
        Some(Self { data, metadata })
    }

    /// Build a buffer from per-channel sample vectors of equal length.
    pub fn from_channels(channels: &[Vec<f64>], metadata: RecordingMetadata) -> Option<Self> {
        if channels.len() != metadata.channel_count() {
            return None;
        }
        let n_samples = channels.first().map(|c| c.len()).unwrap_or(0);
        if channels.iter().any(|c| c.len() != n_samples) {
            return None;
        }
        let mut data = Vec::with_capacity(n_samples * channels.len());
        for i in 0..n_samples {
            data.extend(channels.iter().map(|c| c[i]));
        }
        Some(Self { data, metadata })
    }

    pub fn n_channels(&self) -> usize {
        self.metadata.channel_count()
    }

    pub fn n_samples(&self) -> usize {
        self.data.len() / self.n_channels()
    }

    pub fn sample_rate(&self) -> f64 {
        self.metadata.sample_rate()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_samples() as f64 / self.sample_rate()
    }

    pub fn metadata(&self) -> &RecordingMetadata {
        &self.metadata
    }

    pub fn fields(&self) -> &MetadataFields {
        self.metadata.fields()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.fields().labels()
    }

    /// All samples in frame order (sample0_ch0, sample0_ch1, ...)
    pub fn samples(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, sample: usize, channel: usize) -> Option<f64> {
        if channel >= self.n_channels() {
            return None;
        }
        self.data.get(sample * self.n_channels() + channel).copied()
    }

    /// One time point across all channels
    pub fn frame(&self, sample: usize) -> Option<&[f64]> {
        let n = self.n_channels();
        self.data.get(sample * n..(sample + 1) * n)
    }

    pub fn frames(&self) -> impl Iterator<Item = &[f64]> {
        self.data.chunks_exact(self.n_channels())
    }

    /// Copy out a single channel
    pub fn channel(&self, channel: usize) -> Vec<f64> {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.n_channels())
            .copied()
            .collect()
    }

    /// Copy out every channel, channel-major
    pub fn to_channels(&self) -> Vec<Vec<f64>> {
        (0..self.n_channels()).map(|c| self.channel(c)).collect()
    }

    /// Replace every channel with processed data of the same length.
    ///
    /// Consumes the buffer so a stage always yields a fresh one.
    pub(crate) fn with_channels(mut self, channels: Vec<Vec<f64>>) -> Self {
        let n = self.n_channels();
        debug_assert_eq!(channels.len(), n);
        for (c, values) in channels.into_iter().enumerate() {
            debug_assert_eq!(values.len(), self.data.len() / n);
            for (i, v) in values.into_iter().enumerate() {
                self.data[i * n + c] = v;
            }
        }
        self
    }

    pub fn into_parts(self) -> (Vec<f64>, RecordingMetadata) {
        (self.data, self.metadata)
    }
}
