//! Threshold-based artifact handling
//!
//! A sample is an artifact when its magnitude exceeds the configured limit.
//! Rejected samples become NaN; interpolation rebuilds every invalid run
//! (artifacts and pre-existing NaN) from its valid neighbours.

use crate::error::{NextMindError, Result};
use serde::{Deserialize, Serialize};

/// What to do with flagged samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactAction {
    /// Replace with NaN
    Reject,
    /// Replace by linear interpolation between valid neighbours
    #[default]
    Interpolate,
}

impl ArtifactAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "reject" => Some(Self::Reject),
            "interpolate" | "interp" => Some(Self::Interpolate),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Interpolate => "interpolate",
        }
    }
}

/// A maximal run of consecutive samples handled together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRun {
    pub start: usize,
    pub len: usize,
}

impl ArtifactRun {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// Outcome of artifact handling on one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub name: String,
    /// Samples whose magnitude exceeded the limit
    pub flagged_samples: usize,
    /// NaN samples already present before this stage
    #[serde(default)]
    pub missing_samples: usize,
    pub runs: Vec<ArtifactRun>,
    /// No valid sample was left to interpolate from
    #[serde(default)]
    pub unrecoverable: bool,
}

impl ChannelReport {
    pub fn is_clean(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Per-channel artifact summary for a buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub abs_limit: f64,
    pub action: ArtifactAction,
    pub channels: Vec<ChannelReport>,
}

impl ArtifactReport {
    pub fn total_flagged(&self) -> usize {
        self.channels.iter().map(|c| c.flagged_samples).sum()
    }

    pub fn unrecoverable_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| c.unrecoverable)
            .map(|c| c.name.as_str())
            .collect()
    }
}

pub fn validate_abs_limit(abs_limit: f64) -> Result<()> {
    if !abs_limit.is_finite() || abs_limit <= 0.0 {
        return Err(NextMindError::InvalidFilterParams(format!(
            "artifact limit must be positive and finite, got {}",
            abs_limit
        )));
    }
    Ok(())
}

#[inline]
fn exceeds(value: f64, abs_limit: f64) -> bool {
    value.abs() > abs_limit
}

/// Maximal runs of indices where `pred` holds
fn runs_where(values: &[f64], pred: impl Fn(f64) -> bool) -> Vec<ArtifactRun> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in values.iter().enumerate() {
        match (pred(v), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(ArtifactRun { start: s, len: i - s });
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(ArtifactRun {
            start: s,
            len: values.len() - s,
        });
    }
    runs
}

/// Apply artifact handling to one channel in place
pub fn clean_channel(name: &str, values: &mut [f64], abs_limit: f64, action: ArtifactAction) -> ChannelReport {
    let flagged_samples = values.iter().filter(|&&v| exceeds(v, abs_limit)).count();
    let missing_samples = values.iter().filter(|v| v.is_nan()).count();

    let mut report = ChannelReport {
        name: name.to_string(),
        flagged_samples,
        missing_samples,
        runs: Vec::new(),
        unrecoverable: false,
    };

    match action {
        ArtifactAction::Reject => {
            report.runs = runs_where(values, |v| exceeds(v, abs_limit));
            for run in &report.runs {
                values[run.start..run.end()].fill(f64::NAN);
            }
        }
        ArtifactAction::Interpolate => {
            let invalid = |v: f64| v.is_nan() || exceeds(v, abs_limit);
            report.runs = runs_where(values, invalid);

            if report.runs.len() == 1 && report.runs[0].len == values.len() && !values.is_empty() {
                log::warn!("Channel {} has no valid samples; filling with NaN", name);
                values.fill(f64::NAN);
                report.unrecoverable = true;
                return report;
            }

            for run in &report.runs {
                if run.start == 0 || run.end() == values.len() {
                    log::warn!(
                        "Channel {}: run at {}..{} touches the edge; clamping to nearest valid value",
                        name,
                        run.start,
                        run.end()
                    );
                }
                interpolate_run(values, *run);
            }
        }
    }

    report
}

fn interpolate_run(values: &mut [f64], run: ArtifactRun) {
    let left = run.start.checked_sub(1).map(|i| (i, values[i]));
    let right = (run.end() < values.len()).then(|| (run.end(), values[run.end()]));

    match (left, right) {
        (Some((li, lv)), Some((ri, rv))) => {
            let span = (ri - li) as f64;
            for i in run.start..run.end() {
                let t = (i - li) as f64 / span;
                values[i] = lv + (rv - lv) * t;
            }
        }
        // Edge runs take the nearest valid value
        (Some((_, lv)), None) => values[run.start..run.end()].fill(lv),
        (None, Some((_, rv))) => values[run.start..run.end()].fill(rv),
        (None, None) => values[run.start..run.end()].fill(f64::NAN),
    }
}
