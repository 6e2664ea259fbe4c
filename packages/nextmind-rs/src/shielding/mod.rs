//! Shielding
//!
//! Signal conditioning for decoded recordings:
//! - Zero-phase Butterworth bandpass
//! - Notch filter for power line noise removal (50/60 Hz)
//! - Threshold artifact rejection or interpolation
//!
//! All filters use second-order sections (biquads) for numerical stability.

mod artifacts;
mod filters;
mod pipeline;

pub use artifacts::{clean_channel, ArtifactAction, ArtifactReport, ArtifactRun, ChannelReport};
pub use filters::{
    design_bandpass, design_notch, BiquadCoeffs, BiquadFilter, ButterworthFilter, NotchFilter,
    SosFilter,
};
pub use pipeline::{
    bandpass, notch, reject_artifacts, run, BandpassConfig, NotchConfig, ShieldingConfig,
    ShieldingReport, ThresholdConfig,
};
