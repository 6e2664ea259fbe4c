//! Digital Filter Implementations
//!
//! IIR filters built from second-order sections (biquads) for numerical stability.
//! Butterworth bandpass/highpass/lowpass and a second-order notch, plus
//! forward-backward (zero-phase) application.

use crate::error::{NextMindError, Result};
use std::f64::consts::PI;

/// Second-order section (biquad) coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoeffs {
    /// Gain at 0 Hz
    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }
}

/// State for a single biquad section (Direct Form II Transposed)
#[derive(Debug, Clone, Default)]
pub struct BiquadState {
    z1: f64,
    z2: f64,
}

/// Single biquad filter section
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            state: BiquadState::default(),
        }
    }

    /// Process a single sample using Direct Form II Transposed
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coeffs.b0 * input + self.state.z1;
        self.state.z1 = self.coeffs.b1 * input - self.coeffs.a1 * output + self.state.z2;
        self.state.z2 = self.coeffs.b2 * input - self.coeffs.a2 * output;
        output
    }

    /// Load the state this section settles into under a constant input.
    ///
    /// Returns the section's steady output for that input.
    fn prime(&mut self, input: f64) -> f64 {
        let c = self.coeffs;
        let output = c.dc_gain() * input;
        self.state.z1 = output - c.b0 * input;
        self.state.z2 = c.b2 * input - c.a2 * output;
        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state = BiquadState::default();
    }
}

/// Cascaded second-order sections filter
#[derive(Debug, Clone)]
pub struct SosFilter {
    sections: Vec<BiquadFilter>,
    gain: f64,
}

impl SosFilter {
    pub fn new(sections: Vec<BiquadCoeffs>, gain: f64) -> Self {
        Self {
            sections: sections.into_iter().map(BiquadFilter::new).collect(),
            gain,
        }
    }

    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// Append another filter's sections after this one's
    pub fn cascade(mut self, other: SosFilter) -> Self {
        self.gain *= other.gain;
        self.sections.extend(other.sections);
        self
    }

    /// Process a single sample through all sections
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input * self.gain;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Process an entire signal array in-place
    pub fn process_signal(&mut self, signal: &mut [f64]) {
        for sample in signal.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Reset all section states
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Set every section to its steady state for a constant input `x0`
    pub fn prime(&mut self, x0: f64) {
        let mut value = x0 * self.gain;
        for section in &mut self.sections {
            value = section.prime(value);
        }
    }

    /// Edge extension used by [`SosFilter::filtfilt`]
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Zero-phase filtering: forward pass, then a backward pass over the result.
    ///
    /// Both ends are extended by odd reflection and each pass starts from the
    /// steady state of its first sample, which keeps edge transients small.
    /// The signal must be longer than [`SosFilter::pad_len`].
    pub fn filtfilt(&mut self, signal: &[f64]) -> Result<Vec<f64>> {
        let n = signal.len();
        let pad = self.pad_len();
        if n <= pad {
            return Err(NextMindError::InvalidFilterParams(format!(
                "signal of {} samples is too short for zero-phase filtering (needs more than {})",
                n, pad
            )));
        }

        let first = signal[0];
        let last = signal[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        self.reset();
        self.prime(extended[0]);
        self.process_signal(&mut extended);

        extended.reverse();
        self.reset();
        self.prime(extended[0]);
        self.process_signal(&mut extended);
        extended.reverse();

        self.reset();
        Ok(extended[pad..pad + n].to_vec())
    }

    /// Magnitude response at `freq` Hz
    pub fn magnitude_at(&self, freq: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1, c2, s2) = (w.cos(), w.sin(), (2.0 * w).cos(), (2.0 * w).sin());
        self.sections.iter().fold(self.gain.abs(), |acc, section| {
            let c = section.coeffs;
            let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
            let num_im = -(c.b1 * s1 + c.b2 * s2);
            let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
            let den_im = -(c.a1 * s1 + c.a2 * s2);
            acc * (num_re.hypot(num_im) / den_re.hypot(den_im))
        })
    }
}

/// Butterworth filter designer
pub struct ButterworthFilter;

impl ButterworthFilter {
    /// Design a Butterworth lowpass filter
    pub fn lowpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_lowpass(wn, order), 1.0)
    }

    /// Design a Butterworth highpass filter
    pub fn highpass(cutoff: f64, sample_rate: f64, order: usize) -> SosFilter {
        let wn = Self::prewarp(cutoff, sample_rate);
        SosFilter::new(Self::design_highpass(wn, order), 1.0)
    }

    /// Design a Butterworth bandpass filter: highpass at `low` cascaded with lowpass at `high`
    pub fn bandpass(low: f64, high: f64, sample_rate: f64, order: usize) -> SosFilter {
        Self::highpass(low, sample_rate, order).cascade(Self::lowpass(high, sample_rate, order))
    }

    /// Prewarp frequency for bilinear transform
    fn prewarp(freq: f64, sample_rate: f64) -> f64 {
        (PI * freq / sample_rate).tan()
    }

    /// Damping term of the k-th analog pole pair: s^2 + a*s + 1
    fn pole_pair_damping(k: usize, order: usize) -> f64 {
        2.0 * (PI * (2.0 * k as f64 + 1.0) / (2.0 * order as f64)).sin()
    }

    /// Design lowpass second-order sections
    fn design_lowpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            // For odd order, last section is first-order
            if order % 2 == 1 && k == num_sections - 1 {
                // H(s) = wn / (s + wn)
                let k_coeff = wn / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let alpha = Self::pole_pair_damping(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + alpha * wn + wn2;

                sections.push(BiquadCoeffs {
                    b0: wn2 / denom,
                    b1: 2.0 * wn2 / denom,
                    b2: wn2 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - alpha * wn + wn2) / denom,
                });
            }
        }

        sections
    }

    /// Design highpass second-order sections
    fn design_highpass(wn: f64, order: usize) -> Vec<BiquadCoeffs> {
        let num_sections = (order + 1) / 2;
        let mut sections = Vec::with_capacity(num_sections);

        for k in 0..num_sections {
            if order % 2 == 1 && k == num_sections - 1 {
                let k_coeff = 1.0 / (1.0 + wn);
                sections.push(BiquadCoeffs {
                    b0: k_coeff,
                    b1: -k_coeff,
                    b2: 0.0,
                    a1: (wn - 1.0) / (wn + 1.0),
                    a2: 0.0,
                });
            } else {
                let alpha = Self::pole_pair_damping(k, order);
                let wn2 = wn * wn;
                let denom = 1.0 + alpha * wn + wn2;

                sections.push(BiquadCoeffs {
                    b0: 1.0 / denom,
                    b1: -2.0 / denom,
                    b2: 1.0 / denom,
                    a1: 2.0 * (wn2 - 1.0) / denom,
                    a2: (1.0 - alpha * wn + wn2) / denom,
                });
            }
        }

        sections
    }
}

/// Notch (band-reject) filter for removing specific frequencies
pub struct NotchFilter;

impl NotchFilter {
    /// Design a notch filter to remove a specific frequency
    ///
    /// # Arguments
    /// * `center_freq` - Frequency to remove (Hz)
    /// * `sample_rate` - Sampling rate (Hz)
    /// * `q_factor` - Quality factor, center / -3 dB bandwidth (typical: 30)
    pub fn design(center_freq: f64, sample_rate: f64, q_factor: f64) -> SosFilter {
        let w0 = 2.0 * PI * center_freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q_factor);
        let a0 = 1.0 + alpha;

        let coeffs = BiquadCoeffs {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        };

        SosFilter::new(vec![coeffs], 1.0)
    }
}

fn nyquist(sample_rate: f64) -> f64 {
    sample_rate / 2.0
}

fn check_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(NextMindError::InvalidFilterParams(format!(
            "sample rate must be positive, got {}",
            sample_rate
        )));
    }
    Ok(())
}

/// Check bandpass parameters against the sampling rate
pub fn validate_bandpass(low_hz: f64, high_hz: f64, order: usize, sample_rate: f64) -> Result<()> {
    check_sample_rate(sample_rate)?;
    let nyq = nyquist(sample_rate);

    if !low_hz.is_finite() || !high_hz.is_finite() || low_hz <= 0.0 {
        return Err(NextMindError::InvalidFilterParams(format!(
            "bandpass cutoffs must be positive and finite, got {} - {} Hz",
            low_hz, high_hz
        )));
    }
    if low_hz >= high_hz {
        return Err(NextMindError::InvalidFilterParams(format!(
            "low cutoff ({} Hz) must be less than high cutoff ({} Hz)",
            low_hz, high_hz
        )));
    }
    if low_hz >= nyq || high_hz >= nyq {
        return Err(NextMindError::InvalidFilterParams(format!(
            "bandpass cutoffs {} - {} Hz must be below Nyquist ({} Hz)",
            low_hz, high_hz, nyq
        )));
    }
    if order == 0 {
        return Err(NextMindError::InvalidFilterParams(
            "filter order must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Check notch parameters against the sampling rate
pub fn validate_notch(freq_hz: f64, quality_factor: f64, sample_rate: f64) -> Result<()> {
    check_sample_rate(sample_rate)?;
    let nyq = nyquist(sample_rate);

    if !freq_hz.is_finite() || freq_hz <= 0.0 || freq_hz >= nyq {
        return Err(NextMindError::InvalidFilterParams(format!(
            "notch frequency ({} Hz) must be between 0 and Nyquist ({} Hz)",
            freq_hz, nyq
        )));
    }
    if !quality_factor.is_finite() || quality_factor <= 0.0 {
        return Err(NextMindError::InvalidFilterParams(format!(
            "quality factor must be positive, got {}",
            quality_factor
        )));
    }
    Ok(())
}

/// Validate and design a Butterworth bandpass
pub fn design_bandpass(low_hz: f64, high_hz: f64, order: usize, sample_rate: f64) -> Result<SosFilter> {
    validate_bandpass(low_hz, high_hz, order, sample_rate)?;
    log::debug!(
        "Designing order-{} Butterworth bandpass {} - {} Hz at {} Hz",
        order,
        low_hz,
        high_hz,
        sample_rate
    );
    Ok(ButterworthFilter::bandpass(low_hz, high_hz, sample_rate, order))
}

/// Validate and design a notch
pub fn design_notch(freq_hz: f64, quality_factor: f64, sample_rate: f64) -> Result<SosFilter> {
    validate_notch(freq_hz, quality_factor, sample_rate)?;
    log::debug!(
        "Designing notch at {} Hz (Q={}) for {} Hz",
        freq_hz,
        quality_factor,
        sample_rate
    );
    Ok(NotchFilter::design(freq_hz, sample_rate, quality_factor))
}
