//! Digital Signal Processing primitives behind the voice focus stages
//!
//! This module provides the filters the signal path is built from:
//! - High-pass and notch biquads (RBJ cookbook coefficients)
//! - Soft-knee dynamic range compressor
//! - Plain multiplicative gain
//!
//! The convolution reverb needs an FFT and lives in the `infra` crate.

use serde::{Deserialize, Serialize};

/// Core trait for every sample processor wired into the render graph
///
/// Effects process mono `f32` buffers in-place.
pub trait Effect: Send {
    /// Process a buffer of audio samples in-place
    fn process(&mut self, buffer: &mut [f32]);

    /// Clear internal state (filter memory, envelopes, tails)
    fn reset(&mut self);

    /// Effect name for logging
    fn name(&self) -> &str;
}

/// Parameter constraints for DSP effects
pub mod params {
    /// Floor used when converting silence to decibels
    pub const DB_MIN: f32 = -100.0;

    /// Compressor ratio range (1:1 to 20:1)
    pub const RATIO_MIN: f32 = 1.0;
    pub const RATIO_MAX: f32 = 20.0;

    /// Compressor knee range in dB
    pub const KNEE_MIN: f32 = 0.0;
    pub const KNEE_MAX: f32 = 40.0;

    /// Attack/Release time ranges in seconds
    pub const ATTACK_MIN: f32 = 0.0001;
    pub const ATTACK_MAX: f32 = 1.0;
    pub const RELEASE_MIN: f32 = 0.001;
    pub const RELEASE_MAX: f32 = 1.0;

    /// Lowest usable filter Q
    pub const Q_MIN: f32 = 0.0001;
}

// ============================================================================
// BIQUAD FILTER
// ============================================================================

/// Biquad filter coefficients
///
/// Direct Form I, `a0` normalised to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // Unity gain (no filtering)
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Second-order high-pass
    ///
    /// # Parameters
    /// - `sample_rate`: Audio sample rate in Hz
    /// - `freq`: Cutoff frequency in Hz
    /// - `q`: Resonance, 0.707 for a Butterworth response
    #[must_use]
    pub fn high_pass(sample_rate: f32, freq: f32, q: f32) -> Self {
        let (cos_w0, alpha) = Self::prewarp(sample_rate, freq, q);

        let b0 = (1.0 + cos_w0) / 2.0;
        let b1 = -(1.0 + cos_w0);
        let b2 = (1.0 + cos_w0) / 2.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    /// Band-reject (notch) centred on `freq`
    ///
    /// Higher `q` gives a narrower notch. The response is 0 at `freq` and
    /// unity far away from it.
    #[must_use]
    pub fn notch(sample_rate: f32, freq: f32, q: f32) -> Self {
        let (cos_w0, alpha) = Self::prewarp(sample_rate, freq, q);

        let b0 = 1.0;
        let b1 = -2.0 * cos_w0;
        let b2 = 1.0;

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;

        Self::normalized(b0, b1, b2, a0, a1, a2)
    }

    fn prewarp(sample_rate: f32, freq: f32, q: f32) -> (f32, f32) {
        let nyquist = sample_rate / 2.0;
        let freq = freq.clamp(1.0, nyquist * 0.999);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * q.max(params::Q_MIN));
        (w0.cos(), alpha)
    }

    fn normalized(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Stateful biquad filter using Direct Form I
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    // Previous input samples (x[n-1], x[n-2])
    x1: f32,
    x2: f32,
    // Previous output samples (y[n-1], y[n-2])
    y1: f32,
    y2: f32,
}

impl BiquadFilter {
    /// Create a new biquad filter with given coefficients
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    pub fn coeffs(&self) -> BiquadCoeffs {
        self.coeffs
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
        let y = self.coeffs.b0 * x
            + self.coeffs.b1 * self.x1
            + self.coeffs.b2 * self.x2
            - self.coeffs.a1 * self.y1
            - self.coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = x;
        self.y2 = self.y1;
        self.y1 = y;

        y
    }
}

impl Effect for BiquadFilter {
    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn name(&self) -> &str {
        "Biquad"
    }
}

// ============================================================================
// DYNAMIC RANGE COMPRESSOR
// ============================================================================

/// Compressor parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub ratio: f32,
    pub attack_sec: f32,
    pub release_sec: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -25.0,
            knee_db: 30.0,
            ratio: 3.0,
            attack_sec: 0.005,
            release_sec: 0.25,
        }
    }
}

/// Soft-knee dynamic range compressor (mono)
///
/// Peak envelope follower with separate attack and release smoothing, gain
/// computed from the quadratic knee curve around the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Compressor {
    params: CompressorParams,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
}

impl Compressor {
    pub fn new(params: CompressorParams, sample_rate: u32) -> Self {
        let params = CompressorParams {
            threshold_db: params.threshold_db.clamp(params::DB_MIN, 0.0),
            knee_db: params.knee_db.clamp(params::KNEE_MIN, params::KNEE_MAX),
            ratio: params.ratio.clamp(params::RATIO_MIN, params::RATIO_MAX),
            attack_sec: params.attack_sec.clamp(params::ATTACK_MIN, params::ATTACK_MAX),
            release_sec: params.release_sec.clamp(params::RELEASE_MIN, params::RELEASE_MAX),
        };
        let sample_rate = sample_rate as f32;

        Self {
            params,
            // exp(-1/(time * sample_rate)) for smooth envelope following
            attack_coeff: (-1.0 / (params.attack_sec * sample_rate)).exp(),
            release_coeff: (-1.0 / (params.release_sec * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    pub fn params(&self) -> CompressorParams {
        self.params
    }

    /// Static curve: output level in dB for an input level in dB
    pub fn output_level_db(&self, input_db: f32) -> f32 {
        let CompressorParams {
            threshold_db,
            knee_db,
            ratio,
            ..
        } = self.params;
        let over = input_db - threshold_db;

        if 2.0 * over < -knee_db {
            input_db
        } else if knee_db > 0.0 && 2.0 * over.abs() <= knee_db {
            let x = over + knee_db / 2.0;
            input_db + (1.0 / ratio - 1.0) * x * x / (2.0 * knee_db)
        } else {
            threshold_db + over / ratio
        }
    }

    #[inline]
    fn to_db(level: f32) -> f32 {
        if level < 1e-5 {
            params::DB_MIN
        } else {
            20.0 * level.log10()
        }
    }
}

impl Effect for Compressor {
    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let level = sample.abs();
            let coeff = if level > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

            let envelope_db = Self::to_db(self.envelope);
            let reduction_db = self.output_level_db(envelope_db) - envelope_db;
            *sample *= 10.0_f32.powf(reduction_db / 20.0);
        }
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
    }

    fn name(&self) -> &str {
        "Compressor"
    }
}

// ============================================================================
// GAIN
// ============================================================================

/// Multiplicative gain stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gain {
    factor: f32,
}

impl Gain {
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.max(0.0),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f32) {
        self.factor = factor.max(0.0);
    }
}

impl Effect for Gain {
    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample *= self.factor;
        }
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "Gain"
    }
}
