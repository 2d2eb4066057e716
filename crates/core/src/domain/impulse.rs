//! Synthetic reverb impulse response
//!
//! The convolution stage uses decaying stereo noise instead of a recorded
//! room: `uniform(-1, 1) * (1 - i / length)^2`, drawn independently for each
//! channel and regenerated every time a graph is constructed.

use rand::Rng;

/// Number of channels in a generated impulse
pub const IMPULSE_CHANNELS: usize = 2;

/// Multichannel impulse response buffer
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl ImpulseResponse {
    /// Generate a fresh impulse of `seconds` at `sample_rate` using the thread RNG
    pub fn generate(sample_rate: u32, seconds: f32) -> Self {
        Self::generate_with(&mut rand::rng(), sample_rate, seconds)
    }

    /// Generate with a caller-provided RNG
    pub fn generate_with<R: Rng>(rng: &mut R, sample_rate: u32, seconds: f32) -> Self {
        let length = (sample_rate as f32 * seconds.max(0.0)).round() as usize;

        let channels = (0..IMPULSE_CHANNELS)
            .map(|_| {
                (0..length)
                    .map(|i| {
                        let decay = (1.0 - i as f32 / length as f32).powi(2);
                        rng.random_range(-1.0_f32..1.0) * decay
                    })
                    .collect()
            })
            .collect();

        Self {
            sample_rate,
            channels,
        }
    }

    /// All-zero impulse, mostly useful in tests
    pub fn silent(channels: usize, length: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; length]; channels],
        }
    }

    /// Build from explicit channel data
    pub fn from_channels(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in frames
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}
