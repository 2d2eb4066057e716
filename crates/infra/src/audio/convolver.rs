//! FFT convolution for the reverb stage
//!
//! Uniform overlap-add: each incoming block (at most `block_size` samples) is
//! zero-padded to the FFT size, multiplied with the precomputed impulse
//! spectrum and transformed back. The part of the result that extends past the
//! block is carried over and added to the following blocks, so the reverb tail
//! survives block boundaries with no added latency.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use voicefocus_core::domain::dsp::Effect;
use voicefocus_core::domain::impulse::ImpulseResponse;

/// Largest block processed in one FFT pass
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Mono overlap-add convolver
pub struct FftConvolver {
    block_size: usize,
    fft_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Spectrum of the zero-padded impulse
    kernel: Vec<Complex<f32>>,
    /// Pending tail, already aligned to the next output sample
    overlap: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl FftConvolver {
    pub fn new(impulse: &[f32], block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let fft_size = (block_size + impulse.len().max(1) - 1).next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let mut kernel: Vec<Complex<f32>> = impulse.iter().map(|&s| Complex::new(s, 0.0)).collect();
        kernel.resize(fft_size, Complex::new(0.0, 0.0));
        forward.process(&mut kernel);

        Self {
            block_size,
            fft_size,
            forward,
            inverse,
            kernel,
            overlap: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    /// Convolver for the first channel of `impulse`
    ///
    /// The render graph is mono; the remaining channels are unused.
    pub fn from_impulse(impulse: &ImpulseResponse) -> Self {
        Self::new(impulse.channel(0).unwrap_or(&[]), DEFAULT_BLOCK_SIZE)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    fn process_block(&mut self, block: &mut [f32]) {
        let n = block.len();

        for (slot, &sample) in self.buffer.iter_mut().zip(block.iter()) {
            *slot = Complex::new(sample, 0.0);
        }
        self.buffer[n..].fill(Complex::new(0.0, 0.0));

        self.forward.process(&mut self.buffer);
        for (bin, k) in self.buffer.iter_mut().zip(&self.kernel) {
            *bin = *bin * *k;
        }
        self.inverse.process(&mut self.buffer);

        // rustfft does not normalise the inverse transform
        let norm = 1.0 / self.fft_size as f32;
        for (acc, bin) in self.overlap.iter_mut().zip(&self.buffer) {
            *acc += bin.re * norm;
        }

        block.copy_from_slice(&self.overlap[..n]);
        self.overlap.copy_within(n.., 0);
        let len = self.overlap.len();
        self.overlap[len - n..].fill(0.0);
    }
}

impl Effect for FftConvolver {
    fn process(&mut self, buffer: &mut [f32]) {
        for block in buffer.chunks_mut(self.block_size) {
            self.process_block(block);
        }
    }

    fn reset(&mut self) {
        self.overlap.fill(0.0);
    }

    fn name(&self) -> &str {
        "Convolver"
    }
}
