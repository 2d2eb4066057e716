//! Sample processing behind the graph builder
//!
//! - [`RenderGraph`]: the [`AudioBackend`](voicefocus_core::domain::graph::AudioBackend)
//!   page runtimes drive
//! - [`FftConvolver`]: FFT overlap-add convolution for the reverb stage

pub mod convolver;
pub mod render;

pub use convolver::FftConvolver;
pub use render::RenderGraph;
