//! Voice Focus core: the audio processing graph manager and its collaborators
//!
//! Everything in this crate is platform-agnostic. Concrete audio rendering,
//! page runtimes and file watching live in the `infra` crate.

pub mod domain;

pub use domain::*;
