//! Hosted pages: their event loops, the registry the coordinator broadcasts
//! through, and a directory-backed document for pages hosted by the CLI

pub mod document;
pub mod hub;
pub mod runtime;

pub use document::{DocumentError, WatchedDirectory};
pub use hub::PageHub;
pub use runtime::{PageHandle, PageRuntime};
