//! Voice Focus infrastructure
//!
//! Concrete implementations of the core seams: the render backend, page event
//! loops, the page hub, the coordinator runtime and a watched-directory
//! document.

pub mod audio;
pub mod coordinator;
pub mod page;

pub use audio::{FftConvolver, RenderGraph};
pub use coordinator::{CoordinatorError, CoordinatorHandle, CoordinatorRuntime};
pub use page::{PageHandle, PageHub, PageRuntime, WatchedDirectory};
