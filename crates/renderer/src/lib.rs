//! High-level renderer.
//!
//! Owns the full chain of Vulkan objects from instance to semaphores and
//! drives the acquire / submit / present loop each frame.

mod frame;
mod renderer;

pub use frame::{FrameBackend, drive_frame};
pub use renderer::{Renderer, RendererOptions};
