//! Platform abstraction layer for the triangle renderer.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation and the platform-required instance extensions

mod window;

pub use window::{Surface, Window, get_required_extensions};

// Re-export winit types that users might need
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
