//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance creation and validation layers
//! - Physical device selection and logical device creation
//! - Swapchain negotiation and management
//! - Render pass and graphics pipeline construction
//! - Framebuffers and pre-recorded command buffers
//! - Synchronization primitives

mod error;

pub mod device;
pub mod frame_resources;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
