//! Error types for the platform layer.

use thiserror::Error;

/// Error type for window and surface management.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan-related errors raised outside the RHI crate
    #[error("Vulkan error: {0}")]
    Vulkan(String),
}

/// Result type alias using the platform Error type.
pub type Result<T> = std::result::Result<T, Error>;
