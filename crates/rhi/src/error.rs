//! RHI-specific error types.
//!
//! Every GPU object creation step is checked immediately and fails fast;
//! these variants mirror the individual setup steps so a failure names the
//! stage that rejected it.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Validation requested but the layer is not installed
    #[error("Validation layer {0:?} requested but not available")]
    ValidationLayerUnavailable(String),

    /// Instance creation rejected by the driver
    #[error("Instance creation failed: {0}")]
    InstanceCreation(#[source] vk::Result),

    /// No GPU meets the application requirements
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Logical device creation failed
    #[error("Logical device creation failed: {0}")]
    LogicalDeviceCreation(#[source] vk::Result),

    /// Surface creation error (raised by the platform layer)
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(#[source] vk::Result),

    /// Swapchain image view creation failed
    #[error("Image view creation failed: {0}")]
    ImageViewCreation(#[source] vk::Result),

    /// Render pass creation failed
    #[error("Render pass creation failed: {0}")]
    RenderPassCreation(#[source] vk::Result),

    /// Shader module error
    #[error("Shader error: {0}")]
    Shader(String),

    /// Graphics pipeline creation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(#[source] vk::Result),

    /// Framebuffer creation failed
    #[error("Framebuffer creation failed: {0}")]
    FramebufferCreation(#[source] vk::Result),

    /// Command pool creation, allocation, or recording failed
    #[error("Command buffer error: {0}")]
    CommandBuffer(#[source] vk::Result),

    /// Semaphore creation failed
    #[error("Synchronization object creation failed: {0}")]
    SynchronizationObject(#[source] vk::Result),

    /// Presentation request returned a non-success result
    #[error("Presentation failed: {0}")]
    Presentation(#[source] vk::Result),

    /// Vulkan error from a query call not covered above
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
