//! Shader module creation from SPIR-V binaries.

use std::io::Cursor;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// RAII wrapper for a Vulkan shader module.
///
/// Shader modules are only needed while the pipeline is being linked; the
/// pipeline builder drops them as soon as the pipeline exists.
pub struct ShaderModule {
    device: Arc<Device>,
    handle: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from raw SPIR-V bytes.
    ///
    /// The bytes are re-aligned to the 4-byte words Vulkan expects, so the
    /// slice can come straight from `fs::read`.
    ///
    /// # Errors
    /// Returns [`RhiError::Shader`] if the bytes are not valid SPIR-V
    /// (wrong length or bad magic number) or the driver rejects the module.
    pub fn from_spirv_bytes(device: Arc<Device>, bytes: &[u8]) -> RhiResult<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| RhiError::Shader(format!("Invalid SPIR-V binary: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

        // SAFETY: code is valid SPIR-V per read_spv and outlives the call.
        let handle = unsafe {
            device
                .handle()
                .create_shader_module(&create_info, None)
                .map_err(|e| RhiError::Shader(format!("Shader module creation failed: {}", e)))?
        };

        debug!(bytes = bytes.len(), "Shader module created");

        Ok(Self { device, handle })
    }

    /// Get the raw shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        // SAFETY: The module is not referenced once the pipeline it was
        // linked into has been created.
        unsafe {
            self.device.handle().destroy_shader_module(self.handle, None);
        }
    }
}
