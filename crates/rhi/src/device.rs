//! Logical device creation and queue retrieval.

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::physical_device::SelectedDevice;

/// RAII wrapper for the Vulkan logical device.
///
/// Owns the device handle and the graphics and present queues retrieved from
/// it. Resource wrappers hold this behind an `Arc` so the device outlives
/// everything created from it.
pub struct Device {
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    graphics_family: u32,
    present_family: u32,
}

impl Device {
    /// Create a logical device from a selected physical device.
    ///
    /// One queue is requested per unique required family; when graphics and
    /// present resolve to the same family only a single queue is created and
    /// both handles alias it.
    ///
    /// # Errors
    /// Returns [`RhiError::LogicalDeviceCreation`] if the driver rejects the
    /// device create info.
    pub fn new(instance: &ash::Instance, selected: &SelectedDevice) -> RhiResult<Self> {
        // Selection guarantees completeness before this point.
        let graphics_family = selected
            .queue_families
            .graphics
            .ok_or(RhiError::NoSuitableDevice)?;
        let present_family = selected
            .queue_families
            .present
            .ok_or(RhiError::NoSuitableDevice)?;

        let queue_priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = selected
            .queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extensions = [ash::khr::swapchain::NAME.as_ptr()];
        // Selection already required geometry shader support.
        let features = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        };

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        // SAFETY: The physical device handle is valid and the create info
        // only references stack data that outlives the call.
        let device = unsafe {
            instance
                .create_device(selected.handle, &create_info, None)
                .map_err(RhiError::LogicalDeviceCreation)?
        };

        // SAFETY: Both families were requested in queue_infos above, each
        // with a single queue at index 0.
        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };

        info!(
            graphics_family,
            present_family,
            shared_family = graphics_family == present_family,
            "Logical device created"
        );

        Ok(Self {
            physical_device: selected.handle,
            device,
            graphics_queue,
            present_queue,
            graphics_family,
            present_family,
        })
    }

    /// Get the raw ash device.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device this logical device was created from.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get the graphics queue.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics queue family index.
    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_family
    }

    /// Get the present queue family index.
    #[inline]
    pub fn present_family(&self) -> u32 {
        self.present_family
    }

    /// Block until the device finishes all pending work.
    ///
    /// Called before teardown so no GPU object is destroyed while a frame
    /// still references it.
    pub fn wait_idle(&self) -> RhiResult<()> {
        // SAFETY: The device is valid; device_wait_idle has no other
        // preconditions.
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // SAFETY: All child objects are destroyed before the device; the
        // renderer enforces teardown order.
        unsafe {
            self.device.destroy_device(None);
        }
        debug!("Logical device destroyed");
    }
}
