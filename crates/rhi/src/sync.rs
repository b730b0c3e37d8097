//! Frame synchronization primitives.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// The two semaphores driving the single-buffered frame loop.
///
/// `image_available` is signalled when an acquired swapchain image is ready
/// to render to; `render_finished` is signalled when the submitted draw
/// completes and presentation may read the image. One pair suffices because
/// only one frame is ever in flight.
pub struct SyncPrimitives {
    device: Arc<Device>,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl SyncPrimitives {
    /// Create both semaphores.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        // SAFETY: A default semaphore create info is always valid. If the
        // second creation fails the first semaphore is destroyed before
        // returning.
        let image_available = unsafe {
            device
                .handle()
                .create_semaphore(&create_info, None)
                .map_err(RhiError::SynchronizationObject)?
        };
        let render_finished = unsafe {
            device
                .handle()
                .create_semaphore(&create_info, None)
                .map_err(RhiError::SynchronizationObject)
        };
        let render_finished = match render_finished {
            Ok(semaphore) => semaphore,
            Err(err) => {
                // SAFETY: image_available was created above and nothing
                // references it yet.
                unsafe { device.handle().destroy_semaphore(image_available, None) };
                return Err(err);
            }
        };

        debug!("Frame semaphores created");

        Ok(Self {
            device,
            image_available,
            render_finished,
        })
    }

    /// Semaphore signalled when an acquired image is ready for rendering.
    #[inline]
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available
    }

    /// Semaphore signalled when rendering completes.
    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }
}

impl Drop for SyncPrimitives {
    fn drop(&mut self) {
        // SAFETY: The device is idle at teardown, so neither semaphore is
        // pending.
        unsafe {
            self.device
                .handle()
                .destroy_semaphore(self.image_available, None);
            self.device
                .handle()
                .destroy_semaphore(self.render_finished, None);
        }
        debug!("Frame semaphores destroyed");
    }
}
