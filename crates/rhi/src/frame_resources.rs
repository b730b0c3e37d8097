//! Framebuffers and pre-recorded command buffers.
//!
//! The scene never changes, so each swapchain image gets one command buffer
//! recorded once at startup and replayed every frame.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::pipeline::{Pipeline, RenderPass};
use crate::swapchain::Swapchain;

const CLEAR_COLOR: vk::ClearValue = vk::ClearValue {
    color: vk::ClearColorValue {
        float32: [0.0, 0.0, 0.0, 1.0],
    },
};

/// Framebuffers, the command pool, and one recorded command buffer per
/// swapchain image.
pub struct FrameResources {
    device: Arc<Device>,
    framebuffers: Vec<vk::Framebuffer>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
}

impl FrameResources {
    /// Create framebuffers and record the draw commands for every swapchain
    /// image.
    ///
    /// # Errors
    /// Returns [`RhiError::FramebufferCreation`] or
    /// [`RhiError::CommandBuffer`] for the step that failed; anything
    /// already created is destroyed before returning.
    pub fn new(
        device: Arc<Device>,
        swapchain: &Swapchain,
        render_pass: &RenderPass,
        pipeline: &Pipeline,
    ) -> RhiResult<Self> {
        let framebuffers = create_framebuffers(&device, swapchain, render_pass)?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(device.graphics_family());
        // SAFETY: The graphics family index was resolved during device
        // selection.
        let command_pool = unsafe {
            device
                .handle()
                .create_command_pool(&pool_info, None)
                .map_err(RhiError::CommandBuffer)
        };
        let command_pool = match command_pool {
            Ok(pool) => pool,
            Err(err) => {
                destroy_framebuffers(&device, &framebuffers);
                return Err(err);
            }
        };

        let command_buffers = allocate_and_record(
            &device,
            command_pool,
            &framebuffers,
            swapchain.extent(),
            render_pass,
            pipeline,
        );
        let command_buffers = match command_buffers {
            Ok(buffers) => buffers,
            Err(err) => {
                // SAFETY: Destroying the pool frees any buffers allocated
                // from it.
                unsafe { device.handle().destroy_command_pool(command_pool, None) };
                destroy_framebuffers(&device, &framebuffers);
                return Err(err);
            }
        };

        info!(
            framebuffers = framebuffers.len(),
            "Frame resources recorded"
        );

        Ok(Self {
            device,
            framebuffers,
            command_pool,
            command_buffers,
        })
    }

    /// Get the recorded command buffer for a swapchain image index.
    #[inline]
    pub fn command_buffer(&self, image_index: u32) -> vk::CommandBuffer {
        self.command_buffers[image_index as usize]
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        // SAFETY: The device is idle at teardown; destroying the pool frees
        // its command buffers.
        unsafe {
            self.device
                .handle()
                .destroy_command_pool(self.command_pool, None);
        }
        destroy_framebuffers(&self.device, &self.framebuffers);
        debug!("Frame resources destroyed");
    }
}

fn create_framebuffers(
    device: &Device,
    swapchain: &Swapchain,
    render_pass: &RenderPass,
) -> RhiResult<Vec<vk::Framebuffer>> {
    let extent = swapchain.extent();
    let mut framebuffers = Vec::with_capacity(swapchain.image_count());
    for &view in swapchain.image_views() {
        let attachments = [view];
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        // SAFETY: The view and render pass are valid and compatible; the
        // attachment array outlives the call.
        let framebuffer = unsafe {
            device
                .handle()
                .create_framebuffer(&create_info, None)
                .map_err(RhiError::FramebufferCreation)
        };
        match framebuffer {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(err) => {
                destroy_framebuffers(device, &framebuffers);
                return Err(err);
            }
        }
    }
    Ok(framebuffers)
}

fn destroy_framebuffers(device: &Device, framebuffers: &[vk::Framebuffer]) {
    // SAFETY: Each framebuffer was created on this device and is destroyed
    // exactly once.
    unsafe {
        for &framebuffer in framebuffers {
            device.handle().destroy_framebuffer(framebuffer, None);
        }
    }
}

fn allocate_and_record(
    device: &Device,
    pool: vk::CommandPool,
    framebuffers: &[vk::Framebuffer],
    extent: vk::Extent2D,
    render_pass: &RenderPass,
    pipeline: &Pipeline,
) -> RhiResult<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(framebuffers.len() as u32);

    // SAFETY: The pool is valid and owned by this device.
    let command_buffers = unsafe {
        device
            .handle()
            .allocate_command_buffers(&alloc_info)
            .map_err(RhiError::CommandBuffer)?
    };

    for (&command_buffer, &framebuffer) in command_buffers.iter().zip(framebuffers) {
        let begin_info = vk::CommandBufferBeginInfo::default();
        let clear_values = [CLEAR_COLOR];
        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D::default().extent(extent))
            .clear_values(&clear_values);

        // SAFETY: The buffer is in the initial state; all referenced
        // handles are valid and the recorded objects outlive the buffer.
        unsafe {
            device
                .handle()
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(RhiError::CommandBuffer)?;
            device.handle().cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
            device.handle().cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.handle(),
            );
            device.handle().cmd_draw(command_buffer, 3, 1, 0, 0);
            device.handle().cmd_end_render_pass(command_buffer);
            device
                .handle()
                .end_command_buffer(command_buffer)
                .map_err(RhiError::CommandBuffer)?;
        }
    }

    Ok(command_buffers)
}
