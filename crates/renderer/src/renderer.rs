//! Renderer construction and teardown.

use std::ffi::CStr;
use std::sync::Arc;

use ash::vk;
use tracing::{error, info};

use triangle_platform::{Surface, Window, get_required_extensions};
use triangle_rhi::device::Device;
use triangle_rhi::frame_resources::FrameResources;
use triangle_rhi::instance::Instance;
use triangle_rhi::physical_device::select_physical_device;
use triangle_rhi::pipeline::{Pipeline, RenderPass};
use triangle_rhi::swapchain::Swapchain;
use triangle_rhi::sync::SyncPrimitives;
use triangle_rhi::{RhiError, RhiResult};

use crate::frame::{FrameBackend, drive_frame};

/// Construction parameters for the renderer.
pub struct RendererOptions<'a> {
    /// Application name reported to the Vulkan driver.
    pub app_name: &'a CStr,
    /// Request validation layers and a debug messenger.
    pub enable_validation: bool,
    /// Compiled SPIR-V for the vertex stage.
    pub vertex_shader: &'a [u8],
    /// Compiled SPIR-V for the fragment stage.
    pub fragment_shader: &'a [u8],
}

/// Owns every Vulkan object from instance to frame semaphores.
///
/// Fields are declared children-first so the implicit drop order tears the
/// chain down correctly: semaphores through swapchain release their device
/// references, then the device itself goes, then the surface, then the
/// instance.
pub struct Renderer {
    sync: SyncPrimitives,
    frame_resources: FrameResources,
    // Referenced only by the recorded command buffers; kept alive here.
    _pipeline: Pipeline,
    _render_pass: RenderPass,
    swapchain: Swapchain,
    device: Arc<Device>,
    _surface: Surface,
    _instance: Instance,
}

impl Renderer {
    /// Bring up the full Vulkan stack for `window`.
    ///
    /// Runs the entire initialization chain: instance (with optional
    /// validation), surface, device selection and creation, swapchain,
    /// render pass, pipeline, framebuffers with recorded command buffers,
    /// and the frame semaphores. Any failure aborts construction and the
    /// objects created so far unwind in reverse order.
    pub fn new(window: &Window, options: &RendererOptions<'_>) -> RhiResult<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceCreation(e.to_string()))?;
        let surface_extensions = get_required_extensions(display_handle.as_raw())
            .map_err(|e| RhiError::SurfaceCreation(e.to_string()))?;

        let instance = Instance::new(
            options.app_name,
            &surface_extensions,
            options.enable_validation,
        )?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceCreation(e.to_string()))?;
        let surface_handle = surface.handle();

        let selected =
            select_physical_device(instance.handle(), surface.loader(), surface_handle)?;
        let device = Arc::new(Device::new(instance.handle(), &selected)?);

        let swapchain = Swapchain::new(
            instance.handle(),
            device.clone(),
            surface.loader(),
            surface_handle,
            vk::Extent2D {
                width: window.width(),
                height: window.height(),
            },
        )?;

        let render_pass = RenderPass::new(device.clone(), swapchain.format())?;
        let pipeline = Pipeline::new(
            device.clone(),
            &render_pass,
            swapchain.extent(),
            options.vertex_shader,
            options.fragment_shader,
        )?;
        let frame_resources =
            FrameResources::new(device.clone(), &swapchain, &render_pass, &pipeline)?;
        let sync = SyncPrimitives::new(device.clone())?;

        info!("Renderer initialized");

        Ok(Self {
            sync,
            frame_resources,
            _pipeline: pipeline,
            _render_pass: render_pass,
            swapchain,
            device,
            _surface: surface,
            _instance: instance,
        })
    }

    /// Render and present one frame.
    pub fn draw_frame(&mut self) -> RhiResult<()> {
        drive_frame(self)
    }

    /// Block until the GPU finishes all submitted work.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }
}

impl FrameBackend for Renderer {
    fn acquire_image(&mut self) -> RhiResult<u32> {
        self.swapchain.acquire_next_image(self.sync.image_available())
    }

    fn submit_draw(&mut self, image_index: u32) -> RhiResult<()> {
        let wait_semaphores = [self.sync.image_available()];
        // The clear and draw cannot start writing the attachment until the
        // acquired image is actually available.
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.frame_resources.command_buffer(image_index)];
        let signal_semaphores = [self.sync.render_finished()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: The command buffer is recorded and the semaphores belong
        // to this device. No fence is needed with a single frame in flight.
        unsafe {
            self.device
                .handle()
                .queue_submit(
                    self.device.graphics_queue(),
                    &[submit_info],
                    vk::Fence::null(),
                )
                .map_err(RhiError::from)
        }
    }

    fn present_image(&mut self, image_index: u32) -> RhiResult<()> {
        self.swapchain
            .present(self.device.present_queue(), image_index, self.sync.render_finished())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // Let in-flight work retire before the field drops destroy anything.
        if let Err(err) = self.device.wait_idle() {
            error!("Failed to wait for device idle during teardown: {err}");
        }
        info!("Renderer shut down");
    }
}
