//! Render pass and fixed-function graphics pipeline construction.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::shader::ShaderModule;

/// RAII wrapper for the render pass.
///
/// A single color attachment matching the swapchain format. The attachment
/// is cleared on load, stored on write, and handed off in present layout, so
/// no explicit layout transitions are needed around the pass.
pub struct RenderPass {
    device: Arc<Device>,
    handle: vk::RenderPass,
}

impl RenderPass {
    /// Create the render pass for a swapchain of the given color format.
    ///
    /// The external subpass dependency makes the color write wait on the
    /// same stage the acquire semaphore is waited at, so the attachment is
    /// not written before its image is available.
    pub fn new(device: Arc<Device>, color_format: vk::Format) -> RhiResult<Self> {
        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)];

        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let attachments = [color_attachment];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        // SAFETY: The create info only references stack arrays that outlive
        // this call.
        let handle = unsafe {
            device
                .handle()
                .create_render_pass(&create_info, None)
                .map_err(RhiError::RenderPassCreation)?
        };

        debug!(format = ?color_format, "Render pass created");

        Ok(Self { device, handle })
    }

    /// Get the raw render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        // SAFETY: The device is idle at teardown and no framebuffer or
        // pipeline referencing this pass survives it.
        unsafe {
            self.device.handle().destroy_render_pass(self.handle, None);
        }
        debug!("Render pass destroyed");
    }
}

/// RAII wrapper for the graphics pipeline and its (empty) layout.
///
/// The pipeline is fully fixed-function configured: vertex positions and
/// colors live in the vertex shader itself, so the vertex input state is
/// empty and no descriptor sets or push constants exist.
pub struct Pipeline {
    device: Arc<Device>,
    layout: vk::PipelineLayout,
    handle: vk::Pipeline,
}

impl Pipeline {
    /// Build the triangle pipeline against `render_pass`.
    ///
    /// Viewport and scissor are baked to `extent`; nothing is dynamic, so
    /// the pipeline is only valid for a swapchain of exactly this size.
    /// Shader modules are created from the provided SPIR-V blobs and
    /// destroyed again before this returns.
    pub fn new(
        device: Arc<Device>,
        render_pass: &RenderPass,
        extent: vk::Extent2D,
        vertex_spirv: &[u8],
        fragment_spirv: &[u8],
    ) -> RhiResult<Self> {
        let vertex_shader = ShaderModule::from_spirv_bytes(device.clone(), vertex_spirv)?;
        let fragment_shader = ShaderModule::from_spirv_bytes(device.clone(), fragment_spirv)?;

        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vertex_shader.handle())
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment_shader.handle())
                .name(c"main"),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport::default()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)];
        let scissors = [vk::Rect2D::default().extent(extent)];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        // SAFETY: An empty layout create info is always valid.
        let layout = unsafe {
            device
                .handle()
                .create_pipeline_layout(&layout_info, None)
                .map_err(RhiError::PipelineCreation)?
        };

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .color_blend_state(&color_blend)
            .layout(layout)
            .render_pass(render_pass.handle())
            .subpass(0);

        // SAFETY: All referenced state lives on the stack above; the shader
        // modules stay alive until after this call returns.
        let pipelines = unsafe {
            device
                .handle()
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        };
        let handle = match pipelines {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                // SAFETY: The layout was created above and nothing else
                // references it yet.
                unsafe { device.handle().destroy_pipeline_layout(layout, None) };
                return Err(RhiError::PipelineCreation(err));
            }
        };

        info!("Graphics pipeline created");

        Ok(Self {
            device,
            layout,
            handle,
        })
    }

    /// Get the raw pipeline handle.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // SAFETY: The device is idle at teardown.
        unsafe {
            self.device.handle().destroy_pipeline(self.handle, None);
            self.device.handle().destroy_pipeline_layout(self.layout, None);
        }
        debug!("Graphics pipeline destroyed");
    }
}
