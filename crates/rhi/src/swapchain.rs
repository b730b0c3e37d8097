//! Swapchain negotiation, creation, and presentation.
//!
//! Surface format, present mode, extent, and image count are each negotiated
//! against what the surface reports, then the swapchain and one image view
//! per swapchain image are created in one pass.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// What the surface supports for a given physical device.
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query surface capabilities, formats, and present modes.
    pub fn query(
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> RhiResult<Self> {
        // SAFETY: The device and surface belong to the same instance and are
        // valid for the duration of these calls.
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(device, surface)?,
                formats: surface_loader.get_physical_device_surface_formats(device, surface)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(device, surface)?,
            })
        }
    }

    /// Whether at least one format and one present mode are available.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// RAII wrapper for the swapchain, its images, and their image views.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the given surface.
    ///
    /// `window_extent` is the framebuffer size used when the surface leaves
    /// the extent up to the swapchain.
    ///
    /// # Errors
    /// Returns [`RhiError::SwapchainCreation`] if the surface reports no
    /// formats or present modes or the driver rejects the create info, and
    /// [`RhiError::ImageViewCreation`] if a view cannot be created.
    pub fn new(
        instance: &ash::Instance,
        device: Arc<Device>,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        window_extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let support = SwapchainSupport::query(surface_loader, surface, device.physical_device())?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainCreation(
                vk::Result::ERROR_INITIALIZATION_FAILED,
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = determine_image_count(&support.capabilities);

        debug!(
            format = ?surface_format.format,
            color_space = ?surface_format.color_space,
            ?present_mode,
            width = extent.width,
            height = extent.height,
            image_count,
            "Negotiated swapchain parameters"
        );

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let (sharing_mode, family_indices) =
            resolve_sharing_mode(device.graphics_family(), device.present_family());
        create_info = create_info.image_sharing_mode(sharing_mode);
        if !family_indices.is_empty() {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let loader = ash::khr::swapchain::Device::new(instance, device.handle());

        // SAFETY: The surface and device are valid and the create info only
        // references stack data live for this call.
        let handle = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(RhiError::SwapchainCreation)?
        };

        // SAFETY: The swapchain was just created from this loader.
        let images = unsafe { loader.get_swapchain_images(handle)? };

        let image_views = create_image_views(&device, &images, surface_format.format)
            .inspect_err(|_| {
                // SAFETY: The swapchain is valid and no views survived.
                unsafe { loader.destroy_swapchain(handle, None) };
            })?;

        info!(
            images = images.len(),
            "Swapchain created"
        );

        Ok(Self {
            device,
            loader,
            handle,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Get the raw swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Get the swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the swapchain extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of images in the swapchain.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Get the image views, one per swapchain image.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Acquire the next presentable image, signalling `semaphore` when the
    /// image is ready to be rendered to.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> RhiResult<u32> {
        // SAFETY: The semaphore is unsignalled and owned by the same device.
        let (index, _suboptimal) = unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())?
        };
        Ok(index)
    }

    /// Queue presentation of `image_index`, waiting on `wait_semaphore`.
    ///
    /// # Errors
    /// Any outcome other than clean success, including a suboptimal
    /// swapchain, is reported as [`RhiError::Presentation`]. The window is
    /// fixed-size, so a suboptimal surface means something is genuinely
    /// wrong rather than a pending resize.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RhiResult<()> {
        let wait_semaphores = [wait_semaphore];
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: The queue belongs to the device this swapchain was created
        // from and the image index came from acquire_next_image.
        let suboptimal = unsafe {
            self.loader
                .queue_present(queue, &present_info)
                .map_err(RhiError::Presentation)?
        };
        if suboptimal {
            return Err(RhiError::Presentation(vk::Result::SUBOPTIMAL_KHR));
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: The device is idle at teardown; views are destroyed before
        // the swapchain that owns their images.
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.handle, None);
        }
        debug!("Swapchain destroyed");
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());
    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        // SAFETY: The image belongs to the swapchain on this device.
        let view = unsafe {
            device
                .handle()
                .create_image_view(&create_info, None)
                .map_err(RhiError::ImageViewCreation)
        };
        match view {
            Ok(view) => views.push(view),
            Err(err) => {
                // SAFETY: Only views created above are destroyed.
                unsafe {
                    for &view in &views {
                        device.handle().destroy_image_view(view, None);
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(views)
}

/// Pick the surface format: 8-bit sRGB BGRA with a nonlinear sRGB color
/// space when available, otherwise whatever the surface lists first.
///
/// # Panics
/// Panics if `formats` is empty; callers check
/// [`SwapchainSupport::is_adequate`] first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0])
}

/// Pick the present mode: mailbox when available, otherwise FIFO, which
/// every conformant implementation supports.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Resolve the swapchain extent.
///
/// When the surface pins the extent it is used as-is; the all-ones sentinel
/// means the swapchain picks, so the window's framebuffer size is clamped
/// into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Resolve how swapchain images are shared between the graphics and present
/// queues.
///
/// Images need CONCURRENT sharing, listing both families, only when the two
/// queues live in different families; a shared family uses EXCLUSIVE with no
/// index list.
pub fn resolve_sharing_mode(
    graphics_family: u32,
    present_family: u32,
) -> (vk::SharingMode, Vec<u32>) {
    if graphics_family == present_family {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![graphics_family, present_family],
        )
    }
}

/// One more image than the minimum, so the driver never stalls waiting for
/// an image while another is being presented. A maximum of zero means
/// unbounded.
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn surface_format_prefers_bgra_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_requires_matching_color_space() {
        let formats = [
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(
            chosen.color_space,
            vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT
        );
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_extent_when_pinned() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn extent_clamps_window_size_when_unpinned() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 200,
                height: 200,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 1920,
                height: 100,
            },
        );
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 200);
    }

    #[test]
    fn sharing_is_exclusive_for_shared_family() {
        let (mode, families) = resolve_sharing_mode(2, 2);
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(families.is_empty());
    }

    #[test]
    fn sharing_is_concurrent_for_split_families() {
        let (mode, families) = resolve_sharing_mode(0, 1);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![0, 1]);

        let (mode, families) = resolve_sharing_mode(1, 0);
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(families, vec![1, 0]);
    }

    #[test]
    fn image_count_is_one_over_minimum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_respects_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_ignores_unbounded_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 4,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capabilities), 5);
    }
}
