//! Physical device selection and queue family resolution.
//!
//! Devices are ranked by a capability score and the highest-scoring GPU is
//! checked against the application requirements. Only the winner is checked:
//! if the best-rated GPU cannot drive the surface, selection fails rather
//! than silently falling back to a weaker adapter.

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::swapchain::SwapchainSupport;

/// Score bonus for discrete GPUs over integrated or virtual adapters.
const DISCRETE_GPU_BONUS: u32 = 1000;

/// Queue family indices required by the renderer.
///
/// The graphics and present families may resolve to the same index; on most
/// hardware they do.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Whether both required families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// The distinct resolved family indices, for queue creation.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        families.sort_unstable();
        families.dedup();
        families
    }
}

/// A physical device that passed selection, together with its resolved
/// queue families.
pub struct SelectedDevice {
    pub handle: vk::PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
}

/// Pick the most capable physical device that can render to `surface`.
///
/// Every enumerated device is scored with [`rate_device`]; the single
/// highest-scoring device (earliest wins a tie) is then checked for complete
/// queue family support, the swapchain extension, and an adequate surface.
///
/// # Errors
/// Returns [`RhiError::NoSuitableDevice`] if no devices are present, if the
/// best-rated device scores zero, or if it fails any of the suitability
/// checks above.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> RhiResult<SelectedDevice> {
    // SAFETY: The instance is valid for the duration of this call.
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        return Err(RhiError::NoSuitableDevice);
    }

    let scores: Vec<u32> = devices
        .iter()
        .map(|&device| {
            // SAFETY: Each handle comes from enumerate_physical_devices on
            // this instance.
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let features = unsafe { instance.get_physical_device_features(device) };
            let score = rate_device(&properties, &features);
            debug!(
                name = ?properties.device_name_as_c_str().unwrap_or(c"<unknown>"),
                score,
                "Rated physical device"
            );
            score
        })
        .collect();

    let best = best_candidate(&scores).ok_or(RhiError::NoSuitableDevice)?;
    let handle = devices[best];

    let queue_families = find_queue_families(instance, surface_loader, surface, handle)?;
    if !queue_families.is_complete() {
        return Err(RhiError::NoSuitableDevice);
    }
    if !supports_swapchain_extension(instance, handle)? {
        return Err(RhiError::NoSuitableDevice);
    }
    if !SwapchainSupport::query(surface_loader, surface, handle)?.is_adequate() {
        return Err(RhiError::NoSuitableDevice);
    }

    // SAFETY: handle is a valid physical device.
    let properties = unsafe { instance.get_physical_device_properties(handle) };
    info!(
        name = ?properties.device_name_as_c_str().unwrap_or(c"<unknown>"),
        score = scores[best],
        graphics_family = queue_families.graphics,
        present_family = queue_families.present,
        "Selected physical device"
    );

    Ok(SelectedDevice {
        handle,
        queue_families,
    })
}

/// Rate a device's capability for this renderer.
///
/// Discrete GPUs get a flat bonus, then the maximum 2D image dimension is
/// added as a rough proxy for overall capability. Devices without geometry
/// shader support score zero regardless of everything else.
pub fn rate_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
) -> u32 {
    if features.geometry_shader == vk::FALSE {
        return 0;
    }

    let mut score = 0u32;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += DISCRETE_GPU_BONUS;
    }
    score += properties.limits.max_image_dimension2_d;
    score
}

/// Index of the highest positive score, keeping the earliest on ties.
///
/// `Iterator::max_by_key` keeps the last maximum, so the scan is explicit.
fn best_candidate(scores: &[u32]) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score > 0 && best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Whether `device` exposes the `VK_KHR_swapchain` extension.
fn supports_swapchain_extension(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
) -> RhiResult<bool> {
    // SAFETY: device is a valid physical device from this instance.
    let extensions = unsafe { instance.enumerate_device_extension_properties(device)? };
    Ok(extensions.iter().any(|ext| {
        ext.extension_name_as_c_str()
            .is_ok_and(|name| name == ash::khr::swapchain::NAME)
    }))
}

/// Resolve the graphics and present queue families for `device`.
///
/// The first family advertising graphics support and the first family that
/// can present to the surface are recorded; the scan stops as soon as both
/// are found.
pub fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    device: vk::PhysicalDevice,
) -> RhiResult<QueueFamilyIndices> {
    // SAFETY: device is a valid physical device from this instance.
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();
    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        if indices.graphics.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics = Some(index);
        }
        if indices.present.is_none() {
            // SAFETY: index is in range for this device's queue families and
            // the surface belongs to the same instance.
            let supported = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if supported {
                indices.present = Some(index);
            }
        }
        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capable_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        }
    }

    fn device_properties(
        device_type: vk::PhysicalDeviceType,
        max_image_dimension2_d: u32,
    ) -> vk::PhysicalDeviceProperties {
        vk::PhysicalDeviceProperties {
            device_type,
            limits: vk::PhysicalDeviceLimits {
                max_image_dimension2_d,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn discrete_gpu_gets_bonus() {
        let discrete = device_properties(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = device_properties(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);
        let features = capable_features();

        assert_eq!(rate_device(&discrete, &features), 1000 + 4096);
        assert_eq!(rate_device(&integrated, &features), 4096);
    }

    #[test]
    fn missing_geometry_shader_zeroes_score() {
        let properties = device_properties(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        let features = vk::PhysicalDeviceFeatures::default();

        assert_eq!(rate_device(&properties, &features), 0);
    }

    #[test]
    fn best_candidate_prefers_highest_score() {
        assert_eq!(best_candidate(&[100, 5096, 4096]), Some(1));
    }

    #[test]
    fn best_candidate_keeps_earliest_on_tie() {
        assert_eq!(best_candidate(&[4096, 5096, 5096]), Some(1));
        assert_eq!(best_candidate(&[5096, 5096]), Some(0));
    }

    #[test]
    fn best_candidate_rejects_all_zero() {
        assert_eq!(best_candidate(&[0, 0, 0]), None);
        assert_eq!(best_candidate(&[]), None);
    }

    #[test]
    fn queue_indices_complete_only_with_both() {
        let mut indices = QueueFamilyIndices::default();
        assert!(!indices.is_complete());

        indices.graphics = Some(0);
        assert!(!indices.is_complete());

        indices.present = Some(2);
        assert!(indices.is_complete());
    }

    #[test]
    fn unique_families_deduplicates_shared_family() {
        let shared = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics: Some(1),
            present: Some(3),
        };
        assert_eq!(split.unique_families(), vec![1, 3]);
    }
}
