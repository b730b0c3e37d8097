//! Vulkan instance creation and validation layer management.

use std::ffi::{CStr, c_char, c_void};

use ash::{ext, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The single validation layer requested in debug configurations.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// RAII wrapper for the Vulkan instance.
///
/// Owns the loaded entry point, the instance handle, and (when validation is
/// enabled) the debug utils messenger. The messenger is destroyed before the
/// instance on drop.
///
/// # Ownership
/// All objects created from this instance (surfaces, devices, swapchains)
/// must be destroyed before this wrapper is dropped.
pub struct Instance {
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
}

struct DebugMessenger {
    loader: ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl Instance {
    /// Create a Vulkan instance targeting API version 1.2.
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `surface_extensions` - Platform surface extensions, as returned by
    ///   the platform layer for the current display
    /// * `enable_validation` - Request `VK_LAYER_KHRONOS_validation` and
    ///   install a debug messenger
    ///
    /// # Errors
    /// Returns [`RhiError::ValidationLayerUnavailable`] if validation was
    /// requested but the layer is not installed. This is fatal by design:
    /// silently dropping validation would hide the exact bugs it is meant to
    /// catch during development.
    pub fn new(
        app_name: &CStr,
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> RhiResult<Self> {
        // SAFETY: Entry::load has no preconditions; it fails cleanly if the
        // Vulkan loader is not present on the system.
        let entry = unsafe { ash::Entry::load()? };

        if enable_validation && !validation_layer_available(&entry)? {
            return Err(RhiError::ValidationLayerUnavailable(
                VALIDATION_LAYER_NAME.to_string_lossy().into_owned(),
            ));
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_2);

        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ext::debug_utils::NAME.as_ptr());
        }

        let layers: Vec<*const c_char> = if enable_validation {
            vec![VALIDATION_LAYER_NAME.as_ptr()]
        } else {
            Vec::new()
        };

        // Chained into the create info so messages emitted during instance
        // creation and destruction are also captured.
        let mut debug_info = debug_messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);
        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        // SAFETY: All pointers in create_info reference data that outlives
        // this call (app_info, extensions, layers are on the stack above).
        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(RhiError::InstanceCreation)?
        };

        info!(
            validation = enable_validation,
            "Vulkan instance created (API 1.2)"
        );

        let debug_messenger = if enable_validation {
            let loader = ext::debug_utils::Instance::new(&entry, &instance);
            // SAFETY: The instance is valid and the debug utils extension was
            // enabled above.
            let handle = unsafe {
                loader
                    .create_debug_utils_messenger(&debug_messenger_create_info(), None)
                    .map_err(RhiError::InstanceCreation)?
            };
            debug!("Debug messenger installed");
            Some(DebugMessenger { loader, handle })
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            debug_messenger,
        })
    }

    /// Get the Vulkan entry point.
    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self.entry
    }

    /// Get the raw ash instance.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // SAFETY: The messenger and instance were created in new() and are
        // destroyed exactly once, messenger first.
        unsafe {
            if let Some(messenger) = self.debug_messenger.take() {
                messenger
                    .loader
                    .destroy_debug_utils_messenger(messenger.handle, None);
            }
            self.instance.destroy_instance(None);
        }
        debug!("Vulkan instance destroyed");
    }
}

/// Check whether the Khronos validation layer is installed.
fn validation_layer_available(entry: &ash::Entry) -> RhiResult<bool> {
    // SAFETY: enumerate_instance_layer_properties has no preconditions.
    let layers = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(layers.iter().any(|layer| {
        layer
            .layer_name_as_c_str()
            .is_ok_and(|name| name == VALIDATION_LAYER_NAME)
    }))
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
}

/// Routes validation messages into the tracing pipeline.
unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() {
        return vk::FALSE;
    }
    // SAFETY: The loader passes a valid callback data pointer with a
    // null-terminated message string for the duration of this call.
    let message = unsafe {
        let data = *callback_data;
        if data.p_message.is_null() {
            return vk::FALSE;
        }
        CStr::from_ptr(data.p_message).to_string_lossy()
    };

    match severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            error!(target: "vulkan", ?message_type, "{message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            warn!(target: "vulkan", ?message_type, "{message}");
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            info!(target: "vulkan", ?message_type, "{message}");
        }
        _ => {
            debug!(target: "vulkan", ?message_type, "{message}");
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    // Creates a real headless instance when a Vulkan driver is present and
    // silently passes otherwise, so the suite runs on machines without one.
    #[test]
    fn creates_instance_without_validation() {
        match Instance::new(c"triangle-test", &[], false) {
            Ok(instance) => drop(instance),
            Err(RhiError::Loading(_))
            | Err(RhiError::InstanceCreation(_))
            | Err(RhiError::Vulkan(_)) => {}
            Err(err) => panic!("unexpected instance error: {err}"),
        }
    }
}
