//! RHI configuration passed once at initialization.

use ash::vk;

use crate::MAX_FRAMES_IN_FLIGHT;

/// Per-type descriptor budget of the long-lived descriptor pool.
#[derive(Debug, Clone)]
pub struct DescriptorPoolSizing {
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub uniform_buffers_dynamic: u32,
    pub storage_buffers: u32,
    pub storage_buffers_dynamic: u32,
    pub combined_image_samplers: u32,
    pub input_attachments: u32,
}

impl Default for DescriptorPoolSizing {
    fn default() -> Self {
        let frames = MAX_FRAMES_IN_FLIGHT as u32;
        Self {
            max_sets: 64 * frames,
            uniform_buffers: 16 * frames,
            uniform_buffers_dynamic: 4 * frames,
            storage_buffers: 8 * frames,
            storage_buffers_dynamic: 4 * frames,
            combined_image_samplers: 64 * frames,
            input_attachments: 4 * frames,
        }
    }
}

impl DescriptorPoolSizing {
    /// Pool sizes with a non-zero budget, in a fixed order.
    pub fn pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        [
            (vk::DescriptorType::UNIFORM_BUFFER, self.uniform_buffers),
            (vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, self.uniform_buffers_dynamic),
            (vk::DescriptorType::STORAGE_BUFFER, self.storage_buffers),
            (vk::DescriptorType::STORAGE_BUFFER_DYNAMIC, self.storage_buffers_dynamic),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, self.combined_image_samplers),
            (vk::DescriptorType::INPUT_ATTACHMENT, self.input_attachments),
        ]
        .into_iter()
        .filter(|&(_, descriptor_count)| descriptor_count > 0)
        .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
        .collect()
    }
}

/// Everything that used to be a global switch on the bootstrap object.
#[derive(Debug, Clone)]
pub struct RhiConfig {
    pub application_name: String,
    /// Request the Khronos validation layer and a debug messenger.
    pub enable_validation: bool,
    pub preferred_surface_format: vk::SurfaceFormatKHR,
    pub preferred_present_mode: vk::PresentModeKHR,
    pub descriptor_pool: DescriptorPoolSizing,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            application_name: "Aura".to_owned(),
            enable_validation: cfg!(feature = "validation"),
            preferred_surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
            descriptor_pool: DescriptorPoolSizing::default(),
        }
    }
}

impl RhiConfig {
    pub fn with_validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }
}
