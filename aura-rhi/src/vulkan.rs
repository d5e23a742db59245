//! Vulkan backend - instance, debug messenger and driver forwarding through ash.

use std::ffi::{c_char, CStr, CString};

use ash::prelude::VkResult;
use ash::{vk, Entry, Instance};
use aura_core::log;
use raw_window_handle::RawDisplayHandle;

use crate::config::RhiConfig;
use crate::driver::{Backend, DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::window::RhiWindow;

/// Validation layers requested when validation is enabled.
const VALIDATION_LAYERS: &[&CStr] = &[c"VK_LAYER_KHRONOS_validation"];

/// The ash-backed Vulkan backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct VulkanBackend;

impl Backend for VulkanBackend {
    fn name(&self) -> &str {
        "vulkan"
    }

    #[profiling::function]
    fn create_instance(&self, config: &RhiConfig, window: &dyn RhiWindow) -> RhiResult<Box<dyn InstanceDriver>> {
        // Load Vulkan dynamically
        let entry = unsafe { Entry::load()? };

        let (display_handle, _) = window.raw_handles()?;

        let validation = config.enable_validation && check_validation_layer_support(&entry);
        if config.enable_validation && !validation {
            log::warn!("Validation layers requested, but not available; continuing without them");
        }

        let instance = create_instance(&entry, display_handle, &config.application_name, validation)
            .map_err(RhiError::InstanceCreationFailed)?;

        let debug_messenger = if validation {
            match setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    log::warn!("Failed to set up debug messenger: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Box::new(VulkanInstance {
            entry,
            instance,
            surface_loader,
            debug_messenger,
        }))
    }
}

fn check_validation_layer_support(entry: &Entry) -> bool {
    let available = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(e) => {
            log::warn!("Failed to enumerate instance layers: {}", e);
            return false;
        }
    };

    VALIDATION_LAYERS.iter().all(|&wanted| {
        available
            .iter()
            .any(|layer| layer.layer_name_as_c_str().is_ok_and(|name| name == wanted))
    })
}

/// Get required instance extensions based on platform.
fn get_required_instance_extensions(
    display_handle: RawDisplayHandle,
    validation: bool,
) -> VkResult<Vec<*const c_char>> {
    let mut extensions = ash_window::enumerate_required_extensions(display_handle)?.to_vec();

    // Debug utils (for validation layers)
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    Ok(extensions)
}

/// Create Vulkan instance with required extensions and validation layers.
fn create_instance(
    entry: &Entry,
    display_handle: RawDisplayHandle,
    application_name: &str,
    validation: bool,
) -> VkResult<Instance> {
    let app_name = CString::new(application_name).unwrap_or_else(|_| c"Aura".to_owned());
    let engine_name = c"Aura";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    let extensions = get_required_instance_extensions(display_handle, validation)?;
    let layer_pointers: Vec<*const c_char> = VALIDATION_LAYERS.iter().map(|s| s.as_ptr()).collect();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions);

    if validation {
        create_info = create_info.enabled_layer_names(&layer_pointers);
    }

    unsafe { entry.create_instance(&create_info, None) }
}

/// Setup debug messenger for validation layers.
fn setup_debug_messenger(
    entry: &Entry,
    instance: &Instance,
) -> VkResult<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
    let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback));

    let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };

    Ok((debug_utils, messenger))
}

/// Vulkan debug callback function.
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let callback_data = unsafe { *p_callback_data };
    if callback_data.p_message.is_null() {
        return vk::FALSE;
    }
    let message = unsafe { CStr::from_ptr(callback_data.p_message) }.to_string_lossy();

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "[General]",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "[Validation]",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "[Performance]",
        _ => "[Unknown]",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("Vulkan {}: {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("Vulkan {}: {}", type_str, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("Vulkan {}: {}", type_str, message);
        }
        _ => {
            log::debug!("Vulkan {}: {}", type_str, message);
        }
    }

    vk::FALSE
}

/// Instance-level driver backed by ash.
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    surface_loader: ash::khr::surface::Instance,
    debug_messenger: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl InstanceDriver for VulkanInstance {
    fn debug_messenger_attached(&self) -> bool {
        self.debug_messenger.is_some()
    }

    fn create_surface(&self, window: &dyn RhiWindow) -> RhiResult<vk::SurfaceKHR> {
        let (display_handle, window_handle) = window.raw_handles()?;
        unsafe { ash_window::create_surface(&self.entry, &self.instance, display_handle, window_handle, None) }
            .map_err(RhiError::SurfaceCreationFailed)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.enumerate_physical_devices() }
    }

    fn physical_device_properties(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        unsafe { self.instance.get_physical_device_properties(physical_device) }
    }

    fn physical_device_features(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        unsafe { self.instance.get_physical_device_features(physical_device) }
    }

    fn physical_device_memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        unsafe { self.instance.get_physical_device_memory_properties(physical_device) }
    }

    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(physical_device) }
    }

    fn device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::ExtensionProperties>> {
        unsafe { self.instance.enumerate_device_extension_properties(physical_device) }
    }

    fn format_properties(&self, physical_device: vk::PhysicalDevice, format: vk::Format) -> vk::FormatProperties {
        unsafe { self.instance.get_physical_device_format_properties(physical_device, format) }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, surface)
        }
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface_loader.get_physical_device_surface_formats(physical_device, surface) }
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<Box<dyn DeviceDriver>> {
        let device = unsafe { self.instance.create_device(physical_device, create_info, None)? };
        let swapchain_loader = ash::khr::swapchain::Device::new(&self.instance, &device);

        Ok(Box::new(VulkanDevice {
            device,
            swapchain_loader,
        }))
    }

    fn destroy_instance(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// Device-level driver backed by ash.
pub struct VulkanDevice {
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
}

/// Forwards `create_<name>` / `destroy_<name>` pairs to the ash device.
macro_rules! forward_create_destroy {
    ($($name:ident: $info:ident => $handle:ident;)*) => {
        $crate::paste! {
            $(
                fn [<create_ $name>](&self, create_info: &vk::$info<'_>) -> VkResult<vk::$handle> {
                    unsafe { self.device.[<create_ $name>](create_info, None) }
                }

                fn [<destroy_ $name>](&self, handle: vk::$handle) {
                    unsafe { self.device.[<destroy_ $name>](handle, None) }
                }
            )*
        }
    };
}

impl DeviceDriver for VulkanDevice {
    forward_create_destroy! {
        command_pool: CommandPoolCreateInfo => CommandPool;
        descriptor_pool: DescriptorPoolCreateInfo => DescriptorPool;
        descriptor_set_layout: DescriptorSetLayoutCreateInfo => DescriptorSetLayout;
        semaphore: SemaphoreCreateInfo => Semaphore;
        fence: FenceCreateInfo => Fence;
        render_pass: RenderPassCreateInfo => RenderPass;
        framebuffer: FramebufferCreateInfo => Framebuffer;
        image: ImageCreateInfo => Image;
        image_view: ImageViewCreateInfo => ImageView;
        buffer: BufferCreateInfo => Buffer;
        sampler: SamplerCreateInfo => Sampler;
    }

    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(queue_family_index, queue_index) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }

    fn queue_wait_idle(&self, queue: vk::Queue) -> VkResult<()> {
        unsafe { self.device.queue_wait_idle(queue) }
    }

    fn queue_submit(&self, queue: vk::Queue, submits: &[vk::SubmitInfo<'_>], fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.queue_submit(queue, submits, fence) }
    }

    fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device.allocate_command_buffers(allocate_info) }
    }

    fn free_command_buffers(&self, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        unsafe { self.device.free_command_buffers(pool, buffers) }
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.device.begin_command_buffer(command_buffer, begin_info) }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(command_buffer) }
    }

    fn cmd_copy_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.device.cmd_copy_buffer(command_buffer, src, dst, regions) }
    }

    fn allocate_descriptor_sets(
        &self,
        allocate_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        unsafe { self.device.allocate_descriptor_sets(allocate_info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>], copies: &[vk::CopyDescriptorSet<'_>]) {
        unsafe { self.device.update_descriptor_sets(writes, copies) }
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], wait_all: bool, timeout: u64) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(fences, wait_all, timeout) }
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        unsafe { self.device.reset_fences(fences) }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> vk::MemoryRequirements {
        unsafe { self.device.get_image_memory_requirements(image) }
    }

    fn bind_image_memory(&self, image: vk::Image, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { self.device.bind_image_memory(image, memory, offset) }
    }

    fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, offset) }
    }

    fn allocate_memory(&self, allocate_info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device.allocate_memory(allocate_info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    fn create_swapchain(&self, create_info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader.create_swapchain(create_info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        semaphore: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<(u32, bool)> {
        unsafe { self.swapchain_loader.acquire_next_image(swapchain, timeout, semaphore, fence) }
    }

    fn queue_present(&self, queue: vk::Queue, present_info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        unsafe { self.swapchain_loader.queue_present(queue, present_info) }
    }

    fn destroy_device(&mut self) {
        unsafe { self.device.destroy_device(None) }
    }
}
