//! Recording driver used by the unit tests.
//!
//! Hands out synthetic handles from a counter, tracks which ones are alive per kind, keeps an ordered
//! event log, and replays scripted acquire/present results.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::VecDeque;
use std::ffi::{c_char, CStr};
use std::rc::Rc;

use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use aura_core::collections::hashmap::HashMap;
use aura_core::collections::hashset::HashSet;
use raw_window_handle::{HandleError, RawDisplayHandle, RawWindowHandle};

use crate::config::RhiConfig;
use crate::driver::{Backend, DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::types::Extent2D;
use crate::window::RhiWindow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Create(&'static str, u64),
    Destroy(&'static str, u64),
    Device { queue_create_infos: u32, sampler_anisotropy: bool },
    DescriptorPool { max_sets: u32, pool_size_count: u32 },
    RenderPass { subpasses: u32, attachments: u32 },
    Swapchain { min_image_count: u32, width: u32, height: u32, concurrent: bool },
    Image { width: u32, height: u32, format: vk::Format },
    UpdateDescriptorSets { writes: usize, copies: usize },
    CopyBuffer { size: u64 },
    Submit,
    QueueWaitIdle,
    DeviceWaitIdle,
    WaitForFences(Vec<u64>),
    ResetFences(Vec<u64>),
    Acquire { semaphore: u64 },
    Present { wait_semaphores: Vec<u64>, image_index: u32 },
}

#[derive(Debug)]
pub(crate) struct MockState {
    next_handle: u64,
    live: HashMap<&'static str, HashSet<u64>>,
    created: HashMap<&'static str, usize>,
    events: Vec<Event>,
    /// Destroy calls on handles that were not alive.
    pub invalid_destroys: Vec<(&'static str, u64)>,

    pub acquire_results: VecDeque<VkResult<(u32, bool)>>,
    pub present_results: VecDeque<VkResult<bool>>,
    pub fail_next_submit: Option<vk::Result>,
    pub fail_next_allocate: Option<vk::Result>,
    /// Fails the creation of the n-th (zero-based) object of a kind.
    pub fail_create: Option<(&'static str, usize)>,

    pub submits: usize,
    pub signaled_fences_created: usize,
    pub swapchain_image_count: u32,
    next_image_index: u32,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_handle: 1,
            live: HashMap::new(),
            created: HashMap::new(),
            events: Vec::new(),
            invalid_destroys: Vec::new(),
            acquire_results: VecDeque::new(),
            present_results: VecDeque::new(),
            fail_next_submit: None,
            fail_next_allocate: None,
            fail_create: None,
            submits: 0,
            signaled_fences_created: 0,
            swapchain_image_count: 3,
            next_image_index: 0,
        }
    }
}

impl MockState {
    fn handout(&mut self) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        raw
    }

    fn create(&mut self, kind: &'static str) -> VkResult<u64> {
        let created = self.created.entry(kind).or_insert(0);
        if self.fail_create == Some((kind, *created)) {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        *created += 1;

        let raw = self.handout();
        self.live.entry(kind).or_default().insert(raw);
        self.events.push(Event::Create(kind, raw));
        Ok(raw)
    }

    fn destroy(&mut self, kind: &'static str, raw: u64) {
        if raw == 0 {
            return;
        }
        let removed = self.live.get_mut(kind).is_some_and(|live| live.remove(&raw));
        if !removed {
            self.invalid_destroys.push((kind, raw));
        }
        self.events.push(Event::Destroy(kind, raw));
    }

    fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn live(&self, kind: &str) -> usize {
        self.live.get(kind).map_or(0, HashSet::len)
    }

    pub fn total_live(&self) -> usize {
        self.live.values().map(HashSet::len).sum()
    }

    pub fn is_live(&self, kind: &str, raw: u64) -> bool {
        self.live.get(kind).is_some_and(|live| live.contains(&raw))
    }

    pub fn created(&self, kind: &str) -> usize {
        self.created.get(kind).copied().unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn events_since(&self, index: usize) -> &[Event] {
        &self.events[index..]
    }
}

pub(crate) type SharedState = Rc<RefCell<MockState>>;

fn write_name(dst: &mut [c_char], name: &CStr) {
    for (slot, &byte) in dst.iter_mut().zip(name.to_bytes_with_nul()) {
        *slot = byte as c_char;
    }
}

fn extension(name: &CStr) -> vk::ExtensionProperties {
    let mut properties = vk::ExtensionProperties::default();
    write_name(&mut properties.extension_name, name);
    properties
}

/// One synthetic physical device.
#[derive(Debug, Clone)]
pub(crate) struct MockGpu {
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub present_support: Vec<bool>,
    pub extensions: Vec<vk::ExtensionProperties>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub depth_formats: Vec<vk::Format>,
}

impl MockGpu {
    fn with_type(device_type: vk::PhysicalDeviceType, name: &CStr) -> Self {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type,
            ..Default::default()
        };
        write_name(&mut properties.device_name, name);
        properties.limits.max_sampler_anisotropy = 16.0;

        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 2,
            ..Default::default()
        };
        memory_properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        memory_properties.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        Self {
            properties,
            features: vk::PhysicalDeviceFeatures {
                sampler_anisotropy: vk::TRUE,
                ..Default::default()
            },
            queue_families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            }],
            present_support: vec![true],
            extensions: vec![extension(ash::khr::swapchain::NAME)],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                max_image_array_layers: 1,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            memory_properties,
            depth_formats: vec![vk::Format::D32_SFLOAT],
        }
    }

    pub fn discrete() -> Self {
        Self::with_type(vk::PhysicalDeviceType::DISCRETE_GPU, c"Mock Discrete")
    }

    pub fn integrated() -> Self {
        Self::with_type(vk::PhysicalDeviceType::INTEGRATED_GPU, c"Mock Integrated")
    }
}

/// Backend producing [`MockInstance`]s over a shared state.
pub(crate) struct MockBackend {
    pub state: SharedState,
    pub gpus: Vec<MockGpu>,
    pub debug_messenger: bool,
}

impl MockBackend {
    pub fn new(gpus: Vec<MockGpu>) -> Self {
        Self {
            state: SharedState::default(),
            gpus,
            debug_messenger: true,
        }
    }

    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn create_instance(&self, _config: &RhiConfig, _window: &dyn RhiWindow) -> RhiResult<Box<dyn InstanceDriver>> {
        let mut state = self.state.borrow_mut();
        let raw = state.create("instance").map_err(RhiError::InstanceCreationFailed)?;
        let messenger = if self.debug_messenger {
            state.create("debug_messenger").ok()
        } else {
            None
        };
        drop(state);

        Ok(Box::new(MockInstance {
            state: Rc::clone(&self.state),
            gpus: self.gpus.clone(),
            raw,
            messenger,
        }))
    }
}

pub(crate) struct MockInstance {
    state: SharedState,
    gpus: Vec<MockGpu>,
    raw: u64,
    messenger: Option<u64>,
}

impl MockInstance {
    /// A standalone instance over its own state, for selection tests.
    pub fn new(gpus: Vec<MockGpu>) -> Self {
        Self {
            state: SharedState::default(),
            gpus,
            raw: 0,
            messenger: None,
        }
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> &MockGpu {
        &self.gpus[physical_device.as_raw() as usize - 1]
    }
}

impl InstanceDriver for MockInstance {
    fn debug_messenger_attached(&self) -> bool {
        self.messenger.is_some()
    }

    fn create_surface(&self, _window: &dyn RhiWindow) -> RhiResult<vk::SurfaceKHR> {
        self.state
            .borrow_mut()
            .create("surface")
            .map(vk::SurfaceKHR::from_raw)
            .map_err(RhiError::SurfaceCreationFailed)
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.state.borrow_mut().destroy("surface", surface.as_raw());
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.gpus.len() as u64).map(vk::PhysicalDevice::from_raw).collect())
    }

    fn physical_device_properties(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceProperties {
        self.gpu(physical_device).properties
    }

    fn physical_device_features(&self, physical_device: vk::PhysicalDevice) -> vk::PhysicalDeviceFeatures {
        self.gpu(physical_device).features
    }

    fn physical_device_memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceMemoryProperties {
        self.gpu(physical_device).memory_properties
    }

    fn queue_family_properties(&self, physical_device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        self.gpu(physical_device).queue_families.clone()
    }

    fn device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::ExtensionProperties>> {
        Ok(self.gpu(physical_device).extensions.clone())
    }

    fn format_properties(&self, physical_device: vk::PhysicalDevice, format: vk::Format) -> vk::FormatProperties {
        let supported = self.gpu(physical_device).depth_formats.contains(&format);
        vk::FormatProperties {
            optimal_tiling_features: if supported {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            },
            ..Default::default()
        }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self
            .gpu(physical_device)
            .present_support
            .get(queue_family_index as usize)
            .copied()
            .unwrap_or(false))
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.gpu(physical_device).capabilities)
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.gpu(physical_device).formats.clone())
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.gpu(physical_device).present_modes.clone())
    }

    fn create_device(
        &self,
        _physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<Box<dyn DeviceDriver>> {
        let sampler_anisotropy = !create_info.p_enabled_features.is_null()
            && unsafe { (*create_info.p_enabled_features).sampler_anisotropy } == vk::TRUE;

        let mut state = self.state.borrow_mut();
        let raw = state.create("device")?;
        state.record(Event::Device {
            queue_create_infos: create_info.queue_create_info_count,
            sampler_anisotropy,
        });

        Ok(Box::new(MockDevice {
            state: Rc::clone(&self.state),
            raw,
        }))
    }

    fn destroy_instance(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(messenger) = self.messenger.take() {
            state.destroy("debug_messenger", messenger);
        }
        state.destroy("instance", self.raw);
    }
}

pub(crate) struct MockDevice {
    state: SharedState,
    raw: u64,
}

impl MockDevice {
    /// A standalone device over its own state, for module-level tests.
    pub fn new() -> Self {
        Self {
            state: SharedState::default(),
            raw: 0,
        }
    }

    pub fn state(&self) -> Ref<'_, MockState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MockState> {
        self.state.borrow_mut()
    }
}

/// Generates `create_<name>` / `destroy_<name>` pairs that register handles of kind `<name>`.
macro_rules! mock_create_destroy {
    ($($name:ident: $info:ident => $handle:ident;)*) => {
        $crate::paste! {
            $(
                fn [<create_ $name>](&self, _create_info: &vk::$info<'_>) -> VkResult<vk::$handle> {
                    self.state.borrow_mut().create(stringify!($name)).map(vk::$handle::from_raw)
                }

                fn [<destroy_ $name>](&self, handle: vk::$handle) {
                    self.state.borrow_mut().destroy(stringify!($name), handle.as_raw());
                }
            )*
        }
    };
}

impl DeviceDriver for MockDevice {
    mock_create_destroy! {
        command_pool: CommandPoolCreateInfo => CommandPool;
        descriptor_set_layout: DescriptorSetLayoutCreateInfo => DescriptorSetLayout;
        semaphore: SemaphoreCreateInfo => Semaphore;
        framebuffer: FramebufferCreateInfo => Framebuffer;
        image_view: ImageViewCreateInfo => ImageView;
        buffer: BufferCreateInfo => Buffer;
        sampler: SamplerCreateInfo => Sampler;
    }

    fn device_queue(&self, queue_family_index: u32, _queue_index: u32) -> vk::Queue {
        vk::Queue::from_raw(1000 + queue_family_index as u64)
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        self.state.borrow_mut().record(Event::DeviceWaitIdle);
        Ok(())
    }

    fn queue_wait_idle(&self, _queue: vk::Queue) -> VkResult<()> {
        self.state.borrow_mut().record(Event::QueueWaitIdle);
        Ok(())
    }

    fn queue_submit(&self, _queue: vk::Queue, _submits: &[vk::SubmitInfo<'_>], _fence: vk::Fence) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(error) = state.fail_next_submit.take() {
            return Err(error);
        }
        state.submits += 1;
        state.record(Event::Submit);
        Ok(())
    }

    fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state.borrow_mut();
        (0..allocate_info.command_buffer_count)
            .map(|_| state.create("command_buffer").map(vk::CommandBuffer::from_raw))
            .collect()
    }

    fn free_command_buffers(&self, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        let mut state = self.state.borrow_mut();
        for buffer in buffers {
            state.destroy("command_buffer", buffer.as_raw());
        }
    }

    fn begin_command_buffer(
        &self,
        _command_buffer: vk::CommandBuffer,
        _begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        Ok(())
    }

    fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn cmd_copy_buffer(
        &self,
        _command_buffer: vk::CommandBuffer,
        _src: vk::Buffer,
        _dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        let size = regions.iter().map(|region| region.size).sum();
        self.state.borrow_mut().record(Event::CopyBuffer { size });
    }

    fn create_descriptor_pool(&self, create_info: &vk::DescriptorPoolCreateInfo<'_>) -> VkResult<vk::DescriptorPool> {
        let mut state = self.state.borrow_mut();
        state.record(Event::DescriptorPool {
            max_sets: create_info.max_sets,
            pool_size_count: create_info.pool_size_count,
        });
        state.create("descriptor_pool").map(vk::DescriptorPool::from_raw)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state.borrow_mut().destroy("descriptor_pool", pool.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        allocate_info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        // Sets die with their pool, so they are not tracked as live.
        let mut state = self.state.borrow_mut();
        if let Some(e) = state.fail_next_allocate.take() {
            return Err(e);
        }
        Ok((0..allocate_info.descriptor_set_count)
            .map(|_| vk::DescriptorSet::from_raw(state.handout()))
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>], copies: &[vk::CopyDescriptorSet<'_>]) {
        self.state.borrow_mut().record(Event::UpdateDescriptorSets {
            writes: writes.len(),
            copies: copies.len(),
        });
    }

    fn create_fence(&self, create_info: &vk::FenceCreateInfo<'_>) -> VkResult<vk::Fence> {
        let mut state = self.state.borrow_mut();
        let raw = state.create("fence")?;
        if create_info.flags.contains(vk::FenceCreateFlags::SIGNALED) {
            state.signaled_fences_created += 1;
        }
        Ok(vk::Fence::from_raw(raw))
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.state.borrow_mut().destroy("fence", fence.as_raw());
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], _wait_all: bool, _timeout: u64) -> VkResult<()> {
        let raw = fences.iter().map(|fence| fence.as_raw()).collect();
        self.state.borrow_mut().record(Event::WaitForFences(raw));
        Ok(())
    }

    fn reset_fences(&self, fences: &[vk::Fence]) -> VkResult<()> {
        let raw = fences.iter().map(|fence| fence.as_raw()).collect();
        self.state.borrow_mut().record(Event::ResetFences(raw));
        Ok(())
    }

    fn create_render_pass(&self, create_info: &vk::RenderPassCreateInfo<'_>) -> VkResult<vk::RenderPass> {
        let mut state = self.state.borrow_mut();
        state.record(Event::RenderPass {
            subpasses: create_info.subpass_count,
            attachments: create_info.attachment_count,
        });
        state.create("render_pass").map(vk::RenderPass::from_raw)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state.borrow_mut().destroy("render_pass", render_pass.as_raw());
    }

    fn create_image(&self, create_info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        let mut state = self.state.borrow_mut();
        state.record(Event::Image {
            width: create_info.extent.width,
            height: create_info.extent.height,
            format: create_info.format,
        });
        state.create("image").map(vk::Image::from_raw)
    }

    fn destroy_image(&self, image: vk::Image) {
        self.state.borrow_mut().destroy("image", image.as_raw());
    }

    fn image_memory_requirements(&self, _image: vk::Image) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 4096,
            alignment: 256,
            memory_type_bits: 0b11,
        }
    }

    fn bind_image_memory(&self, _image: vk::Image, _memory: vk::DeviceMemory, _offset: vk::DeviceSize) -> VkResult<()> {
        Ok(())
    }

    fn buffer_memory_requirements(&self, _buffer: vk::Buffer) -> vk::MemoryRequirements {
        vk::MemoryRequirements {
            size: 1024,
            alignment: 64,
            memory_type_bits: 0b11,
        }
    }

    fn bind_buffer_memory(&self, _buffer: vk::Buffer, _memory: vk::DeviceMemory, _offset: vk::DeviceSize) -> VkResult<()> {
        Ok(())
    }

    fn allocate_memory(&self, _allocate_info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        self.state.borrow_mut().create("memory").map(vk::DeviceMemory::from_raw)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.state.borrow_mut().destroy("memory", memory.as_raw());
    }

    fn create_swapchain(&self, create_info: &vk::SwapchainCreateInfoKHR<'_>) -> VkResult<vk::SwapchainKHR> {
        let mut state = self.state.borrow_mut();
        state.record(Event::Swapchain {
            min_image_count: create_info.min_image_count,
            width: create_info.image_extent.width,
            height: create_info.image_extent.height,
            concurrent: create_info.image_sharing_mode == vk::SharingMode::CONCURRENT,
        });
        state.next_image_index = 0;
        state.create("swapchain").map(vk::SwapchainKHR::from_raw)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.state.borrow_mut().destroy("swapchain", swapchain.as_raw());
    }

    fn swapchain_images(&self, _swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        // Owned by the swapchain, so not tracked as live.
        let mut state = self.state.borrow_mut();
        let count = state.swapchain_image_count;
        Ok((0..count).map(|_| vk::Image::from_raw(state.handout())).collect())
    }

    fn acquire_next_image(
        &self,
        _swapchain: vk::SwapchainKHR,
        _timeout: u64,
        semaphore: vk::Semaphore,
        _fence: vk::Fence,
    ) -> VkResult<(u32, bool)> {
        let mut state = self.state.borrow_mut();
        state.record(Event::Acquire {
            semaphore: semaphore.as_raw(),
        });
        match state.acquire_results.pop_front() {
            Some(result) => result,
            None => {
                let index = state.next_image_index;
                state.next_image_index = (index + 1) % state.swapchain_image_count.max(1);
                Ok((index, false))
            }
        }
    }

    fn queue_present(&self, _queue: vk::Queue, present_info: &vk::PresentInfoKHR<'_>) -> VkResult<bool> {
        let (wait_semaphores, image_index) = unsafe {
            let semaphores =
                std::slice::from_raw_parts(present_info.p_wait_semaphores, present_info.wait_semaphore_count as usize);
            (
                semaphores.iter().map(|semaphore| semaphore.as_raw()).collect(),
                *present_info.p_image_indices,
            )
        };

        let mut state = self.state.borrow_mut();
        state.record(Event::Present {
            wait_semaphores,
            image_index,
        });
        state.present_results.pop_front().unwrap_or(Ok(false))
    }

    fn destroy_device(&mut self) {
        self.state.borrow_mut().destroy("device", self.raw);
    }
}

/// A window whose size can be scripted. `poll_events` applies the next queued size.
pub(crate) struct MockWindow {
    size: Cell<Extent2D>,
    pending: RefCell<VecDeque<Extent2D>>,
    pub polls: Cell<usize>,
    pub pre_presents: Cell<usize>,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Cell::new(Extent2D::new(width, height)),
            pending: RefCell::new(VecDeque::new()),
            polls: Cell::new(0),
            pre_presents: Cell::new(0),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        self.size.set(Extent2D::new(width, height));
    }

    pub fn queue_size(&self, width: u32, height: u32) {
        self.pending.borrow_mut().push_back(Extent2D::new(width, height));
    }
}

impl RhiWindow for MockWindow {
    fn framebuffer_size(&self) -> Extent2D {
        self.size.get()
    }

    fn poll_events(&self) {
        self.polls.set(self.polls.get() + 1);
        if let Some(size) = self.pending.borrow_mut().pop_front() {
            self.size.set(size);
        }
    }

    fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle), HandleError> {
        Err(HandleError::Unavailable)
    }

    fn pre_present(&self) {
        self.pre_presents.set(self.pre_presents.get() + 1);
    }
}
