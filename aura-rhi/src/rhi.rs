//! The bootstrap aggregate.
//!
//! [`VulkanRhi`] owns every handle created during initialization and walks the bootstrap stages in
//! order. Swapchain recreation is the only step that ever runs twice. Everything the engine creates
//! through it (render passes, framebuffers, layouts, samplers, buffers) is handed back as a wrapper and
//! must be returned to the matching `destroy_*` routine before [`VulkanRhi::shutdown`].

use std::sync::Arc;

use ash::vk;
use aura_core::log;

use crate::command::CommandInfrastructure;
use crate::config::RhiConfig;
use crate::descriptor::create_descriptor_pool;
use crate::device::LogicalDevice;
use crate::driver::{Backend, DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::physical_device::{select_physical_device, PhysicalDevice};
use crate::resource::{
    raw_handles, Buffer, CommandBuffer, DescriptorPool, DescriptorSet, DescriptorSetLayout, DeviceMemory,
    Framebuffer, Image, ImageView, RenderPass, Sampler,
};
use crate::sampler::{create_sampler, SamplerConfig};
use crate::swapchain::{DepthAttachment, Swapchain};
use crate::sync::SyncPrimitives;
use crate::translate::{
    LoweredDescriptorSetAllocate, LoweredDescriptorSetLayout, LoweredDescriptorUpdate, LoweredFramebuffer,
    LoweredRenderPass,
};
use crate::types::{
    CopyDescriptorSet, DescriptorSetAllocateInfo, DescriptorSetLayoutCreateInfo, Extent2D, FramebufferCreateInfo,
    RenderPassCreateInfo, WriteDescriptorSet,
};
use crate::utility::{self, find_depth_format, ImageDesc, ImageViewDesc};
use crate::window::RhiWindow;
use crate::MAX_FRAMES_IN_FLIGHT;

/// Bootstrap stages, in the only order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootstrapStage {
    Uninitialized,
    WindowCreated,
    InstanceCreated,
    /// Skipped when validation is off or the messenger could not be registered.
    DebugMessengerAttached,
    SurfaceCreated,
    PhysicalDeviceSelected,
    LogicalDeviceCreated,
    CommandInfrastructureReady,
    SyncPrimitivesReady,
    SwapchainReady,
    FramebufferResourcesReady,
    AssetAllocatorReady,
    Running,
}

/// Outcome of [`VulkanRhi::prepare_before_pass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented { image_index: u32 },
    /// Swapchain images, views and the depth attachment were replaced. Anything built on them is stale.
    SwapchainRecreated,
}

pub struct VulkanRhi {
    config: RhiConfig,
    stage: BootstrapStage,

    window: Option<Arc<dyn RhiWindow>>,
    instance: Option<Box<dyn InstanceDriver>>,
    surface: Option<vk::SurfaceKHR>,
    physical_device: Option<PhysicalDevice>,
    device: Option<LogicalDevice>,

    commands: Option<CommandInfrastructure>,
    descriptor_pool: DescriptorPool,
    sync: SyncPrimitives,

    swapchain: Option<Swapchain>,
    depth_format: vk::Format,
    depth: Option<DepthAttachment>,
    swapchain_generation: u64,

    current_frame: usize,
    framebuffer_resized: bool,
}

impl VulkanRhi {
    pub fn new(config: RhiConfig) -> Self {
        Self {
            config,
            stage: BootstrapStage::Uninitialized,
            window: None,
            instance: None,
            surface: None,
            physical_device: None,
            device: None,
            commands: None,
            descriptor_pool: DescriptorPool::default(),
            sync: SyncPrimitives::default(),
            swapchain: None,
            depth_format: vk::Format::UNDEFINED,
            depth: None,
            swapchain_generation: 0,
            current_frame: 0,
            framebuffer_resized: false,
        }
    }

    /// Runs the whole bootstrap sequence. On failure every partially created handle is released and the
    /// RHI is back in [`BootstrapStage::Uninitialized`].
    #[profiling::function]
    pub fn initialize(&mut self, backend: &dyn Backend, window: Arc<dyn RhiWindow>) -> RhiResult<()> {
        if self.stage != BootstrapStage::Uninitialized {
            log::warn!("RHI initialization requested twice");
            return Err(RhiError::AlreadyInitialized(self.stage));
        }

        log::info!("Initializing RHI ({} backend)", backend.name());
        let result = self.bootstrap(backend, window);
        if let Err(e) = &result {
            log::error!("RHI bootstrap failed after {:?}: {}", self.stage, e);
            self.shutdown();
        }
        result
    }

    fn bootstrap(&mut self, backend: &dyn Backend, window: Arc<dyn RhiWindow>) -> RhiResult<()> {
        self.window = Some(Arc::clone(&window));
        self.advance(BootstrapStage::WindowCreated);

        self.instance = Some(backend.create_instance(&self.config, window.as_ref())?);
        self.advance(BootstrapStage::InstanceCreated);
        if self.instance_driver()?.debug_messenger_attached() {
            self.advance(BootstrapStage::DebugMessengerAttached);
        }

        let surface = self.instance_driver()?.create_surface(window.as_ref())?;
        self.surface = Some(surface);
        self.advance(BootstrapStage::SurfaceCreated);

        let physical_device = select_physical_device(self.instance_driver()?, surface)?;
        self.physical_device = Some(physical_device);
        self.advance(BootstrapStage::PhysicalDeviceSelected);

        let device = LogicalDevice::new(self.instance_driver()?, self.physical()?)?;
        self.device = Some(device);
        self.advance(BootstrapStage::LogicalDeviceCreated);

        let graphics_family = self
            .physical()?
            .queue_families()
            .graphics_family
            .ok_or(RhiError::NoSuitablePhysicalDevice)?;
        self.commands = Some(CommandInfrastructure::new(self.device_driver()?, graphics_family)?);
        self.descriptor_pool = create_descriptor_pool(self.device_driver()?, &self.config.descriptor_pool)?;
        self.advance(BootstrapStage::CommandInfrastructureReady);

        self.sync = SyncPrimitives::new(self.device_driver()?)?;
        self.advance(BootstrapStage::SyncPrimitivesReady);

        self.create_swapchain()?;
        self.advance(BootstrapStage::SwapchainReady);

        self.depth_format = find_depth_format(self.instance_driver()?, self.physical()?.handle())?;
        self.create_depth_attachment()?;
        self.advance(BootstrapStage::FramebufferResourcesReady);

        log::info!("No asset allocator configured; resources are allocated per request");
        self.advance(BootstrapStage::AssetAllocatorReady);

        self.advance(BootstrapStage::Running);
        Ok(())
    }

    fn advance(&mut self, next: BootstrapStage) {
        debug_assert!(next > self.stage, "bootstrap stages only move forward");
        log::info!("RHI: {:?} -> {:?}", self.stage, next);
        self.stage = next;
    }

    fn not_ready(&self) -> RhiError {
        RhiError::NotInitialized(self.stage)
    }

    fn require_running(&self) -> RhiResult<()> {
        if self.stage == BootstrapStage::Running {
            Ok(())
        } else {
            Err(self.not_ready())
        }
    }

    fn instance_driver(&self) -> RhiResult<&dyn InstanceDriver> {
        self.instance.as_deref().ok_or_else(|| self.not_ready())
    }

    fn physical(&self) -> RhiResult<&PhysicalDevice> {
        self.physical_device.as_ref().ok_or_else(|| self.not_ready())
    }

    fn logical(&self) -> RhiResult<&LogicalDevice> {
        self.device.as_ref().ok_or_else(|| self.not_ready())
    }

    fn device_driver(&self) -> RhiResult<&dyn DeviceDriver> {
        self.logical().map(LogicalDevice::driver)
    }

    fn command_infrastructure(&self) -> RhiResult<&CommandInfrastructure> {
        self.commands.as_ref().ok_or_else(|| self.not_ready())
    }

    fn current_swapchain(&self) -> RhiResult<&Swapchain> {
        self.swapchain.as_ref().ok_or_else(|| self.not_ready())
    }

    fn create_swapchain(&mut self) -> RhiResult<()> {
        let surface = self.surface.ok_or_else(|| self.not_ready())?;
        let framebuffer_size = self.window.as_ref().ok_or_else(|| self.not_ready())?.framebuffer_size();

        let swapchain = Swapchain::new(
            self.instance_driver()?,
            self.device_driver()?,
            self.physical()?,
            surface,
            &self.config,
            framebuffer_size,
        )?;
        self.swapchain = Some(swapchain);
        Ok(())
    }

    fn create_depth_attachment(&mut self) -> RhiResult<()> {
        let extent = self.current_swapchain()?.extent();
        let depth = DepthAttachment::new(
            self.device_driver()?,
            self.physical()?.memory_properties(),
            self.depth_format,
            extent,
        )?;
        self.depth = Some(depth);
        Ok(())
    }

    /// Destroys the depth attachment, the swapchain image views and the swapchain, in that order.
    fn destroy_swapchain_resources(&mut self) {
        let Some(device) = self.device.as_ref() else {
            return;
        };

        if let Some(depth) = self.depth.take() {
            depth.destroy(device.driver());
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(device.driver());
        }
    }

    /// Blocks while the window is minimized, waits for every frame in flight, then rebuilds the swapchain,
    /// its views and the depth attachment. Per-frame sync primitives are left untouched.
    ///
    /// A failed rebuild drops the RHI back to [`BootstrapStage::SyncPrimitivesReady`], so later frame
    /// calls report that the swapchain is gone.
    #[profiling::function]
    fn recreate_swapchain(&mut self) -> RhiResult<()> {
        let window = Arc::clone(self.window.as_ref().ok_or_else(|| self.not_ready())?);

        let mut size = window.framebuffer_size();
        if size.is_degenerate() {
            log::info!("Framebuffer is {}x{}; waiting for a usable size", size.width, size.height);
        }
        while size.is_degenerate() {
            window.poll_events();
            size = window.framebuffer_size();
        }

        let fences = raw_handles(self.sync.fences());
        self.device_driver()?
            .wait_for_fences(&fences, true, u64::MAX)
            .map_err(RhiError::FenceWaitFailed)?;

        self.destroy_swapchain_resources();
        if let Err(e) = self.create_swapchain().and_then(|_| self.create_depth_attachment()) {
            log::error!("Swapchain recreation failed: {}", e);
            self.destroy_swapchain_resources();
            self.stage = BootstrapStage::SyncPrimitivesReady;
            return Err(e);
        }

        self.framebuffer_resized = false;
        self.swapchain_generation += 1;
        log::info!(
            "Swapchain recreated ({}x{}, generation {})",
            size.width,
            size.height,
            self.swapchain_generation
        );
        Ok(())
    }

    /// Blocks until the current frame slot's fence is signaled.
    #[profiling::function]
    pub fn wait_for_fences(&self) -> RhiResult<()> {
        self.require_running()?;
        let fence = self.sync.frame(self.current_frame).in_flight_fence.resource();

        self.device_driver()?
            .wait_for_fences(&[fence], true, u64::MAX)
            .map_err(|e| {
                log::error!("Failed to wait for the in-flight fence: {}", e);
                RhiError::FenceWaitFailed(e)
            })
    }

    /// Acquires the next swapchain image and presents it.
    ///
    /// An out-of-date acquire recreates the swapchain and returns before the fence is reset or the frame
    /// slot advances. Otherwise the slot's fence is reset, the image is presented, and the swapchain is
    /// recreated if presentation reports it out of date or suboptimal, or a resize is pending.
    /// No command buffer is recorded or submitted in between.
    #[profiling::function]
    pub fn prepare_before_pass(&mut self) -> RhiResult<FrameStatus> {
        self.require_running()?;

        let frame = self.sync.frame(self.current_frame);
        let image_available = frame.image_available.resource();
        let render_finished = frame.render_finished.resource();
        let in_flight = frame.in_flight_fence.resource();

        let swapchain = self.current_swapchain()?.handle();
        let device = self.logical()?;
        let present_queue = device.present_queue().resource();
        let driver = device.driver();

        let image_index = match driver.acquire_next_image(swapchain, u64::MAX, image_available, vk::Fence::null()) {
            Ok((image_index, _suboptimal)) => image_index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on acquire");
                self.recreate_swapchain()?;
                return Ok(FrameStatus::SwapchainRecreated);
            }
            Err(e) => {
                log::error!("Failed to acquire swapchain image: {}", e);
                return Err(RhiError::AcquireFailed(e));
            }
        };

        driver.reset_fences(&[in_flight]).map_err(RhiError::FenceResetFailed)?;

        if let Some(window) = &self.window {
            window.pre_present();
        }

        let wait_semaphores = [render_finished];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let stale = match driver.queue_present(present_queue, &present_info) {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => {
                log::error!("Failed to present swapchain image: {}", e);
                return Err(RhiError::PresentFailed(e));
            }
        };

        let status = if stale || self.framebuffer_resized {
            self.recreate_swapchain()?;
            FrameStatus::SwapchainRecreated
        } else {
            FrameStatus::Presented { image_index }
        };

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(status)
    }

    /// Marks the swapchain stale; it is rebuilt after the next present.
    pub fn notify_framebuffer_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    pub fn device_wait_idle(&self) -> RhiResult<()> {
        self.logical()?.wait_idle()
    }

    pub fn create_render_pass(&self, info: &RenderPassCreateInfo<'_>) -> RhiResult<RenderPass> {
        let driver = self.device_driver()?;
        let lowered = LoweredRenderPass::new(info)?;
        log::debug!(
            "Creating render pass: {} attachments, {} subpasses, {} attachment references",
            info.attachments.len(),
            info.subpasses.len(),
            lowered.reference_count()
        );

        lowered
            .with_native(|create_info| driver.create_render_pass(create_info))
            .map(RenderPass::new)
            .map_err(|e| {
                log::error!("Failed to create render pass: {}", e);
                RhiError::RenderPassCreationFailed(e)
            })
    }

    pub fn create_framebuffer(&self, info: &FramebufferCreateInfo<'_>) -> RhiResult<Framebuffer> {
        let driver = self.device_driver()?;

        LoweredFramebuffer::new(info)
            .with_native(|create_info| driver.create_framebuffer(create_info))
            .map(Framebuffer::new)
            .map_err(|e| {
                log::error!("Failed to create framebuffer: {}", e);
                RhiError::FramebufferCreationFailed(e)
            })
    }

    pub fn create_descriptor_set_layout(
        &self,
        info: &DescriptorSetLayoutCreateInfo<'_>,
    ) -> RhiResult<DescriptorSetLayout> {
        let driver = self.device_driver()?;
        let lowered = LoweredDescriptorSetLayout::new(info)?;
        log::debug!(
            "Creating descriptor set layout: {} bindings, {} immutable samplers",
            info.bindings.len(),
            lowered.sampler_count()
        );

        lowered
            .with_native(|create_info| driver.create_descriptor_set_layout(create_info))
            .map(DescriptorSetLayout::new)
            .map_err(|e| {
                log::error!("Failed to create descriptor set layout: {}", e);
                RhiError::DescriptorSetLayoutCreationFailed(e)
            })
    }

    /// One set per layout in `info`, in the same order.
    pub fn allocate_descriptor_sets(&self, info: &DescriptorSetAllocateInfo<'_>) -> RhiResult<Vec<DescriptorSet>> {
        let driver = self.device_driver()?;
        let lowered = LoweredDescriptorSetAllocate::new(info);
        log::debug!("Allocating {} descriptor sets", lowered.set_count());

        lowered
            .with_native(|allocate_info| driver.allocate_descriptor_sets(allocate_info))
            .map(|sets| sets.into_iter().map(DescriptorSet::new).collect())
            .map_err(|e| {
                log::error!("Failed to allocate descriptor sets: {}", e);
                RhiError::DescriptorSetAllocationFailed(e)
            })
    }

    /// Count contracts are checked before the driver sees anything.
    pub fn update_descriptor_sets(
        &self,
        writes: &[WriteDescriptorSet<'_>],
        copies: &[CopyDescriptorSet<'_>],
    ) -> RhiResult<()> {
        let driver = self.device_driver()?;
        let lowered = LoweredDescriptorUpdate::new(writes, copies)?;
        lowered.with_native(|writes, copies| driver.update_descriptor_sets(writes, copies));
        Ok(())
    }

    pub fn create_sampler(&self, config: &SamplerConfig) -> RhiResult<Sampler> {
        create_sampler(self.device_driver()?, config, &self.physical()?.properties().limits)
    }

    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        memory_flags: vk::MemoryPropertyFlags,
    ) -> RhiResult<(Buffer, DeviceMemory)> {
        utility::create_buffer(
            self.device_driver()?,
            self.physical()?.memory_properties(),
            size,
            usage,
            memory_flags,
        )
    }

    pub fn create_image(&self, desc: &ImageDesc) -> RhiResult<(Image, DeviceMemory)> {
        utility::create_image(self.device_driver()?, self.physical()?.memory_properties(), desc)
    }

    pub fn create_image_view(&self, image: &Image, desc: &ImageViewDesc) -> RhiResult<ImageView> {
        utility::create_image_view(self.device_driver()?, image.resource(), desc)
    }

    /// Allocates a one-shot command buffer from the long-lived pool, already begun.
    pub fn begin_single_time_commands(&self) -> RhiResult<CommandBuffer> {
        self.command_infrastructure()?
            .begin_single_time_commands(self.device_driver()?)
    }

    /// Ends, submits and waits for `command_buffer`, then frees it.
    pub fn end_single_time_commands(&self, command_buffer: CommandBuffer) -> RhiResult<()> {
        let device = self.logical()?;
        self.command_infrastructure()?
            .end_single_time_commands(device.driver(), device.graphics_queue(), command_buffer)
    }

    pub fn single_time_commands(&self, record: impl FnOnce(&dyn DeviceDriver, vk::CommandBuffer)) -> RhiResult<()> {
        let device = self.logical()?;
        self.command_infrastructure()?
            .single_time_commands(device.driver(), device.graphics_queue(), record)
    }

    pub fn copy_buffer(
        &self,
        src: &Buffer,
        dst: &Buffer,
        src_offset: vk::DeviceSize,
        dst_offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> RhiResult<()> {
        let device = self.logical()?;
        let region = vk::BufferCopy {
            src_offset,
            dst_offset,
            size,
        };
        self.command_infrastructure()?
            .copy_buffer(device.driver(), device.graphics_queue(), src, dst, region)
    }

    fn release(&self, what: &str, destroy: impl FnOnce(&dyn DeviceDriver)) {
        match self.device.as_ref() {
            Some(device) => destroy(device.driver()),
            None => log::warn!("{} outlived the device; its handle is leaked", what),
        }
    }

    pub fn destroy_render_pass(&self, mut render_pass: RenderPass) {
        self.release("Render pass", |driver| driver.destroy_render_pass(render_pass.take()));
    }

    pub fn destroy_framebuffer(&self, mut framebuffer: Framebuffer) {
        self.release("Framebuffer", |driver| driver.destroy_framebuffer(framebuffer.take()));
    }

    pub fn destroy_descriptor_set_layout(&self, mut layout: DescriptorSetLayout) {
        self.release("Descriptor set layout", |driver| {
            driver.destroy_descriptor_set_layout(layout.take())
        });
    }

    pub fn destroy_sampler(&self, mut sampler: Sampler) {
        self.release("Sampler", |driver| driver.destroy_sampler(sampler.take()));
    }

    pub fn destroy_buffer(&self, mut buffer: Buffer, mut memory: DeviceMemory) {
        self.release("Buffer", |driver| {
            driver.destroy_buffer(buffer.take());
            driver.free_memory(memory.take());
        });
    }

    pub fn destroy_image(&self, mut image: Image, mut memory: DeviceMemory) {
        self.release("Image", |driver| {
            driver.destroy_image(image.take());
            driver.free_memory(memory.take());
        });
    }

    pub fn destroy_image_view(&self, mut view: ImageView) {
        self.release("Image view", |driver| driver.destroy_image_view(view.take()));
    }

    /// Waits for the device, then destroys everything the bootstrap created in reverse order.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.window.is_none() && self.instance.is_none() {
            return;
        }
        log::info!("Shutting down RHI (stage: {:?})", self.stage);

        if let Some(device) = self.device.as_ref() {
            if let Err(e) = device.wait_idle() {
                log::warn!("Device wait idle failed during shutdown: {}", e);
            }
        }

        self.destroy_swapchain_resources();

        if let Some(device) = self.device.take() {
            let driver = device.driver();
            self.sync.destroy(driver);
            let mut pool = std::mem::take(&mut self.descriptor_pool);
            if !pool.is_null() {
                driver.destroy_descriptor_pool(pool.take());
            }
            if let Some(commands) = self.commands.take() {
                commands.destroy(driver);
            }
            device.destroy();
        }

        self.physical_device = None;

        if let Some(mut instance) = self.instance.take() {
            if let Some(surface) = self.surface.take() {
                instance.destroy_surface(surface);
            }
            instance.destroy_instance();
        }

        self.window = None;
        self.current_frame = 0;
        self.framebuffer_resized = false;
        self.stage = BootstrapStage::Uninitialized;
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    pub fn config(&self) -> &RhiConfig {
        &self.config
    }

    pub fn physical_device(&self) -> Option<&PhysicalDevice> {
        self.physical_device.as_ref()
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn swapchain_extent(&self) -> Extent2D {
        self.swapchain.as_ref().map(Swapchain::extent).unwrap_or_default()
    }

    pub fn swapchain_format(&self) -> vk::Format {
        self.swapchain.as_ref().map_or(vk::Format::UNDEFINED, Swapchain::format)
    }

    pub fn swapchain_image_views(&self) -> &[ImageView] {
        self.swapchain.as_ref().map(Swapchain::image_views).unwrap_or(&[])
    }

    /// Bumped on every recreation.
    pub fn swapchain_generation(&self) -> u64 {
        self.swapchain_generation
    }

    pub fn depth_attachment(&self) -> Option<&DepthAttachment> {
        self.depth.as_ref()
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    pub fn frame_command_buffer(&self) -> Option<&CommandBuffer> {
        self.commands
            .as_ref()
            .map(|commands| commands.frame(self.current_frame).command_buffer())
    }
}

impl Drop for VulkanRhi {
    fn drop(&mut self) {
        self.shutdown();
    }
}
