use std::sync::Arc;

use anyhow::Context;
use aura_core::cli::EngineArgs;
use aura_core::log;
use aura_rhi::{FrameStatus, RhiConfig, RhiWindow, VulkanBackend, VulkanRhi};
use winit::window::Window;

use crate::scene::SceneResources;

pub struct Engine {
    pub main_window: Arc<Window>,

    scene: Option<SceneResources>,
    rhi: VulkanRhi,

    frames_presented: u64,
    should_exit: bool,
}

impl Engine {
    pub fn new(main_window: Arc<Window>, args: &EngineArgs) -> Result<Self, anyhow::Error> {
        let config = RhiConfig::default().with_application_name("Aura Sandbox");
        let config = if args.no_validation {
            config.with_validation(false)
        } else {
            config
        };

        let mut rhi = VulkanRhi::new(config);
        let window: Arc<dyn RhiWindow> = main_window.clone();
        rhi.initialize(&VulkanBackend, window)
            .context("Failed to initialize the Vulkan RHI")?;

        let scene = SceneResources::new(&rhi).context("Failed to create scene resources")?;

        Ok(Self {
            main_window,
            scene: Some(scene),
            rhi,
            frames_presented: 0,
            should_exit: false,
        })
    }

    /// Throttles on the frame slot's fence, then acquires and presents the next swapchain image.
    #[profiling::function]
    pub fn render(&mut self) {
        let size = self.main_window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }

        if let Err(e) = self.present_frame() {
            log::error!("Frame failed: {:#}", e);
            self.should_exit = true;
        }
    }

    fn present_frame(&mut self) -> Result<(), anyhow::Error> {
        self.rhi.wait_for_fences()?;

        match self.rhi.prepare_before_pass()? {
            FrameStatus::Presented { .. } => self.frames_presented += 1,
            FrameStatus::SwapchainRecreated => {
                if let Some(scene) = self.scene.as_mut() {
                    scene.rebuild_framebuffers(&self.rhi)?;
                }
            }
        }
        Ok(())
    }

    #[profiling::function]
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.rhi.notify_framebuffer_resized();
        }
    }

    /// Waits for the device, releases the scene, then tears the RHI down.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.rhi.device_wait_idle() {
            log::warn!("Device wait idle failed on exit: {}", e);
        }
        if let Some(scene) = self.scene.take() {
            scene.destroy(&self.rhi);
        }
        self.rhi.shutdown();
        log::info!("Engine shut down after {} presented frames", self.frames_presented);
    }

    #[inline]
    pub fn request_exit(&mut self) { self.should_exit = true; }

    #[inline]
    pub fn should_exit(&self) -> bool { self.should_exit }

    #[inline]
    pub fn frames_presented(&self) -> u64 { self.frames_presented }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.scene.is_some() {
            self.shutdown();
        }
    }
}
