use ash::vk;
use aura_core::log;

use crate::driver::DeviceDriver;
use crate::error::{RhiError, RhiResult};
use crate::resource::{Fence, Semaphore};
use crate::MAX_FRAMES_IN_FLIGHT;

/// Synchronization objects for a single frame.
pub struct FrameSync<'a> {
    pub image_available: &'a Semaphore,
    pub render_finished: &'a Semaphore,
    pub in_flight_fence: &'a Fence,
}

/// Per-frame-in-flight semaphores and fences. Never touched by swapchain recreation.
#[derive(Debug, Default)]
pub struct SyncPrimitives {
    image_available: Vec<Semaphore>,
    render_finished: Vec<Semaphore>,
    in_flight: Vec<Fence>,
}

impl SyncPrimitives {
    /// Fences start signaled so the first wait of every slot returns immediately.
    pub(crate) fn new(device: &dyn DeviceDriver) -> RhiResult<Self> {
        let mut sync = Self {
            image_available: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            render_finished: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            in_flight: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
        };

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            if let Err(e) = sync.push_frame(device) {
                log::error!("Failed to create frame synchronization objects: {}", e);
                sync.destroy(device);
                return Err(RhiError::SyncPrimitiveCreationFailed(e));
            }
        }

        Ok(sync)
    }

    fn push_frame(&mut self, device: &dyn DeviceDriver) -> Result<(), vk::Result> {
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

        self.image_available.push(Semaphore::new(device.create_semaphore(&semaphore_info)?));
        self.render_finished.push(Semaphore::new(device.create_semaphore(&semaphore_info)?));
        self.in_flight.push(Fence::new(device.create_fence(&fence_info)?));
        Ok(())
    }

    pub(crate) fn destroy(&mut self, device: &dyn DeviceDriver) {
        for mut fence in self.in_flight.drain(..) {
            device.destroy_fence(fence.take());
        }
        for mut semaphore in self.render_finished.drain(..).chain(self.image_available.drain(..)) {
            device.destroy_semaphore(semaphore.take());
        }
    }

    pub fn frame(&self, frame_index: usize) -> FrameSync<'_> {
        FrameSync {
            image_available: &self.image_available[frame_index],
            render_finished: &self.render_finished[frame_index],
            in_flight_fence: &self.in_flight[frame_index],
        }
    }

    pub fn fences(&self) -> &[Fence] {
        &self.in_flight
    }

    pub fn semaphores(&self) -> impl Iterator<Item = &Semaphore> {
        self.image_available.iter().chain(&self.render_finished)
    }
}
