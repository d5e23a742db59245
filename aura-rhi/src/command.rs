//! Command pools and buffers, and the single-time command scope.

use ash::vk;
use aura_core::log;

use crate::driver::DeviceDriver;
use crate::error::{RhiError, RhiResult};
use crate::resource::{Buffer, CommandBuffer, CommandPool, Queue};
use crate::MAX_FRAMES_IN_FLIGHT;

fn create_command_pool(
    device: &dyn DeviceDriver,
    queue_family: u32,
    flags: vk::CommandPoolCreateFlags,
) -> Result<CommandPool, vk::Result> {
    let create_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family)
        .flags(flags);

    device.create_command_pool(&create_info).map(CommandPool::new)
}

fn allocate_primary(device: &dyn DeviceDriver, pool: &CommandPool) -> Result<CommandBuffer, vk::Result> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool.resource())
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = device.allocate_command_buffers(&alloc_info)?;
    buffers
        .first()
        .copied()
        .map(CommandBuffer::new)
        .ok_or(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
}

/// One frame-in-flight's transient pool and its primary command buffer.
#[derive(Debug)]
pub struct FrameCommands {
    pool: CommandPool,
    buffer: CommandBuffer,
}

impl FrameCommands {
    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.buffer
    }
}

/// The long-lived pool used for single-time commands, plus one transient pool per frame in flight.
#[derive(Debug)]
pub struct CommandInfrastructure {
    pool: CommandPool,
    frames: Vec<FrameCommands>,
}

impl CommandInfrastructure {
    #[profiling::function]
    pub(crate) fn new(device: &dyn DeviceDriver, graphics_family: u32) -> RhiResult<Self> {
        let pool = create_command_pool(device, graphics_family, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .map_err(|e| {
                log::error!("Failed to create command pool: {}", e);
                RhiError::CommandInfrastructureFailed(e)
            })?;

        let mut infrastructure = Self {
            pool,
            frames: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
        };

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            if let Err(e) = infrastructure.push_frame(device, graphics_family) {
                log::error!("Failed to create per-frame command buffer: {}", e);
                infrastructure.destroy(device);
                return Err(RhiError::CommandInfrastructureFailed(e));
            }
        }

        Ok(infrastructure)
    }

    fn push_frame(&mut self, device: &dyn DeviceDriver, graphics_family: u32) -> Result<(), vk::Result> {
        let mut pool = create_command_pool(device, graphics_family, vk::CommandPoolCreateFlags::TRANSIENT)?;
        let buffer = match allocate_primary(device, &pool) {
            Ok(buffer) => buffer,
            Err(e) => {
                device.destroy_command_pool(pool.take());
                return Err(e);
            }
        };
        self.frames.push(FrameCommands { pool, buffer });
        Ok(())
    }

    /// Frees every command buffer, then destroys the pools that own them.
    pub(crate) fn destroy(mut self, device: &dyn DeviceDriver) {
        for mut frame in self.frames.drain(..) {
            let pool = frame.pool.take();
            device.free_command_buffers(pool, &[frame.buffer.take()]);
            device.destroy_command_pool(pool);
        }
        device.destroy_command_pool(self.pool.take());
    }

    pub fn pool(&self) -> &CommandPool {
        &self.pool
    }

    pub fn frame(&self, frame_index: usize) -> &FrameCommands {
        &self.frames[frame_index % self.frames.len()]
    }

    /// Allocates a primary command buffer from the long-lived pool and begins it for one submission.
    pub(crate) fn begin_single_time_commands(&self, device: &dyn DeviceDriver) -> RhiResult<CommandBuffer> {
        let mut command_buffer = allocate_primary(device, &self.pool).map_err(RhiError::SingleTimeCommandFailed)?;

        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        if let Err(e) = device.begin_command_buffer(command_buffer.resource(), &begin_info) {
            device.free_command_buffers(self.pool.resource(), &[command_buffer.take()]);
            return Err(RhiError::SingleTimeCommandFailed(e));
        }

        Ok(command_buffer)
    }

    /// Ends, submits and waits for `command_buffer`, then frees it whatever the outcome.
    pub(crate) fn end_single_time_commands(
        &self,
        device: &dyn DeviceDriver,
        graphics_queue: &Queue,
        mut command_buffer: CommandBuffer,
    ) -> RhiResult<()> {
        let result = submit_and_wait(device, graphics_queue, &command_buffer);
        device.free_command_buffers(self.pool.resource(), &[command_buffer.take()]);

        result.map_err(|e| {
            log::error!("Single-time command submission failed: {}", e);
            RhiError::SingleTimeCommandFailed(e)
        })
    }

    /// Records with `record` inside a single-time scope.
    #[profiling::function]
    pub(crate) fn single_time_commands(
        &self,
        device: &dyn DeviceDriver,
        graphics_queue: &Queue,
        record: impl FnOnce(&dyn DeviceDriver, vk::CommandBuffer),
    ) -> RhiResult<()> {
        let command_buffer = self.begin_single_time_commands(device)?;
        record(device, command_buffer.resource());
        self.end_single_time_commands(device, graphics_queue, command_buffer)
    }

    pub(crate) fn copy_buffer(
        &self,
        device: &dyn DeviceDriver,
        graphics_queue: &Queue,
        src: &Buffer,
        dst: &Buffer,
        region: vk::BufferCopy,
    ) -> RhiResult<()> {
        self.single_time_commands(device, graphics_queue, |device, command_buffer| {
            device.cmd_copy_buffer(command_buffer, src.resource(), dst.resource(), &[region]);
        })
    }
}

fn submit_and_wait(device: &dyn DeviceDriver, queue: &Queue, command_buffer: &CommandBuffer) -> Result<(), vk::Result> {
    device.end_command_buffer(command_buffer.resource())?;

    let command_buffers = [command_buffer.resource()];
    let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
    device.queue_submit(queue.resource(), &[submit_info], vk::Fence::null())?;
    device.queue_wait_idle(queue.resource())
}
