//! Logical device and queue retrieval.

use std::ffi::c_char;

use ash::vk;
use aura_core::log;

use crate::driver::{DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::physical_device::{PhysicalDevice, REQUIRED_DEVICE_EXTENSIONS};
use crate::resource::Queue;

/// The logical device's driver table plus the queues retrieved right after creation.
pub struct LogicalDevice {
    driver: Box<dyn DeviceDriver>,
    graphics_queue: Queue,
    present_queue: Queue,
    compute_queue: Queue,
}

impl LogicalDevice {
    /// Create a new logical device from a physical device.
    #[profiling::function]
    pub(crate) fn new(instance: &dyn InstanceDriver, physical_device: &PhysicalDevice) -> RhiResult<Self> {
        let queue_families = physical_device.queue_families();
        let (Some(graphics), Some(present), Some(compute)) = (
            queue_families.graphics_family,
            queue_families.present_family,
            queue_families.compute_family,
        ) else {
            return Err(RhiError::NoSuitablePhysicalDevice);
        };

        let queue_priority = 1.0f32;
        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(std::slice::from_ref(&queue_priority))
            })
            .collect();

        let extensions: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS.iter().map(|name| name.as_ptr()).collect();

        // Enable features
        let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let driver = instance
            .create_device(physical_device.handle(), &create_info)
            .map_err(|e| {
                log::error!("Failed to create logical device: {}", e);
                RhiError::DeviceCreationFailed(e)
            })?;

        let graphics_queue = Queue::new(driver.device_queue(graphics, 0));
        let present_queue = Queue::new(driver.device_queue(present, 0));
        let compute_queue = Queue::new(driver.device_queue(compute, 0));

        Ok(Self {
            driver,
            graphics_queue,
            present_queue,
            compute_queue,
        })
    }

    #[inline]
    pub fn driver(&self) -> &dyn DeviceDriver {
        self.driver.as_ref()
    }

    pub fn graphics_queue(&self) -> &Queue {
        &self.graphics_queue
    }

    pub fn present_queue(&self) -> &Queue {
        &self.present_queue
    }

    pub fn compute_queue(&self) -> &Queue {
        &self.compute_queue
    }

    pub fn wait_idle(&self) -> RhiResult<()> {
        self.driver.device_wait_idle().map_err(RhiError::WaitIdleFailed)
    }

    /// Destroys the device. Queues die with it.
    pub(crate) fn destroy(mut self) {
        self.graphics_queue.take();
        self.present_queue.take();
        self.compute_queue.take();
        self.driver.destroy_device();
    }
}
