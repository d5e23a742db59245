use ash::vk;
use aura_core::log;

use crate::config::DescriptorPoolSizing;
use crate::driver::DeviceDriver;
use crate::error::{RhiError, RhiResult};
use crate::resource::DescriptorPool;

/// Creates the long-lived descriptor pool every engine descriptor set is allocated from.
pub(crate) fn create_descriptor_pool(
    device: &dyn DeviceDriver,
    sizing: &DescriptorPoolSizing,
) -> RhiResult<DescriptorPool> {
    let pool_sizes = sizing.pool_sizes();

    let create_info = vk::DescriptorPoolCreateInfo::default()
        .max_sets(sizing.max_sets)
        .pool_sizes(&pool_sizes);

    let pool = device.create_descriptor_pool(&create_info).map_err(|e| {
        log::error!("Failed to create descriptor pool: {}", e);
        RhiError::DescriptorPoolCreationFailed(e)
    })?;

    log::debug!("Descriptor pool: {} sets, {} pool sizes", sizing.max_sets, pool_sizes.len());
    Ok(DescriptorPool::new(pool))
}
