use ash::vk;
use aura_core::log;

use crate::driver::{DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::resource::{Buffer, DeviceMemory, Image, ImageView};
use crate::types::Extent2D;

/// Depth formats in order of preference.
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Find a suitable memory type index.
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    for i in 0..memory_properties.memory_type_count {
        let memory_type = memory_properties.memory_types[i as usize];
        if (type_filter & (1 << i)) != 0 && memory_type.property_flags.contains(properties) {
            return Some(i);
        }
    }
    None
}

/// First candidate whose tiling features contain `features`.
pub fn find_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    mut format_properties: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let properties = format_properties(format);
        match tiling {
            vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}

pub(crate) fn find_depth_format(
    instance: &dyn InstanceDriver,
    physical_device: vk::PhysicalDevice,
) -> RhiResult<vk::Format> {
    find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |format| instance.format_properties(physical_device, format),
    )
    .ok_or(RhiError::NoSupportedDepthFormat)
}

pub fn has_stencil_component(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT)
}

fn allocate_memory(
    device: &dyn DeviceDriver,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    flags: vk::MemoryPropertyFlags,
) -> RhiResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(memory_properties, requirements.memory_type_bits, flags).ok_or(
        RhiError::NoSuitableMemoryType {
            type_filter: requirements.memory_type_bits,
            flags,
        },
    )?;

    let allocate_info = vk::MemoryAllocateInfo::default()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    device
        .allocate_memory(&allocate_info)
        .map_err(RhiError::MemoryAllocationFailed)
}

/// 2D image description for [`create_image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageDesc {
    pub extent: Extent2D,
    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub memory_flags: vk::MemoryPropertyFlags,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub flags: vk::ImageCreateFlags,
}

impl ImageDesc {
    pub fn depth_attachment(extent: Extent2D, format: vk::Format) -> Self {
        Self {
            extent,
            format,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            mip_levels: 1,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
        }
    }
}

/// Creates an image and binds it to a dedicated allocation.
#[profiling::function]
pub(crate) fn create_image(
    device: &dyn DeviceDriver,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    desc: &ImageDesc,
) -> RhiResult<(Image, DeviceMemory)> {
    let create_info = vk::ImageCreateInfo::default()
        .flags(desc.flags)
        .image_type(vk::ImageType::TYPE_2D)
        .extent(vk::Extent3D {
            width: desc.extent.width,
            height: desc.extent.height,
            depth: 1,
        })
        .mip_levels(desc.mip_levels)
        .array_layers(desc.array_layers)
        .format(desc.format)
        .tiling(desc.tiling)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .usage(desc.usage)
        .samples(vk::SampleCountFlags::TYPE_1)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let image = device.create_image(&create_info).map_err(|e| {
        log::error!("Failed to create image: {}", e);
        RhiError::ImageCreationFailed(e)
    })?;

    let requirements = device.image_memory_requirements(image);
    let memory = match allocate_memory(device, memory_properties, requirements, desc.memory_flags) {
        Ok(memory) => memory,
        Err(e) => {
            log::error!("Failed to allocate image memory: {}", e);
            device.destroy_image(image);
            return Err(e);
        }
    };

    if let Err(e) = device.bind_image_memory(image, memory, 0) {
        log::error!("Failed to bind image memory: {}", e);
        device.destroy_image(image);
        device.free_memory(memory);
        return Err(RhiError::MemoryAllocationFailed(e));
    }

    Ok((Image::new(image), DeviceMemory::new(memory)))
}

/// View description for [`create_image_view`].
#[derive(Debug, Clone, Copy)]
pub struct ImageViewDesc {
    pub format: vk::Format,
    pub aspect_mask: vk::ImageAspectFlags,
    pub view_type: vk::ImageViewType,
    pub mip_levels: u32,
    pub layer_count: u32,
}

impl ImageViewDesc {
    pub fn color_2d(format: vk::Format) -> Self {
        Self {
            format,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            view_type: vk::ImageViewType::TYPE_2D,
            mip_levels: 1,
            layer_count: 1,
        }
    }

    pub fn depth_2d(format: vk::Format) -> Self {
        Self {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            ..Self::color_2d(format)
        }
    }
}

pub(crate) fn create_image_view(
    device: &dyn DeviceDriver,
    image: vk::Image,
    desc: &ImageViewDesc,
) -> RhiResult<ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(desc.view_type)
        .format(desc.format)
        .components(vk::ComponentMapping::default())
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: desc.aspect_mask,
            base_mip_level: 0,
            level_count: desc.mip_levels,
            base_array_layer: 0,
            layer_count: desc.layer_count,
        });

    device
        .create_image_view(&create_info)
        .map(ImageView::new)
        .map_err(|e| {
            log::error!("Failed to create image view: {}", e);
            RhiError::ImageViewCreationFailed(e)
        })
}

/// Creates an exclusive buffer and binds it to a dedicated allocation.
#[profiling::function]
pub(crate) fn create_buffer(
    device: &dyn DeviceDriver,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    memory_flags: vk::MemoryPropertyFlags,
) -> RhiResult<(Buffer, DeviceMemory)> {
    let create_info = vk::BufferCreateInfo::default()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = device.create_buffer(&create_info).map_err(|e| {
        log::error!("Failed to create buffer: {}", e);
        RhiError::BufferCreationFailed(e)
    })?;

    let requirements = device.buffer_memory_requirements(buffer);
    let memory = match allocate_memory(device, memory_properties, requirements, memory_flags) {
        Ok(memory) => memory,
        Err(e) => {
            log::error!("Failed to allocate buffer memory: {}", e);
            device.destroy_buffer(buffer);
            return Err(e);
        }
    };

    if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
        log::error!("Failed to bind buffer memory: {}", e);
        device.destroy_buffer(buffer);
        device.free_memory(memory);
        return Err(RhiError::MemoryAllocationFailed(e));
    }

    Ok((Buffer::new(buffer), DeviceMemory::new(memory)))
}
