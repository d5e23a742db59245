//! Swapchain configuration choice, creation and the depth attachment that follows its extent.

use ash::vk;
use aura_core::log::{error, info};

use crate::config::RhiConfig;
use crate::driver::{DeviceDriver, InstanceDriver};
use crate::error::{RhiError, RhiResult};
use crate::physical_device::{PhysicalDevice, SwapChainSupportDetails};
use crate::resource::{DeviceMemory, Image, ImageView};
use crate::types::Extent2D;
use crate::utility::{create_image, create_image_view, ImageDesc, ImageViewDesc};

pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> vk::SurfaceFormatKHR {
    // Try to find preferred format
    formats
        .iter()
        .find(|f| f.format == preferred.format && f.color_space == preferred.color_space)
        .or_else(|| formats.first())
        .copied()
        .unwrap_or(preferred)
}

/// Falls back to FIFO, the one mode every implementation must support.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR], preferred: vk::PresentModeKHR) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's current extent, unless it is the `u32::MAX` sentinel; then the framebuffer size
/// clamped to the surface bounds.
pub fn choose_swapchain_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: Extent2D) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: framebuffer_size.width.clamp(min.width, max.width),
        height: framebuffer_size.height.clamp(min.height, max.height),
    }
}

/// One more than the minimum, capped by the maximum when the surface reports one.
pub fn swapchain_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

/// The swapchain and one view per swapchain image.
#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<Image>,
    image_views: Vec<ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: Extent2D,
}

impl Swapchain {
    #[profiling::function]
    pub(crate) fn new(
        instance: &dyn InstanceDriver,
        device: &dyn DeviceDriver,
        physical_device: &PhysicalDevice,
        surface: vk::SurfaceKHR,
        config: &RhiConfig,
        framebuffer_size: Extent2D,
    ) -> RhiResult<Self> {
        let support = SwapChainSupportDetails::query(instance, physical_device.handle(), surface)
            .map_err(RhiError::SwapchainCreationFailed)?;

        let format = choose_surface_format(&support.formats, config.preferred_surface_format);
        let present_mode = choose_present_mode(&support.present_modes, config.preferred_present_mode);
        let extent = choose_swapchain_extent(&support.capabilities, framebuffer_size);
        let image_count = swapchain_image_count(&support.capabilities);

        let queue_families = physical_device.queue_families();
        let family_indices: Vec<u32> = [queue_families.graphics_family, queue_families.present_family]
            .into_iter()
            .flatten()
            .collect();
        let concurrent = queue_families.graphics_family != queue_families.present_family;

        info!(
            "Creating new swapchain: {:?} {:?}, {}x{}, {} images, {:?}",
            format.format, format.color_space, extent.width, extent.height, image_count, present_mode
        );

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        create_info = if concurrent {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let handle = device.create_swapchain(&create_info).map_err(|e| {
            error!("Failed to create swapchain: {}", e);
            RhiError::SwapchainCreationFailed(e)
        })?;

        let images = match device.swapchain_images(handle) {
            Ok(images) => images,
            Err(e) => {
                device.destroy_swapchain(handle);
                return Err(RhiError::SwapchainCreationFailed(e));
            }
        };

        let mut swapchain = Self {
            handle,
            images: images.into_iter().map(Image::new).collect(),
            image_views: Vec::new(),
            format,
            present_mode,
            extent: extent.into(),
        };

        if let Err(e) = swapchain.create_image_views(device) {
            swapchain.destroy(device);
            return Err(e);
        }

        Ok(swapchain)
    }

    fn create_image_views(&mut self, device: &dyn DeviceDriver) -> RhiResult<()> {
        let desc = ImageViewDesc::color_2d(self.format.format);
        self.image_views.reserve(self.images.len());

        for image in &self.images {
            let view = create_image_view(device, image.resource(), &desc)?;
            self.image_views.push(view);
        }

        Ok(())
    }

    /// Destroys the views, then the swapchain. The swapchain owns its images.
    pub(crate) fn destroy(mut self, device: &dyn DeviceDriver) {
        for mut view in self.image_views.drain(..) {
            device.destroy_image_view(view.take());
        }
        self.images.clear();
        device.destroy_swapchain(self.handle);
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn image_views(&self) -> &[ImageView] {
        &self.image_views
    }

    pub fn format(&self) -> vk::Format {
        self.format.format
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

/// Depth image, its memory and view, sized to the swapchain extent.
#[derive(Debug)]
pub struct DepthAttachment {
    image: Image,
    memory: DeviceMemory,
    view: ImageView,
    format: vk::Format,
    extent: Extent2D,
}

impl DepthAttachment {
    pub(crate) fn new(
        device: &dyn DeviceDriver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        format: vk::Format,
        extent: Extent2D,
    ) -> RhiResult<Self> {
        let (mut image, mut memory) = create_image(device, memory_properties, &ImageDesc::depth_attachment(extent, format))?;

        let view = match create_image_view(device, image.resource(), &ImageViewDesc::depth_2d(format)) {
            Ok(view) => view,
            Err(e) => {
                device.destroy_image(image.take());
                device.free_memory(memory.take());
                return Err(e);
            }
        };

        Ok(Self {
            image,
            memory,
            view,
            format,
            extent,
        })
    }

    pub(crate) fn destroy(mut self, device: &dyn DeviceDriver) {
        device.destroy_image_view(self.view.take());
        device.destroy_image(self.image.take());
        device.free_memory(self.memory.take());
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn view(&self) -> &ImageView {
        &self.view
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> Extent2D {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..Default::default()
        }
    }

    #[test]
    fn defined_current_extent_wins_over_framebuffer_size() {
        let caps = capabilities(vk::Extent2D { width: 800, height: 600 });
        for size in [Extent2D::new(1, 1), Extent2D::new(800, 600), Extent2D::new(5000, 5000)] {
            assert_eq!(choose_swapchain_extent(&caps, size), vk::Extent2D { width: 800, height: 600 });
        }
    }

    #[test]
    fn undefined_current_extent_clamps_to_bounds() {
        let caps = capabilities(vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        });
        assert_eq!(
            choose_swapchain_extent(&caps, Extent2D::new(4000, 10)),
            vk::Extent2D { width: 1920, height: 64 }
        );
        assert_eq!(
            choose_swapchain_extent(&caps, Extent2D::new(1024, 768)),
            vk::Extent2D { width: 1024, height: 768 }
        );
    }

    #[test]
    fn image_count_is_capped_only_when_max_is_reported() {
        let mut caps = capabilities(vk::Extent2D::default());
        assert_eq!(swapchain_image_count(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(swapchain_image_count(&caps), 2);
        caps.max_image_count = 8;
        assert_eq!(swapchain_image_count(&caps), 3);
    }

    #[test]
    fn surface_format_prefers_srgb_else_first() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(choose_surface_format(&[unorm, preferred], preferred), preferred);
        assert_eq!(choose_surface_format(&[unorm], preferred), unorm);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&modes, vk::PresentModeKHR::MAILBOX), vk::PresentModeKHR::FIFO);
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::MAILBOX], vk::PresentModeKHR::MAILBOX),
            vk::PresentModeKHR::MAILBOX
        );
    }
}
