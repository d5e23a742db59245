//! Aura RHI (Render Hardware Interface) - Vulkan device bootstrap and resource translation.
//!
//! This crate brings a Vulkan device up to a presentable swapchain, and translates the engine-facing
//! descriptors in [`types`] into native create-info structures.

pub mod command;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod driver;
pub mod error;
pub mod physical_device;
pub mod resource;
pub mod rhi;
pub mod sampler;
pub mod swapchain;
pub mod sync;
pub mod translate;
pub mod types;
pub mod utility;
pub mod vulkan;
pub mod window;

#[cfg(test)]
mod mock;

pub(crate) use paste::paste;

/// Number of frame slots, each with its own semaphores, fence and command buffer.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

pub use ash::vk;
pub use config::{DescriptorPoolSizing, RhiConfig};
pub use device::LogicalDevice;
pub use driver::{Backend, DeviceDriver, InstanceDriver};
pub use error::{ErrorKind, RhiError, RhiResult};
pub use physical_device::{PhysicalDevice, QueueFamilyIndices, SwapChainSupportDetails};
pub use resource::{
    Buffer, CommandBuffer, CommandPool, DescriptorPool, DescriptorSet, DescriptorSetLayout, DeviceMemory, Fence,
    Framebuffer, Image, ImageView, NativeResource, Queue, RenderPass, Sampler, Semaphore,
};
pub use rhi::{BootstrapStage, FrameStatus, VulkanRhi};
pub use sampler::SamplerConfig;
pub use swapchain::{DepthAttachment, Swapchain};
pub use sync::FrameSync;
pub use types::{
    AttachmentDescription, AttachmentReference, CopyDescriptorSet, DescriptorBufferInfo, DescriptorImageInfo,
    DescriptorSetAllocateInfo, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo, Extent2D,
    FramebufferCreateInfo, Offset2D, Rect2D, RenderPassCreateInfo, SubpassDependency, SubpassDescription,
    WriteDescriptorSet,
};
pub use utility::{ImageDesc, ImageViewDesc};
pub use vulkan::VulkanBackend;
pub use window::RhiWindow;
