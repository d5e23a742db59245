//! RHI error types.

use ash::vk;
use thiserror::Error;

use crate::rhi::BootstrapStage;

/// Coarse classification of an [`RhiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Initialization cannot continue; the engine should abort startup.
    FatalBootstrap,
    /// A resource could not be created; nothing built from it is usable.
    ResourceCreation,
    /// Engine-facing input violated a count contract during flattening.
    Consistency,
    /// A per-frame driver call failed outside the recoverable swapchain conditions.
    Frame,
}

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("Window handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),

    #[error("Instance creation failed: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("No Vulkan-capable GPU found")]
    NoPhysicalDevice,

    #[error("No suitable GPU found")]
    NoSuitablePhysicalDevice,

    #[error("Physical device query failed: {0}")]
    PhysicalDeviceQueryFailed(vk::Result),

    #[error("Logical device creation failed: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("Command pool or buffer creation failed: {0}")]
    CommandInfrastructureFailed(vk::Result),

    #[error("Descriptor pool creation failed: {0}")]
    DescriptorPoolCreationFailed(vk::Result),

    #[error("Semaphore or fence creation failed: {0}")]
    SyncPrimitiveCreationFailed(vk::Result),

    #[error("Swapchain creation failed: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("Image view creation failed: {0}")]
    ImageViewCreationFailed(vk::Result),

    #[error("Image creation failed: {0}")]
    ImageCreationFailed(vk::Result),

    #[error("Buffer creation failed: {0}")]
    BufferCreationFailed(vk::Result),

    #[error("Device memory allocation failed: {0}")]
    MemoryAllocationFailed(vk::Result),

    #[error("No memory type matches filter {type_filter:#b} with {flags:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("No supported depth attachment format")]
    NoSupportedDepthFormat,

    #[error("Sampler creation failed: {0}")]
    SamplerCreationFailed(vk::Result),

    #[error("Render pass creation failed: {0}")]
    RenderPassCreationFailed(vk::Result),

    #[error("Framebuffer creation failed: {0}")]
    FramebufferCreationFailed(vk::Result),

    #[error("Descriptor set layout creation failed: {0}")]
    DescriptorSetLayoutCreationFailed(vk::Result),

    #[error("Descriptor set allocation failed: {0}")]
    DescriptorSetAllocationFailed(vk::Result),

    #[error("{what} count mismatch: reserved {reserved}, consumed {consumed}")]
    FlattenedCountMismatch {
        what: &'static str,
        reserved: usize,
        consumed: usize,
    },

    #[error("{what} #{index} declares {declared} entries but provides {provided}")]
    DescriptorCountMismatch {
        what: &'static str,
        index: usize,
        declared: u32,
        provided: usize,
    },

    #[error("Waiting for the in-flight fence failed: {0}")]
    FenceWaitFailed(vk::Result),

    #[error("Resetting the in-flight fence failed: {0}")]
    FenceResetFailed(vk::Result),

    #[error("Swapchain image acquisition failed: {0}")]
    AcquireFailed(vk::Result),

    #[error("Presentation failed: {0}")]
    PresentFailed(vk::Result),

    #[error("Single-time command submission failed: {0}")]
    SingleTimeCommandFailed(vk::Result),

    #[error("Device wait idle failed: {0}")]
    WaitIdleFailed(vk::Result),

    #[error("RHI is not ready for this call (stage: {0:?})")]
    NotInitialized(BootstrapStage),

    #[error("RHI is already initialized (stage: {0:?})")]
    AlreadyInitialized(BootstrapStage),
}

impl RhiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RhiError::Loading(_)
            | RhiError::WindowHandle(_)
            | RhiError::InstanceCreationFailed(_)
            | RhiError::SurfaceCreationFailed(_)
            | RhiError::NoPhysicalDevice
            | RhiError::NoSuitablePhysicalDevice
            | RhiError::PhysicalDeviceQueryFailed(_)
            | RhiError::DeviceCreationFailed(_)
            | RhiError::CommandInfrastructureFailed(_)
            | RhiError::DescriptorPoolCreationFailed(_)
            | RhiError::SyncPrimitiveCreationFailed(_)
            | RhiError::SwapchainCreationFailed(_)
            | RhiError::NoSupportedDepthFormat
            | RhiError::NotInitialized(_)
            | RhiError::AlreadyInitialized(_) => ErrorKind::FatalBootstrap,

            RhiError::ImageViewCreationFailed(_)
            | RhiError::ImageCreationFailed(_)
            | RhiError::BufferCreationFailed(_)
            | RhiError::MemoryAllocationFailed(_)
            | RhiError::NoSuitableMemoryType { .. }
            | RhiError::SamplerCreationFailed(_)
            | RhiError::RenderPassCreationFailed(_)
            | RhiError::FramebufferCreationFailed(_)
            | RhiError::DescriptorSetLayoutCreationFailed(_)
            | RhiError::DescriptorSetAllocationFailed(_) => ErrorKind::ResourceCreation,

            RhiError::FlattenedCountMismatch { .. } | RhiError::DescriptorCountMismatch { .. } => {
                ErrorKind::Consistency
            }

            RhiError::FenceWaitFailed(_)
            | RhiError::FenceResetFailed(_)
            | RhiError::AcquireFailed(_)
            | RhiError::PresentFailed(_)
            | RhiError::SingleTimeCommandFailed(_)
            | RhiError::WaitIdleFailed(_) => ErrorKind::Frame,
        }
    }

    /// Whether the engine should abort instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::FatalBootstrap | ErrorKind::Consistency)
    }
}

pub type RhiResult<T> = Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_failures_are_fatal() {
        assert!(RhiError::NoPhysicalDevice.is_fatal());
        assert!(RhiError::SwapchainCreationFailed(vk::Result::ERROR_SURFACE_LOST_KHR).is_fatal());
        assert_eq!(
            RhiError::DeviceCreationFailed(vk::Result::ERROR_INITIALIZATION_FAILED).kind(),
            ErrorKind::FatalBootstrap
        );
    }

    #[test]
    fn resource_failures_leave_the_decision_to_the_caller() {
        let error = RhiError::RenderPassCreationFailed(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        assert_eq!(error.kind(), ErrorKind::ResourceCreation);
        assert!(!error.is_fatal());
    }

    #[test]
    fn count_mismatch_reads_well() {
        let error = RhiError::FlattenedCountMismatch {
            what: "attachment reference",
            reserved: 4,
            consumed: 3,
        };
        assert_eq!(error.kind(), ErrorKind::Consistency);
        assert_eq!(error.to_string(), "attachment reference count mismatch: reserved 4, consumed 3");
    }
}
