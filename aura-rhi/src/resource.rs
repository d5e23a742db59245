//! Native handle wrappers.
//!
//! Each wrapper carries exactly one Vulkan handle. Wrappers are neither `Clone` nor `Copy`: the value
//! that holds a wrapper owns the handle, and handing it back to the matching `destroy_*` routine is
//! the only way to release it. A default-constructed wrapper holds the null handle.

use ash::vk;

/// Store/retrieve contract shared by every wrapper kind.
pub trait NativeResource {
    type Handle: Copy;

    /// Overwrites the stored handle without destroying the previous one.
    fn set_resource(&mut self, resource: Self::Handle);

    fn resource(&self) -> Self::Handle;
}

macro_rules! native_resources {
    ($($(#[$meta:meta])* $name:ident => $handle:ty;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, PartialEq, Eq, Hash)]
            pub struct $name {
                resource: $handle,
            }

            impl $name {
                #[inline]
                pub fn new(resource: $handle) -> Self { Self { resource } }

                #[inline]
                pub fn set_resource(&mut self, resource: $handle) { self.resource = resource; }

                #[inline]
                pub fn resource(&self) -> $handle { self.resource }

                #[inline]
                pub fn is_null(&self) -> bool { self.resource == <$handle>::null() }

                /// Moves the handle out, leaving the null handle behind.
                #[inline]
                pub(crate) fn take(&mut self) -> $handle {
                    std::mem::replace(&mut self.resource, <$handle>::null())
                }
            }

            impl Default for $name {
                fn default() -> Self { Self { resource: <$handle>::null() } }
            }

            impl NativeResource for $name {
                type Handle = $handle;

                #[inline]
                fn set_resource(&mut self, resource: $handle) { self.resource = resource; }

                #[inline]
                fn resource(&self) -> $handle { self.resource }
            }
        )*
    };
}

native_resources! {
    Queue => vk::Queue;
    CommandPool => vk::CommandPool;
    CommandBuffer => vk::CommandBuffer;
    DescriptorPool => vk::DescriptorPool;
    DescriptorSet => vk::DescriptorSet;
    DescriptorSetLayout => vk::DescriptorSetLayout;
    Semaphore => vk::Semaphore;
    Fence => vk::Fence;
    /// Either a swapchain-owned image or one created with device memory by the RHI.
    Image => vk::Image;
    ImageView => vk::ImageView;
    Buffer => vk::Buffer;
    DeviceMemory => vk::DeviceMemory;
    RenderPass => vk::RenderPass;
    Framebuffer => vk::Framebuffer;
    Sampler => vk::Sampler;
}

/// Collects the native handles of a wrapper slice.
pub(crate) fn raw_handles<'a, R, I>(resources: I) -> Vec<R::Handle>
where
    R: NativeResource + 'a,
    I: IntoIterator<Item = &'a R>,
{
    resources.into_iter().map(NativeResource::resource).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn default_wrapper_is_null() {
        assert!(Fence::default().is_null());
        assert!(Queue::default().is_null());
        assert_eq!(Buffer::default().resource(), vk::Buffer::null());
    }

    #[test]
    fn set_overwrites_without_validation() {
        let mut view = ImageView::new(vk::ImageView::from_raw(7));
        view.set_resource(vk::ImageView::from_raw(9));
        assert_eq!(view.resource().as_raw(), 9);
    }

    #[test]
    fn take_leaves_null_behind() {
        let mut pass = RenderPass::new(vk::RenderPass::from_raw(3));
        assert_eq!(pass.take().as_raw(), 3);
        assert!(pass.is_null());
    }

    #[test]
    fn trait_accessors_match_inherent_ones() {
        let mut layout = DescriptorSetLayout::default();
        NativeResource::set_resource(&mut layout, vk::DescriptorSetLayout::from_raw(11));
        assert_eq!(NativeResource::resource(&layout), layout.resource());
        let handles = raw_handles([&layout, &DescriptorSetLayout::new(vk::DescriptorSetLayout::from_raw(12))]);
        assert_eq!(handles.iter().map(|h| h.as_raw()).collect::<Vec<_>>(), vec![11, 12]);
    }
}
