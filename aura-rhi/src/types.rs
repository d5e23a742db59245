//! Engine-facing descriptors.
//!
//! These mirror the Vulkan create-info blocks field for field, but reference resources through the
//! wrappers in [`crate::resource`] instead of raw handles. Pointer/count pairs become slices, so the
//! only count contracts left are the ones the native structures spell out in prose (resolve
//! attachments, immutable samplers, descriptor write payloads); the translation routines check those.

use ash::vk;

use crate::resource::{
    Buffer, DescriptorPool, DescriptorSet, DescriptorSetLayout, ImageView, RenderPass, Sampler,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

impl Extent2D {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero in either dimension.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<vk::Extent2D> for Extent2D {
    fn from(extent: vk::Extent2D) -> Self {
        Self::new(extent.width, extent.height)
    }
}

impl From<Extent2D> for vk::Extent2D {
    fn from(extent: Extent2D) -> Self {
        vk::Extent2D {
            width: extent.width,
            height: extent.height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Offset2D {
    pub x: i32,
    pub y: i32,
}

impl From<Offset2D> for vk::Offset2D {
    fn from(offset: Offset2D) -> Self {
        vk::Offset2D { x: offset.x, y: offset.y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect2D {
    pub offset: Offset2D,
    pub extent: Extent2D,
}

impl From<Rect2D> for vk::Rect2D {
    fn from(rect: Rect2D) -> Self {
        vk::Rect2D {
            offset: rect.offset.into(),
            extent: rect.extent.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentDescription {
    pub flags: vk::AttachmentDescriptionFlags,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl Default for AttachmentDescription {
    fn default() -> Self {
        Self {
            flags: vk::AttachmentDescriptionFlags::empty(),
            format: vk::Format::UNDEFINED,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::DONT_CARE,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::UNDEFINED,
        }
    }
}

impl AttachmentDescription {
    pub(crate) fn to_vk(&self) -> vk::AttachmentDescription {
        vk::AttachmentDescription {
            flags: self.flags,
            format: self.format,
            samples: self.samples,
            load_op: self.load_op,
            store_op: self.store_op,
            stencil_load_op: self.stencil_load_op,
            stencil_store_op: self.stencil_store_op,
            initial_layout: self.initial_layout,
            final_layout: self.final_layout,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentReference {
    pub attachment: u32,
    pub layout: vk::ImageLayout,
}

impl AttachmentReference {
    pub const fn new(attachment: u32, layout: vk::ImageLayout) -> Self {
        Self { attachment, layout }
    }

    pub(crate) fn to_vk(&self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: self.attachment,
            layout: self.layout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SubpassDescription<'a> {
    pub flags: vk::SubpassDescriptionFlags,
    pub pipeline_bind_point: vk::PipelineBindPoint,
    pub input_attachments: &'a [AttachmentReference],
    pub color_attachments: &'a [AttachmentReference],
    /// When present, must hold exactly one entry per color attachment.
    pub resolve_attachments: Option<&'a [AttachmentReference]>,
    pub depth_stencil_attachment: Option<&'a AttachmentReference>,
    pub preserve_attachments: &'a [u32],
}

impl Default for SubpassDescription<'_> {
    fn default() -> Self {
        Self {
            flags: vk::SubpassDescriptionFlags::empty(),
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            input_attachments: &[],
            color_attachments: &[],
            resolve_attachments: None,
            depth_stencil_attachment: None,
            preserve_attachments: &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stage_mask: vk::PipelineStageFlags,
    pub dst_stage_mask: vk::PipelineStageFlags,
    pub src_access_mask: vk::AccessFlags,
    pub dst_access_mask: vk::AccessFlags,
    pub dependency_flags: vk::DependencyFlags,
}

impl SubpassDependency {
    pub(crate) fn to_vk(&self) -> vk::SubpassDependency {
        vk::SubpassDependency {
            src_subpass: self.src_subpass,
            dst_subpass: self.dst_subpass,
            src_stage_mask: self.src_stage_mask,
            dst_stage_mask: self.dst_stage_mask,
            src_access_mask: self.src_access_mask,
            dst_access_mask: self.dst_access_mask,
            dependency_flags: self.dependency_flags,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPassCreateInfo<'a> {
    pub flags: vk::RenderPassCreateFlags,
    pub attachments: &'a [AttachmentDescription],
    pub subpasses: &'a [SubpassDescription<'a>],
    pub dependencies: &'a [SubpassDependency],
}

#[derive(Debug, Clone, Copy)]
pub struct FramebufferCreateInfo<'a> {
    pub flags: vk::FramebufferCreateFlags,
    pub render_pass: &'a RenderPass,
    pub attachments: &'a [&'a ImageView],
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorSetLayoutBinding<'a> {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    /// When present, must hold exactly `descriptor_count` samplers.
    pub immutable_samplers: Option<&'a [&'a Sampler]>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorSetLayoutCreateInfo<'a> {
    pub flags: vk::DescriptorSetLayoutCreateFlags,
    pub bindings: &'a [DescriptorSetLayoutBinding<'a>],
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorSetAllocateInfo<'a> {
    pub descriptor_pool: &'a DescriptorPool,
    pub set_layouts: &'a [&'a DescriptorSetLayout],
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorImageInfo<'a> {
    pub sampler: Option<&'a Sampler>,
    pub image_view: Option<&'a ImageView>,
    pub image_layout: vk::ImageLayout,
}

impl DescriptorImageInfo<'_> {
    pub(crate) fn to_vk(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.map_or(vk::Sampler::null(), Sampler::resource),
            image_view: self.image_view.map_or(vk::ImageView::null(), ImageView::resource),
            image_layout: self.image_layout,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DescriptorBufferInfo<'a> {
    pub buffer: &'a Buffer,
    pub offset: vk::DeviceSize,
    pub range: vk::DeviceSize,
}

impl DescriptorBufferInfo<'_> {
    pub(crate) fn to_vk(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer.resource(),
            offset: self.offset,
            range: self.range,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WriteDescriptorSet<'a> {
    pub dst_set: &'a DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
    pub descriptor_type: vk::DescriptorType,
    /// When present, must hold exactly `descriptor_count` entries.
    pub image_info: Option<&'a [DescriptorImageInfo<'a>]>,
    /// When present, must hold exactly `descriptor_count` entries.
    pub buffer_info: Option<&'a [DescriptorBufferInfo<'a>]>,
}

#[derive(Debug, Clone, Copy)]
pub struct CopyDescriptorSet<'a> {
    pub src_set: &'a DescriptorSet,
    pub src_binding: u32,
    pub src_array_element: u32,
    pub dst_set: &'a DescriptorSet,
    pub dst_binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
}
