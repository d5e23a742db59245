//! Lowering of engine-facing descriptors into native create-infos.
//!
//! Nested pointer arrays (attachment references, immutable samplers, descriptor payloads) are packed
//! into one flat array per create-info. Every lowering first reserves the total slot count, then fills
//! the array while handing out contiguous sub-ranges, and finally checks that the fill consumed exactly
//! what was reserved. The native structure is only materialized inside `with_native`, so the borrowed
//! pointers can never outlive the arrays they point into.

use std::ops::Range;

use ash::vk;
use aura_core::collections::SmallVec;
use aura_core::log;

use crate::error::{RhiError, RhiResult};
use crate::types::{
    AttachmentReference, CopyDescriptorSet, DescriptorSetAllocateInfo, DescriptorSetLayoutBinding,
    DescriptorSetLayoutCreateInfo, FramebufferCreateInfo, RenderPassCreateInfo, SubpassDescription,
    WriteDescriptorSet,
};

fn check_consumed(what: &'static str, reserved: usize, consumed: usize) -> RhiResult<()> {
    if reserved != consumed {
        log::error!("{} count mismatch: reserved {}, consumed {}", what, reserved, consumed);
        return Err(RhiError::FlattenedCountMismatch {
            what,
            reserved,
            consumed,
        });
    }
    Ok(())
}

fn check_declared(what: &'static str, index: usize, declared: u32, provided: usize) -> RhiResult<()> {
    if declared as usize != provided {
        log::error!("{} #{} declares {} entries but provides {}", what, index, declared, provided);
        return Err(RhiError::DescriptorCountMismatch {
            what,
            index,
            declared,
            provided,
        });
    }
    Ok(())
}

/// Total attachment reference slots reserved for `subpasses`.
///
/// Input and color references count once. A subpass with resolve attachments reserves
/// `color_attachments.len()` more slots, and so does a subpass with a depth/stencil reference.
pub fn attachment_reference_count(subpasses: &[SubpassDescription<'_>]) -> usize {
    subpasses
        .iter()
        .map(|subpass| {
            let color_count = subpass.color_attachments.len();
            let mut count = subpass.input_attachments.len() + color_count;
            if subpass.resolve_attachments.is_some() {
                count += color_count;
            }
            if subpass.depth_stencil_attachment.is_some() {
                count += color_count;
            }
            count
        })
        .sum()
}

/// Total immutable sampler slots reserved for `bindings`.
pub fn immutable_sampler_count(bindings: &[DescriptorSetLayoutBinding<'_>]) -> usize {
    bindings
        .iter()
        .filter(|binding| binding.immutable_samplers.is_some())
        .map(|binding| binding.descriptor_count as usize)
        .sum()
}

/// Total image info slots reserved for `writes`.
pub fn descriptor_image_info_count(writes: &[WriteDescriptorSet<'_>]) -> usize {
    writes
        .iter()
        .filter(|write| write.image_info.is_some())
        .map(|write| write.descriptor_count as usize)
        .sum()
}

/// Total buffer info slots reserved for `writes`.
pub fn descriptor_buffer_info_count(writes: &[WriteDescriptorSet<'_>]) -> usize {
    writes
        .iter()
        .filter(|write| write.buffer_info.is_some())
        .map(|write| write.descriptor_count as usize)
        .sum()
}

#[derive(Debug, Clone)]
struct SubpassSlots<'a> {
    flags: vk::SubpassDescriptionFlags,
    pipeline_bind_point: vk::PipelineBindPoint,
    input: Range<usize>,
    color: Range<usize>,
    resolve: Option<Range<usize>>,
    depth_stencil: Option<usize>,
    preserve: &'a [u32],
}

/// A render pass create-info with its attachment references packed into one array.
#[derive(Debug)]
pub(crate) struct LoweredRenderPass<'a> {
    flags: vk::RenderPassCreateFlags,
    attachments: Vec<vk::AttachmentDescription>,
    references: Vec<vk::AttachmentReference>,
    subpasses: Vec<SubpassSlots<'a>>,
    dependencies: Vec<vk::SubpassDependency>,
}

impl<'a> LoweredRenderPass<'a> {
    pub(crate) fn new(info: &RenderPassCreateInfo<'a>) -> RhiResult<Self> {
        let attachments = info.attachments.iter().map(|a| a.to_vk()).collect();

        let reserved = attachment_reference_count(info.subpasses);
        let mut references: Vec<vk::AttachmentReference> = Vec::with_capacity(reserved);
        let mut subpasses = Vec::with_capacity(info.subpasses.len());

        for (index, subpass) in info.subpasses.iter().enumerate() {
            let mut take = |source: &[AttachmentReference]| {
                let start = references.len();
                references.extend(source.iter().map(|r| r.to_vk()));
                start..references.len()
            };

            let input = take(subpass.input_attachments);
            let color = take(subpass.color_attachments);

            let resolve = match subpass.resolve_attachments {
                Some(resolve) => {
                    check_declared(
                        "resolve attachment",
                        index,
                        subpass.color_attachments.len() as u32,
                        resolve.len(),
                    )?;
                    Some(take(resolve))
                }
                None => None,
            };

            let depth_stencil = match subpass.depth_stencil_attachment {
                Some(depth) => {
                    // The reference fills every slot reserved for it; at least one is always needed.
                    let start = references.len();
                    let slots = subpass.color_attachments.len().max(1);
                    references.extend(std::iter::repeat_n(depth.to_vk(), slots));
                    Some(start)
                }
                None => None,
            };

            subpasses.push(SubpassSlots {
                flags: subpass.flags,
                pipeline_bind_point: subpass.pipeline_bind_point,
                input,
                color,
                resolve,
                depth_stencil,
                preserve: subpass.preserve_attachments,
            });
        }

        check_consumed("attachment reference", reserved, references.len())?;

        Ok(Self {
            flags: info.flags,
            attachments,
            references,
            subpasses,
            dependencies: info.dependencies.iter().map(|d| d.to_vk()).collect(),
        })
    }

    pub(crate) fn reference_count(&self) -> usize {
        self.references.len()
    }

    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&vk::RenderPassCreateInfo<'_>) -> R) -> R {
        let subpasses: SmallVec<[vk::SubpassDescription<'_>; 4]> = self
            .subpasses
            .iter()
            .map(|slots| {
                let mut desc = vk::SubpassDescription::default()
                    .flags(slots.flags)
                    .pipeline_bind_point(slots.pipeline_bind_point)
                    .input_attachments(&self.references[slots.input.clone()])
                    .color_attachments(&self.references[slots.color.clone()])
                    .preserve_attachments(slots.preserve);

                if let Some(resolve) = &slots.resolve {
                    desc = desc.resolve_attachments(&self.references[resolve.clone()]);
                }
                if let Some(depth) = slots.depth_stencil {
                    desc = desc.depth_stencil_attachment(&self.references[depth]);
                }

                desc
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::default()
            .flags(self.flags)
            .attachments(&self.attachments)
            .subpasses(&subpasses)
            .dependencies(&self.dependencies);

        f(&create_info)
    }
}

#[derive(Debug, Clone)]
struct BindingSlots {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    descriptor_count: u32,
    stage_flags: vk::ShaderStageFlags,
    samplers: Option<Range<usize>>,
}

/// A descriptor set layout create-info with its immutable samplers packed into one array.
#[derive(Debug)]
pub(crate) struct LoweredDescriptorSetLayout {
    flags: vk::DescriptorSetLayoutCreateFlags,
    samplers: Vec<vk::Sampler>,
    bindings: Vec<BindingSlots>,
}

impl LoweredDescriptorSetLayout {
    pub(crate) fn new(info: &DescriptorSetLayoutCreateInfo<'_>) -> RhiResult<Self> {
        let reserved = immutable_sampler_count(info.bindings);
        let mut samplers: Vec<vk::Sampler> = Vec::with_capacity(reserved);
        let mut bindings = Vec::with_capacity(info.bindings.len());

        for (index, binding) in info.bindings.iter().enumerate() {
            let slots = match binding.immutable_samplers {
                Some(immutable) => {
                    check_declared("immutable sampler binding", index, binding.descriptor_count, immutable.len())?;
                    let start = samplers.len();
                    samplers.extend(immutable.iter().map(|sampler| sampler.resource()));
                    Some(start..samplers.len())
                }
                None => None,
            };

            bindings.push(BindingSlots {
                binding: binding.binding,
                descriptor_type: binding.descriptor_type,
                descriptor_count: binding.descriptor_count,
                stage_flags: binding.stage_flags,
                samplers: slots,
            });
        }

        check_consumed("immutable sampler", reserved, samplers.len())?;

        Ok(Self {
            flags: info.flags,
            samplers,
            bindings,
        })
    }

    pub(crate) fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&vk::DescriptorSetLayoutCreateInfo<'_>) -> R) -> R {
        let bindings: SmallVec<[vk::DescriptorSetLayoutBinding<'_>; 8]> = self
            .bindings
            .iter()
            .map(|slots| {
                let mut binding = vk::DescriptorSetLayoutBinding::default()
                    .binding(slots.binding)
                    .descriptor_type(slots.descriptor_type)
                    .stage_flags(slots.stage_flags);
                if let Some(range) = &slots.samplers {
                    binding = binding.immutable_samplers(&self.samplers[range.clone()]);
                }
                // The sampler setter overwrites the count; the declared count is authoritative.
                binding.descriptor_count(slots.descriptor_count)
            })
            .collect();

        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(self.flags)
            .bindings(&bindings);

        f(&create_info)
    }
}

/// A framebuffer create-info with the attachment views resolved to native handles.
#[derive(Debug)]
pub(crate) struct LoweredFramebuffer {
    flags: vk::FramebufferCreateFlags,
    render_pass: vk::RenderPass,
    attachments: SmallVec<[vk::ImageView; 4]>,
    width: u32,
    height: u32,
    layers: u32,
}

impl LoweredFramebuffer {
    pub(crate) fn new(info: &FramebufferCreateInfo<'_>) -> Self {
        Self {
            flags: info.flags,
            render_pass: info.render_pass.resource(),
            attachments: info.attachments.iter().map(|view| view.resource()).collect(),
            width: info.width,
            height: info.height,
            layers: info.layers,
        }
    }

    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&vk::FramebufferCreateInfo<'_>) -> R) -> R {
        let create_info = vk::FramebufferCreateInfo::default()
            .flags(self.flags)
            .render_pass(self.render_pass)
            .attachments(&self.attachments)
            .width(self.width)
            .height(self.height)
            .layers(self.layers);

        f(&create_info)
    }
}

/// A descriptor set allocate-info with the pool and layouts resolved to native handles.
#[derive(Debug)]
pub(crate) struct LoweredDescriptorSetAllocate {
    pool: vk::DescriptorPool,
    layouts: SmallVec<[vk::DescriptorSetLayout; 4]>,
}

impl LoweredDescriptorSetAllocate {
    pub(crate) fn new(info: &DescriptorSetAllocateInfo<'_>) -> Self {
        Self {
            pool: info.descriptor_pool.resource(),
            layouts: info.set_layouts.iter().map(|layout| layout.resource()).collect(),
        }
    }

    pub(crate) fn set_count(&self) -> usize {
        self.layouts.len()
    }

    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&vk::DescriptorSetAllocateInfo<'_>) -> R) -> R {
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&self.layouts);

        f(&allocate_info)
    }
}

#[derive(Debug, Clone)]
struct WriteSlots {
    dst_set: vk::DescriptorSet,
    dst_binding: u32,
    dst_array_element: u32,
    descriptor_count: u32,
    descriptor_type: vk::DescriptorType,
    images: Option<Range<usize>>,
    buffers: Option<Range<usize>>,
}

#[derive(Debug, Clone, Copy)]
struct CopySlots {
    src_set: vk::DescriptorSet,
    src_binding: u32,
    src_array_element: u32,
    dst_set: vk::DescriptorSet,
    dst_binding: u32,
    dst_array_element: u32,
    descriptor_count: u32,
}

/// A batch of descriptor writes and copies with image/buffer payloads packed into flat arrays.
#[derive(Debug)]
pub(crate) struct LoweredDescriptorUpdate {
    image_infos: Vec<vk::DescriptorImageInfo>,
    buffer_infos: Vec<vk::DescriptorBufferInfo>,
    writes: Vec<WriteSlots>,
    copies: Vec<CopySlots>,
}

impl LoweredDescriptorUpdate {
    pub(crate) fn new(writes: &[WriteDescriptorSet<'_>], copies: &[CopyDescriptorSet<'_>]) -> RhiResult<Self> {
        let reserved_images = descriptor_image_info_count(writes);
        let reserved_buffers = descriptor_buffer_info_count(writes);
        let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::with_capacity(reserved_images);
        let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::with_capacity(reserved_buffers);
        let mut lowered_writes = Vec::with_capacity(writes.len());

        for (index, write) in writes.iter().enumerate() {
            let images = match write.image_info {
                Some(infos) => {
                    check_declared("descriptor write image info", index, write.descriptor_count, infos.len())?;
                    let start = image_infos.len();
                    image_infos.extend(infos.iter().map(|info| info.to_vk()));
                    Some(start..image_infos.len())
                }
                None => None,
            };

            let buffers = match write.buffer_info {
                Some(infos) => {
                    check_declared("descriptor write buffer info", index, write.descriptor_count, infos.len())?;
                    let start = buffer_infos.len();
                    buffer_infos.extend(infos.iter().map(|info| info.to_vk()));
                    Some(start..buffer_infos.len())
                }
                None => None,
            };

            lowered_writes.push(WriteSlots {
                dst_set: write.dst_set.resource(),
                dst_binding: write.dst_binding,
                dst_array_element: write.dst_array_element,
                descriptor_count: write.descriptor_count,
                descriptor_type: write.descriptor_type,
                images,
                buffers,
            });
        }

        check_consumed("descriptor image info", reserved_images, image_infos.len())?;
        check_consumed("descriptor buffer info", reserved_buffers, buffer_infos.len())?;

        let copies = copies
            .iter()
            .map(|copy| CopySlots {
                src_set: copy.src_set.resource(),
                src_binding: copy.src_binding,
                src_array_element: copy.src_array_element,
                dst_set: copy.dst_set.resource(),
                dst_binding: copy.dst_binding,
                dst_array_element: copy.dst_array_element,
                descriptor_count: copy.descriptor_count,
            })
            .collect();

        Ok(Self {
            image_infos,
            buffer_infos,
            writes: lowered_writes,
            copies,
        })
    }

    pub(crate) fn with_native<R>(
        &self,
        f: impl FnOnce(&[vk::WriteDescriptorSet<'_>], &[vk::CopyDescriptorSet<'_>]) -> R,
    ) -> R {
        let writes: Vec<vk::WriteDescriptorSet<'_>> = self
            .writes
            .iter()
            .map(|slots| {
                let mut write = vk::WriteDescriptorSet::default()
                    .dst_set(slots.dst_set)
                    .dst_binding(slots.dst_binding)
                    .dst_array_element(slots.dst_array_element)
                    .descriptor_type(slots.descriptor_type);
                if let Some(range) = &slots.images {
                    write = write.image_info(&self.image_infos[range.clone()]);
                }
                if let Some(range) = &slots.buffers {
                    write = write.buffer_info(&self.buffer_infos[range.clone()]);
                }
                // Payload setters overwrite the count; the declared count is authoritative.
                write.descriptor_count(slots.descriptor_count)
            })
            .collect();

        let copies: Vec<vk::CopyDescriptorSet<'_>> = self
            .copies
            .iter()
            .map(|copy| {
                vk::CopyDescriptorSet::default()
                    .src_set(copy.src_set)
                    .src_binding(copy.src_binding)
                    .src_array_element(copy.src_array_element)
                    .dst_set(copy.dst_set)
                    .dst_binding(copy.dst_binding)
                    .dst_array_element(copy.dst_array_element)
                    .descriptor_count(copy.descriptor_count)
            })
            .collect();

        f(&writes, &copies)
    }
}
