//! One-time render setup: the forward render pass, one framebuffer per swapchain image, and the
//! per-frame uniform descriptor sets.

use aura_core::log;
use aura_rhi::{
    vk, AttachmentDescription, AttachmentReference, Buffer, DescriptorBufferInfo, DescriptorSet,
    DescriptorSetAllocateInfo, DescriptorSetLayout, DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo,
    DeviceMemory, Framebuffer, FramebufferCreateInfo, RenderPass, RenderPassCreateInfo, RhiResult, Sampler,
    SamplerConfig, SubpassDependency, SubpassDescription, VulkanRhi, WriteDescriptorSet, MAX_FRAMES_IN_FLIGHT,
};

/// Model, view and projection matrices.
const UNIFORM_BUFFER_SIZE: vk::DeviceSize = 3 * 16 * std::mem::size_of::<f32>() as vk::DeviceSize;

#[derive(Default)]
pub struct SceneResources {
    render_pass: RenderPass,
    framebuffers: Vec<Framebuffer>,
    sampler: Sampler,
    set_layout: DescriptorSetLayout,
    uniform_buffers: Vec<(Buffer, DeviceMemory)>,
    descriptor_sets: Vec<DescriptorSet>,
}

impl SceneResources {
    #[profiling::function]
    pub fn new(rhi: &VulkanRhi) -> RhiResult<Self> {
        let mut scene = Self::default();
        if let Err(e) = scene.build(rhi) {
            scene.destroy(rhi);
            return Err(e);
        }
        Ok(scene)
    }

    fn build(&mut self, rhi: &VulkanRhi) -> RhiResult<()> {
        self.render_pass = create_forward_pass(rhi)?;
        self.framebuffers = create_framebuffers(rhi, &self.render_pass)?;

        self.sampler = rhi.create_sampler(&SamplerConfig::anisotropic(16.0))?;
        self.set_layout = create_set_layout(rhi, &self.sampler)?;

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = rhi.create_buffer(
                UNIFORM_BUFFER_SIZE,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            self.uniform_buffers.push(buffer);
        }

        let layouts = [&self.set_layout; MAX_FRAMES_IN_FLIGHT];
        self.descriptor_sets = rhi.allocate_descriptor_sets(&DescriptorSetAllocateInfo {
            descriptor_pool: rhi.descriptor_pool(),
            set_layouts: &layouts,
        })?;
        self.write_uniform_descriptors(rhi)?;

        log::info!(
            "Scene ready: {} framebuffers, {} descriptor sets",
            self.framebuffers.len(),
            self.descriptor_sets.len()
        );
        Ok(())
    }

    fn write_uniform_descriptors(&self, rhi: &VulkanRhi) -> RhiResult<()> {
        let buffer_infos: Vec<[DescriptorBufferInfo; 1]> = self
            .uniform_buffers
            .iter()
            .map(|(buffer, _)| {
                [DescriptorBufferInfo {
                    buffer,
                    offset: 0,
                    range: UNIFORM_BUFFER_SIZE,
                }]
            })
            .collect();

        let writes: Vec<WriteDescriptorSet> = self
            .descriptor_sets
            .iter()
            .zip(&buffer_infos)
            .map(|(set, buffer_info)| WriteDescriptorSet {
                dst_set: set,
                dst_binding: 0,
                dst_array_element: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                image_info: None,
                buffer_info: Some(buffer_info),
            })
            .collect();

        rhi.update_descriptor_sets(&writes, &[])
    }

    /// Framebuffers reference swapchain views, so they are rebuilt after every recreation.
    pub fn rebuild_framebuffers(&mut self, rhi: &VulkanRhi) -> RhiResult<()> {
        for framebuffer in self.framebuffers.drain(..) {
            rhi.destroy_framebuffer(framebuffer);
        }
        self.framebuffers = create_framebuffers(rhi, &self.render_pass)?;
        log::debug!("Rebuilt {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    /// Descriptor sets are returned with the pool when the RHI shuts down.
    pub fn destroy(self, rhi: &VulkanRhi) {
        for framebuffer in self.framebuffers {
            rhi.destroy_framebuffer(framebuffer);
        }
        for (buffer, memory) in self.uniform_buffers {
            rhi.destroy_buffer(buffer, memory);
        }
        rhi.destroy_descriptor_set_layout(self.set_layout);
        rhi.destroy_sampler(self.sampler);
        rhi.destroy_render_pass(self.render_pass);
    }
}

fn create_forward_pass(rhi: &VulkanRhi) -> RhiResult<RenderPass> {
    let attachments = [
        AttachmentDescription {
            format: rhi.swapchain_format(),
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        AttachmentDescription {
            format: rhi.depth_format(),
            load_op: vk::AttachmentLoadOp::CLEAR,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];

    let color = [AttachmentReference::new(0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth = AttachmentReference::new(1, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    let subpasses = [SubpassDescription {
        color_attachments: &color,
        depth_stencil_attachment: Some(&depth),
        ..Default::default()
    }];

    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        dst_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dependency_flags: vk::DependencyFlags::empty(),
    }];

    rhi.create_render_pass(&RenderPassCreateInfo {
        flags: vk::RenderPassCreateFlags::empty(),
        attachments: &attachments,
        subpasses: &subpasses,
        dependencies: &dependencies,
    })
}

fn create_framebuffers(rhi: &VulkanRhi, render_pass: &RenderPass) -> RhiResult<Vec<Framebuffer>> {
    let Some(depth) = rhi.depth_attachment() else {
        return Ok(Vec::new());
    };
    let extent = rhi.swapchain_extent();

    let mut framebuffers = Vec::with_capacity(rhi.swapchain_image_views().len());
    for view in rhi.swapchain_image_views() {
        let attachments = [view, depth.view()];
        let created = rhi.create_framebuffer(&FramebufferCreateInfo {
            flags: vk::FramebufferCreateFlags::empty(),
            render_pass,
            attachments: &attachments,
            width: extent.width,
            height: extent.height,
            layers: 1,
        });

        match created {
            Ok(framebuffer) => framebuffers.push(framebuffer),
            Err(e) => {
                for framebuffer in framebuffers {
                    rhi.destroy_framebuffer(framebuffer);
                }
                return Err(e);
            }
        }
    }
    Ok(framebuffers)
}

fn create_set_layout(rhi: &VulkanRhi, sampler: &Sampler) -> RhiResult<DescriptorSetLayout> {
    let immutable_samplers = [sampler];
    let bindings = [
        DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            immutable_samplers: None,
        },
        DescriptorSetLayoutBinding {
            binding: 1,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            immutable_samplers: Some(&immutable_samplers),
        },
    ];

    rhi.create_descriptor_set_layout(&DescriptorSetLayoutCreateInfo {
        flags: vk::DescriptorSetLayoutCreateFlags::empty(),
        bindings: &bindings,
    })
}
