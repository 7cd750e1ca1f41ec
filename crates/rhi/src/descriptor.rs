//! Descriptor set layouts, pools and batched writes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use renderer_rhi::device::Device;
//! use renderer_rhi::descriptor::{binding, DescriptorPool, DescriptorSetLayout, DescriptorWriter};
//!
//! # fn example(device: Arc<Device>, ubo: vk::Buffer) -> Result<(), renderer_rhi::RhiError> {
//! let layout = DescriptorSetLayout::new(
//!     device.clone(),
//!     &[binding::uniform_buffer(0, vk::ShaderStageFlags::VERTEX)],
//! )?;
//! let pool = DescriptorPool::for_layouts(device.clone(), &[(&layout, 1)])?;
//! let set = pool.allocate(&layout)?;
//! DescriptorWriter::new(set).buffer(0, ubo, 128).flush(&device);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding<'static>],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        // SAFETY: valid create info on a live device.
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };
        debug!(
            "Created descriptor set layout with {} binding(s)",
            bindings.len()
        );
        Ok(Self {
            device,
            layout,
            bindings: bindings.to_vec(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding<'static>] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        // SAFETY: pipelines using this layout are dropped first by owners.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes that fit `sets` allocations of each layout's bindings.
pub fn pool_sizes_for(
    layouts: &[(&[vk::DescriptorSetLayoutBinding<'static>], u32)],
) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for (bindings, sets) in layouts {
        for b in bindings.iter() {
            let count = b.descriptor_count * sets;
            match sizes.iter_mut().find(|s| s.ty == b.descriptor_type) {
                Some(size) => size.descriptor_count += count,
                None => sizes.push(
                    vk::DescriptorPoolSize::default()
                        .ty(b.descriptor_type)
                        .descriptor_count(count),
                ),
            }
        }
    }
    sizes
}

pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        // SAFETY: valid create info on a live device.
        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            max_sets,
            pool_sizes.len()
        );
        Ok(Self { device, pool })
    }

    /// Pool sized exactly for `count` sets of each listed layout.
    pub fn for_layouts(
        device: Arc<Device>,
        layouts: &[(&DescriptorSetLayout, u32)],
    ) -> RhiResult<Self> {
        let spec: Vec<_> = layouts
            .iter()
            .map(|(layout, count)| (layout.bindings(), *count))
            .collect();
        let max_sets = layouts.iter().map(|(_, count)| count).sum::<u32>().max(1);
        Self::new(device, max_sets, &pool_sizes_for(&spec))
    }

    pub fn allocate(&self, layout: &DescriptorSetLayout) -> RhiResult<vk::DescriptorSet> {
        let layouts = [layout.handle()];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        // SAFETY: pool and layout belong to this device.
        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        sets.first()
            .copied()
            .ok_or_else(|| RhiError::InvalidHandle("No descriptor set allocated".to_string()))
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        // SAFETY: sets from this pool are not in use once owners drop it.
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Layout binding constructors for the two descriptor kinds the renderer uses.
pub mod binding {
    use ash::vk;

    pub fn uniform_buffer(
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stages)
    }

    pub fn combined_image_sampler(
        binding: u32,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(stages)
    }
}

enum PendingWrite {
    Buffer(u32, vk::DescriptorBufferInfo),
    Image(u32, vk::DescriptorImageInfo),
}

/// Collects writes for one set and applies them in a single update.
pub struct DescriptorWriter {
    set: vk::DescriptorSet,
    writes: Vec<PendingWrite>,
}

impl DescriptorWriter {
    pub fn new(set: vk::DescriptorSet) -> Self {
        Self {
            set,
            writes: Vec::new(),
        }
    }

    pub fn buffer(mut self, binding: u32, buffer: vk::Buffer, range: vk::DeviceSize) -> Self {
        let info = vk::DescriptorBufferInfo::default()
            .buffer(buffer)
            .offset(0)
            .range(range);
        self.writes.push(PendingWrite::Buffer(binding, info));
        self
    }

    /// Combined image sampler in SHADER_READ_ONLY_OPTIMAL.
    pub fn image(mut self, binding: u32, view: vk::ImageView, sampler: vk::Sampler) -> Self {
        let info = vk::DescriptorImageInfo::default()
            .sampler(sampler)
            .image_view(view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        self.writes.push(PendingWrite::Image(binding, info));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn flush(self, device: &Device) {
        if self.writes.is_empty() {
            return;
        }
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|write| match write {
                PendingWrite::Buffer(binding, info) => vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(info)),
                PendingWrite::Image(binding, info) => vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info)),
            })
            .collect();

        // SAFETY: every referenced handle is alive and the set is not bound
        // in a pending command buffer.
        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }
    }
}
