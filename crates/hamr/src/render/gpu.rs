//! GPU joint buffers: one wgpu storage buffer per skinned entity.
//!
//! [`GpuJointBuffers`] is the [`JointBufferSink`] the renderer hands to
//! [`Scene::update`](crate::scene::Scene::update). The device and queue are
//! passed in explicitly; nothing here reaches for a global renderer.
//!
//! Each palette is relative to its own skinned entity, so entities sharing a
//! skin still get separate buffers. Buffers are owned by the table and
//! released when replaced or when the table is dropped. Callers refer to them
//! through [`JointBufferHandle`]s, which carry a generation so a handle to a
//! buffer that has since been reallocated (because a palette outgrew it, or
//! the slot passed to another entity) stops resolving.

use crate::ecs::Entity;
use crate::math::Mat4;
use crate::skin::{JointBufferSink, SkinId};

/// Generation-checked reference to one skinned entity's joint buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointBufferHandle {
    entity: Entity,
    generation: u32,
}

impl JointBufferHandle {
    pub fn entity(self) -> Entity {
        self.entity
    }
}

#[derive(Default)]
struct Slot {
    owner: Option<Entity>,
    skin: SkinId,
    buffer: Option<wgpu::Buffer>,
    generation: u32,
}

/// Joint palettes uploaded to the GPU, keyed by skinned entity.
pub struct GpuJointBuffers {
    device: wgpu::Device,
    queue: wgpu::Queue,
    slots: Vec<Slot>,
}

impl GpuJointBuffers {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            device: device.clone(),
            queue: queue.clone(),
            slots: Vec::new(),
        }
    }

    /// Handle to the current buffer of `entity`, once a palette was written.
    pub fn handle(&self, entity: Entity) -> Option<JointBufferHandle> {
        let slot = self.slots.get(entity.index() as usize)?;
        if slot.owner != Some(entity) {
            return None;
        }
        slot.buffer.as_ref()?;
        Some(JointBufferHandle {
            entity,
            generation: slot.generation,
        })
    }

    /// Skin the buffer behind `handle` was computed from.
    pub fn skin(&self, handle: JointBufferHandle) -> Option<SkinId> {
        self.resolve(handle).map(|slot| slot.skin)
    }

    /// Buffer behind `handle`, or `None` if it has been replaced since.
    pub fn buffer(&self, handle: JointBufferHandle) -> Option<&wgpu::Buffer> {
        self.resolve(handle)?.buffer.as_ref()
    }

    fn resolve(&self, handle: JointBufferHandle) -> Option<&Slot> {
        let slot = self.slots.get(handle.entity.index() as usize)?;
        (slot.owner == Some(handle.entity) && slot.generation == handle.generation).then_some(slot)
    }

    fn slot_with_capacity(&mut self, entity: Entity, skin: SkinId, size: u64) -> &wgpu::Buffer {
        let index = entity.index() as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, Slot::default);
        }
        let slot = &mut self.slots[index];
        let fits = slot.owner == Some(entity)
            && slot.buffer.as_ref().is_some_and(|buffer| buffer.size() >= size);
        if !fits {
            slot.generation = slot.generation.wrapping_add(1);
            slot.owner = Some(entity);
            slot.buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("hamr joint palette {entity}")),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            log::debug!("allocated joint buffer for entity {entity} ({size} bytes)");
        }
        slot.skin = skin;
        match &slot.buffer {
            Some(buffer) => buffer,
            None => unreachable!("slot buffer was just ensured"),
        }
    }
}

impl JointBufferSink for GpuJointBuffers {
    fn write_joints(&mut self, entity: Entity, skin: SkinId, matrices: &[Mat4]) {
        if matrices.is_empty() {
            return;
        }
        let columns: Vec<[f32; 16]> = matrices.iter().map(Mat4::to_cols_array).collect();
        let bytes: &[u8] = bytemuck::cast_slice(&columns);
        let queue = self.queue.clone();
        let buffer = self.slot_with_capacity(entity, skin, bytes.len() as u64);
        queue.write_buffer(buffer, 0, bytes);
    }
}
