//! # EntityStore — Structure-of-Arrays Component Table
//!
//! The [`EntityStore`] owns every component of every entity. It's a fixed set
//! of parallel columns, one per [`ComponentKind`], all with the same length:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ EntityStore (capacity = 4)                               │
//! │                                                          │
//! │  masks:        [A|T, A|T|P, -, A|T|P|M]                  │
//! │  generations:  [0, 0, 1, 0]                              │
//! │  parents:      [0, 0, 0, 1]                              │
//! │  transforms:   [..., ..., ..., ...]                      │
//! │  local/global: [Mat4; 4]                                 │
//! │  free_links:   [-, -, {prev: None, next: None}, -]       │
//! │                                                          │
//! │  free_head: Some(2)                                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Allocation
//!
//! Unallocated slots are threaded into a doubly linked free list. Creating an
//! entity pops the head in O(1). When the list is empty, every column grows by
//! one block (default 1024 slots), the new region is default-filled, and the
//! free list is rebuilt over the *whole* capacity. Growth is rare, so the
//! O(capacity) rebuild stays cheap in aggregate.
//!
//! ## Aliasing
//!
//! Growth reallocates every column. Accessors hand out borrows of the store,
//! so the borrow checker already rules out holding a column slice across
//! [`EntityStore::create_entity`]; long-lived references are [`Entity`]
//! handles, which carry a generation and are re-validated on every access.
//!
//! ## Parent Ordering
//!
//! A parent's index must be lower than its children's. The transform pass
//! relies on it to finish every parent before any child reads it, and
//! [`EntityStore::set_parent`] refuses links that break it.

use crate::config::SceneConfig;
use crate::math::{Mat4, Transform};
use crate::render::{DrawConstants, MaterialHandle, MeshHandle};
use crate::skin::SkinId;

use super::component::{Column, ComponentKind, ComponentMask, FreeLink};
use super::entity::Entity;

/// Default number of slots added per growth step.
pub const DEFAULT_GROWTH_BLOCK: u32 = 1024;

/// Parallel component columns plus the free list that hands out slots.
pub struct EntityStore {
    pub(crate) masks: Vec<ComponentMask>,
    pub(crate) generations: Vec<u32>,
    pub(crate) parents: Vec<u32>,
    pub(crate) skins: Vec<SkinId>,
    pub(crate) meshes: Vec<MeshHandle>,
    pub(crate) materials: Vec<MaterialHandle>,
    pub(crate) transforms: Vec<Transform>,
    pub(crate) local_matrices: Vec<Mat4>,
    pub(crate) global_matrices: Vec<Mat4>,
    pub(crate) free_links: Vec<FreeLink>,
    pub(crate) draw_constants: Vec<DrawConstants>,
    /// First free slot, or `None` when every slot is allocated.
    free_head: Option<u32>,
    capacity: u32,
    live: u32,
    growth_block: u32,
}

impl EntityStore {
    /// Empty store; the first [`create_entity`](Self::create_entity) grows it
    /// by [`DEFAULT_GROWTH_BLOCK`].
    pub fn new() -> Self {
        Self::with_growth_block(DEFAULT_GROWTH_BLOCK)
    }

    /// Empty store that grows by `growth_block` slots at a time.
    ///
    /// # Panics
    ///
    /// Panics if `growth_block` is zero.
    pub fn with_growth_block(growth_block: u32) -> Self {
        assert!(growth_block > 0, "growth block must be at least one slot");
        Self {
            masks: Vec::new(),
            generations: Vec::new(),
            parents: Vec::new(),
            skins: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            transforms: Vec::new(),
            local_matrices: Vec::new(),
            global_matrices: Vec::new(),
            free_links: Vec::new(),
            draw_constants: Vec::new(),
            free_head: None,
            capacity: 0,
            live: 0,
            growth_block,
        }
    }

    /// Store sized from a [`SceneConfig`]: grows by `growth_block`, with
    /// `initial_capacity` slots reserved up front.
    pub fn from_config(config: &SceneConfig) -> Self {
        let mut store = Self::with_growth_block(config.growth_block);
        if config.initial_capacity > 0 {
            store.grow_by(config.initial_capacity);
        }
        store
    }

    // ── Column access ────────────────────────────────────────────────

    fn column_dyn(&self, kind: ComponentKind) -> &dyn Column {
        match kind {
            ComponentKind::Masks => &self.masks,
            ComponentKind::Generations => &self.generations,
            ComponentKind::Parents => &self.parents,
            ComponentKind::Skins => &self.skins,
            ComponentKind::Meshes => &self.meshes,
            ComponentKind::Materials => &self.materials,
            ComponentKind::Transforms => &self.transforms,
            ComponentKind::LocalMatrices => &self.local_matrices,
            ComponentKind::GlobalMatrices => &self.global_matrices,
            ComponentKind::FreeLinks => &self.free_links,
            ComponentKind::DrawConstants => &self.draw_constants,
        }
    }

    fn column_dyn_mut(&mut self, kind: ComponentKind) -> &mut dyn Column {
        match kind {
            ComponentKind::Masks => &mut self.masks,
            ComponentKind::Generations => &mut self.generations,
            ComponentKind::Parents => &mut self.parents,
            ComponentKind::Skins => &mut self.skins,
            ComponentKind::Meshes => &mut self.meshes,
            ComponentKind::Materials => &mut self.materials,
            ComponentKind::Transforms => &mut self.transforms,
            ComponentKind::LocalMatrices => &mut self.local_matrices,
            ComponentKind::GlobalMatrices => &mut self.global_matrices,
            ComponentKind::FreeLinks => &mut self.free_links,
            ComponentKind::DrawConstants => &mut self.draw_constants,
        }
    }

    /// Type-erased view of the column at position `index` in
    /// [`ComponentKind::ALL`].
    ///
    /// # Panics
    ///
    /// Panics if `index >= ComponentKind::COUNT`.
    pub fn component_array(&self, index: usize) -> &dyn Column {
        let kind = ComponentKind::from_index(index).unwrap_or_else(|| {
            panic!(
                "component array index {index} out of range (there are {} component kinds)",
                ComponentKind::COUNT
            )
        });
        self.column_dyn(kind)
    }

    /// Typed view of a whole column, indexed by entity slot.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the column's element type.
    pub fn column<T: 'static>(&self, kind: ComponentKind) -> &[T] {
        self.column_dyn(kind)
            .as_any()
            .downcast_ref::<Vec<T>>()
            .unwrap_or_else(|| {
                panic!(
                    "column `{}` does not hold `{}`",
                    kind.name(),
                    std::any::type_name::<T>()
                )
            })
    }

    // ── Allocation ───────────────────────────────────────────────────

    /// Allocate an entity, growing every column first if no slot is free.
    ///
    /// The slot comes back with only [`ComponentMask::ALLOCATED`] set and
    /// default component values (identity matrices, no parent).
    pub fn create_entity(&mut self) -> Entity {
        if self.free_head.is_none() {
            self.grow_by(self.growth_block);
        }
        let Some(index) = self.free_head else {
            unreachable!("growth always leaves at least one free slot");
        };
        let slot = index as usize;

        let next = self.free_links[slot].next;
        if let Some(next) = next {
            self.free_links[next as usize].prev = None;
        }
        self.free_head = next;
        self.free_links[slot] = FreeLink::default();

        self.reset_slot(slot);
        self.masks[slot] = ComponentMask::ALLOCATED;
        self.live += 1;
        Entity::new(index, self.generations[slot])
    }

    /// Release an entity's slot back to the free list.
    ///
    /// The slot's generation is bumped so the handle (and any copy of it)
    /// goes stale. Children that named this entity as parent are not
    /// touched. Returns `false` if the handle was already stale.
    pub fn destroy_entity(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let slot = entity.slot();
        self.reset_slot(slot);
        self.masks[slot] = ComponentMask::empty();
        self.generations[slot] = self.generations[slot].wrapping_add(1);

        self.free_links[slot] = FreeLink {
            prev: None,
            next: self.free_head,
        };
        if let Some(head) = self.free_head {
            self.free_links[head as usize].prev = Some(entity.index);
        }
        self.free_head = Some(entity.index);
        self.live -= 1;
        true
    }

    fn reset_slot(&mut self, slot: usize) {
        self.parents[slot] = 0;
        self.skins[slot] = SkinId::default();
        self.meshes[slot] = MeshHandle::default();
        self.materials[slot] = MaterialHandle::default();
        self.transforms[slot] = Transform::IDENTITY;
        self.local_matrices[slot] = Mat4::IDENTITY;
        self.global_matrices[slot] = Mat4::IDENTITY;
        self.draw_constants[slot] = DrawConstants::default();
    }

    /// Grow every column by `additional` slots and rebuild the free list.
    fn grow_by(&mut self, additional: u32) {
        let new_capacity = self
            .capacity
            .checked_add(additional)
            .unwrap_or_else(|| panic!("entity capacity overflow ({} + {additional})", self.capacity));

        for kind in ComponentKind::ALL {
            self.column_dyn_mut(kind).grow(new_capacity as usize);
        }
        debug_assert!(
            ComponentKind::ALL
                .iter()
                .all(|&kind| self.column_dyn(kind).len() == new_capacity as usize),
            "component columns out of lock-step"
        );

        log::info!(
            "entity store grew from {} to {new_capacity} slots",
            self.capacity
        );
        self.capacity = new_capacity;
        self.rebuild_free_list();
    }

    /// Thread every unallocated slot into the free list, lowest index first.
    fn rebuild_free_list(&mut self) {
        self.free_head = None;
        for index in (0..self.capacity).rev() {
            let slot = index as usize;
            self.free_links[slot] = FreeLink::default();
            if self.masks[slot].contains(ComponentMask::ALLOCATED) {
                continue;
            }
            self.free_links[slot].next = self.free_head;
            if let Some(head) = self.free_head {
                self.free_links[head as usize].prev = Some(index);
            }
            self.free_head = Some(index);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Check if an entity handle is still valid (allocated, same generation).
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.slot();
        slot < self.capacity as usize
            && self.masks[slot].contains(ComponentMask::ALLOCATED)
            && self.generations[slot] == entity.generation
    }

    /// Column index of `entity`, or `None` if the handle is stale.
    pub fn index_of(&self, entity: Entity) -> Option<usize> {
        self.is_alive(entity).then(|| entity.slot())
    }

    /// Slot index of a live entity.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or from another store.
    fn slot_of(&self, entity: Entity) -> usize {
        assert!(
            self.is_alive(entity),
            "entity {entity} is not alive in this store"
        );
        entity.slot()
    }

    /// Handle for the live entity at `index`, if any.
    pub fn entity_at(&self, index: u32) -> Option<Entity> {
        let slot = index as usize;
        (slot < self.capacity as usize && self.masks[slot].contains(ComponentMask::ALLOCATED))
            .then(|| Entity::new(index, self.generations[slot]))
    }

    /// All live entities in ascending index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.capacity).filter_map(|index| self.entity_at(index))
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.live as usize
    }

    /// Number of slots in every column.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Number of slots on the free list.
    pub fn free_count(&self) -> usize {
        self.capacity() - self.entity_count()
    }

    /// Walk the free list from its head and return the slots in list order.
    ///
    /// # Panics
    ///
    /// Panics if a `prev` link disagrees with the walk (a corrupted list).
    pub fn free_indices(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.free_count());
        let mut prev = None;
        let mut cursor = self.free_head;
        while let Some(index) = cursor {
            let link = self.free_links[index as usize];
            assert_eq!(link.prev, prev, "free list back-link broken at slot {index}");
            assert!(
                out.len() < self.capacity(),
                "free list longer than capacity (cycle at slot {index})"
            );
            out.push(index);
            prev = Some(index);
            cursor = link.next;
        }
        out
    }

    /// Presence bits of a live entity.
    pub fn mask(&self, entity: Entity) -> ComponentMask {
        self.masks[self.slot_of(entity)]
    }

    /// `true` if every entity with a parent sits at a higher index than it.
    pub fn check_parent_order(&self) -> bool {
        self.entities().all(|entity| {
            let slot = entity.slot();
            !self.masks[slot].contains(ComponentMask::PARENT) || self.parents[slot] < entity.index
        })
    }

    // ── Components ───────────────────────────────────────────────────

    /// Link `child` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `parent` does not precede
    /// `child` in index order.
    pub fn set_parent(&mut self, child: Entity, parent: Entity) {
        let child_slot = self.slot_of(child);
        self.slot_of(parent);
        assert!(
            parent.index < child.index,
            "parent {parent} must have a lower index than child {child}"
        );
        self.parents[child_slot] = parent.index;
        self.masks[child_slot] |= ComponentMask::PARENT;
    }

    /// Parent of `entity`, if it has one.
    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        let slot = self.slot_of(entity);
        if !self.masks[slot].contains(ComponentMask::PARENT) {
            return None;
        }
        let parent = self.parents[slot];
        Some(Entity::new(parent, self.generations[parent as usize]))
    }

    /// Set the local transform and refresh the local matrix from it.
    pub fn set_transform(&mut self, entity: Entity, transform: Transform) {
        let slot = self.slot_of(entity);
        self.transforms[slot] = transform;
        self.local_matrices[slot] = transform.matrix();
        self.masks[slot] |= ComponentMask::TRANSFORM;
    }

    /// Local transform of `entity`, if it has one.
    pub fn transform(&self, entity: Entity) -> Option<&Transform> {
        let slot = self.slot_of(entity);
        self.masks[slot]
            .contains(ComponentMask::TRANSFORM)
            .then(|| &self.transforms[slot])
    }

    /// Mutable local transform. The matrices pick up the change on the next
    /// transform pass.
    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut Transform> {
        let slot = self.slot_of(entity);
        if self.masks[slot].contains(ComponentMask::TRANSFORM) {
            Some(&mut self.transforms[slot])
        } else {
            None
        }
    }

    /// Transform of `entity` for a sampler to write into, marking the
    /// transform present.
    pub(crate) fn animated_transform(&mut self, entity: Entity) -> &mut Transform {
        let slot = self.slot_of(entity);
        self.masks[slot] |= ComponentMask::TRANSFORM;
        &mut self.transforms[slot]
    }

    pub fn set_mesh(&mut self, entity: Entity, mesh: MeshHandle) {
        let slot = self.slot_of(entity);
        self.meshes[slot] = mesh;
        self.masks[slot] |= ComponentMask::MESH;
    }

    pub fn mesh(&self, entity: Entity) -> Option<MeshHandle> {
        let slot = self.slot_of(entity);
        self.masks[slot]
            .contains(ComponentMask::MESH)
            .then(|| self.meshes[slot])
    }

    pub fn set_material(&mut self, entity: Entity, material: MaterialHandle) {
        let slot = self.slot_of(entity);
        self.materials[slot] = material;
        self.masks[slot] |= ComponentMask::MATERIAL;
    }

    pub fn material(&self, entity: Entity) -> Option<MaterialHandle> {
        let slot = self.slot_of(entity);
        self.masks[slot]
            .contains(ComponentMask::MATERIAL)
            .then(|| self.materials[slot])
    }

    pub fn set_skin(&mut self, entity: Entity, skin: SkinId) {
        let slot = self.slot_of(entity);
        self.skins[slot] = skin;
        self.masks[slot] |= ComponentMask::SKIN;
    }

    pub fn skin(&self, entity: Entity) -> Option<SkinId> {
        let slot = self.slot_of(entity);
        self.masks[slot]
            .contains(ComponentMask::SKIN)
            .then(|| self.skins[slot])
    }

    /// Local matrix as of the last transform pass (or `set_transform`).
    pub fn local_matrix(&self, entity: Entity) -> Mat4 {
        self.local_matrices[self.slot_of(entity)]
    }

    /// World-space matrix as of the last transform pass.
    pub fn global_matrix(&self, entity: Entity) -> Mat4 {
        self.global_matrices[self.slot_of(entity)]
    }

    /// Draw constants as of the last draw-data copy.
    pub fn draw_constants(&self, entity: Entity) -> DrawConstants {
        self.draw_constants[self.slot_of(entity)]
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
