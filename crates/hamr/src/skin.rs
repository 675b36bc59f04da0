//! # Skin Binder — Joint Palettes for GPU Skinning
//!
//! A [`Skin`] pairs an ordered list of joint entities with their inverse bind
//! matrices. Each frame, after the transform pass, the binder turns the joints'
//! global matrices into a palette the vertex shader can index by joint:
//!
//! ```text
//! joint[j] = inverse(global[skinned]) * global[joints[j]] * inverse_bind[j]
//! ```
//!
//! The leading inverse expresses the pose relative to the skinned entity
//! itself, so the mesh skins correctly wherever that entity is placed (its own
//! model matrix is applied afterwards by the mesh pass).
//!
//! Palettes leave the binder through a [`JointBufferSink`]. The binder never
//! sees a graphics device; the caller passes in whatever sink it uploads
//! through ([`CpuJointBuffers`] for tests and headless tools,
//! `GpuJointBuffers` with the `wgpu` feature).

use std::collections::HashMap;

use crate::ecs::{ComponentMask, Entity, EntityStore};
use crate::math::Mat4;

/// Index of a skin in the scene's skin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SkinId(pub(crate) u32);

impl SkinId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Joint entities and their inverse bind matrices. Immutable after import.
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    pub name: Option<String>,
    pub joints: Vec<Entity>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

impl Skin {
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }
}

/// Destination for per-frame joint palettes.
pub trait JointBufferSink {
    /// Receive the palette of the skinned `entity`, which uses `skin`.
    /// Matrices are ordered like [`Skin::joints`].
    ///
    /// Called once per skinned entity per frame. Entities that share a skin
    /// get separate palettes, since each is relative to its own placement.
    fn write_joints(&mut self, entity: Entity, skin: SkinId, matrices: &[Mat4]);
}

/// In-memory joint buffers, one palette per skinned entity.
#[derive(Debug, Default)]
pub struct CpuJointBuffers {
    palettes: HashMap<Entity, (SkinId, Vec<Mat4>)>,
    writes: usize,
}

impl CpuJointBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last palette written for `entity`.
    pub fn palette(&self, entity: Entity) -> Option<&[Mat4]> {
        self.palettes
            .get(&entity)
            .map(|(_, palette)| palette.as_slice())
    }

    /// Skin the last palette of `entity` was computed from.
    pub fn skin_of(&self, entity: Entity) -> Option<SkinId> {
        self.palettes.get(&entity).map(|&(skin, _)| skin)
    }

    /// Total number of writes received.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl JointBufferSink for CpuJointBuffers {
    fn write_joints(&mut self, entity: Entity, skin: SkinId, matrices: &[Mat4]) {
        let (owner, palette) = self
            .palettes
            .entry(entity)
            .or_insert_with(|| (skin, Vec::new()));
        *owner = skin;
        palette.clear();
        palette.extend_from_slice(matrices);
        self.writes += 1;
    }
}

/// Computes joint palettes from the current global matrices.
#[derive(Debug, Default)]
pub struct SkinBinder {
    /// Skins checked by the last [`SkinBinder::new`].
    skin_count: usize,
    palettes: HashMap<Entity, Vec<Mat4>>,
}

impl SkinBinder {
    /// Binder for `skins`.
    ///
    /// # Panics
    ///
    /// Panics if a skin has a different number of joints and inverse bind
    /// matrices.
    pub fn new(skins: &[Skin]) -> Self {
        for (index, skin) in skins.iter().enumerate() {
            assert_eq!(
                skin.joints.len(),
                skin.inverse_bind_matrices.len(),
                "skin {index}: joint and inverse bind matrix counts differ"
            );
        }
        Self {
            skin_count: skins.len(),
            palettes: HashMap::new(),
        }
    }

    /// Recompute the palette of every skinned entity and hand it to `sink`.
    ///
    /// Run after [`update_matrices`](crate::ecs::update_matrices).
    ///
    /// # Panics
    ///
    /// Panics if a skinned entity names a skin outside `skins`, or a joint
    /// entity is no longer alive.
    pub fn update(&mut self, store: &EntityStore, skins: &[Skin], sink: &mut dyn JointBufferSink) {
        if self.skin_count != skins.len() {
            *self = Self::new(skins);
        }

        for slot in 0..store.capacity() {
            if !store.masks[slot].contains(ComponentMask::ALLOCATED | ComponentMask::SKIN) {
                continue;
            }
            let skin_id = store.skins[slot];
            let skin = skins.get(skin_id.index()).unwrap_or_else(|| {
                panic!(
                    "entity {slot} uses skin {} but only {} skins exist",
                    skin_id.index(),
                    skins.len()
                )
            });

            let entity = Entity::new(slot as u32, store.generations[slot]);
            let to_skinned = store.global_matrices[slot].inverse();
            let palette = self.palettes.entry(entity).or_default();
            palette.clear();
            for (j, (joint, inverse_bind)) in skin
                .joints
                .iter()
                .zip(&skin.inverse_bind_matrices)
                .enumerate()
            {
                assert!(
                    store.is_alive(*joint),
                    "skin {} joint {j} refers to dead entity {joint}",
                    skin_id.index()
                );
                palette.push(to_skinned * store.global_matrices[joint.slot()] * *inverse_bind);
            }
            sink.write_joints(entity, skin_id, palette);
        }

        // Drop palettes of entities destroyed or unskinned since last frame.
        self.palettes.retain(|&entity, _| {
            store.is_alive(entity) && store.mask(entity).contains(ComponentMask::SKIN)
        });
    }

    /// Palette computed for the skinned `entity` on the last update.
    pub fn palette(&self, entity: Entity) -> Option<&[Mat4]> {
        self.palettes.get(&entity).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::update_matrices;
    use crate::math::{Quat, Transform, Vec3};

    fn assert_mat_eq(actual: Mat4, expected: Mat4) {
        assert!(
            actual.abs_diff_eq(expected, 1e-5),
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn joint_at_bind_pose_is_identity() {
        let mut store = EntityStore::new();
        let mesh = store.create_entity();
        let joint = store.create_entity();

        let bind = Transform::from_rotation(Quat::from_rotation_y(0.7))
            .with_translation(Vec3::new(0.0, 1.5, 0.0));
        store.set_transform(joint, bind);
        store.set_skin(mesh, SkinId(0));

        let skins = vec![Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![bind.matrix().inverse()],
        }];

        update_matrices(&mut store);
        let mut binder = SkinBinder::new(&skins);
        let mut sink = CpuJointBuffers::new();
        binder.update(&store, &skins, &mut sink);

        let palette = sink.palette(mesh).unwrap();
        assert_eq!(palette.len(), 1);
        assert_mat_eq(palette[0], Mat4::IDENTITY);
    }

    #[test]
    fn palette_is_relative_to_skinned_entity() {
        let mut store = EntityStore::new();
        let root = store.create_entity();
        let mesh = store.create_entity();
        let joint = store.create_entity();
        store.set_transform(root, Transform::from_xyz(10.0, 0.0, 0.0));
        store.set_parent(mesh, root);
        store.set_parent(joint, root);
        store.set_transform(joint, Transform::from_xyz(0.0, 2.0, 0.0));
        store.set_skin(mesh, SkinId(0));

        let skins = vec![Skin {
            name: Some("rig".into()),
            joints: vec![joint],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        }];

        update_matrices(&mut store);
        let mut binder = SkinBinder::new(&skins);
        let mut sink = CpuJointBuffers::new();
        binder.update(&store, &skins, &mut sink);

        // Moving the whole rig leaves the joint offset relative to the mesh.
        assert_mat_eq(
            binder.palette(mesh).unwrap()[0],
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
        );
    }

    #[test]
    fn one_write_per_skinned_entity() {
        let mut store = EntityStore::new();
        let joint = store.create_entity();
        let a = store.create_entity();
        let b = store.create_entity();
        store.set_skin(a, SkinId(0));
        store.set_skin(b, SkinId(0));
        let skins = vec![Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        }];

        update_matrices(&mut store);
        let mut binder = SkinBinder::new(&skins);
        let mut sink = CpuJointBuffers::new();
        binder.update(&store, &skins, &mut sink);

        assert_eq!(sink.write_count(), 2);
        assert_eq!(sink.skin_of(a), Some(SkinId(0)));
        assert!(sink.palette(joint).is_none());
    }

    #[test]
    fn shared_skin_keeps_a_palette_per_entity() {
        let mut store = EntityStore::new();
        let joint = store.create_entity();
        let a = store.create_entity();
        let b = store.create_entity();
        store.set_transform(joint, Transform::from_xyz(0.0, 1.0, 0.0));
        store.set_transform(b, Transform::from_xyz(5.0, 0.0, 0.0));
        store.set_skin(a, SkinId(0));
        store.set_skin(b, SkinId(0));
        let skins = vec![Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        }];

        update_matrices(&mut store);
        let mut binder = SkinBinder::new(&skins);
        let mut sink = CpuJointBuffers::new();
        binder.update(&store, &skins, &mut sink);

        let expected_a = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0));
        let expected_b = Mat4::from_translation(Vec3::new(-5.0, 1.0, 0.0));
        assert_mat_eq(sink.palette(a).unwrap()[0], expected_a);
        assert_mat_eq(sink.palette(b).unwrap()[0], expected_b);
        assert_mat_eq(binder.palette(a).unwrap()[0], expected_a);
        assert_mat_eq(binder.palette(b).unwrap()[0], expected_b);
    }

    #[test]
    fn destroyed_entity_palette_is_dropped() {
        let mut store = EntityStore::new();
        let joint = store.create_entity();
        let mesh = store.create_entity();
        store.set_skin(mesh, SkinId(0));
        let skins = vec![Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        }];

        let mut binder = SkinBinder::new(&skins);
        binder.update(&store, &skins, &mut CpuJointBuffers::new());
        assert!(binder.palette(mesh).is_some());

        store.destroy_entity(mesh);
        binder.update(&store, &skins, &mut CpuJointBuffers::new());
        assert!(binder.palette(mesh).is_none());
    }

    #[test]
    #[should_panic(expected = "dead entity")]
    fn dead_joint_panics() {
        let mut store = EntityStore::new();
        let mesh = store.create_entity();
        let joint = store.create_entity();
        store.set_skin(mesh, SkinId(0));
        let skins = vec![Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        }];
        store.destroy_entity(joint);

        let mut binder = SkinBinder::new(&skins);
        binder.update(&store, &skins, &mut CpuJointBuffers::new());
    }

    #[test]
    #[should_panic(expected = "counts differ")]
    fn mismatched_inverse_bind_count_panics() {
        let mut store = EntityStore::new();
        let joint = store.create_entity();
        SkinBinder::new(&[Skin {
            name: None,
            joints: vec![joint],
            inverse_bind_matrices: vec![],
        }]);
    }
}
