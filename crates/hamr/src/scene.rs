//! # Scene — One Loaded Model and Its Frame Pipeline
//!
//! A [`Scene`] owns everything an import produces: the entity store, mesh and
//! material tables, skins, and animations. [`Scene::update`] runs the
//! per-frame stages in their required order:
//!
//! ```text
//!   animations ──► update_matrices ──► copy_draw_data ──► SkinBinder
//!   (local TRS)    (global matrices)   (model/normal)     (joint palettes)
//! ```
//!
//! Running them out of order doesn't crash; it renders last frame's pose.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hamr::prelude::*;
//!
//! let mut scene = import_gltf("assets/fox.glb", &SceneConfig::default())?;
//! scene.animation_named_mut("Walk").unwrap().play(0.0);
//!
//! let mut joints = CpuJointBuffers::new();
//! scene.update(time, &mut joints);
//! for drawable in scene.drawables() {
//!     // upload drawable.constants, bind scene.meshes[drawable.mesh.index()] ...
//! }
//! ```

use std::collections::HashMap;

use crate::animation::Animation;
use crate::config::SceneConfig;
use crate::ecs::{ComponentMask, Entity, EntityStore, copy_draw_data, update_matrices};
use crate::math::Mat4;
use crate::render::{Drawable, Material, MeshData};
use crate::skin::{JointBufferSink, Skin, SkinBinder};

/// A fully resident scene.
pub struct Scene {
    pub store: EntityStore,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<Material>,
    pub skins: Vec<Skin>,
    pub animations: Vec<Animation>,
    pub binder: SkinBinder,
    pub config: SceneConfig,
    names: HashMap<String, Entity>,
}

impl Scene {
    /// Empty scene whose store is sized from `config`.
    pub fn new(config: SceneConfig) -> Self {
        Self {
            store: EntityStore::from_config(&config),
            meshes: Vec::new(),
            materials: Vec::new(),
            skins: Vec::new(),
            animations: Vec::new(),
            binder: SkinBinder::default(),
            config,
            names: HashMap::new(),
        }
    }

    /// Advance one frame: sample animations at `current_time`, recompute
    /// matrices and draw constants, and push joint palettes into `sink`.
    pub fn update(&mut self, current_time: f32, sink: &mut dyn JointBufferSink) {
        let lookup = self.config.keyframe_lookup;
        for animation in &mut self.animations {
            animation.update(&mut self.store, current_time, lookup);
        }
        update_matrices(&mut self.store);
        copy_draw_data(&mut self.store);
        self.binder.update(&self.store, &self.skins, sink);
    }

    /// Re-check the skin table after `skins` changes.
    pub fn rebuild_binder(&mut self) {
        self.binder = SkinBinder::new(&self.skins);
    }

    /// Joint palette computed for the skinned `entity` by the last
    /// [`update`](Self::update).
    pub fn joint_palette(&self, entity: Entity) -> Option<&[Mat4]> {
        self.binder.palette(entity)
    }

    /// Every entity with both a mesh and a material, in index order.
    pub fn drawables(&self) -> impl Iterator<Item = Drawable> + '_ {
        let store = &self.store;
        store.entities().filter_map(move |entity| {
            let mask = store.mask(entity);
            if !mask.contains(ComponentMask::MESH | ComponentMask::MATERIAL) {
                return None;
            }
            Some(Drawable {
                entity,
                mesh: store.mesh(entity)?,
                material: store.material(entity)?,
                constants: store.draw_constants(entity),
                skin: store.skin(entity),
            })
        })
    }

    /// Record a name for `entity`. The first entity given a name keeps it.
    pub fn name_entity(&mut self, name: &str, entity: Entity) {
        self.names.entry(name.to_owned()).or_insert(entity);
    }

    /// Entity created for the node called `name`.
    pub fn entity_named(&self, name: &str) -> Option<Entity> {
        self.names
            .get(name)
            .copied()
            .filter(|&entity| self.store.is_alive(entity))
    }

    pub fn animation_named(&self, name: &str) -> Option<&Animation> {
        self.animations
            .iter()
            .find(|animation| animation.name.as_deref() == Some(name))
    }

    pub fn animation_named_mut(&mut self, name: &str) -> Option<&mut Animation> {
        self.animations
            .iter_mut()
            .find(|animation| animation.name.as_deref() == Some(name))
    }

    /// Start every animation from `now`.
    pub fn play_all(&mut self, now: f32) {
        for animation in &mut self.animations {
            animation.play(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{Channel, Interpolation};
    use crate::math::{Quat, Transform, Vec3};
    use crate::render::{Indices, MaterialHandle, MeshHandle};
    use crate::skin::{CpuJointBuffers, SkinId};

    fn quad() -> MeshData {
        MeshData {
            positions: vec![[0.0; 3]; 4],
            normals: vec![[0.0, 1.0, 0.0]; 4],
            uvs: vec![[0.0; 2]; 4],
            tangents: None,
            joints: None,
            weights: None,
            indices: Indices::U16(vec![0, 1, 2, 0, 2, 3]),
        }
    }

    /// Root → arm joint, with a skinned mesh under the root and an animation
    /// sliding the arm along X.
    fn rigged_scene() -> (Scene, Entity, Entity, Entity) {
        let mut scene = Scene::new(SceneConfig::default());
        scene.meshes.push(quad());
        scene.materials.push(Material::default());

        let store = &mut scene.store;
        let root = store.create_entity();
        let mesh = store.create_entity();
        let arm = store.create_entity();
        store.set_transform(root, Transform::from_xyz(0.0, 0.0, -2.0));
        store.set_parent(mesh, root);
        store.set_mesh(mesh, MeshHandle(0));
        store.set_material(mesh, MaterialHandle(0));
        store.set_skin(mesh, SkinId(0));
        store.set_parent(arm, root);
        store.set_transform(arm, Transform::IDENTITY);

        scene.skins.push(Skin {
            name: Some("rig".into()),
            joints: vec![arm],
            inverse_bind_matrices: vec![Mat4::IDENTITY],
        });
        scene.rebuild_binder();

        let mut slide = Animation::new(Some("slide".into()));
        slide.translation_channels.push(
            Channel::new(
                arm,
                Interpolation::Linear,
                vec![0.0, 1.0],
                vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)],
            )
            .unwrap(),
        );
        scene.animations.push(slide);
        scene.name_entity("root", root);
        scene.name_entity("arm", arm);

        (scene, root, mesh, arm)
    }

    #[test]
    fn palette_reflects_same_frame_pose() {
        let (mut scene, _, mesh, _) = rigged_scene();
        scene.animation_named_mut("slide").unwrap().play(10.0);

        let mut sink = CpuJointBuffers::new();
        scene.update(10.25, &mut sink);

        // No one-frame lag: the joint has already moved by this frame's sample.
        let palette = sink.palette(mesh).unwrap();
        let moved = palette[0].transform_point3(Vec3::ZERO);
        assert!(moved.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-5), "{moved:?}");
        assert_eq!(scene.joint_palette(mesh), Some(palette));
    }

    #[test]
    fn drawables_carry_model_and_skin() {
        let (mut scene, root, mesh, _) = rigged_scene();
        scene.update(0.0, &mut CpuJointBuffers::new());

        let drawables: Vec<_> = scene.drawables().collect();
        assert_eq!(drawables.len(), 1);
        let drawable = drawables[0];
        assert_eq!(drawable.entity, mesh);
        assert_eq!(drawable.mesh, MeshHandle(0));
        assert_eq!(drawable.skin, Some(SkinId(0)));
        assert_eq!(scene.store.global_matrix(mesh), scene.store.global_matrix(root));
    }

    #[test]
    fn draw_constants_follow_animation() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.meshes.push(quad());
        scene.materials.push(Material::default());
        let e = scene.store.create_entity();
        scene.store.set_transform(e, Transform::IDENTITY);
        scene.store.set_mesh(e, MeshHandle(0));
        scene.store.set_material(e, MaterialHandle(0));

        let mut spin = Animation::new(Some("spin".into()));
        spin.rotation_channels.push(
            Channel::new(
                e,
                Interpolation::Linear,
                vec![0.0, 1.0],
                vec![Quat::IDENTITY, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)],
            )
            .unwrap(),
        );
        scene.animations.push(spin);
        scene.play_all(0.0);
        scene.update(1.0 - f32::EPSILON, &mut CpuJointBuffers::new());

        let model = Mat4::from_cols_array_2d(&scene.drawables().next().unwrap().constants.model);
        let x = model.transform_vector3(Vec3::X);
        assert!(x.abs_diff_eq(Vec3::new(0.0, 0.0, -1.0), 1e-3), "{x:?}");
    }

    #[test]
    fn lookups_by_name() {
        let (scene, root, _, arm) = rigged_scene();
        assert_eq!(scene.entity_named("root"), Some(root));
        assert_eq!(scene.entity_named("arm"), Some(arm));
        assert_eq!(scene.entity_named("leg"), None);
        assert_eq!(scene.animation_named("slide").unwrap().duration(), 1.0);
        assert!(scene.animation_named("jump").is_none());
    }

    #[test]
    fn stopped_animation_leaves_pose() {
        let (mut scene, _, _, arm) = rigged_scene();
        let mut sink = CpuJointBuffers::new();
        scene.update(0.5, &mut sink);
        assert_eq!(scene.store.transform(arm).unwrap().translation, Vec3::ZERO);
    }
}
