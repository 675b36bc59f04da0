//! # Scene Import — From a Parsed Model to a Live Scene
//!
//! [`import_scene`] turns a [`SceneSource`] into a [`Scene`] in four steps:
//!
//! ```text
//! 1. check there is exactly one scene
//! 2. convert every mesh primitive once          (mesh, primitive) → MeshHandle
//! 3. walk the node tree in pre-order            node → Entity
//!      one entity per node, parent before child
//!      extra primitives → extra entities under the node's entity
//! 4. translate skins, then animations, through the node → Entity table
//! ```
//!
//! Step 4 only starts once the walk is complete, so a skin or channel may name
//! a node that appears anywhere in the tree.
//!
//! Pre-order creation is what gives every parent a lower index than its
//! children, which the single-pass transform update depends on.
//!
//! Any error aborts the whole import. There is no partial scene.

#[cfg(feature = "gltf")]
pub mod gltf;
pub mod source;

use crate::animation::{Animation, Channel, Interpolation};
use crate::config::SceneConfig;
use crate::ecs::Entity;
use crate::error::ImportError;
use crate::math::{Mat4, Quat, Transform, Vec3};
use crate::render::{Material, MaterialHandle, MeshData, MeshHandle};
use crate::scene::Scene;
use crate::skin::{Skin, SkinId};

use source::{ChannelPath, ComponentType, SceneSource, SourcePrimitive, SourceSkin};

#[cfg(feature = "gltf")]
pub use self::gltf::{import_gltf, import_gltf_slice};

/// Converted primitives of one source mesh.
struct PrimitiveRefs {
    mesh: MeshHandle,
    material: MaterialHandle,
}

/// Build a scene from a parsed model.
pub fn import_scene(source: &SceneSource, config: &SceneConfig) -> Result<Scene, ImportError> {
    config.validate()?;

    let roots = match source.scenes.as_slice() {
        [] => return Err(ImportError::NoScene),
        [roots] => roots,
        scenes => {
            return Err(ImportError::MultipleScenes {
                count: scenes.len(),
            });
        }
    };

    let mut scene = Scene::new(config.clone());
    scene.materials = source.materials.clone();
    let primitives = convert_meshes(source, &mut scene)?;

    let node_entities = walk_nodes(source, roots, &primitives, &mut scene)?;
    debug_assert!(scene.store.check_parent_order());

    scene.skins = source
        .skins
        .iter()
        .enumerate()
        .map(|(index, skin)| convert_skin(source, index, skin, &node_entities))
        .collect::<Result<_, _>>()?;

    scene.animations = source
        .animations
        .iter()
        .enumerate()
        .map(|(index, _)| convert_animation(source, index, &node_entities))
        .collect::<Result<_, _>>()?;

    scene.rebuild_binder();

    log::info!(
        "imported scene: {} entities ({} slots), {} meshes, {} materials, {} skins, {} animations",
        scene.store.entity_count(),
        scene.store.capacity(),
        scene.meshes.len(),
        scene.materials.len(),
        scene.skins.len(),
        scene.animations.len()
    );
    Ok(scene)
}

// ── Meshes ───────────────────────────────────────────────────────────

fn convert_meshes(source: &SceneSource, scene: &mut Scene) -> Result<Vec<Vec<PrimitiveRefs>>, ImportError> {
    let mut fallback_material = None;
    let mut converted = Vec::with_capacity(source.meshes.len());

    for (mesh_index, mesh) in source.meshes.iter().enumerate() {
        let mut refs = Vec::with_capacity(mesh.primitives.len());
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            let data = convert_primitive(source, mesh_index, primitive_index, primitive)?;
            let handle = MeshHandle(scene.meshes.len() as u32);
            scene.meshes.push(data);

            let material = match primitive.material {
                Some(index) if index < scene.materials.len() => MaterialHandle(index as u32),
                Some(index) => {
                    return Err(ImportError::DanglingReference {
                        kind: "material",
                        index,
                    });
                }
                None => *fallback_material.get_or_insert_with(|| {
                    scene.materials.push(Material::default());
                    MaterialHandle(scene.materials.len() as u32 - 1)
                }),
            };
            refs.push(PrimitiveRefs {
                mesh: handle,
                material,
            });
        }
        converted.push(refs);
    }
    Ok(converted)
}

fn convert_primitive(
    source: &SceneSource,
    mesh: usize,
    primitive: usize,
    prim: &SourcePrimitive,
) -> Result<MeshData, ImportError> {
    let required = |attribute: &'static str| {
        prim.attribute(attribute).ok_or(ImportError::MissingAttribute {
            mesh,
            primitive,
            attribute,
        })
    };

    let positions = source.read_vec3(required("POSITION")?, "POSITION")?;
    let normals = source.read_vec3(required("NORMAL")?, "NORMAL")?;
    let uvs = source.read_vec2(required("TEXCOORD_0")?, "TEXCOORD_0")?;

    let tangents = prim
        .attribute("TANGENT")
        .map(|index| source.read_vec4(index, "TANGENT"))
        .transpose()?;

    // Skinning needs both streams; one without the other is ignored.
    let (joints, weights) = match (prim.attribute("JOINTS_0"), prim.attribute("WEIGHTS_0")) {
        (Some(joints), Some(weights)) => (
            Some(source.read_joints(joints)?),
            Some(source.read_vec4(weights, "WEIGHTS_0")?),
        ),
        _ => (None, None),
    };

    let index_accessor = prim
        .indices
        .ok_or(ImportError::MissingIndices { mesh, primitive })?;
    let indices = source
        .read_indices(index_accessor)?
        .ok_or_else(|| ImportError::UnsupportedIndexType {
            mesh,
            primitive,
            component: source.accessors[index_accessor].component_type,
        })?;

    log::debug!(
        "mesh {mesh} primitive {primitive}: {} vertices, {} indices{}",
        positions.len(),
        indices.len(),
        if joints.is_some() { ", skinned" } else { "" }
    );

    Ok(MeshData {
        positions,
        normals,
        uvs,
        tangents,
        joints,
        weights,
        indices,
    })
}

// ── Nodes ────────────────────────────────────────────────────────────

fn node_transform(translation: Option<Vec3>, rotation: Option<Quat>, scale: Option<Vec3>) -> Transform {
    let mut transform = Transform::IDENTITY;
    if let Some(translation) = translation {
        transform = transform.with_translation(translation);
    }
    if let Some(rotation) = rotation {
        transform = transform.with_rotation(rotation.normalize());
    }
    if let Some(scale) = scale {
        transform = transform.with_scale(scale);
    }
    transform
}

/// Create entities for every node reachable from `roots`, in pre-order.
///
/// Returns the node → entity table; unreachable nodes map to `None`.
fn walk_nodes(
    source: &SceneSource,
    roots: &[usize],
    primitives: &[Vec<PrimitiveRefs>],
    scene: &mut Scene,
) -> Result<Vec<Option<Entity>>, ImportError> {
    let mut node_entities: Vec<Option<Entity>> = vec![None; source.nodes.len()];
    let mut stack: Vec<(usize, Option<Entity>)> = roots.iter().rev().map(|&root| (root, None)).collect();

    while let Some((node_index, parent)) = stack.pop() {
        let node = source.node(node_index)?;
        if node_entities[node_index].is_some() {
            return Err(ImportError::NodeVisitedTwice { node: node_index });
        }

        let store = &mut scene.store;
        let entity = store.create_entity();
        node_entities[node_index] = Some(entity);
        if let Some(parent) = parent {
            store.set_parent(entity, parent);
        }
        store.set_transform(entity, node_transform(node.translation, node.rotation, node.scale));

        let skin = match node.skin {
            Some(index) if index < source.skins.len() => Some(SkinId(index as u32)),
            Some(index) => return Err(ImportError::DanglingReference { kind: "skin", index }),
            None => None,
        };

        if let Some(mesh_index) = node.mesh {
            let refs = primitives.get(mesh_index).ok_or(ImportError::DanglingReference {
                kind: "mesh",
                index: mesh_index,
            })?;
            for (i, prim) in refs.iter().enumerate() {
                // The first primitive lives on the node's entity; the rest hang
                // off it with no transform of their own.
                let target = if i == 0 {
                    entity
                } else {
                    let extra = store.create_entity();
                    store.set_parent(extra, entity);
                    extra
                };
                store.set_mesh(target, prim.mesh);
                store.set_material(target, prim.material);
                if let Some(skin) = skin {
                    store.set_skin(target, skin);
                }
            }
        }

        if let Some(name) = &node.name {
            scene.name_entity(name, entity);
        }
        log::debug!(
            "node {node_index} ({}) -> entity {entity}",
            node.name.as_deref().unwrap_or("unnamed")
        );

        stack.extend(node.children.iter().rev().map(|&child| (child, Some(entity))));
    }
    Ok(node_entities)
}

fn resolve(node_entities: &[Option<Entity>], node: usize) -> Result<Entity, ImportError> {
    node_entities
        .get(node)
        .copied()
        .flatten()
        .ok_or(ImportError::UnresolvedNode { node })
}

// ── Skins ────────────────────────────────────────────────────────────

fn convert_skin(
    source: &SceneSource,
    index: usize,
    skin: &SourceSkin,
    node_entities: &[Option<Entity>],
) -> Result<Skin, ImportError> {
    let joints = skin
        .joints
        .iter()
        .map(|&node| resolve(node_entities, node))
        .collect::<Result<Vec<_>, _>>()?;

    let inverse_bind_matrices = match skin.inverse_bind_matrices {
        Some(accessor) => source.read_mat4(accessor, "inverseBindMatrices")?,
        None => vec![Mat4::IDENTITY; joints.len()],
    };
    if inverse_bind_matrices.len() != joints.len() {
        return Err(ImportError::InverseBindCountMismatch {
            skin: index,
            joints: joints.len(),
            matrices: inverse_bind_matrices.len(),
        });
    }

    log::debug!("skin {index}: {} joints", joints.len());
    Ok(Skin {
        name: skin.name.clone(),
        joints,
        inverse_bind_matrices,
    })
}

// ── Animations ───────────────────────────────────────────────────────

/// Cubic-spline outputs store `[in_tangent, value, out_tangent]` per key;
/// keep the values only.
fn keyframe_values<T: Copy>(values: Vec<T>, interpolation: Interpolation) -> Vec<T> {
    match interpolation {
        Interpolation::CubicSpline => values.chunks_exact(3).map(|triplet| triplet[1]).collect(),
        Interpolation::Linear | Interpolation::Step => values,
    }
}

fn convert_animation(
    source: &SceneSource,
    index: usize,
    node_entities: &[Option<Entity>],
) -> Result<Animation, ImportError> {
    let anim = &source.animations[index];
    let mut animation = Animation::new(anim.name.clone());

    for (channel_index, channel) in anim.channels.iter().enumerate() {
        if channel.path == ChannelPath::Weights {
            log::warn!(
                "animation {index} channel {channel_index}: morph target weights are not supported, skipping"
            );
            continue;
        }

        let target = resolve(node_entities, channel.node)?;
        let sampler = anim
            .samplers
            .get(channel.sampler)
            .ok_or(ImportError::DanglingReference {
                kind: "animation sampler",
                index: channel.sampler,
            })?;

        let is_float = |accessor: usize| -> Result<bool, ImportError> {
            Ok(source.accessor(accessor)?.component_type == ComponentType::F32)
        };
        if !is_float(sampler.input)? || !is_float(sampler.output)? {
            return Err(ImportError::NonFloatSampler {
                animation: index,
                channel: channel_index,
            });
        }

        let input = source.read_scalars(sampler.input, "animation input")?;
        let invalid = |err| ImportError::InvalidChannel {
            animation: index,
            channel: channel_index,
            source: err,
        };

        if channel.path == ChannelPath::Rotation {
            let output: Vec<Quat> = keyframe_values(
                source.read_vec4(sampler.output, "animation output")?,
                sampler.interpolation,
            )
            .into_iter()
            .map(|q| Quat::from_array(q).normalize())
            .collect();
            animation.rotation_channels.push(
                Channel::new(target, sampler.interpolation, input, output).map_err(invalid)?,
            );
        } else {
            let output: Vec<Vec3> = keyframe_values(
                source.read_vec3(sampler.output, "animation output")?,
                sampler.interpolation,
            )
            .into_iter()
            .map(Vec3::from_array)
            .collect();
            let sampled =
                Channel::new(target, sampler.interpolation, input, output).map_err(invalid)?;
            if channel.path == ChannelPath::Scale {
                animation.scale_channels.push(sampled);
            } else {
                animation.translation_channels.push(sampled);
            }
        }
    }

    log::debug!(
        "animation {index} ({}): {} channels, {:.2}s",
        animation.name.as_deref().unwrap_or("unnamed"),
        animation.channel_count(),
        animation.duration()
    );
    Ok(animation)
}
