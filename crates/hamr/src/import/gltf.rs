//! # glTF — Loading Scenes from `.gltf` / `.glb`
//!
//! [glTF 2.0](https://www.khronos.org/gltf/) is the industry-standard format
//! for real-time 3D assets. The `gltf` crate does the parsing and buffer
//! loading; this module only copies its document into a [`SceneSource`] and
//! hands that to [`import_scene`].
//!
//! ## Format Variants
//!
//! - **`.gltf`**: JSON file + separate `.bin` (mesh data) + image files.
//! - **`.glb`**: Single binary file containing everything.
//!
//! Both go through the same path. Images are never decoded here; materials
//! keep image indices and the renderer loads textures itself.
//!
//! ## What We Extract
//!
//! - Node tree with names and TRS (a `matrix` is decomposed into TRS)
//! - Mesh primitives: `POSITION`, `NORMAL`, `TEXCOORD_0`, `TANGENT`,
//!   `JOINTS_0`, `WEIGHTS_0`, indices, material
//! - PBR metallic-roughness factors and texture slots
//! - Skins and translation/rotation/scale animation channels
//!
//! ## What We Skip
//!
//! - Morph targets (`weights` channels are dropped with a warning)
//! - Cameras, lights, extensions, secondary UV sets

use std::path::Path;

use ::gltf::animation::{Interpolation as GltfInterpolation, Property};
use ::gltf::{Document, Semantic};

use crate::animation::Interpolation;
use crate::config::SceneConfig;
use crate::error::ImportError;
use crate::math::{Quat, Vec3};
use crate::render::{Material, TextureFlags};
use crate::scene::Scene;

use super::import_scene;
use super::source::{
    Accessor, AccessorStorage, ChannelPath, ComponentType, SceneSource, SourceAnimation,
    SourceChannel, SourceMesh, SourceNode, SourcePrimitive, SourceSampler, SourceSkin,
};

/// Load a `.gltf` or `.glb` file and import its scene.
///
/// External `.bin` buffers are resolved relative to the file.
///
/// # Example
/// ```ignore
/// let scene = import_gltf("assets/fox.glb", &SceneConfig::default())?;
/// ```
pub fn import_gltf(path: impl AsRef<Path>, config: &SceneConfig) -> Result<Scene, ImportError> {
    let path = path.as_ref();
    log::info!("loading glTF '{}'", path.display());
    let ::gltf::Gltf { document, blob } = ::gltf::Gltf::open(path)?;
    let buffers = ::gltf::import_buffers(&document, path.parent(), blob)?;
    import_scene(&scene_source(&document, buffers), config)
}

/// Import a glTF document held in memory (JSON or GLB bytes).
///
/// Buffers must be embedded (GLB chunk or `data:` URIs).
pub fn import_gltf_slice(bytes: &[u8], config: &SceneConfig) -> Result<Scene, ImportError> {
    let ::gltf::Gltf { document, blob } = ::gltf::Gltf::from_slice(bytes)?;
    let buffers = ::gltf::import_buffers(&document, None, blob)?;
    import_scene(&scene_source(&document, buffers), config)
}

/// Copy a parsed document and its loaded buffers into a [`SceneSource`].
pub fn scene_source(document: &Document, buffers: Vec<::gltf::buffer::Data>) -> SceneSource {
    SceneSource {
        nodes: document.nodes().map(|node| convert_node(&node)).collect(),
        meshes: document.meshes().map(|mesh| convert_mesh(&mesh)).collect(),
        materials: document
            .materials()
            .map(|material| convert_material(&material))
            .collect(),
        skins: document
            .skins()
            .map(|skin| SourceSkin {
                name: skin.name().map(str::to_owned),
                joints: skin.joints().map(|joint| joint.index()).collect(),
                inverse_bind_matrices: skin.inverse_bind_matrices().map(|a| a.index()),
            })
            .collect(),
        animations: document
            .animations()
            .map(|animation| convert_animation(&animation))
            .collect(),
        accessors: document
            .accessors()
            .map(|accessor| convert_accessor(&accessor))
            .collect(),
        buffers: buffers.into_iter().map(|data| data.0).collect(),
        scenes: document
            .scenes()
            .map(|scene| scene.nodes().map(|node| node.index()).collect())
            .collect(),
    }
}

fn convert_node(node: &::gltf::Node) -> SourceNode {
    // The crate fills in defaults for absent TRS; a default value and an
    // absent one produce the same matrix, so only non-defaults are kept.
    let (translation, rotation, scale) = node.transform().decomposed();
    let translation = Vec3::from_array(translation);
    let rotation = Quat::from_array(rotation);
    let scale = Vec3::from_array(scale);

    SourceNode {
        name: node.name().map(str::to_owned),
        children: node.children().map(|child| child.index()).collect(),
        mesh: node.mesh().map(|mesh| mesh.index()),
        skin: node.skin().map(|skin| skin.index()),
        translation: (translation != Vec3::ZERO).then_some(translation),
        rotation: (rotation != Quat::IDENTITY).then_some(rotation),
        scale: (scale != Vec3::ONE).then_some(scale),
    }
}

fn semantic_name(semantic: &Semantic) -> Option<&'static str> {
    Some(match semantic {
        Semantic::Positions => "POSITION",
        Semantic::Normals => "NORMAL",
        Semantic::Tangents => "TANGENT",
        Semantic::TexCoords(0) => "TEXCOORD_0",
        Semantic::Joints(0) => "JOINTS_0",
        Semantic::Weights(0) => "WEIGHTS_0",
        _ => return None,
    })
}

fn convert_mesh(mesh: &::gltf::Mesh) -> SourceMesh {
    let primitives = mesh
        .primitives()
        .map(|primitive| SourcePrimitive {
            attributes: primitive
                .attributes()
                .filter_map(|(semantic, accessor)| {
                    semantic_name(&semantic).map(|name| (name.to_owned(), accessor.index()))
                })
                .collect(),
            indices: primitive.indices().map(|accessor| accessor.index()),
            material: primitive.material().index(),
        })
        .collect();
    SourceMesh {
        name: mesh.name().map(str::to_owned),
        primitives,
    }
}

fn convert_material(material: &::gltf::Material) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let image = |texture: ::gltf::Texture| texture.source().index() as u32;

    let base_color_texture = pbr.base_color_texture().map(|info| image(info.texture()));
    let metallic_roughness_texture = pbr
        .metallic_roughness_texture()
        .map(|info| image(info.texture()));
    let normal_texture = material.normal_texture().map(|info| image(info.texture()));
    let emissive_texture = material.emissive_texture().map(|info| image(info.texture()));

    let mut texture_flags = TextureFlags::empty();
    texture_flags.set(TextureFlags::ALBEDO, base_color_texture.is_some());
    texture_flags.set(
        TextureFlags::METALLIC_ROUGHNESS,
        metallic_roughness_texture.is_some(),
    );
    texture_flags.set(TextureFlags::OCCLUSION, material.occlusion_texture().is_some());
    texture_flags.set(TextureFlags::NORMAL_MAP, normal_texture.is_some());
    texture_flags.set(TextureFlags::EMISSIVE, emissive_texture.is_some());

    Material {
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: material.emissive_factor(),
        base_color_texture,
        metallic_roughness_texture,
        normal_texture,
        emissive_texture,
        texture_flags,
    }
}

fn convert_accessor(accessor: &::gltf::Accessor) -> Accessor {
    use ::gltf::accessor::DataType;

    let component_type = match accessor.data_type() {
        DataType::I8 => ComponentType::I8,
        DataType::U8 => ComponentType::U8,
        DataType::I16 => ComponentType::I16,
        DataType::U16 => ComponentType::U16,
        DataType::U32 => ComponentType::U32,
        DataType::F32 => ComponentType::F32,
    };
    let (buffer, offset, stride) = match accessor.view() {
        Some(view) => (
            view.buffer().index(),
            view.offset() + accessor.offset(),
            view.stride(),
        ),
        None => (0, 0, None),
    };

    Accessor {
        buffer,
        offset,
        stride,
        count: accessor.count(),
        component_type,
        components: accessor.dimensions().multiplicity(),
        normalized: accessor.normalized(),
        storage: match (accessor.sparse(), accessor.view()) {
            (Some(_), _) => AccessorStorage::Sparse,
            // Neither a view nor substitutions: the elements are all zero.
            (None, None) => AccessorStorage::Zeroed,
            (None, Some(_)) => AccessorStorage::Buffer,
        },
    }
}

fn convert_animation(animation: &::gltf::Animation) -> SourceAnimation {
    let mut channels = Vec::new();
    let mut samplers = Vec::new();
    for channel in animation.channels() {
        let path = match channel.target().property() {
            Property::Translation => ChannelPath::Translation,
            Property::Rotation => ChannelPath::Rotation,
            Property::Scale => ChannelPath::Scale,
            Property::MorphTargetWeights => ChannelPath::Weights,
        };
        let sampler = channel.sampler();
        let interpolation = match sampler.interpolation() {
            GltfInterpolation::Linear => Interpolation::Linear,
            GltfInterpolation::Step => Interpolation::Step,
            GltfInterpolation::CubicSpline => Interpolation::CubicSpline,
        };

        // One sampler per channel keeps the indices trivially in sync.
        channels.push(SourceChannel {
            node: channel.target().node().index(),
            path,
            sampler: samplers.len(),
        });
        samplers.push(SourceSampler {
            input: sampler.input().index(),
            output: sampler.output().index(),
            interpolation,
        });
    }

    SourceAnimation {
        name: animation.name().map(str::to_owned),
        channels,
        samplers,
    }
}
