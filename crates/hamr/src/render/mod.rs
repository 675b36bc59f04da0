//! # Render — What the Scene Hands to the Renderer
//!
//! The scene core never talks to a graphics device itself. It produces
//! GPU-ready data and lets the render dispatch layer decide how to upload and
//! draw it:
//!
//! ```text
//!   Scene::drawables()                    SkinBinder::update()
//!          │                                      │
//!          ▼                                      ▼
//!   Drawable { mesh, material,           JointBufferSink::write_joints
//!              constants, skin }          (one palette per skinned entity)
//!          │                                      │
//!          └───────────────┬──────────────────────┘
//!                          ▼
//!              render dispatch (external)
//! ```
//!
//! ## The Handle Pattern
//!
//! Meshes and materials are referenced through [`MeshHandle`] and
//! [`MaterialHandle`]: cheap indices into the scene's tables, never pointers.
//! Components stay `Copy`, and column growth can't dangle them.

#[cfg(feature = "wgpu")]
pub mod gpu;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::ecs::Entity;
use crate::math::Mat4;
use crate::skin::SkinId;

#[cfg(feature = "wgpu")]
pub use gpu::{GpuJointBuffers, JointBufferHandle};

/// Handle to a mesh in the scene's mesh table. Lightweight and `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MeshHandle(pub(crate) u32);

impl MeshHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a material in the scene's material table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MaterialHandle(pub(crate) u32);

impl MaterialHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Which texture slots a [`Material`] uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u8 {
        const ALBEDO = 1 << 0;
        const METALLIC_ROUGHNESS = 1 << 1;
        const OCCLUSION = 1 << 2;
        const NORMAL_MAP = 1 << 3;
        const EMISSIVE = 1 << 4;
    }
}

/// PBR metallic-roughness material, as authored in the scene description.
///
/// Texture fields are image indices in the source document; loading the images
/// is the renderer's business.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub base_color_texture: Option<u32>,
    pub metallic_roughness_texture: Option<u32>,
    pub normal_texture: Option<u32>,
    pub emissive_texture: Option<u32>,
    pub texture_flags: TextureFlags,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            emissive: [0.0, 0.0, 0.0],
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            emissive_texture: None,
            texture_flags: TextureFlags::empty(),
        }
    }
}

/// Index stream of a mesh. 8-bit source indices are widened to 16 bits.
#[derive(Debug, Clone, PartialEq)]
pub enum Indices {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl Indices {
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes, ready for an index buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Indices::U16(v) => bytemuck::cast_slice(v),
            Indices::U32(v) => bytemuck::cast_slice(v),
        }
    }
}

/// CPU-side vertex and index streams of one mesh primitive.
///
/// `joints`/`weights` are only present for skinned primitives; the GPU
/// skinning step reads them together with the joint palette.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub tangents: Option<Vec<[f32; 4]>>,
    pub joints: Option<Vec<[u16; 4]>>,
    pub weights: Option<Vec<[f32; 4]>>,
    pub indices: Indices,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_skinned(&self) -> bool {
        self.joints.is_some() && self.weights.is_some()
    }
}

/// Per-entity draw constants, laid out for a uniform buffer.
///
/// Matrices are column-major, which is what WGSL expects, so they are copied
/// as-is with no transpose.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawConstants {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

impl DrawConstants {
    pub fn from_model(model: Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: crate::math::normal_matrix(model).to_cols_array_2d(),
        }
    }
}

impl Default for DrawConstants {
    fn default() -> Self {
        Self::from_model(Mat4::IDENTITY)
    }
}

/// One entity's worth of data for the mesh pass.
#[derive(Debug, Clone, Copy)]
pub struct Drawable {
    pub entity: Entity,
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
    pub constants: DrawConstants,
    /// Set for skinned entities. The joint palette is written to the sink
    /// under this drawable's `entity`.
    pub skin: Option<SkinId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn draw_constants_are_column_major() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let constants = DrawConstants::from_model(model);
        assert_eq!(constants.model[3], [1.0, 2.0, 3.0, 1.0]);
        // Translation doesn't reach the normal matrix.
        assert_eq!(constants.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn draw_constants_bytes() {
        let constants = DrawConstants::default();
        let bytes: &[u8] = bytemuck::bytes_of(&constants);
        assert_eq!(bytes.len(), 128);
    }

    #[test]
    fn index_bytes() {
        let indices = Indices::U16(vec![0, 1, 2]);
        assert_eq!(indices.len(), 3);
        assert_eq!(indices.as_bytes().len(), 6);
        assert!(!Indices::U32(vec![4]).is_empty());
    }
}
