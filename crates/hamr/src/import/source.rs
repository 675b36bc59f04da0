//! # SceneSource — The Parsed Model the Importer Reads
//!
//! A plain, read-only description of a scene file after parsing: nodes,
//! meshes, skins, animations, and the accessor records that locate their data
//! in raw byte buffers. The glTF adapter fills one in; tests build them by
//! hand.
//!
//! ## Accessors
//!
//! An accessor is a strided array view over one buffer:
//!
//! ```text
//! buffer:  [....|x y z|pad|x y z|pad|x y z|....]
//!               ▲ offset   ▲ offset + stride
//!               └─ element = components × component width
//! ```
//!
//! Elements are read with `bytemuck::pod_read_unaligned`, since accessor
//! offsets carry no alignment guarantee. Data is little-endian, as the file
//! formats require, and read as native order.

use std::collections::HashMap;
use std::mem;

use bytemuck::Pod;

use crate::animation::Interpolation;
use crate::error::ImportError;
use crate::math::{Mat4, Quat, Vec3};
use crate::render::{Indices, Material};

/// Scalar type of an accessor's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    /// Width of one component in bytes.
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

/// A typed, strided view into one buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub buffer: usize,
    /// Byte offset of the first element in the buffer.
    pub offset: usize,
    /// Distance between elements; `None` means tightly packed.
    pub stride: Option<usize>,
    pub count: usize,
    pub component_type: ComponentType,
    /// Components per element: 1 for scalars, 3 for `VEC3`, 16 for `MAT4`.
    pub components: usize,
    /// Integer components map onto `[0, 1]` when read as floats.
    pub normalized: bool,
    pub storage: AccessorStorage,
}

/// Where an accessor's elements come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessorStorage {
    /// Read from `buffer` at `offset`.
    #[default]
    Buffer,
    /// Substitutions over a base view. Not supported.
    Sparse,
    /// No backing data; every component is zero.
    Zeroed,
}

impl Accessor {
    /// Tightly packed accessor starting at `offset` in `buffer`.
    pub fn packed(
        buffer: usize,
        offset: usize,
        count: usize,
        component_type: ComponentType,
        components: usize,
    ) -> Self {
        Self {
            buffer,
            offset,
            stride: None,
            count,
            component_type,
            components,
            normalized: false,
            storage: AccessorStorage::Buffer,
        }
    }
}

/// A node of the scene tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceNode {
    pub name: Option<String>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
    pub skin: Option<usize>,
    pub translation: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
}

/// One draw call's worth of geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePrimitive {
    /// Attribute semantic (`"POSITION"`, `"TEXCOORD_0"`, ...) to accessor.
    pub attributes: HashMap<String, usize>,
    pub indices: Option<usize>,
    pub material: Option<usize>,
}

impl SourcePrimitive {
    pub fn attribute(&self, semantic: &str) -> Option<usize> {
        self.attributes.get(semantic).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMesh {
    pub name: Option<String>,
    pub primitives: Vec<SourcePrimitive>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceSkin {
    pub name: Option<String>,
    /// Joint nodes, in palette order.
    pub joints: Vec<usize>,
    /// `MAT4` accessor; identity matrices when absent.
    pub inverse_bind_matrices: Option<usize>,
}

/// Property a channel animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
    /// Morph target weights. Not supported; skipped on import.
    Weights,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceChannel {
    pub node: usize,
    pub path: ChannelPath,
    pub sampler: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSampler {
    /// Keyframe times accessor.
    pub input: usize,
    /// Keyframe values accessor.
    pub output: usize,
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceAnimation {
    pub name: Option<String>,
    pub channels: Vec<SourceChannel>,
    pub samplers: Vec<SourceSampler>,
}

/// Everything the importer needs from a parsed scene file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneSource {
    pub nodes: Vec<SourceNode>,
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<Material>,
    pub skins: Vec<SourceSkin>,
    pub animations: Vec<SourceAnimation>,
    pub accessors: Vec<Accessor>,
    pub buffers: Vec<Vec<u8>>,
    /// Root nodes of each scene.
    pub scenes: Vec<Vec<usize>>,
}

impl SceneSource {
    pub fn accessor(&self, index: usize) -> Result<&Accessor, ImportError> {
        self.accessors.get(index).ok_or(ImportError::DanglingReference {
            kind: "accessor",
            index,
        })
    }

    pub fn node(&self, index: usize) -> Result<&SourceNode, ImportError> {
        self.nodes.get(index).ok_or(ImportError::DanglingReference {
            kind: "node",
            index,
        })
    }

    /// Every component of every element, flattened, as type `C`.
    ///
    /// `C` must match the accessor's component width; callers check the
    /// component type first.
    fn components<C: Pod>(&self, index: usize) -> Result<Vec<C>, ImportError> {
        let accessor = self.accessor(index)?;
        debug_assert_eq!(mem::size_of::<C>(), accessor.component_type.size());
        match accessor.storage {
            AccessorStorage::Buffer => {}
            AccessorStorage::Sparse => {
                return Err(ImportError::UnsupportedSparseAccessor { accessor: index });
            }
            AccessorStorage::Zeroed => {
                let len = accessor.count.checked_mul(accessor.components).ok_or(
                    ImportError::AccessorOutOfBounds {
                        accessor: index,
                        needed: usize::MAX,
                        available: 0,
                    },
                )?;
                return Ok(vec![C::zeroed(); len]);
            }
        }

        let bytes = self
            .buffers
            .get(accessor.buffer)
            .ok_or(ImportError::DanglingReference {
                kind: "buffer",
                index: accessor.buffer,
            })?;

        let width = mem::size_of::<C>();
        let element = width
            .checked_mul(accessor.components)
            .ok_or(ImportError::AccessorOutOfBounds {
                accessor: index,
                needed: usize::MAX,
                available: bytes.len(),
            })?;
        let stride = accessor.stride.unwrap_or(element);
        if stride < element {
            return Err(ImportError::InvalidStride {
                accessor: index,
                stride,
                element,
            });
        }
        let needed = match accessor.count {
            0 => Some(0),
            n => (n - 1)
                .checked_mul(stride)
                .and_then(|span| span.checked_add(accessor.offset))
                .and_then(|end| end.checked_add(element)),
        }
        .unwrap_or(usize::MAX);
        if needed > bytes.len() {
            return Err(ImportError::AccessorOutOfBounds {
                accessor: index,
                needed,
                available: bytes.len(),
            });
        }

        let mut out = Vec::with_capacity(accessor.count * accessor.components);
        for i in 0..accessor.count {
            let start = accessor.offset + i * stride;
            for k in 0..accessor.components {
                let at = start + k * width;
                out.push(bytemuck::pod_read_unaligned(&bytes[at..at + width]));
            }
        }
        Ok(out)
    }

    fn unsupported(&self, index: usize, usage: &'static str) -> ImportError {
        match self.accessors.get(index) {
            Some(accessor) => ImportError::UnsupportedComponentType {
                accessor: index,
                usage,
                component: accessor.component_type,
                dimensions: accessor.components,
            },
            None => ImportError::DanglingReference {
                kind: "accessor",
                index,
            },
        }
    }

    /// Components as `f32`, converting normalised integers.
    fn float_components(&self, index: usize, usage: &'static str) -> Result<Vec<f32>, ImportError> {
        let accessor = self.accessor(index)?;
        match (accessor.component_type, accessor.normalized) {
            (ComponentType::F32, _) => self.components::<f32>(index),
            (ComponentType::U8, true) => Ok(self
                .components::<u8>(index)?
                .into_iter()
                .map(|v| v as f32 / u8::MAX as f32)
                .collect()),
            (ComponentType::U16, true) => Ok(self
                .components::<u16>(index)?
                .into_iter()
                .map(|v| v as f32 / u16::MAX as f32)
                .collect()),
            _ => Err(self.unsupported(index, usage)),
        }
    }

    fn expect_components(
        &self,
        index: usize,
        components: usize,
        usage: &'static str,
    ) -> Result<(), ImportError> {
        if self.accessor(index)?.components != components {
            return Err(self.unsupported(index, usage));
        }
        Ok(())
    }

    /// `[f32; N]` elements, converting normalised integers.
    fn float_elements<const N: usize>(
        &self,
        index: usize,
        usage: &'static str,
    ) -> Result<Vec<[f32; N]>, ImportError> {
        self.expect_components(index, N, usage)?;
        let flat = self.float_components(index, usage)?;
        Ok(flat
            .chunks_exact(N)
            .map(|chunk| {
                let mut element = [0.0; N];
                element.copy_from_slice(chunk);
                element
            })
            .collect())
    }

    /// Scalar `f32` values. Only true floats are accepted.
    pub fn read_scalars(&self, index: usize, usage: &'static str) -> Result<Vec<f32>, ImportError> {
        let accessor = self.accessor(index)?;
        if accessor.component_type != ComponentType::F32 || accessor.components != 1 {
            return Err(self.unsupported(index, usage));
        }
        self.components::<f32>(index)
    }

    pub fn read_vec2(&self, index: usize, usage: &'static str) -> Result<Vec<[f32; 2]>, ImportError> {
        self.float_elements::<2>(index, usage)
    }

    pub fn read_vec3(&self, index: usize, usage: &'static str) -> Result<Vec<[f32; 3]>, ImportError> {
        self.float_elements::<3>(index, usage)
    }

    pub fn read_vec4(&self, index: usize, usage: &'static str) -> Result<Vec<[f32; 4]>, ImportError> {
        self.float_elements::<4>(index, usage)
    }

    pub fn read_mat4(&self, index: usize, usage: &'static str) -> Result<Vec<Mat4>, ImportError> {
        let accessor = self.accessor(index)?;
        if accessor.component_type != ComponentType::F32 {
            return Err(self.unsupported(index, usage));
        }
        let columns = self.float_elements::<16>(index, usage)?;
        Ok(columns.iter().map(Mat4::from_cols_array).collect())
    }

    /// Joint indices, widened to `u16`.
    pub fn read_joints(&self, index: usize) -> Result<Vec<[u16; 4]>, ImportError> {
        const USAGE: &str = "JOINTS_0";
        self.expect_components(index, 4, USAGE)?;
        let flat: Vec<u16> = match self.accessor(index)?.component_type {
            ComponentType::U8 => self
                .components::<u8>(index)?
                .into_iter()
                .map(u16::from)
                .collect(),
            ComponentType::U16 => self.components::<u16>(index)?,
            _ => return Err(self.unsupported(index, USAGE)),
        };
        Ok(flat
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect())
    }

    /// Index stream. `u8` widens to `u16`; `None` for any other type.
    pub fn read_indices(&self, index: usize) -> Result<Option<Indices>, ImportError> {
        let accessor = self.accessor(index)?;
        if accessor.components != 1 {
            return Err(self.unsupported(index, "indices"));
        }
        let indices = match accessor.component_type {
            ComponentType::U8 => Indices::U16(
                self.components::<u8>(index)?
                    .into_iter()
                    .map(u16::from)
                    .collect(),
            ),
            ComponentType::U16 => Indices::U16(self.components::<u16>(index)?),
            ComponentType::U32 => Indices::U32(self.components::<u32>(index)?),
            _ => return Ok(None),
        };
        Ok(Some(indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_with(bytes: Vec<u8>, accessor: Accessor) -> SceneSource {
        SceneSource {
            buffers: vec![bytes],
            accessors: vec![accessor],
            ..SceneSource::default()
        }
    }

    #[test]
    fn strided_vec3() {
        // Two vec3 positions interleaved with a 4-byte pad.
        let mut bytes = Vec::new();
        for value in [1.0f32, 2.0, 3.0, -1.0, 4.0, 5.0, 6.0, -1.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let mut accessor = Accessor::packed(0, 0, 2, ComponentType::F32, 3);
        accessor.stride = Some(16);
        let source = source_with(bytes, accessor);

        let values = source.read_vec3(0, "POSITION").unwrap();
        assert_eq!(values, vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn unaligned_offset() {
        let mut bytes = vec![0xAA];
        bytes.extend_from_slice(&2.5f32.to_le_bytes());
        let source = source_with(bytes, Accessor::packed(0, 1, 1, ComponentType::F32, 1));
        assert_eq!(source.read_scalars(0, "input").unwrap(), vec![2.5]);
    }

    #[test]
    fn normalized_u8_weights() {
        let mut accessor = Accessor::packed(0, 0, 1, ComponentType::U8, 4);
        accessor.normalized = true;
        let source = source_with(vec![255, 0, 0, 0], accessor);
        assert_eq!(source.read_vec4(0, "WEIGHTS_0").unwrap(), vec![[1.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn u8_indices_widen() {
        let source = source_with(vec![0, 1, 2], Accessor::packed(0, 0, 3, ComponentType::U8, 1));
        assert_eq!(source.read_indices(0).unwrap(), Some(Indices::U16(vec![0, 1, 2])));
    }

    #[test]
    fn signed_indices_unsupported() {
        let source = source_with(vec![0, 0], Accessor::packed(0, 0, 1, ComponentType::I16, 1));
        assert_eq!(source.read_indices(0).unwrap(), None);
    }

    #[test]
    fn u8_joints_widen() {
        let source = source_with(vec![3, 1, 0, 7], Accessor::packed(0, 0, 1, ComponentType::U8, 4));
        assert_eq!(source.read_joints(0).unwrap(), vec![[3, 1, 0, 7]]);
    }

    #[test]
    fn integer_positions_rejected() {
        let source = source_with(vec![0; 6], Accessor::packed(0, 0, 1, ComponentType::U16, 3));
        assert!(matches!(
            source.read_vec3(0, "POSITION"),
            Err(ImportError::UnsupportedComponentType {
                component: ComponentType::U16,
                dimensions: 3,
                ..
            })
        ));
    }

    #[test]
    fn out_of_bounds_detected() {
        let source = source_with(vec![0; 8], Accessor::packed(0, 0, 3, ComponentType::F32, 1));
        assert!(matches!(
            source.read_scalars(0, "input"),
            Err(ImportError::AccessorOutOfBounds { needed: 12, available: 8, .. })
        ));
    }

    #[test]
    fn sparse_rejected() {
        let mut accessor = Accessor::packed(0, 0, 1, ComponentType::F32, 1);
        accessor.storage = AccessorStorage::Sparse;
        let source = source_with(vec![0; 4], accessor);
        assert!(matches!(
            source.read_scalars(0, "input"),
            Err(ImportError::UnsupportedSparseAccessor { accessor: 0 })
        ));
    }

    #[test]
    fn zeroed_accessor_reads_zeros() {
        let mut accessor = Accessor::packed(0, 0, 2, ComponentType::F32, 3);
        accessor.storage = AccessorStorage::Zeroed;
        let source = source_with(Vec::new(), accessor);
        assert_eq!(source.read_vec3(0, "POSITION").unwrap(), vec![[0.0; 3]; 2]);
    }

    #[test]
    fn huge_count_is_out_of_bounds() {
        let mut accessor = Accessor::packed(0, 16, usize::MAX / 2, ComponentType::F32, 4);
        accessor.stride = Some(64);
        let source = source_with(vec![0; 64], accessor);
        assert!(matches!(
            source.read_vec4(0, "WEIGHTS_0"),
            Err(ImportError::AccessorOutOfBounds {
                needed: usize::MAX,
                available: 64,
                ..
            })
        ));
    }

    #[test]
    fn stride_below_element_rejected() {
        let mut accessor = Accessor::packed(0, 0, 4, ComponentType::F32, 3);
        accessor.stride = Some(0);
        let source = source_with(vec![0; 12], accessor);
        assert!(matches!(
            source.read_vec3(0, "NORMAL"),
            Err(ImportError::InvalidStride {
                stride: 0,
                element: 12,
                ..
            })
        ));
    }

    #[test]
    fn mat4_column_major() {
        let mut bytes = Vec::new();
        for value in Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)).to_cols_array() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let source = source_with(bytes, Accessor::packed(0, 0, 1, ComponentType::F32, 16));
        let matrices = source.read_mat4(0, "inverseBindMatrices").unwrap();
        assert_eq!(matrices[0].w_axis, crate::math::Vec4::new(1.0, 2.0, 3.0, 1.0));
    }
}
