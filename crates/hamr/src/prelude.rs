//! Convenience re-exports: `use hamr::prelude::*` brings in the common items.

pub use crate::animation::{Animation, Channel, Interpolation, PlaybackState};
pub use crate::config::{KeyframeLookup, SceneConfig};
pub use crate::ecs::{ComponentMask, Entity, EntityStore};
pub use crate::error::{ChannelError, ConfigError, ImportError};
pub use crate::import::import_scene;
pub use crate::import::source::SceneSource;
pub use crate::math::{Mat4, Quat, Transform, Vec3, Vec4};
pub use crate::render::{Drawable, DrawConstants, Material, MaterialHandle, MeshData, MeshHandle};
pub use crate::scene::Scene;
pub use crate::skin::{CpuJointBuffers, JointBufferSink, Skin, SkinId};

#[cfg(feature = "gltf")]
pub use crate::import::{import_gltf, import_gltf_slice};

#[cfg(feature = "wgpu")]
pub use crate::render::{GpuJointBuffers, JointBufferHandle};
