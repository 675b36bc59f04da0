//! Error types.
//!
//! Only loading can fail. Once a scene is imported, the per-frame passes have
//! no error path: a broken invariant there is a bug in the importer and
//! panics with the offending index.

use thiserror::Error;

use crate::import::source::ComponentType;

/// Fatal scene load errors. A failed import never yields a partial scene.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("scene description has {count} scenes, only one is supported")]
    MultipleScenes { count: usize },

    #[error("scene description has no scene")]
    NoScene,

    #[error("node {node} is reachable twice from the scene roots")]
    NodeVisitedTwice { node: usize },

    #[error("mesh {mesh} primitive {primitive} is missing required attribute {attribute}")]
    MissingAttribute {
        mesh: usize,
        primitive: usize,
        attribute: &'static str,
    },

    #[error("mesh {mesh} primitive {primitive} has no index accessor")]
    MissingIndices { mesh: usize, primitive: usize },

    #[error("mesh {mesh} primitive {primitive} uses unsupported index type {component:?}")]
    UnsupportedIndexType {
        mesh: usize,
        primitive: usize,
        component: ComponentType,
    },

    #[error("accessor {accessor} ({usage}) has unsupported layout {component:?} x{dimensions}")]
    UnsupportedComponentType {
        accessor: usize,
        usage: &'static str,
        component: ComponentType,
        dimensions: usize,
    },

    #[error("accessor {accessor} is sparse, which is not supported")]
    UnsupportedSparseAccessor { accessor: usize },

    #[error("accessor {accessor} reads past the end of its buffer ({needed} bytes needed, {available} available)")]
    AccessorOutOfBounds {
        accessor: usize,
        needed: usize,
        available: usize,
    },

    #[error("accessor {accessor} has stride {stride}, smaller than its {element}-byte elements")]
    InvalidStride {
        accessor: usize,
        stride: usize,
        element: usize,
    },

    #[error("{kind} {index} does not exist")]
    DanglingReference { kind: &'static str, index: usize },

    #[error("node {node} is referenced but not part of the scene")]
    UnresolvedNode { node: usize },

    #[error("skin {skin} has {joints} joints but {matrices} inverse bind matrices")]
    InverseBindCountMismatch {
        skin: usize,
        joints: usize,
        matrices: usize,
    },

    #[error("animation {animation} channel {channel} has a non-float sampler")]
    NonFloatSampler { animation: usize, channel: usize },

    #[error("animation {animation} channel {channel}: {source}")]
    InvalidChannel {
        animation: usize,
        channel: usize,
        #[source]
        source: ChannelError,
    },

    #[error("invalid scene config: {0}")]
    Config(#[from] ConfigError),

    #[cfg(feature = "gltf")]
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
}

/// Keyframe data that breaks the channel invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("channel has no keyframes")]
    Empty,

    #[error("channel has {inputs} keyframe times but {outputs} values")]
    LengthMismatch { inputs: usize, outputs: usize },

    #[error("keyframe time at {index} does not increase ({previous} then {time})")]
    NotIncreasing {
        index: usize,
        previous: f32,
        time: f32,
    },

    #[error("keyframe time at {index} is not finite")]
    NonFiniteTime { index: usize },

    #[error("rotation keyframe {index} is not a unit quaternion")]
    NonUnitRotation { index: usize },
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("growth_block must be at least 1")]
    ZeroGrowthBlock,
}
