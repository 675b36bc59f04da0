//! # Hamr — Scene and Animation Core
//!
//! The runtime half of a small real-time 3D engine: a data-oriented entity
//! store, a parent-relative transform graph, a keyframe animation sampler, and
//! a skin binder, fed by a glTF scene importer.
//!
//! Start with `use hamr::prelude::*`, load a [`Scene`](scene::Scene) with
//! [`import_gltf`](import::import_gltf), and call
//! [`Scene::update`](scene::Scene::update) once per frame.
//!
//! ## Features
//!
//! - `gltf` (default): the glTF/GLB adapter.
//! - `wgpu`: [`GpuJointBuffers`](render::GpuJointBuffers), a joint buffer sink
//!   backed by wgpu storage buffers.

pub mod animation;
pub mod config;
pub mod ecs;
pub mod error;
pub mod import;
pub mod math;
pub mod prelude;
pub mod render;
pub mod scene;
pub mod skin;
