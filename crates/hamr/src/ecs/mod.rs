//! # Data-Oriented Entity Store
//!
//! A structure-of-arrays entity table in the style of classic engine
//! registries: every component kind is one column, an entity is a slot index
//! into all of them, and presence bits say which columns are meaningful.
//!
//! ## Module Overview
//!
//! - [`entity`]: Generational entity handles
//! - [`component`]: Presence bits, column kinds, and the type-erased `Column` view
//! - [`store`]: The column table and its free-list allocator
//! - [`hierarchy`]: Local/global matrix evaluation and draw-data copy

pub mod component;
pub mod entity;
pub mod hierarchy;
pub mod store;

pub use component::{Column, ComponentKind, ComponentMask};
pub use entity::Entity;
pub use hierarchy::{copy_draw_data, update_matrices};
pub use store::{DEFAULT_GROWTH_BLOCK, EntityStore};
