//! # Component — Fixed Columns, Presence Bits, and Type-Erased Views
//!
//! Every component kind is a plain `Vec<T>` column in the
//! [`EntityStore`](super::store::EntityStore), all sized to the same capacity
//! and grown together. Which columns hold meaningful data for a given entity is
//! recorded in its [`ComponentMask`]: presence bits stand in for dynamic
//! typing.
//!
//! ## Uniform Iteration
//!
//! Growth and diagnostics need to visit every column without knowing its
//! element type. [`ComponentKind::ALL`] lists the columns in a fixed order, and
//! each column is reachable as a `&dyn Column`:
//!
//! ```text
//! ComponentKind::ALL[i] ──► store.column_dyn(kind) ──► &dyn Column
//!                                                       ├─ element_size()
//!                                                       ├─ len()
//!                                                       ├─ grow(new_len)
//!                                                       └─ as_any() ──► &Vec<T>
//! ```
//!
//! ## Comparison
//!
//! - **hecs / bevy_ecs**: `BlobVec` with a runtime `Layout` per column.
//! - **hamr**: the column set is closed and known at compile time, so each
//!   column stays a typed `Vec<T>`; the trait object is only a view.

use std::any::Any;
use std::mem;

use bitflags::bitflags;

bitflags! {
    /// Per-entity presence bits. A column's slot is only read by a system
    /// when the matching bit is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentMask: u32 {
        const ALLOCATED = 1 << 0;
        const PARENT = 1 << 1;
        const SKIN = 1 << 2;
        const MESH = 1 << 3;
        const TRANSFORM = 1 << 4;
        const MATERIAL = 1 << 5;
    }
}

impl Default for ComponentMask {
    fn default() -> Self {
        Self::empty()
    }
}

/// The fixed, ordered set of component columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Masks,
    Generations,
    Parents,
    Skins,
    Meshes,
    Materials,
    Transforms,
    LocalMatrices,
    GlobalMatrices,
    FreeLinks,
    DrawConstants,
}

impl ComponentKind {
    /// Every column, in storage order.
    pub const ALL: [ComponentKind; 11] = [
        ComponentKind::Masks,
        ComponentKind::Generations,
        ComponentKind::Parents,
        ComponentKind::Skins,
        ComponentKind::Meshes,
        ComponentKind::Materials,
        ComponentKind::Transforms,
        ComponentKind::LocalMatrices,
        ComponentKind::GlobalMatrices,
        ComponentKind::FreeLinks,
        ComponentKind::DrawConstants,
    ];

    /// Number of component columns.
    pub const COUNT: usize = Self::ALL.len();

    /// Look up a column kind by its position in [`ComponentKind::ALL`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Human-readable column name.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Masks => "masks",
            ComponentKind::Generations => "generations",
            ComponentKind::Parents => "parents",
            ComponentKind::Skins => "skins",
            ComponentKind::Meshes => "meshes",
            ComponentKind::Materials => "materials",
            ComponentKind::Transforms => "transforms",
            ComponentKind::LocalMatrices => "local_matrices",
            ComponentKind::GlobalMatrices => "global_matrices",
            ComponentKind::FreeLinks => "free_links",
            ComponentKind::DrawConstants => "draw_constants",
        }
    }
}

/// Free-list link threaded through unallocated slots.
///
/// Allocated slots always hold `FreeLink::default()` (no neighbours).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreeLink {
    pub prev: Option<u32>,
    pub next: Option<u32>,
}

/// A type-erased view of one component column.
pub trait Column: Any {
    /// Size in bytes of one element.
    fn element_size(&self) -> usize;

    /// Number of slots (always equal to the store capacity).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resize to `new_len`, filling new slots with the element's default
    /// (zero for integers and masks, identity for matrices).
    fn grow(&mut self, new_len: usize);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Default + Clone + 'static> Column for Vec<T> {
    fn element_size(&self) -> usize {
        mem::size_of::<T>()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn grow(&mut self, new_len: usize) {
        debug_assert!(new_len >= Vec::len(self), "columns never shrink");
        self.resize(new_len, T::default());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Mat4;

    #[test]
    fn kinds_are_indexed_in_order() {
        for (i, kind) in ComponentKind::ALL.iter().enumerate() {
            assert_eq!(ComponentKind::from_index(i), Some(*kind));
        }
        assert_eq!(ComponentKind::from_index(ComponentKind::COUNT), None);
    }

    #[test]
    fn grow_fills_with_defaults() {
        let mut col: Vec<u32> = vec![7, 8];
        Column::grow(&mut col, 5);
        assert_eq!(col, vec![7, 8, 0, 0, 0]);

        let mut matrices: Vec<Mat4> = Vec::new();
        Column::grow(&mut matrices, 2);
        assert_eq!(matrices, vec![Mat4::IDENTITY; 2]);
    }

    #[test]
    fn downcast_through_any() {
        let col: Vec<ComponentMask> = vec![ComponentMask::ALLOCATED | ComponentMask::MESH];
        let erased: &dyn Column = &col;
        assert_eq!(erased.element_size(), 4);
        assert_eq!(erased.len(), 1);
        let typed = erased.as_any().downcast_ref::<Vec<ComponentMask>>().unwrap();
        assert!(typed[0].contains(ComponentMask::MESH));
        assert!(erased.as_any().downcast_ref::<Vec<u64>>().is_none());
    }

    #[test]
    fn default_mask_is_empty() {
        assert!(ComponentMask::default().is_empty());
        assert_eq!(FreeLink::default(), FreeLink { prev: None, next: None });
    }
}
