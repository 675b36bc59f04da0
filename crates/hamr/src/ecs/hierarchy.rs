//! # Transform Graph — Parent-Relative Matrices in One Pass
//!
//! Each entity has a local matrix (derived from its [`Transform`] when the
//! `TRANSFORM` bit is set) and a global matrix:
//!
//! - Roots: `global = local`.
//! - Children: `global = parent_global * local`.
//!
//! ## Why One Ascending Pass Is Enough
//!
//! Entities are created in pre-order, so a parent always sits at a lower index
//! than its children. Walking slots in ascending order therefore finishes every
//! parent's global matrix before any child reads it: no queue, no recursion, no
//! topological sort.
//!
//! ```text
//! index:   0        1          2          3
//!          root ◄── arm ◄──── hand       prop ──► (root)
//!          G0=L0    G1=G0*L1   G2=G1*L2   G3=G0*L3
//! ```
//!
//! [`EntityStore::set_parent`] refuses links that break the ordering, and the
//! pass checks it again in debug builds.
//!
//! [`Transform`]: crate::math::Transform

use crate::render::DrawConstants;

use super::component::ComponentMask;
use super::store::EntityStore;

/// Recompute local and global matrices for every live entity.
///
/// Call once per frame, after animation sampling and before skinning or
/// drawing. Entities with neither a transform nor a parent keep the matrix
/// already in their slot (identity after growth).
pub fn update_matrices(store: &mut EntityStore) {
    for slot in 0..store.capacity() {
        let mask = store.masks[slot];
        if !mask.contains(ComponentMask::ALLOCATED) {
            continue;
        }

        if mask.contains(ComponentMask::TRANSFORM) {
            store.local_matrices[slot] = store.transforms[slot].matrix();
        }

        let local = store.local_matrices[slot];
        store.global_matrices[slot] = if mask.contains(ComponentMask::PARENT) {
            let parent = store.parents[slot] as usize;
            debug_assert!(
                parent < slot,
                "parent {parent} must precede child {slot} in index order"
            );
            store.global_matrices[parent] * local
        } else {
            local
        };
    }
}

/// Refresh the draw constants of every live entity placed in the graph (with
/// a transform or a parent) from its global matrix.
///
/// Run after [`update_matrices`]. The model matrix is copied column-major and
/// the normal matrix is its inverse-transpose.
pub fn copy_draw_data(store: &mut EntityStore) {
    for slot in 0..store.capacity() {
        let mask = store.masks[slot];
        if mask.contains(ComponentMask::ALLOCATED)
            && mask.intersects(ComponentMask::TRANSFORM | ComponentMask::PARENT)
        {
            store.draw_constants[slot] = DrawConstants::from_model(store.global_matrices[slot]);
        }
    }
}
