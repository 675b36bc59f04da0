//! # Entity — Lightweight Handles into the Component Columns
//!
//! An [`Entity`] is just a number. It doesn't "contain" anything; it indexes
//! every column of the [`EntityStore`](super::store::EntityStore) uniformly.
//!
//! ## Design: Generational Indices
//!
//! Slots are recycled through the store's free list, so a bare index can
//! outlive the entity it named:
//!
//! ```text
//! 1. Create entity #5
//! 2. Store a reference: saved = Entity(5)
//! 3. Destroy entity #5
//! 4. Create a new entity, which gets recycled slot #5
//! 5. Use `saved`: it now refers to the wrong entity!
//! ```
//!
//! The fix: pair each index with a **generation** counter. When a slot is
//! destroyed, its generation increments. Any stale handle with an old
//! generation is detected as invalid.
//!
//! ```text
//! Entity { index: 5, generation: 0 }  ← first use
//! Entity { index: 5, generation: 1 }  ← after recycle
//! ```
//!
//! Handles also survive column growth: they are plain values, never pointers
//! into the columns, so reallocating every column on growth cannot dangle them.

use std::fmt;

/// A lightweight handle to an entity in an
/// [`EntityStore`](super::store::EntityStore).
///
/// Entities are created via
/// [`EntityStore::create_entity`](super::store::EntityStore::create_entity).
/// An `Entity` is only valid for the store that created it, and only while its
/// generation matches.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    /// Slot index into every component column.
    pub(crate) index: u32,
    /// Generation counter, bumped each time the slot is destroyed.
    pub(crate) generation: u32,
}

impl Entity {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the raw slot index.
    pub fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation. Useful for diagnostics.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Slot index as a `usize`, for indexing columns.
    pub(crate) fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        let e = Entity::new(7, 2);
        assert_eq!(format!("{e:?}"), "Entity(7v2)");
        assert_eq!(e.to_string(), "7v2");
    }

    #[test]
    fn generation_distinguishes_handles() {
        let a = Entity::new(3, 0);
        let b = Entity::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a.index(), b.index());
        assert_eq!(a.slot(), 3);
    }
}
