//! Entity and component identifiers, and the identity-allocation service.
//!
//! Entities have no independent representation in the kernel: an [`EntityId`]
//! exists only as the shared `entity` field of a set of components. Component
//! ids are process-wide unique, monotonic, and never reused, even across
//! stash/restore or save/load.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An opaque, non-reused entity identifier.
///
/// Raw value 0 is the [`EntityId::INVALID`] sentinel; the store rejects
/// components that reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// The invalid-entity sentinel. Never owned by a live component.
    pub const INVALID: EntityId = EntityId(0);

    /// Construct an `EntityId` from a raw value.
    #[inline]
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Whether this id is a real entity reference (not the sentinel).
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentId
// ---------------------------------------------------------------------------

/// A process-wide unique component identifier.
///
/// Assigned by the store on first insertion and kept for the component's whole
/// life, including time spent in the stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Placeholder carried by components that have never been inserted.
    pub const UNASSIGNED: ComponentId = ComponentId(0);

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// IdAllocator
// ---------------------------------------------------------------------------

/// Monotonic id allocation with an explicit lifecycle.
///
/// Component ids are handed out by the store on insertion; entity ids may be
/// minted here or supplied by the caller. Ids minted by the allocator are
/// never reused. `reset` starts a new game; `export`/`import` carry the
/// counters through save/load so loaded worlds keep allocating past every
/// recorded id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdAllocator {
    next_component: u64,
    next_entity: u64,
}

/// Serializable allocator state for save/load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocatorState {
    /// The next component id that will be handed out.
    pub next_component: u64,
    /// The next entity id that will be handed out.
    pub next_entity: u64,
}

impl IdAllocator {
    /// Create a fresh allocator. Raw 0 is reserved for the sentinels.
    pub fn new() -> Self {
        Self {
            next_component: 1,
            next_entity: 1,
        }
    }

    /// Hand out the next component id.
    pub fn allocate_component(&mut self) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        id
    }

    /// Hand out the next entity id.
    pub fn allocate_entity(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    /// Restart both counters for a new game.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Capture the counters for a snapshot.
    pub fn export(&self) -> IdAllocatorState {
        IdAllocatorState {
            next_component: self.next_component,
            next_entity: self.next_entity,
        }
    }

    /// Replace the counters from a snapshot. Loading fully replaces in-memory
    /// state, so this is an exact import, not a merge.
    pub fn import(&mut self, state: IdAllocatorState) {
        self.next_component = state.next_component;
        self.next_entity = state.next_entity;
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
