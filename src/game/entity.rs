//! Entity Handles
//!
//! Entities are lightweight indices into the session world. A world is
//! built once per scene load and never despawns during play, so a plain
//! index is stable for the lifetime of the scene. Handles from a previous
//! scene are meaningless after a transition; the runtime drops them all
//! when it rebuilds the world.

/// A stable reference to an entity of the current scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    /// Index into component storage, equal to the declared position in the scene
    index: u32,
}

impl Entity {
    pub(crate) fn new(index: u32) -> Self {
        Self { index }
    }

    /// Get the index of this entity (for component array access).
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Hands out handles in declaration order.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn allocate(&mut self) -> Entity {
        let entity = Entity::new(self.next);
        self.next += 1;
        entity
    }

    pub fn count(&self) -> u32 {
        self.next
    }
}
