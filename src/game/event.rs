//! Event System
//!
//! Systems communicate within a frame through queues instead of calling
//! each other. Collision detection sends `CollisionEvent`s that script
//! dispatch reads; host clicks are queued as `ClickEvent`s until the next
//! frame's script stage.
//!
//! Example flow:
//! 1. Collision system detects overlap → sends CollisionEvent
//! 2. Script stage reads CollisionEvent → calls onCollision on both entities

use super::entity::Entity;

/// A queue for events of a single type.
/// Events are collected during the frame and drained at specific points.
#[derive(Debug)]
pub struct EventQueue<T> {
    events: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Send an event (add to queue)
    pub fn send(&mut self, event: T) {
        self.events.push(event);
    }

    /// Take every queued event, leaving the queue empty
    pub fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.events)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Container for all simulation events.
#[derive(Debug, Default)]
pub struct Events {
    /// Overlapping collider pairs found this frame
    pub collision: EventQueue<CollisionEvent>,

    /// Pointer clicks in scene coordinates, waiting for the script stage
    pub click: EventQueue<ClickEvent>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear_all(&mut self) {
        self.collision.clear();
        self.click.clear();
    }
}

// =============================================================================
// Event Types
// =============================================================================

/// Two entities' colliders overlap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    /// Earlier entity in update order
    pub entity_a: Entity,
    pub entity_b: Entity,
}

/// The host reported a click
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEvent {
    pub x: f32,
    pub y: f32,
}
