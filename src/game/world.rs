//! Session World
//!
//! The World is the runtime's private clone of one scene:
//! - Entity handles in declaration order, with id/name/layer/parent metadata
//! - Typed component storage for every component kind
//! - The update/draw order derived from the scene's layers
//!
//! It is built from a `Scene` on every scene load and thrown away on stop or
//! transition. Nothing in here points back into the caller's document.

use std::collections::HashMap;

use super::entity::{Entity, EntityAllocator};
use super::component::ComponentStorage;
use crate::project::{
    Animation, AudioSource, Collider, Interactable, Rigidbody, Scene, Script, Sprite, Text, Tilemap,
    Transform, Ui,
};

/// Identity of an entity within its scene
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMeta {
    pub id: String,
    pub name: String,
    /// Index into the scene's layer list, None for unlayered entities
    pub layer: Option<usize>,
    pub parent: Option<Entity>,
}

/// Read-only copy of an entity handed to scripts as `payload.other`
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub id: String,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub rotation: f32,
    pub is_trigger: bool,
    pub layer: i32,
}

/// Working state of the active scene.
pub struct World {
    entities: EntityAllocator,
    meta: Vec<EntityMeta>,
    by_id: HashMap<String, Entity>,
    /// Update and draw order
    order: Vec<Entity>,
    layer_visible: Vec<bool>,

    // =========================================================================
    // Components
    // =========================================================================

    /// Every entity has one; entities authored without a transform get the default
    pub transforms: ComponentStorage<Transform>,
    pub sprites: ComponentStorage<Sprite>,
    pub texts: ComponentStorage<Text>,
    pub colliders: ComponentStorage<Collider>,
    pub rigidbodies: ComponentStorage<Rigidbody>,
    pub scripts: ComponentStorage<Script>,
    pub audio_sources: ComponentStorage<AudioSource>,
    pub uis: ComponentStorage<Ui>,
    pub animations: ComponentStorage<Animation>,
    pub tilemaps: ComponentStorage<Tilemap>,
    pub interactables: ComponentStorage<Interactable>,
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityAllocator::new(),
            meta: Vec::new(),
            by_id: HashMap::new(),
            order: Vec::new(),
            layer_visible: Vec::new(),

            transforms: ComponentStorage::new(),
            sprites: ComponentStorage::new(),
            texts: ComponentStorage::new(),
            colliders: ComponentStorage::new(),
            rigidbodies: ComponentStorage::new(),
            scripts: ComponentStorage::new(),
            audio_sources: ComponentStorage::new(),
            uis: ComponentStorage::new(),
            animations: ComponentStorage::new(),
            tilemaps: ComponentStorage::new(),
            interactables: ComponentStorage::new(),
        }
    }

    /// Deep-clone a scene's entities into a fresh world.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut world = World::new();
        world.layer_visible = scene.layers.iter().map(|l| l.visible).collect();

        for doc in &scene.entities {
            let entity = world.entities.allocate();
            world.by_id.insert(doc.id.clone(), entity);
            world.meta.push(EntityMeta {
                id: doc.id.clone(),
                name: doc.name.clone(),
                layer: doc.layer_id.as_deref().and_then(|id| scene.layer_index(id)),
                parent: None,
            });

            let c = &doc.components;
            world.transforms.insert(entity, c.transform.unwrap_or_default());
            if let Some(v) = &c.sprite {
                world.sprites.insert(entity, v.clone());
            }
            if let Some(v) = &c.text {
                world.texts.insert(entity, v.clone());
            }
            if let Some(v) = &c.collider {
                world.colliders.insert(entity, v.clone());
            }
            if let Some(v) = c.rigidbody {
                world.rigidbodies.insert(entity, v);
            }
            if let Some(v) = &c.script {
                world.scripts.insert(entity, v.clone());
            }
            if let Some(v) = &c.audio_source {
                world.audio_sources.insert(entity, v.clone());
            }
            if let Some(v) = &c.ui {
                world.uis.insert(entity, v.clone());
            }
            if let Some(v) = &c.animation {
                world.animations.insert(entity, v.clone());
            }
            if let Some(v) = &c.tilemap {
                world.tilemaps.insert(entity, v.clone());
            }
            if let Some(v) = &doc.interactable {
                world.interactables.insert(entity, v.clone());
            }
        }

        // Parents resolve once every id is known
        for (idx, doc) in scene.entities.iter().enumerate() {
            let parent = doc.parent_id.as_deref().and_then(|id| world.by_id.get(id).copied());
            world.meta[idx].parent = parent;
        }

        let unlayered = world.all().filter(|e| world.meta(*e).layer.is_none());
        let mut order: Vec<Entity> = unlayered.collect();
        for layer in 0..scene.layers.len() {
            order.extend(world.all().filter(|e| world.meta(*e).layer == Some(layer)));
        }
        world.order = order;
        world
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// All entities in declaration order
    pub fn all(&self) -> impl Iterator<Item = Entity> {
        (0..self.entities.count()).map(Entity::new)
    }

    /// Entities in update/draw order: unlayered first, then layer by layer
    pub fn ordered(&self) -> &[Entity] {
        &self.order
    }

    pub fn entity_count(&self) -> u32 {
        self.entities.count()
    }

    pub fn find(&self, id: &str) -> Option<Entity> {
        self.by_id.get(id).copied()
    }

    /// Metadata of a live entity.
    ///
    /// Handles only come from this world, so an index past the end is a
    /// programming error.
    pub fn meta(&self, entity: Entity) -> &EntityMeta {
        &self.meta[entity.index() as usize]
    }

    pub fn id(&self, entity: Entity) -> &str {
        &self.meta(entity).id
    }

    /// Whether the entity's layer is shown (unlayered entities always are)
    pub fn layer_visible(&self, entity: Entity) -> bool {
        match self.meta(entity).layer {
            Some(layer) => self.layer_visible.get(layer).copied().unwrap_or(true),
            None => true,
        }
    }

    /// Whether the entity is drawn and can be clicked
    pub fn is_shown(&self, entity: Entity) -> bool {
        self.layer_visible(entity) && self.uis.get(entity).map(|ui| ui.visible).unwrap_or(true)
    }

    pub fn snapshot(&self, entity: Entity) -> EntitySnapshot {
        let meta = self.meta(entity);
        let t = self.transforms.get(entity).copied().unwrap_or_default();
        let collider = self.colliders.get(entity);
        EntitySnapshot {
            id: meta.id.clone(),
            name: meta.name.clone(),
            x: t.x,
            y: t.y,
            w: t.w,
            h: t.h,
            rotation: t.rotation,
            is_trigger: collider.map(|c| c.is_trigger).unwrap_or(false),
            layer: collider.map(|c| c.layer).unwrap_or(0),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Translate an entity; entities without a transform are left alone
    pub fn move_by(&mut self, entity: Entity, dx: f32, dy: f32) {
        if let Some(t) = self.transforms.get_mut(entity) {
            t.x += dx;
            t.y += dy;
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
