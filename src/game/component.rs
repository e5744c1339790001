//! Component Storage
//!
//! `ComponentStorage<T>` is a sparse array from entity index to component
//! data. Scenes hold at most a few hundred entities, so one `Vec<Option<T>>`
//! per component kind is enough and keeps presence checks trivial.

use super::entity::Entity;

/// Sparse storage for a single component type.
#[derive(Debug, Clone)]
pub struct ComponentStorage<T> {
    /// Indexed by entity.index()
    data: Vec<Option<T>>,
}

impl<T> ComponentStorage<T> {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    fn ensure_capacity(&mut self, index: usize) {
        if index >= self.data.len() {
            self.data.resize_with(index + 1, || None);
        }
    }

    /// Insert a component for an entity, replacing any existing one.
    pub fn insert(&mut self, entity: Entity, component: T) {
        let idx = entity.index() as usize;
        self.ensure_capacity(idx);
        self.data[idx] = Some(component);
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.data.get(entity.index() as usize).and_then(|opt| opt.as_ref())
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.data.get_mut(entity.index() as usize).and_then(|opt| opt.as_mut())
    }

    /// Iterate over all (entity, component) pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_ref().map(|c| (Entity::new(idx as u32), c)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, opt)| opt.as_mut().map(|c| (Entity::new(idx as u32), c)))
    }
}

impl<T> Default for ComponentStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}
