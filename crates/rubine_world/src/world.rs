//! In-memory [`Store`] implementation.

use core::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use crate::{Component, Entity, Relation, Store};

/// Type-erased component value.
type BoxedComponent = Box<dyn Any + Send + Sync>;

/// In-memory entity store.
///
/// Components are kept in one column per type, relations in one edge table
/// per kind. Columns are ordered maps keyed by [`Entity`] so iteration
/// follows creation order.
#[derive(Default)]
pub struct World {
    next_id: u64,
    alive: BTreeSet<Entity>,
    columns: HashMap<TypeId, BTreeMap<Entity, BoxedComponent>>,
    edges: HashMap<TypeId, BTreeMap<Entity, Entity>>,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alive.len()
    }

    /// Returns true if the world has no live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Iterates live entities in creation order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.alive.iter().copied()
    }
}

impl Store for World {
    fn create_entity(&mut self) -> Entity {
        let id = Entity(self.next_id);
        self.next_id += 1;
        self.alive.insert(id);
        id
    }

    fn contains(&self, id: Entity) -> bool {
        self.alive.contains(&id)
    }

    fn despawn(&mut self, id: Entity) -> bool {
        if !self.alive.remove(&id) {
            return false;
        }
        for column in self.columns.values_mut() {
            column.remove(&id);
        }
        for table in self.edges.values_mut() {
            table.remove(&id);
            table.retain(|_, target| *target != id);
        }
        true
    }

    fn set<C: Component>(&mut self, id: Entity, value: C) {
        if !self.alive.contains(&id) {
            return;
        }
        self.columns
            .entry(TypeId::of::<C>())
            .or_default()
            .insert(id, Box::new(value));
    }

    fn get<C: Component>(&self, id: Entity) -> Option<&C> {
        self.columns
            .get(&TypeId::of::<C>())?
            .get(&id)?
            .downcast_ref::<C>()
    }

    fn get_mut<C: Component>(&mut self, id: Entity) -> Option<&mut C> {
        self.columns
            .get_mut(&TypeId::of::<C>())?
            .get_mut(&id)?
            .downcast_mut::<C>()
    }

    fn remove<C: Component>(&mut self, id: Entity) -> Option<C> {
        let boxed = self.columns.get_mut(&TypeId::of::<C>())?.remove(&id)?;
        boxed.downcast::<C>().ok().map(|value| *value)
    }

    fn relate<R: Relation>(&mut self, id: Entity, target: Entity) {
        if !self.alive.contains(&id) || !self.alive.contains(&target) {
            return;
        }
        self.edges
            .entry(TypeId::of::<R>())
            .or_default()
            .insert(id, target);
    }

    fn target<R: Relation>(&self, id: Entity) -> Option<Entity> {
        self.edges.get(&TypeId::of::<R>())?.get(&id).copied()
    }

    fn query<C: Component>(&self) -> Vec<Entity> {
        self.columns
            .get(&TypeId::of::<C>())
            .map(|column| column.keys().copied().collect())
            .unwrap_or_default()
    }

    fn related<R: Relation>(&self, target: Entity) -> Vec<Entity> {
        self.edges
            .get(&TypeId::of::<R>())
            .map(|table| {
                table
                    .iter()
                    .filter(|(_, to)| **to == target)
                    .map(|(from, _)| *from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    struct Tagged;
    impl Component for Tagged {}

    struct DependsOn;
    impl Relation for DependsOn {}

    #[test]
    fn entities_are_allocated_in_order() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        assert!(a < b);
        assert_eq!(world.entities().collect::<Vec<_>>(), vec![a, b]);
    }

    #[test]
    fn set_get_and_replace_component() {
        let mut world = World::new();
        let e = world.create_entity();

        world.set(e, Health(10));
        assert_eq!(world.get::<Health>(e), Some(&Health(10)));

        world.set(e, Health(5));
        assert_eq!(world.get::<Health>(e), Some(&Health(5)));

        if let Some(health) = world.get_mut::<Health>(e) {
            health.0 += 1;
        }
        assert_eq!(world.remove::<Health>(e), Some(Health(6)));
        assert!(world.get::<Health>(e).is_none());
    }

    #[test]
    fn set_on_missing_entity_is_ignored() {
        let mut world = World::new();
        world.set(Entity::from_raw(42), Health(1));
        assert!(world.query::<Health>().is_empty());
    }

    #[test]
    fn query_returns_creation_order() {
        let mut world = World::new();
        let entities: Vec<_> = (0..5).map(|_| world.create_entity()).collect();
        for e in entities.iter().rev() {
            world.set(*e, Tagged);
        }
        assert_eq!(world.query::<Tagged>(), entities);
    }

    #[test]
    fn relate_replaces_previous_target() {
        let mut world = World::new();
        let a = world.create_entity();
        let b = world.create_entity();
        let c = world.create_entity();

        world.relate::<DependsOn>(a, b);
        world.relate::<DependsOn>(a, c);

        assert_eq!(world.target::<DependsOn>(a), Some(c));
        assert!(world.related::<DependsOn>(b).is_empty());
        assert_eq!(world.related::<DependsOn>(c), vec![a]);
    }

    #[test]
    fn despawn_removes_components_and_incoming_edges() {
        let mut world = World::new();
        let phase = world.create_entity();
        let system = world.create_entity();
        world.set(system, Health(3));
        world.relate::<DependsOn>(system, phase);

        assert!(world.despawn(phase));
        assert!(world.target::<DependsOn>(system).is_none());

        assert!(world.despawn(system));
        assert!(world.query::<Health>().is_empty());
        assert!(!world.despawn(system));
        assert!(world.is_empty());
    }
}
