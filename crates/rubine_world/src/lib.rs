//! Entity, component and relation storage for Rubine (Layer 0).
//!
//! The scheduler never talks to a concrete storage layout. Everything it
//! needs from the entity-component runtime goes through the [`Store`]
//! capability trait:
//!
//! - [`Store::create_entity`] - allocate a fresh [`Entity`]
//! - [`Store::set`] / [`Store::get`] - attach and read a typed [`Component`]
//! - [`Store::relate`] - declare a directed [`Relation`] edge between two entities
//! - [`Store::query`] / [`Store::related`] - iterate entities by component or relation
//!
//! [`World`] is the in-memory implementation used by default.
//!
//! # Example
//!
//! ```
//! use rubine_world::{Component, Relation, Store, World};
//!
//! struct Position(f32);
//! impl Component for Position {}
//!
//! struct ChildOf;
//! impl Relation for ChildOf {}
//!
//! let mut world = World::new();
//! let parent = world.create_entity();
//! let child = world.create_entity();
//!
//! world.set(child, Position(1.0));
//! world.relate::<ChildOf>(child, parent);
//!
//! assert_eq!(world.target::<ChildOf>(child), Some(parent));
//! assert_eq!(world.related::<ChildOf>(parent), vec![child]);
//! assert_eq!(world.query::<Position>(), vec![child]);
//! ```

mod entity;
mod world;

pub use entity::Entity;
pub use world::World;

/// Marker trait for data that can be attached to an entity.
///
/// Zero-sized components act as tags.
pub trait Component: Send + Sync + 'static {}

/// Marker trait for relation kinds.
///
/// A relation is a directed edge from one entity to exactly one target.
/// Relating an entity again with the same kind replaces the previous target.
pub trait Relation: Send + Sync + 'static {}

/// Capability interface over an entity-component store.
///
/// Implementations must iterate entities in creation order: the scheduler
/// relies on it for registration-order execution.
pub trait Store: Send + 'static {
    /// Allocates a new, empty entity.
    fn create_entity(&mut self) -> Entity;

    /// Returns true if the entity exists.
    fn contains(&self, id: Entity) -> bool;

    /// Deletes an entity with all its components and outgoing relations.
    ///
    /// Relations pointing *to* the entity are removed as well. Returns
    /// `false` if the entity did not exist.
    fn despawn(&mut self, id: Entity) -> bool;

    /// Attaches a component, replacing any previous value of the same type.
    ///
    /// Does nothing if the entity does not exist.
    fn set<C: Component>(&mut self, id: Entity, value: C);

    /// Reads a component.
    fn get<C: Component>(&self, id: Entity) -> Option<&C>;

    /// Mutably reads a component.
    fn get_mut<C: Component>(&mut self, id: Entity) -> Option<&mut C>;

    /// Detaches a component, returning it.
    fn remove<C: Component>(&mut self, id: Entity) -> Option<C>;

    /// Declares `id -R-> target`. Replaces any existing `R` edge from `id`.
    fn relate<R: Relation>(&mut self, id: Entity, target: Entity);

    /// Returns the target of the `R` edge leaving `id`.
    fn target<R: Relation>(&self, id: Entity) -> Option<Entity>;

    /// Returns every entity carrying component `C`, in creation order.
    fn query<C: Component>(&self) -> Vec<Entity>;

    /// Returns every entity with an `R` edge pointing at `target`, in creation order.
    fn related<R: Relation>(&self, target: Entity) -> Vec<Entity>;
}
