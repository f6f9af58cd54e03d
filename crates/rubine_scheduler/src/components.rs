//! Components and relations the scheduler keeps in the store.
//!
//! A phase is an entity with a [`Phase`] component and either a
//! [`PhaseEvent`] (it runs when the event fires) or a [`DependsOn`] edge to
//! another phase (it runs right after that phase). A predecessor keeps its
//! dependents in declaration order in [`PhaseDependents`]. A system is an entity
//! with a [`SystemFn`], a [`SystemState`] run record and a [`DependsOn`]
//! edge to its phase.

use std::sync::Arc;

use rubine_world::{Component, Entity, Relation};

use crate::event::Event;
use crate::system::BoxedSystem;

pub use crate::system::SystemState;

/// Marks an entity as a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    /// Unique phase name.
    pub name: Arc<str>,
}

impl Component for Phase {}

/// Direct trigger of a root phase.
pub struct PhaseEvent<A: 'static>(pub Event<A>);

impl<A: 'static> Component for PhaseEvent<A> {}

/// Ordering edge: system to its phase, or phase to its predecessor phase.
pub struct DependsOn;

impl Relation for DependsOn {}

/// Phases depending on this phase, in the order their edges were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseDependents(pub Vec<Entity>);

impl Component for PhaseDependents {}

/// The callable of a system.
pub struct SystemFn<A: 'static>(pub BoxedSystem<A>);

impl<A: 'static> Component for SystemFn<A> {}

/// Run record replaced by the most recent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviousSystemState(pub SystemState);

impl Component for PreviousSystemState {}
