//! Phase registry and system table.
//!
//! [`Scheduler`] is a cheap-to-clone handle over shared state. All phase and
//! system data lives in the injected [`Store`]; the scheduler only keeps a
//! name index for phases, the hook registry and the live event
//! subscriptions.
//!
//! No lock is held while a system, a hook or an event subscription runs, so
//! any of them may call back into the scheduler.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::AtomicBool;
use std::sync::{Arc, Weak};

use crossbeam_channel::Receiver;
use hashbrown::HashMap;
use parking_lot::Mutex;
use rubine_world::{Entity, Store, World};

use crate::clock::Clock;
use crate::components::{
    DependsOn, Phase, PhaseDependents, PhaseEvent, PreviousSystemState, SystemFn,
};
use crate::error::SchedulerError;
use crate::event::{Event, EventShape, ManualEvent, Subscription};
use crate::hooks::{DEFAULT_DIAGNOSTICS_CAPACITY, HookFailure, HooksAPI, SystemEvent};
use crate::system::{BoxedSystem, IntoSystem, System, SystemState};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduler configuration.
///
/// # Example
///
/// ```
/// use rubine_scheduler::{Scheduler, SchedulerConfig};
/// use rubine_world::World;
///
/// let scheduler: Scheduler<f64> = Scheduler::with_config(
///     World::new(),
///     SchedulerConfig::new().with_diagnostics_capacity(8),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    clock: Clock,
    diagnostics_capacity: usize,
}

impl SchedulerConfig {
    /// Creates the default configuration: system clock, 64 buffered hook
    /// failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clock used for run-record timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Sets how many unread hook failures the diagnostics channel keeps.
    #[must_use]
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Returns the configured clock.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Returns the diagnostics channel capacity.
    #[must_use]
    pub fn diagnostics_capacity(&self) -> usize {
        self.diagnostics_capacity
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            clock: Clock::system(),
            diagnostics_capacity: DEFAULT_DIAGNOSTICS_CAPACITY,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Triggers and references
// ─────────────────────────────────────────────────────────────────────────────

/// What makes a phase run.
pub enum PhaseTrigger<A: 'static> {
    /// Run whenever the event fires.
    Event(Event<A>),
    /// Run right after the given phase, in the same cycle.
    After(Entity),
}

impl<A: 'static> From<Event<A>> for PhaseTrigger<A> {
    fn from(event: Event<A>) -> Self {
        PhaseTrigger::Event(event)
    }
}

impl<A: 'static> From<&Event<A>> for PhaseTrigger<A> {
    fn from(event: &Event<A>) -> Self {
        PhaseTrigger::Event(event.clone())
    }
}

impl<A: 'static> From<&ManualEvent<A>> for PhaseTrigger<A> {
    fn from(event: &ManualEvent<A>) -> Self {
        PhaseTrigger::Event(event.event())
    }
}

impl<A: 'static> From<Entity> for PhaseTrigger<A> {
    fn from(phase: Entity) -> Self {
        PhaseTrigger::After(phase)
    }
}

/// Current binding of a phase, as reported by
/// [`Scheduler::phase_binding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseBinding {
    /// Bound to an event of the given shape.
    Event(EventShape),
    /// Runs after the given phase.
    After(Entity),
    /// Created by [`Scheduler::on`] and never bound; it never runs.
    Unbound,
}

/// A system, by identity or by name.
///
/// A name refers to the earliest registered system carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SystemRef {
    /// The system's entity.
    Id(Entity),
    /// The system's name.
    Name(Arc<str>),
}

impl From<Entity> for SystemRef {
    fn from(id: Entity) -> Self {
        SystemRef::Id(id)
    }
}

impl From<&str> for SystemRef {
    fn from(name: &str) -> Self {
        SystemRef::Name(Arc::from(name))
    }
}

impl From<String> for SystemRef {
    fn from(name: String) -> Self {
        SystemRef::Name(Arc::from(name))
    }
}

impl From<Arc<str>> for SystemRef {
    fn from(name: Arc<str>) -> Self {
        SystemRef::Name(name)
    }
}

impl fmt::Display for SystemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemRef::Id(id) => write!(f, "{id}"),
            SystemRef::Name(name) => write!(f, "'{name}'"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Tables<S> {
    pub(crate) store: S,
    pub(crate) phases: HashMap<Arc<str>, Entity>,
}

#[derive(Default)]
pub(crate) struct RunState {
    /// Systems currently executing, innermost last.
    pub(crate) running: Vec<Entity>,
    /// Removals requested while the system was running.
    pub(crate) pending_removals: Vec<Entity>,
}

pub(crate) struct Inner<A: 'static, S> {
    pub(crate) tables: Mutex<Tables<S>>,
    pub(crate) hooks: HooksAPI,
    pub(crate) clock: Clock,
    pub(crate) started: AtomicBool,
    pub(crate) subscriptions: Mutex<Vec<(Entity, Subscription)>>,
    pub(crate) run: Mutex<RunState>,
    _args: PhantomData<fn(&A)>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Phase-based system scheduler.
///
/// `A` is the argument type the triggers deliver to systems; `S` is the
/// backing store.
///
/// # Example
///
/// ```
/// use rubine_scheduler::Scheduler;
/// use rubine_scheduler::event::ManualEvent;
///
/// let heartbeat = ManualEvent::<f64>::new();
/// let scheduler = Scheduler::<f64>::new();
///
/// let pre_update = scheduler.phase("PreUpdate", &heartbeat).unwrap();
/// scheduler.phase("Update", pre_update).unwrap();
///
/// scheduler.on("PreUpdate", |dt: &f64| println!("input {dt}"));
/// scheduler.on("Update", |dt: &f64| println!("physics {dt}"));
///
/// scheduler.start();
/// heartbeat.fire(&0.016);
/// ```
pub struct Scheduler<A: 'static = (), S: Store = World> {
    pub(crate) inner: Arc<Inner<A, S>>,
}

impl<A: 'static, S: Store> Clone for Scheduler<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Scheduler`].
///
/// Systems that need to read their own scheduler hold one of these, so the
/// scheduler does not keep itself alive.
pub struct WeakScheduler<A: 'static = (), S: Store = World> {
    inner: Weak<Inner<A, S>>,
}

impl<A: 'static, S: Store> WeakScheduler<A, S> {
    /// Returns the scheduler if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Scheduler<A, S>> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

impl<A: 'static, S: Store> Clone for WeakScheduler<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<A: 'static, S: Store> fmt::Debug for WeakScheduler<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakScheduler")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<A: 'static, S: Store> fmt::Debug for Scheduler<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("started", &self.is_started())
            .field("phases", &self.inner.tables.lock().phases.len())
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}

impl<A: 'static> Scheduler<A, World> {
    /// Creates a scheduler over a fresh [`World`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(World::new(), SchedulerConfig::default())
    }
}

impl<A: 'static> Default for Scheduler<A, World> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static, S: Store> Scheduler<A, S> {
    /// Creates a scheduler over `store` with the default configuration.
    #[must_use]
    pub fn from_store(store: S) -> Self {
        Self::with_config(store, SchedulerConfig::default())
    }

    /// Creates a scheduler over `store`.
    #[must_use]
    pub fn with_config(store: S, config: SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables {
                    store,
                    phases: HashMap::new(),
                }),
                hooks: HooksAPI::with_diagnostics_capacity(config.diagnostics_capacity),
                clock: config.clock,
                started: AtomicBool::new(false),
                subscriptions: Mutex::new(Vec::new()),
                run: Mutex::new(RunState::default()),
                _args: PhantomData,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Phases
    // ─────────────────────────────────────────────────────────────────────

    /// Creates or looks up the phase `name`.
    ///
    /// With an event trigger the phase runs whenever the event fires (once
    /// the scheduler is started). With a phase trigger it runs right after
    /// that phase, in the same cycle. Asking again with the same binding
    /// returns the same phase; a phase created unbound by [`on`](Self::on)
    /// takes the first binding it is given.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::PhaseRedefinition`] if `name` is bound differently
    /// - [`SchedulerError::UnknownPhase`] if the dependency is not a phase
    /// - [`SchedulerError::DependencyCycle`] if the dependency runs after `name`
    pub fn phase(
        &self,
        name: &str,
        trigger: impl Into<PhaseTrigger<A>>,
    ) -> Result<Entity, SchedulerError> {
        let trigger = trigger.into();
        let (id, connect) = {
            let mut guard = self.inner.tables.lock();
            let tables = &mut *guard;

            if let PhaseTrigger::After(after) = &trigger
                && tables.store.get::<Phase>(*after).is_none()
            {
                return Err(SchedulerError::UnknownPhase { entity: *after });
            }

            let id = match tables.phases.get(name).copied() {
                Some(id) => {
                    match binding_of::<A, S>(&tables.store, id) {
                        PhaseBinding::Unbound => {}
                        _ if is_same_binding(&tables.store, id, &trigger) => return Ok(id),
                        _ => {
                            return Err(SchedulerError::PhaseRedefinition {
                                name: name.to_owned(),
                            });
                        }
                    }
                    id
                }
                None => create_phase(tables, name),
            };

            let connect = match trigger {
                PhaseTrigger::Event(event) => {
                    tables.store.set(id, PhaseEvent(event.clone()));
                    Some(event)
                }
                PhaseTrigger::After(after) => {
                    if runs_after(&tables.store, after, id) {
                        return Err(SchedulerError::DependencyCycle {
                            name: name.to_owned(),
                            after,
                        });
                    }
                    tables.store.relate::<DependsOn>(id, after);
                    match tables.store.get_mut::<PhaseDependents>(after) {
                        Some(PhaseDependents(list)) => list.push(id),
                        None => tables.store.set(after, PhaseDependents(vec![id])),
                    }
                    None
                }
            };
            (id, connect)
        };

        tracing::debug!(phase = name, %id, "phase bound");
        if let Some(event) = connect
            && self.is_started()
        {
            self.connect_phase(id, &event);
        }
        Ok(id)
    }

    /// Returns the phase called `name`, if any.
    #[must_use]
    pub fn phase_named(&self, name: &str) -> Option<Entity> {
        self.inner.tables.lock().phases.get(name).copied()
    }

    /// Returns the name of a phase.
    #[must_use]
    pub fn phase_name(&self, phase: Entity) -> Option<Arc<str>> {
        let tables = self.inner.tables.lock();
        tables.store.get::<Phase>(phase).map(|p| Arc::clone(&p.name))
    }

    /// Returns how a phase is bound, or `None` if `phase` is not a phase.
    #[must_use]
    pub fn phase_binding(&self, phase: Entity) -> Option<PhaseBinding> {
        let tables = self.inner.tables.lock();
        tables.store.get::<Phase>(phase)?;
        Some(binding_of::<A, S>(&tables.store, phase))
    }

    /// Returns every phase, in creation order.
    #[must_use]
    pub fn phases(&self) -> Vec<Entity> {
        self.inner.tables.lock().store.query::<Phase>()
    }

    /// Returns the phases that run right after `phase`, in declaration order.
    #[must_use]
    pub fn dependents_of(&self, phase: Entity) -> Vec<Entity> {
        let tables = self.inner.tables.lock();
        dependents(&tables.store, phase)
    }

    /// Returns the systems of `phase`, in registration order.
    #[must_use]
    pub fn systems_in(&self, phase: Entity) -> Vec<Entity> {
        let tables = self.inner.tables.lock();
        systems_of::<A, S>(&tables.store, phase)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Systems
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a system at the end of phase `phase`.
    ///
    /// An unknown phase name creates an unbound phase that starts running
    /// once [`phase`](Self::phase) binds it.
    pub fn on<M>(&self, phase: &str, system: impl IntoSystem<A, M>) -> Entity {
        let system = system.into_system();
        let name = system.name();
        self.add_system(phase, name, Arc::new(system))
    }

    /// Registers a system under an explicit name.
    pub fn on_named<M>(
        &self,
        phase: &str,
        name: impl Into<Arc<str>>,
        system: impl IntoSystem<A, M>,
    ) -> Entity {
        self.add_system(phase, name, Arc::new(system.into_system()))
    }

    /// Registers an already boxed system.
    pub fn add_system(
        &self,
        phase: &str,
        name: impl Into<Arc<str>>,
        system: BoxedSystem<A>,
    ) -> Entity {
        let name = name.into();
        let state = SystemState::new(Arc::clone(&name));
        let (id, phase_id) = {
            let mut guard = self.inner.tables.lock();
            let tables = &mut *guard;
            let phase_id = match tables.phases.get(phase) {
                Some(id) => *id,
                None => create_phase(tables, phase),
            };
            let id = tables.store.create_entity();
            tables.store.set(id, SystemFn(system));
            tables.store.set(id, state.clone());
            tables.store.relate::<DependsOn>(id, phase_id);
            (id, phase_id)
        };

        tracing::debug!(system = %name, %id, phase, "system added");
        self.inner.hooks.invoke(&SystemEvent::SystemAdd {
            system: id,
            name,
            phase: phase_id,
            state,
        });
        id
    }

    /// Resolves a system reference. Returns `None` for unknown systems.
    #[must_use]
    pub fn system(&self, system: impl Into<SystemRef>) -> Option<Entity> {
        let tables = self.inner.tables.lock();
        resolve::<S>(&tables.store, &system.into())
    }

    /// Returns the phase a system belongs to.
    #[must_use]
    pub fn phase_of(&self, system: Entity) -> Option<Entity> {
        let tables = self.inner.tables.lock();
        tables.store.get::<SystemState>(system)?;
        tables.store.target::<DependsOn>(system)
    }

    /// Returns every system, in registration order.
    #[must_use]
    pub fn systems(&self) -> Vec<Entity> {
        self.inner.tables.lock().store.query::<SystemState>()
    }

    /// Returns the current run record of a system.
    #[must_use]
    pub fn system_state(&self, system: Entity) -> Option<SystemState> {
        self.inner
            .tables
            .lock()
            .store
            .get::<SystemState>(system)
            .cloned()
    }

    /// Returns the run record the last run replaced.
    #[must_use]
    pub fn previous_state(&self, system: Entity) -> Option<SystemState> {
        self.inner
            .tables
            .lock()
            .store
            .get::<PreviousSystemState>(system)
            .map(|p| p.0.clone())
    }

    /// Pauses a system. Returns false if the system does not exist.
    ///
    /// The system stays registered and keeps its records.
    pub fn pause(&self, system: impl Into<SystemRef>) -> bool {
        self.set_paused(&system.into(), true)
    }

    /// Unpauses a system. Returns false if the system does not exist.
    pub fn unpause(&self, system: impl Into<SystemRef>) -> bool {
        self.set_paused(&system.into(), false)
    }

    fn set_paused(&self, system: &SystemRef, paused: bool) -> bool {
        let event = {
            let mut tables = self.inner.tables.lock();
            let Some(id) = resolve::<S>(&tables.store, system) else {
                tracing::debug!(%system, paused, "pause toggle on unknown system ignored");
                return false;
            };
            let Some(state) = tables.store.get_mut::<SystemState>(id) else {
                return false;
            };
            if state.paused == paused {
                return true;
            }
            let previous = state.clone();
            state.paused = paused;
            SystemEvent::SystemChange {
                system: id,
                state: state.clone(),
                previous,
            }
        };

        tracing::debug!(%system, paused, "system pause toggled");
        self.inner.hooks.invoke(&event);
        true
    }

    /// Removes a system. Returns false if the system does not exist.
    ///
    /// A system removed while it is running is removed once its run
    /// completes. Removal hooks fire exactly once.
    pub fn remove(&self, system: impl Into<SystemRef>) -> bool {
        let system = system.into();
        let Some(id) = self.system(system.clone()) else {
            tracing::debug!(%system, "remove on unknown system ignored");
            return false;
        };

        {
            let mut run = self.inner.run.lock();
            if run.running.contains(&id) {
                if !run.pending_removals.contains(&id) {
                    tracing::debug!(%id, "removal deferred until run completes");
                    run.pending_removals.push(id);
                }
                return true;
            }
        }

        self.despawn_system(id)
    }

    pub(crate) fn despawn_system(&self, id: Entity) -> bool {
        let name = {
            let mut tables = self.inner.tables.lock();
            let Some(state) = tables.store.get::<SystemState>(id) else {
                return false;
            };
            let name = Arc::clone(&state.name);
            tables.store.despawn(id);
            name
        };

        tracing::debug!(system = %name, %id, "system removed");
        self.inner
            .hooks
            .invoke(&SystemEvent::SystemRemove { system: id, name });
        true
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the hook registry.
    #[must_use]
    pub fn hooks(&self) -> &HooksAPI {
        &self.inner.hooks
    }

    /// Returns a receiver for hook failures.
    #[must_use]
    pub fn diagnostics(&self) -> Receiver<HookFailure> {
        self.inner.hooks.diagnostics()
    }

    /// Returns the clock used for run records.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// Runs `f` with shared access to the store.
    ///
    /// Must not call back into the scheduler.
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.tables.lock().store)
    }

    /// Runs `f` with exclusive access to the store.
    ///
    /// Must not call back into the scheduler.
    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.tables.lock().store)
    }

    /// Returns a non-owning handle to this scheduler.
    #[must_use]
    pub fn downgrade(&self) -> WeakScheduler<A, S> {
        WeakScheduler {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store helpers
// ─────────────────────────────────────────────────────────────────────────────

fn create_phase<S: Store>(tables: &mut Tables<S>, name: &str) -> Entity {
    let name: Arc<str> = Arc::from(name);
    let id = tables.store.create_entity();
    tables.store.set(
        id,
        Phase {
            name: Arc::clone(&name),
        },
    );
    tables.phases.insert(name, id);
    id
}

fn binding_of<A: 'static, S: Store>(store: &S, phase: Entity) -> PhaseBinding {
    if let Some(PhaseEvent(event)) = store.get::<PhaseEvent<A>>(phase) {
        return PhaseBinding::Event(event.shape());
    }
    match store.target::<DependsOn>(phase) {
        Some(after) => PhaseBinding::After(after),
        None => PhaseBinding::Unbound,
    }
}

fn is_same_binding<A: 'static, S: Store>(store: &S, phase: Entity, trigger: &PhaseTrigger<A>) -> bool {
    match trigger {
        PhaseTrigger::Event(event) => store
            .get::<PhaseEvent<A>>(phase)
            .is_some_and(|PhaseEvent(current)| current.same_source(event)),
        PhaseTrigger::After(after) => store.target::<DependsOn>(phase) == Some(*after),
    }
}

/// True if `from` is `phase` or transitively runs after it.
fn runs_after<S: Store>(store: &S, from: Entity, phase: Entity) -> bool {
    let mut current = Some(from);
    while let Some(id) = current {
        if id == phase {
            return true;
        }
        current = store.target::<DependsOn>(id);
    }
    false
}

pub(crate) fn dependents<S: Store>(store: &S, phase: Entity) -> Vec<Entity> {
    store
        .get::<PhaseDependents>(phase)
        .map(|PhaseDependents(list)| list.clone())
        .unwrap_or_default()
}

pub(crate) fn systems_of<A: 'static, S: Store>(store: &S, phase: Entity) -> Vec<Entity> {
    store
        .related::<DependsOn>(phase)
        .into_iter()
        .filter(|id| store.get::<SystemFn<A>>(*id).is_some())
        .collect()
}

fn resolve<S: Store>(store: &S, system: &SystemRef) -> Option<Entity> {
    match system {
        SystemRef::Id(id) => store.get::<SystemState>(*id).map(|_| *id),
        SystemRef::Name(name) => store
            .query::<SystemState>()
            .into_iter()
            .find(|id| store.get::<SystemState>(*id).is_some_and(|s| s.name == *name)),
    }
}
