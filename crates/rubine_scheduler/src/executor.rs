//! Phase execution and event wiring.
//!
//! A fired event runs its phase: every non-paused system in registration
//! order, then each dependent phase in declaration order, depth-first. All
//! of it happens synchronously on the thread that delivered the event.

use core::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use rubine_world::{Entity, Store};

use crate::components::{Phase, PhaseEvent, PreviousSystemState, SystemFn};
use crate::error::SchedulerError;
use crate::event::{Event, Handler};
use crate::hooks::SystemEvent;
use crate::scheduler::{RunState, Scheduler, dependents, systems_of};
use crate::system::{Propagation, SystemState};

impl<A: 'static, S: Store> Scheduler<A, S> {
    /// Connects every event-bound phase to its event.
    ///
    /// Phases bound to an event afterwards connect immediately. Calling
    /// `start` again does nothing.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let bound: Vec<(Entity, Event<A>)> = {
            let tables = self.inner.tables.lock();
            tables
                .store
                .query::<Phase>()
                .into_iter()
                .filter_map(|id| {
                    tables
                        .store
                        .get::<PhaseEvent<A>>(id)
                        .map(|PhaseEvent(event)| (id, event.clone()))
                })
                .collect()
        };

        tracing::debug!(phases = bound.len(), "scheduler started");
        for (phase, event) in &bound {
            self.connect_phase(*phase, event);
        }
    }

    /// Disconnects every event subscription.
    ///
    /// Registered phases and systems are kept; a later [`start`](Self::start)
    /// reconnects them.
    pub fn shutdown(&self) {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            return;
        }
        let subscriptions = core::mem::take(&mut *self.inner.subscriptions.lock());
        tracing::debug!(subscriptions = subscriptions.len(), "scheduler shut down");
        for (_, subscription) in subscriptions {
            subscription.disconnect();
        }
    }

    /// Returns true between [`start`](Self::start) and
    /// [`shutdown`](Self::shutdown).
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub(crate) fn connect_phase(&self, phase: Entity, event: &Event<A>) {
        let weak = Arc::downgrade(&self.inner);
        let handler: Handler<A> = Arc::new(move |args: &A| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let scheduler = Scheduler { inner };
            if let Err(err) = scheduler.run_phase(phase, args) {
                tracing::error!(%phase, error = %err, "phase run failed");
            }
        });

        let subscription = event.subscribe(handler);
        tracing::debug!(%phase, shape = %event.shape(), "phase connected");
        self.inner.subscriptions.lock().push((phase, subscription));
    }

    /// Runs `phase` and, depth-first, every phase depending on it.
    ///
    /// This is what a fired event does; hosts driving phases by hand can
    /// call it directly.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::UnknownPhase`] if `phase` is not a phase
    /// - [`SchedulerError::System`] if a system fails; systems and phases
    ///   after it do not run in this cycle
    pub fn run_phase(&self, phase: Entity, args: &A) -> Result<(), SchedulerError> {
        let systems = {
            let tables = self.inner.tables.lock();
            if tables.store.get::<Phase>(phase).is_none() {
                return Err(SchedulerError::UnknownPhase { entity: phase });
            }
            systems_of::<A, S>(&tables.store, phase)
        };

        for system in systems {
            self.run_system(system, args)?;
        }

        let next = {
            let tables = self.inner.tables.lock();
            dependents(&tables.store, phase)
        };
        for dependent in next {
            self.run_phase(dependent, args)?;
        }
        Ok(())
    }

    fn run_system(&self, system: Entity, args: &A) -> Result<(), SchedulerError> {
        let clock = &self.inner.clock;

        let (callable, previous) = {
            let mut tables = self.inner.tables.lock();
            let Some(SystemFn(callable)) = tables.store.get::<SystemFn<A>>(system) else {
                return Ok(());
            };
            let callable = Arc::clone(callable);
            let Some(state) = tables.store.get_mut::<SystemState>(system) else {
                return Ok(());
            };
            if state.paused {
                return Ok(());
            }
            let previous = state.clone();
            state.frame_start = Some(clock.now());
            (callable, previous)
        };

        let name = Arc::clone(&previous.name);
        let guard = RunningGuard::enter(self, system);
        let outcome = callable.run(args);
        let frame_end = clock.now();

        let call = {
            let mut tables = self.inner.tables.lock();
            let state = tables.store.get_mut::<SystemState>(system).map(|state| {
                state.frame_end = Some(frame_end);
                state.propagated = matches!(outcome, Ok(Propagation::Continue));
                state.clone()
            });
            state.map(|state| {
                tables
                    .store
                    .set(system, PreviousSystemState(previous.clone()));
                SystemEvent::SystemCall {
                    system,
                    state,
                    previous,
                }
            })
        };
        let remove_now = guard.exit();

        if let Some(event) = call {
            tracing::trace!(system = %name, id = %system, "system ran");
            self.inner.hooks.invoke(&event);
        }
        if remove_now {
            self.despawn_system(system);
        }

        outcome.map(|_| ()).map_err(|source| SchedulerError::System {
            system,
            name: name.to_string(),
            source,
        })
    }
}

/// Marks a system as running for the duration of its call.
///
/// A removal requested during the call is applied when the guard is left,
/// including when the system unwinds.
struct RunningGuard<'a, A: 'static, S: Store> {
    scheduler: &'a Scheduler<A, S>,
    system: Entity,
    exited: bool,
}

impl<'a, A: 'static, S: Store> RunningGuard<'a, A, S> {
    fn enter(scheduler: &'a Scheduler<A, S>, system: Entity) -> Self {
        scheduler.inner.run.lock().running.push(system);
        Self {
            scheduler,
            system,
            exited: false,
        }
    }

    /// Leaves the running set and reports whether a removal is due.
    fn exit(mut self) -> bool {
        self.exited = true;
        leave(&self.scheduler.inner.run, self.system)
    }
}

impl<A: 'static, S: Store> Drop for RunningGuard<'_, A, S> {
    fn drop(&mut self) {
        if !self.exited && leave(&self.scheduler.inner.run, self.system) {
            tracing::debug!(id = %self.system, "applying deferred removal after unwind");
            self.scheduler.despawn_system(self.system);
        }
    }
}

fn leave(run: &Mutex<RunState>, system: Entity) -> bool {
    let mut run = run.lock();
    pop(&mut run.running, system);
    if run.running.contains(&system) {
        return false;
    }
    match run.pending_removals.iter().position(|id| *id == system) {
        Some(index) => {
            run.pending_removals.swap_remove(index);
            true
        }
        None => false,
    }
}

fn pop(running: &mut Vec<Entity>, system: Entity) {
    if let Some(index) = running.iter().rposition(|id| *id == system) {
        running.remove(index);
    }
}
