//! Serializable view of a scheduler.

use serde::{Deserialize, Serialize};

use rubine_scheduler::{PhaseBinding, Scheduler};
use rubine_world::{Entity, Store};

/// How a phase is triggered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingSnapshot {
    /// Bound to an event; `shape` is `function`, `connect` or `Connect`.
    Event {
        /// Shape of the event.
        shape: String,
    },
    /// Runs after another phase.
    After {
        /// Raw id of the phase it follows.
        phase: u64,
    },
    /// Never bound.
    Unbound,
}

impl From<PhaseBinding> for BindingSnapshot {
    fn from(binding: PhaseBinding) -> Self {
        match binding {
            PhaseBinding::Event(shape) => BindingSnapshot::Event {
                shape: shape.to_string(),
            },
            PhaseBinding::After(phase) => BindingSnapshot::After {
                phase: phase.index(),
            },
            PhaseBinding::Unbound => BindingSnapshot::Unbound,
        }
    }
}

/// One phase and the ids of its systems and dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    /// Raw id.
    pub id: u64,
    /// Registered name.
    pub name: String,
    /// Trigger.
    pub binding: BindingSnapshot,
    /// Systems, in run order.
    pub systems: Vec<u64>,
    /// Phases running right after this one, in run order.
    pub dependents: Vec<u64>,
}

/// One system and its latest run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Raw id.
    pub id: u64,
    /// Registered name.
    pub name: String,
    /// Raw id of the owning phase.
    pub phase: Option<u64>,
    /// Whether the system is paused.
    pub paused: bool,
    /// Whether the system has completed at least one run.
    pub has_run: bool,
    /// Whether the latest run asked to continue.
    pub propagated: bool,
    /// Duration of the latest run, in microseconds.
    pub last_run_micros: Option<u64>,
}

/// Point-in-time view of phases and systems.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    /// Names of the stores registered for inspection.
    pub stores: Vec<String>,
    /// Phases, in creation order.
    pub phases: Vec<PhaseSnapshot>,
    /// Systems, in creation order.
    pub systems: Vec<SystemSnapshot>,
}

impl SchedulerSnapshot {
    /// Captures the current state of `scheduler`.
    pub fn capture<A: 'static, S: Store>(scheduler: &Scheduler<A, S>, stores: &[String]) -> Self {
        let phases = scheduler
            .phases()
            .into_iter()
            .map(|phase| PhaseSnapshot {
                id: phase.index(),
                name: scheduler
                    .phase_name(phase)
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                binding: scheduler
                    .phase_binding(phase)
                    .unwrap_or(PhaseBinding::Unbound)
                    .into(),
                systems: raw(scheduler.systems_in(phase)),
                dependents: raw(scheduler.dependents_of(phase)),
            })
            .collect();

        let systems = scheduler
            .systems()
            .into_iter()
            .filter_map(|system| {
                let state = scheduler.system_state(system)?;
                let last_run_micros = match (state.frame_start, state.frame_end) {
                    (Some(start), Some(end)) if state.has_run() => {
                        u64::try_from(end.saturating_duration_since(start).as_micros()).ok()
                    }
                    _ => None,
                };
                Some(SystemSnapshot {
                    id: system.index(),
                    name: state.name.to_string(),
                    phase: scheduler.phase_of(system).map(|phase| phase.index()),
                    paused: state.paused,
                    has_run: state.has_run(),
                    propagated: state.propagated,
                    last_run_micros,
                })
            })
            .collect();

        Self {
            stores: stores.to_vec(),
            phases,
            systems,
        }
    }

    /// Returns the phase called `name`.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&PhaseSnapshot> {
        self.phases.iter().find(|phase| phase.name == name)
    }

    /// Returns the earliest system called `name`.
    #[must_use]
    pub fn system(&self, name: &str) -> Option<&SystemSnapshot> {
        self.systems.iter().find(|system| system.name == name)
    }
}

fn raw(entities: Vec<Entity>) -> Vec<u64> {
    entities.iter().map(Entity::index).collect()
}
