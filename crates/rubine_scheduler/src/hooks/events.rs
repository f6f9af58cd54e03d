//! Event payloads delivered to hooks.

use std::sync::Arc;

use rubine_world::Entity;

use super::schedule::HookKind;
use crate::system::SystemState;

/// Lifecycle event passed to every hook.
///
/// Each variant corresponds to one [`HookKind`].
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// A system was registered under `phase`.
    SystemAdd {
        /// The new system.
        system: Entity,
        /// Its name.
        name: Arc<str>,
        /// The phase it belongs to.
        phase: Entity,
        /// Its initial run record.
        state: SystemState,
    },
    /// A system was removed. Fired once per system.
    SystemRemove {
        /// The removed system.
        system: Entity,
        /// Its name.
        name: Arc<str>,
    },
    /// A system finished a run.
    SystemCall {
        /// The system.
        system: Entity,
        /// The record written by this run.
        state: SystemState,
        /// The record it replaced.
        previous: SystemState,
    },
    /// A system's paused flag changed.
    SystemChange {
        /// The system.
        system: Entity,
        /// The record after the change.
        state: SystemState,
        /// The record before the change.
        previous: SystemState,
    },
}

impl SystemEvent {
    /// Returns the lifecycle point this event belongs to.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        match self {
            SystemEvent::SystemAdd { .. } => HookKind::SystemAdd,
            SystemEvent::SystemRemove { .. } => HookKind::SystemRemove,
            SystemEvent::SystemCall { .. } => HookKind::SystemCall,
            SystemEvent::SystemChange { .. } => HookKind::SystemChange,
        }
    }

    /// Returns the system the event is about.
    #[must_use]
    pub fn system(&self) -> Entity {
        match self {
            SystemEvent::SystemAdd { system, .. }
            | SystemEvent::SystemRemove { system, .. }
            | SystemEvent::SystemCall { system, .. }
            | SystemEvent::SystemChange { system, .. } => *system,
        }
    }
}
