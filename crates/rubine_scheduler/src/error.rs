//! Scheduler error types.

use rubine_world::Entity;

/// Errors raised by phase registration and execution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    /// A trigger value matched none of the accepted subscription shapes.
    #[error("unsupported event shape for `{args}`: expected a function, `connect` or `Connect`")]
    UnsupportedEventShape {
        /// Type name of the trigger arguments.
        args: &'static str,
    },

    /// A phase name was bound to a different trigger than before.
    #[error("phase '{name}' is already bound to a different trigger")]
    PhaseRedefinition {
        /// The phase name.
        name: String,
    },

    /// A dependency target is not a phase.
    #[error("{entity} is not a phase")]
    UnknownPhase {
        /// The offending entity.
        entity: Entity,
    },

    /// Binding the phase would make the dependency graph cyclic.
    #[error("phase '{name}' cannot depend on {after}: dependency cycle")]
    DependencyCycle {
        /// The phase being bound.
        name: String,
        /// The requested predecessor.
        after: Entity,
    },

    /// A system returned an error.
    #[error("system '{name}' ({system}) failed: {source}")]
    System {
        /// The failing system.
        system: Entity,
        /// Its name.
        name: String,
        /// The underlying error.
        #[source]
        source: SystemError,
    },
}

/// Error returned by a system body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SystemError {
    /// The system failed while running.
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl SystemError {
    /// Creates an execution error from any displayable message.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError(message.into())
    }
}
