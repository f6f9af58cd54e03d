//! Builder error types.

use rubine_scheduler::SchedulerError;

/// Errors raised by pipelines and the [`AbstractionScheduler`](crate::AbstractionScheduler).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AbstractionError {
    /// A `with_*` method was called after `start`.
    #[error("builder already started")]
    BuilderAlreadyStarted,

    /// A pipe was appended to a pipeline that already contains it.
    #[error("pipe '{pipe}' is already part of the pipeline")]
    DuplicatePipe {
        /// Name of the repeated pipe.
        pipe: String,
    },

    /// An empty pipeline was used as an ordering anchor.
    #[error("an empty pipeline cannot be used as an anchor")]
    EmptyAnchor,

    /// An anchor was never materialized by any declaration.
    #[error("anchor '{anchor}' is not built by any declaration")]
    UnresolvedAnchor {
        /// Name of the missing pipe.
        anchor: String,
    },

    /// Materialization failed in the scheduler.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
