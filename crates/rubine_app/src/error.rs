//! Error types for the application layer.

use rubine_abstractions::AbstractionError;
use rubine_scheduler::SchedulerError;

/// Failures raised while assembling or finishing an [`App`](crate::App).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// A unique plugin was added more than once.
    #[error(
        "plugin '{plugin}' is unique and was already added; \
         return false from `is_unique` to allow several instances"
    )]
    DuplicatePlugin {
        /// Name of the plugin.
        plugin: String,
    },

    /// A plugin depends on a plugin that was never added.
    #[error("plugin '{plugin}' requires '{dependency}' which was not added")]
    MissingDependency {
        /// Name of the dependent plugin.
        plugin: String,
        /// Type name of the missing dependency.
        dependency: &'static str,
    },

    /// Plugin dependencies form a cycle.
    #[error("circular dependency detected among plugins: {plugins:?}")]
    CircularDependency {
        /// Plugins left unsorted because of the cycle.
        plugins: Vec<String>,
    },

    /// [`App::finish`](crate::App::finish) was called twice.
    #[error("the app was already finished")]
    AlreadyFinished,

    /// A plugin's declarations could not be materialized.
    #[error(transparent)]
    Abstraction(#[from] AbstractionError),

    /// A plugin registered an invalid phase.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
