//! # Rubine Internal Library
//!
//! Re-exports the core Rubine crates for convenience.

/// Layer 0: entity and relation storage.
pub use rubine_world;

/// Layer 1: phase-based system scheduler.
pub use rubine_scheduler;

/// Layer 2: pipes, pipelines and the builder facade.
pub use rubine_abstractions;

/// Plugin lifecycle and scene loading.
pub use rubine_app;

/// Tracing, default phases and introspection.
pub use rubine_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use rubine_abstractions::{
        AbstractionScheduler, Abstractions, NamedSystem, Pipe, Pipeline,
    };
    pub use rubine_app::{
        App, AppError, Node, Plugin, PluginGroup, PluginGroupBuilder, Plugins, SceneNode,
        SystemDefinition,
    };
    pub use rubine_core_plugins::{
        DEFAULT_PHASES, DefaultPhases, DefaultPhasesPlugin, DefaultPlugins, IntrospectionPlugin,
        TracingPlugin,
    };
    pub use rubine_scheduler::{
        Event, IntoSystem, ManualEvent, PhaseTrigger, Propagation, Scheduler, SchedulerError,
        System, SystemError,
    };
    pub use rubine_world::{Entity, Store, World};
}
