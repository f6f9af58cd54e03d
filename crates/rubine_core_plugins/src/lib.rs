//! Core plugins for Rubine applications.
//!
//! - [`TracingPlugin`] - installs the `tracing` subscriber
//! - [`DefaultPhasesPlugin`] - the `First → PreUpdate → Update → PostUpdate → Last` chain
//! - [`IntrospectionPlugin`] - publishes scheduler snapshots to a sink
//! - [`DefaultPlugins`] - tracing plus the default phases
//!
//! # Example
//!
//! ```
//! use rubine_app::{App, PluginGroup};
//! use rubine_core_plugins::{DefaultPlugins, TracingPlugin};
//! use rubine_scheduler::ManualEvent;
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let mut app = App::<f64>::new();
//! app.add_plugins(
//!     DefaultPlugins::<f64>::new(&heartbeat)
//!         .build()
//!         .disable::<TracingPlugin>(),
//! );
//! app.finish()?;
//! # Ok::<(), rubine_app::AppError>(())
//! ```

pub mod introspection;
mod phases;
mod tracing_plugin;

pub use introspection::{
    ChannelSink, Introspection, IntrospectionPlugin, JsonLinesSink, SchedulerSnapshot, SinkError,
    SnapshotSink,
};
pub use phases::{DEFAULT_PHASES, DefaultPhases, DefaultPhasesPlugin};
pub use tracing_plugin::{TracingFormat, TracingPlugin};

use rubine_app::{PluginGroup, PluginGroupBuilder};
use rubine_scheduler::Event;

/// Tracing plus the default phase chain on a tick event.
///
/// The introspection plugin needs a sink and is added separately.
pub struct DefaultPlugins<A: 'static> {
    phases: DefaultPhasesPlugin<A>,
}

impl<A: 'static> DefaultPlugins<A> {
    /// Creates the group, chaining the default phases on `event`.
    pub fn new(event: impl Into<Event<A>>) -> Self {
        Self {
            phases: DefaultPhasesPlugin::new(event),
        }
    }

    /// Returns the name index of the phase chain.
    #[must_use]
    pub fn phases(&self) -> DefaultPhases {
        self.phases.phases()
    }
}

impl<A: 'static> PluginGroup<A> for DefaultPlugins<A> {
    fn build(self) -> PluginGroupBuilder<A> {
        PluginGroupBuilder::new()
            .add(TracingPlugin::default())
            .add(self.phases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubine_scheduler::ManualEvent;

    #[test]
    fn default_plugins_builds() {
        let tick = ManualEvent::<u32>::new();
        let builder = DefaultPlugins::<u32>::new(&tick).build();
        assert_eq!(builder.len(), 2);
        assert!(builder.contains::<TracingPlugin>());
        assert!(builder.contains::<DefaultPhasesPlugin<u32>>());
    }
}
