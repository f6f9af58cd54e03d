//! Live scheduler introspection.
//!
//! [`IntrospectionPlugin`] adds one system that, every time its phase runs,
//! captures a [`SchedulerSnapshot`] and hands it to a [`SnapshotSink`]. A
//! debugger UI, a log shipper or a test can sit behind the sink.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`SchedulerSnapshot`] | serializable phases, systems and run records |
//! | [`SnapshotSink`] | delivery target ([`ChannelSink`], [`JsonLinesSink`]) |
//! | access check | decides per viewer whether snapshots are sent |
//! | [`Introspection`] | exposes the id of the introspection system |
//!
//! Delivery failures are logged and otherwise ignored; they never fail the
//! phase the system runs in.
//!
//! # Example
//!
//! ```
//! use rubine_app::App;
//! use rubine_core_plugins::{ChannelSink, IntrospectionPlugin};
//! use rubine_scheduler::ManualEvent;
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let (sink, snapshots) = ChannelSink::bounded(4);
//! let plugin = IntrospectionPlugin::new(sink)
//!     .with_store_name("world")
//!     .with_phase("Debug");
//! let introspection = plugin.handle();
//!
//! let mut app = App::<f64>::new();
//! app.scheduler().phase("Debug", &heartbeat)?;
//! app.add_plugins(plugin);
//! app.finish()?;
//!
//! heartbeat.fire(&0.016);
//! let snapshot = snapshots.try_recv().unwrap();
//! assert_eq!(snapshot.stores, vec!["world"]);
//! assert!(introspection.introspection_system().is_some());
//! # Ok::<(), rubine_app::AppError>(())
//! ```

mod sink;
mod snapshot;

pub use sink::{ChannelSink, JsonLinesSink, LOCAL_VIEWER, SinkError, SnapshotSink};
pub use snapshot::{BindingSnapshot, PhaseSnapshot, SchedulerSnapshot, SystemSnapshot};

use std::sync::{Arc, OnceLock};

use rubine_app::{App, AppError, Plugin};
use rubine_world::Entity;

/// Name the introspection system is registered under.
pub const INTROSPECTION_SYSTEM_NAME: &str = "rubine::introspection";

/// Phase the introspection system joins unless configured otherwise.
pub const DEFAULT_INTROSPECTION_PHASE: &str = "Introspection";

/// Decides whether a viewer may receive snapshots.
pub type AccessCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Handle to a registered [`IntrospectionPlugin`].
#[derive(Debug, Clone, Default)]
pub struct Introspection {
    system: Arc<OnceLock<Entity>>,
}

impl Introspection {
    /// Returns the id of the introspection system once the plugin is built.
    #[must_use]
    pub fn introspection_system(&self) -> Option<Entity> {
        self.system.get().copied()
    }
}

/// Publishes scheduler snapshots from a dedicated system.
pub struct IntrospectionPlugin {
    sink: Arc<dyn SnapshotSink>,
    stores: Vec<String>,
    phase: String,
    access_check: AccessCheck,
    handle: Introspection,
}

impl core::fmt::Debug for IntrospectionPlugin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntrospectionPlugin")
            .field("viewer", &self.sink.viewer())
            .field("stores", &self.stores)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl IntrospectionPlugin {
    /// Creates the plugin. Every viewer is allowed until
    /// [`with_access_check`](Self::with_access_check) says otherwise.
    #[must_use]
    pub fn new(sink: impl SnapshotSink) -> Self {
        Self {
            sink: Arc::new(sink),
            stores: Vec::new(),
            phase: DEFAULT_INTROSPECTION_PHASE.to_owned(),
            access_check: Arc::new(|_: &str| true),
            handle: Introspection::default(),
        }
    }

    /// Registers a store name reported in every snapshot.
    #[must_use]
    pub fn with_store_name(mut self, name: impl Into<String>) -> Self {
        self.stores.push(name.into());
        self
    }

    /// Sets the phase the introspection system runs in.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Sets the viewer access check.
    #[must_use]
    pub fn with_access_check(
        mut self,
        check: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.access_check = Arc::new(check);
        self
    }

    /// Returns a handle that outlives the plugin being moved into the app.
    #[must_use]
    pub fn handle(&self) -> Introspection {
        self.handle.clone()
    }
}

impl<A: 'static> Plugin<A> for IntrospectionPlugin {
    fn build(&self, app: &mut App<A>) -> Result<(), AppError> {
        let scheduler = app.scheduler().downgrade();
        let sink = Arc::clone(&self.sink);
        let check = Arc::clone(&self.access_check);
        let stores: Arc<[String]> = self.stores.clone().into();

        let id = app.scheduler().on_named(
            &self.phase,
            INTROSPECTION_SYSTEM_NAME,
            move |_: &A| {
                let Some(scheduler) = scheduler.upgrade() else {
                    return;
                };
                let viewer = sink.viewer();
                if !check(viewer) {
                    tracing::trace!(viewer, "introspection viewer denied");
                    return;
                }
                let snapshot = SchedulerSnapshot::capture(&scheduler, &stores);
                if let Err(err) = sink.deliver(&snapshot) {
                    tracing::warn!(viewer, error = %err, "snapshot delivery failed");
                }
            },
        );

        if self.handle.system.set(id).is_err() {
            tracing::warn!(%id, "introspection handle already bound");
        }
        tracing::debug!(%id, phase = %self.phase, "introspection system added");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubine_scheduler::ManualEvent;

    #[test]
    fn denied_viewer_receives_nothing() {
        let tick = ManualEvent::<u32>::new();
        let (sink, snapshots) = ChannelSink::bounded(4);
        let plugin = IntrospectionPlugin::new(sink.with_viewer("guest"))
            .with_phase("Debug")
            .with_access_check(|viewer| viewer == "admin");

        let mut app = App::<u32>::new();
        app.scheduler().phase("Debug", &tick).unwrap();
        app.add_plugins(plugin);
        app.finish().unwrap();

        tick.fire(&1);
        assert!(snapshots.try_recv().is_err());
    }

    #[test]
    fn full_sink_does_not_fail_the_phase() {
        let tick = ManualEvent::<u32>::new();
        let (sink, snapshots) = ChannelSink::bounded(1);
        let plugin = IntrospectionPlugin::new(sink).with_phase("Debug");
        let handle = plugin.handle();

        let mut app = App::<u32>::new();
        let debug = app.scheduler().phase("Debug", &tick).unwrap();
        app.add_plugins(plugin);
        app.finish().unwrap();

        app.scheduler().run_phase(debug, &1).unwrap();
        app.scheduler().run_phase(debug, &2).unwrap();

        assert_eq!(snapshots.len(), 1);
        let system = handle.introspection_system().unwrap();
        assert!(app.scheduler().system_state(system).unwrap().propagated);
    }
}
