//! The standard frame phases.
//!
//! [`DefaultPhasesPlugin`] chains `First → PreUpdate → Update → PostUpdate →
//! Last` on a host tick event. The chain is a [`Pipeline`] declared on the
//! app's builder, so it materializes together with every other pipeline when
//! the app finishes.
//!
//! Phases built from pipes carry generated names; [`DefaultPhases`] maps the
//! readable names back to them.
//!
//! # Example
//!
//! ```
//! use rubine_app::App;
//! use rubine_core_plugins::DefaultPhasesPlugin;
//! use rubine_scheduler::ManualEvent;
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let plugin = DefaultPhasesPlugin::<f64>::new(&heartbeat);
//! let phases = plugin.phases();
//!
//! let mut app = App::<f64>::new();
//! phases.on(app.scheduler(), "Update", |dt: &f64| assert!(*dt > 0.0));
//! app.add_plugins(plugin);
//! app.finish()?;
//!
//! heartbeat.fire(&0.016);
//! # Ok::<(), rubine_app::AppError>(())
//! ```

use std::sync::Arc;

use rubine_abstractions::{Pipe, Pipeline};
use rubine_app::{App, AppError, Plugin};
use rubine_scheduler::{Event, IntoSystem, Scheduler};
use rubine_world::{Entity, Store};

/// Names of the default frame phases, in run order.
pub const DEFAULT_PHASES: [&str; 5] = ["First", "PreUpdate", "Update", "PostUpdate", "Last"];

/// Readable-name index over the pipes of the default phase chain.
#[derive(Debug, Clone)]
pub struct DefaultPhases {
    pipeline: Pipeline,
    names: Arc<[Arc<str>]>,
}

impl DefaultPhases {
    fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut pipeline = Pipeline::new();
        let mut labels = Vec::new();
        for name in names {
            let name = name.as_ref();
            if labels.iter().any(|label: &Arc<str>| &**label == name) {
                tracing::warn!(phase = name, "duplicate default phase name ignored");
                continue;
            }
            pipeline = pipeline.with(&Pipe::new(Some(name)));
            labels.push(Arc::from(name));
        }
        Self {
            pipeline,
            names: labels.into(),
        }
    }

    /// Returns the chain as a pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns the readable names, in run order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| &**name)
    }

    /// Returns the pipe behind `name`.
    #[must_use]
    pub fn pipe(&self, name: &str) -> Option<&Pipe> {
        let index = self.names.iter().position(|n| &**n == name)?;
        self.pipeline.pipes().get(index)
    }

    /// Returns the scheduler phase name behind `name`.
    #[must_use]
    pub fn phase_name(&self, name: &str) -> Option<String> {
        self.pipe(name).map(Pipe::name)
    }

    /// Returns the phase entity behind `name`, once materialized.
    #[must_use]
    pub fn phase<A: 'static, S: Store>(
        &self,
        scheduler: &Scheduler<A, S>,
        name: &str,
    ) -> Option<Entity> {
        scheduler.phase_named(&self.phase_name(name)?)
    }

    /// Registers `system` on the phase behind `name`.
    ///
    /// Works before the chain is materialized; the system waits in its
    /// unbound phase until then. Returns `None` for unknown names.
    pub fn on<A: 'static, S: Store, M>(
        &self,
        scheduler: &Scheduler<A, S>,
        name: &str,
        system: impl IntoSystem<A, M>,
    ) -> Option<Entity> {
        let phase = self.phase_name(name)?;
        Some(scheduler.on(&phase, system))
    }
}

/// Builds the default phase chain on a tick event.
pub struct DefaultPhasesPlugin<A: 'static> {
    event: Event<A>,
    phases: DefaultPhases,
}

impl<A: 'static> DefaultPhasesPlugin<A> {
    /// Chains [`DEFAULT_PHASES`] on `event`.
    pub fn new(event: impl Into<Event<A>>) -> Self {
        Self {
            event: event.into(),
            phases: DefaultPhases::new(DEFAULT_PHASES),
        }
    }

    /// Replaces the chain with `names`, in run order. Repeated names are
    /// dropped.
    #[must_use]
    pub fn with_phases<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        self.phases = DefaultPhases::new(names);
        self
    }

    /// Returns the name index for the chain this plugin builds.
    #[must_use]
    pub fn phases(&self) -> DefaultPhases {
        self.phases.clone()
    }
}

impl<A: 'static> Plugin<A> for DefaultPhasesPlugin<A> {
    fn build(&self, app: &mut App<A>) -> Result<(), AppError> {
        if self.phases.pipeline.is_empty() {
            tracing::warn!("default phase chain is empty");
            return Ok(());
        }
        app.builder()
            .with_pipeline(&self.phases.pipeline, self.event.clone())?;
        tracing::debug!(phases = self.phases.names.len(), "default phases declared");
        Ok(())
    }
}
