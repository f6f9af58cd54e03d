//! Composition layer over the Rubine scheduler (Layer 2).
//!
//! Instead of naming phases and wiring their dependencies by hand, callers
//! assemble **pipes** into **pipelines** and let the builder splice them into
//! the phase graph:
//!
//! - [`Pipe`] - a unique anchor that becomes a phase once built
//! - [`Pipeline`] - an immutable, ordered sequence of pipes
//! - [`AbstractionScheduler`] - declares pipelines, pipes and systems, then
//!   materializes them in one [`start`](AbstractionScheduler::start)
//! - [`Abstractions`] - entry point creating pipes, pipelines, hooks and builders
//!
//! Pipelines sharing a pipe materialize it once: the second pipeline reuses
//! the phase the first one created.
//!
//! # Example
//!
//! ```
//! use rubine_abstractions::Abstractions;
//! use rubine_scheduler::{ManualEvent, Scheduler};
//!
//! let abstractions = Abstractions::new(Scheduler::<f64>::new());
//! let heartbeat = ManualEvent::<f64>::new();
//!
//! let shared = abstractions.pipe(Some("shared"));
//! let left = abstractions.pipeline().with(&shared).with(&abstractions.pipe(None));
//! let right = abstractions.pipeline().with(&shared).with(&abstractions.pipe(None));
//!
//! let mut builder = abstractions.scheduler();
//! builder
//!     .with_pipeline(&left, &heartbeat)?
//!     .with_pipeline(&right, &heartbeat)?
//!     .start()?;
//!
//! assert_eq!(builder.build_pipes().len(), 3);
//! # Ok::<(), rubine_abstractions::AbstractionError>(())
//! ```

mod builder;
mod error;
mod pipe;
mod pipeline;

pub use builder::{AbstractionScheduler, Anchor, NamedSystem, SystemKey, SystemTarget};
pub use error::AbstractionError;
pub use pipe::{DEFAULT_PIPE_LABEL, Pipe};
pub use pipeline::Pipeline;

use rubine_scheduler::Scheduler;
use rubine_scheduler::hooks::{HookKind, HookOutput, HookRegistrationError, SystemEvent};
use rubine_world::{Store, World};

/// Entry point of the composition layer.
///
/// Holds a handle to the scheduler every builder it creates will target.
pub struct Abstractions<A: 'static = (), S: Store = World> {
    scheduler: Scheduler<A, S>,
}

impl<A: 'static, S: Store> Clone for Abstractions<A, S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<A: 'static, S: Store> core::fmt::Debug for Abstractions<A, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Abstractions")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl<A: 'static, S: Store> Abstractions<A, S> {
    /// Creates the composition layer over `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler<A, S>) -> Self {
        Self { scheduler }
    }

    /// Allocates a fresh pipe.
    #[must_use]
    pub fn pipe(&self, label: Option<&str>) -> Pipe {
        Pipe::new(label)
    }

    /// Creates an empty pipeline.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new()
    }

    /// Registers a lifecycle hook under a generated name and returns the name.
    pub fn hook<F, O>(&self, kind: HookKind, hook: F) -> String
    where
        F: Fn(&SystemEvent) -> O + Send + Sync + 'static,
        O: HookOutput,
    {
        self.scheduler.hooks().register_anonymous(kind, hook)
    }

    /// Registers a lifecycle hook under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is taken
    /// for `kind`.
    pub fn hook_named<F, O>(
        &self,
        kind: HookKind,
        name: impl Into<String>,
        hook: F,
    ) -> Result<(), HookRegistrationError>
    where
        F: Fn(&SystemEvent) -> O + Send + Sync + 'static,
        O: HookOutput,
    {
        self.scheduler.hooks().register(kind, name, hook)
    }

    /// Creates a new builder targeting the shared scheduler.
    #[must_use]
    pub fn scheduler(&self) -> AbstractionScheduler<A, S> {
        AbstractionScheduler::new(self.scheduler.clone())
    }

    /// Returns the underlying scheduler.
    #[must_use]
    pub fn base(&self) -> &Scheduler<A, S> {
        &self.scheduler
    }
}
