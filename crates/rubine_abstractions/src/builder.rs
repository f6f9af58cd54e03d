//! Declarative builder over a [`Scheduler`].
//!
//! An [`AbstractionScheduler`] collects pipelines, pipes and systems without
//! touching the scheduler, then materializes everything in a single
//! [`start`](AbstractionScheduler::start) pass:
//!
//! 1. build every declared pipeline and pipe into phases, sharing pipes
//!    across pipelines
//! 2. attach every declared system to the phase of its pipe
//! 3. apply pause and unpause requests
//! 4. start the scheduler
//!
//! # Example
//!
//! ```
//! use rubine_abstractions::{AbstractionScheduler, NamedSystem, Pipe, Pipeline};
//! use rubine_scheduler::{ManualEvent, Scheduler};
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let input = Pipe::new(Some("input"));
//! let physics = Pipe::new(Some("physics"));
//! let frame = Pipeline::new().with(&input).with(&physics);
//!
//! let gravity = NamedSystem::new("gravity", |dt: &f64| {
//!     let _ = dt * 9.81;
//! });
//!
//! let mut builder = AbstractionScheduler::new(Scheduler::<f64>::new());
//! builder
//!     .with_pipeline(&frame, &heartbeat)?
//!     .with_system(&gravity, &physics)?
//!     .start()?;
//!
//! heartbeat.fire(&0.016);
//! # Ok::<(), rubine_abstractions::AbstractionError>(())
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use rubine_scheduler::{BoxedSystem, Event, IntoSystem, Scheduler, System};
use rubine_world::{Entity, Store, World};

use crate::error::AbstractionError;
use crate::pipe::Pipe;
use crate::pipeline::Pipeline;

// ─────────────────────────────────────────────────────────────────────────────
// NamedSystem
// ─────────────────────────────────────────────────────────────────────────────

static NEXT_SYSTEM_KEY: AtomicU64 = AtomicU64::new(0);

/// Opaque handle of a [`NamedSystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemKey(u64);

/// A system with a stable handle and a human-readable name.
///
/// The builder keys every table by [`SystemKey`], so the same callable can
/// be declared under several handles without them colliding.
pub struct NamedSystem<A: 'static> {
    key: SystemKey,
    name: Arc<str>,
    system: BoxedSystem<A>,
}

impl<A: 'static> NamedSystem<A> {
    /// Wraps a system under an explicit name.
    pub fn new<M>(name: impl Into<Arc<str>>, system: impl IntoSystem<A, M>) -> Self {
        Self::from_boxed(name, Arc::new(system.into_system()))
    }

    /// Wraps a system under its type name.
    pub fn from_system<M>(system: impl IntoSystem<A, M>) -> Self {
        let system = system.into_system();
        let name = system.name();
        Self::from_boxed(name, Arc::new(system))
    }

    /// Wraps an already boxed system.
    pub fn from_boxed(name: impl Into<Arc<str>>, system: BoxedSystem<A>) -> Self {
        Self {
            key: SystemKey(NEXT_SYSTEM_KEY.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            system,
        }
    }

    /// Returns the handle.
    #[must_use]
    pub fn key(&self) -> SystemKey {
        self.key
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<A: 'static> Clone for NamedSystem<A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            name: Arc::clone(&self.name),
            system: Arc::clone(&self.system),
        }
    }
}

impl<A: 'static> fmt::Debug for NamedSystem<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedSystem")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Target of a pause or unpause request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemTarget {
    /// Every registration of a declared system.
    Key(SystemKey),
    /// Every declared system with this name, or the earliest scheduler
    /// system with it when none was declared here.
    Name(Arc<str>),
}

impl<A: 'static> From<&NamedSystem<A>> for SystemTarget {
    fn from(system: &NamedSystem<A>) -> Self {
        SystemTarget::Key(system.key)
    }
}

impl From<SystemKey> for SystemTarget {
    fn from(key: SystemKey) -> Self {
        SystemTarget::Key(key)
    }
}

impl From<&str> for SystemTarget {
    fn from(name: &str) -> Self {
        SystemTarget::Name(Arc::from(name))
    }
}

impl From<String> for SystemTarget {
    fn from(name: String) -> Self {
        SystemTarget::Name(Arc::from(name))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Declarations
// ─────────────────────────────────────────────────────────────────────────────

/// Something a pipeline or pipe can be ordered after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Run after this pipe's phase.
    Pipe(Pipe),
    /// Run after the last pipe of this pipeline.
    Pipeline(Pipeline),
}

impl From<&Pipe> for Anchor {
    fn from(pipe: &Pipe) -> Self {
        Anchor::Pipe(pipe.clone())
    }
}

impl From<&Pipeline> for Anchor {
    fn from(pipeline: &Pipeline) -> Self {
        Anchor::Pipeline(pipeline.clone())
    }
}

enum Target {
    Pipeline(Pipeline),
    Pipe(Pipe),
}

struct Declaration<A: 'static> {
    target: Target,
    event: Event<A>,
    after: Option<Anchor>,
}

struct PendingSystem<A: 'static> {
    system: NamedSystem<A>,
    pipe: Pipe,
}

// ─────────────────────────────────────────────────────────────────────────────
// AbstractionScheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Fluent, single-commit builder over a [`Scheduler`].
///
/// Every `with_*` call only records a declaration. [`start`](Self::start)
/// is the one commit point; after it, `with_*` calls fail with
/// [`AbstractionError::BuilderAlreadyStarted`].
pub struct AbstractionScheduler<A: 'static = (), S: Store = World> {
    scheduler: Scheduler<A, S>,
    started: bool,
    system_names: HashMap<SystemKey, Arc<str>>,
    build_pipes: HashMap<Pipe, Entity>,
    built_pipelines: HashMap<Pipeline, Vec<Entity>>,
    system_ids: HashMap<SystemKey, Vec<Entity>>,
    declarations: Vec<Declaration<A>>,
    systems: Vec<PendingSystem<A>>,
    toggles: Vec<(SystemTarget, bool)>,
}

impl<A: 'static, S: Store> fmt::Debug for AbstractionScheduler<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbstractionScheduler")
            .field("started", &self.started)
            .field("build_pipes", &self.build_pipes)
            .field("built_pipelines", &self.built_pipelines.len())
            .field("pending_declarations", &self.declarations.len())
            .field("pending_systems", &self.systems.len())
            .finish_non_exhaustive()
    }
}

impl<A: 'static, S: Store> AbstractionScheduler<A, S> {
    /// Creates a builder over `scheduler`.
    #[must_use]
    pub fn new(scheduler: Scheduler<A, S>) -> Self {
        Self {
            scheduler,
            started: false,
            system_names: HashMap::new(),
            build_pipes: HashMap::new(),
            built_pipelines: HashMap::new(),
            system_ids: HashMap::new(),
            declarations: Vec::new(),
            systems: Vec::new(),
            toggles: Vec::new(),
        }
    }

    fn ensure_not_started(&self) -> Result<(), AbstractionError> {
        if self.started {
            return Err(AbstractionError::BuilderAlreadyStarted);
        }
        Ok(())
    }

    fn declare(
        &mut self,
        target: Target,
        event: Event<A>,
        after: Option<Anchor>,
    ) -> Result<&mut Self, AbstractionError> {
        self.ensure_not_started()?;
        if let Some(Anchor::Pipeline(pipeline)) = &after
            && pipeline.is_empty()
        {
            return Err(AbstractionError::EmptyAnchor);
        }
        self.declarations.push(Declaration {
            target,
            event,
            after,
        });
        Ok(self)
    }

    /// Declares a pipeline whose first pipe runs on `event`.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`.
    pub fn with_pipeline(
        &mut self,
        pipeline: &Pipeline,
        event: impl Into<Event<A>>,
    ) -> Result<&mut Self, AbstractionError> {
        self.declare(Target::Pipeline(pipeline.clone()), event.into(), None)
    }

    /// Declares a pipeline whose first pipe runs after `after`.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`, or
    /// [`AbstractionError::EmptyAnchor`] when anchoring after an empty
    /// pipeline.
    pub fn with_pipeline_after(
        &mut self,
        pipeline: &Pipeline,
        event: impl Into<Event<A>>,
        after: impl Into<Anchor>,
    ) -> Result<&mut Self, AbstractionError> {
        self.declare(
            Target::Pipeline(pipeline.clone()),
            event.into(),
            Some(after.into()),
        )
    }

    /// Declares a single pipe that runs on `event`.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`.
    pub fn with_pipe(
        &mut self,
        pipe: &Pipe,
        event: impl Into<Event<A>>,
    ) -> Result<&mut Self, AbstractionError> {
        self.declare(Target::Pipe(pipe.clone()), event.into(), None)
    }

    /// Declares a single pipe that runs after `after`.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`, or
    /// [`AbstractionError::EmptyAnchor`] when anchoring after an empty
    /// pipeline.
    pub fn with_pipe_after(
        &mut self,
        pipe: &Pipe,
        event: impl Into<Event<A>>,
        after: impl Into<Anchor>,
    ) -> Result<&mut Self, AbstractionError> {
        self.declare(Target::Pipe(pipe.clone()), event.into(), Some(after.into()))
    }

    /// Declares a system on `pipe`.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`.
    pub fn with_system(
        &mut self,
        system: &NamedSystem<A>,
        pipe: &Pipe,
    ) -> Result<&mut Self, AbstractionError> {
        self.ensure_not_started()?;
        self.systems.push(PendingSystem {
            system: system.clone(),
            pipe: pipe.clone(),
        });
        Ok(self)
    }

    /// Declares several systems on `pipe`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::BuilderAlreadyStarted`] after `start`.
    pub fn with_systems<'s>(
        &mut self,
        systems: impl IntoIterator<Item = &'s NamedSystem<A>>,
        pipe: &Pipe,
    ) -> Result<&mut Self, AbstractionError> {
        self.ensure_not_started()?;
        for system in systems {
            self.with_system(system, pipe)?;
        }
        Ok(self)
    }

    /// Pauses a system. Before `start` the request is recorded and applied
    /// during `start`; afterwards it applies immediately.
    pub fn pause_system(&mut self, system: impl Into<SystemTarget>) -> &mut Self {
        self.toggle(system.into(), true)
    }

    /// Unpauses a system. Same timing as [`pause_system`](Self::pause_system).
    pub fn unpause_system(&mut self, system: impl Into<SystemTarget>) -> &mut Self {
        self.toggle(system.into(), false)
    }

    fn toggle(&mut self, target: SystemTarget, paused: bool) -> &mut Self {
        if self.started {
            self.apply_toggle(&target, paused);
        } else {
            self.toggles.push((target, paused));
        }
        self
    }

    fn apply_toggle(&self, target: &SystemTarget, paused: bool) {
        let ids: Vec<Entity> = match target {
            SystemTarget::Key(key) => self.system_ids.get(key).cloned().unwrap_or_default(),
            SystemTarget::Name(name) => {
                let mut keys: Vec<SystemKey> = self
                    .system_names
                    .iter()
                    .filter(|(_, declared)| *declared == name)
                    .map(|(key, _)| *key)
                    .collect();
                keys.sort_unstable();
                keys.iter()
                    .filter_map(|key| self.system_ids.get(key))
                    .flatten()
                    .copied()
                    .collect()
            }
        };

        if ids.is_empty() {
            let applied = match target {
                SystemTarget::Name(name) => {
                    let name = Arc::clone(name);
                    if paused {
                        self.scheduler.pause(name)
                    } else {
                        self.scheduler.unpause(name)
                    }
                }
                SystemTarget::Key(_) => false,
            };
            if !applied {
                tracing::debug!(?target, paused, "pause toggle matched no system");
            }
            return;
        }

        for id in ids {
            if paused {
                self.scheduler.pause(id);
            } else {
                self.scheduler.unpause(id);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Materialization
    // ─────────────────────────────────────────────────────────────────────

    /// Materializes every declaration and starts the scheduler.
    ///
    /// Runs once; later calls return immediately.
    ///
    /// # Errors
    ///
    /// - [`AbstractionError::UnresolvedAnchor`] if a declaration is ordered
    ///   after a pipe that no declaration builds. Nothing is attached and the
    ///   builder stays unstarted; declarations already built stay built.
    /// - [`AbstractionError::Scheduler`] if a phase cannot be bound. The
    ///   failing declaration and those after it are kept, so a later `start`
    ///   retries them.
    pub fn start(&mut self) -> Result<&mut Self, AbstractionError> {
        if self.started {
            return Ok(self);
        }

        self.materialize_declarations()?;

        for PendingSystem { system, pipe } in core::mem::take(&mut self.systems) {
            self.attach(&system, &pipe);
        }

        for (target, paused) in core::mem::take(&mut self.toggles) {
            self.apply_toggle(&target, paused);
        }

        self.scheduler.start();
        self.started = true;
        tracing::debug!(
            pipes = self.build_pipes.len(),
            pipelines = self.built_pipelines.len(),
            "abstraction scheduler started"
        );
        Ok(self)
    }

    fn materialize_declarations(&mut self) -> Result<(), AbstractionError> {
        let mut pending = core::mem::take(&mut self.declarations);

        while !pending.is_empty() {
            let mut deferred = Vec::new();
            let before = pending.len();

            let mut remaining = pending.into_iter();
            while let Some(declaration) = remaining.next() {
                let after = match &declaration.after {
                    None => None,
                    Some(anchor) => match self.resolve_anchor(anchor) {
                        Some(phase) => Some(phase),
                        None => {
                            deferred.push(declaration);
                            continue;
                        }
                    },
                };
                if let Err(err) = self.materialize(&declaration, after) {
                    // Keep the failing declaration and everything not yet
                    // tried for the next `start`.
                    deferred.push(declaration);
                    deferred.extend(remaining);
                    self.declarations = deferred;
                    return Err(err);
                }
            }

            if deferred.len() == before {
                let anchor = deferred
                    .first()
                    .and_then(|d| d.after.as_ref())
                    .map(anchor_name)
                    .unwrap_or_default();
                self.declarations = deferred;
                return Err(AbstractionError::UnresolvedAnchor { anchor });
            }
            pending = deferred;
        }
        Ok(())
    }

    fn resolve_anchor(&self, anchor: &Anchor) -> Option<Entity> {
        match anchor {
            Anchor::Pipe(pipe) => self.build_pipes.get(pipe).copied(),
            Anchor::Pipeline(pipeline) => self
                .built_pipelines
                .get(pipeline)
                .and_then(|phases| phases.last().copied())
                .or_else(|| pipeline.last().and_then(|pipe| self.build_pipes.get(pipe).copied())),
        }
    }

    fn materialize(
        &mut self,
        declaration: &Declaration<A>,
        after: Option<Entity>,
    ) -> Result<(), AbstractionError> {
        match &declaration.target {
            Target::Pipeline(pipeline) => {
                self.build_pipeline(pipeline, &declaration.event, after)?;
            }
            Target::Pipe(pipe) => {
                if self.build_pipes.contains_key(pipe) {
                    return Ok(());
                }
                Pipeline::new().with(pipe).build(
                    &self.scheduler,
                    &declaration.event,
                    Some(&mut self.build_pipes),
                    after,
                )?;
            }
        }
        Ok(())
    }

    /// Builds `pipeline` against this builder's pipe cache.
    ///
    /// A pipeline built before returns its cached phases, whatever `event`
    /// and `after` are this time.
    ///
    /// # Errors
    ///
    /// Propagates phase registration failures.
    pub fn build_pipeline(
        &mut self,
        pipeline: &Pipeline,
        event: &Event<A>,
        after: Option<Entity>,
    ) -> Result<Vec<Entity>, AbstractionError> {
        if let Some(phases) = self.built_pipelines.get(pipeline) {
            return Ok(phases.clone());
        }
        let phases = pipeline.build(&self.scheduler, event, Some(&mut self.build_pipes), after)?;
        self.built_pipelines.insert(pipeline.clone(), phases.clone());
        Ok(phases)
    }

    fn attach(&mut self, system: &NamedSystem<A>, pipe: &Pipe) {
        if !self.build_pipes.contains_key(pipe) {
            tracing::warn!(
                system = system.name(),
                %pipe,
                "system attached to a pipe that was never built; its phase stays unbound"
            );
        }
        let id = self.scheduler.add_system(
            &pipe.name(),
            Arc::clone(&system.name),
            Arc::clone(&system.system),
        );
        self.system_names
            .insert(system.key, Arc::clone(&system.name));
        self.system_ids.entry(system.key).or_default().push(id);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Returns true once [`start`](Self::start) has completed.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Returns the underlying scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<A, S> {
        &self.scheduler
    }

    /// Returns the names of attached systems, by handle.
    #[must_use]
    pub fn system_names(&self) -> &HashMap<SystemKey, Arc<str>> {
        &self.system_names
    }

    /// Returns the phase of every materialized pipe.
    #[must_use]
    pub fn build_pipes(&self) -> &HashMap<Pipe, Entity> {
        &self.build_pipes
    }

    /// Returns the phases of every built pipeline.
    #[must_use]
    pub fn built_pipelines(&self) -> &HashMap<Pipeline, Vec<Entity>> {
        &self.built_pipelines
    }

    /// Returns the scheduler systems created for a declared system.
    #[must_use]
    pub fn system_ids(&self, system: &NamedSystem<A>) -> &[Entity] {
        self.system_ids
            .get(&system.key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn anchor_name(anchor: &Anchor) -> String {
    match anchor {
        Anchor::Pipe(pipe) => pipe.name(),
        Anchor::Pipeline(pipeline) => pipeline.last().map(Pipe::name).unwrap_or_default(),
    }
}
