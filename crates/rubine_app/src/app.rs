//! The [`App`]: a scheduler, its composition layer and the plugins
//! configuring them.
//!
//! # Lifecycle
//!
//! 1. **Dependency resolution** - plugins are topologically sorted
//! 2. **Build** - `build()` in dependency order
//! 3. **Ready** - `ready()` in dependency order
//! 4. **Start** - builder declarations are materialized and the scheduler starts
//! 5. **Cleanup** - `cleanup()` in reverse order, then the scheduler shuts down

use core::fmt;

use hashbrown::{HashMap, HashSet};
use rubine_abstractions::{AbstractionScheduler, Abstractions};
use rubine_scheduler::Scheduler;
use rubine_world::Entity;

use crate::error::AppError;
use crate::plugin::{Plugin, PluginId, Plugins};
use crate::scene::{self, SceneNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    NotStarted,
    Building,
    Finished,
}

struct PluginEntry<A: 'static> {
    id: PluginId,
    plugin: Box<dyn Plugin<A>>,
    name: String,
}

/// Plugin orchestrator around a [`Scheduler`].
pub struct App<A: 'static = ()> {
    abstractions: Abstractions<A>,
    builder: AbstractionScheduler<A>,
    pending_plugins: Vec<PluginEntry<A>>,
    built_plugins: Vec<PluginEntry<A>>,
    plugin_ids: HashSet<PluginId>,
    rejected: Vec<AppError>,
    state: BuildState,
}

impl<A: 'static> Default for App<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> fmt::Debug for App<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("state", &self.state)
            .field(
                "plugins",
                &self
                    .built_plugins
                    .iter()
                    .chain(&self.pending_plugins)
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<A: 'static> App<A> {
    /// Creates an app around a fresh scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::from_scheduler(Scheduler::new())
    }

    /// Creates an app around an existing scheduler.
    #[must_use]
    pub fn from_scheduler(scheduler: Scheduler<A>) -> Self {
        let abstractions = Abstractions::new(scheduler);
        let builder = abstractions.scheduler();
        Self {
            abstractions,
            builder,
            pending_plugins: Vec::new(),
            built_plugins: Vec::new(),
            plugin_ids: HashSet::new(),
            rejected: Vec::new(),
            state: BuildState::NotStarted,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<A> {
        self.abstractions.base()
    }

    /// Returns the composition layer.
    #[must_use]
    pub fn abstractions(&self) -> &Abstractions<A> {
        &self.abstractions
    }

    /// Returns the shared builder materialized by [`finish`](Self::finish).
    pub fn builder(&mut self) -> &mut AbstractionScheduler<A> {
        &mut self.builder
    }

    /// Returns true once [`finish`](Self::finish) has succeeded.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == BuildState::Finished
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plugin Management
    // ─────────────────────────────────────────────────────────────────────────

    /// Adds a plugin or a plugin group.
    ///
    /// A unique plugin added twice is rejected; the rejection surfaces from
    /// [`finish`](Self::finish).
    pub fn add_plugins<M, P: Plugins<A, M>>(&mut self, plugins: P) -> &mut Self {
        plugins.add_to_app(self);
        self
    }

    pub(crate) fn add_plugin_boxed(&mut self, id: PluginId, plugin: Box<dyn Plugin<A>>) {
        let name = plugin.name().to_owned();

        if plugin.is_unique() && self.plugin_ids.contains(&id) {
            tracing::warn!(plugin = %name, "unique plugin added twice");
            self.rejected.push(AppError::DuplicatePlugin { plugin: name });
            return;
        }
        self.plugin_ids.insert(id);

        let entry = PluginEntry { id, plugin, name };
        if self.state == BuildState::Building {
            // Sub-plugins added from `build` are built on the spot.
            if let Err(err) = entry.plugin.build(self) {
                self.rejected.push(err);
            }
            self.built_plugins.push(entry);
        } else {
            self.pending_plugins.push(entry);
        }
    }

    /// Returns true if a plugin of type `P` was added.
    #[must_use]
    pub fn has_plugin<P: 'static>(&self) -> bool {
        self.plugin_ids.contains(&PluginId::of::<P>())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Builds and readies every plugin, then starts the scheduler.
    ///
    /// Runs once. A failure after building began leaves the app unfinished,
    /// and later calls fail with [`AppError::AlreadyFinished`].
    ///
    /// # Errors
    ///
    /// - [`AppError::AlreadyFinished`] on a second call
    /// - [`AppError::DuplicatePlugin`] if a unique plugin was added twice
    /// - [`AppError::MissingDependency`] or [`AppError::CircularDependency`]
    ///   if plugins cannot be ordered
    /// - the first error returned by a plugin's `build`
    /// - [`AppError::Abstraction`] if builder declarations cannot be materialized
    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.state != BuildState::NotStarted {
            return Err(AppError::AlreadyFinished);
        }
        if let Some(err) = self.rejected.drain(..).next() {
            return Err(err);
        }

        let sorted = self.sort_plugins_by_dependencies()?;

        self.state = BuildState::Building;
        for entry in sorted {
            tracing::debug!(plugin = %entry.name, "building plugin");
            let result = entry.plugin.build(self);
            self.built_plugins.push(entry);
            result?;
        }
        if let Some(err) = self.rejected.drain(..).next() {
            return Err(err);
        }

        let built = core::mem::take(&mut self.built_plugins);
        for entry in &built {
            entry.plugin.ready(self);
        }
        let late = core::mem::replace(&mut self.built_plugins, built);
        self.built_plugins.extend(late);

        self.builder.start()?;
        self.state = BuildState::Finished;
        tracing::debug!(plugins = self.built_plugins.len(), "app finished");
        Ok(())
    }

    /// Cleans up plugins in reverse dependency order and disconnects the
    /// scheduler from its events.
    pub fn cleanup(&mut self) {
        let built = core::mem::take(&mut self.built_plugins);
        for entry in built.iter().rev() {
            entry.plugin.cleanup(self);
        }
        self.built_plugins = built;
        self.scheduler().shutdown();
    }

    fn sort_plugins_by_dependencies(&mut self) -> Result<Vec<PluginEntry<A>>, AppError> {
        let pending = core::mem::take(&mut self.pending_plugins);
        let n = pending.len();

        let mut index_of: HashMap<PluginId, usize> = HashMap::new();
        for (i, entry) in pending.iter().enumerate() {
            index_of.entry(entry.id).or_insert(i);
        }

        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, entry) in pending.iter().enumerate() {
            for dependency in entry.plugin.dependencies() {
                if let Some(&dep) = index_of.get(&dependency) {
                    dependents[dep].push(i);
                    in_degree[i] += 1;
                } else if !self.built_plugins.iter().any(|p| p.id == dependency) {
                    let plugin = entry.name.clone();
                    self.pending_plugins = pending;
                    return Err(AppError::MissingDependency {
                        plugin,
                        dependency: dependency.type_name(),
                    });
                }
            }
        }

        // Kahn's algorithm, seeded in insertion order.
        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).rev().collect();
        let mut order = Vec::with_capacity(n);
        while let Some(idx) = ready.pop() {
            order.push(idx);
            let mut unlocked = Vec::new();
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    unlocked.push(dependent);
                }
            }
            unlocked.sort_unstable_by(|a, b| b.cmp(a));
            ready.extend(unlocked);
        }

        if order.len() != n {
            let plugins = in_degree
                .iter()
                .enumerate()
                .filter(|(_, degree)| **degree > 0)
                .map(|(i, _)| pending[i].name.clone())
                .collect();
            self.pending_plugins = pending;
            return Err(AppError::CircularDependency { plugins });
        }

        let mut slots: Vec<Option<PluginEntry<A>>> = pending.into_iter().map(Some).collect();
        Ok(order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scene Loading
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers the systems defined on the direct children of `node`.
    pub fn load_children<N: SceneNode<A>>(&self, node: &N) -> Vec<Entity> {
        scene::load_children(self.scheduler(), node)
    }

    /// Registers the systems defined anywhere below `node`.
    pub fn load_descendants<N: SceneNode<A>>(&self, node: &N) -> Vec<Entity> {
        scene::load_descendants(self.scheduler(), node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder<const N: usize> {
        log: Log,
        deps: Vec<PluginId>,
    }

    impl<const N: usize> Plugin<()> for Recorder<N> {
        fn build(&self, _app: &mut App) -> Result<(), AppError> {
            self.log.lock().push(format!("build {N}"));
            Ok(())
        }
        fn ready(&self, _app: &mut App) {
            self.log.lock().push(format!("ready {N}"));
        }
        fn cleanup(&self, _app: &mut App) {
            self.log.lock().push(format!("cleanup {N}"));
        }
        fn dependencies(&self) -> Vec<PluginId> {
            self.deps.clone()
        }
    }

    fn recorder<const N: usize>(log: &Log, deps: Vec<PluginId>) -> Recorder<N> {
        Recorder {
            log: Arc::clone(log),
            deps,
        }
    }

    #[test]
    fn lifecycle_follows_dependency_order() {
        let log = Log::default();
        let mut app = App::<()>::new();
        app.add_plugins(recorder::<2>(&log, vec![PluginId::of::<Recorder<1>>()]))
            .add_plugins(recorder::<1>(&log, Vec::new()));
        app.finish().unwrap();
        app.cleanup();

        assert_eq!(
            *log.lock(),
            vec![
                "build 1", "build 2", "ready 1", "ready 2", "cleanup 2", "cleanup 1"
            ]
        );
        assert!(app.is_finished());
    }

    #[test]
    fn missing_dependency_is_reported() {
        let log = Log::default();
        let mut app = App::<()>::new();
        app.add_plugins(recorder::<1>(&log, vec![PluginId::of::<Recorder<9>>()]));

        assert!(matches!(
            app.finish(),
            Err(AppError::MissingDependency { .. })
        ));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn cycle_is_reported() {
        let log = Log::default();
        let mut app = App::<()>::new();
        app.add_plugins(recorder::<1>(&log, vec![PluginId::of::<Recorder<2>>()]))
            .add_plugins(recorder::<2>(&log, vec![PluginId::of::<Recorder<1>>()]));

        match app.finish() {
            Err(AppError::CircularDependency { plugins }) => assert_eq!(plugins.len(), 2),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_unique_plugin_is_rejected() {
        let log = Log::default();
        let mut app = App::<()>::new();
        app.add_plugins(recorder::<1>(&log, Vec::new()))
            .add_plugins(recorder::<1>(&log, Vec::new()));

        assert!(matches!(
            app.finish(),
            Err(AppError::DuplicatePlugin { .. })
        ));
    }

    #[test]
    fn finish_twice_fails() {
        let mut app = App::<()>::new();
        app.finish().unwrap();
        assert!(matches!(app.finish(), Err(AppError::AlreadyFinished)));
    }
}
