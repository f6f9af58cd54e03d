//! Plugins: the unit of composition for an [`App`].
//!
//! A plugin declares phases, pipelines, systems and hooks against the app
//! during `build`, then finishes any wiring that depends on other plugins
//! during `ready`.
//!
//! # Example
//!
//! ```
//! use rubine_app::{App, AppError, Plugin, PluginId};
//!
//! struct InputPlugin;
//!
//! impl Plugin<f64> for InputPlugin {
//!     fn build(&self, app: &mut App<f64>) -> Result<(), AppError> {
//!         app.scheduler().on("Update", |_: &f64| {});
//!         Ok(())
//!     }
//! }
//!
//! struct CameraPlugin;
//!
//! impl Plugin<f64> for CameraPlugin {
//!     fn build(&self, _app: &mut App<f64>) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<InputPlugin>()]
//!     }
//! }
//!
//! let mut app = App::<f64>::new();
//! app.add_plugins(CameraPlugin).add_plugins(InputPlugin);
//! app.finish()?;
//! # Ok::<(), AppError>(())
//! ```

use core::any::TypeId;

use crate::app::App;
use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// PluginId
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a plugin type, used for dependency ordering and duplicate
/// detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Returns the identity of plugin type `P`.
    #[must_use]
    pub fn of<P: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A bundle of phases, systems and hooks added to an [`App`].
///
/// Lifecycle, driven by [`App::finish`] and [`App::cleanup`]:
///
/// 1. `build()` in dependency order
/// 2. `ready()` in dependency order
/// 3. the scheduler starts
/// 4. `cleanup()` in reverse dependency order
pub trait Plugin<A: 'static>: Send + Sync + 'static {
    /// Declares what the plugin contributes.
    ///
    /// # Errors
    ///
    /// An error aborts [`App::finish`].
    fn build(&self, app: &mut App<A>) -> Result<(), AppError>;

    /// Called once every plugin is built, before the scheduler starts.
    fn ready(&self, _app: &mut App<A>) {}

    /// Called on shutdown, dependents before their dependencies.
    fn cleanup(&self, _app: &mut App<A>) {}

    /// Name used in logs and errors. Defaults to the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Plugins that must be built before this one.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Whether adding this plugin type twice is an error. Defaults to `true`.
    fn is_unique(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugins Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Anything [`App::add_plugins`] accepts: a single [`Plugin`] or a
/// [`PluginGroupBuilder`].
///
/// `M` is a marker type that keeps the two impls coherent; it is inferred.
pub trait Plugins<A: 'static, M> {
    /// Adds these plugins to `app`.
    fn add_to_app(self, app: &mut App<A>);
}

/// Marker for the [`Plugins`] impl on a single [`Plugin`].
#[doc(hidden)]
pub struct PluginMarker;

/// Marker for the [`Plugins`] impl on a [`PluginGroupBuilder`].
#[doc(hidden)]
pub struct PluginGroupMarker;

impl<A: 'static, P: Plugin<A>> Plugins<A, PluginMarker> for P {
    fn add_to_app(self, app: &mut App<A>) {
        app.add_plugin_boxed(PluginId::of::<P>(), Box::new(self));
    }
}

impl<A: 'static> Plugins<A, PluginGroupMarker> for PluginGroupBuilder<A> {
    fn add_to_app(self, app: &mut App<A>) {
        for boxed in self.plugins {
            app.add_plugin_boxed(boxed.id, boxed.plugin);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PluginGroup
// ─────────────────────────────────────────────────────────────────────────────

/// A named collection of plugins added together.
pub trait PluginGroup<A: 'static> {
    /// Returns the plugins in this group.
    fn build(self) -> PluginGroupBuilder<A>;
}

pub(crate) struct BoxedPlugin<A: 'static> {
    pub(crate) id: PluginId,
    pub(crate) plugin: Box<dyn Plugin<A>>,
}

/// Ordered, editable list of plugins produced by a [`PluginGroup`].
pub struct PluginGroupBuilder<A: 'static> {
    pub(crate) plugins: Vec<BoxedPlugin<A>>,
}

impl<A: 'static> Default for PluginGroupBuilder<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> PluginGroupBuilder<A> {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    fn boxed<P: Plugin<A>>(plugin: P) -> BoxedPlugin<A> {
        BoxedPlugin {
            id: PluginId::of::<P>(),
            plugin: Box::new(plugin),
        }
    }

    fn position_of<P: 'static>(&self) -> Option<usize> {
        let id = PluginId::of::<P>();
        self.plugins.iter().position(|p| p.id == id)
    }

    /// Appends a plugin.
    #[must_use]
    #[expect(
        clippy::should_implement_trait,
        reason = "This is a builder method, not std::ops::Add"
    )]
    pub fn add<P: Plugin<A>>(mut self, plugin: P) -> Self {
        self.plugins.push(Self::boxed(plugin));
        self
    }

    /// Inserts a plugin before `Target`, or first when `Target` is absent.
    #[must_use]
    pub fn add_before<P: Plugin<A>, Target: 'static>(mut self, plugin: P) -> Self {
        let position = self.position_of::<Target>().unwrap_or(0);
        self.plugins.insert(position, Self::boxed(plugin));
        self
    }

    /// Inserts a plugin after `Target`, or last when `Target` is absent.
    #[must_use]
    pub fn add_after<P: Plugin<A>, Target: 'static>(mut self, plugin: P) -> Self {
        let position = self
            .position_of::<Target>()
            .map_or(self.plugins.len(), |i| i + 1);
        self.plugins.insert(position, Self::boxed(plugin));
        self
    }

    /// Removes every plugin of type `P`.
    #[must_use]
    pub fn disable<P: 'static>(mut self) -> Self {
        let id = PluginId::of::<P>();
        self.plugins.retain(|p| p.id != id);
        self
    }

    /// Returns true if the group holds a plugin of type `P`.
    #[must_use]
    pub fn contains<P: 'static>(&self) -> bool {
        self.position_of::<P>().is_some()
    }

    /// Returns the number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if the group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PluginA;
    impl Plugin<()> for PluginA {
        fn build(&self, _app: &mut App) -> Result<(), AppError> {
            Ok(())
        }
    }

    struct PluginB;
    impl Plugin<()> for PluginB {
        fn build(&self, _app: &mut App) -> Result<(), AppError> {
            Ok(())
        }
        fn dependencies(&self) -> Vec<PluginId> {
            vec![PluginId::of::<PluginA>()]
        }
    }

    struct PluginC;
    impl Plugin<()> for PluginC {
        fn build(&self, _app: &mut App) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn names(builder: &PluginGroupBuilder<()>) -> Vec<&str> {
        builder.plugins.iter().map(|p| p.plugin.name()).collect()
    }

    #[test]
    fn plugin_id_equality() {
        assert_eq!(PluginId::of::<PluginA>(), PluginId::of::<PluginA>());
        assert_ne!(PluginId::of::<PluginA>(), PluginId::of::<PluginB>());
        assert!(PluginId::of::<PluginA>().type_name().contains("PluginA"));
    }

    #[test]
    fn plugin_defaults() {
        assert!(PluginA.name().contains("PluginA"));
        assert!(PluginA.is_unique());
        assert!(PluginA.dependencies().is_empty());
        assert_eq!(PluginB.dependencies(), vec![PluginId::of::<PluginA>()]);
    }

    #[test]
    fn group_add_before_and_after() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .add_before::<_, PluginB>(PluginC);
        let order = names(&builder);
        assert!(order[0].contains("PluginA"));
        assert!(order[1].contains("PluginC"));
        assert!(order[2].contains("PluginB"));

        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add_after::<_, PluginB>(PluginC);
        assert!(names(&builder)[1].contains("PluginC"));
    }

    #[test]
    fn group_disable() {
        let builder = PluginGroupBuilder::new()
            .add(PluginA)
            .add(PluginB)
            .disable::<PluginA>()
            .disable::<PluginC>();

        assert_eq!(builder.len(), 1);
        assert!(builder.contains::<PluginB>());
        assert!(!builder.contains::<PluginA>());
    }
}
