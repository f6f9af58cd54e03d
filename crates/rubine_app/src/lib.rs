//! Application layer for Rubine.
//!
//! An [`App`] owns a [`Scheduler`](rubine_scheduler::Scheduler), its
//! [`Abstractions`](rubine_abstractions::Abstractions) facade and a set of
//! [`Plugin`]s. Plugins declare phases, pipelines, systems and hooks while
//! the app is being built; [`App::finish`] orders them by dependency, builds
//! and readies them, then materializes every declaration and starts the
//! scheduler.
//!
//! The [`scene`] module loads systems from a scene graph, for hosts that
//! keep system definitions as nodes of a tree.
//!
//! # Example
//!
//! ```
//! use rubine_app::{App, AppError, Plugin};
//! use rubine_scheduler::ManualEvent;
//!
//! struct Heartbeat(ManualEvent<f64>);
//!
//! impl Plugin<f64> for Heartbeat {
//!     fn build(&self, app: &mut App<f64>) -> Result<(), AppError> {
//!         app.scheduler().phase("Update", &self.0)?;
//!         app.scheduler().on("Update", |dt: &f64| assert!(*dt > 0.0));
//!         Ok(())
//!     }
//! }
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let mut app = App::<f64>::new();
//! app.add_plugins(Heartbeat(heartbeat.clone()));
//! app.finish()?;
//!
//! heartbeat.fire(&0.016);
//! app.cleanup();
//! # Ok::<(), AppError>(())
//! ```

mod app;
mod error;
pub mod plugin;
pub mod scene;

pub use app::App;
pub use error::AppError;
pub use plugin::{Plugin, PluginGroup, PluginGroupBuilder, PluginId, Plugins};
pub use scene::{Node, SceneNode, SystemDefinition};
