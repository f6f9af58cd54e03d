//! Integration tests for the app lifecycle.

use parking_lot::Mutex;
use rubine_abstractions::{NamedSystem, Pipe};
use rubine_app::{
    App, AppError, Node, Plugin, PluginGroup, PluginGroupBuilder, PluginId, SystemDefinition,
};
use rubine_scheduler::ManualEvent;
use std::sync::Arc;

type Log = Arc<Mutex<Vec<&'static str>>>;

// ═══════════════════════════════════════════════════════════════════════════
// Test plugins
// ═══════════════════════════════════════════════════════════════════════════

/// Declares a single-pipe frame on the heartbeat and shares the pipe.
struct FramePlugin {
    heartbeat: ManualEvent<f64>,
    frame: Pipe,
}

impl Plugin<f64> for FramePlugin {
    fn build(&self, app: &mut App<f64>) -> Result<(), AppError> {
        app.builder().with_pipe(&self.frame, &self.heartbeat)?;
        Ok(())
    }
}

/// Adds a system to the frame pipe; depends on [`FramePlugin`].
struct MovementPlugin {
    frame: Pipe,
    log: Log,
}

impl Plugin<f64> for MovementPlugin {
    fn build(&self, app: &mut App<f64>) -> Result<(), AppError> {
        let log = Arc::clone(&self.log);
        let system = NamedSystem::new("movement", move |_: &f64| log.lock().push("movement"));
        app.builder().with_system(&system, &self.frame)?;
        Ok(())
    }

    fn dependencies(&self) -> Vec<PluginId> {
        vec![PluginId::of::<FramePlugin>()]
    }
}

/// Loads systems from a scene once every plugin is built.
struct ScenePlugin {
    log: Log,
}

impl Plugin<f64> for ScenePlugin {
    fn build(&self, _app: &mut App<f64>) -> Result<(), AppError> {
        Ok(())
    }

    fn ready(&self, app: &mut App<f64>) {
        let log = Arc::clone(&self.log);
        let scene = Node::new("ReplicatedStorage").with_child(
            Node::new("Systems").with_child(Node::system(
                "Spawner",
                SystemDefinition::new("Late", move |_: &f64| log.lock().push("spawner"))
                    .named("spawner"),
            )),
        );
        app.load_descendants(&scene);
    }
}

struct Gameplay {
    heartbeat: ManualEvent<f64>,
    log: Log,
}

impl PluginGroup<f64> for Gameplay {
    fn build(self) -> PluginGroupBuilder<f64> {
        let frame = Pipe::new(Some("Frame"));
        PluginGroupBuilder::new()
            .add(MovementPlugin {
                frame: frame.clone(),
                log: Arc::clone(&self.log),
            })
            .add(FramePlugin {
                heartbeat: self.heartbeat,
                frame,
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn plugin_group_materializes_on_finish() {
    let heartbeat = ManualEvent::<f64>::new();
    let log = Log::default();
    let mut app = App::<f64>::new();
    app.add_plugins(
        Gameplay {
            heartbeat: heartbeat.clone(),
            log: Arc::clone(&log),
        }
        .build(),
    );

    heartbeat.fire(&0.016);
    assert!(log.lock().is_empty());

    app.finish().unwrap();
    assert!(app.scheduler().is_started());
    heartbeat.fire(&0.016);
    assert_eq!(*log.lock(), vec!["movement"]);
}

#[test]
fn scene_systems_join_phases_bound_later() {
    let heartbeat = ManualEvent::<f64>::new();
    let log = Log::default();
    let mut app = App::<f64>::new();
    app.add_plugins(ScenePlugin {
        log: Arc::clone(&log),
    });
    app.finish().unwrap();

    heartbeat.fire(&0.016);
    assert!(log.lock().is_empty());

    app.scheduler().phase("Late", &heartbeat).unwrap();
    heartbeat.fire(&0.016);
    assert_eq!(*log.lock(), vec!["spawner"]);
}

#[test]
fn cleanup_disconnects_the_scheduler() {
    let heartbeat = ManualEvent::<f64>::new();
    let log = Log::default();
    let mut app = App::<f64>::new();
    app.add_plugins(
        Gameplay {
            heartbeat: heartbeat.clone(),
            log: Arc::clone(&log),
        }
        .build(),
    );
    app.finish().unwrap();
    app.cleanup();

    heartbeat.fire(&0.016);
    assert!(log.lock().is_empty());
    assert_eq!(heartbeat.connection_count(), 0);
}

#[test]
fn build_errors_abort_finish() {
    struct Conflicting(ManualEvent<f64>);

    impl Plugin<f64> for Conflicting {
        fn build(&self, app: &mut App<f64>) -> Result<(), AppError> {
            app.scheduler().phase("Update", &self.0)?;
            app.scheduler().phase("Update", &ManualEvent::<f64>::new())?;
            Ok(())
        }
    }

    let mut app = App::<f64>::new();
    app.add_plugins(Conflicting(ManualEvent::new()));

    assert!(matches!(app.finish(), Err(AppError::Scheduler(_))));
    assert!(!app.is_finished());
    assert!(!app.scheduler().is_started());
}
