//! Core plugins wired into a finished app.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rubine_app::{App, PluginGroup};
use rubine_core_plugins::introspection::{BindingSnapshot, INTROSPECTION_SYSTEM_NAME};
use rubine_core_plugins::{
    DefaultPhasesPlugin, DefaultPlugins, IntrospectionPlugin, JsonLinesSink, SchedulerSnapshot,
    TracingPlugin,
};
use rubine_scheduler::clock::{Clock, MockClock};
use rubine_scheduler::{ManualEvent, Scheduler, SchedulerConfig};
use rubine_world::World;

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

fn ticking_scheduler() -> Scheduler<f64> {
    let clock = Clock::with_provider(Arc::new(MockClock::ticking(
        Instant::now(),
        Duration::from_millis(1),
    )));
    Scheduler::with_config(World::new(), SchedulerConfig::new().with_clock(clock))
}

// ═══════════════════════════════════════════════════════════════════════════════
// DefaultPlugins
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn default_plugins_run_update_after_pre_update() {
    let heartbeat = ManualEvent::<f64>::new();
    let group = DefaultPlugins::<f64>::new(&heartbeat);
    let phases = group.phases();
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut app = App::<f64>::new();
    let l = Arc::clone(&log);
    phases.on(app.scheduler(), "Update", move |_: &f64| l.lock().push("update"));
    let l = Arc::clone(&log);
    phases.on(app.scheduler(), "PreUpdate", move |_: &f64| {
        l.lock().push("pre_update");
    });

    app.add_plugins(group.build().disable::<TracingPlugin>());
    app.finish().unwrap();
    assert!(app.has_plugin::<DefaultPhasesPlugin<f64>>());
    assert!(!app.has_plugin::<TracingPlugin>());

    heartbeat.fire(&0.016);
    heartbeat.fire(&0.016);
    assert_eq!(
        *log.lock(),
        vec!["pre_update", "update", "pre_update", "update"]
    );
}

#[test]
fn cleanup_disconnects_default_phases() {
    let heartbeat = ManualEvent::<f64>::new();
    let mut app = App::<f64>::new();
    app.add_plugins(DefaultPhasesPlugin::<f64>::new(&heartbeat));
    app.finish().unwrap();
    assert_eq!(heartbeat.connection_count(), 1);

    app.cleanup();
    assert_eq!(heartbeat.connection_count(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Introspection
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn introspection_writes_a_json_line_per_run() {
    let heartbeat = ManualEvent::<f64>::new();
    let defaults = DefaultPhasesPlugin::<f64>::new(&heartbeat);
    let phases = defaults.phases();
    let last = phases.phase_name("Last").unwrap();

    let sink = Arc::new(JsonLinesSink::new(Vec::new()));
    let introspection = IntrospectionPlugin::new(Arc::clone(&sink))
        .with_store_name("world")
        .with_phase(last);
    let handle = introspection.handle();

    let mut app = App::from_scheduler(ticking_scheduler());
    phases.on(app.scheduler(), "Update", |_: &f64| {});
    app.add_plugins(defaults);
    app.add_plugins(introspection);
    app.finish().unwrap();

    heartbeat.fire(&0.016);
    heartbeat.fire(&0.016);

    let output = sink.with_writer(|buffer| String::from_utf8(buffer.clone()).unwrap());
    let snapshots: Vec<SchedulerSnapshot> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(snapshots.len(), 2);

    let snapshot = &snapshots[1];
    assert_eq!(snapshot.stores, vec!["world"]);
    assert_eq!(snapshot.phases.len(), 5);

    let first = phases.phase_name("First").unwrap();
    assert!(matches!(
        snapshot.phase(&first).unwrap().binding,
        BindingSnapshot::Event { .. }
    ));

    let update = snapshot
        .systems
        .iter()
        .find(|system| system.name != INTROSPECTION_SYSTEM_NAME)
        .unwrap();
    assert!(update.has_run);
    assert_eq!(update.last_run_micros, Some(1_000));

    let own = snapshot.system(INTROSPECTION_SYSTEM_NAME).unwrap();
    assert_eq!(Some(own.id), handle.introspection_system().map(|e| e.index()));
}

#[test]
fn introspection_stops_after_cleanup() {
    let heartbeat = ManualEvent::<f64>::new();
    let sink = Arc::new(JsonLinesSink::new(Vec::new()));

    let mut app = App::<f64>::new();
    app.scheduler().phase("Debug", &heartbeat).unwrap();
    app.add_plugins(IntrospectionPlugin::new(Arc::clone(&sink)).with_phase("Debug"));
    app.finish().unwrap();
    app.cleanup();
    drop(app);

    heartbeat.fire(&0.016);
    assert!(sink.with_writer(|buffer| buffer.is_empty()));
}
