//! Integration tests for pipelines and the builder facade.
//!
//! Covers materialization into phases, pipe sharing across pipelines,
//! anchoring, idempotent start and end-to-end execution.

use hashbrown::HashMap;
use parking_lot::Mutex;
use rubine_abstractions::{
    AbstractionError, AbstractionScheduler, Abstractions, NamedSystem, Pipe, Pipeline,
};
use rubine_scheduler::hooks::{HookKind, SystemEvent};
use rubine_scheduler::{ManualEvent, PhaseBinding, Scheduler};
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<&'static str>>>);

impl Log {
    fn system(&self, label: &'static str) -> NamedSystem<f64> {
        let log = self.clone();
        NamedSystem::new(label, move |_: &f64| log.0.lock().push(label))
    }

    fn entries(&self) -> Vec<&'static str> {
        self.0.lock().clone()
    }
}

fn abstractions() -> (Abstractions<f64>, ManualEvent<f64>) {
    (Abstractions::new(Scheduler::new()), ManualEvent::new())
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline::build
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn build_chains_pipes_in_order() {
    let (abstractions, tick) = abstractions();
    let scheduler = abstractions.base();
    let p1 = abstractions.pipe(Some("p1"));
    let p2 = abstractions.pipe(Some("p2"));
    let p3 = abstractions.pipe(Some("p3"));
    let pipeline = abstractions.pipeline().with(&p1).with(&p2).with(&p3);

    let phases = pipeline.build(scheduler, &tick.event(), None, None).unwrap();

    assert_eq!(phases.len(), 3);
    assert!(matches!(
        scheduler.phase_binding(phases[0]),
        Some(PhaseBinding::Event(_))
    ));
    assert_eq!(
        scheduler.phase_binding(phases[1]),
        Some(PhaseBinding::After(phases[0]))
    );
    assert_eq!(
        scheduler.phase_binding(phases[2]),
        Some(PhaseBinding::After(phases[1]))
    );
    assert_eq!(scheduler.phase_named(&p2.name()), Some(phases[1]));
}

#[test]
fn build_after_anchors_the_first_pipe() {
    let (abstractions, tick) = abstractions();
    let scheduler = abstractions.base();
    let root = scheduler.phase("Root", &tick).unwrap();
    let pipeline = abstractions.pipeline().with(&abstractions.pipe(None));

    let phases = pipeline
        .build(scheduler, &tick.event(), None, Some(root))
        .unwrap();

    assert_eq!(
        scheduler.phase_binding(phases[0]),
        Some(PhaseBinding::After(root))
    );
}

#[test]
fn shared_pipe_is_materialized_once() {
    let (abstractions, tick) = abstractions();
    let scheduler = abstractions.base();
    let shared = abstractions.pipe(Some("shared"));
    let a = abstractions.pipe(Some("a"));
    let b = abstractions.pipe(Some("b"));

    let first = abstractions.pipeline().with(&shared).with(&a);
    let second = abstractions.pipeline().with(&shared).with(&b);

    let mut built = HashMap::new();
    let first_phases = first
        .build(scheduler, &tick.event(), Some(&mut built), None)
        .unwrap();
    let second_phases = second
        .build(scheduler, &tick.event(), Some(&mut built), None)
        .unwrap();

    assert_eq!(first_phases[0], second_phases[0]);
    assert_eq!(built.len(), 3);
    assert_eq!(scheduler.phases().len(), 3);
    assert_eq!(
        scheduler.phase_binding(second_phases[1]),
        Some(PhaseBinding::After(first_phases[0]))
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// AbstractionScheduler
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn start_twice_creates_nothing_new() {
    let (abstractions, tick) = abstractions();
    let log = Log::default();
    let pipe = abstractions.pipe(None);
    let pipeline = abstractions.pipeline().with(&pipe);
    let system = log.system("s");

    let mut builder = abstractions.scheduler();
    builder
        .with_pipeline(&pipeline, &tick)
        .unwrap()
        .with_system(&system, &pipe)
        .unwrap();
    builder.start().unwrap();

    let phases = abstractions.base().phases();
    let systems = abstractions.base().systems();
    builder.start().unwrap();

    assert_eq!(abstractions.base().phases(), phases);
    assert_eq!(abstractions.base().systems(), systems);

    tick.fire(&1.0);
    assert_eq!(log.entries(), vec!["s"]);
}

#[test]
fn end_to_end_pipeline_runs_systems_in_pipe_order() {
    let (abstractions, tick) = abstractions();
    let log = Log::default();
    let pre_update = abstractions.pipe(Some("PreUpdate"));
    let update = abstractions.pipe(Some("Update"));
    let frame = abstractions.pipeline().with(&pre_update).with(&update);

    let mut builder = abstractions.scheduler();
    builder
        .with_pipeline(&frame, &tick)
        .unwrap()
        .with_system(&log.system("B"), &update)
        .unwrap()
        .with_systems([&log.system("A1"), &log.system("A2")], &pre_update)
        .unwrap()
        .start()
        .unwrap();

    tick.fire(&1.0);
    assert_eq!(log.entries(), vec!["A1", "A2", "B"]);
}

#[test]
fn pipeline_anchored_after_another_resolves_regardless_of_order() {
    let (abstractions, tick) = abstractions();
    let log = Log::default();
    let early = abstractions.pipe(Some("early"));
    let late = abstractions.pipe(Some("late"));
    let first = abstractions.pipeline().with(&early);
    let second = abstractions.pipeline().with(&late);

    let mut builder = abstractions.scheduler();
    builder
        .with_pipeline_after(&second, &tick, &first)
        .unwrap()
        .with_pipeline(&first, &tick)
        .unwrap()
        .with_system(&log.system("late"), &late)
        .unwrap()
        .with_system(&log.system("early"), &early)
        .unwrap()
        .start()
        .unwrap();

    tick.fire(&1.0);
    assert_eq!(log.entries(), vec!["early", "late"]);

    let early_phase = builder.build_pipes()[&early];
    let late_phase = builder.build_pipes()[&late];
    assert_eq!(
        abstractions.base().phase_binding(late_phase),
        Some(PhaseBinding::After(early_phase))
    );
}

#[test]
fn pipe_anchored_after_pipe() {
    let (abstractions, tick) = abstractions();
    let root = abstractions.pipe(Some("root"));
    let child = abstractions.pipe(Some("child"));

    let mut builder = abstractions.scheduler();
    builder
        .with_pipe(&root, &tick)
        .unwrap()
        .with_pipe_after(&child, &tick, &root)
        .unwrap()
        .start()
        .unwrap();

    let root_phase = builder.build_pipes()[&root];
    assert_eq!(
        abstractions.base().dependents_of(root_phase),
        vec![builder.build_pipes()[&child]]
    );
}

#[test]
fn rebuilding_a_cached_pipeline_returns_the_cached_phases() {
    let (abstractions, tick) = abstractions();
    let other = ManualEvent::<f64>::new();
    let pipeline = abstractions
        .pipeline()
        .with(&abstractions.pipe(None))
        .with(&abstractions.pipe(None));

    let mut builder = AbstractionScheduler::new(abstractions.base().clone());
    let first = builder
        .build_pipeline(&pipeline, &tick.event(), None)
        .unwrap();
    let second = builder
        .build_pipeline(&pipeline, &other.event(), None)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(builder.built_pipelines().len(), 1);
}

#[test]
fn system_on_unbuilt_pipe_stays_dormant() {
    let (abstractions, tick) = abstractions();
    let log = Log::default();
    let built = abstractions.pipe(None);
    let dormant = abstractions.pipe(None);

    let mut builder = abstractions.scheduler();
    builder
        .with_pipe(&built, &tick)
        .unwrap()
        .with_system(&log.system("ghost"), &dormant)
        .unwrap()
        .start()
        .unwrap();

    tick.fire(&1.0);
    assert!(log.entries().is_empty());
    assert!(builder.build_pipes().get(&dormant).is_none());
}

#[test]
fn pause_by_name_targets_declared_systems() {
    let (abstractions, tick) = abstractions();
    let log = Log::default();
    let pipe = abstractions.pipe(None);
    let keep = log.system("keep");
    let skip = log.system("skip");

    let mut builder = abstractions.scheduler();
    builder
        .with_pipe(&pipe, &tick)
        .unwrap()
        .with_systems([&keep, &skip], &pipe)
        .unwrap();
    builder.pause_system("skip").start().unwrap();

    tick.fire(&1.0);
    assert_eq!(log.entries(), vec!["keep"]);

    builder.unpause_system(&skip);
    tick.fire(&1.0);
    assert_eq!(log.entries(), vec!["keep", "keep", "skip"]);
}

#[test]
fn redefining_a_pipe_with_another_event_surfaces_scheduler_error() {
    let (abstractions, tick) = abstractions();
    let other = ManualEvent::<f64>::new();
    let pipe = abstractions.pipe(None);
    abstractions.base().phase(&pipe.name(), &other).unwrap();

    let mut builder = abstractions.scheduler();
    builder.with_pipe(&pipe, &tick).unwrap();

    assert!(matches!(
        builder.start(),
        Err(AbstractionError::Scheduler(_))
    ));
}

#[test]
fn failed_start_keeps_untried_declarations_for_retry() {
    let (abstractions, tick) = abstractions();
    let other = ManualEvent::<f64>::new();
    let log = Log::default();
    let taken = abstractions.pipe(Some("a"));
    let free = abstractions.pipe(Some("b"));
    abstractions.base().phase(&taken.name(), &other).unwrap();

    let mut builder = abstractions.scheduler();
    builder
        .with_pipe(&taken, &tick)
        .unwrap()
        .with_pipe(&free, &tick)
        .unwrap()
        .with_system(&log.system("late"), &free)
        .unwrap();

    assert!(matches!(
        builder.start(),
        Err(AbstractionError::Scheduler(_))
    ));
    assert!(!builder.build_pipes().contains_key(&free));

    // The retry hits the same conflict instead of starting with `free` lost.
    assert!(matches!(
        builder.start(),
        Err(AbstractionError::Scheduler(_))
    ));
    assert!(!builder.is_started());
    assert!(abstractions.base().systems().is_empty());
}

#[test]
fn hooks_registered_through_facade_observe_builder_systems() {
    let (abstractions, tick) = abstractions();
    let added = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&added);
    abstractions.hook(HookKind::SystemAdd, move |event: &SystemEvent| {
        if let SystemEvent::SystemAdd { name, .. } = event {
            sink.lock().push(name.to_string());
        }
    });

    let pipe = abstractions.pipe(None);
    let mut builder = abstractions.scheduler();
    builder
        .with_pipe(&pipe, &tick)
        .unwrap()
        .with_system(&NamedSystem::new("physics", |_: &f64| {}), &pipe)
        .unwrap()
        .start()
        .unwrap();

    assert_eq!(*added.lock(), vec!["physics".to_owned()]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Property Tests
// ─────────────────────────────────────────────────────────────────────────────

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        /// Pipelines drawn from a shared pool of pipes, built against one
        /// cache, create exactly one phase per distinct pipe.
        #[test]
        fn prop_shared_pipes_materialize_once(
            selections in prop::collection::vec(
                prop::collection::vec(0..8usize, 1..6),
                1..6,
            ),
        ) {
            let (abstractions, tick) = abstractions();
            let pool: Vec<Pipe> = (0..8).map(|_| abstractions.pipe(None)).collect();

            let mut built = HashMap::new();
            let mut distinct = std::collections::BTreeSet::new();
            for selection in &selections {
                let mut pipeline = Pipeline::new();
                for index in selection {
                    pipeline = pipeline.with(&pool[*index]);
                }
                for pipe in pipeline.pipes() {
                    distinct.insert(pipe.id());
                }
                let phases = pipeline
                    .build(abstractions.base(), &tick.event(), Some(&mut built), None)
                    .unwrap();
                prop_assert_eq!(phases.len(), pipeline.len());
                for (pipe, phase) in pipeline.pipes().iter().zip(&phases) {
                    prop_assert_eq!(built[pipe], *phase);
                }
            }

            prop_assert_eq!(built.len(), distinct.len());
            prop_assert_eq!(abstractions.base().phases().len(), distinct.len());
        }
    }
}
