//! Immutable, ordered pipe sequences.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use rubine_scheduler::{Event, PhaseTrigger, Scheduler, SchedulerError};
use rubine_world::{Entity, Store};

use crate::error::AbstractionError;
use crate::pipe::Pipe;

static NEXT_PIPELINE: AtomicU64 = AtomicU64::new(0);

/// An ordered sequence of distinct pipes.
///
/// Pipelines never change: [`with`](Self::with) returns a new pipeline and
/// leaves the receiver untouched. Each pipeline value has an identity, which
/// the builder uses to recognize a pipeline it has already built.
///
/// # Example
///
/// ```
/// use rubine_abstractions::{Pipe, Pipeline};
///
/// let input = Pipe::new(Some("input"));
/// let physics = Pipe::new(Some("physics"));
///
/// let base = Pipeline::new().with(&input);
/// let full = base.with(&physics);
///
/// assert_eq!(base.pipes(), &[input.clone()]);
/// assert_eq!(full.pipes(), &[input, physics]);
/// ```
#[derive(Clone)]
pub struct Pipeline {
    id: u64,
    pipes: Arc<[Pipe]>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::from_pipes(Arc::from([]))
    }

    fn from_pipes(pipes: Arc<[Pipe]>) -> Self {
        Self {
            id: NEXT_PIPELINE.fetch_add(1, Ordering::Relaxed),
            pipes,
        }
    }

    /// Returns a new pipeline with `pipe` appended.
    ///
    /// A pipe already in the sequence is ignored with a warning and the
    /// receiver is returned as is.
    #[must_use]
    pub fn with(&self, pipe: &Pipe) -> Self {
        match self.try_with(pipe) {
            Ok(pipeline) => pipeline,
            Err(_) => {
                tracing::warn!(%pipe, "pipe already in pipeline, ignoring");
                self.clone()
            }
        }
    }

    /// Returns a new pipeline with `pipe` appended.
    ///
    /// # Errors
    ///
    /// Returns [`AbstractionError::DuplicatePipe`] if `pipe` is already part
    /// of the sequence.
    pub fn try_with(&self, pipe: &Pipe) -> Result<Self, AbstractionError> {
        if self.contains(pipe) {
            return Err(AbstractionError::DuplicatePipe { pipe: pipe.name() });
        }
        let pipes: Vec<Pipe> = self.pipes.iter().chain([pipe]).cloned().collect();
        Ok(Self::from_pipes(pipes.into()))
    }

    /// Returns the identity of this pipeline value.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the pipes in order.
    #[must_use]
    pub fn pipes(&self) -> &[Pipe] {
        &self.pipes
    }

    /// Returns true if `pipe` is part of the sequence.
    #[must_use]
    pub fn contains(&self, pipe: &Pipe) -> bool {
        self.pipes.contains(pipe)
    }

    /// Returns the number of pipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    /// Returns true if the pipeline has no pipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Returns the last pipe, which later pipelines anchor after.
    #[must_use]
    pub fn last(&self) -> Option<&Pipe> {
        self.pipes.last()
    }

    /// Materializes the pipes into phases.
    ///
    /// The first new phase is bound to `event`, or runs after `after` when
    /// given; every later phase runs after the one before it. Pipes already
    /// present in `other_built` are reused instead of created, and newly
    /// created ones are added to it.
    ///
    /// Returns the phase of every pipe, in pipe order.
    ///
    /// # Errors
    ///
    /// Propagates phase registration failures, such as a pipe name already
    /// bound to another trigger.
    pub fn build<A: 'static, S: Store>(
        &self,
        scheduler: &Scheduler<A, S>,
        event: &Event<A>,
        mut other_built: Option<&mut HashMap<Pipe, Entity>>,
        after: Option<Entity>,
    ) -> Result<Vec<Entity>, SchedulerError> {
        let mut phases = Vec::with_capacity(self.pipes.len());
        let mut previous = after;

        for pipe in self.pipes.iter() {
            if let Some(existing) = other_built.as_deref().and_then(|built| built.get(pipe)) {
                phases.push(*existing);
                previous = Some(*existing);
                continue;
            }

            let trigger = match previous {
                Some(dependency) => PhaseTrigger::After(dependency),
                None => PhaseTrigger::Event(event.clone()),
            };
            let phase = scheduler.phase(&pipe.name(), trigger)?;
            tracing::debug!(%pipe, %phase, "pipe materialized");

            if let Some(built) = other_built.as_deref_mut() {
                built.insert(pipe.clone(), phase);
            }
            phases.push(phase);
            previous = Some(phase);
        }
        Ok(phases)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Pipeline {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pipeline {}

impl Hash for Pipeline {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("pipes", &self.pipes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_leaves_receiver_unchanged() {
        let a = Pipe::new(Some("a"));
        let b = Pipe::new(Some("b"));

        let first = Pipeline::new().with(&a);
        let second = first.with(&b);

        assert_eq!(first.len(), 1);
        assert_eq!(second.pipes(), &[a, b]);
        assert_ne!(first, second);
    }

    #[test]
    fn duplicate_pipes_are_rejected_or_ignored() {
        let a = Pipe::new(None);
        let pipeline = Pipeline::new().with(&a);

        assert!(matches!(
            pipeline.try_with(&a),
            Err(AbstractionError::DuplicatePipe { .. })
        ));
        let same = pipeline.with(&a);
        assert_eq!(same.len(), 1);
        assert_eq!(same, pipeline);
    }

    #[test]
    fn empty_pipeline_builds_nothing() {
        let scheduler = Scheduler::<()>::new();
        let tick = rubine_scheduler::ManualEvent::<()>::new();
        let phases = Pipeline::new()
            .build(&scheduler, &tick.event(), None, None)
            .unwrap();
        assert!(phases.is_empty());
        assert!(scheduler.phases().is_empty());
    }
}
