//! System execution primitives.
//!
//! A system is a synchronous callable invoked with the arguments of the
//! trigger that fired its phase. Plain closures become systems through
//! [`IntoSystem`]; the return value decides whether the run counts as
//! propagated:
//!
//! | Return type | Propagated |
//! |-------------|------------|
//! | `()` | always |
//! | [`Propagation`] | unless [`Propagation::Stop`] |
//! | `Result<(), SystemError>` | on `Ok` |
//! | `Result<Propagation, SystemError>` | on `Ok(Continue)` |
//!
//! # Example
//!
//! ```
//! use rubine_scheduler::system::{IntoSystem, Propagation, System};
//!
//! let movement = (|dt: &f64| {
//!     let _ = dt * 2.0;
//! })
//! .into_system();
//! assert_eq!(movement.run(&0.016), Ok(Propagation::Continue));
//!
//! let gate = (|dt: &f64| if *dt > 1.0 { Propagation::Stop } else { Propagation::Continue })
//!     .into_system();
//! assert_eq!(gate.run(&2.0), Ok(Propagation::Stop));
//! ```

use core::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use rubine_world::Component;

use crate::error::SystemError;

/// Whether a run's effects should propagate to dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Propagation {
    /// The run completed normally.
    #[default]
    Continue,
    /// The system suppressed propagation for this run.
    Stop,
}

/// A schedulable unit of work triggered with arguments of type `A`.
pub trait System<A>: Send + Sync + 'static {
    /// Runs the system once.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError`] if the system body fails.
    fn run(&self, args: &A) -> Result<Propagation, SystemError>;

    /// Returns the system's name for debugging and tracing.
    fn name(&self) -> &'static str;
}

/// Shared, type-erased system.
pub type BoxedSystem<A> = Arc<dyn System<A>>;

// ─────────────────────────────────────────────────────────────────────────────
// SystemOutput
// ─────────────────────────────────────────────────────────────────────────────

/// Return types a function system may produce.
pub trait SystemOutput: 'static {
    /// Converts the return value into a run outcome.
    ///
    /// # Errors
    ///
    /// Passes through the error of fallible outputs.
    fn into_outcome(self) -> Result<Propagation, SystemError>;
}

impl SystemOutput for () {
    fn into_outcome(self) -> Result<Propagation, SystemError> {
        Ok(Propagation::Continue)
    }
}

impl SystemOutput for Propagation {
    fn into_outcome(self) -> Result<Propagation, SystemError> {
        Ok(self)
    }
}

impl SystemOutput for Result<(), SystemError> {
    fn into_outcome(self) -> Result<Propagation, SystemError> {
        self.map(|()| Propagation::Continue)
    }
}

impl SystemOutput for Result<Propagation, SystemError> {
    fn into_outcome(self) -> Result<Propagation, SystemError> {
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IntoSystem
// ─────────────────────────────────────────────────────────────────────────────

/// Converts a type into a [`System`].
///
/// The `Marker` parameter keeps the implementations for closures taking the
/// trigger arguments, closures taking nothing, and existing systems apart.
pub trait IntoSystem<A, Marker>: Sized {
    /// The resulting system type.
    type System: System<A>;

    /// Converts this into a system.
    fn into_system(self) -> Self::System;
}

impl<A, S: System<A>> IntoSystem<A, ()> for S {
    type System = S;

    fn into_system(self) -> Self::System {
        self
    }
}

/// A system wrapping a plain function or closure.
pub struct FunctionSystem<F, Marker> {
    func: F,
    name: &'static str,
    _marker: PhantomData<fn() -> Marker>,
}

impl<F, Marker> FunctionSystem<F, Marker> {
    /// Creates a new function system with the given name.
    pub fn new(func: F, name: &'static str) -> Self {
        Self {
            func,
            name,
            _marker: PhantomData,
        }
    }
}

/// Marker for functions taking the trigger arguments.
pub struct FunctionMarker;

/// Marker for functions ignoring the trigger arguments.
pub struct NoArgsMarker;

impl<A, F, O> IntoSystem<A, (FunctionMarker, O)> for F
where
    A: 'static,
    F: Fn(&A) -> O + Send + Sync + 'static,
    O: SystemOutput,
{
    type System = FunctionSystem<F, (FunctionMarker, O)>;

    fn into_system(self) -> Self::System {
        FunctionSystem::new(self, core::any::type_name::<F>())
    }
}

impl<A, F, O> System<A> for FunctionSystem<F, (FunctionMarker, O)>
where
    A: 'static,
    F: Fn(&A) -> O + Send + Sync + 'static,
    O: SystemOutput,
{
    fn run(&self, args: &A) -> Result<Propagation, SystemError> {
        (self.func)(args).into_outcome()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<A, F, O> IntoSystem<A, (NoArgsMarker, O)> for F
where
    A: 'static,
    F: Fn() -> O + Send + Sync + 'static,
    O: SystemOutput,
{
    type System = FunctionSystem<F, (NoArgsMarker, O)>;

    fn into_system(self) -> Self::System {
        FunctionSystem::new(self, core::any::type_name::<F>())
    }
}

impl<A, F, O> System<A> for FunctionSystem<F, (NoArgsMarker, O)>
where
    A: 'static,
    F: Fn() -> O + Send + Sync + 'static,
    O: SystemOutput,
{
    fn run(&self, _args: &A) -> Result<Propagation, SystemError> {
        (self.func)().into_outcome()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run record
// ─────────────────────────────────────────────────────────────────────────────

/// Run record of a system.
///
/// Replaced on every run; the record it replaces is kept as
/// [`PreviousSystemState`](crate::components::PreviousSystemState).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemState {
    /// Human-readable name.
    pub name: Arc<str>,
    /// Paused systems are skipped by the executor.
    pub paused: bool,
    /// When the last run started.
    pub frame_start: Option<Instant>,
    /// When the last run completed.
    pub frame_end: Option<Instant>,
    /// Whether the last run completed without suppressing propagation.
    pub propagated: bool,
}

impl SystemState {
    /// Creates the record of a system that has never run.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            paused: false,
            frame_start: None,
            frame_end: None,
            propagated: true,
        }
    }

    /// Returns true if the system has run at least once.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.frame_start.is_some()
    }
}

impl Component for SystemState {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_systems_report_their_outcome() {
        let ok = (|_: &u32| {}).into_system();
        assert_eq!(System::<u32>::run(&ok, &1), Ok(Propagation::Continue));

        let stop = (|_: &u32| Propagation::Stop).into_system();
        assert_eq!(System::<u32>::run(&stop, &1), Ok(Propagation::Stop));

        let failing =
            (|n: &u32| -> Result<(), SystemError> { Err(SystemError::execution(format!("bad {n}"))) })
                .into_system();
        assert_eq!(
            System::<u32>::run(&failing, &7),
            Err(SystemError::ExecutionError("bad 7".into()))
        );
    }

    #[test]
    fn no_arg_closures_ignore_trigger_arguments() {
        let system = IntoSystem::<String, _>::into_system(|| Propagation::Continue);
        assert_eq!(system.run(&"tick".to_owned()), Ok(Propagation::Continue));
    }

    #[test]
    fn function_system_name_defaults_to_type_name() {
        fn physics(_: &f32) {}
        let system = IntoSystem::<f32, _>::into_system(physics);
        assert!(system.name().ends_with("physics"));
    }

    #[test]
    fn fresh_state_is_unpaused_and_propagating() {
        let state = SystemState::new("render");
        assert!(!state.paused);
        assert!(state.propagated);
        assert!(!state.has_run());
        assert_eq!(&*state.name, "render");
    }
}
