//! Phase-based system scheduler for Rubine (Layer 1).
//!
//! Systems are grouped into named **phases**. A phase is either bound to a
//! trigger event, or depends on another phase and runs right after it in the
//! same cycle. When an event fires, its phase runs all non-paused systems in
//! registration order, then cascades depth-first into the phases depending on
//! it.
//!
//! # Core Components
//!
//! - [`Scheduler`] - phase registry, system table and executor
//! - [`event`] - adapter over the three accepted trigger shapes
//! - [`system`] - the [`System`] trait, [`IntoSystem`] and the run record
//! - [`hooks`] - lifecycle observers (`SystemAdd`, `SystemRemove`, `SystemCall`, `SystemChange`)
//! - [`components`] - the components and relations kept in the store
//! - [`clock`] - time source for run-record timestamps
//!
//! # Example
//!
//! ```
//! use rubine_scheduler::Scheduler;
//! use rubine_scheduler::event::ManualEvent;
//! use std::sync::{Arc, Mutex};
//!
//! let heartbeat = ManualEvent::<f64>::new();
//! let scheduler = Scheduler::<f64>::new();
//! let log = Arc::new(Mutex::new(Vec::new()));
//!
//! let pre_update = scheduler.phase("PreUpdate", &heartbeat).unwrap();
//! scheduler.phase("Update", pre_update).unwrap();
//!
//! let l = Arc::clone(&log);
//! scheduler.on("Update", move |_: &f64| l.lock().unwrap().push("B"));
//! let l = Arc::clone(&log);
//! scheduler.on("PreUpdate", move |_: &f64| l.lock().unwrap().push("A"));
//!
//! scheduler.start();
//! heartbeat.fire(&0.016);
//!
//! assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
//! ```

pub mod clock;
pub mod components;
pub mod error;
pub mod event;
mod executor;
pub mod hooks;
mod scheduler;
pub mod system;

pub use error::{SchedulerError, SystemError};
pub use event::{Event, ManualEvent, Subscription};
pub use scheduler::{
    PhaseBinding, PhaseTrigger, Scheduler, SchedulerConfig, SystemRef, WeakScheduler,
};
pub use system::{BoxedSystem, IntoSystem, Propagation, System, SystemState};

/// Re-export of the store crate.
pub use rubine_world as world;
