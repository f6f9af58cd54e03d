//! Lifecycle hooks for systems.
//!
//! Observers react to four points in a system's life:
//!
//! | Kind | Marker | Fired when |
//! |------|--------|------------|
//! | [`HookKind::SystemAdd`] | [`OnSystemAdd`] | a system is registered |
//! | [`HookKind::SystemRemove`] | [`OnSystemRemove`] | a system is removed (once) |
//! | [`HookKind::SystemCall`] | [`OnSystemCall`] | a system finished a run |
//! | [`HookKind::SystemChange`] | [`OnSystemChange`] | a system was paused or unpaused |
//!
//! The hook system consists of three parts:
//!
//! - **Markers** ([`schedule`]): types naming each lifecycle point
//! - **Events** ([`events`]): the [`SystemEvent`] payload every hook receives
//! - **API** ([`api`]): registration, dispatch and the diagnostics channel

pub mod api;
pub mod events;
pub mod schedule;

pub use api::{
    BoxedHook, DEFAULT_DIAGNOSTICS_CAPACITY, HookFailure, HookOutput, HookRegistrationError,
    HooksAPI,
};
pub use events::SystemEvent;
pub use schedule::{
    HookKind, HookSchedule, IntoHookKinds, OnSystemAdd, OnSystemCall, OnSystemChange,
    OnSystemRemove,
};
