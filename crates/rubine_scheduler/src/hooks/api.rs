//! Hook registration and dispatch.
//!
//! The [`HooksAPI`] keeps, per [`HookKind`], an ordered list of named
//! callbacks. Dispatch is synchronous and follows registration order. A
//! callback that returns an error or panics is reported as a
//! [`HookFailure`] on the diagnostics channel and logged; the remaining
//! callbacks still run.
//!
//! # Example
//!
//! ```
//! use rubine_scheduler::hooks::{HooksAPI, OnSystemAdd, OnSystemRemove, SystemEvent};
//!
//! let hooks = HooksAPI::new();
//! hooks
//!     .register_observer::<(OnSystemAdd, OnSystemRemove), _, _>("audit", |event: &SystemEvent| {
//!         println!("{:?} {}", event.kind(), event.system());
//!     })
//!     .unwrap();
//!
//! assert!(hooks.contains_hook(rubine_scheduler::hooks::HookKind::SystemAdd, "audit@SystemAdd"));
//! ```

use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::events::SystemEvent;
use super::schedule::{HookKind, IntoHookKinds};

/// Default capacity of the diagnostics channel.
pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// HookOutput
// ─────────────────────────────────────────────────────────────────────────────

/// Return types a hook callback may produce.
pub trait HookOutput: 'static {
    /// Converts the return value into a failure message, if any.
    ///
    /// # Errors
    ///
    /// Returns the rendered error of a failed callback.
    fn into_result(self) -> Result<(), String>;
}

impl HookOutput for () {
    fn into_result(self) -> Result<(), String> {
        Ok(())
    }
}

impl<E: fmt::Display + 'static> HookOutput for Result<(), E> {
    fn into_result(self) -> Result<(), String> {
        self.map_err(|err| err.to_string())
    }
}

/// Type-erased hook callback.
pub type BoxedHook = Arc<dyn Fn(&SystemEvent) -> Result<(), String> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Errors and diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during hook registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookRegistrationError {
    /// A hook with this name already exists for the kind.
    #[error("hook '{name}' already registered for {kind}")]
    DuplicateName {
        /// The kind where the duplicate was found.
        kind: HookKind,
        /// The duplicate hook name.
        name: String,
    },
}

/// A hook callback that failed during dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Name of the failing hook.
    pub hook: String,
    /// The kind being dispatched.
    pub kind: HookKind,
    /// Error message or panic payload.
    pub message: String,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hook '{}' failed on {}: {}", self.hook, self.kind, self.message)
    }
}

struct HookEntry {
    name: String,
    hook: BoxedHook,
}

// ─────────────────────────────────────────────────────────────────────────────
// HooksAPI
// ─────────────────────────────────────────────────────────────────────────────

/// Registry of lifecycle hooks.
///
/// Uses interior mutability so hooks can be registered through a shared
/// scheduler handle, including from inside another hook.
pub struct HooksAPI {
    hooks: RwLock<HashMap<HookKind, Vec<HookEntry>>>,
    anonymous: AtomicUsize,
    failures: Sender<HookFailure>,
    diagnostics: Receiver<HookFailure>,
}

impl Default for HooksAPI {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HooksAPI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self.hooks.read();
        let mut map = f.debug_map();
        for kind in HookKind::ALL {
            let names: Vec<&str> = hooks
                .get(&kind)
                .map(|entries| entries.iter().map(|entry| entry.name.as_str()).collect())
                .unwrap_or_default();
            map.entry(&kind, &names);
        }
        map.finish()
    }
}

impl HooksAPI {
    /// Creates an empty registry with the default diagnostics capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_diagnostics_capacity(DEFAULT_DIAGNOSTICS_CAPACITY)
    }

    /// Creates an empty registry whose diagnostics channel holds at most
    /// `capacity` unread failures. Further failures are only logged.
    #[must_use]
    pub fn with_diagnostics_capacity(capacity: usize) -> Self {
        let (failures, diagnostics) = crossbeam_channel::bounded(capacity);
        Self {
            hooks: RwLock::new(HashMap::new()),
            anonymous: AtomicUsize::new(0),
            failures,
            diagnostics,
        }
    }

    /// Registers an observer for one or more kinds.
    ///
    /// With several kinds, each registration is named `"{name}@{kind}"`.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is
    /// already taken for one of the kinds. Kinds processed before the
    /// duplicate stay registered.
    pub fn register_observer<S, F, O>(
        &self,
        name: impl Into<String>,
        hook: F,
    ) -> Result<&Self, HookRegistrationError>
    where
        S: IntoHookKinds,
        F: Fn(&SystemEvent) -> O + Send + Sync + 'static,
        O: HookOutput,
    {
        let kinds = S::hook_kinds();
        let name = name.into();
        let hook: BoxedHook = Arc::new(move |event: &SystemEvent| hook(event).into_result());

        for kind in &kinds {
            let hook_name = if kinds.len() > 1 {
                format!("{name}@{kind}")
            } else {
                name.clone()
            };
            self.register_boxed(*kind, hook_name, Arc::clone(&hook))?;
        }
        Ok(self)
    }

    /// Registers a named callback for one kind.
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is taken.
    pub fn register<F, O>(
        &self,
        kind: HookKind,
        name: impl Into<String>,
        hook: F,
    ) -> Result<(), HookRegistrationError>
    where
        F: Fn(&SystemEvent) -> O + Send + Sync + 'static,
        O: HookOutput,
    {
        self.register_boxed(
            kind,
            name,
            Arc::new(move |event: &SystemEvent| hook(event).into_result()),
        )
    }

    /// Registers a callback under a generated name and returns that name.
    pub fn register_anonymous<F, O>(&self, kind: HookKind, hook: F) -> String
    where
        F: Fn(&SystemEvent) -> O + Send + Sync + 'static,
        O: HookOutput,
    {
        let hook: BoxedHook = Arc::new(move |event: &SystemEvent| hook(event).into_result());
        loop {
            let n = self.anonymous.fetch_add(1, Ordering::Relaxed);
            let name = format!("hook_{n}");
            if self.register_boxed(kind, name.clone(), Arc::clone(&hook)).is_ok() {
                return name;
            }
        }
    }

    /// Registers a pre-built [`BoxedHook`].
    ///
    /// # Errors
    ///
    /// Returns [`HookRegistrationError::DuplicateName`] if the name is taken.
    pub fn register_boxed(
        &self,
        kind: HookKind,
        name: impl Into<String>,
        hook: BoxedHook,
    ) -> Result<(), HookRegistrationError> {
        let name = name.into();

        let mut hooks = self.hooks.write();
        let entries = hooks.entry(kind).or_default();

        if entries.iter().any(|entry| entry.name == name) {
            return Err(HookRegistrationError::DuplicateName { kind, name });
        }

        tracing::debug!(hook = %name, %kind, "hook registered");
        entries.push(HookEntry { name, hook });
        Ok(())
    }

    /// Removes a hook by name. Returns false if no such hook exists.
    pub fn unregister(&self, kind: HookKind, name: &str) -> bool {
        let mut hooks = self.hooks.write();
        let Some(entries) = hooks.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        entries.len() != before
    }

    /// Invokes every hook registered for the event's kind, in registration
    /// order.
    ///
    /// The registry lock is released before any callback runs, so callbacks
    /// may register further hooks; those take effect from the next dispatch.
    pub fn invoke(&self, event: &SystemEvent) {
        let kind = event.kind();
        let entries: Vec<(String, BoxedHook)> = {
            let hooks = self.hooks.read();
            match hooks.get(&kind) {
                Some(entries) => entries
                    .iter()
                    .map(|entry| (entry.name.clone(), Arc::clone(&entry.hook)))
                    .collect(),
                None => return,
            }
        };

        for (name, hook) in entries {
            let message = match catch_unwind(AssertUnwindSafe(|| hook(event))) {
                Ok(Ok(())) => continue,
                Ok(Err(message)) => message,
                Err(payload) => panic_message(payload.as_ref()),
            };
            self.report(HookFailure {
                hook: name,
                kind,
                message,
            });
        }
    }

    fn report(&self, failure: HookFailure) {
        tracing::error!(
            hook = %failure.hook,
            kind = %failure.kind,
            error = %failure.message,
            "hook failed"
        );
        if let Err(TrySendError::Full(_)) = self.failures.try_send(failure) {
            tracing::trace!("hook diagnostics channel full");
        }
    }

    /// Returns a receiver for hook failures.
    ///
    /// All receivers share one queue: each failure is delivered to exactly
    /// one of them.
    #[must_use]
    pub fn diagnostics(&self) -> Receiver<HookFailure> {
        self.diagnostics.clone()
    }

    /// Returns the number of hooks registered for the kind.
    #[must_use]
    pub fn hook_count(&self, kind: HookKind) -> usize {
        let hooks = self.hooks.read();
        hooks.get(&kind).map_or(0, Vec::len)
    }

    /// Checks if a hook with the given name exists for the kind.
    #[must_use]
    pub fn contains_hook(&self, kind: HookKind, name: &str) -> bool {
        let hooks = self.hooks.read();
        hooks
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "hook panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::schedule::{OnSystemAdd, OnSystemCall, OnSystemRemove};
    use rubine_world::Entity;
    use std::sync::Mutex;

    fn removal(n: u64) -> SystemEvent {
        SystemEvent::SystemRemove {
            system: Entity::from_raw(n),
            name: Arc::from("sys"),
        }
    }

    #[test]
    fn register_increments_count() {
        let api = HooksAPI::new();

        api.register_observer::<OnSystemRemove, _, _>("first", |_: &SystemEvent| {})
            .expect("registration should succeed");
        api.register_observer::<OnSystemRemove, _, _>("second", |_: &SystemEvent| {})
            .expect("registration should succeed");

        assert_eq!(api.hook_count(HookKind::SystemRemove), 2);
        assert_eq!(api.hook_count(HookKind::SystemAdd), 0);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let api = HooksAPI::new();
        api.register(HookKind::SystemCall, "dup", |_: &SystemEvent| {})
            .expect("registration should succeed");

        let result = api.register(HookKind::SystemCall, "dup", |_: &SystemEvent| {});
        assert_eq!(
            result,
            Err(HookRegistrationError::DuplicateName {
                kind: HookKind::SystemCall,
                name: "dup".into()
            })
        );

        // Same name on a different kind is fine.
        assert!(api.register(HookKind::SystemAdd, "dup", |_: &SystemEvent| {}).is_ok());
    }

    #[test]
    fn invoke_runs_hooks_in_registration_order() {
        let api = HooksAPI::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            api.register(HookKind::SystemRemove, name, move |_: &SystemEvent| {
                order.lock().unwrap().push(name);
            })
            .unwrap();
        }

        api.invoke(&removal(1));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn invoke_only_reaches_matching_kind() {
        let api = HooksAPI::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        api.register_observer::<OnSystemAdd, _, _>("adds", move |_: &SystemEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        api.invoke(&removal(1));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multi_kind_observer_gets_suffixed_names() {
        let api = HooksAPI::new();
        api.register_observer::<(OnSystemAdd, OnSystemCall), _, _>("tracker", |_: &SystemEvent| {})
            .unwrap();

        assert!(api.contains_hook(HookKind::SystemAdd, "tracker@SystemAdd"));
        assert!(api.contains_hook(HookKind::SystemCall, "tracker@SystemCall"));
        assert!(!api.contains_hook(HookKind::SystemCall, "tracker"));
    }

    #[test]
    fn failing_hooks_are_reported_and_do_not_stop_dispatch() {
        let api = HooksAPI::new();
        let reached = Arc::new(AtomicUsize::new(0));

        api.register(HookKind::SystemRemove, "errors", |_: &SystemEvent| {
            Err::<(), _>("boom")
        })
        .unwrap();
        api.register(HookKind::SystemRemove, "panics", |_: &SystemEvent| -> () {
            panic!("kaboom");
        })
        .unwrap();
        let counter = Arc::clone(&reached);
        api.register(HookKind::SystemRemove, "healthy", move |_: &SystemEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        api.invoke(&removal(3));

        assert_eq!(reached.load(Ordering::SeqCst), 1);
        let failures: Vec<HookFailure> = api.diagnostics().try_iter().collect();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].hook, "errors");
        assert_eq!(failures[0].message, "boom");
        assert_eq!(failures[1].hook, "panics");
        assert_eq!(failures[1].message, "kaboom");
    }

    #[test]
    fn anonymous_hooks_get_unique_names() {
        let api = HooksAPI::new();
        let a = api.register_anonymous(HookKind::SystemCall, |_: &SystemEvent| {});
        let b = api.register_anonymous(HookKind::SystemCall, |_: &SystemEvent| {});
        assert_ne!(a, b);
        assert_eq!(api.hook_count(HookKind::SystemCall), 2);

        assert!(api.unregister(HookKind::SystemCall, &a));
        assert!(!api.unregister(HookKind::SystemCall, &a));
        assert_eq!(api.hook_count(HookKind::SystemCall), 1);
    }

    #[test]
    fn full_diagnostics_channel_drops_extra_failures() {
        let api = HooksAPI::with_diagnostics_capacity(1);
        api.register(HookKind::SystemRemove, "errors", |_: &SystemEvent| {
            Err::<(), _>("boom")
        })
        .unwrap();

        api.invoke(&removal(1));
        api.invoke(&removal(2));

        assert_eq!(api.diagnostics().try_iter().count(), 1);
    }
}
