//! Trigger event adapter.
//!
//! Hosts expose "something happened" notifications in three different
//! conventions. [`Event`] is a closed variant over all three, resolved once
//! when a phase is bound and then used through a single
//! [`subscribe`](Event::subscribe) operation:
//!
//! | Shape | Host value | Disposer |
//! |-------|-----------|----------|
//! | [`Event::Function`] | a function that registers a handler | optional [`Disconnect`] closure |
//! | [`Event::Signal`] | an object with a lowercase [`Signal::connect`] | [`Connection::disconnect`] |
//! | [`Event::HostSignal`] | an object with a capitalized [`HostSignal::Connect`] | [`HostConnection::Disconnect`] |
//!
//! Values arriving type-erased (for example from a scripting bridge) go
//! through [`Event::resolve`], which checks the shapes in the order above and
//! fails with [`SchedulerError::UnsupportedEventShape`] when none matches.
//!
//! # Example
//!
//! ```
//! use rubine_scheduler::event::{Event, ManualEvent};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let tick = ManualEvent::<f64>::new();
//! let total = Arc::new(AtomicU32::new(0));
//!
//! let counter = Arc::clone(&total);
//! let subscription = tick.event().subscribe(Arc::new(move |dt: &f64| {
//!     counter.fetch_add(*dt as u32, Ordering::SeqCst);
//! }));
//!
//! tick.fire(&2.0);
//! subscription.disconnect();
//! tick.fire(&2.0);
//!
//! assert_eq!(total.load(Ordering::SeqCst), 2);
//! ```

use core::any::Any;
use core::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::SchedulerError;

/// Callback handed to an event; invoked with the trigger's arguments.
pub type Handler<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Disposer returned by function-form events.
pub type Disconnect = Box<dyn FnOnce() + Send>;

/// Function-form event: registers the handler itself and may return a disposer.
pub type EventFn<A> = Arc<dyn Fn(Handler<A>) -> Option<Disconnect> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Signal conventions
// ─────────────────────────────────────────────────────────────────────────────

/// Connection returned by a lowercase [`Signal`].
pub trait Connection: Send {
    /// Stops delivering events to the connected handler.
    fn disconnect(self: Box<Self>);
}

/// An object exposing a lowercase `connect` method.
pub trait Signal<A>: Send + Sync {
    /// Connects a handler, returning its connection.
    fn connect(&self, handler: Handler<A>) -> Box<dyn Connection>;
}

/// Connection returned by a [`HostSignal`].
pub trait HostConnection: Send {
    /// Stops delivering events to the connected handler.
    #[expect(non_snake_case, reason = "mirrors the host engine's signal API")]
    fn Disconnect(self: Box<Self>);
}

/// An object exposing a capitalized `Connect` method, as host engine
/// signals do.
pub trait HostSignal<A>: Send + Sync {
    /// Connects a handler, returning its connection.
    #[expect(non_snake_case, reason = "mirrors the host engine's signal API")]
    fn Connect(&self, handler: Handler<A>) -> Box<dyn HostConnection>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Event
// ─────────────────────────────────────────────────────────────────────────────

/// The subscription convention an [`Event`] was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventShape {
    /// Plain callback-registration function.
    Function,
    /// Object with a lowercase `connect` method.
    Signal,
    /// Object with a capitalized `Connect` method.
    HostSignal,
}

impl fmt::Display for EventShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventShape::Function => write!(f, "function"),
            EventShape::Signal => write!(f, "connect"),
            EventShape::HostSignal => write!(f, "Connect"),
        }
    }
}

/// A trigger source in one of the three accepted shapes.
///
/// Cloning an `Event` shares the underlying source; two clones compare equal
/// under [`same_source`](Self::same_source).
pub enum Event<A: 'static> {
    /// Plain callback-registration function.
    Function(EventFn<A>),
    /// Object with a lowercase `connect` method.
    Signal(Arc<dyn Signal<A>>),
    /// Object with a capitalized `Connect` method.
    HostSignal(Arc<dyn HostSignal<A>>),
}

impl<A: 'static> Clone for Event<A> {
    fn clone(&self) -> Self {
        match self {
            Event::Function(f) => Event::Function(Arc::clone(f)),
            Event::Signal(s) => Event::Signal(Arc::clone(s)),
            Event::HostSignal(s) => Event::HostSignal(Arc::clone(s)),
        }
    }
}

impl<A: 'static> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("shape", &self.shape())
            .field("source", &self.source_ptr())
            .finish()
    }
}

impl<A: 'static> Event<A> {
    /// Wraps a callback-registration function.
    pub fn function<F>(register: F) -> Self
    where
        F: Fn(Handler<A>) -> Option<Disconnect> + Send + Sync + 'static,
    {
        Event::Function(Arc::new(register))
    }

    /// Wraps an object with a lowercase `connect` method.
    pub fn signal<S: Signal<A> + 'static>(signal: Arc<S>) -> Self {
        Event::Signal(signal)
    }

    /// Wraps an object with a capitalized `Connect` method.
    pub fn host_signal<S: HostSignal<A> + 'static>(signal: Arc<S>) -> Self {
        Event::HostSignal(signal)
    }

    /// Resolves a type-erased value into an event.
    ///
    /// Accepted values are an [`EventFn<A>`], an `Arc<dyn Signal<A>>` or an
    /// `Arc<dyn HostSignal<A>>`, checked in that order.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnsupportedEventShape`] if the value matches
    /// none of the shapes.
    pub fn resolve(source: &dyn Any) -> Result<Self, SchedulerError> {
        if let Some(register) = source.downcast_ref::<EventFn<A>>() {
            return Ok(Event::Function(Arc::clone(register)));
        }
        if let Some(signal) = source.downcast_ref::<Arc<dyn Signal<A>>>() {
            return Ok(Event::Signal(Arc::clone(signal)));
        }
        if let Some(signal) = source.downcast_ref::<Arc<dyn HostSignal<A>>>() {
            return Ok(Event::HostSignal(Arc::clone(signal)));
        }
        Err(SchedulerError::UnsupportedEventShape {
            args: core::any::type_name::<A>(),
        })
    }

    /// Returns the shape this event was resolved to.
    #[must_use]
    pub fn shape(&self) -> EventShape {
        match self {
            Event::Function(_) => EventShape::Function,
            Event::Signal(_) => EventShape::Signal,
            Event::HostSignal(_) => EventShape::HostSignal,
        }
    }

    /// Returns true if both events wrap the same source object.
    #[must_use]
    pub fn same_source(&self, other: &Event<A>) -> bool {
        self.shape() == other.shape() && core::ptr::eq(self.source_ptr(), other.source_ptr())
    }

    fn source_ptr(&self) -> *const () {
        match self {
            Event::Function(f) => Arc::as_ptr(f).cast::<()>(),
            Event::Signal(s) => Arc::as_ptr(s).cast::<()>(),
            Event::HostSignal(s) => Arc::as_ptr(s).cast::<()>(),
        }
    }

    /// Connects `handler` and returns a uniform disposer.
    pub fn subscribe(&self, handler: Handler<A>) -> Subscription {
        match self {
            Event::Function(register) => Subscription {
                disconnect: register(handler),
            },
            Event::Signal(signal) => {
                let connection = signal.connect(handler);
                Subscription::from_fn(move || connection.disconnect())
            }
            Event::HostSignal(signal) => {
                let connection = signal.Connect(handler);
                Subscription::from_fn(move || connection.Disconnect())
            }
        }
    }
}

impl<A: 'static> From<EventFn<A>> for Event<A> {
    fn from(register: EventFn<A>) -> Self {
        Event::Function(register)
    }
}

impl<A: 'static> From<Arc<dyn Signal<A>>> for Event<A> {
    fn from(signal: Arc<dyn Signal<A>>) -> Self {
        Event::Signal(signal)
    }
}

impl<A: 'static> From<Arc<dyn HostSignal<A>>> for Event<A> {
    fn from(signal: Arc<dyn HostSignal<A>>) -> Self {
        Event::HostSignal(signal)
    }
}

impl<A: 'static> From<&ManualEvent<A>> for Event<A> {
    fn from(event: &ManualEvent<A>) -> Self {
        event.event()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────────────────────────

/// Uniform disposer for a connected handler.
///
/// Dropping a subscription leaves the handler connected; call
/// [`disconnect`](Self::disconnect) to stop delivery.
pub struct Subscription {
    disconnect: Option<Disconnect>,
}

impl Subscription {
    fn from_fn(disconnect: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disconnect: Some(Box::new(disconnect)),
        }
    }

    /// Returns true if the source handed back a way to disconnect.
    #[must_use]
    pub fn can_disconnect(&self) -> bool {
        self.disconnect.is_some()
    }

    /// Disconnects the handler. A no-op for sources without a disposer.
    pub fn disconnect(self) {
        if let Some(disconnect) = self.disconnect {
            disconnect();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("can_disconnect", &self.can_disconnect())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ManualEvent
// ─────────────────────────────────────────────────────────────────────────────

/// A signal fired by hand.
///
/// Useful for tests and for hosts that drive their frame loop explicitly.
/// Handlers run synchronously, in connection order, on the firing thread.
pub struct ManualEvent<A: 'static> {
    slots: Arc<Slots<A>>,
}

struct Slots<A> {
    this: Weak<Slots<A>>,
    handlers: Mutex<(u64, Vec<(u64, Handler<A>)>)>,
}

impl<A: 'static> ManualEvent<A> {
    /// Creates an event with no connected handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new_cyclic(|this| Slots {
                this: this.clone(),
                handlers: Mutex::new((0, Vec::new())),
            }),
        }
    }

    /// Returns this signal as an [`Event`].
    ///
    /// Every call returns an event with the same source.
    #[must_use]
    pub fn event(&self) -> Event<A> {
        let signal: Arc<dyn Signal<A>> = self.slots.clone();
        Event::Signal(signal)
    }

    /// Invokes every connected handler with `args`.
    pub fn fire(&self, args: &A) {
        let handlers: Vec<Handler<A>> = self
            .slots
            .handlers
            .lock()
            .1
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(args);
        }
    }

    /// Returns the number of connected handlers.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.slots.handlers.lock().1.len()
    }
}

impl<A: 'static> Default for ManualEvent<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for ManualEvent<A> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<A: 'static> Signal<A> for Slots<A> {
    fn connect(&self, handler: Handler<A>) -> Box<dyn Connection> {
        let mut guard = self.handlers.lock();
        let id = guard.0;
        guard.0 += 1;
        guard.1.push((id, handler));
        Box::new(ManualConnection {
            id,
            slots: self.this.clone(),
        })
    }
}

struct ManualConnection<A: 'static> {
    id: u64,
    slots: Weak<Slots<A>>,
}

impl<A: 'static> Connection for ManualConnection<A> {
    fn disconnect(self: Box<Self>) {
        if let Some(slots) = self.slots.upgrade() {
            slots.handlers.lock().1.retain(|(id, _)| *id != self.id);
        }
    }
}
