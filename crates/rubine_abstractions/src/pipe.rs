use core::fmt;
use core::hash::{Hash, Hasher};
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_PIPE: AtomicU64 = AtomicU64::new(0);

/// Label used when a pipe is created without one.
pub const DEFAULT_PIPE_LABEL: &str = "pipe";

/// A unique composition anchor.
///
/// A pipe carries no data. It only names a slot that pipelines reference and
/// that becomes a phase once built. Every call to [`Pipe::new`] yields a
/// distinct pipe, even with a repeated label.
///
/// # Example
///
/// ```
/// use rubine_abstractions::Pipe;
///
/// let a = Pipe::new(Some("update"));
/// let b = Pipe::new(Some("update"));
/// assert_ne!(a, b);
/// assert_ne!(a.name(), b.name());
/// ```
#[derive(Clone)]
pub struct Pipe {
    id: u64,
    label: Arc<str>,
}

impl Pipe {
    /// Allocates a fresh pipe with an optional human-readable label.
    #[must_use]
    pub fn new(label: Option<&str>) -> Self {
        Self {
            id: NEXT_PIPE.fetch_add(1, Ordering::Relaxed),
            label: Arc::from(label.unwrap_or(DEFAULT_PIPE_LABEL)),
        }
    }

    /// Returns the unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the label given at creation.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the unique phase name this pipe materializes as.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}", self.label, self.id)
    }
}

impl PartialEq for Pipe {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pipe {}

impl Hash for Pipe {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipe({})", self.name())
    }
}

impl fmt::Display for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.label, self.id)
    }
}
