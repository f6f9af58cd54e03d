//! Destinations for scheduler snapshots.

use std::io::Write;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::snapshot::SchedulerSnapshot;

/// Viewer name reported by sinks that do not set one.
pub const LOCAL_VIEWER: &str = "local";

/// Why a snapshot did not reach its sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The channel buffer is full; the snapshot was dropped.
    #[error("snapshot channel is full")]
    Full,

    /// Nobody is listening any more.
    #[error("snapshot receiver disconnected")]
    Disconnected,

    /// The snapshot could not be encoded.
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    /// The writer failed.
    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives snapshots built by the introspection system.
pub trait SnapshotSink: Send + Sync + 'static {
    /// Name of the viewer behind this sink, passed to the access check.
    fn viewer(&self) -> &str {
        LOCAL_VIEWER
    }

    /// Delivers one snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] when the snapshot could not be delivered.
    fn deliver(&self, snapshot: &SchedulerSnapshot) -> Result<(), SinkError>;
}

impl<T: SnapshotSink + ?Sized> SnapshotSink for Arc<T> {
    fn viewer(&self) -> &str {
        (**self).viewer()
    }

    fn deliver(&self, snapshot: &SchedulerSnapshot) -> Result<(), SinkError> {
        (**self).deliver(snapshot)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ChannelSink
// ─────────────────────────────────────────────────────────────────────────────

/// Sends snapshots over a crossbeam channel without blocking.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<SchedulerSnapshot>,
    viewer: String,
}

impl ChannelSink {
    /// Creates a sink keeping at most `capacity` unread snapshots.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, Receiver<SchedulerSnapshot>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::from_sender(sender), receiver)
    }

    /// Creates a sink with an unbounded buffer.
    #[must_use]
    pub fn unbounded() -> (Self, Receiver<SchedulerSnapshot>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self::from_sender(sender), receiver)
    }

    /// Wraps an existing sender.
    #[must_use]
    pub fn from_sender(sender: Sender<SchedulerSnapshot>) -> Self {
        Self {
            sender,
            viewer: LOCAL_VIEWER.to_owned(),
        }
    }

    /// Sets the viewer name.
    #[must_use]
    pub fn with_viewer(mut self, viewer: impl Into<String>) -> Self {
        self.viewer = viewer.into();
        self
    }
}

impl SnapshotSink for ChannelSink {
    fn viewer(&self) -> &str {
        &self.viewer
    }

    fn deliver(&self, snapshot: &SchedulerSnapshot) -> Result<(), SinkError> {
        self.sender
            .try_send(snapshot.clone())
            .map_err(|err| match err {
                TrySendError::Full(_) => SinkError::Full,
                TrySendError::Disconnected(_) => SinkError::Disconnected,
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JsonLinesSink
// ─────────────────────────────────────────────────────────────────────────────

/// Writes each snapshot as one line of JSON.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
    viewer: String,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            viewer: LOCAL_VIEWER.to_owned(),
        }
    }

    /// Sets the viewer name.
    #[must_use]
    pub fn with_viewer(mut self, viewer: impl Into<String>) -> Self {
        self.viewer = viewer.into();
        self
    }

    /// Runs `f` with the writer locked.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.writer.lock())
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> core::fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JsonLinesSink")
            .field("viewer", &self.viewer)
            .finish_non_exhaustive()
    }
}

impl<W: Write + Send + 'static> SnapshotSink for JsonLinesSink<W> {
    fn viewer(&self) -> &str {
        &self.viewer
    }

    fn deliver(&self, snapshot: &SchedulerSnapshot) -> Result<(), SinkError> {
        let line = serde_json::to_vec(snapshot)?;
        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_reports_full_and_disconnected() {
        let (sink, receiver) = ChannelSink::bounded(1);
        let snapshot = SchedulerSnapshot::default();

        sink.deliver(&snapshot).unwrap();
        assert!(matches!(sink.deliver(&snapshot), Err(SinkError::Full)));
        assert_eq!(receiver.try_recv().unwrap(), snapshot);

        drop(receiver);
        assert!(matches!(
            sink.deliver(&snapshot),
            Err(SinkError::Disconnected)
        ));
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_snapshot() {
        let sink = JsonLinesSink::new(Vec::new()).with_viewer("ops");
        let snapshot = SchedulerSnapshot {
            stores: vec!["world".to_owned()],
            ..SchedulerSnapshot::default()
        };

        sink.deliver(&snapshot).unwrap();
        sink.deliver(&snapshot).unwrap();
        assert_eq!(sink.viewer(), "ops");

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let decoded: SchedulerSnapshot = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
