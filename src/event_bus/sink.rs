use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::{Arc, Mutex};

use super::event::Event;
use crate::telemetry::{PlainFormatter, TelemetryFormatter};

/// Abstraction over an output target that consumes full [`Event`] objects.
///
/// Sinks decide how to serialize and where to deliver. The engine treats the
/// whole bus as an opaque publish target; persistent storage and replay
/// backends plug in here.
pub trait EventSink: Sync + Send {
    /// Handle a structured event. The sink decides how to format it.
    fn handle(&mut self, event: &Event) -> IoResult<()>;
}

/// Stdout sink with pluggable formatting.
pub struct StdOutSink<F: TelemetryFormatter = PlainFormatter> {
    handle: Stdout,
    formatter: F,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
            formatter: PlainFormatter::new(),
        }
    }
}

impl<F: TelemetryFormatter> StdOutSink<F> {
    pub fn with_formatter(formatter: F) -> Self {
        Self {
            handle: io::stdout(),
            formatter,
        }
    }
}

impl<F: TelemetryFormatter> EventSink for StdOutSink<F> {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        let rendered = self.formatter.render_event(event).join_lines();
        self.handle.write_all(rendered.as_bytes())?;
        self.handle.flush()
    }
}

/// In-memory sink for testing, snapshots, and replay.
///
/// Captured events keep their emission sequence numbers, so consumers can ask
/// for "everything after sequence N" the same way they would against a
/// persistent store.
///
/// ```
/// use warpline::event_bus::MemorySink;
///
/// let sink = MemorySink::new();
/// assert!(sink.snapshot().is_empty());
/// assert!(sink.events_after(0).is_empty());
/// ```
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events in arrival order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Replay accessor: all events with a sequence strictly greater than
    /// `seq`, in arrival order.
    #[must_use]
    pub fn events_after(&self, seq: u64) -> Vec<Event> {
        self.entries
            .lock()
            .map(|entries| entries.iter().filter(|e| e.seq > seq).cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.entries
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?
            .push(event.clone());
        Ok(())
    }
}

/// Channel-based sink for streaming to async consumers (e.g. web clients).
pub struct ChannelSink {
    tx: flume::Sender<Event>,
}

impl ChannelSink {
    /// Wrap a flume sender; pair with `flume::unbounded()` or a bounded
    /// channel depending on backpressure needs.
    pub fn new(tx: flume::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn handle(&mut self, event: &Event) -> IoResult<()> {
        self.tx
            .try_send(event.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver unavailable"))
    }
}
