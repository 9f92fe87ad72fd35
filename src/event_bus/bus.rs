//! Bounded event bus fanning events out to pluggable sinks.
//!
//! The bus sits between the engine's emitter and any number of
//! [`EventSink`](super::sink::EventSink)s. Publishing never blocks graph
//! execution: the internal channel is bounded and a full buffer drops the
//! event (counted in [`EventBus::dropped`]) instead of stalling the run.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::{sync::oneshot, task};

use super::event::Event;
use super::sink::{EventSink, StdOutSink};

pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Receives events and broadcasts them to all registered sinks from a
/// background listener task.
///
/// Cloning the bus is cheap; clones share sinks, channel, and counters.
#[derive(Clone)]
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    sender: flume::Sender<Event>,
    receiver: flume::Receiver<Event>,
    listener: Arc<Mutex<Option<ListenerState>>>,
    dropped: Arc<AtomicUsize>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Bus with a single sink and the default buffer capacity.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self::with_sinks(vec![Box::new(sink)])
    }

    /// Bus with multiple sinks and the default buffer capacity.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self::with_capacity_and_sinks(DEFAULT_BUFFER_CAPACITY, sinks)
    }

    /// Bus with an explicit buffer capacity.
    pub fn with_capacity_and_sinks(capacity: usize, sinks: Vec<Box<dyn EventSink>>) -> Self {
        let (sender, receiver) = flume::bounded(capacity.max(1));
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            sender,
            receiver,
            listener: Arc::new(Mutex::new(None)),
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Dynamically add a sink (useful for per-request streaming).
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.add_boxed_sink(Box::new(sink));
    }

    /// Add an already-boxed sink.
    pub fn add_boxed_sink(&self, sink: Box<dyn EventSink>) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(sink);
        }
    }

    /// Publish an event without blocking.
    ///
    /// A full buffer drops the event and bumps the dropped counter; a
    /// disconnected channel (listener shut down, all receivers gone) does
    /// the same so producers never stall.
    pub fn publish(&self, event: Event) {
        if self.sender.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Buffer capacity of the underlying channel.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.sender.capacity().unwrap_or(usize::MAX)
    }

    /// Spawn the background task that drains the channel into all sinks.
    /// Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = match self.listener.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        if guard.is_some() {
            return;
        }

        let receiver = self.receiver.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = match sinks.lock() {
                                Ok(guard) => guard,
                                Err(_) => break,
                            };
                            for sink in sinks_guard.iter_mut() {
                                if let Err(error) = sink.handle(&event) {
                                    tracing::warn!(%error, "event sink failed to handle event");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task, draining nothing further.
    pub async fn stop_listener(&self) {
        let state = {
            match self.listener.lock() {
                Ok(mut guard) => guard.take(),
                Err(_) => None,
            }
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        // Only the last clone tears the listener down.
        if Arc::strong_count(&self.listener) > 1 {
            return;
        }
        if let Ok(mut guard) = self.listener.lock()
            && let Some(state) = guard.take()
        {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}
