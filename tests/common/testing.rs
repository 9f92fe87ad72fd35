#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use warpline::event_bus::{Event, EventHandler, MemorySink};

/// Synchronous collecting handler: events land in the returned vec inline at
/// emission, so ordering assertions need no drain/wait logic.
pub fn collecting_handler() -> (EventHandler, Arc<Mutex<Vec<Event>>>) {
    let collected: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = collected.clone();
    let handler: EventHandler = Arc::new(move |event: &Event| {
        sink.lock().unwrap().push(event.clone());
    });
    (handler, collected)
}

/// Poll a memory sink until its captured stream ends with `run.finished` or
/// the timeout expires. Bus delivery is asynchronous; tests that assert on
/// sink contents must flush first.
pub async fn wait_for_run_finished(sink: &MemorySink, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let events = sink.snapshot();
        if events
            .last()
            .is_some_and(|event| event.kind == warpline::event_bus::EventKind::RunFinished)
        {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
