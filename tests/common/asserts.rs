#![allow(dead_code)]

use serde_json::{Value, json};

use warpline::envelope::Envelope;
use warpline::event_bus::{Event, EventKind};

pub fn assert_var_eq(envelope: &Envelope, key: &str, expected: Value) {
    assert_eq!(
        envelope.var(key),
        Some(&expected),
        "expected var '{key}' == {expected}, vars: {:?}",
        envelope.vars
    );
}

pub fn assert_var_absent(envelope: &Envelope, key: &str) {
    assert!(
        envelope.var(key).is_none(),
        "expected var '{key}' to be absent, vars: {:?}",
        envelope.vars
    );
}

pub fn assert_trail(envelope: &Envelope, expected: &[&str]) {
    let expected: Vec<Value> = expected.iter().map(|id| json!(id)).collect();
    assert_eq!(
        envelope.var("trail"),
        Some(&Value::Array(expected)),
        "unexpected traversal trail"
    );
}

/// First kind is `run.started`, last is `run.finished`, and sequence numbers
/// are strictly increasing.
pub fn assert_well_formed_stream(events: &[Event]) {
    assert!(!events.is_empty(), "no events observed");
    assert_eq!(events.first().unwrap().kind, EventKind::RunStarted);
    assert_eq!(events.last().unwrap().kind, EventKind::RunFinished);
    for pair in events.windows(2) {
        assert!(
            pair[1].seq > pair[0].seq,
            "sequence not strictly increasing: {} then {}",
            pair[0].seq,
            pair[1].seq
        );
    }
}

pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|event| event.kind).collect()
}

pub fn events_for_node<'a>(events: &'a [Event], node_id: &str) -> Vec<&'a Event> {
    events
        .iter()
        .filter(|event| event.node_id.as_deref() == Some(node_id))
        .collect()
}
