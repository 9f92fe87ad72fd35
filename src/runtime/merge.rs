//! Merge-barrier bookkeeping.
//!
//! One [`BarrierState`] exists per merge node per run. Arriving branches
//! deposit their envelope into the slot matching their declared incoming
//! edge; the arrival that completes the expected count takes the collected
//! envelopes (in branch-declaration order) and continues traversal, while
//! every other branch observes the fired flag and ends. The fired flag also
//! guarantees the merge operation runs at most once per run per merge node.

use rustc_hash::FxHashMap;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::envelope::Envelope;

/// Outcome of depositing an envelope at a merge barrier.
pub(crate) enum Arrival {
    /// This arrival completed the barrier; the caller owns the collected
    /// inputs and continues traversal from the merge node.
    Complete(Vec<Envelope>),
    /// Siblings are still on their way (or the barrier already fired).
    /// The caller waits on the receiver, then ends its branch.
    Pending(watch::Receiver<bool>),
}

struct BarrierState {
    slots: Vec<Option<Envelope>>,
    arrived: usize,
    expected: usize,
    fired: bool,
    fired_tx: watch::Sender<bool>,
    fired_rx: watch::Receiver<bool>,
}

impl BarrierState {
    fn new(slot_count: usize, expected: usize) -> Self {
        let (fired_tx, fired_rx) = watch::channel(false);
        Self {
            slots: (0..slot_count).map(|_| None).collect(),
            arrived: 0,
            expected,
            fired: false,
            fired_tx,
            fired_rx,
        }
    }
}

#[derive(Default)]
pub(crate) struct MergeBarriers {
    inner: Mutex<FxHashMap<String, BarrierState>>,
}

impl MergeBarriers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Deposit `envelope` for `merge_id` at `slot` (the index of the
    /// incoming edge in declaration order).
    ///
    /// `slot_count` sizes the collection array; `expected` is how many
    /// arrivals fire the barrier. Arrivals after firing are dropped and
    /// resolve immediately.
    pub(crate) fn arrive(
        &self,
        merge_id: &str,
        slot: usize,
        slot_count: usize,
        expected: usize,
        envelope: Envelope,
    ) -> Arrival {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let state = inner
            .entry(merge_id.to_string())
            .or_insert_with(|| BarrierState::new(slot_count.max(expected), expected));

        if state.fired {
            return Arrival::Pending(state.fired_rx.clone());
        }

        if let Some(cell) = state.slots.get_mut(slot)
            && cell.is_none()
        {
            *cell = Some(envelope);
            state.arrived += 1;
        }

        if state.arrived >= state.expected {
            state.fired = true;
            let inputs: Vec<Envelope> = state.slots.iter_mut().filter_map(Option::take).collect();
            let _ = state.fired_tx.send(true);
            Arrival::Complete(inputs)
        } else {
            Arrival::Pending(state.fired_rx.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_with(var: &str) -> Envelope {
        let mut envelope = Envelope::default();
        envelope.set_var(var, json!(true));
        envelope
    }

    #[test]
    fn completing_arrival_gets_inputs_in_slot_order() {
        let barriers = MergeBarriers::new();
        // Slot 1 arrives first, slot 0 second: collected order is still 0, 1.
        match barriers.arrive("m", 1, 2, 2, envelope_with("b")) {
            Arrival::Pending(_) => {}
            Arrival::Complete(_) => panic!("barrier fired early"),
        }
        match barriers.arrive("m", 0, 2, 2, envelope_with("a")) {
            Arrival::Complete(inputs) => {
                assert_eq!(inputs.len(), 2);
                assert!(inputs[0].var("a").is_some());
                assert!(inputs[1].var("b").is_some());
            }
            Arrival::Pending(_) => panic!("barrier should fire on second arrival"),
        }
    }

    #[test]
    fn fires_at_most_once() {
        let barriers = MergeBarriers::new();
        let first = barriers.arrive("m", 0, 1, 1, envelope_with("a"));
        assert!(matches!(first, Arrival::Complete(_)));
        // Late arrival after firing parks and resolves immediately.
        match barriers.arrive("m", 0, 1, 1, envelope_with("late")) {
            Arrival::Pending(rx) => assert!(*rx.borrow()),
            Arrival::Complete(_) => panic!("barrier fired twice"),
        }
    }
}
