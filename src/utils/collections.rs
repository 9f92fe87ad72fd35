//! Constructors for the hash maps used throughout the crate.
//!
//! The engine standardizes on `FxHashMap` for its string-keyed maps; these
//! helpers keep call sites short and the hasher choice in one place.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// New empty variable bag for an envelope.
#[must_use]
pub fn new_vars_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// New empty payload map for an event.
#[must_use]
pub fn new_payload_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// Build a payload map from `(key, value)` pairs.
///
/// ```
/// use warpline::utils::collections::payload_from_pairs;
/// use serde_json::json;
///
/// let payload = payload_from_pairs([("status", json!("ok"))]);
/// assert_eq!(payload.get("status"), Some(&json!("ok")));
/// ```
#[must_use]
pub fn payload_from_pairs<I, K>(pairs: I) -> FxHashMap<String, Value>
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect()
}
