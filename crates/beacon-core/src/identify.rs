//! The [`Identify`] builder and the op merge engine.
//!
//! Callers accumulate property operations into an [`Identify`] value and
//! hand it to the agent, which merges the ordered op list into one canonical
//! mutation document — a map from opcode to `{key: value}` — and emits a
//! single `$identify` event carrying it as `user_properties`.
//!
//! Merge rules:
//! - at most one opcode owns a given key; a later op on the same key
//!   discards earlier ones (last-write-wins per key, not per call);
//! - `$clearAll` is exclusive: it purges every other queued op and the
//!   merged document contains only `$clearAll`;
//! - invalid operands (e.g. a non-numeric `$add`) are dropped with a
//!   warning, never aborting the rest of the call;
//! - an identify whose merged document ends up empty is suppressed.

use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::{
    OP_ADD, OP_APPEND, OP_CLEAR_ALL, OP_PREPEND, OP_SET, OP_SET_ONCE, OP_UNSET,
};
use crate::sanitize;

/// One property-mutation opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    /// Set a property.
    Set,
    /// Set a property only if not already present server-side.
    SetOnce,
    /// Numeric increment.
    Add,
    /// Array append.
    Append,
    /// Array prepend.
    Prepend,
    /// Remove a property.
    Unset,
    /// Remove every user property.
    ClearAll,
}

impl Op {
    /// The wire opcode string.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Set => OP_SET,
            Op::SetOnce => OP_SET_ONCE,
            Op::Add => OP_ADD,
            Op::Append => OP_APPEND,
            Op::Prepend => OP_PREPEND,
            Op::Unset => OP_UNSET,
            Op::ClearAll => OP_CLEAR_ALL,
        }
    }
}

/// An ordered set of property operations for one logical identify call.
///
/// The builder only accumulates; nothing is merged or validated until the
/// agent calls [`Identify::merge`]. Each method takes and returns `self`,
/// so a finished value cannot alias a builder still being extended.
#[derive(Clone, Debug, Default)]
pub struct Identify {
    ops: Vec<(Op, String, Value)>,
}

impl Identify {
    /// Create an empty identify.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a `$set` of `key` to `value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((Op::Set, key.into(), value.into()));
        self
    }

    /// Queue a `$setOnce` of `key` to `value`.
    #[must_use]
    pub fn set_once(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((Op::SetOnce, key.into(), value.into()));
        self
    }

    /// Queue a numeric `$add` of `amount` to `key`.
    #[must_use]
    pub fn add(mut self, key: impl Into<String>, amount: impl Into<Value>) -> Self {
        self.ops.push((Op::Add, key.into(), amount.into()));
        self
    }

    /// Queue an `$append` of `value` to the array at `key`.
    #[must_use]
    pub fn append(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((Op::Append, key.into(), value.into()));
        self
    }

    /// Queue a `$prepend` of `value` to the array at `key`.
    #[must_use]
    pub fn prepend(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push((Op::Prepend, key.into(), value.into()));
        self
    }

    /// Queue an `$unset` of `key`.
    #[must_use]
    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.ops.push((Op::Unset, key.into(), Value::String("-".into())));
        self
    }

    /// Queue a `$clearAll`, discarding every other op in this identify.
    #[must_use]
    pub fn clear_all(mut self) -> Self {
        self.ops.push((Op::ClearAll, String::new(), Value::Null));
        self
    }

    /// Whether no ops have been queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Merge the ordered op list into the canonical mutation document.
    ///
    /// Returns `None` when the merged document is empty (nothing queued, or
    /// every op was dropped) — the caller suppresses the identify event.
    pub fn merge(self) -> Option<Map<String, Value>> {
        if self.ops.iter().any(|(op, _, _)| *op == Op::ClearAll) {
            let mut doc = Map::new();
            let _ = doc.insert(OP_CLEAR_ALL.to_string(), Value::String("-".into()));
            return Some(doc);
        }

        // Last-write-wins per key: keep only the final op touching each key.
        let mut winners: Vec<(Op, String, Value)> = Vec::with_capacity(self.ops.len());
        for (op, key, value) in self.ops {
            if !valid_operand(op, &value) {
                warn!(op = op.as_str(), key = %key, "invalid identify operand, dropped");
                continue;
            }
            winners.retain(|(_, existing, _)| *existing != key);
            winners.push((op, key, value));
        }

        let mut doc: Map<String, Value> = Map::new();
        for (op, key, value) in winners {
            let entry = doc
                .entry(op.as_str().to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = entry {
                let sanitized = sanitize::sanitize_properties(
                    std::iter::once((key, value)).collect(),
                );
                map.extend(sanitized);
            }
        }

        if doc.is_empty() { None } else { Some(doc) }
    }
}

/// Operand validity per opcode. `$add` requires a number; `$unset` carries
/// the conventional `"-"`; everything else takes any JSON value.
fn valid_operand(op: Op, value: &Value) -> bool {
    match op {
        Op::Add => value.is_number(),
        _ => !value.is_null(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_then_set_same_key_keeps_last() {
        let doc = Identify::new()
            .set("k", 1)
            .set("k", 2)
            .add("k2", 1)
            .merge()
            .unwrap();

        assert_eq!(doc[OP_SET]["k"], json!(2));
        assert_eq!(doc[OP_ADD]["k2"], json!(1));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn conflicting_ops_on_one_key_keep_last_opcode() {
        let doc = Identify::new()
            .set("k", "a")
            .append("k", "b")
            .merge()
            .unwrap();

        // The later $append wins the key; $set must not retain it.
        assert!(doc.get(OP_SET).is_none());
        assert_eq!(doc[OP_APPEND]["k"], json!("b"));
    }

    #[test]
    fn clear_all_is_exclusive() {
        let doc = Identify::new().set("k", 1).clear_all().merge().unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.contains_key(OP_CLEAR_ALL));
    }

    #[test]
    fn clear_all_wins_even_when_first() {
        let doc = Identify::new().clear_all().set("k", 1).merge().unwrap();
        assert_eq!(doc.len(), 1);
        assert!(doc.contains_key(OP_CLEAR_ALL));
    }

    #[test]
    fn empty_identify_suppressed() {
        assert!(Identify::new().merge().is_none());
    }

    #[test]
    fn invalid_add_operand_dropped() {
        // A non-numeric $add is invalid; with nothing else queued the whole
        // identify collapses to nothing.
        assert!(Identify::new().add("k", "not a number").merge().is_none());
    }

    #[test]
    fn invalid_operand_does_not_abort_call() {
        let doc = Identify::new()
            .add("bad", "nope")
            .set("good", true)
            .merge()
            .unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[OP_SET]["good"], json!(true));
    }

    #[test]
    fn unset_carries_dash() {
        let doc = Identify::new().unset("k").merge().unwrap();
        assert_eq!(doc[OP_UNSET]["k"], json!("-"));
    }

    #[test]
    fn distinct_keys_share_opcode_bucket() {
        let doc = Identify::new().set("a", 1).set("b", 2).merge().unwrap();
        assert_eq!(doc[OP_SET]["a"], json!(1));
        assert_eq!(doc[OP_SET]["b"], json!(2));
    }
}
