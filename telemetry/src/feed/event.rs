//! Decoded feed events and typed access to their arguments.
//!
//! Arguments are kept as raw JSON because their shape depends on the action
//! kind. Handlers pull out the fields they need through the `*_at` accessors,
//! which walk a path of array indices and report a [`FieldShapeError`] when
//! the feed sent something unexpected.

use std::fmt;

use serde_json::Value;

use super::action::ActionKind;
use super::error::FieldShapeError;

/// Opaque node handle assigned by the feed.
///
/// The feed currently sends numeric ids, but ids are only ever compared for
/// equality, so string ids are accepted as well.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// Builds a node id from a JSON number or string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(NodeId(n.to_string())),
            Value::String(s) => Some(NodeId(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        NodeId(id.to_string())
    }
}

/// A single decoded `(action, arguments)` pair from a feed batch.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub kind: ActionKind,
    pub args: Value,
}

impl Event {
    pub fn new(kind: ActionKind, args: Value) -> Self {
        Self { kind, args }
    }

    fn shape_error(&self, path: &[usize], expected: &'static str) -> FieldShapeError {
        FieldShapeError {
            kind: self.kind,
            path: path.to_vec(),
            expected,
        }
    }

    /// Returns the raw argument value at `path`.
    pub fn value_at(&self, path: &[usize]) -> Result<&Value, FieldShapeError> {
        let mut current = &self.args;
        for &index in path {
            current = current
                .as_array()
                .and_then(|items| items.get(index))
                .ok_or_else(|| self.shape_error(path, "present array element"))?;
        }
        Ok(current)
    }

    pub fn u64_at(&self, path: &[usize]) -> Result<u64, FieldShapeError> {
        self.value_at(path)?
            .as_u64()
            .ok_or_else(|| self.shape_error(path, "unsigned integer"))
    }

    pub fn str_at(&self, path: &[usize]) -> Result<&str, FieldShapeError> {
        self.value_at(path)?
            .as_str()
            .ok_or_else(|| self.shape_error(path, "string"))
    }

    pub fn node_id_at(&self, path: &[usize]) -> Result<NodeId, FieldShapeError> {
        NodeId::from_value(self.value_at(path)?)
            .ok_or_else(|| self.shape_error(path, "node id"))
    }

    /// Reads a millisecond count at `path` and converts it to seconds.
    pub fn millis_as_secs_at(&self, path: &[usize]) -> Result<f64, FieldShapeError> {
        self.value_at(path)?
            .as_f64()
            .map(|ms| ms / 1000.0)
            .ok_or_else(|| self.shape_error(path, "millisecond count"))
    }

    /// Reads a millisecond count that the feed reports as `null` when it
    /// was not measured.
    pub fn optional_millis_at(&self, path: &[usize]) -> Result<Option<f64>, FieldShapeError> {
        match self.value_at(path)? {
            Value::Null => Ok(None),
            value => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.shape_error(path, "millisecond count or null")),
        }
    }
}
