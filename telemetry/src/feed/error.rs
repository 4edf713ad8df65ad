use thiserror::Error;

use super::action::ActionKind;

/// Error returned when a feed batch cannot be decoded.
///
/// A decode error discards the whole batch; nothing from it is dispatched.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("malformed feed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Payload parsed, but the outer value is not a sequence.
    #[error("feed payload is not a sequence")]
    NotASequence,
    /// Flattened sequence cannot be split into `(action, arguments)` pairs.
    #[error("feed payload has odd length {0}")]
    OddLength(usize),
    /// Action slot at `index` holds something other than an integer.
    #[error("action at index {index} is not an integer")]
    NonIntegerAction { index: usize },
    /// Action slot at `index` is an integer too large for an action code.
    #[error("action at index {index} is out of range")]
    ActionOutOfRange { index: usize },
}

/// Error returned when an event's arguments do not have the shape its
/// action kind requires.
///
/// This never escalates past the dispatcher: the offending event is skipped
/// and the rest of the batch is processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} argument at {path:?}: expected {expected}")]
pub struct FieldShapeError {
    pub kind: ActionKind,
    pub path: Vec<usize>,
    pub expected: &'static str,
}
