//! Feed batch decoder.
//!
//! A batch is a flat JSON array `[action, args, action, args, ...]`. The
//! decoder splits it into [`Event`]s in arrival order. It only checks the
//! outer structure; argument shapes are checked later by the dispatcher.

use serde_json::Value;

use super::action::ActionKind;
use super::error::DecodeError;
use super::event::Event;

/// Decodes a raw feed payload into an ordered list of events.
pub fn decode(payload: &[u8]) -> Result<Vec<Event>, DecodeError> {
    let value: Value = serde_json::from_slice(payload)?;
    decode_value(value)
}

/// Same as [`decode`], for text frames.
pub fn decode_str(payload: &str) -> Result<Vec<Event>, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<Vec<Event>, DecodeError> {
    let Value::Array(items) = value else {
        return Err(DecodeError::NotASequence);
    };
    if items.len() % 2 != 0 {
        return Err(DecodeError::OddLength(items.len()));
    }

    let mut events = Vec::with_capacity(items.len() / 2);
    let mut items = items.into_iter().enumerate();
    while let (Some((index, action)), Some((_, args))) = (items.next(), items.next()) {
        events.push(Event::new(action_kind(index, &action)?, args));
    }
    Ok(events)
}

fn action_kind(index: usize, action: &Value) -> Result<ActionKind, DecodeError> {
    let Value::Number(number) = action else {
        return Err(DecodeError::NonIntegerAction { index });
    };
    if let Some(code) = number.as_i64() {
        Ok(ActionKind::from_code(code))
    } else if number.is_u64() {
        Err(DecodeError::ActionOutOfRange { index })
    } else {
        Err(DecodeError::NonIntegerAction { index })
    }
}
