//! Field access helpers shared by guards and decoders
//!
//! Every helper returns `Err` instead of panicking: payloads come from
//! another realm and may have any shape.

use alloc::string::ToString;
use serde_json::{Map, Value};

use crate::error::ProtocolError;
use crate::MESSAGE_FIELD;

pub(crate) type Object = Map<alloc::string::String, Value>;

pub(crate) fn as_object(value: &Value) -> Result<&Object, ProtocolError> {
    value.as_object().ok_or(ProtocolError::NotAnObject)
}

/// Read a string discriminant.
pub(crate) fn tag<'a>(obj: &'a Object, field: &'static str) -> Result<&'a str, ProtocolError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingTag { field })
}

/// Object whose `message` field equals `expected`.
pub(crate) fn tagged<'a>(value: &'a Value, expected: &str) -> Option<&'a Object> {
    let obj = value.as_object()?;
    match obj.get(MESSAGE_FIELD).and_then(Value::as_str) {
        Some(tag) if tag == expected => Some(obj),
        _ => None,
    }
}

pub(crate) fn present<'a>(obj: &'a Object, field: &'static str) -> Result<&'a Value, ProtocolError> {
    obj.get(field).ok_or(ProtocolError::MissingField { field })
}

pub(crate) fn string<'a>(obj: &'a Object, field: &'static str) -> Result<&'a str, ProtocolError> {
    present(obj, field)?
        .as_str()
        .ok_or(ProtocolError::InvalidField { field, expected: "string" })
}

pub(crate) fn boolean(obj: &Object, field: &'static str) -> Result<bool, ProtocolError> {
    present(obj, field)?
        .as_bool()
        .ok_or(ProtocolError::InvalidField { field, expected: "boolean" })
}

pub(crate) fn number(obj: &Object, field: &'static str) -> Result<f64, ProtocolError> {
    present(obj, field)?
        .as_f64()
        .ok_or(ProtocolError::InvalidField { field, expected: "number" })
}

pub(crate) fn object<'a>(obj: &'a Object, field: &'static str) -> Result<&'a Object, ProtocolError> {
    present(obj, field)?
        .as_object()
        .ok_or(ProtocolError::InvalidField { field, expected: "object" })
}

/// Absent, `null`, or an object.
pub(crate) fn optional_object(obj: &Object, field: &'static str) -> Result<(), ProtocolError> {
    match obj.get(field) {
        None | Some(Value::Null) | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(ProtocolError::InvalidField { field, expected: "object or null" }),
    }
}

/// `null` or a string; the field must be present.
pub(crate) fn nullable_string(obj: &Object, field: &'static str) -> Result<(), ProtocolError> {
    match present(obj, field)? {
        Value::Null | Value::String(_) => Ok(()),
        _ => Err(ProtocolError::InvalidField { field, expected: "string or null" }),
    }
}

/// Reject any key outside `allowed`.
pub(crate) fn only(obj: &Object, allowed: &[&str]) -> Result<(), ProtocolError> {
    match obj.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(ProtocolError::UnexpectedField(key.to_string())),
        None => Ok(()),
    }
}
