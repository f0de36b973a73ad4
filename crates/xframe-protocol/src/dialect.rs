//! Wire dialect adapter
//!
//! Frames in the wild speak slightly different forms of the same protocol:
//!
//! - bare string signals on the window bus (`"ready"`,
//!   `"script-installed"`, `"communication-port"`)
//! - canonical envelopes tagged by `message`
//! - editor envelopes that additionally carry
//!   `message_type: "moocfi/editor-message"`
//!
//! [`Inbound::classify`] folds all of them into one canonical form and
//! reports which dialect the peer used, so replies can be wrapped to match.

use alloc::string::ToString;
use serde_json::Value;

use crate::error::ProtocolError;
use crate::{
    EDITOR_MESSAGE_TYPE, MESSAGE_FIELD, PORT_SENTINEL, SCRIPT_INSTALLED_SENTINEL, TAG_READY,
};

const MESSAGE_TYPE_FIELD: &str = "message_type";

/// Bootstrap signals that are not regular envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The frame has installed its listeners
    Ready,
    /// The parent is handing over a dedicated port
    CommunicationPort,
}

/// Wire form spoken by the peer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Canonical,
    /// Envelopes carry `message_type: "moocfi/editor-message"`
    EditorEnvelope,
}

impl Dialect {
    /// Wrap an outgoing canonical envelope in this dialect.
    pub fn wrap(self, mut value: Value) -> Value {
        if self == Dialect::EditorEnvelope {
            if let Some(obj) = value.as_object_mut() {
                obj.insert(MESSAGE_TYPE_FIELD.to_string(), Value::from(EDITOR_MESSAGE_TYPE));
            }
        }
        value
    }
}

/// A received payload after dialect normalization
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Signal(Signal),
    /// Canonical envelope, `message_type` removed
    Envelope(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classified {
    pub inbound: Inbound,
    pub dialect: Dialect,
}

impl Inbound {
    /// Normalize a raw `postMessage` payload.
    ///
    /// Unknown bare strings and envelopes from a foreign `message_type` are
    /// errors; callers log and drop them.
    pub fn classify(value: &Value) -> Result<Classified, ProtocolError> {
        match value {
            Value::String(s) => {
                let signal = match s.as_str() {
                    TAG_READY | SCRIPT_INSTALLED_SENTINEL => Signal::Ready,
                    PORT_SENTINEL => Signal::CommunicationPort,
                    other => return Err(ProtocolError::UnknownTag(other.to_string())),
                };
                Ok(Classified { inbound: Inbound::Signal(signal), dialect: Dialect::Canonical })
            }
            Value::Object(obj) => {
                let dialect = match obj.get(MESSAGE_TYPE_FIELD) {
                    None => Dialect::Canonical,
                    Some(Value::String(t)) if t == EDITOR_MESSAGE_TYPE => Dialect::EditorEnvelope,
                    Some(Value::String(t)) => return Err(ProtocolError::ForeignDialect(t.clone())),
                    Some(_) => {
                        return Err(ProtocolError::InvalidField {
                            field: "message_type",
                            expected: "string",
                        })
                    }
                };

                let inbound = match obj.get(MESSAGE_FIELD).and_then(Value::as_str) {
                    Some(TAG_READY) => Inbound::Signal(Signal::Ready),
                    Some(_) => {
                        let mut envelope = obj.clone();
                        envelope.remove(MESSAGE_TYPE_FIELD);
                        Inbound::Envelope(Value::Object(envelope))
                    }
                    None => return Err(ProtocolError::MissingTag { field: MESSAGE_FIELD }),
                };
                Ok(Classified { inbound, dialect })
            }
            _ => Err(ProtocolError::NotAnObject),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_signals() {
        for (raw, signal) in [
            ("ready", Signal::Ready),
            ("script-installed", Signal::Ready),
            ("communication-port", Signal::CommunicationPort),
        ] {
            let classified = Inbound::classify(&json!(raw)).unwrap();
            assert_eq!(classified.inbound, Inbound::Signal(signal));
            assert_eq!(classified.dialect, Dialect::Canonical);
        }
    }

    #[test]
    fn test_unknown_string_rejected() {
        assert_eq!(
            Inbound::classify(&json!("hello")),
            Err(ProtocolError::UnknownTag("hello".to_string()))
        );
    }

    #[test]
    fn test_editor_envelope_is_stripped() {
        let classified = Inbound::classify(&json!({
            "message_type": "moocfi/editor-message",
            "message": "current-state",
            "data": { "x": 1 },
            "valid": true
        }))
        .unwrap();
        assert_eq!(classified.dialect, Dialect::EditorEnvelope);
        assert_eq!(
            classified.inbound,
            Inbound::Envelope(json!({ "message": "current-state", "data": { "x": 1 }, "valid": true }))
        );
    }

    #[test]
    fn test_editor_ready_object() {
        let classified = Inbound::classify(&json!({
            "message_type": "moocfi/editor-message",
            "message": "ready"
        }))
        .unwrap();
        assert_eq!(classified.inbound, Inbound::Signal(Signal::Ready));
        assert_eq!(classified.dialect, Dialect::EditorEnvelope);
    }

    #[test]
    fn test_foreign_message_type() {
        let err = Inbound::classify(&json!({
            "message_type": "someone-else",
            "message": "current-state"
        }))
        .unwrap_err();
        assert_eq!(err, ProtocolError::ForeignDialect("someone-else".to_string()));
    }

    #[test]
    fn test_object_without_tag() {
        assert_eq!(
            Inbound::classify(&json!({ "data": 1 })),
            Err(ProtocolError::MissingTag { field: "message" })
        );
        assert_eq!(Inbound::classify(&json!(3)), Err(ProtocolError::NotAnObject));
    }

    #[test]
    fn test_wrap() {
        let value = json!({ "message": "set-language", "data": "fi" });
        assert_eq!(Dialect::Canonical.wrap(value.clone()), value);
        assert_eq!(
            Dialect::EditorEnvelope.wrap(value)["message_type"],
            "moocfi/editor-message"
        );
    }
}
