//! Error types for envelope validation and decoding

use alloc::string::String;
use core::fmt;

/// Errors that can occur while validating or decoding an envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not a JSON object (and not a known string signal)
    NotAnObject,

    /// The discriminant field is missing or not a string
    MissingTag {
        field: &'static str,
    },

    /// The discriminant carries a value outside the closed set
    UnknownTag(String),

    /// A required field is absent
    MissingField {
        field: &'static str,
    },

    /// A field is present with the wrong type or an out-of-range value
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },

    /// A field that the strict schema does not declare
    UnexpectedField(String),

    /// Envelope tagged with a `message_type` from another protocol
    ForeignDialect(String),

    /// serde could not map the value onto the typed model
    Decode(String),

    /// serde could not encode the typed model
    Encode(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::NotAnObject => write!(f, "Payload is not an object"),
            ProtocolError::MissingTag { field } => write!(f, "Missing tag field '{}'", field),
            ProtocolError::UnknownTag(tag) => write!(f, "Unknown tag: {}", tag),
            ProtocolError::MissingField { field } => write!(f, "Missing field '{}'", field),
            ProtocolError::InvalidField { field, expected } => {
                write!(f, "Invalid field '{}': expected {}", field, expected)
            }
            ProtocolError::UnexpectedField(name) => write!(f, "Unexpected field '{}'", name),
            ProtocolError::ForeignDialect(message_type) => {
                write!(f, "Foreign message_type: {}", message_type)
            }
            ProtocolError::Decode(msg) => write!(f, "Decode error: {}", msg),
            ProtocolError::Encode(msg) => write!(f, "Encode error: {}", msg),
        }
    }
}
