//! Envelopes exchanged between parent and frame
//!
//! Both directions are closed sets tagged by the `message` field. Decoding
//! goes through the same checks as the [`guard`](crate::guard) predicates, so
//! a value that decodes is exactly a value the guard accepts.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::ProtocolError;
use crate::fields::{self, Object};
use crate::state::IframeState;
use crate::{
    MESSAGE_FIELD, TAG_CONTENT, TAG_CURRENT_STATE, TAG_FILE_UPLOAD, TAG_HEIGHT_CHANGED,
    TAG_OPEN_LINK, TAG_SET_LANGUAGE, TAG_SET_STATE, TAG_UPLOAD_RESULT,
};

/// Metadata of a binary file attached by the learner
///
/// The bytes stay in the browser realm; only the description crosses into
/// the protocol layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    #[serde(rename = "type")]
    pub content_type: String,
    pub size: u64,
}

/// One entry of a `file-upload` message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilePayload {
    /// Inline text content
    Text(String),
    /// Binary blob
    Blob(BlobDescriptor),
}

/// Outcome of a file upload relayed back into the frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadResult {
    /// Logical file name → public URL
    Success { urls: BTreeMap<String, String> },
    Failure { error: String },
}

impl UploadResult {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }
}

// =============================================================================
// Frame → parent
// =============================================================================

/// Messages the frame sends to its parent
#[derive(Clone, Debug, PartialEq)]
pub enum MessageFromIframe {
    /// Serialized answer and whether it may be submitted
    CurrentState { data: Value, valid: bool },
    /// Content height in pixels
    HeightChanged { height: f64 },
    /// Files attached by the learner, keyed by logical name
    FileUpload { files: BTreeMap<String, FilePayload> },
    /// Ask the parent to open a link outside the sandbox
    OpenLink { url: String },
}

impl MessageFromIframe {
    pub fn tag(&self) -> &'static str {
        match self {
            MessageFromIframe::CurrentState { .. } => TAG_CURRENT_STATE,
            MessageFromIframe::HeightChanged { .. } => TAG_HEIGHT_CHANGED,
            MessageFromIframe::FileUpload { .. } => TAG_FILE_UPLOAD,
            MessageFromIframe::OpenLink { .. } => TAG_OPEN_LINK,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = fields::as_object(value)?;
        let tag = fields::tag(obj, MESSAGE_FIELD)?;
        match tag {
            TAG_CURRENT_STATE => Ok(MessageFromIframe::CurrentState {
                data: obj.get("data").cloned().unwrap_or(Value::Null),
                valid: fields::boolean(obj, "valid")?,
            }),
            TAG_HEIGHT_CHANGED => Ok(MessageFromIframe::HeightChanged {
                height: fields::number(obj, "data")?,
            }),
            TAG_FILE_UPLOAD => Ok(MessageFromIframe::FileUpload {
                files: decode_files(obj)?,
            }),
            TAG_OPEN_LINK => Ok(MessageFromIframe::OpenLink {
                url: fields::string(obj, "data")?.to_string(),
            }),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            MessageFromIframe::CurrentState { data, valid } => json!({
                MESSAGE_FIELD: TAG_CURRENT_STATE,
                "data": data,
                "valid": valid,
            }),
            MessageFromIframe::HeightChanged { height } => json!({
                MESSAGE_FIELD: TAG_HEIGHT_CHANGED,
                "data": height,
            }),
            MessageFromIframe::FileUpload { files } => {
                let files = serde_json::to_value(files)
                    .map_err(|e| ProtocolError::Encode(e.to_string()))?;
                json!({ MESSAGE_FIELD: TAG_FILE_UPLOAD, "files": files })
            }
            MessageFromIframe::OpenLink { url } => json!({
                MESSAGE_FIELD: TAG_OPEN_LINK,
                "data": url,
            }),
        };
        Ok(value)
    }
}

fn decode_files(obj: &Object) -> Result<BTreeMap<String, FilePayload>, ProtocolError> {
    let files = fields::object(obj, "files")?;
    let mut decoded = BTreeMap::new();
    for (name, entry) in files {
        let payload = match entry {
            Value::String(text) => FilePayload::Text(text.clone()),
            Value::Object(blob) => FilePayload::Blob(BlobDescriptor {
                content_type: fields::string(blob, "type")?.to_string(),
                size: fields::present(blob, "size")?
                    .as_u64()
                    .ok_or(ProtocolError::InvalidField { field: "size", expected: "unsigned integer" })?,
            }),
            _ => {
                return Err(ProtocolError::InvalidField {
                    field: "files",
                    expected: "map of blobs or strings",
                })
            }
        };
        decoded.insert(name.clone(), payload);
    }
    Ok(decoded)
}

// =============================================================================
// Parent → frame
// =============================================================================

/// Messages the parent sends into the frame
#[derive(Clone, Debug, PartialEq)]
pub enum MessageToIframe {
    SetLanguage { language: String },
    SetState(IframeState),
    UploadResult(UploadResult),
    /// Initial content pushed right after the port handoff
    Content { data: Value },
}

impl MessageToIframe {
    pub fn tag(&self) -> &'static str {
        match self {
            MessageToIframe::SetLanguage { .. } => TAG_SET_LANGUAGE,
            MessageToIframe::SetState(_) => TAG_SET_STATE,
            MessageToIframe::UploadResult(_) => TAG_UPLOAD_RESULT,
            MessageToIframe::Content { .. } => TAG_CONTENT,
        }
    }

    /// Strict decode. `set-state` payloads must match the declared schema;
    /// see [`crate::guard::forgiving_is_set_state_message`] for the lenient
    /// path.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = fields::as_object(value)?;
        let tag = fields::tag(obj, MESSAGE_FIELD)?;
        match tag {
            TAG_SET_LANGUAGE => Ok(MessageToIframe::SetLanguage {
                language: fields::string(obj, "data")?.to_string(),
            }),
            TAG_SET_STATE => Ok(MessageToIframe::SetState(IframeState::from_value(value)?)),
            TAG_UPLOAD_RESULT => Ok(MessageToIframe::UploadResult(decode_upload_result(obj)?)),
            TAG_CONTENT => Ok(MessageToIframe::Content {
                data: obj.get("data").cloned().unwrap_or(Value::Null),
            }),
            other => Err(ProtocolError::UnknownTag(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Result<Value, ProtocolError> {
        let value = match self {
            MessageToIframe::SetLanguage { language } => json!({
                MESSAGE_FIELD: TAG_SET_LANGUAGE,
                "data": language,
            }),
            MessageToIframe::SetState(state) => {
                let mut value = state.to_value()?;
                match value.as_object_mut() {
                    Some(obj) => {
                        obj.insert(MESSAGE_FIELD.to_string(), Value::from(TAG_SET_STATE));
                    }
                    None => return Err(ProtocolError::Encode("state is not an object".to_string())),
                }
                value
            }
            MessageToIframe::UploadResult(UploadResult::Success { urls }) => {
                let urls: Map<String, Value> = urls
                    .iter()
                    .map(|(name, url)| (name.clone(), Value::from(url.as_str())))
                    .collect();
                json!({
                    MESSAGE_FIELD: TAG_UPLOAD_RESULT,
                    "success": true,
                    "urls": urls,
                })
            }
            MessageToIframe::UploadResult(UploadResult::Failure { error }) => json!({
                MESSAGE_FIELD: TAG_UPLOAD_RESULT,
                "success": false,
                "error": error,
            }),
            MessageToIframe::Content { data } => json!({
                MESSAGE_FIELD: TAG_CONTENT,
                "data": data,
            }),
        };
        Ok(value)
    }
}

fn decode_upload_result(obj: &Object) -> Result<UploadResult, ProtocolError> {
    if fields::boolean(obj, "success")? {
        let urls = fields::object(obj, "urls")?;
        let mut decoded = BTreeMap::new();
        for (name, url) in urls {
            let url = url.as_str().ok_or(ProtocolError::InvalidField {
                field: "urls",
                expected: "map of strings",
            })?;
            decoded.insert(name.clone(), url.to_string());
        }
        Ok(UploadResult::Success { urls: decoded })
    } else {
        Ok(UploadResult::Failure {
            error: fields::string(obj, "error")?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_state_decode() {
        let msg = MessageFromIframe::from_value(&json!({
            "message": "current-state",
            "data": { "answer": 42 },
            "valid": false
        }))
        .unwrap();
        assert_eq!(
            msg,
            MessageFromIframe::CurrentState { data: json!({ "answer": 42 }), valid: false }
        );
    }

    #[test]
    fn test_current_state_without_data_is_null() {
        let msg =
            MessageFromIframe::from_value(&json!({ "message": "current-state", "valid": true }))
                .unwrap();
        assert_eq!(msg, MessageFromIframe::CurrentState { data: Value::Null, valid: true });
    }

    #[test]
    fn test_height_must_be_number() {
        let err = MessageFromIframe::from_value(&json!({
            "message": "height-changed",
            "data": "480px"
        }))
        .unwrap_err();
        assert_eq!(err, ProtocolError::InvalidField { field: "data", expected: "number" });
    }

    #[test]
    fn test_file_upload_mixed_entries() {
        let msg = MessageFromIframe::from_value(&json!({
            "message": "file-upload",
            "files": {
                "a.png": { "type": "image/png", "size": 1024 },
                "notes.txt": "hello"
            }
        }))
        .unwrap();
        match msg {
            MessageFromIframe::FileUpload { files } => {
                assert_eq!(files.len(), 2);
                assert_eq!(
                    files["a.png"],
                    FilePayload::Blob(BlobDescriptor { content_type: "image/png".to_string(), size: 1024 })
                );
                assert_eq!(files["notes.txt"], FilePayload::Text("hello".to_string()));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_file_upload_encodes_like_wire() {
        let mut files = BTreeMap::new();
        files.insert("notes.txt".to_string(), FilePayload::Text("hi".to_string()));
        let value = MessageFromIframe::FileUpload { files }.to_value().unwrap();
        assert_eq!(value, json!({ "message": "file-upload", "files": { "notes.txt": "hi" } }));
    }

    #[test]
    fn test_unknown_tag() {
        let err = MessageFromIframe::from_value(&json!({ "message": "set-state" })).unwrap_err();
        assert_eq!(err, ProtocolError::UnknownTag("set-state".to_string()));
    }

    #[test]
    fn test_upload_result_both_shapes() {
        let ok = MessageToIframe::from_value(&json!({
            "message": "upload-result",
            "success": true,
            "urls": { "a.png": "https://cdn.example.com/a.png" }
        }))
        .unwrap();
        match ok {
            MessageToIframe::UploadResult(UploadResult::Success { urls }) => {
                assert_eq!(urls["a.png"], "https://cdn.example.com/a.png");
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let failed = MessageToIframe::from_value(&json!({
            "message": "upload-result",
            "success": false,
            "error": "too large"
        }))
        .unwrap();
        assert_eq!(
            failed,
            MessageToIframe::UploadResult(UploadResult::Failure { error: "too large".to_string() })
        );
    }

    #[test]
    fn test_upload_success_requires_urls() {
        assert!(MessageToIframe::from_value(&json!({
            "message": "upload-result",
            "success": true
        }))
        .is_err());
    }

    #[test]
    fn test_set_state_envelope_is_flattened() {
        let state = IframeState::from_value(&json!({
            "view_type": "exercise-editor",
            "exercise_task_id": "t",
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": { "private_spec": { "items": [] } }
        }))
        .unwrap();
        let value = MessageToIframe::SetState(state).to_value().unwrap();
        assert_eq!(value["message"], "set-state");
        assert_eq!(value["view_type"], "exercise-editor");
        assert_eq!(value["data"]["private_spec"], json!({ "items": [] }));
    }

    #[test]
    fn test_tags() {
        assert_eq!(MessageToIframe::Content { data: Value::Null }.tag(), "content");
        assert_eq!(MessageFromIframe::OpenLink { url: "https://a".to_string() }.tag(), "open-link");
    }
}
