//! Exercise Frame Protocol
//!
//! This crate defines the messages exchanged between a hosting page (the
//! *parent*) and an embedded exercise-service iframe (the *frame*):
//!
//! - **Envelopes** (`message` module): the closed set of messages in both
//!   directions, tagged by their `message` field
//! - **Iframe state** (`state` module): the view the parent pushes into the
//!   frame, tagged by `view_type`
//! - **Guards** (`guard` module): predicates that validate untyped payloads
//!   received from `postMessage` before they are trusted
//! - **Dialects** (`dialect` module): adapters for the legacy wire forms
//!   (bare string signals, `message_type`-tagged editor envelopes)
//!
//! It is the single source of truth for every tag and sentinel string, so the
//! parent and frame sides never disagree on spelling.
//!
//! # Wire Tags
//!
//! | Direction      | Tag              | Payload                                |
//! |----------------|------------------|----------------------------------------|
//! | frame → parent | `current-state`  | `data`, `valid`                        |
//! | frame → parent | `height-changed` | `data` (pixels)                        |
//! | frame → parent | `file-upload`    | `files` (name → blob or text)          |
//! | frame → parent | `open-link`      | `data` (url)                           |
//! | parent → frame | `set-language`   | `data` (language tag)                  |
//! | parent → frame | `set-state`      | flattened [`IframeState`]              |
//! | parent → frame | `upload-result`  | `success` + `urls` or `error`          |
//! | parent → frame | `content`        | `data`                                 |
//!
//! # Usage
//!
//! ```rust
//! use serde_json::json;
//! use xframe_protocol::{guard, MessageFromIframe};
//!
//! let raw = json!({ "message": "height-changed", "data": 480 });
//! assert!(guard::is_height_changed_message(&raw));
//!
//! let msg = MessageFromIframe::from_value(&raw).unwrap();
//! assert_eq!(msg.tag(), "height-changed");
//! ```

#![no_std]

extern crate alloc;

pub mod dialect;
pub mod error;
mod fields;
pub mod guard;
pub mod message;
pub mod state;

pub use dialect::{Classified, Dialect, Inbound, Signal};
pub use error::ProtocolError;
pub use message::{BlobDescriptor, FilePayload, MessageFromIframe, MessageToIframe, UploadResult};
pub use state::{
    AnswerExerciseData, AnswerExerciseState, ExerciseEditorData, ExerciseEditorState, Grading,
    GradingProgress, IframeState, RepositoryExercise, UserInformation, ViewSubmissionData,
    ViewSubmissionState, ViewType,
};

// =============================================================================
// Envelope fields
// =============================================================================

/// Discriminant field carried by every envelope.
pub const MESSAGE_FIELD: &str = "message";

/// Discriminant field carried by every [`IframeState`].
pub const VIEW_TYPE_FIELD: &str = "view_type";

// =============================================================================
// Frame → parent tags
// =============================================================================

pub const TAG_CURRENT_STATE: &str = "current-state";
pub const TAG_HEIGHT_CHANGED: &str = "height-changed";
pub const TAG_FILE_UPLOAD: &str = "file-upload";
pub const TAG_OPEN_LINK: &str = "open-link";

/// Readiness announcement. Sent as a bare string on the window bus, accepted
/// as `{ "message": "ready" }` from legacy editor pages.
pub const TAG_READY: &str = "ready";

// =============================================================================
// Parent → frame tags
// =============================================================================

pub const TAG_SET_LANGUAGE: &str = "set-language";
pub const TAG_SET_STATE: &str = "set-state";
pub const TAG_UPLOAD_RESULT: &str = "upload-result";
pub const TAG_CONTENT: &str = "content";

// =============================================================================
// Window-bus sentinels
// =============================================================================

/// Posted by the parent together with the transferred port.
pub const PORT_SENTINEL: &str = "communication-port";

/// Older frames announce that their channel listener is installed with this
/// string instead of `"ready"`. Treated as a readiness signal.
pub const SCRIPT_INSTALLED_SENTINEL: &str = "script-installed";

/// `message_type` value used by the simplified example-exercise pages.
pub const EDITOR_MESSAGE_TYPE: &str = "moocfi/editor-message";
