//! Controller configuration
//!
//! Both structs deserialize from the JSON the embedding page passes to the
//! web bindings; every field has a default.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xframe_hal::Transport;
use xframe_protocol::Dialect;

use crate::constants::{ANY_ORIGIN, READY_RETRY_INITIAL_MS, READY_RETRY_MAX_MS};

fn default_target_origin() -> String {
    ANY_ORIGIN.to_string()
}

fn default_true() -> bool {
    true
}

fn default_retry_initial() -> u64 {
    READY_RETRY_INITIAL_MS
}

fn default_retry_max() -> u64 {
    READY_RETRY_MAX_MS
}

/// Configuration of the embedding page
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentConfig {
    #[serde(default)]
    pub transport: Transport,
    /// Origins whose window messages are trusted. `"*"` trusts any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    /// The iframe is sandboxed without `allow-same-origin`, so its messages
    /// carry the opaque origin `"null"`
    #[serde(default = "default_true")]
    pub sandboxed: bool,
    /// `targetOrigin` for posts through the window
    #[serde(default = "default_target_origin")]
    pub target_origin: String,
    /// Language sent right after the handshake
    #[serde(default)]
    pub language: Option<String>,
    /// Initial `content` payload for the channel transport
    #[serde(default)]
    pub content: Option<Value>,
}

impl Default for ParentConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            allowed_origins: Vec::new(),
            sandboxed: true,
            target_origin: default_target_origin(),
            language: None,
            content: None,
        }
    }
}

/// Configuration of the exercise document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    #[serde(default)]
    pub transport: Transport,
    /// `targetOrigin` for posts to the parent window
    #[serde(default = "default_target_origin")]
    pub parent_origin: String,
    /// Tag outgoing envelopes with the legacy editor `message_type`
    #[serde(default)]
    pub editor_envelope: bool,
    /// Accept `set-state` payloads that fail the strict schema, with a warning
    #[serde(default = "default_true")]
    pub forgiving_set_state: bool,
    #[serde(default = "default_retry_initial")]
    pub ready_retry_initial_ms: u64,
    #[serde(default = "default_retry_max")]
    pub ready_retry_max_ms: u64,
}

impl FrameConfig {
    pub fn dialect(&self) -> Dialect {
        if self.editor_envelope {
            Dialect::EditorEnvelope
        } else {
            Dialect::Canonical
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            parent_origin: default_target_origin(),
            editor_envelope: false,
            forgiving_set_state: true,
            ready_retry_initial_ms: READY_RETRY_INITIAL_MS,
            ready_retry_max_ms: READY_RETRY_MAX_MS,
        }
    }
}
