//! Platform Abstraction for the exercise frame protocol
//!
//! The controllers in `xframe-core` never touch the DOM directly. Everything
//! that reaches outside the state machine goes through these traits:
//!
//! - [`Platform`]: time and diagnostics, shared by both sides
//! - [`HostPlatform`]: the parent page that owns the `<iframe>` element
//! - [`EmbeddedPlatform`]: the document running inside the iframe
//!
//! # Implementations
//!
//! - **Browser**: `xframe-web` (`web-sys` windows, `MessageChannel` ports)
//! - **Tests**: `xframe-hal-mock` (recorded posts, simulated clock)

#![no_std]

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xframe_protocol::FilePayload;

/// Identifier handed to the uploader and echoed back on completion
pub type UploadRequestId = u32;

/// How protocol messages travel once the handshake is done
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Every message goes through `window.postMessage`
    Window,
    /// A dedicated `MessageChannel` port is handed over on ready
    #[default]
    Channel,
}

/// Capabilities shared by both sides of the protocol
pub trait Platform {
    /// Milliseconds on a monotonic clock
    ///
    /// On WASM: `performance.now()`
    fn now_ms(&self) -> u64;

    /// Write a diagnostic line
    ///
    /// On WASM: `console.log()`
    fn debug_write(&self, msg: &str);
}

/// The page that embeds the exercise iframe
pub trait HostPlatform: Platform {
    /// Post `sentinel` to the frame's window with the channel's far port as a
    /// transferable.
    ///
    /// # Returns
    /// * `Ok(())` - Port transferred; later `Transport::Channel` posts use it
    /// * `Err(HalError::ContentWindowUnavailable)` - The iframe has no window
    /// * `Err(HalError::PortUnavailable)` - The port was already transferred
    fn transfer_port(&self, sentinel: &str, target_origin: &str) -> Result<(), HalError>;

    /// Deliver a protocol envelope to the frame.
    ///
    /// `target_origin` is only used for `Transport::Window`.
    fn post_to_frame(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError>;

    /// Apply a new height, in pixels, to the iframe element
    fn set_frame_height(&self, px: u32);

    /// Open a link outside the sandbox
    fn open_link(&self, _url: &str) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }

    /// Start an asynchronous upload.
    ///
    /// The result comes back through `ParentController::complete_upload`
    /// with the same request id.
    fn start_upload(
        &self,
        _request: UploadRequestId,
        _files: &BTreeMap<String, FilePayload>,
    ) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }

    /// Notify the embedding code that the frame reported a new answer
    fn current_state_changed(&self, _data: &Value, _valid: bool) {}
}

/// The document running inside the iframe
pub trait EmbeddedPlatform: Platform {
    /// True when `window.parent` is a different window
    fn is_embedded(&self) -> bool;

    /// Deliver a protocol envelope to the parent.
    ///
    /// `Transport::Channel` requires a previously adopted port.
    fn post_to_parent(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError>;

    /// Take ownership of the port that arrived with the sentinel and start
    /// listening on it.
    fn adopt_port(&self) -> Result<(), HalError>;
}

/// Errors reported by platform implementations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalError {
    /// The iframe element has no content window (detached or not loaded)
    ContentWindowUnavailable,
    /// No port to transfer or adopt
    PortUnavailable,
    /// The document is not running inside an iframe
    NotEmbedded,
    /// `postMessage` threw (e.g. value not cloneable)
    PostFailed,
    /// Message could not be converted for the platform
    InvalidMessage,
    /// Operation not supported on this platform
    NotSupported,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::ContentWindowUnavailable => write!(f, "iframe content window unavailable"),
            HalError::PortUnavailable => write!(f, "message port unavailable"),
            HalError::NotEmbedded => write!(f, "not embedded in a parent window"),
            HalError::PostFailed => write!(f, "postMessage failed"),
            HalError::InvalidMessage => write!(f, "invalid message"),
            HalError::NotSupported => write!(f, "operation not supported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_transport_serde_names() {
        assert_eq!(serde_json::to_value(Transport::Window).unwrap(), "window");
        let parsed: Transport = serde_json::from_value(Value::from("channel")).unwrap();
        assert_eq!(parsed, Transport::Channel);
        assert_eq!(Transport::default(), Transport::Channel);
    }

    #[test]
    fn test_hal_error_display() {
        assert_eq!(
            HalError::ContentWindowUnavailable.to_string(),
            "iframe content window unavailable"
        );
    }
}
