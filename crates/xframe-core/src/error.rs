//! Controller error types

use alloc::string::String;
use core::fmt;
use xframe_hal::{HalError, UploadRequestId};
use xframe_protocol::ProtocolError;

/// Errors returned by controller operations
#[derive(Clone, Debug, PartialEq)]
pub enum FrameError {
    /// `attach`/`mount` called twice
    AlreadyStarted,
    /// The controller was torn down
    TornDown,
    /// The handshake has not completed
    NotConnected,
    /// The document is not embedded in a parent window
    Standalone,
    /// An upload is already waiting for its result
    UploadInFlight,
    /// Pending upload limit reached
    TooManyPendingUploads,
    /// Completion for a request id the parent does not track
    UnknownUpload(UploadRequestId),
    /// Only http(s) links may be opened
    InvalidUrl(String),
    /// Platform call failed
    Platform(HalError),
    /// Message could not be encoded or decoded
    Protocol(ProtocolError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::AlreadyStarted => write!(f, "Already started"),
            FrameError::TornDown => write!(f, "Controller torn down"),
            FrameError::NotConnected => write!(f, "Not connected"),
            FrameError::Standalone => write!(f, "Not embedded in a parent window"),
            FrameError::UploadInFlight => write!(f, "An upload is already in progress"),
            FrameError::TooManyPendingUploads => write!(f, "Too many pending uploads"),
            FrameError::UnknownUpload(id) => write!(f, "Unknown upload request {}", id),
            FrameError::InvalidUrl(url) => write!(f, "Refusing to open url: {}", url),
            FrameError::Platform(e) => write!(f, "Platform error: {}", e),
            FrameError::Protocol(e) => write!(f, "Protocol error: {}", e),
        }
    }
}

impl From<HalError> for FrameError {
    fn from(e: HalError) -> Self {
        FrameError::Platform(e)
    }
}

impl From<ProtocolError> for FrameError {
    fn from(e: ProtocolError) -> Self {
        FrameError::Protocol(e)
    }
}

/// Why the parent refused to submit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The frame has not reported any answer yet
    NoAnswer,
    /// The latest `current-state` had `valid: false`
    InvalidAnswer,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::NoAnswer => write!(f, "No answer reported"),
            SubmitError::InvalidAnswer => write!(f, "Answer is not valid"),
        }
    }
}
