use alloc::string::String;
use serde_json::Value;
use xframe_protocol::{IframeState, UploadResult};

/// What a parent message means for the exercise UI
#[derive(Clone, Debug, PartialEq)]
pub enum FrameEvent {
    /// Replace the whole view
    SetState(IframeState),
    SetLanguage(String),
    /// The pending upload finished
    UploadFinished(UploadResult),
    /// Initial content sent right after the port handoff
    Content(Value),
}

impl FrameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FrameEvent::SetState(_) => "set-state",
            FrameEvent::SetLanguage(_) => "set-language",
            FrameEvent::UploadFinished(_) => "upload-result",
            FrameEvent::Content(_) => "content",
        }
    }
}
