//! Parent Controller
//!
//! Drives the host side of the protocol for one `<iframe>`:
//!
//! ```text
//! Idle --attach--> AwaitingReady --ready--> Active --teardown--> TornDown
//!                        |
//!                        +--port transfer failed--> Failed
//! ```
//!
//! The controller is fed by the platform layer (`handle_window_message`,
//! `handle_port_message`) and by the embedding code (`push_state`,
//! `set_language`, `complete_upload`, `submit`). It never blocks.
//!
//! # Handshake
//!
//! Until the frame announces `ready`, states pushed by the embedding code are
//! queued; only the most recent one is kept. On ready the parent transfers
//! the channel port (channel transport only) and flushes `content`,
//! `set-language` and `set-state`, in that order.

mod upload;

pub use upload::PendingUpload;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use serde_json::Value;
use xframe_hal::{HostPlatform, Transport, UploadRequestId};
use xframe_protocol::state::describe;
use xframe_protocol::{
    Classified, Dialect, FilePayload, IframeState, Inbound, MessageFromIframe, MessageToIframe, Signal,
    UploadResult, MESSAGE_FIELD, PORT_SENTINEL,
};

use crate::config::ParentConfig;
use crate::constants::PARENT_LOG_PREFIX;
use crate::error::{FrameError, SubmitError};
use crate::origin::{is_http_url, OriginPolicy};
use crate::relay::HeightSink;
use upload::UploadTable;

/// Lifecycle of the parent side
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParentState {
    /// Created, not listening yet
    #[default]
    Idle,
    /// Listening for the frame's ready signal
    AwaitingReady,
    /// Handshake done, messages flow both ways
    Active,
    /// The port handoff failed; the conversation is abandoned
    Failed,
    TornDown,
}

impl ParentState {
    pub fn as_str(self) -> &'static str {
        match self {
            ParentState::Idle => "idle",
            ParentState::AwaitingReady => "awaiting-ready",
            ParentState::Active => "active",
            ParentState::Failed => "failed",
            ParentState::TornDown => "torn-down",
        }
    }
}

/// Latest answer reported with `current-state`
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentAnswer {
    pub data: Value,
    pub valid: bool,
}

pub struct ParentController<H: HostPlatform> {
    platform: H,
    config: ParentConfig,
    policy: OriginPolicy,
    state: ParentState,
    /// Wire form the frame used for its ready signal
    dialect: Dialect,
    /// Waiting for the handshake; a newer push replaces it
    queued_state: Option<IframeState>,
    last_posted: Option<IframeState>,
    language: Option<String>,
    posted_language: Option<String>,
    height: HeightSink,
    answer: Option<CurrentAnswer>,
    uploads: UploadTable,
}

impl<H: HostPlatform> ParentController<H> {
    pub fn new(platform: H, config: ParentConfig) -> Self {
        let policy = OriginPolicy::from_config(&config);
        let language = config.language.clone();
        Self {
            platform,
            config,
            policy,
            state: ParentState::Idle,
            dialect: Dialect::Canonical,
            queued_state: None,
            last_posted: None,
            language,
            posted_language: None,
            height: HeightSink::new(),
            answer: None,
            uploads: UploadTable::new(),
        }
    }

    pub fn platform(&self) -> &H {
        &self.platform
    }

    pub fn config(&self) -> &ParentConfig {
        &self.config
    }

    pub fn policy_mut(&mut self) -> &mut OriginPolicy {
        &mut self.policy
    }

    pub fn state(&self) -> ParentState {
        self.state
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Last height applied to the iframe element
    pub fn height(&self) -> Option<u32> {
        self.height.current()
    }

    pub fn current_answer(&self) -> Option<&CurrentAnswer> {
        self.answer.as_ref()
    }

    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn last_posted_state(&self) -> Option<&IframeState> {
        self.last_posted.as_ref()
    }

    fn log(&self, msg: &str) {
        self.platform
            .debug_write(&format!("{} {}", PARENT_LOG_PREFIX, msg));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start listening for the frame. Idle → AwaitingReady.
    pub fn attach(&mut self) -> Result<(), FrameError> {
        match self.state {
            ParentState::Idle => {
                self.state = ParentState::AwaitingReady;
                self.log(&format!(
                    "attached, waiting for ready ({:?} transport)",
                    self.config.transport
                ));
                Ok(())
            }
            ParentState::TornDown => Err(FrameError::TornDown),
            _ => Err(FrameError::AlreadyStarted),
        }
    }

    /// Stop processing. Later traffic is ignored and pending uploads are
    /// forgotten.
    pub fn teardown(&mut self) {
        if self.state == ParentState::TornDown {
            return;
        }
        self.state = ParentState::TornDown;
        self.queued_state = None;
        self.uploads.clear();
        self.log("torn down");
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Whether a window message may be acted on: it comes from the frame's
    /// own window and its origin passes the policy
    pub fn trusts(&self, origin: &str, from_frame: bool) -> bool {
        from_frame && self.policy.accepts(origin)
    }

    /// Entry point for `message` events on the parent window.
    ///
    /// `from_frame` tells whether `event.source` is the iframe's content
    /// window. Untrusted traffic is dropped; rejected ready signals are
    /// logged.
    pub fn handle_window_message(&mut self, origin: &str, from_frame: bool, data: &Value) {
        match self.state {
            ParentState::Idle | ParentState::Failed => return,
            ParentState::TornDown => {
                self.log("ignoring window message after teardown");
                return;
            }
            ParentState::AwaitingReady | ParentState::Active => {}
        }

        let trusted = self.trusts(origin, from_frame);
        let classified = match Inbound::classify(data) {
            Ok(classified) => classified,
            Err(e) => {
                if trusted {
                    self.log(&format!("dropping window message: {}", e));
                }
                return;
            }
        };

        if !trusted {
            if classified.inbound == Inbound::Signal(Signal::Ready) {
                self.log(&format!(
                    "rejected ready from origin '{}' (source is frame: {})",
                    origin, from_frame
                ));
            }
            return;
        }

        match classified.inbound {
            Inbound::Signal(Signal::Ready) => self.on_ready(classified.dialect),
            Inbound::Signal(Signal::CommunicationPort) => {
                self.log("ignoring communication-port sentinel sent by the frame")
            }
            Inbound::Envelope(envelope) => match (self.config.transport, self.state) {
                (Transport::Window, ParentState::Active) => self.handle_frame_message(&envelope),
                (Transport::Window, _) => self.log(&format!(
                    "ignoring {} before ready",
                    envelope.get(MESSAGE_FIELD).and_then(Value::as_str).unwrap_or("message")
                )),
                (Transport::Channel, _) => {
                    self.log("ignoring window envelope, channel transport in use")
                }
            },
        }
    }

    /// Entry point for messages arriving on the parent's end of the channel
    pub fn handle_port_message(&mut self, data: &Value) {
        if self.state != ParentState::Active || self.config.transport != Transport::Channel {
            self.log(&format!("ignoring port message in state {}", self.state.as_str()));
            return;
        }
        match Inbound::classify(data) {
            Ok(Classified {
                inbound: Inbound::Envelope(envelope),
                ..
            }) => self.handle_frame_message(&envelope),
            Ok(_) => self.log("ignoring bootstrap signal on port"),
            Err(e) => self.log(&format!("dropping port message: {}", e)),
        }
    }

    /// Dispatch a canonical frame → parent envelope
    pub fn handle_frame_message(&mut self, data: &Value) {
        if self.state == ParentState::TornDown {
            self.log("ignoring frame message after teardown");
            return;
        }
        let msg = match MessageFromIframe::from_value(data) {
            Ok(msg) => msg,
            Err(e) => {
                self.log(&format!("dropping malformed frame message: {}", e));
                return;
            }
        };

        match msg {
            MessageFromIframe::HeightChanged { height } => match self.height.apply(height) {
                Ok(Some(px)) => self.platform.set_frame_height(px),
                Ok(None) => {}
                Err(px) => self.log(&format!("ignoring invalid height {}", px)),
            },
            MessageFromIframe::CurrentState { data, valid } => {
                self.platform.current_state_changed(&data, valid);
                self.answer = Some(CurrentAnswer { data, valid });
            }
            MessageFromIframe::FileUpload { files } => self.begin_upload(files),
            MessageFromIframe::OpenLink { url } => {
                if !is_http_url(&url) {
                    self.log(&format!("refusing to open non-http link '{}'", url));
                } else if let Err(e) = self.platform.open_link(&url) {
                    self.log(&format!("could not open link: {}", e));
                }
            }
        }
    }

    fn on_ready(&mut self, dialect: Dialect) {
        match self.state {
            ParentState::AwaitingReady => {
                self.dialect = dialect;
                if self.config.transport == Transport::Channel {
                    if let Err(e) = self
                        .platform
                        .transfer_port(PORT_SENTINEL, &self.config.target_origin)
                    {
                        self.log(&format!("error: port transfer failed, giving up: {}", e));
                        self.state = ParentState::Failed;
                        return;
                    }
                    self.log("communication port transferred");
                }
                self.state = ParentState::Active;
                self.log("frame ready");
                self.flush(true);
            }
            ParentState::Active if self.config.transport == Transport::Window => {
                // A reloaded frame lost its view; send everything again.
                self.log("frame announced ready again, resending state");
                self.dialect = dialect;
                if self.queued_state.is_none() {
                    self.queued_state = self.last_posted.take();
                } else {
                    self.last_posted = None;
                }
                self.posted_language = None;
                self.flush(false);
            }
            _ => self.log("ignoring repeated ready"),
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    fn flush(&mut self, initial: bool) {
        if initial && self.config.transport == Transport::Channel {
            if let Some(content) = self.config.content.clone() {
                let _ = self.send(&MessageToIframe::Content { data: content });
            }
        }
        if let Some(language) = self.language.clone() {
            let _ = self.send_language(language);
        }
        if let Some(state) = self.queued_state.take() {
            let _ = self.send_state(state);
        }
    }

    fn send(&self, msg: &MessageToIframe) -> Result<(), FrameError> {
        let value = self.dialect.wrap(msg.to_value()?);
        self.platform
            .post_to_frame(self.config.transport, &value, &self.config.target_origin)
            .map_err(|e| {
                self.log(&format!("error: failed to post {}: {}", msg.tag(), e));
                FrameError::from(e)
            })
    }

    fn send_state(&mut self, state: IframeState) -> Result<(), FrameError> {
        if self.last_posted.as_ref() == Some(&state) {
            self.log("state unchanged, not posting again");
            return Ok(());
        }
        let msg = MessageToIframe::SetState(state);
        match self.send(&msg) {
            Ok(()) => {
                if let MessageToIframe::SetState(state) = msg {
                    self.log(&format!("posted state {}", describe(&state)));
                    self.last_posted = Some(state);
                }
                Ok(())
            }
            Err(e) => {
                if let MessageToIframe::SetState(state) = msg {
                    self.queued_state = Some(state);
                }
                Err(e)
            }
        }
    }

    fn send_language(&mut self, language: String) -> Result<(), FrameError> {
        if self.posted_language.as_deref() == Some(language.as_str()) {
            return Ok(());
        }
        self.send(&MessageToIframe::SetLanguage {
            language: language.clone(),
        })?;
        self.posted_language = Some(language);
        Ok(())
    }

    /// Replace the frame's view. Queued until the handshake completes; a
    /// state equal to the last one posted is not sent again.
    pub fn push_state(&mut self, state: IframeState) -> Result<(), FrameError> {
        match self.state {
            ParentState::TornDown => Err(FrameError::TornDown),
            ParentState::Active => {
                self.queued_state = None;
                self.send_state(state)
            }
            _ => {
                self.log(&format!("queued state {} until ready", describe(&state)));
                self.queued_state = Some(state);
                Ok(())
            }
        }
    }

    /// Remember the UI language and send it once the frame is ready
    pub fn set_language(&mut self, language: &str) -> Result<(), FrameError> {
        if self.state == ParentState::TornDown {
            return Err(FrameError::TornDown);
        }
        self.language = Some(language.to_string());
        if self.state == ParentState::Active {
            self.send_language(language.to_string())?;
        }
        Ok(())
    }

    // =========================================================================
    // Uploads
    // =========================================================================

    fn begin_upload(&mut self, files: BTreeMap<String, FilePayload>) {
        let pending = PendingUpload {
            file_names: files.keys().cloned().collect(),
            started_ms: self.platform.now_ms(),
        };
        let id = match self.uploads.insert(pending) {
            Ok(id) => id,
            Err(e) => {
                self.log(&format!("rejecting upload of {} files: {}", files.len(), e));
                self.reply_upload(UploadResult::Failure { error: e.to_string() });
                return;
            }
        };

        match self.platform.start_upload(id, &files) {
            Ok(()) => self.log(&format!("upload {} started ({} files)", id, files.len())),
            Err(e) => {
                self.uploads.remove(id);
                self.log(&format!("upload {} could not start: {}", id, e));
                self.reply_upload(UploadResult::Failure { error: e.to_string() });
            }
        }
    }

    fn reply_upload(&self, result: UploadResult) {
        let _ = self.send(&MessageToIframe::UploadResult(result));
    }

    /// Relay the outcome of an upload started through `start_upload`.
    ///
    /// `Ok` carries logical file name → public URL.
    pub fn complete_upload(
        &mut self,
        request: UploadRequestId,
        result: Result<BTreeMap<String, String>, String>,
    ) -> Result<(), FrameError> {
        if self.state == ParentState::TornDown {
            return Err(FrameError::TornDown);
        }
        let pending = self
            .uploads
            .remove(request)
            .ok_or(FrameError::UnknownUpload(request))?;

        let result = match result {
            Ok(urls) => UploadResult::Success { urls },
            Err(error) => UploadResult::Failure { error },
        };
        self.log(&format!(
            "upload {} finished after {}ms ({} files, success: {})",
            request,
            self.platform.now_ms().saturating_sub(pending.started_ms),
            pending.file_names.len(),
            result.is_success()
        ));
        self.send(&MessageToIframe::UploadResult(result))
    }

    // =========================================================================
    // Submission gate
    // =========================================================================

    /// The latest answer, if the frame marked it valid
    pub fn submit(&self) -> Result<Value, SubmitError> {
        match &self.answer {
            None => Err(SubmitError::NoAnswer),
            Some(answer) if !answer.valid => Err(SubmitError::InvalidAnswer),
            Some(answer) => Ok(answer.data.clone()),
        }
    }

    pub fn can_submit(&self) -> bool {
        matches!(&self.answer, Some(answer) if answer.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use serde_json::json;
    use xframe_hal_mock::MockHost;

    const FRAME_ORIGIN: &str = "null";

    fn state(task: &str) -> IframeState {
        IframeState::from_value(&json!({
            "view_type": "answer-exercise",
            "exercise_task_id": task,
            "user_information": { "pseudonymous_id": "p", "signed_in": true },
            "data": { "public_spec": { "q": 1 }, "previous_submission": null }
        }))
        .unwrap()
    }

    fn attached(config: ParentConfig) -> ParentController<MockHost> {
        let mut parent = ParentController::new(MockHost::new(), config);
        parent.attach().unwrap();
        parent
    }

    fn ready(parent: &mut ParentController<MockHost>) {
        parent.handle_window_message(FRAME_ORIGIN, true, &json!("ready"));
    }

    #[test]
    fn test_attach_twice() {
        let mut parent = attached(ParentConfig::default());
        assert_eq!(parent.attach(), Err(FrameError::AlreadyStarted));
    }

    #[test]
    fn test_ready_transfers_port_then_active() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        assert_eq!(parent.state(), ParentState::Active);
        assert_eq!(
            parent.platform().transfers(),
            [("communication-port".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn test_idle_ignores_ready() {
        let mut parent = ParentController::new(MockHost::new(), ParentConfig::default());
        parent.handle_window_message(FRAME_ORIGIN, true, &json!("ready"));
        assert_eq!(parent.state(), ParentState::Idle);
        assert!(parent.platform().transfers().is_empty());
    }

    #[test]
    fn test_flush_order() {
        let config = ParentConfig {
            language: Some("fi".into()),
            content: Some(json!({ "intro": true })),
            ..ParentConfig::default()
        };
        let mut parent = attached(config);
        parent.push_state(state("t1")).unwrap();
        ready(&mut parent);
        assert_eq!(
            parent.platform().post_tags(),
            ["content", "set-language", "set-state"]
        );
    }

    #[test]
    fn test_window_envelopes_wait_for_ready() {
        let config = ParentConfig {
            transport: Transport::Window,
            ..ParentConfig::default()
        };
        let mut parent = attached(config);
        let early = [
            json!({ "message": "height-changed", "data": 222 }),
            json!({ "message": "current-state", "data": { "a": 1 }, "valid": true }),
            json!({ "message": "file-upload", "files": { "notes.txt": "hi" } }),
        ];
        for msg in &early {
            parent.handle_window_message(FRAME_ORIGIN, true, msg);
        }
        assert_eq!(parent.state(), ParentState::AwaitingReady);
        assert_eq!(parent.height(), None);
        assert!(parent.current_answer().is_none());
        assert_eq!(parent.pending_uploads(), 0);
        assert!(parent.platform().uploads().is_empty());
        assert!(parent.platform().heights().is_empty());
        assert!(parent.platform().posts().is_empty());
        assert!(parent.platform().has_log_containing("ignoring height-changed before ready"));

        ready(&mut parent);
        parent.handle_window_message(FRAME_ORIGIN, true, &early[0]);
        assert_eq!(parent.height(), Some(222));
    }

    #[test]
    fn test_trust_needs_frame_window_and_origin() {
        let config = ParentConfig {
            allowed_origins: vec!["https://exercises.example".into()],
            sandboxed: false,
            ..ParentConfig::default()
        };
        let parent = attached(config);
        assert!(parent.trusts("https://exercises.example", true));
        assert!(!parent.trusts("https://exercises.example", false));
        assert!(!parent.trusts("https://evil.example", true));
        assert!(!parent.trusts("null", true));
    }

    #[test]
    fn test_content_not_sent_over_window() {
        let config = ParentConfig {
            transport: Transport::Window,
            content: Some(json!({ "intro": true })),
            ..ParentConfig::default()
        };
        let mut parent = attached(config);
        ready(&mut parent);
        assert!(parent.platform().posts_tagged("content").is_empty());
    }

    #[test]
    fn test_duplicate_state_not_resent() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.push_state(state("t1")).unwrap();
        parent.push_state(state("t1")).unwrap();
        parent.push_state(state("t2")).unwrap();
        assert_eq!(parent.platform().posts_tagged("set-state").len(), 2);
        assert!(parent.platform().has_log_containing("state unchanged"));
    }

    #[test]
    fn test_language_only_on_change() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.set_language("en").unwrap();
        parent.set_language("en").unwrap();
        parent.set_language("sv").unwrap();
        let posts = parent.platform().posts_tagged("set-language");
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1]["data"], "sv");
    }

    #[test]
    fn test_height_dispatch() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.handle_port_message(&json!({ "message": "height-changed", "data": 320.4 }));
        parent.handle_port_message(&json!({ "message": "height-changed", "data": -3 }));
        assert_eq!(parent.height(), Some(320));
        assert_eq!(parent.platform().heights(), [320]);
        assert!(parent.platform().has_log_containing("invalid height"));
    }

    #[test]
    fn test_current_state_notifies_embedder() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.handle_port_message(&json!({
            "message": "current-state",
            "data": { "choice": 2 },
            "valid": true
        }));
        assert_eq!(parent.platform().answers(), [(json!({ "choice": 2 }), true)]);
        assert_eq!(parent.submit(), Ok(json!({ "choice": 2 })));
    }

    #[test]
    fn test_submit_gate() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        assert_eq!(parent.submit(), Err(SubmitError::NoAnswer));
        parent.handle_port_message(&json!({ "message": "current-state", "data": 1, "valid": false }));
        assert_eq!(parent.submit(), Err(SubmitError::InvalidAnswer));
        assert!(!parent.can_submit());
    }

    #[test]
    fn test_open_link_scheme_check() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.handle_port_message(&json!({ "message": "open-link", "data": "javascript:alert(1)" }));
        parent.handle_port_message(&json!({ "message": "open-link", "data": "HTTPS://docs.example" }));
        assert_eq!(parent.platform().links(), ["HTTPS://docs.example"]);
        assert!(parent.platform().has_log_containing("refusing to open"));
    }

    #[test]
    fn test_upload_start_failure_replies() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.platform().set_upload_failure(true);
        parent.handle_port_message(&json!({ "message": "file-upload", "files": { "a.txt": "x" } }));
        let replies = parent.platform().posts_tagged("upload-result");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["success"], false);
        assert_eq!(parent.pending_uploads(), 0);
    }

    #[test]
    fn test_unknown_upload_completion() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        assert_eq!(
            parent.complete_upload(7, Err("nope".into())),
            Err(FrameError::UnknownUpload(7))
        );
    }

    #[test]
    fn test_editor_dialect_mirrored() {
        let mut parent = attached(ParentConfig::default());
        parent.handle_window_message(
            FRAME_ORIGIN,
            true,
            &json!({ "message": "ready", "message_type": "moocfi/editor-message" }),
        );
        parent.push_state(state("t1")).unwrap();
        let posted = parent.platform().posts_tagged("set-state");
        assert_eq!(posted[0]["message_type"], "moocfi/editor-message");
        assert_eq!(parent.dialect(), Dialect::EditorEnvelope);
    }

    #[test]
    fn test_window_envelope_ignored_in_channel_transport() {
        let mut parent = attached(ParentConfig::default());
        ready(&mut parent);
        parent.handle_window_message(
            FRAME_ORIGIN,
            true,
            &json!({ "message": "height-changed", "data": 10 }),
        );
        assert_eq!(parent.height(), None);
    }

}
