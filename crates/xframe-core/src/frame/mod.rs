//! Frame Controller
//!
//! Drives the exercise side of the protocol from inside the iframe.
//!
//! ```text
//! Idle --mount--> Connecting --port / first message--> Connected
//!   |                 |  ^
//!   |                 +--+ tick(): ready retried with backoff
//!   +--mount, not embedded--> Standalone
//! ```
//!
//! Parent messages are turned into [`FrameEvent`]s for the exercise UI. The
//! frame only posts `current-state`, `height-changed`, `file-upload` and
//! `open-link` once connected; a height measured earlier is sent as soon as
//! the connection is up.

mod event;

pub use event::FrameEvent;

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use serde_json::{json, Value};
use xframe_hal::{EmbeddedPlatform, Transport};
use xframe_protocol::{
    guard, Dialect, FilePayload, IframeState, Inbound, MessageFromIframe, MessageToIframe,
    ProtocolError, Signal, MESSAGE_FIELD, TAG_READY, TAG_SET_STATE,
};

use crate::backoff::ReadyBackoff;
use crate::config::FrameConfig;
use crate::constants::FRAME_LOG_PREFIX;
use crate::error::FrameError;
use crate::origin::is_http_url;
use crate::relay::HeightTracker;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    /// Top-level document, no parent to talk to (preview mode)
    Standalone,
    /// Ready announced, waiting for the parent
    Connecting,
    Connected,
    TornDown,
}

pub struct FrameController<E: EmbeddedPlatform> {
    platform: E,
    config: FrameConfig,
    state: FrameState,
    dialect: Dialect,
    backoff: ReadyBackoff,
    height: HeightTracker,
    port_adopted: bool,
    upload_in_flight: bool,
    view: Option<IframeState>,
    language: Option<String>,
}

impl<E: EmbeddedPlatform> FrameController<E> {
    pub fn new(platform: E, config: FrameConfig) -> Self {
        let backoff = ReadyBackoff::new(config.ready_retry_initial_ms, config.ready_retry_max_ms);
        let dialect = config.dialect();
        Self {
            platform,
            config,
            state: FrameState::Idle,
            dialect,
            backoff,
            height: HeightTracker::new(),
            port_adopted: false,
            upload_in_flight: false,
            view: None,
            language: None,
        }
    }

    pub fn platform(&self) -> &E {
        &self.platform
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == FrameState::Connected
    }

    /// The view from the most recent `set-state`
    pub fn view(&self) -> Option<&IframeState> {
        self.view.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn upload_in_flight(&self) -> bool {
        self.upload_in_flight
    }

    /// When `tick` will next announce ready, if still connecting
    pub fn next_retry_ms(&self) -> Option<u64> {
        self.backoff.next_deadline()
    }

    fn log(&self, msg: &str) {
        self.platform
            .debug_write(&format!("{} {}", FRAME_LOG_PREFIX, msg));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Announce readiness to the parent and arm the retry schedule.
    ///
    /// A document that is not inside an iframe enters `Standalone`, which is
    /// a valid preview mode rather than an error.
    pub fn mount(&mut self) -> Result<(), FrameError> {
        match self.state {
            FrameState::Idle => {}
            FrameState::TornDown => return Err(FrameError::TornDown),
            _ => return Err(FrameError::AlreadyStarted),
        }

        if !self.platform.is_embedded() {
            self.log("warning: not embedded in an iframe, running standalone");
            self.state = FrameState::Standalone;
            return Ok(());
        }

        self.state = FrameState::Connecting;
        self.backoff.start(self.platform.now_ms());
        self.announce_ready();
        Ok(())
    }

    /// Retry the ready announcement when it is due
    pub fn tick(&mut self) {
        if self.state != FrameState::Connecting {
            return;
        }
        if self.backoff.poll(self.platform.now_ms()) {
            self.log(&format!(
                "no answer from parent, announcing ready again (retry {})",
                self.backoff.attempts()
            ));
            self.announce_ready();
        }
    }

    pub fn teardown(&mut self) {
        if self.state == FrameState::TornDown {
            return;
        }
        self.state = FrameState::TornDown;
        self.backoff.stop();
        self.log("torn down");
    }

    fn ready_message(&self) -> Value {
        match self.dialect {
            Dialect::Canonical => Value::from(TAG_READY),
            Dialect::EditorEnvelope => self.dialect.wrap(json!({ MESSAGE_FIELD: TAG_READY })),
        }
    }

    fn announce_ready(&self) {
        let ready = self.ready_message();
        if let Err(e) =
            self.platform
                .post_to_parent(Transport::Window, &ready, &self.config.parent_origin)
        {
            self.log(&format!("could not announce ready: {}", e));
        }
    }

    fn on_connected(&mut self) {
        self.state = FrameState::Connected;
        self.backoff.stop();
        self.log("connected to parent");
        if let Some(px) = self.height.pending() {
            if self.send(&MessageFromIframe::HeightChanged { height: px as f64 }).is_ok() {
                self.height.mark_reported(px);
            }
        }
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Entry point for `message` events on the frame's window.
    ///
    /// `from_parent` tells whether `event.source` is `window.parent`.
    pub fn handle_window_message(&mut self, from_parent: bool, data: &Value) -> Option<FrameEvent> {
        match self.state {
            FrameState::Connecting | FrameState::Connected => {}
            FrameState::TornDown => {
                self.log("ignoring window message after teardown");
                return None;
            }
            FrameState::Idle | FrameState::Standalone => return None,
        }
        if !from_parent {
            return None;
        }

        let classified = match Inbound::classify(data) {
            Ok(classified) => classified,
            Err(e) => {
                self.log(&format!("dropping window message: {}", e));
                return None;
            }
        };

        match (classified.inbound, self.config.transport) {
            (Inbound::Signal(Signal::CommunicationPort), Transport::Channel) => {
                self.on_port_sentinel();
                None
            }
            (Inbound::Signal(signal), _) => {
                self.log(&format!("ignoring {:?} signal on window", signal));
                None
            }
            (Inbound::Envelope(envelope), Transport::Window) => self.dispatch(&envelope),
            (Inbound::Envelope(_), Transport::Channel) => {
                self.log("ignoring window envelope, channel transport in use");
                None
            }
        }
    }

    fn on_port_sentinel(&mut self) {
        if self.port_adopted {
            self.log("ignoring repeated communication-port");
            return;
        }
        match self.platform.adopt_port() {
            Ok(()) => {
                self.port_adopted = true;
                self.on_connected();
            }
            Err(e) => self.log(&format!("error: could not adopt port: {}", e)),
        }
    }

    /// Entry point for messages on the adopted port
    pub fn handle_parent_message(&mut self, data: &Value) -> Option<FrameEvent> {
        if self.state == FrameState::TornDown {
            self.log("ignoring parent message after teardown");
            return None;
        }
        match Inbound::classify(data) {
            Ok(classified) => match classified.inbound {
                Inbound::Envelope(envelope) => self.dispatch(&envelope),
                Inbound::Signal(signal) => {
                    self.log(&format!("ignoring {:?} signal from parent", signal));
                    None
                }
            },
            Err(e) => {
                self.log(&format!("dropping parent message: {}", e));
                None
            }
        }
    }

    fn dispatch(&mut self, envelope: &Value) -> Option<FrameEvent> {
        if self.state == FrameState::Connecting {
            // Window transport: the first parent message completes the
            // handshake.
            self.on_connected();
        }

        if envelope.get(MESSAGE_FIELD).and_then(Value::as_str) == Some(TAG_SET_STATE) {
            return match self.decode_state(envelope) {
                Ok(state) => {
                    self.view = Some(state.clone());
                    Some(FrameEvent::SetState(state))
                }
                Err(e) => {
                    self.log(&format!("dropping set-state: {}", e));
                    None
                }
            };
        }

        match MessageToIframe::from_value(envelope) {
            Ok(MessageToIframe::SetLanguage { language }) => {
                self.language = Some(language.clone());
                Some(FrameEvent::SetLanguage(language))
            }
            Ok(MessageToIframe::UploadResult(result)) => {
                if !self.upload_in_flight {
                    self.log("ignoring upload-result without a pending upload");
                    return None;
                }
                self.upload_in_flight = false;
                Some(FrameEvent::UploadFinished(result))
            }
            Ok(MessageToIframe::Content { data }) => Some(FrameEvent::Content(data)),
            Ok(MessageToIframe::SetState(_)) => None,
            Err(e) => {
                self.log(&format!("dropping parent message: {}", e));
                None
            }
        }
    }

    fn decode_state(&self, envelope: &Value) -> Result<IframeState, ProtocolError> {
        if !self.config.forgiving_set_state {
            return IframeState::from_value(envelope);
        }
        let platform = &self.platform;
        let warn = |msg: &str| platform.debug_write(&format!("{} warning: {}", FRAME_LOG_PREFIX, msg));
        if !guard::forgiving_is_set_state_message(envelope, &warn) {
            return Err(ProtocolError::InvalidField {
                field: "view_type",
                expected: "known view type",
            });
        }
        IframeState::from_value_lenient(envelope)
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    fn ensure_connected(&self) -> Result<(), FrameError> {
        match self.state {
            FrameState::Connected => Ok(()),
            FrameState::TornDown => Err(FrameError::TornDown),
            FrameState::Standalone => Err(FrameError::Standalone),
            FrameState::Idle | FrameState::Connecting => Err(FrameError::NotConnected),
        }
    }

    fn send(&self, msg: &MessageFromIframe) -> Result<(), FrameError> {
        let value = self.dialect.wrap(msg.to_value()?);
        self.platform
            .post_to_parent(self.config.transport, &value, &self.config.parent_origin)
            .map_err(|e| {
                self.log(&format!("error: failed to post {}: {}", msg.tag(), e));
                FrameError::from(e)
            })
    }

    /// Report the learner's answer and whether it may be submitted
    pub fn post_current_state(&mut self, data: Value, valid: bool) -> Result<(), FrameError> {
        self.ensure_connected()?;
        self.send(&MessageFromIframe::CurrentState { data, valid })
    }

    /// Ask the parent to upload files. One upload at a time; the result
    /// arrives as [`FrameEvent::UploadFinished`].
    pub fn request_upload(&mut self, files: BTreeMap<String, FilePayload>) -> Result<(), FrameError> {
        self.ensure_connected()?;
        if self.upload_in_flight {
            return Err(FrameError::UploadInFlight);
        }
        self.send(&MessageFromIframe::FileUpload { files })?;
        self.upload_in_flight = true;
        Ok(())
    }

    /// Ask the parent to open an `http(s)` link in a new tab
    pub fn open_link(&mut self, url: &str) -> Result<(), FrameError> {
        self.ensure_connected()?;
        if !is_http_url(url) {
            return Err(FrameError::InvalidUrl(url.into()));
        }
        self.send(&MessageFromIframe::OpenLink { url: url.into() })
    }

    /// Record a content height measurement. Posts only when the rounded
    /// value differs from the last one reported; before the connection is
    /// up the value is kept and sent on connect.
    pub fn report_height(&mut self, px: f64) -> Result<(), FrameError> {
        if self.state == FrameState::TornDown {
            return Err(FrameError::TornDown);
        }
        let px = match self.height.measure(px) {
            Some(px) => px,
            None => return Ok(()),
        };
        if self.state != FrameState::Connected {
            return Ok(());
        }
        self.send(&MessageFromIframe::HeightChanged { height: px as f64 })?;
        self.height.mark_reported(px);
        Ok(())
    }
}
