//! Mock platforms for testing the exercise frame protocol
//!
//! [`MockHost`] stands in for the parent page and [`MockEmbedded`] for the
//! document inside the iframe. Both record everything the controllers ask of
//! them and expose a simulated clock, so handshake and retry logic can be
//! tested without a browser.

#![no_std]
extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU64, Ordering};
use serde_json::Value;
use xframe_hal::{EmbeddedPlatform, HalError, HostPlatform, Platform, Transport, UploadRequestId};
use xframe_protocol::{FilePayload, MESSAGE_FIELD};

/// A message captured by a mock `post_*` call
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedPost {
    pub transport: Transport,
    pub message: Value,
    pub target_origin: String,
}

impl RecordedPost {
    /// The `message` tag, or the string itself for bare signals
    pub fn tag(&self) -> Option<&str> {
        match &self.message {
            Value::String(s) => Some(s.as_str()),
            other => other.get(MESSAGE_FIELD).and_then(Value::as_str),
        }
    }
}

fn tagged(posts: &[RecordedPost], tag: &str) -> Vec<Value> {
    posts
        .iter()
        .filter(|post| post.tag() == Some(tag))
        .map(|post| post.message.clone())
        .collect()
}

// =============================================================================
// Parent side
// =============================================================================

/// Mock parent page
pub struct MockHost {
    /// Simulated time in milliseconds
    time: AtomicU64,
    /// Captured debug messages
    debug_log: RefCell<Vec<String>>,
    posts: RefCell<Vec<RecordedPost>>,
    /// (sentinel, target origin) per successful transfer
    transfers: RefCell<Vec<(String, String)>>,
    transfer_attempts: Cell<u32>,
    heights: RefCell<Vec<u32>>,
    links: RefCell<Vec<String>>,
    uploads: RefCell<Vec<(UploadRequestId, BTreeMap<String, FilePayload>)>>,
    answers: RefCell<Vec<(Value, bool)>>,
    content_window: Cell<bool>,
    upload_failure: Cell<bool>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            time: AtomicU64::new(0),
            debug_log: RefCell::new(Vec::new()),
            posts: RefCell::new(Vec::new()),
            transfers: RefCell::new(Vec::new()),
            transfer_attempts: Cell::new(0),
            heights: RefCell::new(Vec::new()),
            links: RefCell::new(Vec::new()),
            uploads: RefCell::new(Vec::new()),
            answers: RefCell::new(Vec::new()),
            content_window: Cell::new(true),
            upload_failure: Cell::new(false),
        }
    }

    /// Advance the simulated clock
    pub fn advance_time(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn get_debug_log(&self) -> Vec<String> {
        self.debug_log.borrow().clone()
    }

    /// Check if a specific message was logged
    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.debug_log.borrow().iter().any(|msg| msg.contains(substr))
    }

    /// Simulate a detached iframe (no content window)
    pub fn set_content_window_available(&self, available: bool) {
        self.content_window.set(available);
    }

    /// Make `start_upload` fail
    pub fn set_upload_failure(&self, fail: bool) {
        self.upload_failure.set(fail);
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.borrow().clone()
    }

    /// Posted envelopes carrying the given `message` tag, in order
    pub fn posts_tagged(&self, tag: &str) -> Vec<Value> {
        tagged(&self.posts.borrow(), tag)
    }

    /// Tags of every post, in order
    pub fn post_tags(&self) -> Vec<String> {
        self.posts
            .borrow()
            .iter()
            .map(|post| post.tag().unwrap_or("").to_string())
            .collect()
    }

    pub fn clear_posts(&self) {
        self.posts.borrow_mut().clear();
    }

    pub fn transfers(&self) -> Vec<(String, String)> {
        self.transfers.borrow().clone()
    }

    pub fn transfer_attempts(&self) -> u32 {
        self.transfer_attempts.get()
    }

    pub fn heights(&self) -> Vec<u32> {
        self.heights.borrow().clone()
    }

    pub fn links(&self) -> Vec<String> {
        self.links.borrow().clone()
    }

    pub fn uploads(&self) -> Vec<(UploadRequestId, BTreeMap<String, FilePayload>)> {
        self.uploads.borrow().clone()
    }

    pub fn answers(&self) -> Vec<(Value, bool)> {
        self.answers.borrow().clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockHost {
    fn now_ms(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn debug_write(&self, msg: &str) {
        self.debug_log.borrow_mut().push(msg.to_string());
    }
}

impl HostPlatform for MockHost {
    fn transfer_port(&self, sentinel: &str, target_origin: &str) -> Result<(), HalError> {
        self.transfer_attempts.set(self.transfer_attempts.get() + 1);
        if !self.content_window.get() {
            return Err(HalError::ContentWindowUnavailable);
        }
        if !self.transfers.borrow().is_empty() {
            return Err(HalError::PortUnavailable);
        }
        self.transfers
            .borrow_mut()
            .push((sentinel.to_string(), target_origin.to_string()));
        Ok(())
    }

    fn post_to_frame(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError> {
        match transport {
            Transport::Window if !self.content_window.get() => {
                return Err(HalError::ContentWindowUnavailable)
            }
            Transport::Channel if self.transfers.borrow().is_empty() => {
                return Err(HalError::PortUnavailable)
            }
            _ => {}
        }
        self.posts.borrow_mut().push(RecordedPost {
            transport,
            message: msg.clone(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }

    fn set_frame_height(&self, px: u32) {
        self.heights.borrow_mut().push(px);
    }

    fn open_link(&self, url: &str) -> Result<(), HalError> {
        self.links.borrow_mut().push(url.to_string());
        Ok(())
    }

    fn start_upload(
        &self,
        request: UploadRequestId,
        files: &BTreeMap<String, FilePayload>,
    ) -> Result<(), HalError> {
        if self.upload_failure.get() {
            return Err(HalError::NotSupported);
        }
        self.uploads.borrow_mut().push((request, files.clone()));
        Ok(())
    }

    fn current_state_changed(&self, data: &Value, valid: bool) {
        self.answers.borrow_mut().push((data.clone(), valid));
    }
}

// =============================================================================
// Frame side
// =============================================================================

/// Mock iframe document
pub struct MockEmbedded {
    time: AtomicU64,
    debug_log: RefCell<Vec<String>>,
    posts: RefCell<Vec<RecordedPost>>,
    embedded: Cell<bool>,
    /// A port arrived with the sentinel and waits to be adopted
    port_staged: Cell<bool>,
    port_adopted: Cell<bool>,
    adoptions: Cell<u32>,
}

impl MockEmbedded {
    pub fn new() -> Self {
        Self {
            time: AtomicU64::new(0),
            debug_log: RefCell::new(Vec::new()),
            posts: RefCell::new(Vec::new()),
            embedded: Cell::new(true),
            port_staged: Cell::new(false),
            port_adopted: Cell::new(false),
            adoptions: Cell::new(0),
        }
    }

    /// A top-level document rather than an iframe
    pub fn standalone() -> Self {
        let mock = Self::new();
        mock.embedded.set(false);
        mock
    }

    pub fn advance_time(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn get_debug_log(&self) -> Vec<String> {
        self.debug_log.borrow().clone()
    }

    pub fn has_log_containing(&self, substr: &str) -> bool {
        self.debug_log.borrow().iter().any(|msg| msg.contains(substr))
    }

    /// Simulate the port arriving as a transferable of the sentinel event
    pub fn stage_port(&self) {
        self.port_staged.set(true);
    }

    pub fn port_adopted(&self) -> bool {
        self.port_adopted.get()
    }

    pub fn adoptions(&self) -> u32 {
        self.adoptions.get()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.borrow().clone()
    }

    pub fn posts_tagged(&self, tag: &str) -> Vec<Value> {
        tagged(&self.posts.borrow(), tag)
    }

    pub fn clear_posts(&self) {
        self.posts.borrow_mut().clear();
    }
}

impl Default for MockEmbedded {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockEmbedded {
    fn now_ms(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn debug_write(&self, msg: &str) {
        self.debug_log.borrow_mut().push(msg.to_string());
    }
}

impl EmbeddedPlatform for MockEmbedded {
    fn is_embedded(&self) -> bool {
        self.embedded.get()
    }

    fn post_to_parent(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError> {
        if !self.embedded.get() {
            return Err(HalError::NotEmbedded);
        }
        if transport == Transport::Channel && !self.port_adopted.get() {
            return Err(HalError::PortUnavailable);
        }
        self.posts.borrow_mut().push(RecordedPost {
            transport,
            message: msg.clone(),
            target_origin: target_origin.to_string(),
        });
        Ok(())
    }

    fn adopt_port(&self) -> Result<(), HalError> {
        if !self.port_staged.replace(false) {
            return Err(HalError::PortUnavailable);
        }
        self.port_adopted.set(true);
        self.adoptions.set(self.adoptions.get() + 1);
        Ok(())
    }
}
