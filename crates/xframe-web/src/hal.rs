//! Browser implementations of the platform traits
//!
//! [`WebHost`] drives an `<iframe>` element from the parent page and
//! [`WebEmbedded`] runs inside the exercise document. Both keep the raw JS
//! pieces the core never sees (ports, blobs, callbacks).

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use js_sys::{Array, Function, Object, Promise};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{HtmlIFrameElement, MessageChannel, MessageEvent, MessagePort, Window};
use xframe_hal::{EmbeddedPlatform, HalError, HostPlatform, Platform, Transport, UploadRequestId};
use xframe_protocol::{FilePayload, MESSAGE_FIELD, TAG_FILE_UPLOAD};

use crate::convert::{outbound_message, to_frame_message, to_js, urls_from_js};
use crate::util::{self, describe_js_error};

/// Called when an upload started by [`WebHost`] settles
pub type UploadDone = Rc<dyn Fn(UploadRequestId, Result<BTreeMap<String, String>, String>)>;

pub type PortHandler = Closure<dyn FnMut(MessageEvent)>;

fn now_ms() -> u64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now() as u64)
        .unwrap_or(0)
}

/// Route a log line to the matching console level
fn console_write(msg: &str) {
    if msg.contains("error:") {
        util::error(msg);
    } else if msg.contains("warning:") {
        util::warn(msg);
    } else {
        util::log(msg);
    }
}

// =============================================================================
// Parent side
// =============================================================================

pub struct WebHost {
    iframe: HtmlIFrameElement,
    channel: MessageChannel,
    port_transferred: Cell<bool>,
    uploader: RefCell<Option<Function>>,
    answer_callback: RefCell<Option<Function>>,
    /// Raw `files` of the file-upload being dispatched
    staged_files: RefCell<Option<JsValue>>,
    upload_done: RefCell<Option<UploadDone>>,
}

impl WebHost {
    pub fn new(iframe: HtmlIFrameElement) -> Result<Self, JsValue> {
        Ok(Self {
            iframe,
            channel: MessageChannel::new()?,
            port_transferred: Cell::new(false),
            uploader: RefCell::new(None),
            answer_callback: RefCell::new(None),
            staged_files: RefCell::new(None),
            upload_done: RefCell::new(None),
        })
    }

    pub fn iframe(&self) -> &HtmlIFrameElement {
        &self.iframe
    }

    /// The parent's end of the channel
    pub fn port(&self) -> MessagePort {
        self.channel.port1()
    }

    pub fn content_window(&self) -> Option<Window> {
        self.iframe.content_window()
    }

    pub fn set_uploader(&self, uploader: Option<Function>) {
        *self.uploader.borrow_mut() = uploader;
    }

    pub fn set_answer_callback(&self, callback: Option<Function>) {
        *self.answer_callback.borrow_mut() = callback;
    }

    pub fn set_upload_done(&self, done: UploadDone) {
        *self.upload_done.borrow_mut() = Some(done);
    }

    pub fn stage_files(&self, files: Option<JsValue>) {
        *self.staged_files.borrow_mut() = files;
    }

    pub fn close(&self) {
        let port = self.channel.port1();
        port.set_onmessage(None);
        port.close();
    }
}

impl Platform for WebHost {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    fn debug_write(&self, msg: &str) {
        console_write(msg);
    }
}

impl HostPlatform for WebHost {
    fn transfer_port(&self, sentinel: &str, target_origin: &str) -> Result<(), HalError> {
        let window = self
            .content_window()
            .ok_or(HalError::ContentWindowUnavailable)?;
        if self.port_transferred.get() {
            return Err(HalError::PortUnavailable);
        }
        let transfer = Array::of1(&self.channel.port2());
        window
            .post_message_with_transfer(&JsValue::from_str(sentinel), target_origin, &transfer)
            .map_err(|_| HalError::PostFailed)?;
        self.port_transferred.set(true);
        Ok(())
    }

    fn post_to_frame(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError> {
        let js = to_frame_message(msg).map_err(|_| HalError::InvalidMessage)?;
        match transport {
            Transport::Window => self
                .content_window()
                .ok_or(HalError::ContentWindowUnavailable)?
                .post_message(&js, target_origin),
            Transport::Channel => {
                if !self.port_transferred.get() {
                    return Err(HalError::PortUnavailable);
                }
                self.channel.port1().post_message(&js)
            }
        }
        .map_err(|_| HalError::PostFailed)
    }

    fn set_frame_height(&self, px: u32) {
        self.iframe.set_height(&px.to_string());
    }

    fn open_link(&self, url: &str) -> Result<(), HalError> {
        let window = web_sys::window().ok_or(HalError::NotSupported)?;
        window
            .open_with_url_and_target_and_features(url, "_blank", "noopener,noreferrer")
            .map(|_| ())
            .map_err(|_| HalError::PostFailed)
    }

    fn start_upload(
        &self,
        request: UploadRequestId,
        _files: &BTreeMap<String, FilePayload>,
    ) -> Result<(), HalError> {
        let uploader = self.uploader.borrow().clone().ok_or(HalError::NotSupported)?;
        let done = self.upload_done.borrow().clone().ok_or(HalError::NotSupported)?;
        let raw = self
            .staged_files
            .borrow_mut()
            .take()
            .ok_or(HalError::InvalidMessage)?;

        spawn_local(async move {
            let result = match uploader.call2(&JsValue::NULL, &JsValue::from(request), &raw) {
                Ok(returned) => JsFuture::from(Promise::resolve(&returned))
                    .await
                    .and_then(|urls| urls_from_js(&urls))
                    .map_err(|e| describe_js_error(&e)),
                Err(e) => Err(describe_js_error(&e)),
            };
            done(request, result);
        });
        Ok(())
    }

    fn current_state_changed(&self, data: &Value, valid: bool) {
        let callback = match self.answer_callback.borrow().clone() {
            Some(callback) => callback,
            None => return,
        };
        let data = match to_js(data) {
            Ok(data) => data,
            Err(e) => {
                util::error(&format!("answer not convertible: {}", describe_js_error(&e)));
                return;
            }
        };
        // Runs after the controller borrow is released.
        spawn_local(async move {
            if let Err(e) = callback.call2(&JsValue::NULL, &data, &JsValue::from_bool(valid)) {
                util::error(&format!("answer callback threw: {}", describe_js_error(&e)));
            }
        });
    }
}

// =============================================================================
// Frame side
// =============================================================================

pub struct WebEmbedded {
    window: Window,
    /// Port received with the sentinel, not yet adopted
    staged_port: RefCell<Option<MessagePort>>,
    port: RefCell<Option<MessagePort>>,
    port_handler: RefCell<Option<PortHandler>>,
    staged_files: RefCell<Option<JsValue>>,
}

impl WebEmbedded {
    pub fn new() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| util::js_error("no window"))?;
        Ok(Self {
            window,
            staged_port: RefCell::new(None),
            port: RefCell::new(None),
            port_handler: RefCell::new(None),
            staged_files: RefCell::new(None),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn parent(&self) -> Option<Window> {
        self.window.parent().ok().flatten()
    }

    pub fn stage_port(&self, port: MessagePort) {
        *self.staged_port.borrow_mut() = Some(port);
    }

    pub fn set_port_handler(&self, handler: PortHandler) {
        *self.port_handler.borrow_mut() = Some(handler);
    }

    pub fn stage_files(&self, files: JsValue) {
        *self.staged_files.borrow_mut() = Some(files);
    }

    pub fn close(&self) {
        if let Some(port) = self.port.borrow_mut().take() {
            port.set_onmessage(None);
            port.close();
        }
        self.staged_port.borrow_mut().take();
        self.port_handler.borrow_mut().take();
    }
}

impl Platform for WebEmbedded {
    fn now_ms(&self) -> u64 {
        now_ms()
    }

    fn debug_write(&self, msg: &str) {
        console_write(msg);
    }
}

impl EmbeddedPlatform for WebEmbedded {
    fn is_embedded(&self) -> bool {
        match self.parent() {
            Some(parent) => !Object::is(&parent, &self.window),
            None => false,
        }
    }

    fn post_to_parent(
        &self,
        transport: Transport,
        msg: &Value,
        target_origin: &str,
    ) -> Result<(), HalError> {
        let files = if msg.get(MESSAGE_FIELD).and_then(Value::as_str) == Some(TAG_FILE_UPLOAD) {
            self.staged_files.borrow_mut().take()
        } else {
            None
        };
        let js = outbound_message(msg, files.as_ref()).map_err(|_| HalError::InvalidMessage)?;
        match transport {
            Transport::Window => {
                if !self.is_embedded() {
                    return Err(HalError::NotEmbedded);
                }
                self.parent()
                    .ok_or(HalError::NotEmbedded)?
                    .post_message(&js, target_origin)
            }
            Transport::Channel => self
                .port
                .borrow()
                .as_ref()
                .ok_or(HalError::PortUnavailable)?
                .post_message(&js),
        }
        .map_err(|_| HalError::PostFailed)
    }

    fn adopt_port(&self) -> Result<(), HalError> {
        let port = self
            .staged_port
            .borrow_mut()
            .take()
            .ok_or(HalError::PortUnavailable)?;
        if let Some(handler) = self.port_handler.borrow().as_ref() {
            port.set_onmessage(Some(handler.as_ref().unchecked_ref()));
        }
        port.start();
        *self.port.borrow_mut() = Some(port);
        Ok(())
    }
}
