//! `ParentFrame`: the embedding page's handle on an exercise iframe

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use js_sys::{Function, Object};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{HtmlIFrameElement, MessageEvent};
use xframe_core::constants::PARENT_LOG_PREFIX;
use xframe_core::{ParentConfig, ParentController};
use xframe_hal::UploadRequestId;
use xframe_protocol::IframeState;

use crate::convert::{from_js, inbound_message, to_js};
use crate::hal::{UploadDone, WebHost};
use crate::util::{describe_js_error, js_error, log};

type Controller = ParentController<WebHost>;

/// Parent side of the exercise frame protocol.
///
/// ```js
/// const frame = new ParentFrame(iframe, { allowed_origins: ["https://exercises.example"] });
/// frame.set_answer_callback((data, valid) => submitButton.disabled = !valid);
/// frame.attach();
/// frame.push_state({ view_type: "answer-exercise", ... });
/// ```
#[wasm_bindgen]
pub struct ParentFrame {
    inner: Rc<RefCell<Controller>>,
    window_listener: Option<Closure<dyn FnMut(MessageEvent)>>,
    port_listener: Option<Closure<dyn FnMut(MessageEvent)>>,
}

fn parse_config(config: &JsValue) -> Result<ParentConfig, JsValue> {
    if config.is_undefined() || config.is_null() {
        return Ok(ParentConfig::default());
    }
    serde_json::from_value(from_js(config)?).map_err(js_error)
}

/// Stage raw files for the uploader, dispatch, then drop what was not used.
/// Unreadable window traffic is only reported when it is trusted.
fn dispatch(inner: &Weak<RefCell<Controller>>, event: &MessageEvent, on_port: bool) {
    let inner = match inner.upgrade() {
        Some(inner) => inner,
        None => return,
    };
    let mut controller = inner.borrow_mut();
    let origin = event.origin();
    let from_frame = match (event.source(), controller.platform().content_window()) {
        (Some(source), Some(window)) => Object::is(&source, &window),
        _ => false,
    };
    let (data, files) = match inbound_message(&event.data()) {
        Ok(converted) => converted,
        Err(e) => {
            if on_port || controller.trusts(&origin, from_frame) {
                log(&format!(
                    "{} dropping unreadable message: {}",
                    PARENT_LOG_PREFIX,
                    describe_js_error(&e)
                ));
            }
            return;
        }
    };
    controller.platform().stage_files(files);
    if on_port {
        controller.handle_port_message(&data);
    } else {
        controller.handle_window_message(&origin, from_frame, &data);
    }
    controller.platform().stage_files(None);
}

#[wasm_bindgen]
impl ParentFrame {
    #[wasm_bindgen(constructor)]
    pub fn new(iframe: HtmlIFrameElement, config: JsValue) -> Result<ParentFrame, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config = parse_config(&config)?;
        let mut controller = ParentController::new(WebHost::new(iframe)?, config);

        // Same-origin frames (unsandboxed previews) are always trusted.
        if let Some(origin) = web_sys::window().and_then(|w| w.location().origin().ok()) {
            controller.policy_mut().allow(&origin);
        }

        let inner = Rc::new(RefCell::new(controller));
        let weak = Rc::downgrade(&inner);
        let done: UploadDone = Rc::new(
            move |request: UploadRequestId, result: Result<BTreeMap<String, String>, String>| {
                let inner = match weak.upgrade() {
                    Some(inner) => inner,
                    None => return,
                };
                if let Err(e) = inner.borrow_mut().complete_upload(request, result) {
                    log(&format!("{} upload {} not relayed: {}", PARENT_LOG_PREFIX, request, e));
                };
            },
        );
        inner.borrow().platform().set_upload_done(done);

        Ok(ParentFrame {
            inner,
            window_listener: None,
            port_listener: None,
        })
    }

    /// Start listening for the frame's ready signal
    pub fn attach(&mut self) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or_else(|| js_error("no window"))?;
        self.inner.borrow_mut().attach().map_err(js_error)?;

        let weak = Rc::downgrade(&self.inner);
        let window_listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            dispatch(&weak, &event, false);
        }) as Box<dyn FnMut(MessageEvent)>);
        window.add_event_listener_with_callback("message", window_listener.as_ref().unchecked_ref())?;

        let weak = Rc::downgrade(&self.inner);
        let port_listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            dispatch(&weak, &event, true);
        }) as Box<dyn FnMut(MessageEvent)>);
        self.inner
            .borrow()
            .platform()
            .port()
            .set_onmessage(Some(port_listener.as_ref().unchecked_ref()));

        self.window_listener = Some(window_listener);
        self.port_listener = Some(port_listener);
        Ok(())
    }

    /// Replace the frame's view. The state must match the schema exactly.
    pub fn push_state(&self, state: JsValue) -> Result<(), JsValue> {
        let state = IframeState::from_value(&from_js(&state)?).map_err(js_error)?;
        self.inner.borrow_mut().push_state(state).map_err(js_error)
    }

    pub fn set_language(&self, language: &str) -> Result<(), JsValue> {
        self.inner.borrow_mut().set_language(language).map_err(js_error)
    }

    /// Also trust window messages from `origin`
    pub fn allow_origin(&self, origin: &str) {
        self.inner.borrow_mut().policy_mut().allow(origin);
    }

    /// `(requestId, files) => Promise<Map<string, string> | object>`
    pub fn set_upload_handler(&self, handler: Option<Function>) {
        self.inner.borrow().platform().set_uploader(handler);
    }

    /// `(data, valid) => void`, called whenever the frame reports its answer
    pub fn set_answer_callback(&self, callback: Option<Function>) {
        self.inner.borrow().platform().set_answer_callback(callback);
    }

    pub fn can_submit(&self) -> bool {
        self.inner.borrow().can_submit()
    }

    /// The latest valid answer; throws if there is none
    pub fn submit(&self) -> Result<JsValue, JsValue> {
        let answer = self.inner.borrow().submit().map_err(js_error)?;
        to_js(&answer)
    }

    pub fn height(&self) -> Option<u32> {
        self.inner.borrow().height()
    }

    pub fn state(&self) -> String {
        self.inner.borrow().state().as_str().to_string()
    }

    pub fn pending_uploads(&self) -> usize {
        self.inner.borrow().pending_uploads()
    }

    /// Stop listening and close the channel
    pub fn teardown(&mut self) {
        if let (Some(window), Some(listener)) = (web_sys::window(), self.window_listener.take()) {
            let _ = window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
        let mut controller = self.inner.borrow_mut();
        controller.platform().close();
        controller.teardown();
        self.port_listener = None;
    }
}
