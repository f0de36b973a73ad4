//! `ExerciseFrame`: the exercise document's connection to its parent
//!
//! Events reach JS as `{ type, data }` objects through the callback given to
//! `set_message_callback`:
//!
//! | type            | data                                   |
//! |-----------------|----------------------------------------|
//! | `set-state`     | the full view state                    |
//! | `set-language`  | language code                          |
//! | `upload-result` | `{ success, urls }` or `{ success, error }` |
//! | `content`       | initial content                        |

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::{Array, Function, Object, Reflect};
use serde_json::{json, Value};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{MessageEvent, MessagePort, ResizeObserver, ResizeObserverEntry};
use xframe_core::constants::FRAME_LOG_PREFIX;
use xframe_core::{FrameConfig, FrameController, FrameError, FrameEvent, FrameState};
use xframe_protocol::{UploadResult, PORT_SENTINEL};

use crate::convert::{describe_files, from_js, from_parent_message, to_js};
use crate::hal::WebEmbedded;
use crate::util::{describe_js_error, js_error, log};

type Controller = FrameController<WebEmbedded>;
type Callback = Rc<RefCell<Option<Function>>>;

/// How often the ready retry schedule is polled while connecting
const RETRY_POLL_MS: i32 = 250;

fn event_data(event: &FrameEvent) -> Result<Value, JsValue> {
    Ok(match event {
        FrameEvent::SetState(state) => state.to_value().map_err(js_error)?,
        FrameEvent::SetLanguage(language) => Value::from(language.as_str()),
        FrameEvent::UploadFinished(UploadResult::Success { urls }) => {
            json!({ "success": true, "urls": urls })
        }
        FrameEvent::UploadFinished(UploadResult::Failure { error }) => {
            json!({ "success": false, "error": error })
        }
        FrameEvent::Content(data) => data.clone(),
    })
}

/// Hand an event to the UI. Must run with the controller borrow released.
fn emit(callback: &Callback, event: FrameEvent) {
    let callback = match callback.borrow().clone() {
        Some(callback) => callback,
        None => {
            log(&format!("{} no listener for {}", FRAME_LOG_PREFIX, event.name()));
            return;
        }
    };
    let result = event_data(&event).and_then(|data| {
        let obj = Object::new();
        Reflect::set(&obj, &JsValue::from_str("type"), &JsValue::from_str(event.name()))?;
        Reflect::set(&obj, &JsValue::from_str("data"), &to_js(&data)?)?;
        callback.call1(&JsValue::NULL, &obj)
    });
    if let Err(e) = result {
        log(&format!(
            "{} error: {} listener failed: {}",
            FRAME_LOG_PREFIX,
            event.name(),
            describe_js_error(&e)
        ));
    }
}

fn on_window_message(inner: &Weak<RefCell<Controller>>, callback: &Callback, event: &MessageEvent) {
    let inner = match inner.upgrade() {
        Some(inner) => inner,
        None => return,
    };
    let data = match from_parent_message(&event.data()) {
        Ok(data) => data,
        Err(_) => return,
    };
    let emitted = {
        let mut controller = inner.borrow_mut();
        let from_parent = match (event.source(), controller.platform().parent()) {
            (Some(source), Some(parent)) => Object::is(&source, &parent),
            _ => false,
        };
        if from_parent && data.as_str() == Some(PORT_SENTINEL) {
            if let Ok(port) = event.ports().get(0).dyn_into::<MessagePort>() {
                controller.platform().stage_port(port);
            }
        }
        controller.handle_window_message(from_parent, &data)
    };
    if let Some(event) = emitted {
        emit(callback, event);
    }
}

fn on_port_message(inner: &Weak<RefCell<Controller>>, callback: &Callback, event: &MessageEvent) {
    let inner = match inner.upgrade() {
        Some(inner) => inner,
        None => return,
    };
    let data = match from_parent_message(&event.data()) {
        Ok(data) => data,
        Err(_) => return,
    };
    let emitted = inner.borrow_mut().handle_parent_message(&data);
    if let Some(event) = emitted {
        emit(callback, event);
    }
}

/// Exercise side of the protocol
#[wasm_bindgen]
pub struct ExerciseFrame {
    inner: Rc<RefCell<Controller>>,
    callback: Callback,
    window_listener: Option<Closure<dyn FnMut(MessageEvent)>>,
    retry_timer: Rc<Cell<Option<i32>>>,
    retry_closure: Option<Closure<dyn FnMut()>>,
    resize_observer: Option<ResizeObserver>,
    resize_closure: Option<Closure<dyn FnMut(Array)>>,
}

#[wasm_bindgen]
impl ExerciseFrame {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<ExerciseFrame, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config: FrameConfig = if config.is_undefined() || config.is_null() {
            FrameConfig::default()
        } else {
            serde_json::from_value(from_js(&config)?).map_err(js_error)?
        };
        Ok(ExerciseFrame {
            inner: Rc::new(RefCell::new(FrameController::new(WebEmbedded::new()?, config))),
            callback: Rc::new(RefCell::new(None)),
            window_listener: None,
            retry_timer: Rc::new(Cell::new(None)),
            retry_closure: None,
            resize_observer: None,
            resize_closure: None,
        })
    }

    /// `({ type, data }) => void`
    pub fn set_message_callback(&self, callback: Option<Function>) {
        *self.callback.borrow_mut() = callback;
    }

    /// Announce ready to the parent and start reporting the content height
    pub fn mount(&mut self) -> Result<(), JsValue> {
        match self.inner.borrow().state() {
            FrameState::Idle => {}
            FrameState::TornDown => return Err(js_error(FrameError::TornDown)),
            _ => return Err(js_error(FrameError::AlreadyStarted)),
        }
        let window = self.inner.borrow().platform().window().clone();

        let (weak, callback) = (Rc::downgrade(&self.inner), self.callback.clone());
        let port_handler = Closure::wrap(Box::new(move |event: MessageEvent| {
            on_port_message(&weak, &callback, &event);
        }) as Box<dyn FnMut(MessageEvent)>);
        self.inner.borrow().platform().set_port_handler(port_handler);

        let (weak, callback) = (Rc::downgrade(&self.inner), self.callback.clone());
        let window_listener = Closure::wrap(Box::new(move |event: MessageEvent| {
            on_window_message(&weak, &callback, &event);
        }) as Box<dyn FnMut(MessageEvent)>);
        window.add_event_listener_with_callback("message", window_listener.as_ref().unchecked_ref())?;
        self.window_listener = Some(window_listener);

        self.inner.borrow_mut().mount().map_err(js_error)?;
        if self.inner.borrow().state() != FrameState::Connecting {
            return Ok(());
        }

        let (weak, timer) = (Rc::downgrade(&self.inner), self.retry_timer.clone());
        let retry_closure = Closure::wrap(Box::new(move || {
            let connecting = match weak.upgrade() {
                Some(inner) => {
                    let mut controller = inner.borrow_mut();
                    controller.tick();
                    controller.state() == FrameState::Connecting
                }
                None => false,
            };
            if !connecting {
                if let (Some(window), Some(handle)) = (web_sys::window(), timer.take()) {
                    window.clear_interval_with_handle(handle);
                }
            }
        }) as Box<dyn FnMut()>);
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            retry_closure.as_ref().unchecked_ref(),
            RETRY_POLL_MS,
        )?;
        self.retry_timer.set(Some(handle));
        self.retry_closure = Some(retry_closure);

        self.observe_height()
    }

    fn observe_height(&mut self) -> Result<(), JsValue> {
        let root = match self
            .inner
            .borrow()
            .platform()
            .window()
            .document()
            .and_then(|d| d.document_element())
        {
            Some(root) => root,
            None => return Ok(()),
        };
        let weak = Rc::downgrade(&self.inner);
        let resize_closure = Closure::wrap(Box::new(move |entries: Array| {
            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            let last = entries.get(entries.length().saturating_sub(1));
            if let Ok(entry) = last.dyn_into::<ResizeObserverEntry>() {
                let _ = inner.borrow_mut().report_height(entry.content_rect().height());
            }
        }) as Box<dyn FnMut(Array)>);
        let observer = ResizeObserver::new(resize_closure.as_ref().unchecked_ref())?;
        observer.observe(&root);
        self.resize_observer = Some(observer);
        self.resize_closure = Some(resize_closure);
        Ok(())
    }

    /// Report the learner's answer
    pub fn post_current_state(&self, data: JsValue, valid: bool) -> Result<(), JsValue> {
        let data = from_js(&data)?;
        self.inner
            .borrow_mut()
            .post_current_state(data, valid)
            .map_err(js_error)
    }

    /// Ask the parent to upload `files` (`Map<string, Blob | string>`)
    pub fn request_upload(&self, files: JsValue) -> Result<(), JsValue> {
        let described = describe_files(&files)?;
        let mut controller = self.inner.borrow_mut();
        controller.platform().stage_files(files);
        controller.request_upload(described).map_err(js_error)
    }

    pub fn report_height(&self, px: f64) -> Result<(), JsValue> {
        self.inner.borrow_mut().report_height(px).map_err(js_error)
    }

    pub fn open_link(&self, url: &str) -> Result<(), JsValue> {
        self.inner.borrow_mut().open_link(url).map_err(js_error)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.borrow().is_connected()
    }

    pub fn state(&self) -> String {
        format!("{:?}", self.inner.borrow().state()).to_lowercase()
    }

    pub fn teardown(&mut self) {
        let window = self.inner.borrow().platform().window().clone();
        if let Some(handle) = self.retry_timer.take() {
            window.clear_interval_with_handle(handle);
        }
        if let Some(listener) = self.window_listener.take() {
            let _ = window
                .remove_event_listener_with_callback("message", listener.as_ref().unchecked_ref());
        }
        if let Some(observer) = self.resize_observer.take() {
            observer.disconnect();
        }
        self.retry_closure = None;
        self.resize_closure = None;

        let mut controller = self.inner.borrow_mut();
        controller.platform().close();
        controller.teardown();
    }
}
