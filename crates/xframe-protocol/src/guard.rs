//! Runtime guards for untyped payloads
//!
//! Anything arriving through `postMessage` is an arbitrary value until one of
//! these predicates says otherwise. Guards never panic.
//!
//! Envelopes from the frame tolerate extra fields. `set-state` and the
//! [`IframeState`](crate::IframeState) guards reject undeclared top-level
//! fields; [`forgiving_is_set_state_message`] accepts drifted shapes with a
//! warning.

use alloc::format;
use serde_json::Value;

use crate::fields;
use crate::message::{MessageFromIframe, MessageToIframe};
use crate::state::{self, ViewType};
use crate::{
    TAG_CURRENT_STATE, TAG_FILE_UPLOAD, TAG_HEIGHT_CHANGED, TAG_OPEN_LINK, TAG_SET_LANGUAGE,
    TAG_SET_STATE, TAG_UPLOAD_RESULT, VIEW_TYPE_FIELD,
};

// =============================================================================
// Frame → parent
// =============================================================================

pub fn is_current_state_message(value: &Value) -> bool {
    fields::tagged(value, TAG_CURRENT_STATE).is_some() && MessageFromIframe::from_value(value).is_ok()
}

pub fn is_height_changed_message(value: &Value) -> bool {
    fields::tagged(value, TAG_HEIGHT_CHANGED).is_some() && MessageFromIframe::from_value(value).is_ok()
}

pub fn is_file_upload_message(value: &Value) -> bool {
    fields::tagged(value, TAG_FILE_UPLOAD).is_some() && MessageFromIframe::from_value(value).is_ok()
}

pub fn is_open_link_message(value: &Value) -> bool {
    fields::tagged(value, TAG_OPEN_LINK).is_some() && MessageFromIframe::from_value(value).is_ok()
}

/// True for any well-formed frame → parent envelope.
pub fn is_message_from_iframe(value: &Value) -> bool {
    MessageFromIframe::from_value(value).is_ok()
}

// =============================================================================
// Parent → frame
// =============================================================================

pub fn is_set_language_message(value: &Value) -> bool {
    fields::tagged(value, TAG_SET_LANGUAGE).is_some() && MessageToIframe::from_value(value).is_ok()
}

/// Strict: undeclared top-level fields fail the check.
pub fn is_set_state_message(value: &Value) -> bool {
    fields::tagged(value, TAG_SET_STATE).is_some() && MessageToIframe::from_value(value).is_ok()
}

pub fn is_upload_result_message(value: &Value) -> bool {
    fields::tagged(value, TAG_UPLOAD_RESULT).is_some() && MessageToIframe::from_value(value).is_ok()
}

pub fn is_message_to_iframe(value: &Value) -> bool {
    MessageToIframe::from_value(value).is_ok()
}

/// Lenient `set-state` check for frames built against an older schema.
///
/// Requires the `set-state` tag and a known `view_type`. When the strict
/// check fails the reason goes to `warn` and the message is still accepted.
pub fn forgiving_is_set_state_message(value: &Value, warn: &dyn Fn(&str)) -> bool {
    let obj = match fields::tagged(value, TAG_SET_STATE) {
        Some(obj) => obj,
        None => return false,
    };
    let known_view = obj
        .get(VIEW_TYPE_FIELD)
        .and_then(Value::as_str)
        .and_then(ViewType::parse)
        .is_some();
    if !known_view {
        return false;
    }
    if let Err(e) = state::check_strict(value, true) {
        warn(&format!("set-state does not match the declared schema, accepting anyway: {}", e));
    }
    true
}

// =============================================================================
// Iframe state
// =============================================================================

/// Bare state without the `message` envelope field.
pub fn is_iframe_state(value: &Value) -> bool {
    state::check_strict(value, false).is_ok()
}

fn is_view(value: &Value, view: ViewType) -> bool {
    value.get(VIEW_TYPE_FIELD).and_then(Value::as_str) == Some(view.as_str()) && is_iframe_state(value)
}

pub fn is_answer_exercise_iframe_state(value: &Value) -> bool {
    is_view(value, ViewType::AnswerExercise)
}

pub fn is_view_submission_iframe_state(value: &Value) -> bool {
    is_view(value, ViewType::ViewSubmission)
}

pub fn is_exercise_editor_iframe_state(value: &Value) -> bool {
    is_view(value, ViewType::ExerciseEditor)
}

pub fn is_user_information(value: &Value) -> bool {
    state::check_user_information(value).is_ok()
}
