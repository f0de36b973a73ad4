//! Conversions between JS values and the protocol's JSON model
//!
//! Envelopes cross the boundary as JSON text (`JSON.stringify` /
//! `JSON.parse`). Blobs do not survive that, so `file-upload` payloads are
//! described on the way in and the raw `files` value is carried alongside.
//! The `urls` of an `upload-result` travel as a JS `Map` in both directions.

use std::collections::BTreeMap;

use js_sys::{Array, Map, Object, Reflect, JSON};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use xframe_protocol::{
    BlobDescriptor, FilePayload, MESSAGE_FIELD, TAG_FILE_UPLOAD, TAG_UPLOAD_RESULT,
};

use crate::util::js_error;

const FILES_FIELD: &str = "files";
const URLS_FIELD: &str = "urls";

fn has_tag(value: &Value, tag: &str) -> bool {
    value.get(MESSAGE_FIELD).and_then(Value::as_str) == Some(tag)
}

pub fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(js_error)?;
    JSON::parse(&text)
}

/// `undefined` and values JSON cannot represent map to `null`.
pub fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    match JSON::stringify(value)?.as_string() {
        Some(text) => serde_json::from_str(&text).map_err(js_error),
        None => Ok(Value::Null),
    }
}

fn entries(value: &JsValue) -> Result<Vec<(String, JsValue)>, JsValue> {
    let mut out = Vec::new();
    if let Some(map) = value.dyn_ref::<Map>() {
        map.for_each(&mut |entry, key| {
            out.push((key.as_string().unwrap_or_default(), entry));
        });
    } else if value.is_object() {
        for pair in Object::entries(value.unchecked_ref()).iter() {
            let pair: Array = pair.unchecked_into();
            out.push((pair.get(0).as_string().unwrap_or_default(), pair.get(1)));
        }
    } else {
        return Err(js_error("expected a Map or an object"));
    }
    Ok(out)
}

/// Describe a `Map<string, Blob | string>` (or plain object) of files
pub fn describe_files(files: &JsValue) -> Result<BTreeMap<String, FilePayload>, JsValue> {
    let mut described = BTreeMap::new();
    for (name, entry) in entries(files)? {
        let payload = if let Some(text) = entry.as_string() {
            FilePayload::Text(text)
        } else if let Some(blob) = entry.dyn_ref::<web_sys::Blob>() {
            FilePayload::Blob(BlobDescriptor {
                content_type: blob.type_(),
                size: blob.size() as u64,
            })
        } else {
            return Err(js_error(format!("file '{}' is neither a Blob nor a string", name)));
        };
        described.insert(name, payload);
    }
    Ok(described)
}

/// Read the uploader's answer: a `Map` or object of file name → URL
pub fn urls_from_js(value: &JsValue) -> Result<BTreeMap<String, String>, JsValue> {
    let mut urls = BTreeMap::new();
    for (name, url) in entries(value)? {
        let url = url
            .as_string()
            .ok_or_else(|| js_error(format!("url for '{}' is not a string", name)))?;
        urls.insert(name, url);
    }
    Ok(urls)
}

/// Convert a received message. For `file-upload` the blobs are replaced by
/// descriptors and the raw `files` value is returned for the uploader.
pub fn inbound_message(data: &JsValue) -> Result<(Value, Option<JsValue>), JsValue> {
    let mut value = from_js(data)?;
    if !has_tag(&value, TAG_FILE_UPLOAD) {
        return Ok((value, None));
    }
    let raw = Reflect::get(data, &JsValue::from_str(FILES_FIELD))?;
    match describe_files(&raw) {
        Ok(described) => {
            value[FILES_FIELD] = serde_json::to_value(&described).map_err(js_error)?;
            Ok((value, Some(raw)))
        }
        // Left as-is; the guard rejects it.
        Err(_) => Ok((value, None)),
    }
}

/// Convert an outgoing message, putting the raw `files` back in place
pub fn outbound_message(value: &Value, files: Option<&JsValue>) -> Result<JsValue, JsValue> {
    let js = to_js(value)?;
    if let Some(files) = files {
        Reflect::set(&js, &JsValue::from_str(FILES_FIELD), files)?;
    }
    Ok(js)
}

/// Convert a parent → frame message for posting; `upload-result.urls`
/// becomes a `Map`
pub fn to_frame_message(value: &Value) -> Result<JsValue, JsValue> {
    let js = to_js(value)?;
    if !has_tag(value, TAG_UPLOAD_RESULT) {
        return Ok(js);
    }
    if let Some(urls) = value.get(URLS_FIELD).and_then(Value::as_object) {
        let map = Map::new();
        for (name, url) in urls {
            map.set(&JsValue::from_str(name), &to_js(url)?);
        }
        Reflect::set(&js, &JsValue::from_str(URLS_FIELD), &map)?;
    }
    Ok(js)
}

/// Convert a message received from the parent. `JSON.stringify` drops the
/// entries of a `Map`, so `upload-result.urls` is read separately.
pub fn from_parent_message(data: &JsValue) -> Result<Value, JsValue> {
    let mut value = from_js(data)?;
    if !has_tag(&value, TAG_UPLOAD_RESULT) {
        return Ok(value);
    }
    let raw = Reflect::get(data, &JsValue::from_str(URLS_FIELD))?;
    if raw.is_object() {
        let urls = urls_from_js(&raw)?;
        value[URLS_FIELD] = serde_json::to_value(&urls).map_err(js_error)?;
    }
    Ok(value)
}
