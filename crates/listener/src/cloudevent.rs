//! CloudEvents decoding for storage object notifications.
//!
//! Two content modes are accepted:
//!
//! - **binary**: `ce-id` / `ce-type` headers, body is the object resource.
//! - **structured**: `Content-Type: application/cloudevents+json`, body is
//!   `{ "id", "type", "data": { ...object resource... } }`.

use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use serde::Deserialize;
use trigger::{IncomingEvent, StorageObjectData, UploaderError};

/// Media type marking a structured-mode CloudEvent.
pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

/// Binary-mode attribute headers.
pub const CE_ID: &str = "ce-id";
pub const CE_TYPE: &str = "ce-type";

#[derive(Debug, Deserialize)]
struct StructuredEvent {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    data: Option<StorageObjectData>,
}

/// Decodes a structured-mode CloudEvent document.
///
/// # Errors
///
/// [`UploaderError::MalformedEvent`] if the body is not JSON of the expected
/// shape, or a required attribute or object field is absent.
pub fn decode_structured(body: &[u8]) -> Result<IncomingEvent, UploaderError> {
    let event: StructuredEvent = serde_json::from_slice(body)
        .map_err(|e| UploaderError::malformed(format!("invalid CloudEvent document: {e}")))?;
    let data = event
        .data
        .ok_or_else(|| UploaderError::malformed("missing required field `data`"))?;
    IncomingEvent::from_cloud_event(event.id.as_deref(), event.event_type.as_deref(), data)
}

/// Decodes a binary-mode CloudEvent from its headers and body.
///
/// # Errors
///
/// As for [`decode_structured`].
pub fn decode_binary(headers: &HeaderMap, body: &[u8]) -> Result<IncomingEvent, UploaderError> {
    let data: StorageObjectData = serde_json::from_slice(body)
        .map_err(|e| UploaderError::malformed(format!("invalid object resource: {e}")))?;
    IncomingEvent::from_cloud_event(header(headers, CE_ID), header(headers, CE_TYPE), data)
}

/// Picks the content mode from `Content-Type` and decodes accordingly.
pub fn decode(headers: &HeaderMap, body: &[u8]) -> Result<IncomingEvent, UploaderError> {
    if is_structured(headers) {
        decode_structured(body)
    } else {
        decode_binary(headers, body)
    }
}

fn is_structured(headers: &HeaderMap) -> bool {
    header(headers, CONTENT_TYPE.as_str())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(STRUCTURED_CONTENT_TYPE))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
