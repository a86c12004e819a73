//! JSON document format for persisted sessions.
//!
//! A stored session is a flat object with exactly five fields:
//!
//! ```json
//! {
//!   "attributes": { "SESSION_CPATH": "/", "SESSION_VHOST": "0.0.0.0", "cart": ["x"] },
//!   "creationTime": 1700000000000,
//!   "sessionId": "8a9df9asdfasfasdf9asdf",
//!   "lastSaved": 1700000005000,
//!   "maxInactiveInterval": 1800000
//! }
//! ```
//!
//! The concurrency token is never written; it travels alongside the
//! document as backend metadata.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{
    CONTEXT_PATH_ATTRIBUTE, Cas, SessionRecord, VIRTUAL_HOST_ATTRIBUTE, now_millis,
};

/// A session document could not be encoded or decoded.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Malformed JSON or a missing / mistyped field.
    #[error("invalid session document: {0}")]
    Json(#[from] serde_json::Error),

    /// A reserved attribute is absent or not a string.
    #[error("session document is missing reserved attribute {0}")]
    MissingAttribute(&'static str),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRef<'a> {
    attributes: &'a HashMap<String, Value>,
    creation_time: i64,
    session_id: &'a str,
    last_saved: i64,
    max_inactive_interval: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    attributes: HashMap<String, Value>,
    creation_time: i64,
    session_id: String,
    last_saved: i64,
    max_inactive_interval: i64,
}

/// Encode a record as a storage document.
pub fn serialize(record: &SessionRecord) -> Result<String, CodecError> {
    let doc = DocumentRef {
        attributes: record.attributes(),
        creation_time: record.created(),
        session_id: record.id(),
        last_saved: record.last_saved(),
        max_inactive_interval: record.max_inactive_ms(),
    };
    Ok(serde_json::to_string(&doc)?)
}

/// Revive a record from a storage document.
///
/// The record is being brought back to life now, so both access timestamps
/// are stamped with the current time rather than trusted from storage.
/// The revived record is never writable.
pub fn deserialize(content: &str, cas: Cas) -> Result<SessionRecord, CodecError> {
    let doc: Document = serde_json::from_str(content)?;

    let context_path = reserved(&doc.attributes, CONTEXT_PATH_ATTRIBUTE)?;
    let virtual_host = reserved(&doc.attributes, VIRTUAL_HOST_ATTRIBUTE)?;

    let now = now_millis();
    let mut record = SessionRecord::new(
        doc.session_id,
        context_path,
        virtual_host,
        doc.creation_time,
        now,
        now,
        doc.max_inactive_interval,
    );
    record.set_last_saved(doc.last_saved);
    record.set_cas(Some(cas));
    record.restore_attributes(doc.attributes);
    Ok(record)
}

fn reserved(attributes: &HashMap<String, Value>, name: &'static str) -> Result<String, CodecError> {
    attributes
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(CodecError::MissingAttribute(name))
}
