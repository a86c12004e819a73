//! In-memory session record and the write gate that protects it.
//!
//! A [`SessionRecord`] is handed to request-handling code by identity, so
//! several requests for the same session may hold it at once. Every
//! attribute mutation therefore goes through [`check_writable`], and the
//! record refuses changes until the dispatcher explicitly grants write
//! access for the request.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

/// Reserved attribute carrying the owning context path through storage.
pub const CONTEXT_PATH_ATTRIBUTE: &str = "SESSION_CPATH";

/// Reserved attribute carrying the owning virtual host through storage.
pub const VIRTUAL_HOST_ATTRIBUTE: &str = "SESSION_VHOST";

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Concurrency token issued by the storage backend for one document revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cas(pub u64);

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A gated operation was attempted on a record that was never granted write access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{operation}() - write operation not permitted on session {session_id}: \
     grant write access before mutating a session that concurrent requests may share"
)]
pub struct WriteNotPermitted {
    /// Name of the operation that was refused.
    pub operation: String,
    /// Session the operation targeted.
    pub session_id: String,
}

/// Fail unless `record` currently holds a write grant.
pub fn check_writable(record: &SessionRecord, operation: &str) -> Result<(), WriteNotPermitted> {
    if record.writable {
        Ok(())
    } else {
        Err(WriteNotPermitted {
            operation: operation.to_string(),
            session_id: record.id.clone(),
        })
    }
}

/// A web session as held in memory between load and store.
///
/// Timestamps are epoch milliseconds. `last_saved == 0` means the record
/// has never been written by an upsert. The concurrency token is `None`
/// until the record has been read from or written to storage.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    id: String,
    context_path: String,
    virtual_host: String,
    created: i64,
    accessed: i64,
    last_accessed: i64,
    max_inactive_ms: i64,
    last_saved: i64,
    cas: Option<Cas>,
    writable: bool,
    attributes: HashMap<String, Value>,
}

impl SessionRecord {
    /// Create a brand-new record with no backing document.
    ///
    /// The context path and virtual host are also recorded under the reserved
    /// attribute names so that they survive serialization.
    pub fn new(
        id: impl Into<String>,
        context_path: impl Into<String>,
        virtual_host: impl Into<String>,
        created: i64,
        accessed: i64,
        last_accessed: i64,
        max_inactive_ms: i64,
    ) -> Self {
        let context_path = context_path.into();
        let virtual_host = virtual_host.into();

        let mut attributes = HashMap::new();
        attributes.insert(
            CONTEXT_PATH_ATTRIBUTE.to_string(),
            Value::String(context_path.clone()),
        );
        attributes.insert(
            VIRTUAL_HOST_ATTRIBUTE.to_string(),
            Value::String(virtual_host.clone()),
        );

        Self {
            id: id.into(),
            context_path,
            virtual_host,
            created,
            accessed,
            last_accessed,
            max_inactive_ms,
            last_saved: 0,
            cas: None,
            writable: false,
            attributes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn virtual_host(&self) -> &str {
        &self.virtual_host
    }

    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn accessed(&self) -> i64 {
        self.accessed
    }

    pub fn last_accessed(&self) -> i64 {
        self.last_accessed
    }

    pub fn max_inactive_ms(&self) -> i64 {
        self.max_inactive_ms
    }

    pub fn set_max_inactive_ms(&mut self, max_inactive_ms: i64) {
        self.max_inactive_ms = max_inactive_ms;
    }

    /// Timestamp of the last successful upsert, `0` if none.
    pub fn last_saved(&self) -> i64 {
        self.last_saved
    }

    /// Token of the last revision this process read or wrote.
    pub fn cas(&self) -> Option<Cas> {
        self.cas
    }

    /// True while the record has never been read from or written to storage.
    pub fn is_new(&self) -> bool {
        self.cas.is_none()
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Grant or revoke attribute mutation.
    ///
    /// Only the component dispatching the record to request-handling code
    /// should call this, according to that request's access policy.
    pub fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    /// Record an access at `now`, shifting the previous access into `last_accessed`.
    pub fn touch(&mut self, now: i64) {
        self.last_accessed = self.accessed;
        self.accessed = now;
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>, WriteNotPermitted> {
        check_writable(self, "set_attribute")?;
        Ok(self.attributes.insert(name.into(), value.into()))
    }

    /// Remove an attribute, returning its value if it was present.
    pub fn remove_attribute(&mut self, name: &str) -> Result<Option<Value>, WriteNotPermitted> {
        check_writable(self, "remove_attribute")?;
        Ok(self.attributes.remove(name))
    }

    /// Remove every application attribute. The reserved attributes stay.
    pub fn clear_attributes(&mut self) -> Result<(), WriteNotPermitted> {
        check_writable(self, "clear_attributes")?;
        self.attributes
            .retain(|name, _| name == CONTEXT_PATH_ATTRIBUTE || name == VIRTUAL_HOST_ATTRIBUTE);
        Ok(())
    }

    pub(crate) fn set_last_saved(&mut self, last_saved: i64) {
        self.last_saved = last_saved;
    }

    pub(crate) fn set_cas(&mut self, cas: Option<Cas>) {
        self.cas = cas;
    }

    /// Populate attributes while reviving a record from storage. Bypasses the gate.
    pub(crate) fn restore_attributes(&mut self, attributes: HashMap<String, Value>) {
        self.attributes.extend(attributes);
    }
}

impl fmt::Display for SessionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Session id={},created={},accessed={},lastAccessed={},maxInterval={},lastSaved={}",
            self.id,
            self.created,
            self.accessed,
            self.last_accessed,
            self.max_inactive_ms,
            self.last_saved
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> SessionRecord {
        SessionRecord::new("abc", "/shop", "example.com", 1_000, 1_000, 1_000, 1_800_000)
    }

    #[test]
    fn test_new_record_defaults() {
        let record = record();

        assert_eq!(record.id(), "abc");
        assert_eq!(record.last_saved(), 0);
        assert!(record.cas().is_none());
        assert!(record.is_new());
        assert!(!record.is_writable());
    }

    #[test]
    fn test_reserved_attributes_present() {
        let record = record();

        assert_eq!(record.attribute(CONTEXT_PATH_ATTRIBUTE), Some(&json!("/shop")));
        assert_eq!(record.attribute(VIRTUAL_HOST_ATTRIBUTE), Some(&json!("example.com")));
        assert_eq!(record.attributes().len(), 2);
    }

    #[test]
    fn test_set_attribute_requires_write() {
        let mut record = record();
        let before = record.attributes().clone();

        let err = record.set_attribute("cart", json!(["x"])).unwrap_err();
        assert_eq!(err.operation, "set_attribute");
        assert_eq!(err.session_id, "abc");
        assert_eq!(record.attributes(), &before);
    }

    #[test]
    fn test_remove_and_clear_require_write() {
        let mut record = record();

        assert!(record.remove_attribute(CONTEXT_PATH_ATTRIBUTE).is_err());
        assert!(record.clear_attributes().is_err());
        assert_eq!(record.attributes().len(), 2);
    }

    #[test]
    fn test_writable_record_mutates() {
        let mut record = record();
        record.set_writable(true);

        assert_eq!(record.set_attribute("cart", json!(["x"])).unwrap(), None);
        assert_eq!(
            record.set_attribute("cart", json!(["x", "y"])).unwrap(),
            Some(json!(["x"]))
        );
        assert_eq!(record.remove_attribute("cart").unwrap(), Some(json!(["x", "y"])));
        assert!(record.attribute("cart").is_none());
    }

    #[test]
    fn test_clear_keeps_reserved_attributes() {
        let mut record = record();
        record.set_writable(true);
        record.set_attribute("user", "alice").unwrap();
        record.set_attribute("theme", "dark").unwrap();

        record.clear_attributes().unwrap();

        let mut names: Vec<&str> = record.attribute_names().collect();
        names.sort();
        assert_eq!(names, vec![CONTEXT_PATH_ATTRIBUTE, VIRTUAL_HOST_ATTRIBUTE]);
    }

    #[test]
    fn test_check_writable() {
        let mut record = record();
        assert!(check_writable(&record, "store").is_err());

        record.set_writable(true);
        assert!(check_writable(&record, "store").is_ok());
    }

    #[test]
    fn test_touch_shifts_access_times() {
        let mut record = record();
        record.touch(2_000);
        record.touch(3_000);

        assert_eq!(record.accessed(), 3_000);
        assert_eq!(record.last_accessed(), 2_000);
        assert_eq!(record.created(), 1_000);
    }

    #[test]
    fn test_display() {
        let record = record();
        assert_eq!(
            record.to_string(),
            "Session id=abc,created=1000,accessed=1000,lastAccessed=1000,maxInterval=1800000,lastSaved=0"
        );
    }
}
