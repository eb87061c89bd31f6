//! The activity entry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::{Timestamp, Uuid};

use crate::action::{ActionType, Category, EntryStatus};

/// A JSON object used for payloads and metadata.
pub type JsonMap = serde_json::Map<String, Value>;

/// Generates a new v7 UUID for persisted entries.
#[must_use]
pub fn new_entry_id() -> Uuid {
    let ts = Timestamp::now(uuid::NoContext);
    Uuid::new_v7(ts)
}

/// One audit record: a single administrative request or system action.
///
/// Entries are created by the HTTP capture layer (or any caller), buffered
/// by the batching service, and persisted by a store. `id` and
/// `created_at` are `None` until the pipeline assigns them; `deleted_at`
/// is set by the retention sweep and never cleared afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Opaque unique ID, assigned at persistence time
    pub id: Option<Uuid>,

    /// Request correlation ID (propagated or generated)
    pub request_id: String,

    /// Session identifier, when one exists
    pub session_id: Option<String>,

    /// Acting user, absent for unauthenticated/guest actions
    pub user_id: Option<Uuid>,

    /// Acting user's email, when known
    pub user_email: Option<String>,

    /// What kind of action this records
    pub action: ActionType,

    /// Retention category; derived when the caller leaves it unset
    pub category: Option<Category>,

    /// Outcome of the recorded request
    pub status: EntryStatus,

    /// Endpoint path that was hit
    pub endpoint: String,

    /// HTTP method (or "SYSTEM" for internally generated entries)
    pub method: String,

    /// Client IP address
    pub ip_address: String,

    /// Client user agent
    pub user_agent: Option<String>,

    /// Affected resource name (e.g. "rooms")
    pub resource: Option<String>,

    /// Affected resource identifier
    pub resource_id: Option<String>,

    /// HTTP response status code
    pub response_code: Option<u16>,

    /// Free-text message
    pub message: Option<String>,

    /// Sanitized request payload
    pub request_payload: Option<JsonMap>,

    /// Sanitized response payload preview
    pub response_payload: Option<JsonMap>,

    /// Sanitized snapshot before an update
    pub before: Option<JsonMap>,

    /// Sanitized snapshot after an update
    pub after: Option<JsonMap>,

    /// Open extensible metadata (e.g. `latency_ms`)
    pub metadata: JsonMap,

    /// Set exactly once when the entry is accepted; never mutated
    pub created_at: Option<DateTime<Utc>>,

    /// Set on soft delete; never cleared
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ActivityEntry {
    /// Creates a new entry for the given action against an endpoint.
    #[must_use]
    pub fn new(action: ActionType, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: None,
            request_id: String::new(),
            session_id: None,
            user_id: None,
            user_email: None,
            action,
            category: None,
            status: EntryStatus::default(),
            endpoint: endpoint.into(),
            method: method.into(),
            ip_address: String::new(),
            user_agent: None,
            resource: None,
            resource_id: None,
            response_code: None,
            message: None,
            request_payload: None,
            response_payload: None,
            before: None,
            after: None,
            metadata: JsonMap::new(),
            created_at: None,
            deleted_at: None,
        }
    }

    /// Sets the request correlation ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Sets the session ID.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Sets the acting user.
    #[must_use]
    pub const fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the acting user's email.
    #[must_use]
    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    /// Sets an explicit retention category, bypassing derivation.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the outcome status.
    #[must_use]
    pub const fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the client IP address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Sets the client user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the affected resource name.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the affected resource identifier.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Sets the HTTP response status code.
    #[must_use]
    pub const fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(code);
        self
    }

    /// Sets the free-text message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the request payload. Callers outside the pipeline should pass
    /// already-sanitized data; the batching service sanitizes regardless.
    #[must_use]
    pub fn with_request_payload(mut self, payload: JsonMap) -> Self {
        self.request_payload = Some(payload);
        self
    }

    /// Sets the response payload preview.
    #[must_use]
    pub fn with_response_payload(mut self, payload: JsonMap) -> Self {
        self.response_payload = Some(payload);
        self
    }

    /// Sets the before-update snapshot.
    #[must_use]
    pub fn with_before(mut self, snapshot: JsonMap) -> Self {
        self.before = Some(snapshot);
        self
    }

    /// Sets the after-update snapshot.
    #[must_use]
    pub fn with_after(mut self, snapshot: JsonMap) -> Self {
        self.after = Some(snapshot);
        self
    }

    /// Replaces the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = metadata;
        self
    }

    /// Inserts a single metadata entry.
    #[must_use]
    pub fn with_metadata_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_new_entry_defaults() {
        let entry = ActivityEntry::new(ActionType::Read, "/api/rooms", "GET");

        assert!(entry.id.is_none());
        assert!(entry.category.is_none());
        assert!(entry.created_at.is_none());
        assert!(entry.deleted_at.is_none());
        assert_eq!(entry.status, EntryStatus::Success);
        assert_eq!(entry.endpoint, "/api/rooms");
        assert_eq!(entry.method, "GET");
        assert!(entry.metadata.is_empty());
    }

    #[test]
    fn test_builder_chaining() {
        let user = new_entry_id();
        let entry = ActivityEntry::new(ActionType::Delete, "/api/rooms/12", "DELETE")
            .with_request_id("req-1")
            .with_user_id(user)
            .with_user_email("admin@xenia.example")
            .with_resource("rooms")
            .with_resource_id("12")
            .with_response_code(204)
            .with_metadata_entry("latency_ms", json!(17));

        assert_eq!(entry.request_id, "req-1");
        assert_eq!(entry.user_id, Some(user));
        assert_eq!(entry.resource.as_deref(), Some("rooms"));
        assert_eq!(entry.resource_id.as_deref(), Some("12"));
        assert_eq!(entry.response_code, Some(204));
        assert_eq!(entry.metadata.get("latency_ms"), Some(&json!(17)));
    }

    #[test]
    fn test_entry_serialization_uses_wire_names() {
        let entry = ActivityEntry::new(ActionType::Booking, "/api/bookings", "POST")
            .with_category(Category::Critical)
            .with_status(EntryStatus::Failed);

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"action\":\"BOOKING\""));
        assert!(json.contains("\"category\":\"CRITICAL\""));
        assert!(json.contains("\"status\":\"FAILED\""));
    }

    #[test]
    fn test_entry_ids_are_time_ordered() {
        let a = new_entry_id();
        let b = new_entry_id();
        assert!(a <= b);
    }
}
