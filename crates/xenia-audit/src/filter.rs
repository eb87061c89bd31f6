//! Typed search filters over stored entries.
//!
//! Stores translate a [`SearchQuery`] into their native query form; the
//! in-memory store evaluates [`SearchFilter::matches`] directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{ActionType, Category, EntryStatus};
use crate::entry::ActivityEntry;
use crate::error::AuditError;

/// Default page size when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Equality/range predicates over stored entries. Empty fields match
/// everything. Soft-deleted entries are excluded unless `include_deleted`
/// is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Entries created at or after this instant
    pub created_after: Option<DateTime<Utc>>,

    /// Entries created at or before this instant
    pub created_before: Option<DateTime<Utc>>,

    /// Entries by this user
    pub user_id: Option<Uuid>,

    /// Entries from this client IP
    pub ip_address: Option<String>,

    /// Entries recording this action
    pub action: Option<ActionType>,

    /// Entries in this retention category
    pub category: Option<Category>,

    /// Entries with this outcome
    pub status: Option<EntryStatus>,

    /// Entries against this exact endpoint path
    pub endpoint: Option<String>,

    /// Case-insensitive substring over endpoint, message and resource
    pub text: Option<String>,

    /// Also match soft-deleted entries
    pub include_deleted: bool,
}

impl SearchFilter {
    /// Creates an empty filter matching every live entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches entries created at or after the given instant.
    #[must_use]
    pub const fn with_created_after(mut self, after: DateTime<Utc>) -> Self {
        self.created_after = Some(after);
        self
    }

    /// Matches entries created at or before the given instant.
    #[must_use]
    pub const fn with_created_before(mut self, before: DateTime<Utc>) -> Self {
        self.created_before = Some(before);
        self
    }

    /// Matches entries by the given user.
    #[must_use]
    pub const fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Matches entries from the given client IP.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Matches entries recording the given action.
    #[must_use]
    pub const fn with_action(mut self, action: ActionType) -> Self {
        self.action = Some(action);
        self
    }

    /// Matches entries in the given retention category.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Matches entries with the given outcome.
    #[must_use]
    pub const fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Matches entries against the given exact endpoint path.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Matches entries containing the given text in endpoint, message or
    /// resource.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Includes soft-deleted entries in the result.
    #[must_use]
    pub const fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Validates the filter, rejecting an inverted date range.
    pub fn validate(&self) -> crate::error::Result<()> {
        if let (Some(after), Some(before)) = (self.created_after, self.created_before) {
            if after > before {
                return Err(AuditError::InvalidDateRange {
                    start: after,
                    end: before,
                });
            }
        }
        Ok(())
    }

    /// Evaluates the filter against one entry.
    #[must_use]
    pub fn matches(&self, entry: &ActivityEntry) -> bool {
        if !self.include_deleted && entry.deleted_at.is_some() {
            return false;
        }
        if let Some(after) = self.created_after {
            if !entry.created_at.is_some_and(|at| at >= after) {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if !entry.created_at.is_some_and(|at| at <= before) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(ip) = &self.ip_address {
            if entry.ip_address != *ip {
                return false;
            }
        }
        if let Some(action) = self.action {
            if entry.action != action {
                return false;
            }
        }
        if let Some(category) = self.category {
            if entry.category != Some(category) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }
        if let Some(endpoint) = &self.endpoint {
            if entry.endpoint != *endpoint {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if !text_matches(text, entry) {
                return false;
            }
        }
        true
    }
}

fn text_matches(needle: &str, entry: &ActivityEntry) -> bool {
    let needle = needle.to_lowercase();
    entry.endpoint.to_lowercase().contains(&needle)
        || entry
            .message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains(&needle))
        || entry
            .resource
            .as_deref()
            .is_some_and(|r| r.to_lowercase().contains(&needle))
}

/// Field the result page is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Order by creation time
    #[default]
    CreatedAt,
    /// Order by action type
    Action,
    /// Order by retention category
    Category,
    /// Order by outcome status
    Status,
    /// Order by endpoint path
    Endpoint,
}

/// Direction of the result ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first (newest first for timestamps)
    #[default]
    Descending,
}

/// A filter plus ordering and paging: one store search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Predicates to match
    pub filter: SearchFilter,

    /// Field the page is ordered by
    pub sort_by: SortField,

    /// Direction of the ordering
    pub order: SortOrder,

    /// Maximum entries returned in the page
    pub limit: u32,

    /// Entries skipped before the page starts
    pub offset: u64,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filter: SearchFilter::default(),
            sort_by: SortField::default(),
            order: SortOrder::default(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl SearchQuery {
    /// Creates a query for the given filter with default ordering and
    /// paging (newest first, [`DEFAULT_PAGE_SIZE`] entries).
    #[must_use]
    pub fn new(filter: SearchFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    /// Sets the ordering.
    #[must_use]
    pub const fn with_sort(mut self, sort_by: SortField, order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.order = order;
        self
    }

    /// Sets the page window.
    #[must_use]
    pub const fn with_page(mut self, limit: u32, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Validates the query's filter.
    pub fn validate(&self) -> crate::error::Result<()> {
        self.filter.validate()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::entry::new_entry_id;

    fn entry_at(at: DateTime<Utc>) -> ActivityEntry {
        let mut entry = ActivityEntry::new(ActionType::Read, "/api/rooms", "GET");
        entry.created_at = Some(at);
        entry
    }

    #[test]
    fn test_empty_filter_matches_live_entries() {
        let filter = SearchFilter::new();
        assert!(filter.matches(&entry_at(Utc::now())));
    }

    #[test]
    fn test_soft_deleted_excluded_by_default() {
        let mut entry = entry_at(Utc::now());
        entry.deleted_at = Some(Utc::now());

        assert!(!SearchFilter::new().matches(&entry));
        assert!(SearchFilter::new().with_deleted().matches(&entry));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let at = Utc::now();
        let filter = SearchFilter::new()
            .with_created_after(at)
            .with_created_before(at);
        assert!(filter.matches(&entry_at(at)));
        assert!(!filter.matches(&entry_at(at + Duration::seconds(1))));
        assert!(!filter.matches(&entry_at(at - Duration::seconds(1))));
    }

    #[test]
    fn test_equality_fields() {
        let user = new_entry_id();
        let mut entry = entry_at(Utc::now());
        entry.user_id = Some(user);
        entry.ip_address = "203.0.113.7".to_string();

        assert!(SearchFilter::new().with_user_id(user).matches(&entry));
        assert!(!SearchFilter::new().with_user_id(new_entry_id()).matches(&entry));
        assert!(SearchFilter::new().with_ip_address("203.0.113.7").matches(&entry));
        assert!(SearchFilter::new().with_action(ActionType::Read).matches(&entry));
        assert!(!SearchFilter::new().with_action(ActionType::Delete).matches(&entry));
    }

    #[test]
    fn test_text_search_is_case_insensitive() {
        let mut entry = entry_at(Utc::now());
        entry.message = Some("Deleted 3 logs".to_string());

        assert!(SearchFilter::new().with_text("deleted").matches(&entry));
        assert!(SearchFilter::new().with_text("ROOMS").matches(&entry));
        assert!(!SearchFilter::new().with_text("payments").matches(&entry));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let now = Utc::now();
        let filter = SearchFilter::new()
            .with_created_after(now)
            .with_created_before(now - Duration::days(1));

        assert!(matches!(
            filter.validate(),
            Err(AuditError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_query_defaults() {
        let query = SearchQuery::new(SearchFilter::new());
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort_by, SortField::CreatedAt);
        assert_eq!(query.order, SortOrder::Descending);
    }
}
