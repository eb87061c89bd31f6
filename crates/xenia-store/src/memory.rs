//! In-memory store for tests and ephemeral deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use xenia_audit::{
    categorize, new_entry_id, ActivityEntry, Category, SearchQuery, SortField, SortOrder,
};

use crate::error::{Result, StoreError};
use crate::{ActivityStore, SearchPage, StoreStats, MAX_SEARCH_LIMIT};

/// Keeps every entry in a `Vec` behind an async lock.
///
/// Matching, sorting and paging reuse the same [`xenia_audit::SearchFilter`]
/// semantics the SQL backend expresses in its WHERE clauses, so tests
/// written against this store transfer. [`close`](ActivityStore::close) is
/// a no-op and the store stays readable afterwards, which lets tests
/// inspect what a pipeline flushed on shutdown.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<ActivityEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, including soft-deleted ones.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when no entries are held at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn stamp(entry: &mut ActivityEntry) {
        if entry.id.is_none() {
            entry.id = Some(new_entry_id());
        }
        if entry.created_at.is_none() {
            entry.created_at = Some(Utc::now());
        }
        if entry.category.is_none() {
            entry.category = Some(categorize(entry));
        }
    }

    fn compare(a: &ActivityEntry, b: &ActivityEntry, field: SortField) -> std::cmp::Ordering {
        match field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Action => a.action.as_str().cmp(b.action.as_str()),
            SortField::Category => {
                let left = a.category.map_or("", |c| c.as_str());
                let right = b.category.map_or("", |c| c.as_str());
                left.cmp(right)
            }
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::Endpoint => a.endpoint.cmp(&b.endpoint),
        }
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert_batch(&self, entries: Vec<ActivityEntry>) -> Result<u64> {
        let count = entries.len() as u64;
        let mut stored = self.entries.write().await;
        for mut entry in entries {
            Self::stamp(&mut entry);
            stored.push(entry);
        }
        Ok(count)
    }

    async fn insert_one(&self, mut entry: ActivityEntry) -> Result<()> {
        Self::stamp(&mut entry);
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<ActivityEntry> {
        let not_found = || StoreError::NotFound { id: id.to_string() };
        let uuid = Uuid::parse_str(id).map_err(|_| not_found())?;
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|entry| entry.id == Some(uuid))
            .cloned()
            .ok_or_else(not_found)
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let entries = self.entries.read().await;
        let mut matched: Vec<ActivityEntry> = entries
            .iter()
            .filter(|entry| query.filter.matches(entry))
            .cloned()
            .collect();
        drop(entries);

        let total = matched.len() as u64;
        matched.sort_by(|a, b| {
            let ordering = Self::compare(a, b, query.sort_by);
            match query.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
        let limit = query.limit.min(MAX_SEARCH_LIMIT) as usize;
        let page = matched.into_iter().skip(offset).take(limit).collect();
        Ok(SearchPage {
            entries: page,
            total,
        })
    }

    async fn soft_delete_older_than(
        &self,
        category: Option<Category>,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        let chunk = u64::from(batch_size.max(1));
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let mut stamped = 0u64;
        // Work in passes of `chunk` to mirror how the SQL backend pages.
        loop {
            let mut in_pass = 0u64;
            for entry in entries.iter_mut() {
                if in_pass == chunk {
                    break;
                }
                if entry.deleted_at.is_none()
                    && category.is_none_or(|wanted| entry.category == Some(wanted))
                    && entry.created_at.is_some_and(|at| at < cutoff)
                {
                    entry.deleted_at = Some(now);
                    in_pass += 1;
                }
            }
            stamped += in_pass;
            if in_pass < chunk {
                break;
            }
        }
        Ok(stamped)
    }

    async fn soft_delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let mut stamped = 0u64;
        for entry in entries.iter_mut() {
            if entry.deleted_at.is_none() && entry.id.is_some_and(|id| ids.contains(&id)) {
                entry.deleted_at = Some(now);
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    async fn soft_delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let mut stamped = 0u64;
        for entry in entries.iter_mut() {
            if entry.deleted_at.is_none() && entry.user_id == Some(user_id) {
                entry.deleted_at = Some(now);
                stamped += 1;
            }
        }
        Ok(stamped)
    }

    async fn purge_soft_deleted_before(
        &self,
        before: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        let budget = u64::from(batch_size.max(1));
        let mut entries = self.entries.write().await;
        let mut removed = 0u64;
        entries.retain(|entry| {
            if removed == budget {
                return true;
            }
            match entry.deleted_at {
                Some(at) if at < before => {
                    removed += 1;
                    false
                }
                _ => true,
            }
        });
        Ok(removed)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let entries = self.entries.read().await;
        let mut total = 0u64;
        let mut oldest: Option<DateTime<Utc>> = None;
        for entry in entries.iter().filter(|entry| entry.deleted_at.is_none()) {
            total += 1;
            if let Some(at) = entry.created_at {
                oldest = Some(oldest.map_or(at, |current| current.min(at)));
            }
        }
        Ok(StoreStats { total, oldest })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
