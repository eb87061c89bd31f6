//! SQLite store backed by a `sqlx` connection pool.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use xenia_audit::{
    categorize, new_entry_id, ActivityEntry, Category, JsonMap, SearchFilter, SearchQuery,
    SortField, SortOrder,
};

use crate::error::{Result, StoreError};
use crate::{ActivityStore, SearchPage, StoreStats, MAX_SEARCH_LIMIT};

/// Timestamps are stored as integer microseconds since the UNIX epoch so
/// cutoff comparisons stay exact in SQL. Payload columns hold JSON text.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS activity_log (
        id TEXT PRIMARY KEY NOT NULL,
        request_id TEXT NOT NULL,
        session_id TEXT,
        user_id TEXT,
        user_email TEXT,
        action TEXT NOT NULL,
        category TEXT NOT NULL,
        status TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        method TEXT NOT NULL,
        ip_address TEXT NOT NULL,
        user_agent TEXT,
        resource TEXT,
        resource_id TEXT,
        response_code INTEGER,
        message TEXT,
        request_payload TEXT,
        response_payload TEXT,
        before_snapshot TEXT,
        after_snapshot TEXT,
        metadata TEXT NOT NULL,
        created_at_us INTEGER NOT NULL,
        deleted_at_us INTEGER
    )",
    "CREATE INDEX IF NOT EXISTS idx_activity_log_created_at
        ON activity_log (created_at_us)",
    "CREATE INDEX IF NOT EXISTS idx_activity_log_category_created_at
        ON activity_log (category, created_at_us)",
    "CREATE INDEX IF NOT EXISTS idx_activity_log_user_created_at
        ON activity_log (user_id, created_at_us)",
    "CREATE INDEX IF NOT EXISTS idx_activity_log_deleted_at
        ON activity_log (deleted_at_us)",
];

const SELECT_COLUMNS: &str = "SELECT id, request_id, session_id, user_id, user_email, \
     action, category, status, endpoint, method, ip_address, user_agent, \
     resource, resource_id, response_code, message, request_payload, \
     response_payload, before_snapshot, after_snapshot, metadata, \
     created_at_us, deleted_at_us FROM activity_log";

const INSERT_SQL: &str = "INSERT INTO activity_log (
        id, request_id, session_id, user_id, user_email,
        action, category, status, endpoint, method, ip_address, user_agent,
        resource, resource_id, response_code, message, request_payload,
        response_payload, before_snapshot, after_snapshot, metadata,
        created_at_us, deleted_at_us
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Persistent store on a single SQLite database file.
///
/// Opens with WAL journaling so the flush worker's writes do not block
/// searches from request handlers. All timestamp comparisons happen on
/// the integer microsecond columns, never on formatted text.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `path` and ensures the
    /// schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_row(&self, entry: &ActivityEntry) -> Result<()> {
        let id = entry.id.unwrap_or_else(new_entry_id);
        let created_at = entry.created_at.unwrap_or_else(Utc::now);
        let category = entry.category.unwrap_or_else(|| categorize(entry));

        sqlx::query(INSERT_SQL)
            .bind(id.to_string())
            .bind(entry.request_id.as_str())
            .bind(entry.session_id.as_deref())
            .bind(entry.user_id.map(|user| user.to_string()))
            .bind(entry.user_email.as_deref())
            .bind(entry.action.as_str())
            .bind(category.as_str())
            .bind(entry.status.as_str())
            .bind(entry.endpoint.as_str())
            .bind(entry.method.as_str())
            .bind(entry.ip_address.as_str())
            .bind(entry.user_agent.as_deref())
            .bind(entry.resource.as_deref())
            .bind(entry.resource_id.as_deref())
            .bind(entry.response_code.map(i64::from))
            .bind(entry.message.as_deref())
            .bind(entry.request_payload.as_ref().map(json_to_text))
            .bind(entry.response_payload.as_ref().map(json_to_text))
            .bind(entry.before.as_ref().map(json_to_text))
            .bind(entry.after.as_ref().map(json_to_text))
            .bind(json_to_text(&entry.metadata))
            .bind(created_at.timestamp_micros())
            .bind(entry.deleted_at.map(|at| at.timestamp_micros()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn insert_batch(&self, entries: Vec<ActivityEntry>) -> Result<u64> {
        let mut inserted = 0u64;
        for entry in &entries {
            match self.insert_row(entry).await {
                Ok(()) => inserted += 1,
                Err(StoreError::Closed) => return Err(StoreError::Closed),
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        endpoint = %entry.endpoint,
                        "dropping activity entry that failed to persist"
                    );
                }
            }
        }
        Ok(inserted)
    }

    async fn insert_one(&self, entry: ActivityEntry) -> Result<()> {
        self.insert_row(&entry).await
    }

    async fn find_by_id(&self, id: &str) -> Result<ActivityEntry> {
        let Ok(uuid) = Uuid::parse_str(id) else {
            return Err(StoreError::NotFound { id: id.to_string() });
        };

        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(uuid.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => row_to_entry(&row),
            None => Err(StoreError::NotFound { id: id.to_string() }),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM activity_log WHERE 1=1");
        push_filters(&mut count, &query.filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let limit = i64::from(query.limit.min(MAX_SEARCH_LIMIT));
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);

        let mut page = QueryBuilder::new(format!("{SELECT_COLUMNS} WHERE 1=1"));
        push_filters(&mut page, &query.filter);
        page.push(format!(
            " ORDER BY {} {}, id ASC",
            sort_column(query.sort_by),
            order_keyword(query.order)
        ));
        page.push(" LIMIT ");
        page.push_bind(limit);
        page.push(" OFFSET ");
        page.push_bind(offset);

        let rows = page.build().fetch_all(&self.pool).await?;
        let entries = rows
            .iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchPage {
            entries,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn soft_delete_older_than(
        &self,
        category: Option<Category>,
        cutoff: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        let chunk = i64::from(batch_size.max(1));
        let now_us = Utc::now().timestamp_micros();
        let cutoff_us = cutoff.timestamp_micros();

        let mut total = 0u64;
        loop {
            let mut update = QueryBuilder::new("UPDATE activity_log SET deleted_at_us = ");
            update.push_bind(now_us);
            update.push(
                " WHERE id IN (SELECT id FROM activity_log \
                 WHERE deleted_at_us IS NULL AND created_at_us < ",
            );
            update.push_bind(cutoff_us);
            if let Some(category) = category {
                update.push(" AND category = ");
                update.push_bind(category.as_str());
            }
            update.push(" LIMIT ");
            update.push_bind(chunk);
            update.push(")");

            let affected = update.build().execute(&self.pool).await?.rows_affected();
            total += affected;
            if affected < u64::from(batch_size.max(1)) {
                break;
            }
        }
        Ok(total)
    }

    async fn soft_delete_by_ids(&self, ids: &[Uuid]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut update = QueryBuilder::new("UPDATE activity_log SET deleted_at_us = ");
        update.push_bind(Utc::now().timestamp_micros());
        update.push(" WHERE deleted_at_us IS NULL AND id IN (");
        {
            let mut list = update.separated(", ");
            for id in ids {
                list.push_bind(id.to_string());
            }
            list.push_unseparated(")");
        }

        let affected = update.build().execute(&self.pool).await?.rows_affected();
        Ok(affected)
    }

    async fn soft_delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let affected =
            sqlx::query("UPDATE activity_log SET deleted_at_us = ? WHERE deleted_at_us IS NULL AND user_id = ?")
                .bind(Utc::now().timestamp_micros())
                .bind(user_id.to_string())
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected)
    }

    async fn purge_soft_deleted_before(
        &self,
        before: DateTime<Utc>,
        batch_size: u32,
    ) -> Result<u64> {
        let affected = sqlx::query(
            "DELETE FROM activity_log WHERE id IN (SELECT id FROM activity_log \
             WHERE deleted_at_us IS NOT NULL AND deleted_at_us < ? LIMIT ?)",
        )
        .bind(before.timestamp_micros())
        .bind(i64::from(batch_size.max(1)))
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, MIN(created_at_us) AS oldest \
             FROM activity_log WHERE deleted_at_us IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.try_get("total")?;
        let oldest_us: Option<i64> = row.try_get("oldest")?;
        let oldest = match oldest_us {
            Some(us) => Some(decode_timestamp("", "oldest", us)?),
            None => None,
        };

        Ok(StoreStats {
            total: u64::try_from(total).unwrap_or(0),
            oldest,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &SearchFilter) {
    if !filter.include_deleted {
        builder.push(" AND deleted_at_us IS NULL");
    }
    if let Some(after) = filter.created_after {
        builder.push(" AND created_at_us >= ");
        builder.push_bind(after.timestamp_micros());
    }
    if let Some(before) = filter.created_before {
        builder.push(" AND created_at_us <= ");
        builder.push_bind(before.timestamp_micros());
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND user_id = ");
        builder.push_bind(user_id.to_string());
    }
    if let Some(ip) = &filter.ip_address {
        builder.push(" AND ip_address = ");
        builder.push_bind(ip.clone());
    }
    if let Some(action) = filter.action {
        builder.push(" AND action = ");
        builder.push_bind(action.as_str());
    }
    if let Some(category) = filter.category {
        builder.push(" AND category = ");
        builder.push_bind(category.as_str());
    }
    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(endpoint) = &filter.endpoint {
        builder.push(" AND endpoint = ");
        builder.push_bind(endpoint.clone());
    }
    if let Some(text) = &filter.text {
        let pattern = format!("%{}%", text.to_lowercase());
        builder.push(" AND (LOWER(endpoint) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR LOWER(COALESCE(message, '')) LIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR LOWER(COALESCE(resource, '')) LIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

const fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::CreatedAt => "created_at_us",
        SortField::Action => "action",
        SortField::Category => "category",
        SortField::Status => "status",
        SortField::Endpoint => "endpoint",
    }
}

const fn order_keyword(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

fn json_to_text(map: &JsonMap) -> String {
    serde_json::to_string(map).unwrap_or_else(|_| String::from("{}"))
}

fn decode_parsed<T: FromStr>(id: &str, column: &str, raw: &str) -> Result<T>
where
    T::Err: Display,
{
    raw.parse().map_err(|error: T::Err| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("{column}: {error}"),
    })
}

fn decode_json(id: &str, column: &str, raw: Option<String>) -> Result<Option<JsonMap>> {
    match raw {
        None => Ok(None),
        Some(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|error| StoreError::Corrupt {
                id: id.to_string(),
                reason: format!("{column}: {error}"),
            }),
    }
}

fn decode_timestamp(id: &str, column: &str, micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StoreError::Corrupt {
        id: id.to_string(),
        reason: format!("{column} out of range: {micros}"),
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<ActivityEntry> {
    let id_text: String = row.try_get("id")?;
    let action_text: String = row.try_get("action")?;
    let category_text: String = row.try_get("category")?;
    let status_text: String = row.try_get("status")?;
    let user_id_text: Option<String> = row.try_get("user_id")?;
    let response_code: Option<i64> = row.try_get("response_code")?;
    let metadata_text: String = row.try_get("metadata")?;
    let created_at_us: i64 = row.try_get("created_at_us")?;
    let deleted_at_us: Option<i64> = row.try_get("deleted_at_us")?;

    let id = decode_parsed::<Uuid>(&id_text, "id", &id_text)?;
    let user_id = match user_id_text {
        Some(text) => Some(decode_parsed::<Uuid>(&id_text, "user_id", &text)?),
        None => None,
    };
    let response_code = match response_code {
        Some(code) => Some(u16::try_from(code).map_err(|_| StoreError::Corrupt {
            id: id_text.clone(),
            reason: format!("response_code out of range: {code}"),
        })?),
        None => None,
    };
    let metadata = serde_json::from_str(&metadata_text).map_err(|error| StoreError::Corrupt {
        id: id_text.clone(),
        reason: format!("metadata: {error}"),
    })?;
    let created_at = decode_timestamp(&id_text, "created_at_us", created_at_us)?;
    let deleted_at = match deleted_at_us {
        Some(us) => Some(decode_timestamp(&id_text, "deleted_at_us", us)?),
        None => None,
    };

    Ok(ActivityEntry {
        id: Some(id),
        request_id: row.try_get("request_id")?,
        session_id: row.try_get("session_id")?,
        user_id,
        user_email: row.try_get("user_email")?,
        action: decode_parsed(&id_text, "action", &action_text)?,
        category: Some(decode_parsed(&id_text, "category", &category_text)?),
        status: decode_parsed(&id_text, "status", &status_text)?,
        endpoint: row.try_get("endpoint")?,
        method: row.try_get("method")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        resource: row.try_get("resource")?,
        resource_id: row.try_get("resource_id")?,
        response_code,
        message: row.try_get("message")?,
        request_payload: decode_json(&id_text, "request_payload", row.try_get("request_payload")?)?,
        response_payload: decode_json(
            &id_text,
            "response_payload",
            row.try_get("response_payload")?,
        )?,
        before: decode_json(&id_text, "before_snapshot", row.try_get("before_snapshot")?)?,
        after: decode_json(&id_text, "after_snapshot", row.try_get("after_snapshot")?)?,
        metadata,
        created_at: Some(created_at),
        deleted_at,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;
    use tempfile::TempDir;
    use xenia_audit::{ActionType, EntryStatus};

    use super::*;

    async fn open_store() -> (TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("audit.db")).await.unwrap();
        (dir, store)
    }

    fn full_entry() -> ActivityEntry {
        let mut payload = JsonMap::new();
        payload.insert("room".into(), json!("suite-7"));

        ActivityEntry::new(ActionType::Update, "/api/rooms/7", "PUT")
            .with_request_id("req-42")
            .with_session_id("sess-9")
            .with_user_id(new_entry_id())
            .with_user_email("admin@xenia.example")
            .with_ip_address("203.0.113.7")
            .with_user_agent("curl/8.5")
            .with_resource("rooms")
            .with_resource_id("7")
            .with_response_code(200)
            .with_message("room updated")
            .with_request_payload(payload.clone())
            .with_response_payload(payload.clone())
            .with_before(payload.clone())
            .with_after(payload)
            .with_metadata_entry("latency_ms", json!(12))
    }

    fn aged(action: ActionType, endpoint: &str, days_ago: i64) -> ActivityEntry {
        let mut entry = ActivityEntry::new(action, endpoint, "POST").with_ip_address("203.0.113.7");
        entry.created_at = Some(Utc::now() - Duration::days(days_ago));
        entry
    }

    #[tokio::test]
    async fn test_insert_and_find_round_trip() {
        let (_dir, store) = open_store().await;

        let mut entry = full_entry();
        let at = Utc::now();
        entry.created_at = Some(at);
        store.insert_one(entry.clone()).await.unwrap();

        let page = store.search(&SearchQuery::default()).await.unwrap();
        let id = page.entries[0].id.unwrap().to_string();

        let found = store.find_by_id(&id).await.unwrap();
        assert_eq!(found.request_id, "req-42");
        assert_eq!(found.session_id.as_deref(), Some("sess-9"));
        assert_eq!(found.user_id, entry.user_id);
        assert_eq!(found.action, ActionType::Update);
        assert_eq!(found.category, Some(Category::General));
        assert_eq!(found.status, EntryStatus::Success);
        assert_eq!(found.response_code, Some(200));
        assert_eq!(found.request_payload, entry.request_payload);
        assert_eq!(found.before, entry.before);
        assert_eq!(found.metadata.get("latency_ms"), Some(&json!(12)));
        assert_eq!(
            found.created_at.unwrap().timestamp_micros(),
            at.timestamp_micros()
        );
        assert!(found.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_find_by_id_rejects_absent_and_malformed() {
        let (_dir, store) = open_store().await;

        let absent = store.find_by_id(&new_entry_id().to_string()).await;
        assert!(absent.is_err_and(|e| e.is_not_found()));

        let malformed = store.find_by_id("definitely-not-a-uuid").await;
        assert!(malformed.is_err_and(|e| e.is_not_found()));
    }

    #[tokio::test]
    async fn test_insert_batch_skips_rows_that_fail() {
        let (_dir, store) = open_store().await;

        let shared = new_entry_id();
        let mut first = aged(ActionType::Read, "/a", 1);
        first.id = Some(shared);
        let mut duplicate = aged(ActionType::Read, "/b", 1);
        duplicate.id = Some(shared);
        let fresh = aged(ActionType::Read, "/c", 1);

        let inserted = store
            .insert_batch(vec![first, duplicate, fresh])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let page = store.search(&SearchQuery::default()).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_search_filters_sorting_and_paging() {
        let (_dir, store) = open_store().await;

        store
            .insert_one(aged(ActionType::Booking, "/api/bookings", 3))
            .await
            .unwrap();
        store
            .insert_one(aged(ActionType::Read, "/api/rooms", 2))
            .await
            .unwrap();
        store
            .insert_one(aged(ActionType::Read, "/api/guests", 1))
            .await
            .unwrap();

        let general = store
            .search(&SearchQuery::new(
                SearchFilter::new().with_category(Category::General),
            ))
            .await
            .unwrap();
        assert_eq!(general.total, 2);

        let text = store
            .search(&SearchQuery::new(SearchFilter::new().with_text("BOOK")))
            .await
            .unwrap();
        assert_eq!(text.total, 1);
        assert_eq!(text.entries[0].endpoint, "/api/bookings");

        let newest_first = store
            .search(&SearchQuery::default().with_page(2, 0))
            .await
            .unwrap();
        assert_eq!(newest_first.total, 3);
        assert_eq!(newest_first.entries.len(), 2);
        assert_eq!(newest_first.entries[0].endpoint, "/api/guests");

        let oldest_first = store
            .search(
                &SearchQuery::default().with_sort(SortField::CreatedAt, SortOrder::Ascending),
            )
            .await
            .unwrap();
        assert_eq!(oldest_first.entries[0].endpoint, "/api/bookings");
    }

    #[tokio::test]
    async fn test_soft_delete_pages_and_is_idempotent() {
        let (_dir, store) = open_store().await;
        for i in 0..25 {
            store
                .insert_one(aged(ActionType::Read, &format!("/api/rooms/{i}"), 100))
                .await
                .unwrap();
        }
        store
            .insert_one(
                aged(ActionType::Login, "/api/v1/auth/login", 100)
                    .with_status(EntryStatus::Failed),
            )
            .await
            .unwrap();

        let cutoff = Utc::now() - Duration::days(30);
        let stamped = store
            .soft_delete_older_than(Some(Category::General), cutoff, 10)
            .await
            .unwrap();
        assert_eq!(stamped, 25);

        let again = store
            .soft_delete_older_than(Some(Category::General), cutoff, 10)
            .await
            .unwrap();
        assert_eq!(again, 0);

        // The security entry is untouched.
        let live = store.search(&SearchQuery::default()).await.unwrap();
        assert_eq!(live.total, 1);
        assert_eq!(live.entries[0].category, Some(Category::Security));
    }

    #[tokio::test]
    async fn test_purge_removes_only_aged_stamps() {
        let (_dir, store) = open_store().await;

        let mut old_stamp = aged(ActionType::Read, "/old", 100);
        old_stamp.deleted_at = Some(Utc::now() - Duration::days(8));
        let mut fresh_stamp = aged(ActionType::Read, "/fresh", 100);
        fresh_stamp.deleted_at = Some(Utc::now() - Duration::days(1));
        store.insert_one(old_stamp).await.unwrap();
        store.insert_one(fresh_stamp).await.unwrap();

        let removed = store
            .purge_soft_deleted_before(Utc::now() - Duration::days(7), 100)
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = store
            .search(&SearchQuery::new(SearchFilter::new().with_deleted()))
            .await
            .unwrap();
        assert_eq!(remaining.total, 1);
        assert_eq!(remaining.entries[0].endpoint, "/fresh");
    }

    #[tokio::test]
    async fn test_soft_delete_by_ids_and_user() {
        let (_dir, store) = open_store().await;
        let user = new_entry_id();

        store
            .insert_one(aged(ActionType::Read, "/mine", 1).with_user_id(user))
            .await
            .unwrap();
        store
            .insert_one(aged(ActionType::Read, "/other", 1))
            .await
            .unwrap();

        assert_eq!(store.soft_delete_by_user(user).await.unwrap(), 1);
        assert_eq!(store.soft_delete_by_user(user).await.unwrap(), 0);

        let live = store.search(&SearchQuery::default()).await.unwrap();
        let ids: Vec<Uuid> = live.entries.iter().filter_map(|e| e.id).collect();
        assert_eq!(store.soft_delete_by_ids(&ids).await.unwrap(), 1);
        assert_eq!(store.soft_delete_by_ids(&ids).await.unwrap(), 0);
        assert_eq!(store.soft_delete_by_ids(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_reports_live_total_and_oldest() {
        let (_dir, store) = open_store().await;

        let empty = store.stats().await.unwrap();
        assert_eq!(empty.total, 0);
        assert!(empty.oldest.is_none());

        let oldest_at = Utc::now() - Duration::days(40);
        let mut oldest = aged(ActionType::Read, "/oldest", 0);
        oldest.created_at = Some(oldest_at);
        store.insert_one(oldest).await.unwrap();
        store
            .insert_one(aged(ActionType::Read, "/newer", 1))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(
            stats.oldest.unwrap().timestamp_micros(),
            oldest_at.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn test_reopen_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");

        let store = SqliteStore::open(&path).await.unwrap();
        store.insert_one(full_entry()).await.unwrap();
        let id = store
            .search(&SearchQuery::default())
            .await
            .unwrap()
            .entries[0]
            .id
            .unwrap()
            .to_string();
        store.close().await.unwrap();

        let reopened = SqliteStore::open(&path).await.unwrap();
        let found = reopened.find_by_id(&id).await.unwrap();
        assert_eq!(found.endpoint, "/api/rooms/7");
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let (_dir, store) = open_store().await;
        store.close().await.unwrap();

        let result = store.insert_one(full_entry()).await;
        assert!(matches!(result, Err(StoreError::Closed)));
    }
}
