//! # Entry Repository
//!
//! Key-value entries with an expiry, the way a browser cookie jar behaves.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Entry Lifecycle                                      │
//! │                                                                         │
//! │  set(name, value, ttl)                                                 │
//! │       │  INSERT ... ON CONFLICT(name) DO UPDATE                        │
//! │       ▼                                                                 │
//! │  ┌──────────────────────────────┐                                      │
//! │  │ name | value | expires_at    │                                      │
//! │  └──────────────────────────────┘                                      │
//! │       │                                                                 │
//! │       ├── get(name) before expires_at ──► Some(value)                  │
//! │       ├── get(name) after expires_at  ──► None (row still present)     │
//! │       ├── remove(name)                ──► row deleted                  │
//! │       └── purge_expired()             ──► expired rows deleted         │
//! │                                                                         │
//! │  Writing the same name again replaces value AND expiry, which is how   │
//! │  keep-alive extends a visit.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::time::Duration;
use tracing::debug;

use crate::error::DbResult;

/// A stored entry row.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StorageEntry {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    /// Unix epoch milliseconds.
    pub expires_at: i64,
    pub updated_at: DateTime<Utc>,
}

impl StorageEntry {
    /// Returns true if the entry has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp_millis()
    }
}

/// Repository for storage entries.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    pool: SqlitePool,
}

impl EntryRepository {
    /// Creates a new EntryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        EntryRepository { pool }
    }

    /// Gets the value of a live entry.
    ///
    /// ## Returns
    /// * `Ok(Some(value))` - Entry exists and has not expired
    /// * `Ok(None)` - Entry is missing or expired
    pub async fn get(&self, name: &str) -> DbResult<Option<String>> {
        let now = Utc::now().timestamp_millis();

        let value: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value
            FROM storage_entries
            WHERE name = ?1 AND expires_at > ?2
            "#,
        )
        .bind(name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    /// Gets the full row for an entry, expired or not.
    pub async fn get_entry(&self, name: &str) -> DbResult<Option<StorageEntry>> {
        let entry = sqlx::query_as::<_, StorageEntry>(
            r#"
            SELECT name, value, domain, expires_at, updated_at
            FROM storage_entries
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Writes an entry, replacing value, domain and expiry if it exists.
    ///
    /// ## Arguments
    /// * `name` - Entry name
    /// * `value` - Entry value
    /// * `ttl` - Time until the entry expires
    /// * `domain` - Optional scope override, stored as given
    pub async fn set(
        &self,
        name: &str,
        value: &str,
        ttl: Duration,
        domain: Option<&str>,
    ) -> DbResult<()> {
        let now = Utc::now();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.timestamp_millis().saturating_add(ttl_ms);

        debug!(name = %name, expires_at, "Writing storage entry");

        sqlx::query(
            r#"
            INSERT INTO storage_entries (name, value, domain, expires_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                value = excluded.value,
                domain = excluded.domain,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(value)
        .bind(domain)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes an entry. Deleting a missing entry is not an error.
    ///
    /// ## Returns
    /// True if a row was deleted.
    pub async fn remove(&self, name: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM storage_entries WHERE name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes every expired entry.
    ///
    /// ## Returns
    /// Number of rows deleted.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let now = Utc::now().timestamp_millis();

        let result = sqlx::query("DELETE FROM storage_entries WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            debug!(purged = result.rows_affected(), "Purged expired entries");
        }

        Ok(result.rows_affected())
    }

    /// Counts live entries.
    pub async fn count(&self) -> DbResult<i64> {
        let now = Utc::now().timestamp_millis();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM storage_entries WHERE expires_at > ?1")
                .bind(now)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
