//! # Storage Backends
//!
//! The persistent key-value medium behind identity and the event queue.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storage Implementations                          │
//! │                                                                         │
//! │  trait Storage                                                         │
//! │  ├── footfall_db::Database  SQLite file, survives restarts             │
//! │  ├── MemoryStorage          process-local map with expiry              │
//! │  └── DisabledStorage        accepts writes, every read is absent       │
//! │                                                                         │
//! │  All three honor the same contract: a write is visible to the next     │
//! │  read until its ttl elapses or it is removed.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use footfall_db::Database;

use crate::error::TrackerResult;

/// Longest lifetime the in-memory backend tracks (100 years).
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 86_400);

// =============================================================================
// Storage Trait
// =============================================================================

/// Named entries with expiry.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the value of a live entry.
    async fn get(&self, name: &str) -> TrackerResult<Option<String>>;

    /// Writes an entry that expires after `ttl`, optionally scoped to `domain`.
    async fn set(
        &self,
        name: &str,
        value: &str,
        ttl: Duration,
        domain: Option<&str>,
    ) -> TrackerResult<()>;

    /// Deletes an entry. Missing entries are not an error.
    async fn remove(&self, name: &str) -> TrackerResult<()>;
}

// =============================================================================
// SQLite
// =============================================================================

#[async_trait]
impl Storage for Database {
    async fn get(&self, name: &str) -> TrackerResult<Option<String>> {
        Ok(self.entries().get(name).await?)
    }

    async fn set(
        &self,
        name: &str,
        value: &str,
        ttl: Duration,
        domain: Option<&str>,
    ) -> TrackerResult<()> {
        Ok(self.entries().set(name, value, ttl, domain).await?)
    }

    async fn remove(&self, name: &str) -> TrackerResult<()> {
        self.entries().remove(name).await?;
        Ok(())
    }
}

// =============================================================================
// In-Memory
// =============================================================================

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    domain: Option<String>,
    expires_at: Instant,
}

/// Process-local storage. Clones share the same entries.
///
/// Expiry follows the tokio clock, so paused-time tests can age entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, MemoryEntry>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the live entries, sorted.
    pub async fn names(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let mut names: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Domain recorded with a live entry.
    pub async fn domain_of(&self, name: &str) -> Option<String> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(name)
            .filter(|e| e.expires_at > now)
            .and_then(|e| e.domain.clone())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, name: &str) -> TrackerResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match entries.get(name) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        name: &str,
        value: &str,
        ttl: Duration,
        domain: Option<&str>,
    ) -> TrackerResult<()> {
        let expires_at = Instant::now() + ttl.min(MAX_TTL);

        self.entries.lock().await.insert(
            name.to_string(),
            MemoryEntry {
                value: value.to_string(),
                domain: domain.map(str::to_string),
                expires_at,
            },
        );
        Ok(())
    }

    async fn remove(&self, name: &str) -> TrackerResult<()> {
        self.entries.lock().await.remove(name);
        Ok(())
    }
}

// =============================================================================
// Disabled
// =============================================================================

/// Storage that silently forgets every write, like a browser that blocks
/// cookies. The tracker notices when a freshly written token reads back as
/// absent and degrades to non-durable operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStorage;

#[async_trait]
impl Storage for DisabledStorage {
    async fn get(&self, _name: &str) -> TrackerResult<Option<String>> {
        Ok(None)
    }

    async fn set(
        &self,
        _name: &str,
        _value: &str,
        _ttl: Duration,
        _domain: Option<&str>,
    ) -> TrackerResult<()> {
        Ok(())
    }

    async fn remove(&self, _name: &str) -> TrackerResult<()> {
        Ok(())
    }
}
