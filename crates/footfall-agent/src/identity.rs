//! # Identity Store
//!
//! Reads and writes of the tracker's named entries (visit and visitor tokens,
//! the pending marker, the debug flag, the queue snapshot) through whichever
//! [`Storage`] backend the host supplied.
//!
//! Token shape is never validated: whatever the collector or a previous
//! lifetime stored is used as-is.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use footfall_core::presence;

use crate::error::TrackerResult;
use crate::storage::Storage;

/// Named-entry access scoped by the configured domain.
#[derive(Clone)]
pub struct IdentityStore {
    storage: Arc<dyn Storage>,
    domain: Option<String>,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn Storage>, domain: Option<String>) -> Self {
        IdentityStore { storage, domain }
    }

    /// Replaces the scope applied to subsequent writes.
    pub fn set_domain(&mut self, domain: Option<String>) {
        self.domain = domain;
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Returns a non-empty entry value.
    ///
    /// Storage failures read as absent; they are logged, never raised.
    pub async fn get(&self, name: &str) -> Option<String> {
        match self.storage.get(name).await {
            Ok(value) => presence(value),
            Err(e) => {
                warn!(name, error = %e, "Storage read failed");
                None
            }
        }
    }

    /// Writes an entry with the given lifetime.
    pub async fn set(&self, name: &str, value: &str, ttl: Duration) -> TrackerResult<()> {
        self.storage
            .set(name, value, ttl, self.domain.as_deref())
            .await
    }

    /// Removes an entry.
    pub async fn destroy(&self, name: &str) -> TrackerResult<()> {
        self.storage.remove(name).await
    }
}
