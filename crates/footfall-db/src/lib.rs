//! # footfall-db: Durable Storage for footfall
//!
//! This crate keeps the tracker's named entries in a local SQLite file so
//! identity tokens and the unacknowledged event queue survive a restart.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        footfall Data Flow                               │
//! │                                                                         │
//! │  IdentityStore / EventOutbox (footfall-agent)                          │
//! │       │  Storage::set("footfall_events", json, ttl)                    │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   footfall-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │ EntryRepository │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄───│  get / set      │   │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │    │  remove / purge │   │  001_...sql  │  │   │
//! │  │   └───────────────┘    └─────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite file (platform data dir, e.g. .../footfall/footfall.db)│   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Entry repository
//!
//! ## Usage
//!
//! ```rust,ignore
//! use footfall_db::{Database, DbConfig};
//! use std::time::Duration;
//!
//! let db = Database::new(DbConfig::new("footfall.db")).await?;
//! db.entries().set("footfall_visit", "abc", Duration::from_secs(240 * 60), None).await?;
//! let visit = db.entries().get("footfall_visit").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::entries::{EntryRepository, StorageEntry};
