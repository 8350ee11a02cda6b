//! # Repository Module
//!
//! Database repository implementations for footfall.
//!
//! ## Available Repositories
//!
//! - [`entries::EntryRepository`] - Named entries with expiry (identity
//!   tokens, the event queue snapshot, flags)

pub mod entries;
