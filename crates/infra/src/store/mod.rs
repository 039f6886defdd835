//! Relational store boundary.
//!
//! This module defines the transactional store the lifecycle manager and the
//! directory run against, plus an in-memory implementation for tests/dev.

pub mod in_memory;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use query::{ChapterScan, UserScan, Window};
pub use r#trait::{Store, StoreError, StoreRead, Transaction};
