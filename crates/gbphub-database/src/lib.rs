//! # gbphub-database
//!
//! Persistence for the batch engine: the store traits the engine is written
//! against, PostgreSQL repositories implementing them, and an in-memory
//! store for single-node runs and tests.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{BatchStore, CredentialStore, KeywordStore, PostStore};
