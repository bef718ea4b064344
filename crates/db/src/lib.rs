//! `db` crate — pure persistence layer.
//!
//! Provides typed row structs, the [`Store`] contract the engine persists
//! through, an in-memory store for tests and single-process use, and a
//! Postgres store built from per-table repository functions.  No business
//! logic lives here beyond the atomic status transitions the engine relies on.

pub mod error;
pub mod memory;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use pool::DbPool;
pub use store::Store;
