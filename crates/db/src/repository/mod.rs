//! Repository functions — one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no domain types — pure SQL.  [`crate::PgStore`]
//! composes them into the [`crate::Store`] contract.

pub mod approvals;
pub mod capabilities;
pub mod runs;
pub mod workflows;
