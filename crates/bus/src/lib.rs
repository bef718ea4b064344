//! `bus` crate — the message bus contract the engine publishes to and
//! subscribes on, plus an in-process implementation.
//!
//! Subjects are hierarchical, dot-separated names (`graph.file.updated`).
//! Subscriptions are made with a [`SubjectPattern`] using the `*` / `>`
//! wildcard grammar described in [`subject`].

pub mod error;
pub mod event;
pub mod memory;
pub mod subject;
pub mod traits;

pub use error::BusError;
pub use event::Event;
pub use memory::InMemoryBus;
pub use subject::SubjectPattern;
pub use traits::{MessageBus, Subscription};
