//! `engine` crate — domain models, DAG batch planning, input templates, the
//! approval gate, the DAG scheduler, and the event trigger matcher.

pub mod approval;
pub mod config;
pub mod dag;
pub mod error;
pub mod executor;
pub mod models;
pub mod template;
pub mod trigger;

pub use approval::{ApprovalConfig, ApprovalGate, APPROVAL_REQUESTED_SUBJECT};
pub use config::EngineConfig;
pub use dag::plan_batches;
pub use error::EngineError;
pub use executor::{ExecutorConfig, RunSummary, WorkflowExecutor};
pub use models::{Trigger, Workflow, WorkflowDefinition, WorkflowNode};
pub use trigger::{Dispatched, TriggerMatcher};
