//! Trigger matcher — turns bus events into workflow runs.
//!
//! The matcher holds a handful of coarse subscriptions.  For every event it
//! loads the ACTIVE event-triggered workflows, matches each workflow's
//! pattern against the event subject independently, and starts one run per
//! match.  A workflow whose pattern is malformed, or whose run cannot be
//! created, is logged and skipped; it never blocks the others.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use bus::subject::subject_matches;
use bus::{Event, MessageBus};
use db::models::{WorkflowRunRow, WorkflowStatus};
use db::Store;

use crate::models::parse_trigger;
use crate::{EngineError, Trigger, WorkflowExecutor};

/// Trigger recorded on runs started through the API.
pub const MANUAL_TRIGGER: &str = "manual";

/// A run that was created and handed to the executor.
#[derive(Debug)]
pub struct Dispatched {
    /// The run as created (PENDING).
    pub run: WorkflowRunRow,
    /// The executor task; completes when the run reaches a terminal state.
    pub handle: JoinHandle<()>,
}

pub struct TriggerMatcher {
    store: Arc<dyn Store>,
    bus: Arc<dyn MessageBus>,
    executor: Arc<WorkflowExecutor>,
    subjects: Vec<String>,
}

impl TriggerMatcher {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<dyn MessageBus>,
        executor: Arc<WorkflowExecutor>,
        subjects: Vec<String>,
    ) -> Self {
        Self { store, bus, executor, subjects }
    }

    /// Subscribe to every configured subject and handle events until the bus
    /// closes.
    ///
    /// # Errors
    /// Fails only if a subscription cannot be made.
    pub async fn listen(self: Arc<Self>) -> Result<(), EngineError> {
        let mut listeners = JoinSet::new();

        for subject in &self.subjects {
            let mut subscription = self.bus.subscribe(subject).await?;
            info!(subject = %subject, "listening for trigger events");

            let matcher = Arc::clone(&self);
            listeners.spawn(async move {
                while let Some(event) = subscription.next().await {
                    if let Err(e) = matcher.handle_event(&event).await {
                        error!(subject = %event.subject, error = %e, "failed to handle trigger event");
                    }
                }
                debug!(pattern = subscription.pattern(), "subscription closed");
            });
        }

        while let Some(joined) = listeners.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "trigger listener aborted");
            }
        }
        Ok(())
    }

    /// Start a run for every ACTIVE workflow whose pattern matches the event.
    #[instrument(skip_all, fields(subject = %event.subject))]
    pub async fn handle_event(&self, event: &Event) -> Result<Vec<Dispatched>, EngineError> {
        let workflows = self.store.list_active_event_workflows().await?;
        let mut dispatched = Vec::new();

        for workflow in workflows {
            let pattern = match parse_trigger(&workflow.trigger) {
                Ok(Trigger::Event { pattern }) => pattern,
                Ok(Trigger::Manual) => continue,
                Err(e) => {
                    warn!(workflow_id = %workflow.id, error = %e, "skipping workflow with unreadable trigger");
                    continue;
                }
            };

            match subject_matches(&pattern, &event.subject) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(workflow_id = %workflow.id, %pattern, error = %e, "skipping workflow with invalid pattern");
                    continue;
                }
            }

            let context = json!({
                "event": event.payload,
                "timestamp": event.timestamp.unwrap_or_else(Utc::now),
                "source": event.source,
            });
            let trigger = format!("event:{}", event.subject);

            match self.store.create_run(workflow.id, &trigger, context).await {
                Ok(run) => {
                    info!(workflow_id = %workflow.id, run_id = %run.id, %pattern, "event matched");
                    dispatched.push(self.dispatch(run));
                }
                Err(e) => {
                    warn!(workflow_id = %workflow.id, error = %e, "failed to create run");
                }
            }
        }

        Ok(dispatched)
    }

    /// Start a run on request.
    ///
    /// # Errors
    /// [`EngineError::WorkflowDisabled`] for DISABLED workflows.
    pub async fn start_manual_run(
        &self,
        workflow_id: Uuid,
        context: Value,
    ) -> Result<Dispatched, EngineError> {
        let workflow = self.store.get_workflow(workflow_id).await?;
        if workflow.status == WorkflowStatus::Disabled {
            return Err(EngineError::WorkflowDisabled(workflow_id));
        }

        let run = self.store.create_run(workflow_id, MANUAL_TRIGGER, context).await?;
        info!(%workflow_id, run_id = %run.id, "manual run created");
        Ok(self.dispatch(run))
    }

    fn dispatch(&self, run: WorkflowRunRow) -> Dispatched {
        let executor = Arc::clone(&self.executor);
        let run_id = run.id;
        let handle = tokio::spawn(async move {
            if let Err(e) = executor.run(run_id).await {
                debug!(%run_id, error = %e, "run ended with error");
            }
        });
        Dispatched { run, handle }
    }
}
