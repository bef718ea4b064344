//! Approval gate — pauses one node until a human signs off.
//!
//! Protocol for a node with `approval_required`:
//! 1. create a PENDING `workflow_approvals` row and mark the run
//!    WAITING_APPROVAL;
//! 2. publish [`APPROVAL_REQUESTED_SUBJECT`] so a reviewer surface can
//!    render the request;
//! 3. poll the row until it is APPROVED, REJECTED, or the timeout passes.
//!    On timeout the row is rejected by `system` with the note `timeout`,
//!    unless a reviewer got there first.
//!
//! Only the calling node's future is suspended; siblings keep running.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use bus::{Event, MessageBus};
use db::models::{ApprovalStatus, RunStatus};
use db::Store;

use crate::EngineError;

/// Subject the gate announces pending decisions on.
pub const APPROVAL_REQUESTED_SUBJECT: &str = "workflow.approval.requested";

/// Responder recorded when the gate itself rejects a stale request.
pub const SYSTEM_RESPONDER: &str = "system";

/// Note recorded on a timed-out approval.
pub const TIMEOUT_NOTE: &str = "timeout";

/// Note recorded on approvals still pending when their run fails.
pub const RUN_FAILED_NOTE: &str = "run failed";

const PREVIEW_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    /// Move the run back to RUNNING once a node is approved.
    pub resume_running: bool,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(24 * 60 * 60),
            resume_running: true,
        }
    }
}

/// What the reviewer is asked to sign off.
#[derive(Debug, Clone, Copy)]
pub struct ApprovalRequest<'a> {
    pub run_id: Uuid,
    pub node_id: &'a str,
    pub agent_name: &'a str,
    pub action: &'a str,
    pub inputs: &'a Value,
}

pub struct ApprovalGate {
    store: Arc<dyn Store>,
    bus: Arc<dyn MessageBus>,
    config: ApprovalConfig,
}

impl ApprovalGate {
    pub fn new(store: Arc<dyn Store>, bus: Arc<dyn MessageBus>, config: ApprovalConfig) -> Self {
        Self { store, bus, config }
    }

    /// Block until the node is approved.
    ///
    /// # Errors
    /// [`EngineError::ApprovalRejected`] on rejection or timeout; the two are
    /// indistinguishable apart from the notes.
    #[instrument(skip_all, fields(run_id = %request.run_id, node_id = request.node_id))]
    pub async fn request(&self, request: ApprovalRequest<'_>) -> Result<(), EngineError> {
        let approval = self
            .store
            .create_approval(request.run_id, request.node_id)
            .await?;

        self.store
            .transition_run(
                request.run_id,
                &[RunStatus::Running, RunStatus::WaitingApproval],
                RunStatus::WaitingApproval,
                None,
            )
            .await?;

        let event = Event::new(
            APPROVAL_REQUESTED_SUBJECT,
            json!({
                "approvalId": approval.id,
                "workflowRunId": request.run_id,
                "nodeId": request.node_id,
                "agentName": request.agent_name,
                "action": request.action,
                "inputsPreview": preview(request.inputs),
            }),
        )
        .with_source("engine");
        if let Err(e) = self.bus.publish(event).await {
            // The row is still listed as pending, so reviewers can find it.
            error!(approval_id = %approval.id, error = %e, "failed to announce approval request");
        }

        info!(approval_id = %approval.id, "waiting for approval");
        self.wait(approval.id, request.node_id).await?;

        if self.config.resume_running {
            self.store
                .transition_run(
                    request.run_id,
                    &[RunStatus::WaitingApproval],
                    RunStatus::Running,
                    None,
                )
                .await?;
        }
        Ok(())
    }

    async fn wait(&self, approval_id: Uuid, node_id: &str) -> Result<(), EngineError> {
        let deadline = sleep_until(Instant::now() + self.config.timeout);
        tokio::pin!(deadline);

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let approval = self.store.get_approval(approval_id).await?;
                    match approval.status {
                        ApprovalStatus::Pending => continue,
                        ApprovalStatus::Approved => {
                            info!(%approval_id, responded_by = ?approval.responded_by, "approved");
                            return Ok(());
                        }
                        ApprovalStatus::Rejected => {
                            return Err(rejected(node_id, approval.notes));
                        }
                    }
                }
                _ = &mut deadline => {
                    warn!(%approval_id, "approval timed out");
                    let timed_out = self
                        .store
                        .resolve_approval(
                            approval_id,
                            ApprovalStatus::Rejected,
                            SYSTEM_RESPONDER,
                            Some(TIMEOUT_NOTE),
                        )
                        .await?;

                    if timed_out.is_some() {
                        return Err(rejected(node_id, Some(TIMEOUT_NOTE.to_owned())));
                    }

                    // A reviewer decided between the last poll and the deadline.
                    let approval = self.store.get_approval(approval_id).await?;
                    return match approval.status {
                        ApprovalStatus::Approved => Ok(()),
                        _ => Err(rejected(node_id, approval.notes)),
                    };
                }
            }
        }
    }
}

fn rejected(node_id: &str, notes: Option<String>) -> EngineError {
    EngineError::ApprovalRejected {
        node_id: node_id.to_owned(),
        notes: notes.unwrap_or_else(|| "rejected without notes".into()),
    }
}

/// Human-readable, bounded rendering of the resolved inputs.
fn preview(inputs: &Value) -> String {
    let rendered = serde_json::to_string_pretty(inputs).unwrap_or_else(|_| inputs.to_string());
    if rendered.chars().count() <= PREVIEW_LIMIT {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(PREVIEW_LIMIT).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus::InMemoryBus;
    use db::models::{NewWorkflow, WorkflowStatus};
    use db::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        bus: Arc<InMemoryBus>,
        run_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let wf = store
            .create_workflow(NewWorkflow {
                project_id: Uuid::new_v4(),
                name: "gated".into(),
                trigger: json!({ "type": "manual" }),
                status: WorkflowStatus::Active,
            })
            .await
            .unwrap();
        let run = store.create_run(wf.id, "manual", json!({})).await.unwrap();
        store
            .transition_run(run.id, &[RunStatus::Pending], RunStatus::Running, None)
            .await
            .unwrap();
        Fixture { store, bus: Arc::new(InMemoryBus::new()), run_id: run.id }
    }

    fn gate(f: &Fixture, config: ApprovalConfig) -> ApprovalGate {
        ApprovalGate::new(f.store.clone(), f.bus.clone(), config)
    }

    fn request(run_id: Uuid, inputs: &Value) -> ApprovalRequest<'_> {
        ApprovalRequest {
            run_id,
            node_id: "deploy",
            agent_name: "deployer",
            action: "apply_patch",
            inputs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn undecided_approval_times_out_as_rejection() {
        let f = fixture().await;
        let gate = gate(
            &f,
            ApprovalConfig {
                poll_interval: Duration::from_secs(5),
                timeout: Duration::from_secs(60),
                resume_running: true,
            },
        );

        let inputs = json!({ "patch": "diff" });
        let err = gate.request(request(f.run_id, &inputs)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ApprovalRejected { ref notes, .. } if notes == TIMEOUT_NOTE
        ));

        let approvals = f.store.list_pending_approvals().await.unwrap();
        assert!(approvals.is_empty());

        let run = f.store.get_run(f.run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::WaitingApproval);
    }

    #[tokio::test]
    async fn approval_resumes_and_flips_run_back_to_running() {
        let f = fixture().await;
        let gate = gate(
            &f,
            ApprovalConfig {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(30),
                resume_running: true,
            },
        );

        let mut announcements = f.bus.subscribe(APPROVAL_REQUESTED_SUBJECT).await.unwrap();
        let store = f.store.clone();
        let reviewer = tokio::spawn(async move {
            let event = announcements.next().await.expect("announcement");
            let approval_id: Uuid =
                serde_json::from_value(event.payload["approvalId"].clone()).unwrap();
            assert_eq!(event.payload["nodeId"], "deploy");
            assert_eq!(event.payload["agentName"], "deployer");
            assert!(event.payload["inputsPreview"].as_str().unwrap().contains("diff"));

            let run = store.get_run(event.payload["workflowRunId"].as_str().unwrap().parse().unwrap())
                .await
                .unwrap();
            assert_eq!(run.status, RunStatus::WaitingApproval);

            store
                .resolve_approval(approval_id, ApprovalStatus::Approved, "alice", Some("lgtm"))
                .await
                .unwrap();
        });

        let inputs = json!({ "patch": "diff" });
        gate.request(request(f.run_id, &inputs)).await.unwrap();
        reviewer.await.unwrap();

        let run = f.store.get_run(f.run_id).await.unwrap();
        assert_eq!(run.status, RunStatus::Running);
    }

    #[tokio::test]
    async fn rejection_carries_the_reviewer_notes() {
        let f = fixture().await;
        let gate = gate(
            &f,
            ApprovalConfig {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(30),
                resume_running: true,
            },
        );

        let store = f.store.clone();
        let reviewer = tokio::spawn(async move {
            loop {
                if let Some(pending) = store.list_pending_approvals().await.unwrap().pop() {
                    store
                        .resolve_approval(pending.id, ApprovalStatus::Rejected, "bob", Some("too risky"))
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let inputs = json!({});
        let err = gate.request(request(f.run_id, &inputs)).await.unwrap_err();
        reviewer.await.unwrap();

        match err {
            EngineError::ApprovalRejected { node_id, notes } => {
                assert_eq!(node_id, "deploy");
                assert_eq!(notes, "too risky");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn long_previews_are_truncated() {
        let big = json!({ "blob": "x".repeat(2000) });
        let p = preview(&big);
        assert_eq!(p.chars().count(), PREVIEW_LIMIT + 1);
        assert!(p.ends_with('…'));
    }
}
