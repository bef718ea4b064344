//! `api` crate — HTTP surface of the engine.
//!
//! Routes (all under `/api/v1`):
//!   GET    /workflows
//!   POST   /workflows
//!   GET    /workflows/:id
//!   GET    /workflows/:id/runs
//!   POST   /workflows/:id/runs          start a manual run (202)
//!   GET    /runs/:id                    run + agent runs
//!   GET    /approvals                   pending approvals
//!   POST   /approvals/:id/decision      approve / reject (409 once decided)
//!   POST   /events                      publish onto the bus

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

pub mod error;
pub mod handlers;

pub use error::ApiError;
pub use handlers::AppState;

use handlers::{approvals, events, runs, workflows};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/workflows", get(workflows::list).post(workflows::create))
        .route("/workflows/:id", get(workflows::get))
        .route(
            "/workflows/:id/runs",
            get(workflows::list_runs).post(workflows::start_run),
        )
        .route("/runs/:id", get(runs::get))
        .route("/approvals", get(approvals::list_pending))
        .route("/approvals/:id/decision", post(approvals::decide))
        .route("/events", post(events::publish));

    Router::new()
        .nest("/api/v1", v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use bus::{InMemoryBus, MessageBus};
    use db::models::{ApprovalStatus, CapabilityRow, NewWorkflow, RiskLevel, WorkflowStatus};
    use db::{MemoryStore, Store};
    use engine::{
        ApprovalConfig, ApprovalGate, ExecutorConfig, TriggerMatcher, WorkflowExecutor,
    };
    use sandbox::mock::MockBackend;
    use sandbox::{BreakerConfig, CircuitBreaker, GuardedBackend};

    use super::*;

    const AGENT: Uuid = Uuid::from_u128(7);

    async fn state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let bus = Arc::new(InMemoryBus::new());
        store
            .register_capability(CapabilityRow {
                agent_id: AGENT,
                agent_name: "echo-agent".into(),
                entry_reference: "echo".into(),
                action: "echo".into(),
                input_schema: Value::Null,
                output_schema: Value::Null,
                risk_level: RiskLevel::Low,
            })
            .await
            .unwrap();

        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig::default()));
        let backend = GuardedBackend::new(Arc::new(MockBackend::new()), breaker);
        let gate = ApprovalGate::new(store.clone(), bus.clone(), ApprovalConfig::default());
        let executor = Arc::new(WorkflowExecutor::new(
            store.clone(),
            backend,
            gate,
            ExecutorConfig::default(),
        ));
        let matcher = Arc::new(TriggerMatcher::new(
            store.clone(),
            bus.clone(),
            executor,
            Vec::new(),
        ));

        let state = AppState { store: store.clone(), bus, matcher };
        (state, store)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn definition(nodes: Value) -> Value {
        json!({
            "name": "echo twice",
            "trigger": { "type": "manual" },
            "status": "ACTIVE",
            "nodes": nodes
        })
    }

    #[tokio::test]
    async fn create_then_run_a_workflow() {
        let (state, store) = state().await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/workflows",
                definition(json!([
                    { "id": "a", "agent_id": AGENT, "action": "echo", "inputs": { "x": "{{context.x}}" } },
                    { "id": "b", "agent_id": AGENT, "action": "echo",
                      "inputs": { "y": "{{nodes.a.output.x}}" }, "depends_on": ["a"] }
                ])),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let workflow = body_json(response).await;
        let workflow_id = workflow["id"].as_str().unwrap().to_owned();
        assert_eq!(workflow["nodes"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/v1/workflows/{workflow_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/workflows/{workflow_id}/runs"),
                json!({ "context": { "x": 42 } }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let run = body_json(response).await;
        assert_eq!(run["trigger"], "manual");
        let run_id: Uuid = run["id"].as_str().unwrap().parse().unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !store.get_run(run_id).await.unwrap().status.is_terminal() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let response = app
            .oneshot(get_request(&format!("/api/v1/runs/{run_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["status"], "SUCCESS");
        let agent_runs = view["agent_runs"].as_array().unwrap();
        assert_eq!(agent_runs.len(), 2);
        assert_eq!(agent_runs[1]["input"], json!({ "y": 42 }));
    }

    #[tokio::test]
    async fn cyclic_definition_is_rejected() {
        let (state, _) = state().await;
        let response = router(state)
            .oneshot(json_request(
                "POST",
                "/api/v1/workflows",
                definition(json!([
                    { "id": "a", "agent_id": AGENT, "action": "echo", "depends_on": ["b"] },
                    { "id": "b", "agent_id": AGENT, "action": "echo", "depends_on": ["a"] }
                ])),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("cycle"));
    }

    #[tokio::test]
    async fn unknown_workflow_is_404() {
        let (state, _) = state().await;
        let response = router(state)
            .oneshot(get_request(&format!("/api/v1/workflows/{}", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disabled_workflow_cannot_be_started() {
        let (state, store) = state().await;
        let workflow = store
            .create_workflow(NewWorkflow {
                project_id: Uuid::nil(),
                name: "off".into(),
                trigger: json!({ "type": "manual" }),
                status: WorkflowStatus::Disabled,
            })
            .await
            .unwrap();

        let response = router(state)
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/workflows/{}/runs", workflow.id),
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn second_decision_conflicts() {
        let (state, store) = state().await;
        let workflow = store
            .create_workflow(NewWorkflow {
                project_id: Uuid::nil(),
                name: "gated".into(),
                trigger: json!({ "type": "manual" }),
                status: WorkflowStatus::Active,
            })
            .await
            .unwrap();
        let run = store.create_run(workflow.id, "manual", json!({})).await.unwrap();
        let approval = store.create_approval(run.id, "deploy").await.unwrap();
        let app = router(state);
        let uri = format!("/api/v1/approvals/{}/decision", approval.id);

        let pending = body_json(app.clone().oneshot(get_request("/api/v1/approvals")).await.unwrap()).await;
        assert_eq!(pending.as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &uri,
                json!({ "approved": true, "responded_by": "alice", "notes": "lgtm" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let decided = body_json(response).await;
        assert_eq!(decided["status"], "APPROVED");

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &uri,
                json!({ "approved": false, "responded_by": "mallory" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let stored = store.get_approval(approval.id).await.unwrap();
        assert_eq!(stored.status, ApprovalStatus::Approved);
        assert_eq!(stored.responded_by.as_deref(), Some("alice"));

        let response = app
            .oneshot(json_request(
                "POST",
                &format!("/api/v1/approvals/{}/decision", Uuid::new_v4()),
                json!({ "approved": true, "responded_by": "alice" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn events_are_published_and_malformed_subjects_refused() {
        let (state, _) = state().await;
        let mut subscription = state.bus.subscribe("graph.>").await.unwrap();
        let app = router(state);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/events",
                json!({ "type": "graph.file.updated", "payload": { "path": "a.rs" }, "source": "indexer" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = subscription.next().await.unwrap();
        assert_eq!(event.subject, "graph.file.updated");
        assert_eq!(event.source.as_deref(), Some("indexer"));
        assert!(event.timestamp.is_some());

        let response = app
            .oneshot(json_request("POST", "/api/v1/events", json!({ "type": "graph..x" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
