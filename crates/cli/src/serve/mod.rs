//! `testdeck serve` -- HTTP JSON API over the execution engine.
//!
//! Endpoints:
//! - GET  /health                       - Server status
//! - GET  /scenarios/{id}               - Scenario with its steps
//! - GET  /packages/{id}                - Package with its scenarios and steps
//! - PUT  /steps/{id}/status            - Record a step outcome and propagate it
//! - PUT  /scenarios/{id}/steps         - Replace a scenario's steps
//! - POST /scenarios/{id}/reconcile     - Re-run propagation for a scenario
//! - POST /scenarios/{id}/bugs          - Register a bug (scenario -> FAILED)
//! - GET  /scenarios/{id}/bugs          - Bugs of a scenario
//! - PUT  /bugs/{id}/status             - Change a bug's status
//! - POST /scenarios/{id}/history       - Append a history entry
//! - GET  /scenarios/{id}/history       - History of a scenario
//!
//! The acting user is read from the `X-User-Id` header. All responses use
//! Content-Type: application/json; errors are `{"error": message}`.

mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use testdeck_storage::{MemoryStorage, TestdeckStorage};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::handlers::{
    handle_add_history, handle_bug_status, handle_create_bug, handle_get_package,
    handle_get_scenario, handle_health, handle_list_bugs, handle_list_history, handle_not_found,
    handle_reconcile, handle_replace_steps, handle_step_status,
};
use self::state::AppState;
use crate::config::Config;
use crate::seed::{self, SeedError};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ServeError {
    #[error(transparent)]
    Seed(#[from] SeedError),
    #[error("could not serve on {addr}: {source}")]
    Io {
        addr: String,
        source: std::io::Error,
    },
}

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

/// Build the application router over `storage`.
pub(crate) fn router<S: TestdeckStorage>(storage: S, max_body_bytes: usize) -> Router {
    let state = Arc::new(AppState::new(storage));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/scenarios/{id}", get(handle_get_scenario::<S>))
        .route("/packages/{id}", get(handle_get_package::<S>))
        .route("/steps/{id}/status", put(handle_step_status::<S>))
        .route("/scenarios/{id}/steps", put(handle_replace_steps::<S>))
        .route("/scenarios/{id}/reconcile", post(handle_reconcile::<S>))
        .route(
            "/scenarios/{id}/bugs",
            post(handle_create_bug::<S>).get(handle_list_bugs::<S>),
        )
        .route("/bugs/{id}/status", put(handle_bug_status::<S>))
        .route(
            "/scenarios/{id}/history",
            post(handle_add_history::<S>).get(handle_list_history::<S>),
        )
        .fallback(handle_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Load the configured seed into a fresh in-memory store and serve until
/// Ctrl+C.
pub(crate) async fn start_server(config: Config) -> Result<(), ServeError> {
    let storage = MemoryStorage::new();
    if let Some(path) = &config.seed {
        let seed_file = seed::read_seed(path)?;
        let summary = seed::load_seed(&storage, &seed_file).await?;
        tracing::info!(path = %path.display(), %summary, "seed loaded");
    }

    let app = router(storage, config.server.max_body_bytes);
    let addr = config.server.addr();
    let io_err = |source| ServeError::Io {
        addr: addr.clone(),
        source,
    };

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(io_err)?;
    tracing::info!(%addr, "testdeck listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(io_err)?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
    tracing::info!("received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::seed::SeedFile;

    async fn app() -> Router {
        let seed: SeedFile = serde_json::from_value(json!({
            "users": [{"id": "ana", "name": "Ana", "email": "ana@example.com"}],
            "projects": [{"id": "p1", "name": "Shop"}],
            "packages": [{"id": "pkg1", "projectId": "p1", "name": "Release 1"}],
            "scenarios": [
                {
                    "id": "sc1", "projectId": "p1", "packageId": "pkg1", "title": "Checkout",
                    "steps": [
                        {"id": "st1", "action": "Add item", "expectedResult": "Item in cart"},
                        {"id": "st2", "action": "Pay", "expectedResult": "Receipt"}
                    ]
                },
                {"id": "sc2", "projectId": "p1", "title": "Search"}
            ]
        }))
        .unwrap();
        let storage = MemoryStorage::new();
        seed::load_seed(&storage, &seed).await.unwrap();
        router(storage, 64 * 1024)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        user: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("X-User-Id", user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_get_scenario_and_package() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/scenarios/sc1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "sc1");
        assert_eq!(body["steps"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, "GET", "/packages/pkg1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scenarios"][0]["id"], "sc1");

        let (status, body) = send(&app, "GET", "/scenarios/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "scenario 'nope' not found");
    }

    #[tokio::test]
    async fn test_blocking_steps_over_http_blocks_scenario() {
        let app = app().await;
        for step in ["st1", "st2"] {
            let (status, _) = send(
                &app,
                "PUT",
                &format!("/steps/{step}/status"),
                Some(json!({"status": "BLOCKED"})),
                Some("ana"),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (_, body) = send(&app, "GET", "/scenarios/sc1", None, None).await;
        assert_eq!(body["status"], "BLOCKED");
        let (_, body) = send(&app, "GET", "/packages/pkg1", None, None).await;
        assert_eq!(body["status"], "BLOCKED");

        let (_, body) = send(&app, "GET", "/scenarios/sc1/history", None, None).await;
        let entry = &body["history"][0];
        assert_eq!(entry["action"], "SCENARIO_BLOCKED");
        assert_eq!(entry["userId"], "ana");
        assert_eq!(entry["userName"], "Ana");
    }

    #[tokio::test]
    async fn test_step_status_response_is_the_updated_step() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "PUT",
            "/steps/st1/status",
            Some(json!({"status": "FAILED", "actualResult": "timeout"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "st1");
        assert_eq!(body["status"], "FAILED");
        assert_eq!(body["actualResult"], "timeout");
        assert_eq!(body["propagation"]["scenario"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_step_status_is_400() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "PUT",
            "/steps/st1/status",
            Some(json!({"status": "BLOQUEADO"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("PENDING, PASSED, FAILED, BLOCKED"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let app = app().await;
        let request = Request::builder()
            .method("PUT")
            .uri("/steps/st1/status")
            .header("content-type", "application/json")
            .body(Body::from("{\"status\":"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_step_is_404() {
        let app = app().await;
        let (status, _) = send(
            &app,
            "PUT",
            "/steps/ghost/status",
            Some(json!({"status": "PASSED"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_bug_fails_scenario() {
        let app = app().await;
        let (status, bug) = send(
            &app,
            "POST",
            "/scenarios/sc2/bugs",
            Some(json!({"title": "No results", "severity": "HIGH"})),
            Some("ana"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(bug["status"], "OPEN");
        assert_eq!(bug["createdBy"], "ana");

        let (_, scenario) = send(&app, "GET", "/scenarios/sc2", None, None).await;
        assert_eq!(scenario["status"], "FAILED");

        let (_, listed) = send(&app, "GET", "/scenarios/sc2/bugs", None, None).await;
        assert_eq!(listed["bugs"][0]["id"], bug["id"]);
    }

    #[tokio::test]
    async fn test_create_bug_validation() {
        let app = app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/scenarios/sc2/bugs",
            Some(json!({"title": "  ", "severity": "LOW"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/scenarios/sc2/bugs",
            Some(json!({"title": "x", "severity": "URGENT"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/scenarios/missing/bugs",
            Some(json!({"title": "x", "severity": "LOW"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bug_status_change() {
        let app = app().await;
        let (_, bug) = send(
            &app,
            "POST",
            "/scenarios/sc1/bugs",
            Some(json!({"title": "Typo", "severity": "LOW", "relatedStepId": "st1"})),
            None,
        )
        .await;
        let id = bug["id"].as_str().unwrap();
        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/bugs/{id}/status"),
            Some(json!({"status": "CLOSED"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "CLOSED");
    }

    #[tokio::test]
    async fn test_manual_history_defaults_to_system_user() {
        let app = app().await;
        let (status, entry) = send(
            &app,
            "POST",
            "/scenarios/sc2/history",
            Some(json!({"action": "COMMENT", "metadata": {"text": "looks fine"}})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["userId"], "system");
        assert_eq!(entry["metadata"]["text"], "looks fine");
        assert_eq!(entry["userName"], Value::Null);
    }

    #[tokio::test]
    async fn test_replace_steps_and_reconcile() {
        let app = app().await;
        let (status, body) = send(
            &app,
            "PUT",
            "/scenarios/sc2/steps",
            Some(json!({"steps": [{"action": "Type query", "expectedResult": "Suggestions"}]})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["steps"][0]["ordinal"], 1);
        assert_eq!(body["steps"][0]["status"], "PENDING");

        let (status, body) = send(&app, "POST", "/scenarios/sc2/reconcile", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"scenario": null, "package": null}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404_json() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/nowhere", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not found");
    }
}
