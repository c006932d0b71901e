// src/api/mod.rs

//! HTTP/JSON admin surface (§6): a thin collaborator over the
//! [`Supervisor`]. Task CRUD, lifecycle actions, and log retrieval only —
//! no sync-engine logic lives here.

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post, put};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::TaskPatch;
use crate::errors::SyncError;
use crate::supervisor::Supervisor;

pub fn router(supervisor: Arc<Supervisor>) -> Router {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(get_task).put(update_task).delete(remove_task),
        )
        .route("/api/tasks/{id}/start", post(start_task))
        .route("/api/tasks/{id}/stop", post(stop_task))
        .route("/api/tasks/{id}/sync", post(sync_task))
        .route("/api/tasks/{id}/logs", get(get_logs))
        .route("/api/tasks/{id}/log_dates", get(get_log_dates))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(supervisor)
}

/// Maps [`SyncError`] onto the 4xx/5xx admin-surface error shape (§7
/// "Configuration errors at admin surface: 4xx with a short message; state
/// unchanged").
impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            SyncError::TaskRunning(_) => StatusCode::CONFLICT,
            SyncError::Config(_) | SyncError::Json(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateTaskBody {
    name: String,
    input_dir: String,
    output_dir: String,
    #[serde(default)]
    extensions: std::collections::HashSet<String>,
}

async fn list_tasks(State(supervisor): State<Arc<Supervisor>>) -> impl IntoResponse {
    Json(supervisor.get_all().await)
}

async fn get_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    match supervisor.get(&id).await {
        Some(task) => Json(task).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "Task not found" }))).into_response(),
    }
}

async fn create_task(
    State(supervisor): State<Arc<Supervisor>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<impl IntoResponse, SyncError> {
    let task = supervisor
        .add(body.name, body.input_dir, body.output_dir, body.extensions)
        .await?;
    Ok(Json(json!({ "task_id": task.task_id })))
}

async fn update_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<impl IntoResponse, SyncError> {
    supervisor.update(&id, patch).await?;
    Ok(Json(json!({ "success": true })))
}

async fn remove_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, SyncError> {
    supervisor.remove(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn start_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, SyncError> {
    let outcome = supervisor.start(&id).await?;
    Ok(Json(outcome))
}

async fn stop_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, SyncError> {
    let outcome = supervisor.stop(&id).await?;
    Ok(Json(outcome))
}

async fn sync_task(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, SyncError> {
    let outcome = supervisor.sync_now(&id).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    date: String,
}

async fn get_logs(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, SyncError> {
    if supervisor.get(&id).await.is_none() {
        return Err(SyncError::TaskNotFound(id));
    }
    let logs = supervisor.log_writer().read_logs(&id, &query.date);
    Ok(Json(json!({ "logs": logs })))
}

async fn get_log_dates(
    State(supervisor): State<Arc<Supervisor>>,
    AxumPath(id): AxumPath<String>,
) -> Result<impl IntoResponse, SyncError> {
    if supervisor.get(&id).await.is_none() {
        return Err(SyncError::TaskNotFound(id));
    }
    let dates = supervisor.log_writer().log_dates(&id);
    Ok(Json(json!({ "dates": dates })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn read_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn get_missing_task_returns_404() {
        let dir = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new(dir.path()).unwrap());
        let app = router(supervisor);

        let response = app
            .oneshot(Request::builder().uri("/api/tasks/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Task not found");
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let dir = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new(dir.path()).unwrap());
        let app = router(supervisor);

        let body = json!({
            "name": "demo",
            "input_dir": "/in",
            "output_dir": "/out",
            "extensions": ["png"]
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/api/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = read_json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }
}
