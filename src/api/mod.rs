//! HTTP interface surface: submit, fetch, list, cancel, and observe
//! executions, scoped by tenant.

use crate::{
    config::ApiConfig,
    executor::TaskExecutor,
    models::{ExecOptions, Execution, ExecutionStatus, ListFilter, Task},
    ForgeError, Result,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use chrono::DateTime;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

const SERVICE_NAME: &str = "forge-core";
const SERVICE_VERSION: &str = "0.1.0";

const ROUTE_HEALTH: &str = "/health";
const ROUTE_EXECUTE: &str = "/tenants/{tenant_id}/tasks/execute";
const ROUTE_EXECUTIONS: &str = "/tenants/{tenant_id}/executions";
const ROUTE_EXECUTION_BY_ID: &str = "/tenants/{tenant_id}/executions/{execution_id}";
const ROUTE_EXECUTION_STREAM: &str = "/tenants/{tenant_id}/executions/{execution_id}/stream";

const ERROR_INTERNAL_SERVER: &str = "Internal server error";

#[derive(Clone)]
pub struct ApiServer {
    config: ApiConfig,
    executor: Arc<TaskExecutor>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskRequest {
    pub task: Task,
    #[serde(default)]
    pub validate_output: Option<bool>,
    #[serde(default)]
    pub return_files: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTaskResponse {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution: Execution,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListExecutionsResponse {
    pub executions: Vec<Execution>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<String>,
    pub task_type: Option<String>,
    /// RFC3339 lower bound on the execution start time.
    pub since: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
            details: None,
        }),
    )
}

fn map_error(e: &ForgeError) -> ApiError {
    match e {
        ForgeError::InvalidInput(message) => bad_request(message.clone()),
        ForgeError::InvalidState(message) => bad_request(message.clone()),
        ForgeError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Not found".to_string(),
                details: Some(what.clone()),
            }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: ERROR_INTERNAL_SERVER.to_string(),
                details: None,
            }),
        ),
    }
}

impl ApiServer {
    pub fn new(config: ApiConfig, executor: Arc<TaskExecutor>) -> Self {
        Self { config, executor }
    }

    pub async fn run(&self) -> Result<()> {
        let app = self.build_router();

        let listener =
            tokio::net::TcpListener::bind(format!("{}:{}", self.config.host, self.config.port))
                .await
                .map_err(|e| ForgeError::Internal(e.into()))?;

        info!(
            "API server listening on {}:{}",
            self.config.host, self.config.port
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| ForgeError::Internal(e.into()))?;

        Ok(())
    }

    pub fn build_router(&self) -> Router {
        let cors_layer = CorsLayer::new()
            .allow_origin(
                self.config
                    .allowed_origins
                    .iter()
                    .filter_map(|origin| origin.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
            .max_age(Duration::from_secs(3600));

        Router::new()
            .route(ROUTE_HEALTH, get(health_check))
            .route(ROUTE_EXECUTE, post(execute_task))
            .route(ROUTE_EXECUTIONS, get(list_executions))
            .route(ROUTE_EXECUTION_BY_ID, get(get_execution))
            .route(ROUTE_EXECUTION_BY_ID, delete(cancel_execution))
            .route(ROUTE_EXECUTION_STREAM, get(stream_execution))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors_layer),
            )
            .with_state(self.clone())
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION
    }))
}

/// Accepts a task for asynchronous execution; 202 with the execution id.
async fn execute_task(
    State(server): State<ApiServer>,
    Path(tenant_id): Path<String>,
    Json(request): Json<ExecuteTaskRequest>,
) -> std::result::Result<(StatusCode, Json<ExecuteTaskResponse>), ApiError> {
    let mut task = request.task;
    task.tenant_id = tenant_id;

    let options = ExecOptions {
        validate_output: request.validate_output.unwrap_or(false),
        return_files: request.return_files.unwrap_or(false),
    };

    match server.executor.submit(task, options).await {
        Ok(receipt) => Ok((
            StatusCode::ACCEPTED,
            Json(ExecuteTaskResponse {
                execution_id: receipt.execution_id,
                status: receipt.status,
                message: "task accepted for execution".to_string(),
            }),
        )),
        Err(e @ ForgeError::InvalidInput(_)) => Err(map_error(&e)),
        Err(e) => {
            warn!(error = %e, "task submission failed");
            Err(map_error(&e))
        }
    }
}

async fn get_execution(
    State(server): State<ApiServer>,
    Path((tenant_id, execution_id)): Path<(String, String)>,
) -> std::result::Result<Json<ExecutionResponse>, ApiError> {
    match server.executor.get(&execution_id, &tenant_id).await {
        Ok(execution) => Ok(Json(ExecutionResponse { execution })),
        Err(e) => Err(map_error(&e)),
    }
}

async fn list_executions(
    State(server): State<ApiServer>,
    Path(tenant_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> std::result::Result<Json<ListExecutionsResponse>, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<ExecutionStatus>()
                .map_err(|e| bad_request(e))?,
        ),
        None => None,
    };
    let since = match query.since.as_deref() {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.to_utc())
                .map_err(|_| bad_request(format!("invalid since timestamp: {raw}")))?,
        ),
        None => None,
    };

    let filter = ListFilter {
        status,
        task_type: query.task_type,
        since,
        limit: query.limit.unwrap_or(crate::constants::DEFAULT_LIST_LIMIT),
        offset: query.offset.unwrap_or(0),
    };

    let (executions, total) = server.executor.list(&tenant_id, &filter).await;
    Ok(Json(ListExecutionsResponse { executions, total }))
}

async fn cancel_execution(
    State(server): State<ApiServer>,
    Path((tenant_id, execution_id)): Path<(String, String)>,
) -> std::result::Result<Json<CancelResponse>, ApiError> {
    match server.executor.cancel(&execution_id, &tenant_id).await {
        Ok(()) => Ok(Json(CancelResponse {
            success: true,
            message: format!("execution {execution_id} canceled"),
        })),
        Err(e) => Err(map_error(&e)),
    }
}

/// Server-sent events: a `connected` event, then periodic `status` frames,
/// then one final `complete` frame carrying the terminal record.
async fn stream_execution(
    State(server): State<ApiServer>,
    Path((tenant_id, execution_id)): Path<(String, String)>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, ApiError>
{
    let snapshots = server
        .executor
        .observe(&execution_id, &tenant_id)
        .await
        .map_err(|e| map_error(&e))?;

    let connected = futures::stream::once({
        let execution_id = execution_id.clone();
        async move {
            Ok::<Event, Infallible>(Event::default().event("connected").data(
                serde_json::json!({ "executionId": execution_id }).to_string(),
            ))
        }
    });

    let frames = snapshots.map(|execution| {
        let name = if execution.status.is_terminal() {
            "complete"
        } else {
            "status"
        };
        let data = serde_json::to_string(&execution).unwrap_or_else(|_| "{}".to_string());
        Ok::<Event, Infallible>(Event::default().event(name).data(data))
    });

    Ok(Sse::new(connected.chain(frames))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
