//! REST transport: request schemas, validation, and route handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use uuid::Uuid;

use crate::error::{Error, JobError, StoreError, ValidationError};
use crate::job::{Job, JobSpec, TaskRegistry};
use crate::store::HistoryStore;
use crate::telemetry::TelemetryProvider;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub registry: TaskRegistry,
    pub store: HistoryStore,
    pub telemetry: Arc<dyn TelemetryProvider>,
}

/// Handler-level error wrapper mapping the domain taxonomy onto HTTP
/// status codes with a consistent JSON body.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] Error);

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(Error::Validation(e))
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        Self(Error::Job(e))
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(Error::Store(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Error::Job(JobError::NotFound { .. }) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Error::Store(StoreError::NotFound { .. })
            | Error::Store(StoreError::ArtifactMissing { .. }) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };
        let body = json!({ "error": self.0.to_string(), "code": code });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Request body for `POST /api/generate`. Field names and bounds match
/// the public API contract.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub negative_prompt: Option<String>,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_steps")]
    pub num_inference_steps: u32,
    #[serde(default = "default_true")]
    pub use_gpu: bool,
    pub seed: Option<u64>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default)]
    pub gpu_id: u32,
    #[serde(default)]
    pub guidance_scale: f32,
}

fn default_dimension() -> u32 {
    1024
}
fn default_steps() -> u32 {
    9
}
fn default_true() -> bool {
    true
}
fn default_batch_size() -> u32 {
    1
}

impl GenerateRequest {
    /// Validate the request and build the job spec. A rejected request
    /// never creates a job.
    pub fn into_spec(self) -> Result<JobSpec, ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        check_range("height", self.height, 256, 2048)?;
        check_range("width", self.width, 256, 2048)?;
        check_range("num_inference_steps", self.num_inference_steps, 1, 50)?;
        check_range("batch_size", self.batch_size, 1, 8)?;
        check_range("gpu_id", self.gpu_id, 0, 7)?;
        if !(0.0..=20.0).contains(&self.guidance_scale) {
            return Err(ValidationError::GuidanceOutOfRange {
                value: self.guidance_scale,
            });
        }

        Ok(JobSpec {
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            width: self.width,
            height: self.height,
            steps: self.num_inference_steps,
            use_gpu: self.use_gpu,
            gpu_id: self.gpu_id,
            seed: self.seed,
            batch_size: self.batch_size,
            guidance_scale: self.guidance_scale,
        })
    }
}

fn check_range(field: &'static str, value: u32, min: i64, max: i64) -> Result<(), ValidationError> {
    let value = i64::from(value);
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct TaskCreated {
    task_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page() -> usize {
    1
}
fn default_page_size() -> usize {
    20
}

/// POST /api/generate — submit a generation job, returns immediately.
async fn create_generation(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<TaskCreated>> {
    let spec = request.into_spec()?;
    let task_id = state.registry.submit(spec).await;
    Ok(Json(TaskCreated { task_id }))
}

/// GET /api/generate/{task_id} — poll a job by id.
async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    let job = state
        .registry
        .query(task_id)
        .await
        .ok_or(JobError::NotFound { id: task_id })?;
    Ok(Json(job))
}

/// GET /api/history — paginated results, newest first.
async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<impl IntoResponse> {
    let page = state.store.list(params.page, params.page_size).await?;
    Ok(Json(page))
}

/// GET /api/download/{image_id} — artifact bytes as a PNG attachment.
async fn download_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<Response> {
    let (record, bytes) = state.store.read_artifact(image_id).await?;
    let disposition = format!("attachment; filename=\"{}\"", record.filename);
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/png")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// DELETE /api/images/{image_id} — remove one record and its artifact.
async fn delete_image(
    State(state): State<AppState>,
    Path(image_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.store.remove(image_id).await?;
    Ok(Json(json!({
        "message": "Image deleted successfully",
        "image_id": image_id,
    })))
}

/// GET /api/images/latest — newest record plus its download URL.
async fn get_latest_image(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let record = state
        .store
        .latest()
        .await?
        .ok_or(StoreError::NotFound { id: Uuid::nil() })?;
    let mut body = serde_json::to_value(&record).unwrap_or_default();
    if let Some(map) = body.as_object_mut() {
        map.insert(
            "download_url".to_string(),
            json!(format!("/api/download/{}", record.id)),
        );
    }
    Ok(Json(body))
}

/// POST /api/history/cleanup — manual retention pass.
async fn cleanup_history(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.store.cleanup().await?;
    Ok(Json(json!({
        "message": "Cleanup completed",
        "deleted_count": report.deleted_count,
        "remaining_count": report.remaining_count,
    })))
}

/// GET /api/system/status — best-effort resource snapshot.
async fn system_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.telemetry.snapshot())
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "Atelier API" }))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Atelier API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
    }))
}

/// Build the service router with a CORS layer for the given origins.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/generate", post(create_generation))
        .route("/api/generate/{task_id}", get(get_task))
        .route("/api/history", get(get_history))
        .route("/api/history/cleanup", post(cleanup_history))
        .route("/api/download/{image_id}", get(download_image))
        .route("/api/images/latest", get(get_latest_image))
        .route("/api/images/{image_id}", delete(delete_image))
        .route("/api/system/status", get(system_status))
        .layer(cors)
        .with_state(state)
}
