//! Job queue route handlers.

use std::path::PathBuf;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use vf_core::{Error, JobId, Preset};
use vf_pipeline::{Artifact, Job};

use crate::context::AppContext;
use crate::error::AppError;

/// Request body for queueing files.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct EnqueueRequest {
    /// Server-side paths. One file queues in single mode, more in batch mode.
    pub files: Vec<String>,
    #[schema(value_type = Object)]
    pub preset: Preset,
    pub copies: u32,
}

/// One produced variant.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    pub name: String,
    pub location: String,
    pub size: u64,
    pub content_type: String,
    pub variant_index: usize,
    #[schema(value_type = Object)]
    pub parameters: serde_json::Value,
}

impl ArtifactResponse {
    pub fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            name: artifact.name.clone(),
            location: artifact.location.display().to_string(),
            size: artifact.size,
            content_type: artifact.content_type.clone(),
            variant_index: artifact.variant_index,
            parameters: serde_json::to_value(&artifact.parameters).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub kind: String,
    pub preset_name: String,
    pub copies: u32,
    pub mode: String,
    pub status: String,
    pub progress: u8,
    pub error: Option<String>,
    pub results: Option<Vec<ArtifactResponse>>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl JobResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.to_string(),
            file_name: job.source.file_name.clone(),
            file_path: job.source.path.display().to_string(),
            kind: job.source.kind.to_string(),
            preset_name: job.preset.name().to_string(),
            copies: job.copies,
            mode: job.mode.to_string(),
            status: job.status.to_string(),
            progress: job.progress,
            error: job.error.clone(),
            results: job
                .results
                .as_ref()
                .map(|r| r.iter().map(ArtifactResponse::from_artifact).collect()),
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            finished_at: job.finished_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProcessResponse {
    /// False when a run was already in progress.
    pub started: bool,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ClearResponse {
    pub removed: usize,
}

/// GET /api/queue
#[utoipa::path(
    get,
    path = "/api/queue",
    responses((status = 200, description = "All jobs in queue order", body = Vec<JobResponse>))
)]
pub async fn list_jobs(State(ctx): State<AppContext>) -> Json<Vec<JobResponse>> {
    Json(ctx.scheduler.jobs().iter().map(JobResponse::from_job).collect())
}

/// POST /api/queue
#[utoipa::path(
    post,
    path = "/api/queue",
    request_body = EnqueueRequest,
    responses(
        (status = 201, description = "Jobs queued", body = Vec<JobResponse>),
        (status = 400, description = "Invalid files, preset or copies")
    )
)]
pub async fn enqueue(
    State(ctx): State<AppContext>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ids = match payload.files.as_slice() {
        [] => return Err(Error::Validation("no files selected".into()).into()),
        [single] => vec![ctx
            .scheduler
            .enqueue(&PathBuf::from(single), payload.preset, payload.copies)?],
        many => {
            let paths: Vec<PathBuf> = many.iter().map(PathBuf::from).collect();
            ctx.scheduler
                .enqueue_batch(&paths, payload.preset, payload.copies)?
        }
    };

    let jobs: Vec<JobResponse> = ids
        .into_iter()
        .filter_map(|id| ctx.scheduler.job(id))
        .map(|job| JobResponse::from_job(&job))
        .collect();
    Ok((StatusCode::CREATED, Json(jobs)))
}

/// POST /api/queue/process
#[utoipa::path(
    post,
    path = "/api/queue/process",
    responses((status = 202, description = "Processing requested", body = ProcessResponse))
)]
pub async fn process(State(ctx): State<AppContext>) -> impl IntoResponse {
    let started = !ctx.scheduler.is_processing();
    if started {
        let scheduler = ctx.scheduler.clone();
        tokio::spawn(async move {
            let processed = scheduler.process_queue().await;
            tracing::debug!(processed, "queue run finished");
        });
    }
    (StatusCode::ACCEPTED, Json(ProcessResponse { started }))
}

/// GET /api/queue/{id}
#[utoipa::path(
    get,
    path = "/api/queue/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = JobResponse),
        (status = 404, description = "No such job")
    )
)]
pub async fn get_job(
    State(ctx): State<AppContext>,
    Path(id): Path<JobId>,
) -> Result<Json<JobResponse>, AppError> {
    let job = ctx
        .scheduler
        .job(id)
        .ok_or_else(|| Error::not_found("job", id))?;
    Ok(Json(JobResponse::from_job(&job)))
}

/// POST /api/queue/{id}/retry
#[utoipa::path(
    post,
    path = "/api/queue/{id}/retry",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job back in the queue", body = JobResponse),
        (status = 400, description = "Job is not in error"),
        (status = 404, description = "No such job")
    )
)]
pub async fn retry_job(
    State(ctx): State<AppContext>,
    Path(id): Path<JobId>,
) -> Result<Json<JobResponse>, AppError> {
    ctx.scheduler.retry(id)?;
    let job = ctx
        .scheduler
        .job(id)
        .ok_or_else(|| Error::not_found("job", id))?;
    Ok(Json(JobResponse::from_job(&job)))
}

/// DELETE /api/queue/{id}
#[utoipa::path(
    delete,
    path = "/api/queue/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job removed"),
        (status = 404, description = "No such job"),
        (status = 409, description = "Job is processing")
    )
)]
pub async fn delete_job(
    State(ctx): State<AppContext>,
    Path(id): Path<JobId>,
) -> Result<StatusCode, AppError> {
    ctx.scheduler.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/queue
#[utoipa::path(
    delete,
    path = "/api/queue",
    responses((status = 200, description = "Queue emptied", body = ClearResponse))
)]
pub async fn clear_queue(State(ctx): State<AppContext>) -> Json<ClearResponse> {
    Json(ClearResponse {
        removed: ctx.scheduler.clear(),
    })
}
