//! Aggregated result route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use vf_core::{ResultId, ResultSource};
use vf_pipeline::GlobalResult;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::queue::{ArtifactResponse, ClearResponse};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListResultsParams {
    /// "single" or "batch"; omitted lists everything.
    #[param(value_type = Option<String>)]
    pub source: Option<ResultSource>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ResultResponse {
    pub id: String,
    pub source: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub artifact: ArtifactResponse,
}

impl ResultResponse {
    fn from_result(result: &GlobalResult) -> Self {
        Self {
            id: result.id.to_string(),
            source: result.source.to_string(),
            timestamp: result.timestamp.to_rfc3339(),
            artifact: ArtifactResponse::from_artifact(&result.artifact),
        }
    }
}

/// GET /api/results
#[utoipa::path(
    get,
    path = "/api/results",
    params(ListResultsParams),
    responses((status = 200, description = "Results in insertion order", body = Vec<ResultResponse>))
)]
pub async fn list_results(
    State(ctx): State<AppContext>,
    Query(params): Query<ListResultsParams>,
) -> Json<Vec<ResultResponse>> {
    let results = match params.source {
        Some(source) => ctx.aggregator.by_source(source),
        None => ctx.aggregator.list(),
    };
    Json(results.iter().map(ResultResponse::from_result).collect())
}

/// DELETE /api/results/{id}
#[utoipa::path(
    delete,
    path = "/api/results/{id}",
    params(("id" = String, Path, description = "Result ID")),
    responses(
        (status = 204, description = "Result removed"),
        (status = 404, description = "No such result")
    )
)]
pub async fn delete_result(
    State(ctx): State<AppContext>,
    Path(id): Path<ResultId>,
) -> Result<StatusCode, AppError> {
    ctx.aggregator.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/results
#[utoipa::path(
    delete,
    path = "/api/results",
    responses((status = 200, description = "All results dropped", body = ClearResponse))
)]
pub async fn clear_results(State(ctx): State<AppContext>) -> Json<ClearResponse> {
    Json(ClearResponse {
        removed: ctx.aggregator.clear(),
    })
}
