//! Axum router construction.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health_check,
        routes::relay::process_video,
        routes::relay::download,
        routes::queue::list_jobs,
        routes::queue::enqueue,
        routes::queue::process,
        routes::queue::get_job,
        routes::queue::retry_job,
        routes::queue::delete_job,
        routes::queue::clear_queue,
        routes::results::list_results,
        routes::results::delete_result,
        routes::results::clear_results,
        routes::tools::list_tools,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::relay::ProcessVideoResponse,
        routes::queue::EnqueueRequest,
        routes::queue::JobResponse,
        routes::queue::ArtifactResponse,
        routes::queue::ProcessResponse,
        routes::queue::ClearResponse,
        routes::results::ResultResponse,
        vf_av::ToolInfo,
    ))
)]
pub struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = usize::try_from(ctx.config.relay.max_upload_bytes()).unwrap_or(usize::MAX);

    // Relay surface, mounted at the root for existing clients.
    let relay = Router::new()
        .route(
            "/process-video",
            post(routes::relay::process_video).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Catch-all so traversal attempts reach the handler and get a 400.
        .route("/download/{*filename}", get(routes::relay::download));

    let api = Router::new()
        .route(
            "/queue",
            get(routes::queue::list_jobs)
                .post(routes::queue::enqueue)
                .delete(routes::queue::clear_queue),
        )
        .route("/queue/process", post(routes::queue::process))
        .route(
            "/queue/{id}",
            get(routes::queue::get_job).delete(routes::queue::delete_job),
        )
        .route("/queue/{id}/retry", post(routes::queue::retry_job))
        .route(
            "/results",
            get(routes::results::list_results).delete(routes::results::clear_results),
        )
        .route("/results/{id}", axum::routing::delete(routes::results::delete_result))
        .route("/events", get(routes::events::events_handler))
        .route("/tools", get(routes::tools::list_tools));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(relay)
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
