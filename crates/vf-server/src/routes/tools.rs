//! External tool availability.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;

/// GET /api/tools
#[utoipa::path(
    get,
    path = "/api/tools",
    responses((status = 200, description = "Tool availability", body = Vec<vf_av::ToolInfo>))
)]
pub async fn list_tools(State(ctx): State<AppContext>) -> Json<Vec<vf_av::ToolInfo>> {
    Json(ctx.tools.check_all().await)
}
