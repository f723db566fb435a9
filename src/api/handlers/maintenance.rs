use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use tracing::error;

use crate::gate::GateState;

/// Public probe so clients can render a maintenance page without a token.
#[utoipa::path(
    get,
    path = "/api/maintenance",
    responses(
        (status = 200, description = "Maintenance status")
    ),
    tag = "maintenance"
)]
pub async fn status(Extension(state): Extension<Arc<GateState>>) -> impl IntoResponse {
    match state.config_store().maintenance().await {
        Ok(flag) => (
            StatusCode::OK,
            Json(json!({
                "maintenanceMode": flag.enabled,
                "message": flag.message,
            })),
        )
            .into_response(),
        Err(err) => {
            error!("failed to read maintenance flag: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
