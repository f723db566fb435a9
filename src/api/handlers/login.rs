//! Credential exchange.
//!
//! Flow Overview:
//! 1) Check the lockout guard before touching the password.
//! 2) Verify the password off the async runtime.
//! 3) Record a failure only after verification fails; clear the record on
//!    success.
//! 4) Issue a signed token carrying the user's current session epoch.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::gate::{Deny, GateState};
use crate::store::models::Role;
use crate::store::password;

use super::{is_valid_email, normalize_email};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Role,
    pub tenant_id: i64,
    pub display_name: String,
    pub branch_ids: Vec<i64>,
}

fn invalid_credentials() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "invalid email or password",
            "code": "invalid_credentials",
        })),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many failed attempts")
    ),
    tag = "auth"
)]
pub async fn token(
    Extension(state): Extension<Arc<GateState>>,
    Json(payload): Json<TokenRequest>,
) -> Response {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return invalid_credentials();
    }

    // Lock status is checked before any password work.
    if let Some(retry_after_seconds) = state.lockout().is_locked_out(&email).await {
        return Deny::LockedOut {
            retry_after_seconds,
        }
        .into_response();
    }

    let user = match state.users().find_by_email(&email).await {
        Ok(user) => user,
        Err(err) => {
            error!("failed to look up user for login: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let Some(user) = user else {
        // Unknown emails count toward lockout too, so probing and guessing
        // look the same to a client.
        state.lockout().record_failed_attempt(&email).await;
        return invalid_credentials();
    };

    let password_input = payload.password;
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || {
        password::verify_password(&password_input, &hash)
    })
    .await;
    let verified = match verified {
        Ok(Ok(verified)) => verified,
        Ok(Err(err)) => {
            error!(user_id = user.id, "password verification error: {err:#}");
            false
        }
        Err(err) => {
            error!("password verification task failed: {err}");
            false
        }
    };
    if !verified {
        state.lockout().record_failed_attempt(&email).await;
        return invalid_credentials();
    }

    state.lockout().clear_attempts(&email).await;

    let ttl = state.config().token_ttl(payload.remember_me);
    let (token, expires_at) = match state.authenticator().issue(&user, ttl) {
        Ok(issued) => issued,
        Err(err) => {
            error!("failed to issue token: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if let Err(err) = state.users().record_login(user.id, Utc::now()).await {
        warn!(user_id = user.id, "failed to record last login: {err:#}");
    }

    (
        StatusCode::OK,
        Json(TokenResponse {
            token,
            expires_at,
            role: user.role,
            tenant_id: user.claim_tenant_id(),
            display_name: user.display_name,
            branch_ids: user.branch_ids,
        }),
    )
        .into_response()
}
