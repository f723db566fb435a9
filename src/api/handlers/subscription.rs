//! Subscription self-service. These routes bypass the subscription guard
//! (not the rest of the pipeline) so a blocked tenant can always reach its
//! own renewal flow.

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

use crate::gate::{compute_status, GateState, TenantScope};
use crate::store::models::{BillingCycle, SubscriptionStatus};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubscriptionResponse {
    pub plan: String,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub next_billing_at: Option<DateTime<Utc>>,
    pub blocking: bool,
}

fn tenant_for(scope: TenantScope) -> Result<i64, Response> {
    match scope {
        TenantScope::Tenant(id) => Ok(id),
        TenantScope::AllTenants => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "a tenant scope is required, set the X-Tenant-Id header",
                "code": "tenant_scope_required",
            })),
        )
            .into_response()),
    }
}

fn no_subscription() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "no subscription on file",
            "code": "no_subscription",
        })),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/subscription",
    responses(
        (status = 200, description = "Current subscription", body = SubscriptionResponse),
        (status = 404, description = "No subscription on file")
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
pub async fn current(
    Extension(state): Extension<Arc<GateState>>,
    Extension(scope): Extension<TenantScope>,
) -> Response {
    let tenant_id = match tenant_for(scope) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let subscription = match state.subscriptions().current_for_tenant(tenant_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => return no_subscription(),
        Err(err) => {
            error!("failed to load subscription: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    // Same lazy two-step as the guard: compute, then best-effort persist.
    let (status, changed) = compute_status(&subscription, Utc::now());
    if changed {
        if let Err(err) = state
            .subscriptions()
            .update_status(subscription.id, status)
            .await
        {
            warn!(
                subscription_id = subscription.id,
                "failed to persist subscription transition: {err:#}"
            );
        }
    }
    (
        StatusCode::OK,
        Json(SubscriptionResponse {
            plan: subscription.plan,
            status,
            billing_cycle: subscription.billing_cycle,
            trial_ends_at: subscription.trial_ends_at,
            expires_at: subscription.expires_at,
            next_billing_at: subscription.next_billing_at,
            blocking: status.is_blocking(),
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/subscription/renew",
    responses(
        (status = 200, description = "Subscription renewed"),
        (status = 404, description = "No subscription on file")
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
pub async fn renew(
    Extension(state): Extension<Arc<GateState>>,
    Extension(scope): Extension<TenantScope>,
) -> Response {
    let tenant_id = match tenant_for(scope) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let subscription = match state.subscriptions().current_for_tenant(tenant_id).await {
        Ok(Some(subscription)) => subscription,
        Ok(None) => return no_subscription(),
        Err(err) => {
            error!("failed to load subscription: {err:#}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    // Payment capture is an external collaborator; this endpoint records
    // the outcome of a successful renewal.
    let next_billing_at = subscription.billing_cycle.next_billing_after(Utc::now());
    if let Err(err) = state
        .subscriptions()
        .renew(subscription.id, next_billing_at)
        .await
    {
        error!(
            subscription_id = subscription.id,
            "failed to renew subscription: {err:#}"
        );
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        StatusCode::OK,
        Json(json!({
            "status": SubscriptionStatus::Active,
            "nextBillingAt": next_billing_at,
        })),
    )
        .into_response()
}
