//! Deny taxonomy and its mapping onto HTTP responses.
//!
//! Every guard returns an explicit decision; nothing in the pipeline
//! surfaces a raw fault to the transport layer. Each deny carries a
//! machine-readable `code` so clients can distinguish refresh vs re-login
//! vs renewal flows.

use axum::http::{header::RETRY_AFTER, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Reason codes for blocking subscription states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionBlock {
    Expired,
    PastDue,
    Cancelled,
    Suspended,
}

impl SubscriptionBlock {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Expired => "subscription_expired",
            Self::PastDue => "subscription_past_due",
            Self::Cancelled => "subscription_cancelled",
            Self::Suspended => "subscription_suspended",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Deny {
    #[error("authentication required")]
    TokenMissing,
    #[error("token is invalid")]
    TokenInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error("session has been revoked, sign in again")]
    SessionRevoked,
    #[error("account suspended")]
    TenantSuspended,
    #[error("trial or account expired")]
    TenantExpired,
    #[error("subscription does not allow access")]
    SubscriptionBlocked(SubscriptionBlock),
    #[error("too many failed login attempts. Try again in {retry_after_seconds} seconds")]
    LockedOut { retry_after_seconds: i64 },
    #[error("platform is under maintenance")]
    Maintenance { message: Option<String> },
}

impl Deny {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::TokenMissing | Self::TokenInvalid | Self::TokenExpired | Self::SessionRevoked => {
                StatusCode::UNAUTHORIZED
            }
            Self::TenantSuspended | Self::TenantExpired => StatusCode::FORBIDDEN,
            Self::SubscriptionBlocked(_) => StatusCode::PAYMENT_REQUIRED,
            Self::LockedOut { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Maintenance { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TokenMissing => "token_missing",
            Self::TokenInvalid => "token_invalid",
            Self::TokenExpired => "token_expired",
            Self::SessionRevoked => "session_revoked",
            Self::TenantSuspended => "account_suspended",
            Self::TenantExpired => "account_expired",
            Self::SubscriptionBlocked(block) => block.code(),
            Self::LockedOut { .. } => "locked_out",
            Self::Maintenance { .. } => "maintenance",
        }
    }
}

impl IntoResponse for Deny {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        match &self {
            Deny::SubscriptionBlocked(_) => {
                body["redirect"] = json!("/billing/renew");
            }
            Deny::LockedOut {
                retry_after_seconds,
            } => {
                body["retryAfterSeconds"] = json!(retry_after_seconds);
            }
            Deny::Maintenance { message } => {
                body["maintenanceMode"] = json!(true);
                if let Some(message) = message {
                    body["message"] = json!(message);
                }
            }
            _ => {}
        }
        let mut response = (self.status(), Json(body)).into_response();
        if let Deny::LockedOut {
            retry_after_seconds,
        } = self
        {
            if let Ok(value) = retry_after_seconds.to_string().parse() {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Deny::TokenExpired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Deny::SessionRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(Deny::TenantSuspended.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            Deny::SubscriptionBlocked(SubscriptionBlock::PastDue).status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            Deny::LockedOut {
                retry_after_seconds: 60
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            Deny::Maintenance { message: None }.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn revoked_and_expired_have_distinct_codes() {
        assert_ne!(Deny::SessionRevoked.code(), Deny::TokenExpired.code());
    }

    #[test]
    fn lockout_message_tells_the_client_when_to_retry() {
        let deny = Deny::LockedOut {
            retry_after_seconds: 420,
        };
        assert!(deny.to_string().contains("Try again"));
    }
}
