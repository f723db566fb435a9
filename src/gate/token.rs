//! Bearer token issuance and verification.
//!
//! HS256 with a shared secret; issuer, audience and expiry are checked with
//! zero clock-skew leeway. Verification yields the typed [`Identity`];
//! nothing downstream touches raw claims again.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::models::{Role, User};

use super::context::{Identity, RequestContext};
use super::error::Deny;
use super::{Decision, Guard};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    /// Subject, the user id.
    sub: String,
    email: String,
    role: Role,
    tenant_id: i64,
    /// Session epoch at issue time; omitted claims (pre-epoch tokens) stay
    /// valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_epoch: Option<i64>,
    iss: String,
    aud: String,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

pub struct TokenAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
}

impl TokenAuthenticator {
    #[must_use]
    pub fn new(secret: &SecretString, issuer: String, audience: String) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer,
            audience,
        }
    }

    /// Issue a signed token for the user, valid for `ttl`.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn issue(
        &self,
        user: &User,
        ttl: Duration,
    ) -> anyhow::Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            tenant_id: user.claim_tenant_id(),
            session_epoch: Some(user.session_epoch),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok((token, expires_at))
    }

    /// Validate signature, issuer, audience and expiry, and produce the
    /// typed identity the rest of the pipeline works with.
    ///
    /// # Errors
    /// `TokenError::Expired` past `exp`; `TokenError::Invalid` for anything
    /// else (bad signature, wrong issuer/audience, malformed subject).
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            })?;

        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| TokenError::Invalid("non-numeric subject".to_string()))?;

        Ok(Identity {
            user_id,
            email: claims.email,
            role: claims.role,
            tenant_id: claims.tenant_id,
            session_epoch: claims.session_epoch,
        })
    }
}

#[async_trait]
impl Guard for TokenAuthenticator {
    fn name(&self) -> &'static str {
        "token_authenticator"
    }

    async fn evaluate(&self, ctx: &mut RequestContext) -> Decision {
        if ctx.is_public() {
            return Decision::Allow;
        }
        let Some(bearer) = ctx.bearer.as_deref() else {
            return Decision::Deny(Deny::TokenMissing);
        };
        match self.verify(bearer) {
            Ok(identity) => {
                ctx.identity = Some(identity);
                Decision::Allow
            }
            Err(TokenError::Expired) => Decision::Deny(Deny::TokenExpired),
            Err(TokenError::Invalid(reason)) => {
                tracing::debug!(reason, "rejected bearer token");
                Decision::Deny(Deny::TokenInvalid)
            }
        }
    }
}
