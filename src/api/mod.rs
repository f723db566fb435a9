use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::cli::globals::GlobalArgs;
use crate::gate::{self, GateConfig, GateState, Stores};
use crate::store::{PgStore, TracingAuditSink};

pub(crate) mod handlers;
// OpenAPI document wiring lives in openapi.rs.
mod openapi;

pub use openapi::ApiDoc;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Build the full router over a gate state. Every route goes through the
/// gating middleware; tests drive this directly over in-memory stores.
#[must_use]
pub fn app(state: Arc<GateState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health::health))
        .route("/api/auth/token", post(handlers::login::token))
        .route("/api/maintenance", get(handlers::maintenance::status))
        .route("/api/expenses", get(handlers::expenses::list_expenses))
        .route("/api/subscription", get(handlers::subscription::current))
        .route(
            "/api/subscription/renew",
            post(handlers::subscription::renew),
        )
        .route(
            "/api/superadmin/maintenance",
            get(handlers::superadmin::maintenance_status)
                .put(handlers::superadmin::set_maintenance),
        )
        .route(
            "/api/superadmin/users/:id/force-logout",
            post(handlers::superadmin::force_logout),
        )
        .route(
            "/api/superadmin/tenants/:id/suspend",
            post(handlers::superadmin::suspend_tenant),
        )
        .route(
            "/api/superadmin/tenants/:id/reinstate",
            post(handlers::superadmin::reinstate_tenant),
        )
        .layer(middleware::from_fn(gate::gate))
        .layer(Extension(state))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, dsn: String, frontend_url: &str, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgStore::new(pool));
    let stores = Stores {
        users: store.clone(),
        tenants: store.clone(),
        subscriptions: store.clone(),
        lockouts: store.clone(),
        config: store.clone(),
        audit: Arc::new(TracingAuditSink),
    };
    let config = GateConfig::new(
        globals.token_issuer.clone(),
        globals.token_audience.clone(),
    );
    let state = Arc::new(GateState::new(config, &globals.token_secret, stores));

    let cors = CorsLayer::new()
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-tenant-id"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_origin(AllowOrigin::exact(frontend_origin(frontend_url)?));

    let app = app(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(frontend_url).with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        let origin = frontend_origin("https://app.fakturi.dev/some/path")?;
        assert_eq!(origin, "https://app.fakturi.dev");
        Ok(())
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() -> Result<()> {
        let origin = frontend_origin("http://localhost:5173")?;
        assert_eq!(origin, "http://localhost:5173");
        Ok(())
    }

    #[test]
    fn frontend_origin_rejects_garbage() {
        assert!(frontend_origin("not a url").is_err());
    }
}
