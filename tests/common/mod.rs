//! Shared utilities for integration testing the admission pipeline.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use http_body_util::BodyExt;

use ledger_gateway::admission::maintenance::{StaticSettingsProvider, StaticTokenValidator};
use ledger_gateway::config::GatewayConfig;
use ledger_gateway::{build_admission_router, AppState};

/// Config with small ceilings so limits are reachable in tests.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.signup = 3;
    config.rate_limit.resend_verification = 2;
    config.csrf.secret = Some("integration-test-secret-32-bytes".to_string());
    config.admin.allowed_ips = vec!["203.0.113.10".to_string()];
    config.admin.token = Some("ops-break-glass".to_string());
    config
}

/// Stub business router standing in for the out-of-scope handlers.
fn inner_router() -> Router {
    async fn downstream() -> &'static str {
        "downstream ok"
    }

    Router::new()
        .route("/invoices", get(downstream).post(downstream))
        .route("/expenses", get(downstream).post(downstream).delete(downstream))
        .route("/admin/settings", get(downstream).post(downstream))
        .route("/webhooks/sns", post(downstream))
        .route("/auth/signup", post(downstream))
        .fallback(downstream)
}

/// Build the full pipeline around the stub router. Returns the settings
/// provider so tests can flip maintenance mode at runtime.
pub fn build_app(config: &GatewayConfig) -> (Router, Arc<StaticSettingsProvider>) {
    let settings = StaticSettingsProvider::from_config(&config.maintenance);
    let validator = StaticTokenValidator::new(config.admin.token.clone());
    let state = AppState::from_config(config, settings.clone(), validator);
    (build_admission_router(inner_router(), state), settings)
}

/// Request builder with the client IP pinned via an edge-proxy header.
pub fn request(method: &str, path: &str, client_ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("CF-Connecting-IP", client_ip)
        .body(Body::empty())
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Pull the `csrf-session` cookie value out of a Set-Cookie header.
#[allow(dead_code)]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let raw = response.headers().get("set-cookie")?.to_str().ok()?;
    let pair = raw.split(';').next()?;
    pair.strip_prefix("csrf-session=").map(str::to_string)
}
