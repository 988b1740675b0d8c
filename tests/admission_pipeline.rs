//! Integration tests for the admission pipeline: classification, admin
//! allowlisting, rate limiting, and the maintenance circuit breaker,
//! driven through the fully assembled middleware stack.

mod common;

use axum::http::StatusCode;
use tower::ServiceExt;

use common::{body_json, build_app, request, test_config};

#[tokio::test]
async fn generic_route_passes_without_rate_headers() {
    let (app, _) = build_app(&test_config());

    let response = app
        .oneshot(request("GET", "/reports/aging", "203.0.113.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("X-RateLimit-Limit").is_none());
}

#[tokio::test]
async fn signup_requests_are_counted_and_capped() {
    let (app, _) = build_app(&test_config());

    for i in 1..=3u32 {
        let response = app
            .clone()
            .oneshot(request("POST", "/auth/signup", "203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "request {} should pass", i);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "3");
        assert_eq!(
            response.headers()["X-RateLimit-Remaining"],
            (3 - i).to_string().as_str()
        );
        assert!(response.headers().get("X-RateLimit-Reset").is_some());
    }

    let denied = app
        .clone()
        .oneshot(request("POST", "/auth/signup", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.headers()["X-RateLimit-Remaining"], "0");
    assert!(denied.headers().get("Retry-After").is_some());

    let body = body_json(denied).await;
    assert_eq!(body["error"], "Too Many Requests");
    assert_eq!(body["statusCode"], 429);
}

#[tokio::test]
async fn rate_limit_keys_are_isolated() {
    let (app, _) = build_app(&test_config());

    // Exhaust signup for one IP.
    for _ in 0..4 {
        app.clone()
            .oneshot(request("POST", "/auth/signup", "203.0.113.1"))
            .await
            .unwrap();
    }

    // A different IP on the same class still passes.
    let other_ip = app
        .clone()
        .oneshot(request("POST", "/auth/signup", "203.0.113.2"))
        .await
        .unwrap();
    assert_eq!(other_ip.status(), StatusCode::OK);

    // The same IP on a different class still passes.
    let other_class = app
        .clone()
        .oneshot(request("POST", "/api/auth/resend-verification", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(other_class.status(), StatusCode::OK);
}

#[tokio::test]
async fn api_prefix_is_stripped_before_classification() {
    let (app, _) = build_app(&test_config());

    let response = app
        .oneshot(request("POST", "/api/auth/signup", "203.0.113.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-RateLimit-Limit"], "3");
}

#[tokio::test]
async fn admin_route_denied_for_unlisted_ip() {
    let (app, _) = build_app(&test_config());

    let response = app
        .oneshot(request("GET", "/admin/settings", "198.51.100.99"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(body["statusCode"], 403);
}

#[tokio::test]
async fn admin_route_allows_loopback_and_configured_ips() {
    let (app, _) = build_app(&test_config());

    for ip in ["127.0.0.1", "203.0.113.10"] {
        let response = app
            .clone()
            .oneshot(request("GET", "/admin/settings", ip))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{} should be allowed", ip);
    }
}

#[tokio::test]
async fn admin_denial_wins_over_csrf_state() {
    let (app, _) = build_app(&test_config());

    // A POST with no CSRF token from a bad IP fails on the allowlist,
    // not on CSRF: the admin gate runs first.
    let response = app
        .oneshot(request("POST", "/admin/settings", "198.51.100.99"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Access restricted to approved addresses");
}

#[tokio::test]
async fn webhook_class_carries_its_own_ceiling() {
    let (app, _) = build_app(&test_config());

    let response = app
        .oneshot(request("POST", "/webhooks/sns", "203.0.113.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["X-RateLimit-Limit"], "120");
}

#[tokio::test]
async fn maintenance_blocks_mutations_until_credential_presented() {
    let (app, settings) = build_app(&test_config());

    // Normal mode: mutation passes.
    let response = app
        .clone()
        .oneshot(request("POST", "/expenses", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    settings.set_enabled(true);

    // Maintenance on: mutation blocked with the structured body.
    let blocked = app
        .clone()
        .oneshot(request("POST", "/expenses", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(blocked).await;
    assert_eq!(body["error"], "MAINTENANCE_MODE");
    assert_eq!(body["statusCode"], 503);

    // Reads bypass the gate entirely.
    let read = app
        .clone()
        .oneshot(request("GET", "/expenses", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(read.status(), StatusCode::OK);

    // A valid admin token lets the mutation through.
    let mut authorized = request("POST", "/expenses", "203.0.113.1");
    authorized
        .headers_mut()
        .insert("Admin-Token", "ops-break-glass".parse().unwrap());
    let response = app.clone().oneshot(authorized).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Exempt prefixes stay open for everyone.
    let exempt = app
        .oneshot(request("POST", "/auth/signup", "203.0.113.50"))
        .await
        .unwrap();
    assert_eq!(exempt.status(), StatusCode::OK);
}

#[tokio::test]
async fn maintenance_toggle_is_observed_per_request() {
    let (app, settings) = build_app(&test_config());

    settings.set_enabled(true);
    let blocked = app
        .clone()
        .oneshot(request("DELETE", "/expenses", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::SERVICE_UNAVAILABLE);

    settings.set_enabled(false);
    let allowed = app
        .oneshot(request("DELETE", "/expenses", "203.0.113.1"))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}
