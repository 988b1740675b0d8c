//! HTTP server setup and pipeline assembly.
//!
//! # Responsibilities
//! - Build the gate pipeline around an application-supplied inner router
//! - Wire up middleware (request ID, tracing, timeout)
//! - Spawn the store sweepers and stop them on shutdown
//! - Serve with graceful shutdown
//!
//! Gate order is fixed: classify → admin gate → rate limiter → CSRF
//! guard → maintenance gate → inner handler. Each gate either forwards
//! or short-circuits with a terminal response; none depends on another
//! beyond the classification attached to the request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admission::admin_gate::{admin_gate_middleware, AdminAllowlist};
use crate::admission::classifier::RouteClassifier;
use crate::admission::csrf::{csrf_middleware, CsrfGuard, InMemoryCsrfStore};
use crate::admission::maintenance::{
    maintenance_middleware, AdminTokenValidator, MaintenanceGate, SettingsProvider,
};
use crate::admission::rate_limit::{rate_limit_middleware, InMemoryRateLimitStore, RateLimiter};
use crate::admission::epoch_millis;
use crate::admission::sweep::spawn_sweeper;
use crate::config::GatewayConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::ErrorBody;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// The assembled gates, shared across the pipeline.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<RouteClassifier>,
    pub allowlist: Arc<AdminAllowlist>,
    pub limiter: Arc<RateLimiter>,
    pub csrf: Arc<CsrfGuard>,
    pub maintenance: Arc<MaintenanceGate>,
}

impl AppState {
    /// Build all gates from configuration with in-process stores.
    pub fn from_config(
        config: &GatewayConfig,
        settings: Arc<dyn SettingsProvider>,
        validator: Arc<dyn AdminTokenValidator>,
    ) -> Self {
        let api_prefix = config.routing.api_prefix.as_str();
        Self {
            classifier: RouteClassifier::new(&config.routing, &config.rate_limit),
            allowlist: AdminAllowlist::from_config(&config.admin),
            limiter: RateLimiter::new(
                Arc::new(InMemoryRateLimitStore::new()),
                config.rate_limit.window_secs,
            ),
            csrf: CsrfGuard::new(
                &config.csrf,
                Arc::new(InMemoryCsrfStore::new()),
                api_prefix,
                config.environment.is_production(),
            ),
            maintenance: MaintenanceGate::new(
                &config.maintenance,
                settings,
                validator,
                config.admin.token.clone(),
                api_prefix,
            ),
        }
    }
}

/// First gate: classify once, attach the result, record request metrics
/// when the response comes back.
pub async fn classify_middleware(
    State(classifier): State<Arc<RouteClassifier>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let classification = classifier.classify(request.uri().path(), request.method());
    let method = request.method().to_string();

    tracing::debug!(
        class = %classification.class,
        path = %request.uri().path(),
        "Classified request"
    );
    request.extensions_mut().insert(classification);

    let response = next.run(request).await;
    metrics::record_request(
        &method,
        response.status().as_u16(),
        classification.class.key(),
        start,
    );
    response
}

/// Wrap an inner router with the admission pipeline.
///
/// `Router::layer` makes the last-added layer the outermost, so gates
/// are added in reverse of their execution order.
pub fn build_admission_router(inner: Router, state: AppState) -> Router {
    inner
        .layer(middleware::from_fn_with_state(
            state.maintenance.clone(),
            maintenance_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.csrf.clone(),
            csrf_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.allowlist.clone(),
            admin_gate_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.classifier.clone(),
            classify_middleware,
        ))
}

/// HTTP server for the admission gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Assemble the pipeline around the given inner router.
    pub fn new(
        config: GatewayConfig,
        inner: Router,
        settings: Arc<dyn SettingsProvider>,
        validator: Arc<dyn AdminTokenValidator>,
    ) -> Self {
        let state = AppState::from_config(&config, settings, validator);

        let router = build_admission_router(inner, state.clone())
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer());

        Self {
            router,
            config,
            state,
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = Shutdown::new();
        self.spawn_sweepers(&shutdown);

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        shutdown.trigger();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_sweepers(&self, shutdown: &Shutdown) {
        let limiter = self.state.limiter.clone();
        spawn_sweeper(
            "rate_limit",
            self.config.rate_limit.sweep_interval_secs,
            shutdown.subscribe(),
            move || limiter.prune(epoch_millis()),
        );

        let csrf = self.state.csrf.clone();
        spawn_sweeper(
            "csrf",
            self.config.csrf.sweep_interval_secs,
            shutdown.subscribe(),
            move || csrf.prune(epoch_millis()),
        );
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Minimal inner router for the standalone binary: liveness plus a JSON
/// 404 fallback. Business routes are the embedding application's concern.
pub fn default_inner_router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .fallback(fallback_handler)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn fallback_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not Found".to_string(),
            message: format!("No route for {}", uri.path()),
            status_code: 404,
        }),
    )
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
