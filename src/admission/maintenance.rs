//! Maintenance-mode circuit breaker.
//!
//! A two-state machine (normal, maintenance) owned entirely by the
//! external settings collaborator. The gate holds no local cache of the
//! flag and re-reads it on every mutating request: freshness over
//! throughput. Reads always pass; mutations outside the exempt prefixes
//! are blocked unless the caller presents a valid admin credential.
//!
//! A collaborator failure is neither an allow nor a silent block: it
//! surfaces as [`AdmissionError::Collaborator`] (HTTP 500) so a broken
//! settings source is visible instead of quietly failing open or closed.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;

use crate::admission::{path_has_prefix, strip_api_prefix};
use crate::config::schema::MaintenanceConfig;
use crate::http::response::{AdmissionError, CollaboratorError};
use crate::observability::metrics;

/// Request header carrying the admin credential during maintenance.
pub const ADMIN_TOKEN_HEADER: &str = "Admin-Token";

/// Maintenance flag and operator message, as reported by the settings
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceState {
    pub enabled: bool,
    pub message: String,
}

/// External settings source consulted per mutating request.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn maintenance_state(&self) -> Result<MaintenanceState, CollaboratorError>;
}

/// External admin-credential validator.
#[async_trait]
pub trait AdminTokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<bool, CollaboratorError>;
}

/// In-process settings provider backed by configuration, with a runtime
/// toggle for operational use and tests.
pub struct StaticSettingsProvider {
    state: RwLock<MaintenanceState>,
}

impl StaticSettingsProvider {
    pub fn from_config(config: &MaintenanceConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(MaintenanceState {
                enabled: config.enabled,
                message: config.message.clone(),
            }),
        })
    }

    pub fn set_enabled(&self, enabled: bool) {
        if let Ok(mut state) = self.state.write() {
            state.enabled = enabled;
        }
    }
}

#[async_trait]
impl SettingsProvider for StaticSettingsProvider {
    async fn maintenance_state(&self) -> Result<MaintenanceState, CollaboratorError> {
        self.state
            .read()
            .map(|state| state.clone())
            .map_err(|_| CollaboratorError("settings lock poisoned".to_string()))
    }
}

/// In-process validator accepting one configured token.
pub struct StaticTokenValidator {
    token: Option<String>,
}

impl StaticTokenValidator {
    pub fn new(token: Option<String>) -> Arc<Self> {
        Arc::new(Self { token })
    }
}

#[async_trait]
impl AdminTokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<bool, CollaboratorError> {
        Ok(self
            .token
            .as_ref()
            .is_some_and(|expected| bool::from(token.as_bytes().ct_eq(expected.as_bytes()))))
    }
}

/// The maintenance gate.
pub struct MaintenanceGate {
    settings: Arc<dyn SettingsProvider>,
    validator: Arc<dyn AdminTokenValidator>,
    /// Statically configured fallback credential, compared constant-time.
    fallback_token: Option<String>,
    exempt_prefixes: Vec<String>,
    api_prefix: String,
    default_message: String,
}

impl MaintenanceGate {
    pub fn new(
        config: &MaintenanceConfig,
        settings: Arc<dyn SettingsProvider>,
        validator: Arc<dyn AdminTokenValidator>,
        fallback_token: Option<String>,
        api_prefix: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            settings,
            validator,
            fallback_token,
            exempt_prefixes: config.exempt_prefixes.clone(),
            api_prefix: api_prefix.to_string(),
            default_message: config.message.clone(),
        })
    }

    /// Decide whether the request may proceed.
    pub async fn evaluate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<(), AdmissionError> {
        if !is_mutating(method) {
            return Ok(());
        }

        let path = strip_api_prefix(path, &self.api_prefix);
        if self
            .exempt_prefixes
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
        {
            return Ok(());
        }

        let state = self.settings.maintenance_state().await?;
        if !state.enabled {
            return Ok(());
        }

        if let Some(token) = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
            if self.validator.validate(token).await? {
                return Ok(());
            }
            if let Some(fallback) = &self.fallback_token {
                if bool::from(token.as_bytes().ct_eq(fallback.as_bytes())) {
                    return Ok(());
                }
            }
        }

        let message = if state.message.is_empty() {
            self.default_message.clone()
        } else {
            state.message
        };
        Err(AdmissionError::Maintenance { message })
    }
}

fn is_mutating(method: &Method) -> bool {
    *method == Method::POST
        || *method == Method::PUT
        || *method == Method::PATCH
        || *method == Method::DELETE
}

/// Middleware wrapping the eventual handler call.
pub async fn maintenance_middleware(
    State(gate): State<Arc<MaintenanceGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match gate
        .evaluate(request.method(), request.uri().path(), request.headers())
        .await
    {
        Ok(()) => next.run(request).await,
        Err(err) => {
            match &err {
                AdmissionError::Collaborator(source) => {
                    tracing::error!(
                        path = %request.uri().path(),
                        error = %source,
                        "Maintenance evaluation failed"
                    );
                }
                _ => {
                    tracing::warn!(
                        method = %request.method(),
                        path = %request.uri().path(),
                        "Request blocked by maintenance mode"
                    );
                }
            }
            metrics::record_denied("maintenance");
            err.into_response()
        }
    }
}
