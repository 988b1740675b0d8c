//! Admin route access gate.
//!
//! Requests classified `admin` must originate from an allowlisted source
//! IP. The allowlist is assembled once at startup from the loopback
//! literals plus the configured list and never mutates afterwards.
//! Denial happens before any rate-limit accounting for the request.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::admission::classifier::{Classification, RouteClass};
use crate::admission::client_ip::extract_client_ip;
use crate::config::schema::AdminConfig;
use crate::http::response::AdmissionError;
use crate::observability::metrics;

/// Immutable set of IP literals allowed on admin routes.
#[derive(Debug)]
pub struct AdminAllowlist {
    entries: HashSet<String>,
    /// Set when the configured list contains "0.0.0.0" (allow any).
    allow_any: bool,
}

impl AdminAllowlist {
    /// Build the allowlist: loopback literals united with the configured
    /// entries. "0.0.0.0" is an explicit escape hatch meaning allow-any.
    pub fn from_config(config: &AdminConfig) -> Arc<Self> {
        let mut entries: HashSet<String> =
            ["127.0.0.1", "::1", "localhost"].iter().map(|s| s.to_string()).collect();
        let mut allow_any = false;

        for ip in &config.allowed_ips {
            if ip == "0.0.0.0" {
                allow_any = true;
            }
            entries.insert(ip.clone());
        }

        Arc::new(Self { entries, allow_any })
    }

    pub fn is_allowed(&self, client_ip: &str) -> bool {
        self.allow_any || self.entries.contains(client_ip)
    }
}

/// Middleware enforcing the allowlist on admin-classified requests.
pub async fn admin_gate_middleware(
    State(allowlist): State<Arc<AdminAllowlist>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let is_admin = request
        .extensions()
        .get::<Classification>()
        .is_some_and(|c| c.class == RouteClass::Admin);

    if !is_admin {
        return next.run(request).await;
    }

    let client_ip = extract_client_ip(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );

    if allowlist.is_allowed(&client_ip) {
        next.run(request).await
    } else {
        tracing::warn!(client_ip = %client_ip, path = %request.uri().path(), "Admin route denied");
        metrics::record_denied("admin_access");
        AdmissionError::IpNotAllowed { ip: client_ip }.into_response()
    }
}
