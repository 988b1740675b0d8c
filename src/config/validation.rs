//! Configuration validation.
//!
//! Semantic checks that serde cannot express: address syntax, positive
//! durations, well-formed prefix lists, and the production requirement
//! that the CSRF secret is pinned externally. All errors are collected
//! and returned together rather than failing on the first.

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::GatewayConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    BadBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    BadMetricsAddress(String),

    #[error("rate_limit.window_secs must be positive")]
    ZeroWindow,

    #[error("csrf.token_ttl_secs must be positive")]
    ZeroTokenTtl,

    #[error("csrf.secret must be set in production (ephemeral secrets do not survive restarts)")]
    MissingProductionSecret,

    #[error("admin.allowed_ips entry '{0}' is not an IP literal")]
    BadAllowlistEntry(String),

    #[error("prefix '{0}' must start with '/'")]
    BadPrefix(String),
}

/// Validate a parsed configuration. Pure function; returns every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }

    if config.csrf.token_ttl_secs == 0 {
        errors.push(ValidationError::ZeroTokenTtl);
    }

    if config.environment.is_production() && config.csrf.secret.is_none() {
        errors.push(ValidationError::MissingProductionSecret);
    }

    for entry in &config.admin.allowed_ips {
        // "localhost" and the allow-any escape hatch are accepted literals.
        if entry != "localhost" && entry != "0.0.0.0" && entry.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::BadAllowlistEntry(entry.clone()));
        }
    }

    for prefix in config
        .csrf
        .protected_prefixes
        .iter()
        .chain(&config.maintenance.exempt_prefixes)
    {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::BadPrefix(prefix.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
