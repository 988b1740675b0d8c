//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! admission gateway. All types derive Serde traits for deserialization
//! from config files; every field has a default so a minimal config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the admission gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Deployment environment (development or production).
    pub environment: Environment,

    /// Global API prefix stripped before route classification.
    pub routing: RoutingConfig,

    /// Per-class rate limit ceilings.
    pub rate_limit: RateLimitConfig,

    /// CSRF token issuance and verification settings.
    pub csrf: CsrfConfig,

    /// Admin route access settings.
    pub admin: AdminConfig,

    /// Maintenance mode settings for the in-process settings provider.
    pub maintenance: MaintenanceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
///
/// Production tightens cookie flags (`Secure`) and requires a pinned
/// CSRF secret at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Routing configuration for the classifier.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Prefix stripped from paths before classification (e.g., "/api").
    pub api_prefix: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
        }
    }
}

/// Per-class rate limit ceilings, counted per client IP within one window.
///
/// Each ceiling can be overridden by its environment variable (see
/// `config::loader`); overrides that are non-numeric or not positive are
/// ignored in favor of the value here.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window size in seconds.
    pub window_secs: u64,

    /// Interval between background sweeps of expired entries.
    pub sweep_interval_secs: u64,

    pub signup: u32,
    pub forgot_password: u32,
    pub reset_password: u32,
    pub verify_email: u32,
    pub resend_verification: u32,
    pub invite_lookup: u32,
    pub invite_complete: u32,
    pub webhook: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            sweep_interval_secs: 30,
            signup: 5,
            forgot_password: 5,
            reset_password: 10,
            verify_email: 20,
            resend_verification: 3,
            invite_lookup: 8,
            invite_complete: 5,
            webhook: 120,
        }
    }
}

/// CSRF token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// HMAC signing secret. Required in production; in development a
    /// random secret is generated at startup when absent.
    pub secret: Option<String>,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Request/response header carrying the token.
    pub header_name: String,

    /// Cookie holding the anonymous session identifier.
    pub cookie_name: String,

    /// Route prefixes requiring token verification on mutating methods.
    pub protected_prefixes: Vec<String>,

    /// Interval between background sweeps of expired token records.
    pub sweep_interval_secs: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_secs: 3600,
            header_name: "X-CSRF-Token".to_string(),
            cookie_name: "csrf-session".to_string(),
            protected_prefixes: vec![
                "/admin".to_string(),
                "/auth/2fa".to_string(),
                "/auth/change-password".to_string(),
                "/settings".to_string(),
                "/customers".to_string(),
                "/invoices".to_string(),
                "/billing".to_string(),
            ],
            sweep_interval_secs: 60,
        }
    }
}

/// Admin route access settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    /// IP literals allowed on admin routes, in addition to loopback.
    /// The literal "0.0.0.0" allows any source address.
    pub allowed_ips: Vec<String>,

    /// Static fallback admin token accepted by the maintenance gate.
    pub token: Option<String>,
}

/// Maintenance mode settings backing the in-process settings provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Whether maintenance mode starts enabled.
    pub enabled: bool,

    /// Message returned to blocked callers.
    pub message: String,

    /// Path prefixes whose mutations are never blocked.
    pub exempt_prefixes: Vec<String>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            message: "The system is undergoing scheduled maintenance. Please try again later."
                .to_string(),
            exempt_prefixes: vec![
                "/auth".to_string(),
                "/health".to_string(),
                "/public".to_string(),
                "/admin".to_string(),
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.rate_limit.signup, 5);
        assert_eq!(config.rate_limit.webhook, 120);
        assert_eq!(config.csrf.cookie_name, "csrf-session");
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn environment_parses_lowercase() {
        let config: GatewayConfig = toml::from_str("environment = \"production\"").unwrap();
        assert!(config.environment.is_production());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [rate_limit]
            signup = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.rate_limit.signup, 50);
        assert_eq!(config.rate_limit.forgot_password, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
    }
}
