//! Configuration loading from disk and the environment.
//!
//! File values are parsed first, then the environment override surface is
//! applied on top: `ADMIN_ALLOWED_IPS`, `CSRF_SECRET`, `ADMIN_TOKEN`, and
//! one variable per rate-limit class. A rate override that is non-numeric
//! or not positive is ignored and the configured default stands.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file, apply environment overrides,
/// and validate the result.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults plus environment overrides only.
pub fn load_from_env() -> Result<GatewayConfig, ConfigError> {
    let mut config = GatewayConfig::default();
    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Apply the environment override surface on top of a parsed config.
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Ok(csv) = std::env::var("ADMIN_ALLOWED_IPS") {
        config.admin.allowed_ips = csv
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Ok(secret) = std::env::var("CSRF_SECRET") {
        if !secret.is_empty() {
            config.csrf.secret = Some(secret);
        }
    }

    if let Ok(token) = std::env::var("ADMIN_TOKEN") {
        if !token.is_empty() {
            config.admin.token = Some(token);
        }
    }

    let rl = &mut config.rate_limit;
    rl.signup = rate_override("SIGNUP_RATE_LIMIT", rl.signup);
    rl.forgot_password = rate_override("FORGOT_RATE_LIMIT", rl.forgot_password);
    rl.reset_password = rate_override("RESET_RATE_LIMIT", rl.reset_password);
    rl.verify_email = rate_override("VERIFY_RATE_LIMIT", rl.verify_email);
    rl.resend_verification = rate_override("RESEND_RATE_LIMIT", rl.resend_verification);
    rl.invite_lookup = rate_override("PUBLIC_INVITE_LOOKUP_RATE_LIMIT", rl.invite_lookup);
    rl.invite_complete = rate_override("PUBLIC_INVITE_COMPLETE_RATE_LIMIT", rl.invite_complete);
    rl.webhook = rate_override("WEBHOOK_SNS_RATE_LIMIT", rl.webhook);
}

/// Parse a rate-limit override variable. Non-numeric or non-positive
/// values leave the current ceiling untouched.
fn rate_override(var: &str, current: u32) -> u32 {
    let raw = match std::env::var(var) {
        Ok(v) => v,
        Err(_) => return current,
    };
    match raw.trim().parse::<i64>() {
        Ok(v) if v > 0 && v <= i64::from(u32::MAX) => v as u32,
        _ => {
            tracing::warn!(var = var, value = %raw, "Ignoring invalid rate limit override");
            current
        }
    }
}
