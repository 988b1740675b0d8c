//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → classifier.rs (semantic class + rate-limit ceiling, once per request)
//!     → admin_gate.rs (source-IP allowlist on admin routes)
//!     → rate_limit.rs (fixed-window counter per class and IP)
//!     → csrf.rs (token issuance on GET, verification on mutations)
//!     → maintenance.rs (circuit breaker for mutating traffic)
//!     → Pass to business handlers
//! ```
//!
//! # Design Decisions
//! - Linear pipeline of independent gates, each allow-or-terminate
//! - Gates share nothing but the classification attached to the request
//! - Denials never mutate state beyond the attempt already counted
//! - Keyed state lives behind store traits so a shared cache can replace
//!   the in-process maps

pub mod admin_gate;
pub mod classifier;
pub mod client_ip;
pub mod csrf;
pub mod maintenance;
pub mod rate_limit;
pub mod sweep;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in epoch milliseconds.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Strip `prefix` from `path` when it sits on a segment boundary.
/// `/api/auth` → `/auth`, but `/apiary` is untouched.
pub(crate) fn strip_api_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return path;
    }
    match path.strip_prefix(prefix) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Prefix match on path segment boundaries: `/admin` covers `/admin` and
/// `/admin/tenants` but not `/administrivia`.
pub(crate) fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
