//! Admission denial responses.
//!
//! The four denial kinds are a closed enum so callers handle each case
//! exhaustively instead of branching on status codes. Every denial maps
//! to the same JSON body shape, `{error, message, statusCode}`, letting
//! clients branch on `statusCode` alone.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure reported by an external collaborator (settings provider or
/// admin-credential validator).
#[derive(Debug, Clone, thiserror::Error)]
#[error("collaborator failure: {0}")]
pub struct CollaboratorError(pub String);

/// Terminal admission decision against the current request.
///
/// None of these corrupt shared state: a denied request increments no
/// further counters and issues no tokens.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    /// Source IP is not on the admin allowlist.
    #[error("Access restricted to approved addresses")]
    IpNotAllowed { ip: String },

    /// Fixed-window ceiling exceeded for this (class, IP) key. The only
    /// retryable denial; `Retry-After` tells the caller when.
    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
    RateLimited {
        limit: u32,
        remaining: u32,
        reset_epoch_secs: u64,
        retry_after_secs: u64,
    },

    #[error("CSRF token missing")]
    CsrfMissing,

    #[error("CSRF token expired")]
    CsrfExpired,

    #[error("Invalid CSRF token")]
    CsrfInvalid,

    /// Maintenance mode is on and the caller holds no admin credential.
    #[error("{message}")]
    Maintenance { message: String },

    /// A collaborator failed while the gate was evaluating. Deliberately
    /// not swallowed into an allow or a deny; surfaces as a 500.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Uniform error body shared by all gates.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl AdmissionError {
    /// Short error code for the response body and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            AdmissionError::IpNotAllowed { .. } => "Forbidden",
            AdmissionError::RateLimited { .. } => "Too Many Requests",
            AdmissionError::CsrfMissing
            | AdmissionError::CsrfExpired
            | AdmissionError::CsrfInvalid => "Forbidden",
            AdmissionError::Maintenance { .. } => "MAINTENANCE_MODE",
            AdmissionError::Collaborator(_) => "Internal Server Error",
        }
    }

    /// Gate name for metrics and logs.
    pub fn gate(&self) -> &'static str {
        match self {
            AdmissionError::IpNotAllowed { .. } => "admin_access",
            AdmissionError::RateLimited { .. } => "rate_limit",
            AdmissionError::CsrfMissing
            | AdmissionError::CsrfExpired
            | AdmissionError::CsrfInvalid => "csrf",
            AdmissionError::Maintenance { .. } | AdmissionError::Collaborator(_) => "maintenance",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AdmissionError::IpNotAllowed { .. } => StatusCode::FORBIDDEN,
            AdmissionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AdmissionError::CsrfMissing
            | AdmissionError::CsrfExpired
            | AdmissionError::CsrfInvalid => StatusCode::FORBIDDEN,
            AdmissionError::Maintenance { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AdmissionError::Collaborator(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let message = match self {
            // Collaborator details stay in the logs, not the response.
            AdmissionError::Collaborator(_) => "Unable to evaluate request admission".to_string(),
            other => other.to_string(),
        };
        ErrorBody {
            error: self.error_code().to_string(),
            message,
            status_code: self.status_code().as_u16(),
        }
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();
        let mut response = (status, Json(body)).into_response();

        if let AdmissionError::RateLimited {
            limit,
            remaining,
            reset_epoch_secs,
            retry_after_secs,
        } = &self
        {
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", header_num(u64::from(*limit)));
            headers.insert("X-RateLimit-Remaining", header_num(u64::from(*remaining)));
            headers.insert("X-RateLimit-Reset", header_num(*reset_epoch_secs));
            headers.insert("Retry-After", header_num(*retry_after_secs));
        }

        response
    }
}

pub(crate) fn header_num(value: u64) -> HeaderValue {
    // Digits are always a valid header value.
    HeaderValue::from_str(&value.to_string()).expect("numeric header value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_shape_is_uniform() {
        let err = AdmissionError::CsrfMissing;
        let json = serde_json::to_string(&err.body()).unwrap();
        assert!(json.contains("\"error\":\"Forbidden\""));
        assert!(json.contains("\"message\":\"CSRF token missing\""));
        assert!(json.contains("\"statusCode\":403"));
    }

    #[test]
    fn rate_limited_response_carries_headers() {
        let err = AdmissionError::RateLimited {
            limit: 5,
            remaining: 0,
            reset_epoch_secs: 1_700_000_060,
            retry_after_secs: 42,
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["X-RateLimit-Limit"], "5");
        assert_eq!(response.headers()["X-RateLimit-Remaining"], "0");
        assert_eq!(response.headers()["Retry-After"], "42");
    }

    #[test]
    fn maintenance_uses_configured_message() {
        let err = AdmissionError::Maintenance {
            message: "back at noon".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "MAINTENANCE_MODE");
        assert_eq!(err.body().message, "back at noon");
    }

    #[test]
    fn collaborator_detail_is_not_leaked() {
        let err = AdmissionError::Collaborator(CollaboratorError("pg timeout on settings".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body().message, "Unable to evaluate request admission");
    }
}
