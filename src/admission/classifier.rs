//! Route classification.
//!
//! Maps a request path to a semantic class and its rate-limit ceiling.
//! Classification is a pure function of configuration: no state, safe to
//! call concurrently, identical input always yields identical output.
//!
//! Rules are ordered and first-match-wins. The global API prefix (usually
//! `/api`) is stripped before matching so the same rules serve prefixed
//! and unprefixed deployments.

use std::sync::Arc;

use axum::http::Method;

use crate::config::schema::{RateLimitConfig, RoutingConfig};

/// Semantic class of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Signup,
    ForgotPassword,
    ResetPassword,
    VerifyEmail,
    ResendVerification,
    InviteLookup,
    InviteComplete,
    Webhook,
    Admin,
    Generic,
}

impl RouteClass {
    /// Stable key used in rate-limit bucket names and metrics labels.
    pub fn key(&self) -> &'static str {
        match self {
            RouteClass::Signup => "auth:signup",
            RouteClass::ForgotPassword => "auth:forgot",
            RouteClass::ResetPassword => "auth:reset",
            RouteClass::VerifyEmail => "auth:verify",
            RouteClass::ResendVerification => "auth:resend",
            RouteClass::InviteLookup => "invite:lookup",
            RouteClass::InviteComplete => "invite:complete",
            RouteClass::Webhook => "webhook:inbound",
            RouteClass::Admin => "admin",
            RouteClass::Generic => "generic",
        }
    }

    /// Rate-limit scope, separating budgets so one IP never shares a
    /// counter across unrelated classes. `None` means unlimited.
    pub fn scope(&self) -> Option<&'static str> {
        match self {
            RouteClass::Signup
            | RouteClass::ForgotPassword
            | RouteClass::ResetPassword
            | RouteClass::VerifyEmail
            | RouteClass::ResendVerification => Some("auth"),
            RouteClass::InviteLookup | RouteClass::InviteComplete => Some("invite"),
            RouteClass::Webhook => Some("webhook"),
            RouteClass::Admin | RouteClass::Generic => None,
        }
    }
}

impl std::fmt::Display for RouteClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Result of classifying one request. Attached to request extensions so
/// downstream gates classify exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: RouteClass,
    /// Requests allowed per window, `None` for unlimited classes.
    pub limit: Option<u32>,
}

/// Classifies request paths against the ordered rule list.
#[derive(Debug, Clone)]
pub struct RouteClassifier {
    api_prefix: String,
    limits: RateLimitConfig,
}

impl RouteClassifier {
    pub fn new(routing: &RoutingConfig, limits: &RateLimitConfig) -> Arc<Self> {
        Arc::new(Self {
            api_prefix: routing.api_prefix.clone(),
            limits: limits.clone(),
        })
    }

    /// Classify a request path and method.
    ///
    /// The method is accepted for parity with the gate contracts but the
    /// class is determined by path alone; method sensitivity lives in the
    /// CSRF and maintenance gates.
    pub fn classify(&self, path: &str, _method: &Method) -> Classification {
        let path = crate::admission::strip_api_prefix(path, &self.api_prefix);

        let (class, limit) = if path.starts_with("/auth/signup") || path.starts_with("/auth/register")
        {
            (RouteClass::Signup, Some(self.limits.signup))
        } else if path.starts_with("/auth/forgot-password") {
            (RouteClass::ForgotPassword, Some(self.limits.forgot_password))
        } else if path.starts_with("/auth/reset-password") {
            (RouteClass::ResetPassword, Some(self.limits.reset_password))
        } else if path.starts_with("/auth/verify-email") {
            (RouteClass::VerifyEmail, Some(self.limits.verify_email))
        } else if path.starts_with("/auth/resend-verification") {
            (
                RouteClass::ResendVerification,
                Some(self.limits.resend_verification),
            )
        } else if path.starts_with("/invitations/") {
            // Completing an invitation ends in a /register segment;
            // everything else under the prefix is a lookup.
            if path.trim_end_matches('/').ends_with("/register") {
                (RouteClass::InviteComplete, Some(self.limits.invite_complete))
            } else {
                (RouteClass::InviteLookup, Some(self.limits.invite_lookup))
            }
        } else if path.starts_with("/webhooks") {
            (RouteClass::Webhook, Some(self.limits.webhook))
        } else if path == "/admin" || path.starts_with("/admin/") {
            (RouteClass::Admin, None)
        } else {
            (RouteClass::Generic, None)
        };

        Classification { class, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Arc<RouteClassifier> {
        RouteClassifier::new(&RoutingConfig::default(), &RateLimitConfig::default())
    }

    #[test]
    fn classifies_auth_routes_with_limits() {
        let c = classifier();
        let m = Method::POST;

        assert_eq!(
            c.classify("/auth/signup", &m),
            Classification {
                class: RouteClass::Signup,
                limit: Some(5)
            }
        );
        assert_eq!(
            c.classify("/auth/forgot-password", &m).class,
            RouteClass::ForgotPassword
        );
        assert_eq!(c.classify("/auth/reset-password", &m).limit, Some(10));
        assert_eq!(c.classify("/auth/verify-email", &m).limit, Some(20));
        assert_eq!(c.classify("/auth/resend-verification", &m).limit, Some(3));
    }

    #[test]
    fn strips_api_prefix_before_matching() {
        let c = classifier();
        let m = Method::POST;
        assert_eq!(c.classify("/api/auth/signup", &m).class, RouteClass::Signup);
        assert_eq!(c.classify("/auth/signup", &m).class, RouteClass::Signup);
        // A path that merely shares characters with the prefix is untouched.
        assert_eq!(c.classify("/apiary", &m).class, RouteClass::Generic);
    }

    #[test]
    fn distinguishes_invite_lookup_from_complete() {
        let c = classifier();
        let m = Method::GET;
        assert_eq!(
            c.classify("/invitations/abc123", &m).class,
            RouteClass::InviteLookup
        );
        assert_eq!(
            c.classify("/invitations/abc123/register", &m).class,
            RouteClass::InviteComplete
        );
        assert_eq!(c.classify("/invitations/abc123", &m).limit, Some(8));
        assert_eq!(c.classify("/invitations/abc123/register", &m).limit, Some(5));
    }

    #[test]
    fn webhook_and_admin_classes() {
        let c = classifier();
        let m = Method::POST;
        assert_eq!(c.classify("/webhooks/sns", &m).limit, Some(120));
        assert_eq!(
            c.classify("/admin/tenants", &m),
            Classification {
                class: RouteClass::Admin,
                limit: None
            }
        );
        // Prefix match must not swallow unrelated paths.
        assert_eq!(c.classify("/administrivia", &m).class, RouteClass::Generic);
    }

    #[test]
    fn everything_else_is_generic_and_unlimited() {
        let c = classifier();
        let m = Method::GET;
        let result = c.classify("/invoices/42", &m);
        assert_eq!(result.class, RouteClass::Generic);
        assert_eq!(result.limit, None);
    }

    #[test]
    fn classification_is_idempotent() {
        let c = classifier();
        let m = Method::POST;
        let first = c.classify("/api/auth/signup", &m);
        let second = c.classify("/api/auth/signup", &m);
        assert_eq!(first, second);
    }

    #[test]
    fn scope_separates_budgets() {
        assert_eq!(RouteClass::Signup.scope(), Some("auth"));
        assert_eq!(RouteClass::InviteLookup.scope(), Some("invite"));
        assert_eq!(RouteClass::Webhook.scope(), Some("webhook"));
        assert_eq!(RouteClass::Generic.scope(), None);
    }
}
