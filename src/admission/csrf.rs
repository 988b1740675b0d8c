//! CSRF token issuance and verification.
//!
//! Tokens are bound to an anonymous browser session carried in an
//! `HttpOnly` cookie. A GET to a protected prefix mints a signed token
//! and returns it in a response header; mutating requests to the same
//! prefixes must echo the token back. Per session there is at most one
//! live token: reissue overwrites, never appends.
//!
//! Token format: payload `session:issued_at_ms:nonce`, signature
//! HMAC-SHA256 over the payload, token = base64(payload ":" hex(sig)).
//! Verification compares the presented token against the stored one with
//! a constant-time comparison; a token is never rotated on successful
//! use and stays valid until expiry or the next GET-triggered reissue.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::admission::{epoch_millis, path_has_prefix, strip_api_prefix};
use crate::config::schema::CsrfConfig;
use crate::http::response::AdmissionError;
use crate::observability::metrics;

type HmacSha256 = Hmac<Sha256>;

/// The single live anti-forgery token for one anonymous session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfRecord {
    pub token: String,
    pub expires_at_ms: u64,
}

/// Keyed storage for token records, one per session.
pub trait CsrfStore: Send + Sync {
    fn get(&self, session: &str) -> Option<CsrfRecord>;

    /// Store the record, overwriting any prior token for the session.
    fn put(&self, session: &str, record: CsrfRecord);

    fn remove(&self, session: &str);

    /// Drop expired records. Returns how many were removed.
    fn prune(&self, now_ms: u64) -> usize;

    fn len(&self) -> usize;
}

/// Process-local store on a sharded concurrent map.
#[derive(Default)]
pub struct InMemoryCsrfStore {
    records: DashMap<String, CsrfRecord>,
}

impl InMemoryCsrfStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CsrfStore for InMemoryCsrfStore {
    fn get(&self, session: &str) -> Option<CsrfRecord> {
        self.records.get(session).map(|r| r.value().clone())
    }

    fn put(&self, session: &str, record: CsrfRecord) {
        self.records.insert(session.to_string(), record);
    }

    fn remove(&self, session: &str) {
        self.records.remove(session);
    }

    fn prune(&self, now_ms: u64) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now_ms <= record.expires_at_ms);
        before.saturating_sub(self.records.len())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Generate a new anonymous session identifier (32 random bytes).
fn new_session_id() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex HMAC-SHA256 of the payload.
fn sign(secret: &[u8], payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Mint a signed token for the session at the given instant.
fn mint_token(secret: &[u8], session: &str, now_ms: u64) -> String {
    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    let payload = format!("{}:{}:{}", session, now_ms, hex::encode(nonce));
    let signature = sign(secret, &payload);
    URL_SAFE_NO_PAD.encode(format!("{}:{}", payload, signature))
}

/// The CSRF gate.
pub struct CsrfGuard {
    store: Arc<dyn CsrfStore>,
    secret: Vec<u8>,
    ttl_ms: u64,
    header_name: HeaderName,
    cookie_name: String,
    protected_prefixes: Vec<String>,
    api_prefix: String,
    secure_cookies: bool,
}

impl CsrfGuard {
    /// Build the guard. Without a configured secret a random one is
    /// generated, which means tokens do not survive a restart; config
    /// validation rejects that in production.
    pub fn new(
        config: &CsrfConfig,
        store: Arc<dyn CsrfStore>,
        api_prefix: &str,
        secure_cookies: bool,
    ) -> Arc<Self> {
        let secret = match &config.secret {
            Some(secret) => secret.as_bytes().to_vec(),
            None => {
                tracing::warn!(
                    "No CSRF secret configured; using an ephemeral secret, tokens will not survive restart"
                );
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                bytes.to_vec()
            }
        };

        Arc::new(Self {
            store,
            secret,
            ttl_ms: config.token_ttl_secs * 1000,
            header_name: HeaderName::from_bytes(config.header_name.to_lowercase().as_bytes())
                .unwrap_or(HeaderName::from_static("x-csrf-token")),
            cookie_name: config.cookie_name.clone(),
            protected_prefixes: config.protected_prefixes.clone(),
            api_prefix: api_prefix.to_string(),
            secure_cookies,
        })
    }

    /// Whether the path falls under a protected prefix.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = strip_api_prefix(path, &self.api_prefix);
        self.protected_prefixes
            .iter()
            .any(|prefix| path_has_prefix(path, prefix))
    }

    /// Mint and store a token for the session, invalidating any prior one.
    pub fn issue(&self, session: &str, now_ms: u64) -> String {
        let token = mint_token(&self.secret, session, now_ms);
        self.store.put(
            session,
            CsrfRecord {
                token: token.clone(),
                expires_at_ms: now_ms + self.ttl_ms,
            },
        );
        token
    }

    /// Verify a mutating request: session cookie and token header must
    /// both be present, the stored record live, and the tokens equal
    /// under constant-time comparison.
    pub fn verify(&self, headers: &HeaderMap, now_ms: u64) -> Result<(), AdmissionError> {
        let session = self
            .session_from_cookie(headers)
            .ok_or(AdmissionError::CsrfMissing)?;
        let presented = headers
            .get(&self.header_name)
            .and_then(|v| v.to_str().ok())
            .ok_or(AdmissionError::CsrfMissing)?;

        let record = self.store.get(&session).ok_or(AdmissionError::CsrfExpired)?;
        if now_ms > record.expires_at_ms {
            self.store.remove(&session);
            return Err(AdmissionError::CsrfExpired);
        }

        if bool::from(presented.as_bytes().ct_eq(record.token.as_bytes())) {
            Ok(())
        } else {
            Err(AdmissionError::CsrfInvalid)
        }
    }

    /// Drop expired records; called by the background sweeper.
    pub fn prune(&self, now_ms: u64) -> usize {
        self.store.prune(now_ms)
    }

    fn session_from_cookie(&self, headers: &HeaderMap) -> Option<String> {
        let cookies = headers.get(COOKIE)?.to_str().ok()?;
        for part in cookies.split(';') {
            let part = part.trim();
            if let Some(value) = part.strip_prefix(&format!("{}=", self.cookie_name)) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
        None
    }

    fn session_cookie(&self, session: &str) -> String {
        let secure = if self.secure_cookies { "; Secure" } else { "" };
        format!(
            "{}={}; HttpOnly{}; SameSite=Strict; Path=/; Max-Age={}",
            self.cookie_name,
            session,
            secure,
            self.ttl_ms / 1000
        )
    }
}

/// Middleware: issue on safe requests to protected prefixes, verify on
/// mutating ones, pass everything else through.
pub async fn csrf_middleware(
    State(guard): State<Arc<CsrfGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !guard.is_protected(request.uri().path()) {
        return next.run(request).await;
    }

    let method = request.method().clone();

    if method == Method::GET {
        let (session, is_new) = match guard.session_from_cookie(request.headers()) {
            Some(session) => (session, false),
            None => (new_session_id(), true),
        };
        let token = guard.issue(&session, epoch_millis());

        let mut response = next.run(request).await;
        if let Ok(value) = HeaderValue::from_str(&token) {
            response.headers_mut().insert(guard.header_name.clone(), value);
        }
        if is_new {
            if let Ok(value) = HeaderValue::from_str(&guard.session_cookie(&session)) {
                response.headers_mut().insert(SET_COOKIE, value);
            }
        }
        return response;
    }

    let mutating = method == Method::POST
        || method == Method::PUT
        || method == Method::PATCH
        || method == Method::DELETE;
    if !mutating {
        return next.run(request).await;
    }

    match guard.verify(request.headers(), epoch_millis()) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(
                path = %request.uri().path(),
                reason = %err,
                "CSRF verification failed"
            );
            metrics::record_denied("csrf");
            err.into_response()
        }
    }
}
