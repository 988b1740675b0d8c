//! Ledger Gateway — request admission pipeline
//!
//! The protection layer every inbound request passes through before it
//! reaches the accounting backend's business handlers.
//!
//! # Architecture Overview
//!
//! ```text
//! Client Request
//!     │
//!     ▼
//! ┌──────────┐   ┌────────────┐   ┌──────────────┐   ┌────────────┐   ┌─────────────┐
//! │ classify │──▶│ admin gate │──▶│ rate limiter │──▶│ CSRF guard │──▶│ maintenance │
//! └──────────┘   └────────────┘   └──────────────┘   └────────────┘   └─────────────┘
//!                      │ 403            │ 429              │ 403            │ 503
//!                      ▼                ▼                  ▼                ▼
//!                 deny ── {error, message, statusCode} ── deny         forward to
//!                                                                  business handlers
//!
//! Cross-cutting: config │ observability (tracing, metrics) │ lifecycle (shutdown)
//! ```
//!
//! Each gate either forwards the request or short-circuits with a
//! terminal JSON response; shared state is limited to two keyed stores
//! (window counters, CSRF records) behind trait abstractions.

// Core subsystems
pub mod admission;
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::server::{build_admission_router, default_inner_router, AppState};
pub use http::{AdmissionError, HttpServer};
pub use lifecycle::Shutdown;
