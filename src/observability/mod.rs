//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All gates produce:
//!     → logging.rs (structured log events, request-scoped fields)
//!     → metrics.rs (denial counters, request counters, latency)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Denials log at warn with the source IP and gate; allows stay quiet
//! - Metrics are cheap (atomic increments), recorded on every request
//! - Request ID flows through all gates via the x-request-id header

pub mod logging;
pub mod metrics;
