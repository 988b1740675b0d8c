//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: ADMIN_ALLOWED_IPS, CSRF_SECRET,
//!                  ADMIN_TOKEN, *_RATE_LIMIT)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all gates
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require restart
//! - All fields have defaults to allow minimal configs
//! - Environment variables win over file values (deploy-time control)
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::Environment;
pub use schema::GatewayConfig;
