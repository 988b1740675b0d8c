//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Build gates → Spawn sweepers → Serve
//!
//! Shutdown:
//!     Ctrl+C → Stop accepting → Broadcast to sweepers → Exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Sweepers stop through the broadcast coordinator, not by abort

pub mod shutdown;

pub use shutdown::Shutdown;
