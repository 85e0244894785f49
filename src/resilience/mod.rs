//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request handling:
//!     → storage call
//!     → timeouts.rs (per-call deadline)
//!     → result, or StoreError::Timeout → 500
//! ```
//!
//! # Design Decisions
//! - Fail fast: a slow dependency never hangs a request
//! - No automatic retries; write conflicts in particular go back to the caller

pub mod timeouts;

pub use timeouts::with_deadline;
