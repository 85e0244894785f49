//! Security subsystem: admission control.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (derive client key: peer IP or trusted forwarded IP)
//!     → rate_limit.rs (ClientRegistry: per-client token bucket)
//!     → admitted: pass to authentication
//!     → denied: 429, before any identity or storage work
//! ```
//!
//! # Design Decisions
//! - Single-process, in-memory state only
//! - One coarse lock per registry; per-call work is O(1)
//! - Idle clients are evicted by a background sweep that stops on shutdown

pub mod headers;
pub mod rate_limit;

pub use headers::client_key;
pub use rate_limit::{ClientRegistry, LimiterSettings, TokenBucket};
