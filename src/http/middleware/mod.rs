//! Request gatekeeping middleware.
//!
//! # Data Flow
//! ```text
//! metrics.rs       (count + time every request, outermost of the four)
//!     → rate_limit.rs   (ClientRegistry::admit; 429 before any lookup)
//!     → authenticate.rs (IdentityResolver; Identity into extensions)
//!     → authorize.rs    (per-route Requirement; 401/403)
//!     → handler
//! ```

pub mod authenticate;
pub mod authorize;
pub mod metrics;
pub mod rate_limit;

pub use authenticate::authenticate;
pub use authorize::require_permissions;
pub use metrics::track_metrics;
pub use rate_limit::rate_limit;
