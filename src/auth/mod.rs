//! Authentication and authorization.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → credential.rs (Bearer parse, static validation, SHA-256 digest)
//!     → identity.rs   (token/user/permission lookups → Identity)
//!     → permissions.rs (Requirement::check → allow | Unauthorized | Forbidden)
//! ```

pub mod credential;
pub mod identity;
pub mod password;
pub mod permissions;

pub use credential::{issue, IssuedToken, PlainToken, TokenDigest, TokenRecord, TokenScope};
pub use identity::{AuthError, Identity, IdentityResolver};
pub use permissions::{authorize, AccessDenied, PermCode, PermissionSet, Requirement, Strategy};
