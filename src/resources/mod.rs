//! Versioned resources and their write protocol.
//!
//! # Data Flow
//! ```text
//! PUT   → handler fetch (version V) → full_update(id, V, replacement)
//! PATCH → partial_update: version_of(id) → update_where(id, V, patch)
//!       → Some(row)  : written, version V + 1
//!       → None       : EditConflict (409), never retried
//!       → UniqueViolation : DuplicateKey
//! ```

pub mod company;
pub mod user;
pub mod validation;
pub mod versioned;

pub use company::{Company, CompanyPatch, CompanyReplacement, NewCompany};
pub use user::{NewUser, User, UserChanges, UserPatch, UserReplacement};
pub use validation::{FieldErrors, Validator};
pub use versioned::{full_update, partial_update, VersionedResource, WriteError};
