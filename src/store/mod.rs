//! Persistence seams.
//!
//! # Data Flow
//! ```text
//! IdentityResolver → TokenStore::find_live (digest, scope, now)
//!                  → VersionedStore<User>::get
//!                  → PermissionStore::permissions_for
//! write protocol   → VersionedStore<R>::version_of / update_where
//! ```
//!
//! # Design Decisions
//! - Object-safe async traits so handlers hold `Arc<dyn ...>`
//! - Expiry is filtered at query time; expired tokens need no deletion
//! - `update_where` is the single atomic compare-and-increment primitive
//! - Uniqueness violations come back as a typed error, never as text

pub mod error;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::credential::{TokenDigest, TokenRecord, TokenScope};
use crate::auth::permissions::{PermCode, PermissionSet};
use crate::resources::company::Company;
use crate::resources::user::User;
use crate::resources::versioned::VersionedResource;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryPermissionStore, MemoryTable, MemoryTokenStore};

/// Credential lookup by digest.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(&self, record: TokenRecord) -> StoreResult<()>;

    /// The token matching `digest` and `scope` with `expires_at > now`.
    async fn find_live(
        &self,
        digest: &TokenDigest,
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TokenRecord>>;

    /// Drop every token of `scope` owned by `owner_id`. Returns how many went.
    async fn delete_for_owner(&self, owner_id: i64, scope: TokenScope) -> StoreResult<usize>;
}

/// Permission codes granted per user.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn permissions_for(&self, user_id: i64) -> StoreResult<PermissionSet>;

    async fn grant(&self, user_id: i64, codes: &[PermCode]) -> StoreResult<()>;

    async fn revoke_all(&self, user_id: i64) -> StoreResult<()>;
}

/// Rows of one versioned resource kind.
#[async_trait]
pub trait VersionedStore<R: VersionedResource>: Send + Sync {
    /// Assign id, version 1 and timestamps, then persist.
    async fn insert(&self, resource: R) -> StoreResult<R>;

    async fn get(&self, id: i64) -> StoreResult<Option<R>>;

    /// Look a row up by one of its natural keys.
    async fn find_unique(&self, constraint: &str, value: &str) -> StoreResult<Option<R>>;

    /// Current version of row `id`, if it exists.
    async fn version_of(&self, id: i64) -> StoreResult<Option<i64>>;

    /// Apply `patch` to row `id` only if its version is still `expected_version`,
    /// bumping the version by one. `None` means no row matched.
    async fn update_where(
        &self,
        id: i64,
        expected_version: i64,
        patch: &R::Patch,
    ) -> StoreResult<Option<R>>;

    async fn delete(&self, id: i64) -> StoreResult<bool>;
}

/// Every store the service talks to.
#[derive(Clone)]
pub struct Stores {
    pub tokens: Arc<dyn TokenStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub users: Arc<dyn VersionedStore<User>>,
    pub companies: Arc<dyn VersionedStore<Company>>,
}

impl Stores {
    /// A fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self {
            tokens: Arc::new(MemoryTokenStore::new()),
            permissions: Arc::new(MemoryPermissionStore::new()),
            users: Arc::new(MemoryTable::<User>::new()),
            companies: Arc::new(MemoryTable::<Company>::new()),
        }
    }
}
