//! In-memory storage backend.
//!
//! Tokens and permissions live in `DashMap`s. Each resource table keeps its
//! rows and unique index behind one mutex, so the version check, the
//! uniqueness check and the write happen as a single step, the way a
//! conditional `UPDATE` on a database row would.

use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{PermissionStore, StoreError, StoreResult, TokenStore, VersionedStore};
use crate::auth::credential::{TokenDigest, TokenRecord, TokenScope};
use crate::auth::permissions::{PermCode, PermissionSet};
use crate::resources::versioned::VersionedResource;

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: DashMap<TokenDigest, TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    /// Expired records are swept out on the way in.
    async fn insert(&self, record: TokenRecord) -> StoreResult<()> {
        let now = Utc::now();
        self.records.retain(|_, stored| stored.is_live_at(now));
        self.records.insert(record.digest, record);
        Ok(())
    }

    async fn find_live(
        &self,
        digest: &TokenDigest,
        scope: TokenScope,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TokenRecord>> {
        Ok(self
            .records
            .get(digest)
            .filter(|record| record.scope == scope && record.is_live_at(now))
            .map(|record| record.clone()))
    }

    async fn delete_for_owner(&self, owner_id: i64, scope: TokenScope) -> StoreResult<usize> {
        let mut removed = 0;
        self.records.retain(|_, record| {
            let keep = !(record.owner_id == owner_id && record.scope == scope);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[derive(Debug, Default)]
pub struct MemoryPermissionStore {
    grants: DashMap<i64, PermissionSet>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn permissions_for(&self, user_id: i64) -> StoreResult<PermissionSet> {
        Ok(self
            .grants
            .get(&user_id)
            .map(|set| set.clone())
            .unwrap_or_default())
    }

    async fn grant(&self, user_id: i64, codes: &[PermCode]) -> StoreResult<()> {
        self.grants
            .entry(user_id)
            .or_default()
            .extend(codes.iter().copied());
        Ok(())
    }

    async fn revoke_all(&self, user_id: i64) -> StoreResult<()> {
        self.grants.remove(&user_id);
        Ok(())
    }
}

#[derive(Debug)]
struct TableState<R> {
    next_id: i64,
    rows: BTreeMap<i64, R>,
    /// (constraint, value) → row id
    unique: HashMap<(String, String), i64>,
}

impl<R: VersionedResource> TableState<R> {
    /// First unique key of `row` already held by a different row.
    fn conflict(&self, row: &R, own_id: Option<i64>) -> Option<&'static str> {
        row.unique_keys()
            .into_iter()
            .find(|(constraint, value)| {
                self.unique
                    .get(&(constraint.to_string(), value.clone()))
                    .is_some_and(|holder| Some(*holder) != own_id)
            })
            .map(|(constraint, _)| constraint)
    }

    fn index(&mut self, row: &R) {
        for (constraint, value) in row.unique_keys() {
            self.unique.insert((constraint.to_string(), value), row.id());
        }
    }

    fn unindex(&mut self, row: &R) {
        for (constraint, value) in row.unique_keys() {
            self.unique.remove(&(constraint.to_string(), value));
        }
    }
}

/// One resource table.
#[derive(Debug)]
pub struct MemoryTable<R> {
    state: Mutex<TableState<R>>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: VersionedResource> MemoryTable<R> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TableState {
                next_id: 1,
                rows: BTreeMap::new(),
                unique: HashMap::new(),
            }),
            _kind: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, TableState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: VersionedResource> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: VersionedResource> VersionedStore<R> for MemoryTable<R> {
    async fn insert(&self, mut resource: R) -> StoreResult<R> {
        let mut state = self.lock();
        if let Some(constraint) = state.conflict(&resource, None) {
            return Err(StoreError::UniqueViolation { constraint });
        }

        let id = state.next_id;
        state.next_id += 1;
        resource.assign(id, Utc::now());
        state.index(&resource);
        state.rows.insert(id, resource.clone());
        Ok(resource)
    }

    async fn get(&self, id: i64) -> StoreResult<Option<R>> {
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn find_unique(&self, constraint: &str, value: &str) -> StoreResult<Option<R>> {
        let state = self.lock();
        Ok(state
            .unique
            .get(&(constraint.to_string(), value.to_string()))
            .and_then(|id| state.rows.get(id))
            .cloned())
    }

    async fn version_of(&self, id: i64) -> StoreResult<Option<i64>> {
        Ok(self.lock().rows.get(&id).map(|row| row.version()))
    }

    async fn update_where(
        &self,
        id: i64,
        expected_version: i64,
        patch: &R::Patch,
    ) -> StoreResult<Option<R>> {
        let mut state = self.lock();
        let current = match state.rows.get(&id) {
            Some(row) if row.version() == expected_version => row.clone(),
            _ => return Ok(None),
        };

        let mut next = current.clone();
        next.apply(patch);
        if let Some(constraint) = state.conflict(&next, Some(id)) {
            return Err(StoreError::UniqueViolation { constraint });
        }
        next.mark_written(expected_version + 1, Utc::now());

        state.unindex(&current);
        state.index(&next);
        state.rows.insert(id, next.clone());
        Ok(Some(next))
    }

    async fn delete(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.rows.remove(&id) {
            Some(row) => {
                state.unindex(&row);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
