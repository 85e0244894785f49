//! Optimistic-concurrency writes.
//!
//! Every write to a versioned resource is a single conditional update keyed
//! on `(id, version)`. If another writer got there first, no row matches and
//! the caller gets [`WriteError::EditConflict`]. Nothing here retries, and no
//! lock is held across the read-modify-write span.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::store::{StoreError, VersionedStore};

/// An entity whose writes are guarded by a version stamp.
pub trait VersionedResource: Clone + Send + Sync + 'static {
    /// Field changes; unset fields are left untouched.
    type Patch: Send + Sync + 'static;

    /// Resource name used in logs and metrics.
    const KIND: &'static str;

    fn id(&self) -> i64;

    fn version(&self) -> i64;

    /// Stamp a new row: id, version 1, creation time.
    fn assign(&mut self, id: i64, now: DateTime<Utc>);

    fn apply(&mut self, patch: &Self::Patch);

    /// Record a successful write at `version`.
    fn mark_written(&mut self, version: i64, now: DateTime<Utc>);

    /// A patch that sets every writable field to this value's.
    fn full_patch(&self) -> Self::Patch;

    /// `(constraint, value)` pairs that must be unique across rows.
    fn unique_keys(&self) -> Vec<(&'static str, String)>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The stored version moved on since the caller read it.
    #[error("edit conflict")]
    EditConflict,

    #[error("duplicate key for `{constraint}`")]
    DuplicateKey { constraint: &'static str },

    #[error("record {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WriteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation { constraint } => WriteError::DuplicateKey { constraint },
            other => WriteError::Store(other),
        }
    }
}

/// Replace every writable field of row `id`, provided it is still at
/// `observed_version`. Returns the row as written, carrying its new version.
pub async fn full_update<R: VersionedResource>(
    store: &dyn VersionedStore<R>,
    id: i64,
    observed_version: i64,
    replacement: &R,
    deadline: Duration,
) -> Result<R, WriteError> {
    conditional_write(store, id, observed_version, &replacement.full_patch(), deadline).await
}

/// Apply `patch` to row `id` at the version read immediately beforehand.
pub async fn partial_update<R: VersionedResource>(
    store: &dyn VersionedStore<R>,
    id: i64,
    patch: &R::Patch,
    deadline: Duration,
) -> Result<R, WriteError> {
    let version = with_deadline(deadline, store.version_of(id))
        .await?
        .ok_or(WriteError::NotFound(id))?;
    conditional_write(store, id, version, patch, deadline).await
}

async fn conditional_write<R: VersionedResource>(
    store: &dyn VersionedStore<R>,
    id: i64,
    expected_version: i64,
    patch: &R::Patch,
    deadline: Duration,
) -> Result<R, WriteError> {
    match with_deadline(deadline, store.update_where(id, expected_version, patch)).await? {
        Some(written) => {
            tracing::debug!(
                resource = R::KIND,
                id,
                version = written.version(),
                "Versioned write applied"
            );
            Ok(written)
        }
        None => {
            tracing::info!(resource = R::KIND, id, expected_version, "Edit conflict");
            metrics::record_edit_conflict(R::KIND);
            Err(WriteError::EditConflict)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::company::{Company, CompanyPatch};
    use crate::store::MemoryTable;

    const DEADLINE: Duration = Duration::from_secs(1);

    fn acme() -> Company {
        Company::new("Acme", "https://acme.example", vec!["rust".to_string()])
    }

    async fn seeded_at_version(table: &MemoryTable<Company>, version: i64) -> Company {
        let mut row = table.insert(acme()).await.unwrap();
        while row.version < version {
            let patch = CompanyPatch {
                url: Some(format!("https://acme.example/v{}", row.version + 1)),
                ..CompanyPatch::default()
            };
            row = table.update_where(row.id, row.version, &patch).await.unwrap().unwrap();
        }
        row
    }

    #[tokio::test]
    async fn test_concurrent_full_updates_one_wins() {
        let table = MemoryTable::<Company>::new();
        let seen = seeded_at_version(&table, 3).await;
        assert_eq!(seen.version, 3);

        let mut first = seen.clone();
        first.name = "Acme One".to_string();
        let mut second = seen.clone();
        second.name = "Acme Two".to_string();
        second.tech_stack = vec!["go".to_string()];

        let (a, b) = tokio::join!(
            full_update(&table, seen.id, 3, &first, DEADLINE),
            full_update(&table, seen.id, 3, &second, DEADLINE),
        );

        let (winner, loser) = match (a, b) {
            (Ok(w), Err(e)) => (w, e),
            (Err(e), Ok(w)) => (w, e),
            other => panic!("expected exactly one winner, got {other:?}"),
        };
        assert_eq!(loser, WriteError::EditConflict);
        assert_eq!(winner.version, 4);

        let stored = table.get(seen.id).await.unwrap().unwrap();
        assert_eq!(stored, winner);
        assert_eq!(stored.version, 4);
    }

    #[tokio::test]
    async fn test_sequential_stale_write_leaves_no_trace() {
        let table = MemoryTable::<Company>::new();
        let seen = seeded_at_version(&table, 3).await;

        let mut first = seen.clone();
        first.name = "Acme One".to_string();
        let written = full_update(&table, seen.id, 3, &first, DEADLINE).await.unwrap();
        assert_eq!(written.version, 4);

        let mut stale = seen.clone();
        stale.name = "Acme Two".to_string();
        stale.tech_stack = vec!["go".to_string()];
        let err = full_update(&table, seen.id, 3, &stale, DEADLINE).await.unwrap_err();
        assert_eq!(err, WriteError::EditConflict);

        let stored = table.get(seen.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Acme One");
        assert_eq!(stored.tech_stack, vec!["rust".to_string()]);
        assert_eq!(stored.version, 4);
    }

    #[tokio::test]
    async fn test_partial_update_leaves_unset_fields() {
        let table = MemoryTable::<Company>::new();
        let row = table.insert(acme()).await.unwrap();

        let patch = CompanyPatch {
            tech_stack: Some(vec!["rust".to_string(), "sql".to_string()]),
            ..CompanyPatch::default()
        };
        let written = partial_update(&table, row.id, &patch, DEADLINE).await.unwrap();
        assert_eq!(written.version, 2);
        assert_eq!(written.name, "Acme");
        assert_eq!(written.url, "https://acme.example");
        assert_eq!(written.tech_stack.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_update_missing_row() {
        let table = MemoryTable::<Company>::new();
        let err = partial_update(&table, 12, &CompanyPatch::default(), DEADLINE)
            .await
            .unwrap_err();
        assert_eq!(err, WriteError::NotFound(12));
    }

    #[tokio::test]
    async fn test_duplicate_key_is_not_an_edit_conflict() {
        let table = MemoryTable::<Company>::new();
        table.insert(acme()).await.unwrap();
        let other = table
            .insert(Company::new("Globex", "https://globex.example", vec!["c".to_string()]))
            .await
            .unwrap();

        let patch = CompanyPatch {
            name: Some("Acme".to_string()),
            ..CompanyPatch::default()
        };
        let err = partial_update(&table, other.id, &patch, DEADLINE).await.unwrap_err();
        assert_eq!(
            err,
            WriteError::DuplicateKey {
                constraint: Company::NAME_KEY
            }
        );
        assert_eq!(table.version_of(other.id).await.unwrap(), Some(1));
    }
}
