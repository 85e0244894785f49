//! Password hashing.
//!
//! bcrypt is deliberately slow, so both directions run on the blocking pool.

use thiserror::Error;
use tokio::task::JoinError;

/// Shortest accepted plaintext, in bytes.
pub const MIN_LENGTH: usize = 8;

/// bcrypt ignores everything past 72 bytes.
pub const MAX_LENGTH: usize = 72;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("password task failed: {0}")]
    Task(#[from] JoinError),
}

pub async fn hash(plain: String, cost: u32) -> Result<String, PasswordError> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost)).await??;
    Ok(hashed)
}

pub async fn verify(plain: String, hashed: String) -> Result<bool, PasswordError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hashed)).await??;
    Ok(matches)
}
