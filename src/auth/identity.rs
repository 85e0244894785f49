//! Request identity resolution.
//!
//! Turns the optional `Authorization` header into exactly one [`Identity`],
//! or rejects the request. A credential that is present but unusable is an
//! error; it never degrades to [`Identity::Anonymous`].

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::credential::{PlainToken, TokenScope};
use super::permissions::PermissionSet;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::resources::User;
use crate::store::{PermissionStore, StoreError, Stores, TokenStore, VersionedStore};

/// Who is making the request. Fixed once attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User { id: i64, permissions: PermissionSet },
    Admin,
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::User { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Identity::Anonymous => "anonymous",
            Identity::User { .. } => "user",
            Identity::Admin => "admin",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Malformed, expired or unknown. Callers are never told which.
    #[error("invalid or expired {0} token")]
    InvalidCredential(TokenScope),

    /// The token's owner no longer exists.
    #[error("user {0} not found")]
    NotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

const INVALID: AuthError = AuthError::InvalidCredential(TokenScope::Authentication);

/// Resolves bearer credentials against the token, user and permission stores.
#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn VersionedStore<User>>,
    permissions: Arc<dyn PermissionStore>,
    deadline: Duration,
}

impl IdentityResolver {
    pub fn new(stores: &Stores, deadline: Duration) -> Self {
        Self {
            tokens: Arc::clone(&stores.tokens),
            users: Arc::clone(&stores.users),
            permissions: Arc::clone(&stores.permissions),
            deadline,
        }
    }

    pub async fn resolve(&self, header: Option<&HeaderValue>) -> Result<Identity, AuthError> {
        self.resolve_at(header, Utc::now()).await
    }

    /// [`IdentityResolver::resolve`] against an explicit clock reading.
    pub async fn resolve_at(
        &self,
        header: Option<&HeaderValue>,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        let result = self.classify(header, now).await;
        let outcome = match &result {
            Ok(identity) => identity.kind(),
            Err(AuthError::Store(_)) => "error",
            Err(_) => "invalid",
        };
        metrics::record_identity_resolution(outcome);
        tracing::debug!(outcome, "Identity resolved");
        result
    }

    async fn classify(
        &self,
        header: Option<&HeaderValue>,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        // An empty header counts as no credential at all.
        let Some(header) = header.filter(|h| !h.as_bytes().iter().all(u8::is_ascii_whitespace))
        else {
            return Ok(Identity::Anonymous);
        };

        let text = header.to_str().map_err(|_| INVALID)?;
        let token = PlainToken::from_bearer(text).map_err(|e| {
            tracing::debug!(reason = %e, "Rejecting authorization header");
            INVALID
        })?;
        token.validate().map_err(|e| {
            tracing::debug!(reason = %e, "Rejecting bearer token");
            INVALID
        })?;

        let record = with_deadline(
            self.deadline,
            self.tokens
                .find_live(&token.digest(), TokenScope::Authentication, now),
        )
        .await?
        .ok_or(INVALID)?;

        if record.is_admin {
            return Ok(Identity::Admin);
        }

        let user = with_deadline(self.deadline, self.users.get(record.owner_id))
            .await?
            .ok_or(AuthError::NotFound(record.owner_id))?;
        let permissions =
            with_deadline(self.deadline, self.permissions.permissions_for(user.id)).await?;

        Ok(Identity::User {
            id: user.id,
            permissions,
        })
    }
}
