//! Permission codes and the permission gate.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::identity::Identity;

/// The closed vocabulary of permission codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermCode {
    #[serde(rename = "companies:read")]
    CompaniesRead,
    #[serde(rename = "companies:write")]
    CompaniesWrite,
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:write")]
    UsersWrite,
}

impl PermCode {
    pub const ALL: [PermCode; 4] = [
        PermCode::CompaniesRead,
        PermCode::CompaniesWrite,
        PermCode::UsersRead,
        PermCode::UsersWrite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PermCode::CompaniesRead => "companies:read",
            PermCode::CompaniesWrite => "companies:write",
            PermCode::UsersRead => "users:read",
            PermCode::UsersWrite => "users:write",
        }
    }
}

impl fmt::Display for PermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission code `{0}`")]
pub struct UnknownPermCode(pub String);

impl FromStr for PermCode {
    type Err = UnknownPermCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PermCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| UnknownPermCode(s.to_string()))
    }
}

/// A user's granted permission codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet(HashSet<PermCode>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: PermCode) -> bool {
        self.0.insert(code)
    }

    pub fn contains(&self, code: PermCode) -> bool {
        self.0.contains(&code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PermCode> + '_ {
        self.0.iter().copied()
    }

    /// True when every code in `required` is granted.
    pub fn has_all(&self, required: &[PermCode]) -> bool {
        required.iter().all(|code| self.0.contains(code))
    }

    /// True when at least one code in `required` is granted.
    pub fn has_any(&self, required: &[PermCode]) -> bool {
        required.iter().any(|code| self.0.contains(code))
    }
}

impl FromIterator<PermCode> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<PermCode> for PermissionSet {
    fn extend<I: IntoIterator<Item = PermCode>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// How a set of required codes is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every required code must be granted.
    All,
    /// At least one required code must be granted.
    Any,
}

/// Why access was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// No usable identity for a protected action.
    #[error("authentication required")]
    Unauthorized,

    /// Identity is known but lacks the required permissions.
    #[error("insufficient permissions")]
    Forbidden,
}

/// Permission requirement attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    codes: Vec<PermCode>,
    strategy: Strategy,
    allow_anonymous: bool,
}

impl Requirement {
    /// No codes: any identity passes, anonymous included.
    pub fn public() -> Self {
        Self {
            codes: Vec::new(),
            strategy: Strategy::All,
            allow_anonymous: true,
        }
    }

    pub fn all(codes: impl IntoIterator<Item = PermCode>) -> Self {
        Self::with_strategy(codes, Strategy::All)
    }

    pub fn any(codes: impl IntoIterator<Item = PermCode>) -> Self {
        Self::with_strategy(codes, Strategy::Any)
    }

    fn with_strategy(codes: impl IntoIterator<Item = PermCode>, strategy: Strategy) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            strategy,
            allow_anonymous: false,
        }
    }

    /// Let anonymous callers through even when codes are required.
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    pub fn codes(&self) -> &[PermCode] {
        &self.codes
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Evaluate this requirement against a resolved identity.
    pub fn check(&self, identity: &Identity) -> Result<(), AccessDenied> {
        authorize(identity, &self.codes, self.strategy, self.allow_anonymous)
    }
}

/// Decide whether `identity` satisfies `required` under `strategy`.
///
/// - Empty requirement: always allowed.
/// - Admin: always allowed.
/// - Anonymous: `Unauthorized` unless `allow_anonymous`.
/// - User: subset test (`All`) or intersection test (`Any`); `Forbidden` on failure.
pub fn authorize(
    identity: &Identity,
    required: &[PermCode],
    strategy: Strategy,
    allow_anonymous: bool,
) -> Result<(), AccessDenied> {
    if required.is_empty() {
        return Ok(());
    }

    match identity {
        Identity::Admin => Ok(()),
        Identity::Anonymous if allow_anonymous => Ok(()),
        Identity::Anonymous => Err(AccessDenied::Unauthorized),
        Identity::User { permissions, .. } => {
            let granted = match strategy {
                Strategy::All => permissions.has_all(required),
                Strategy::Any => permissions.has_any(required),
            };
            if granted {
                Ok(())
            } else {
                Err(AccessDenied::Forbidden)
            }
        }
    }
}
