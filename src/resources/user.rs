//! User accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{is_email, Validator};
use super::versioned::VersionedResource;
use crate::auth::password;

const MAX_NAME_BYTES: usize = 128;
const MAX_EMAIL_BYTES: usize = 254;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub activated: bool,
    pub version: i64,
}

impl User {
    /// Unique constraint on email addresses.
    pub const EMAIL_KEY: &'static str = "users_email_key";

    /// An unsaved, not yet activated user.
    pub fn new(name: impl Into<String>, email: impl Into<String>, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            name: name.into(),
            email: email.into(),
            password_hash,
            activated: false,
            version: 0,
        }
    }
}

impl VersionedResource for User {
    type Patch = UserPatch;

    const KIND: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn assign(&mut self, id: i64, now: DateTime<Utc>) {
        self.id = id;
        self.version = 1;
        self.created_at = now;
        self.updated_at = now;
    }

    fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(hash) = &patch.password_hash {
            self.password_hash.clone_from(hash);
        }
        if let Some(activated) = patch.activated {
            self.activated = activated;
        }
    }

    fn mark_written(&mut self, version: i64, now: DateTime<Utc>) {
        self.version = version;
        self.updated_at = now;
    }

    fn full_patch(&self) -> UserPatch {
        UserPatch {
            name: Some(self.name.clone()),
            email: Some(self.email.clone()),
            password_hash: Some(self.password_hash.clone()),
            activated: Some(self.activated),
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(Self::EMAIL_KEY, self.email.clone())]
    }
}

/// Stored-field changes for a user. Built by handlers, never deserialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub activated: Option<bool>,
}

impl UserPatch {
    pub fn activate() -> Self {
        Self {
            activated: Some(true),
            ..Self::default()
        }
    }
}

/// Body of `POST /v1/users`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self, v: &mut Validator) {
        validate_name(v, &self.name);
        validate_email(v, &self.email);
        validate_password(v, &self.password);
    }
}

/// Body of `PUT /v1/users/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserReplacement {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Version the caller last saw; defaults to the version just fetched.
    #[serde(default)]
    pub version: Option<i64>,
}

impl UserReplacement {
    pub fn validate(&self, v: &mut Validator) {
        validate_name(v, &self.name);
        validate_email(v, &self.email);
        validate_password(v, &self.password);
    }
}

/// Body of `PATCH /v1/users/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserChanges {
    pub fn validate(&self, v: &mut Validator) {
        if let Some(name) = &self.name {
            validate_name(v, name);
        }
        if let Some(email) = &self.email {
            validate_email(v, email);
        }
        if let Some(password) = &self.password {
            validate_password(v, password);
        }
    }
}

fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= MAX_NAME_BYTES, "name", "must not be more than 128 bytes");
}

fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(email.len() <= MAX_EMAIL_BYTES, "email", "must not be more than 254 bytes");
    v.check(is_email(email), "email", "must be a valid email address");
}

fn validate_password(v: &mut Validator, plain: &str) {
    v.check(!plain.is_empty(), "password", "must be provided");
    v.check(
        plain.len() >= password::MIN_LENGTH,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        plain.len() <= password::MAX_LENGTH,
        "password",
        "must not be more than 72 bytes long",
    );
}
