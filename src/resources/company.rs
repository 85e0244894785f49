//! Companies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{is_url, unique, Validator};
use super::versioned::VersionedResource;

const MAX_NAME_BYTES: usize = 128;
const MAX_TECH_STACK: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
    pub version: i64,
}

impl Company {
    /// Unique constraint on company names.
    pub const NAME_KEY: &'static str = "companies_name_key";

    /// An unsaved company; the store assigns id and version.
    pub fn new(name: impl Into<String>, url: impl Into<String>, tech_stack: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            created_at: now,
            updated_at: now,
            name: name.into(),
            url: url.into(),
            tech_stack,
            version: 0,
        }
    }

    pub fn validate(&self, v: &mut Validator) {
        validate_name(v, &self.name);
        validate_url(v, &self.url);
        validate_tech_stack(v, &self.tech_stack);
    }
}

impl VersionedResource for Company {
    type Patch = CompanyPatch;

    const KIND: &'static str = "company";

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

    fn apply(&mut self, patch: &CompanyPatch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(url) = &patch.url {
            self.url.clone_from(url);
        }
        if let Some(tech_stack) = &patch.tech_stack {
            self.tech_stack.clone_from(tech_stack);
        }
    }

    fn mark_written(&mut self, version: i64, now: DateTime<Utc>) {
        self.version = version;
        self.updated_at = now;
    }

    fn full_patch(&self) -> CompanyPatch {
        CompanyPatch {
            name: Some(self.name.clone()),
            url: Some(self.url.clone()),
            tech_stack: Some(self.tech_stack.clone()),
        }
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![(Self::NAME_KEY, self.name.clone())]
    }
}

/// Body of `POST /v1/companies`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

impl From<NewCompany> for Company {
    fn from(input: NewCompany) -> Self {
        Company::new(input.name, input.url, input.tech_stack)
    }
}

/// Body of `PUT /v1/companies/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyReplacement {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    /// Version the caller last saw; defaults to the version just fetched.
    #[serde(default)]
    pub version: Option<i64>,
}

impl CompanyReplacement {
    /// Overwrite `current`'s writable fields with this body.
    pub fn replace(self, mut current: Company) -> Company {
        current.name = self.name;
        current.url = self.url;
        current.tech_stack = self.tech_stack;
        current
    }
}

/// Body of `PATCH /v1/companies/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompanyPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub tech_stack: Option<Vec<String>>,
}

impl CompanyPatch {
    pub fn validate(&self, v: &mut Validator) {
        if let Some(name) = &self.name {
            validate_name(v, name);
        }
        if let Some(url) = &self.url {
            validate_url(v, url);
        }
        if let Some(tech_stack) = &self.tech_stack {
            validate_tech_stack(v, tech_stack);
        }
    }
}

fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= MAX_NAME_BYTES, "name", "must not be more than 128 bytes");
}

fn validate_url(v: &mut Validator, url: &str) {
    if !url.is_empty() {
        v.check(is_url(url), "url", "must be a valid URL");
    }
}

fn validate_tech_stack(v: &mut Validator, tech_stack: &[String]) {
    v.check(!tech_stack.is_empty(), "tech_stack", "must not be empty");
    v.check(tech_stack.len() <= MAX_TECH_STACK, "tech_stack", "must not be more than 5 items");
    v.check(unique(tech_stack), "tech_stack", "must not contain duplicate items");
}
