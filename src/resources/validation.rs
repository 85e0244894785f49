//! Field validation for request payloads.
//!
//! Collects every failure instead of stopping at the first, keyed by field.

use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use serde_json::Value;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validator {
    errors: BTreeMap<String, Vec<String>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` against `field` unless `ok`.
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.add_error(field, message);
        }
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turn the result into `Ok(())` or the collected field errors.
    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(FieldErrors(self.errors))
        }
    }
}

/// Field name → failure messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// JSON object; a field with a single message maps to a plain string.
    pub fn to_json(&self) -> Value {
        let fields = self
            .0
            .iter()
            .map(|(field, messages)| {
                let value = match messages.as_slice() {
                    [single] => Value::String(single.clone()),
                    many => Value::from(many.to_vec()),
                };
                (field.clone(), value)
            })
            .collect();
        Value::Object(fields)
    }
}

pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    values.iter().collect::<HashSet<_>>().len() == values.len()
}

/// `local@domain` with a dotted or single-label domain of alphanumerics and hyphens.
pub fn is_email(value: &str) -> bool {
    const LOCAL_EXTRA: &str = ".!#$%&'*+/=?^_`{|}~-";

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_EXTRA.contains(c));
    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}

/// Absolute URL with a scheme and host.
pub fn is_url(value: &str) -> bool {
    url::Url::parse(value).is_ok_and(|parsed| parsed.has_host())
}
