//! Bearer credentials.
//!
//! The plaintext of a token is handed to the client exactly once. The server
//! keeps only its SHA-256 digest and looks tokens up by digest.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Owner id carried by admin/system tokens.
pub const ADMIN_OWNER_ID: i64 = 0;

/// Plaintext length: 26 base32 characters, 130 bits.
pub const TOKEN_LENGTH: usize = 26;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenScope::Activation => f.write_str("activation"),
            TokenScope::Authentication => f.write_str("authentication"),
        }
    }
}

/// Why a presented credential was rejected before any lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("authorization header must be `Bearer <token>`")]
    Malformed,

    #[error("token must not be empty")]
    Empty,

    #[error("token must be exactly {TOKEN_LENGTH} bytes")]
    WrongLength,

    #[error("token contains characters outside the base32 alphabet")]
    InvalidCharacter,
}

/// A token's plaintext secret. Transient: never stored, never logged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlainToken(String);

impl PlainToken {
    /// Draw a fresh token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let text = (0..TOKEN_LENGTH)
            .map(|_| char::from(BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())]))
            .collect();
        Self(text)
    }

    /// Extract the token from an `Authorization` header value.
    pub fn from_bearer(header: &str) -> Result<Self, CredentialError> {
        let mut parts = header.split(' ');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(token), None) => Ok(Self(token.to_string())),
            _ => Err(CredentialError::Malformed),
        }
    }

    /// Static shape check: length and alphabet.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.0.is_empty() {
            return Err(CredentialError::Empty);
        }
        if self.0.len() != TOKEN_LENGTH {
            return Err(CredentialError::WrongLength);
        }
        if !self.0.bytes().all(|b| BASE32_ALPHABET.contains(&b)) {
            return Err(CredentialError::InvalidCharacter);
        }
        Ok(())
    }

    pub fn digest(&self) -> TokenDigest {
        TokenDigest::of(self.0.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlainToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Debug for PlainToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PlainToken(<redacted>)")
    }
}

/// SHA-256 of a token's plaintext: the only form the server stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenDigest({self})")
    }
}

/// Server-side view of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub digest: TokenDigest,
    pub owner_id: i64,
    pub expires_at: DateTime<Utc>,
    pub scope: TokenScope,
    pub is_admin: bool,
}

impl TokenRecord {
    /// A token expiring exactly at `now` is already dead.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// What the client receives when a token is issued.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: PlainToken,
    pub expires_at: DateTime<Utc>,
}

/// Mint a token: the plaintext for the caller, the record for storage.
pub fn issue(
    owner_id: i64,
    ttl: Duration,
    scope: TokenScope,
    is_admin: bool,
    now: DateTime<Utc>,
) -> (IssuedToken, TokenRecord) {
    let token = PlainToken::generate();
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    let expires_at = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let record = TokenRecord {
        digest: token.digest(),
        owner_id,
        expires_at,
        scope,
        is_admin,
    };
    (IssuedToken { token, expires_at }, record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_valid_and_distinct() {
        let a = PlainToken::generate();
        let b = PlainToken::generate();
        assert!(a.validate().is_ok());
        assert!(b.validate().is_ok());
        assert_ne!(a, b);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn test_digest_is_sha256() {
        let digest = TokenDigest::of(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bearer_parsing() {
        let token = PlainToken::from_bearer("Bearer ABCDEFGHIJKLMNOPQRSTUVWXYZ").unwrap();
        assert_eq!(token.as_str(), "ABCDEFGHIJKLMNOPQRSTUVWXYZ");

        assert_eq!(
            PlainToken::from_bearer("Basic dXNlcjpwYXNz"),
            Err(CredentialError::Malformed)
        );
        assert_eq!(PlainToken::from_bearer("Bearer"), Err(CredentialError::Malformed));
        assert_eq!(PlainToken::from_bearer("Bearer a b"), Err(CredentialError::Malformed));
        assert_eq!(PlainToken::from_bearer("bearer ABC"), Err(CredentialError::Malformed));
    }

    #[test]
    fn test_static_validation() {
        assert_eq!(PlainToken::from(String::new()).validate(), Err(CredentialError::Empty));
        assert_eq!(
            PlainToken::from("ABC".to_string()).validate(),
            Err(CredentialError::WrongLength)
        );
        assert_eq!(
            PlainToken::from("abcdefghijklmnopqrstuvwxyz".to_string()).validate(),
            Err(CredentialError::InvalidCharacter)
        );
        assert_eq!(
            PlainToken::from("ABCDEFGHIJKLMNOPQRSTUVWXY1".to_string()).validate(),
            Err(CredentialError::InvalidCharacter)
        );
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let (_, record) = issue(7, Duration::from_secs(60), TokenScope::Authentication, false, now);
        assert!(record.is_live_at(now));
        assert!(!record.is_live_at(record.expires_at));
        assert!(!record.is_live_at(record.expires_at + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_issue_stores_digest_of_returned_plaintext() {
        let (issued, record) =
            issue(ADMIN_OWNER_ID, Duration::from_secs(1), TokenScope::Authentication, true, Utc::now());
        assert_eq!(issued.token.digest(), record.digest);
        assert_eq!(issued.expires_at, record.expires_at);
        assert!(record.is_admin);
    }

    #[test]
    fn test_plaintext_is_redacted_in_debug() {
        let token = PlainToken::generate();
        assert_eq!(format!("{token:?}"), "PlainToken(<redacted>)");
    }
}
