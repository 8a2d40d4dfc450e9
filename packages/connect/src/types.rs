// ABOUTME: Core value types for provider connections
// ABOUTME: OAuth versions, tokens, local account identifiers, and persisted connection records

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConnectError, ConnectResult};

/// Handshake variant spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OAuthVersion {
    #[serde(rename = "1.0")]
    One,
    #[serde(rename = "1.0a")]
    OneA,
    #[serde(rename = "2.0")]
    Two,
}

impl OAuthVersion {
    /// True for both OAuth 1.0 and 1.0a
    pub fn is_oauth1(&self) -> bool {
        matches!(self, Self::One | Self::OneA)
    }
}

impl fmt::Display for OAuthVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "1.0"),
            Self::OneA => write!(f, "1.0a"),
            Self::Two => write!(f, "2.0"),
        }
    }
}

impl FromStr for OAuthVersion {
    type Err = ConnectError;

    fn from_str(s: &str) -> ConnectResult<Self> {
        match s.to_lowercase().as_str() {
            "1" | "1.0" | "one" => Ok(Self::One),
            "1.0a" | "one_a" => Ok(Self::OneA),
            "2" | "2.0" | "two" => Ok(Self::Two),
            _ => Err(ConnectError::config(format!(
                "Unknown OAuth version: {}. Supported: 1.0, 1.0a, 2.0",
                s
            ))),
        }
    }
}

/// OAuth credential as issued by a provider.
///
/// Request tokens and access tokens share this shape; which one a value is
/// depends on where it came from. `secret` is empty for OAuth 2 tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthToken {
    pub value: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    pub fn new(value: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            secret: secret.into(),
            expires_at: None,
        }
    }

    /// OAuth 2 access token (no secret)
    pub fn bearer(value: impl Into<String>) -> Self {
        Self::new(value, String::new())
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Expiry relative to now. Lifetimes too large to represent leave the
    /// token without an expiry.
    pub fn expires_in(self, seconds: i64) -> Self {
        match expiry_after(seconds) {
            Some(at) => self.with_expiry(at),
            None => self,
        }
    }

    /// Tokens without an expiry never expire
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// `now + seconds`, limited to what fits in i64 nanoseconds since the epoch
fn expiry_after(seconds: i64) -> Option<DateTime<Utc>> {
    let at = Utc::now().checked_add_signed(TimeDelta::try_seconds(seconds)?)?;
    at.timestamp_nanos_opt().map(|_| at)
}

// Secrets stay out of logs and panic messages
impl fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthToken")
            .field("value", &"***")
            .field("secret", &if self.secret.is_empty() { "" } else { "***" })
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Request token the member has approved at the authorize URL.
///
/// OAuth 1.0a providers hand back a verifier with the callback; plain 1.0
/// providers do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedRequestToken {
    pub token: OAuthToken,
    pub verifier: Option<String>,
}

impl AuthorizedRequestToken {
    pub fn new(token: OAuthToken, verifier: Option<String>) -> Self {
        Self { token, verifier }
    }

    pub fn value(&self) -> &str {
        &self.token.value
    }
}

/// Opaque identifier of a local member account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Persisted link between a local account and one remote provider account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConnection {
    pub id: String,
    pub account_id: AccountId,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: OAuthToken,
    pub created_at: DateTime<Utc>,
}

impl AccountConnection {
    pub fn new(
        account_id: AccountId,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
        access_token: OAuthToken,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            account_id,
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            access_token,
            created_at: Utc::now(),
        }
    }

    /// Whether this record and `other` name the same remote identity for the same account
    pub fn same_identity(&self, other: &AccountConnection) -> bool {
        self.provider == other.provider
            && self.account_id == other.account_id
            && self.provider_account_id == other.provider_account_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        assert_eq!("1.0".parse::<OAuthVersion>().unwrap(), OAuthVersion::One);
        assert_eq!("1.0A".parse::<OAuthVersion>().unwrap(), OAuthVersion::OneA);
        assert_eq!("2".parse::<OAuthVersion>().unwrap(), OAuthVersion::Two);
        assert!("3.0".parse::<OAuthVersion>().is_err());
    }

    #[test]
    fn test_version_serde_names() {
        let json = serde_json::to_string(&OAuthVersion::OneA).unwrap();
        assert_eq!(json, "\"1.0a\"");
        let parsed: OAuthVersion = serde_json::from_str("\"2.0\"").unwrap();
        assert_eq!(parsed, OAuthVersion::Two);
        assert!(OAuthVersion::One.is_oauth1());
        assert!(!OAuthVersion::Two.is_oauth1());
    }

    #[test]
    fn test_token_expiry() {
        assert!(!OAuthToken::bearer("abc").is_expired());
        assert!(!OAuthToken::bearer("abc").expires_in(600).is_expired());
        assert!(OAuthToken::bearer("abc").expires_in(-1).is_expired());
    }

    #[test]
    fn test_unrepresentable_expiry_is_dropped() {
        for secs in [i64::MAX, i64::MIN, 1_000_000_000_000_000, 20_000_000_000] {
            assert_eq!(OAuthToken::bearer("abc").expires_in(secs).expires_at, None);
        }

        // Still within the range of nanosecond timestamps
        let token = OAuthToken::bearer("abc").expires_in(5_000_000_000);
        let at = token.expires_at.unwrap();
        assert!(at.timestamp_nanos_opt().is_some());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_debug_hides_secrets() {
        let token = OAuthToken::new("visible-value", "visible-secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("visible-value"));
        assert!(!debug.contains("visible-secret"));
    }

    #[test]
    fn test_account_id_conversions() {
        assert_eq!(AccountId::from(42_i64), AccountId::from("42"));
        assert_eq!(AccountId::from("A42").to_string(), "A42");
        let json = serde_json::to_string(&AccountId::from("A42")).unwrap();
        assert_eq!(json, "\"A42\"");
    }

    #[test]
    fn test_same_identity() {
        let token = OAuthToken::bearer("t");
        let a = AccountConnection::new("A1".into(), "gowalla", "habuma", token.clone());
        let b = AccountConnection::new("A1".into(), "gowalla", "habuma", token.clone());
        let c = AccountConnection::new("A1".into(), "gowalla", "other", token);
        assert_ne!(a.id, b.id);
        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }
}
