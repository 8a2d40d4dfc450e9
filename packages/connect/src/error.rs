// ABOUTME: Error types for connection handshakes, storage, and client resolution
// ABOUTME: Separates retryable transport failures from handshake and invariant violations

use thiserror::Error;

pub type ConnectResult<T> = Result<T, ConnectError>;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Authorization not granted: {0}")]
    AuthorizationNotGranted(String),

    #[error("Request token expired")]
    TokenExpired,

    #[error("Request token has already been exchanged")]
    TokenAlreadyConsumed,

    #[error("Connection already exists for provider account {provider_account_id}")]
    DuplicateConnection { provider_account_id: String },

    #[error("Not connected: {0}")]
    NotConnected(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Callback server error: {0}")]
    CallbackServer(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    pub fn duplicate(provider_account_id: impl Into<String>) -> Self {
        Self::DuplicateConnection {
            provider_account_id: provider_account_id.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Only transport-level failures may be retried with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::ProviderUnreachable(_))
    }

    /// Handshake failures that leave the caller no option but to start the flow over
    pub fn requires_restart(&self) -> bool {
        matches!(
            self,
            ConnectError::ProviderRejected(_)
                | ConnectError::InvalidGrant(_)
                | ConnectError::AuthorizationNotGranted(_)
                | ConnectError::TokenExpired
                | ConnectError::TokenAlreadyConsumed
        )
    }
}

impl From<reqwest::Error> for ConnectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::ProviderRejected(format!("Malformed provider response: {}", err))
        } else {
            Self::ProviderUnreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_only_for_transport_failures() {
        assert!(ConnectError::ProviderUnreachable("timeout".into()).is_retryable());
        assert!(!ConnectError::ProviderRejected("401".into()).is_retryable());
        assert!(!ConnectError::TokenAlreadyConsumed.is_retryable());
        assert!(!ConnectError::duplicate("42").is_retryable());
    }

    #[test]
    fn test_handshake_failures_require_restart() {
        assert!(ConnectError::InvalidGrant("code used".into()).requires_restart());
        assert!(ConnectError::AuthorizationNotGranted("denied".into()).requires_restart());
        assert!(ConnectError::TokenExpired.requires_restart());
        assert!(!ConnectError::NotConnected("a1".into()).requires_restart());
        assert!(!ConnectError::ProviderUnreachable("dns".into()).requires_restart());
    }

    #[test]
    fn test_duplicate_display() {
        let err = ConnectError::duplicate("habuma");
        assert_eq!(
            err.to_string(),
            "Connection already exists for provider account habuma"
        );
    }
}
