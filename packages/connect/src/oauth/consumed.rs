// ABOUTME: Registry of request tokens that have already entered an exchange
// ABOUTME: Rejects replays of one-shot OAuth 1 request tokens across concurrent handshakes

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::cipher::fingerprint;

/// Entries older than this are dropped; providers expire request tokens long before
const RETENTION_HOURS: i64 = 24;

#[derive(Debug, Default)]
pub(crate) struct ConsumedTokens {
    claimed: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ConsumedTokens {
    /// Atomically mark a token as being exchanged. Returns false if it already was.
    pub(crate) fn claim(&self, token_value: &str) -> bool {
        let now = Utc::now();
        let cutoff = now - Duration::hours(RETENTION_HOURS);
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        claimed.retain(|_, at| *at > cutoff);

        let key = fingerprint(token_value);
        if claimed.contains_key(&key) {
            return false;
        }
        claimed.insert(key, now);
        true
    }

    /// Undo a claim after a transport failure so the member can retry
    pub(crate) fn release(&self, token_value: &str) {
        let mut claimed = self.claimed.lock().unwrap_or_else(|e| e.into_inner());
        claimed.remove(&fingerprint(token_value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_once() {
        let consumed = ConsumedTokens::default();
        assert!(consumed.claim("T1"));
        assert!(!consumed.claim("T1"));
        assert!(consumed.claim("T2"));
    }

    #[test]
    fn test_release_allows_retry() {
        let consumed = ConsumedTokens::default();
        assert!(consumed.claim("T1"));
        consumed.release("T1");
        assert!(consumed.claim("T1"));
    }
}
