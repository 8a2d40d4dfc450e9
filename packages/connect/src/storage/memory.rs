// ABOUTME: In-process connection store backed by a lock-protected vector
// ABOUTME: Used for embedding without a database and throughout the test suite

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::{ConnectError, ConnectResult},
    storage::ConnectionStore,
    types::{AccountConnection, AccountId, OAuthToken},
};

#[derive(Debug, Default)]
pub struct MemoryConnectionStore {
    // Insertion order; the write lock makes check-and-insert atomic
    connections: RwLock<Vec<AccountConnection>>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

fn sorted(mut connections: Vec<AccountConnection>) -> Vec<AccountConnection> {
    // Stable: equal timestamps keep insertion order
    connections.sort_by_key(|c| c.created_at);
    connections
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn save(&self, connection: &AccountConnection) -> ConnectResult<()> {
        let mut connections = self.connections.write().await;
        if connections.iter().any(|c| c.same_identity(connection)) {
            return Err(ConnectError::duplicate(&connection.provider_account_id));
        }
        debug!(
            "Storing connection for account {} provider {}",
            connection.account_id, connection.provider
        );
        connections.push(connection.clone());
        Ok(())
    }

    async fn find_all(
        &self,
        provider: &str,
        account_id: &AccountId,
    ) -> ConnectResult<Vec<AccountConnection>> {
        let connections = self.connections.read().await;
        Ok(sorted(
            connections
                .iter()
                .filter(|c| c.provider == provider && &c.account_id == account_id)
                .cloned()
                .collect(),
        ))
    }

    async fn find_one(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<Option<AccountConnection>> {
        let all = self.find_all(provider, account_id).await?;
        Ok(all.into_iter().find(|c| {
            provider_account_id.map_or(true, |pid| c.provider_account_id == pid)
        }))
    }

    async fn find_by_access_token(
        &self,
        provider: &str,
        access_token: &OAuthToken,
    ) -> ConnectResult<Option<AccountConnection>> {
        let connections = self.connections.read().await;
        Ok(sorted(
            connections
                .iter()
                .filter(|c| c.provider == provider && c.access_token.value == access_token.value)
                .cloned()
                .collect(),
        )
        .into_iter()
        .next())
    }

    async fn delete(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<u64> {
        let mut connections = self.connections.write().await;
        let before = connections.len();
        connections.retain(|c| {
            !(c.provider == provider
                && &c.account_id == account_id
                && provider_account_id.map_or(true, |pid| c.provider_account_id == pid))
        });
        let removed = (before - connections.len()) as u64;
        debug!(
            "Deleted {} connection(s) for account {} provider {}",
            removed, account_id, provider
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn connection(account: &str, provider_account_id: &str) -> AccountConnection {
        AccountConnection::new(
            account.into(),
            "gowalla",
            provider_account_id,
            OAuthToken::bearer(format!("token-{}-{}", account, provider_account_id)),
        )
    }

    #[tokio::test]
    async fn test_save_rejects_duplicate_identity() {
        let store = MemoryConnectionStore::new();
        store.save(&connection("A1", "habuma")).await.unwrap();

        let err = store.save(&connection("A1", "habuma")).await.unwrap_err();
        assert!(matches!(err, ConnectError::DuplicateConnection { .. }));
        assert_eq!(store.len().await, 1);

        // Same remote identity for a different local account is a separate record
        store.save(&connection("A2", "habuma")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_one_prefers_oldest() {
        let store = MemoryConnectionStore::new();
        let mut newer = connection("A1", "second");
        let mut older = connection("A1", "first");
        older.created_at = Utc::now() - Duration::minutes(5);
        newer.created_at = Utc::now();
        store.save(&newer).await.unwrap();
        store.save(&older).await.unwrap();

        let found = store.find_one("gowalla", &"A1".into(), None).await.unwrap().unwrap();
        assert_eq!(found.provider_account_id, "first");

        let exact = store
            .find_one("gowalla", &"A1".into(), Some("second"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exact.provider_account_id, "second");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryConnectionStore::new();
        store.save(&connection("A1", "one")).await.unwrap();
        store.save(&connection("A1", "two")).await.unwrap();
        store.save(&connection("A2", "one")).await.unwrap();

        assert_eq!(store.delete("gowalla", &"A1".into(), Some("one")).await.unwrap(), 1);
        assert_eq!(store.delete("gowalla", &"A1".into(), Some("one")).await.unwrap(), 0);
        assert_eq!(store.delete("gowalla", &"A1".into(), None).await.unwrap(), 1);
        assert_eq!(store.delete("gowalla", &"A1".into(), None).await.unwrap(), 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_find_by_access_token() {
        let store = MemoryConnectionStore::new();
        let saved = connection("A1", "habuma");
        store.save(&saved).await.unwrap();

        let found = store
            .find_by_access_token("gowalla", &saved.access_token)
            .await
            .unwrap();
        assert_eq!(found, Some(saved));

        let missing = store
            .find_by_access_token("gowalla", &OAuthToken::bearer("nope"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
