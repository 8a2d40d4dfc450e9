// ABOUTME: Connection storage abstraction and its SQLite and in-memory backends
// ABOUTME: Stores enforce the one-record-per-remote-identity invariant atomically

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::{
    error::ConnectResult,
    types::{AccountConnection, AccountId, OAuthToken},
};

pub use memory::MemoryConnectionStore;
pub use sqlite::SqliteConnectionStore;

/// Durable mapping from (local account, provider) to connection records.
///
/// Lookups return records in creation order (oldest first) so that
/// "first connection" resolution is deterministic. `save` never replaces an
/// existing record: a second record for the same provider, local account and
/// provider account id fails with `DuplicateConnection`, and the check and
/// insert happen atomically.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn save(&self, connection: &AccountConnection) -> ConnectResult<()>;

    /// Empty for unknown accounts
    async fn find_all(
        &self,
        provider: &str,
        account_id: &AccountId,
    ) -> ConnectResult<Vec<AccountConnection>>;

    /// Exact match when `provider_account_id` is given, otherwise the oldest connection
    async fn find_one(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<Option<AccountConnection>>;

    async fn find_by_access_token(
        &self,
        provider: &str,
        access_token: &OAuthToken,
    ) -> ConnectResult<Option<AccountConnection>>;

    /// Deletes one connection, or all of the account's connections when
    /// `provider_account_id` is `None`. Returns the number removed; zero is
    /// not an error.
    async fn delete(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<u64>;
}
