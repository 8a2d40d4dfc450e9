// ABOUTME: SQLite-backed connection store using SQLx with embedded migrations
// ABOUTME: Token values and secrets are encrypted at rest and matched by fingerprint

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Row, SqlitePool,
};
use tracing::{debug, error, info};

use crate::{
    cipher::{fingerprint, CredentialCipher},
    error::{ConnectError, ConnectResult},
    storage::ConnectionStore,
    types::{AccountConnection, AccountId, OAuthToken},
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, account_id, provider, provider_account_id,
           access_token, access_token_secret, expires_at, created_at
    FROM account_connections
"#;

pub struct SqliteConnectionStore {
    pool: SqlitePool,
    cipher: CredentialCipher,
}

impl SqliteConnectionStore {
    /// Wrap an existing pool; call [`migrate`](Self::migrate) before first use
    pub fn new(pool: SqlitePool, cipher: CredentialCipher) -> Self {
        Self { pool, cipher }
    }

    /// Open (creating if needed) the database at `database_url` and apply migrations
    pub async fn connect(database_url: &str, cipher: CredentialCipher) -> ConnectResult<Self> {
        debug!("Opening connection database {}", database_url);
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self::new(pool, cipher);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> ConnectResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run connection migrations: {}", e);
                ConnectError::Storage(format!("Migration failed: {}", e))
            })?;
        info!("Connection storage migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_connection(&self, row: &SqliteRow) -> ConnectResult<AccountConnection> {
        let encrypted_value: String = row.try_get("access_token")?;
        let encrypted_secret: String = row.try_get("access_token_secret")?;
        let expires_at: Option<i64> = row.try_get("expires_at")?;
        let created_at: i64 = row.try_get("created_at")?;
        let account_id: String = row.try_get("account_id")?;

        let value = self.cipher.decrypt(&encrypted_value).map_err(|e| {
            error!("Failed to decrypt access token: {}", e);
            ConnectError::Storage(format!("Token decryption failed: {}", e))
        })?;
        let secret = self.cipher.decrypt(&encrypted_secret).map_err(|e| {
            error!("Failed to decrypt access token secret: {}", e);
            ConnectError::Storage(format!("Token decryption failed: {}", e))
        })?;

        let mut access_token = OAuthToken::new(value, secret);
        access_token.expires_at = expires_at.map(from_nanos);

        Ok(AccountConnection {
            id: row.try_get("id")?,
            account_id: AccountId::new(account_id),
            provider: row.try_get("provider")?,
            provider_account_id: row.try_get("provider_account_id")?,
            access_token,
            created_at: from_nanos(created_at),
        })
    }
}

fn to_nanos(at: &DateTime<Utc>) -> ConnectResult<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| ConnectError::Storage(format!("Timestamp {} out of range", at)))
}

fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}

#[async_trait]
impl ConnectionStore for SqliteConnectionStore {
    async fn save(&self, connection: &AccountConnection) -> ConnectResult<()> {
        debug!(
            "Storing connection for account {} provider {}",
            connection.account_id, connection.provider
        );

        let token = &connection.access_token;
        let encrypted_value = self.cipher.encrypt(&token.value)?;
        let encrypted_secret = self.cipher.encrypt(&token.secret)?;
        let expires_at = token.expires_at.as_ref().map(to_nanos).transpose()?;

        // The unique index makes the duplicate check and insert one atomic step
        let result = sqlx::query(
            r#"
            INSERT INTO account_connections (
                id, account_id, provider, provider_account_id,
                access_token, access_token_secret, access_token_hash,
                expires_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&connection.id)
        .bind(connection.account_id.as_str())
        .bind(&connection.provider)
        .bind(&connection.provider_account_id)
        .bind(&encrypted_value)
        .bind(&encrypted_secret)
        .bind(fingerprint(&token.value))
        .bind(expires_at)
        .bind(to_nanos(&connection.created_at)?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!(
                    "Connection to {} account {} already exists",
                    connection.provider, connection.provider_account_id
                );
                Err(ConnectError::duplicate(&connection.provider_account_id))
            }
            Err(e) => {
                error!("Failed to store connection: {}", e);
                Err(e.into())
            }
        }
    }

    async fn find_all(
        &self,
        provider: &str,
        account_id: &AccountId,
    ) -> ConnectResult<Vec<AccountConnection>> {
        let query = format!(
            "{} WHERE provider = ? AND account_id = ? ORDER BY created_at ASC, rowid ASC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(provider)
            .bind(account_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(|row| self.row_to_connection(row)).collect()
    }

    async fn find_one(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<Option<AccountConnection>> {
        let row = match provider_account_id {
            Some(pid) => {
                let query = format!(
                    "{} WHERE provider = ? AND account_id = ? AND provider_account_id = ?",
                    SELECT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(provider)
                    .bind(account_id.as_str())
                    .bind(pid)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    "{} WHERE provider = ? AND account_id = ? \
                     ORDER BY created_at ASC, rowid ASC LIMIT 1",
                    SELECT_COLUMNS
                );
                sqlx::query(&query)
                    .bind(provider)
                    .bind(account_id.as_str())
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.as_ref().map(|r| self.row_to_connection(r)).transpose()
    }

    async fn find_by_access_token(
        &self,
        provider: &str,
        access_token: &OAuthToken,
    ) -> ConnectResult<Option<AccountConnection>> {
        let query = format!(
            "{} WHERE provider = ? AND access_token_hash = ? \
             ORDER BY created_at ASC, rowid ASC LIMIT 1",
            SELECT_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(provider)
            .bind(fingerprint(&access_token.value))
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(|r| self.row_to_connection(r)).transpose()
    }

    async fn delete(
        &self,
        provider: &str,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<u64> {
        let result = match provider_account_id {
            Some(pid) => {
                sqlx::query(
                    "DELETE FROM account_connections \
                     WHERE provider = ? AND account_id = ? AND provider_account_id = ?",
                )
                .bind(provider)
                .bind(account_id.as_str())
                .bind(pid)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query("DELETE FROM account_connections WHERE provider = ? AND account_id = ?")
                    .bind(provider)
                    .bind(account_id.as_str())
                    .execute(&self.pool)
                    .await?
            }
        };

        let removed = result.rows_affected();
        debug!(
            "Deleted {} connection(s) for account {} provider {}",
            removed, account_id, provider
        );
        Ok(removed)
    }
}
