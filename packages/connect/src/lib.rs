// ABOUTME: Tether connection library linking local accounts to OAuth service providers
// ABOUTME: Supports OAuth 1.0, 1.0a and 2.0 handshakes with encrypted connection storage

pub mod callback;
pub mod cipher;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod oauth;
pub mod provider;
pub mod storage;
pub mod types;

// Re-export main types
pub use callback::{CallbackParams, CallbackServer};
pub use cipher::CredentialCipher;
pub use client::{AuthorizedClient, AuthorizedClientFactory, ServiceClientFactory};
pub use config::{ProviderConfig, ProviderEndpoints, ProvidersFile};
pub use error::{ConnectError, ConnectResult};
pub use identity::{HttpProfileResolver, ProfileResolver};
pub use oauth::{AuthorizeUrlBuilder, TokenExchanger};
pub use provider::{ServiceProvider, ServiceProviderBuilder};
pub use storage::{ConnectionStore, MemoryConnectionStore, SqliteConnectionStore};
pub use types::{AccountConnection, AccountId, AuthorizedRequestToken, OAuthToken, OAuthVersion};
