// ABOUTME: ServiceProvider facade orchestrating connect, resolve, and disconnect
// ABOUTME: Composes the exchanger, URL builder, identity lookup, store, and client factory

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    client::{validate_credential, ServiceClientFactory},
    config::ProviderConfig,
    error::{ConnectError, ConnectResult},
    identity::{HttpProfileResolver, ProfileResolver},
    oauth::{
        build_http_client, consumed::ConsumedTokens, exchanger_for, AuthorizeUrlBuilder,
        TokenExchanger,
    },
    storage::ConnectionStore,
    types::{AccountConnection, AccountId, AuthorizedRequestToken, OAuthToken, OAuthVersion},
};

/// Connection lifecycle for one configured provider, producing API clients of type `S`.
///
/// The provider configuration is fixed at construction. All durable state
/// lives in the [`ConnectionStore`]; the facade only remembers which one-shot
/// request tokens and authorization codes have already entered an exchange.
pub struct ServiceProvider<S> {
    config: ProviderConfig,
    exchanger: Arc<dyn TokenExchanger>,
    authorize_urls: AuthorizeUrlBuilder,
    store: Arc<dyn ConnectionStore>,
    clients: Arc<dyn ServiceClientFactory<S>>,
    identity: Arc<dyn ProfileResolver>,
    consumed: ConsumedTokens,
}

pub struct ServiceProviderBuilder<S> {
    config: ProviderConfig,
    store: Option<Arc<dyn ConnectionStore>>,
    clients: Option<Arc<dyn ServiceClientFactory<S>>>,
    identity: Option<Arc<dyn ProfileResolver>>,
    exchanger: Option<Arc<dyn TokenExchanger>>,
    http: Option<Client>,
}

impl<S> ServiceProviderBuilder<S> {
    pub fn store(mut self, store: Arc<dyn ConnectionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn client_factory(mut self, factory: impl ServiceClientFactory<S> + 'static) -> Self {
        self.clients = Some(Arc::new(factory));
        self
    }

    /// Defaults to [`HttpProfileResolver`] over the configured `profile_url`
    pub fn profile_resolver(mut self, resolver: impl ProfileResolver + 'static) -> Self {
        self.identity = Some(Arc::new(resolver));
        self
    }

    /// Defaults to the exchanger matching the configured OAuth version
    pub fn exchanger(mut self, exchanger: Arc<dyn TokenExchanger>) -> Self {
        self.exchanger = Some(exchanger);
        self
    }

    pub fn http_client(mut self, http: Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> ConnectResult<ServiceProvider<S>> {
        self.config.validate()?;

        let store = self
            .store
            .ok_or_else(|| ConnectError::config("ServiceProvider requires a connection store"))?;
        let clients = self.clients.ok_or_else(|| {
            ConnectError::config("ServiceProvider requires a service client factory")
        })?;

        let http = match self.http {
            Some(http) => http,
            None => build_http_client(&self.config)?,
        };

        let exchanger = match self.exchanger {
            Some(exchanger) => exchanger,
            None => exchanger_for(&self.config, http.clone())?,
        };
        if exchanger.oauth_version() != self.config.oauth_version {
            return Err(ConnectError::config(format!(
                "Exchanger speaks OAuth {} but provider {} is configured for OAuth {}",
                exchanger.oauth_version(),
                self.config.name,
                self.config.oauth_version
            )));
        }

        let identity: Arc<dyn ProfileResolver> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(HttpProfileResolver::from_config(&self.config, http)?),
        };

        let authorize_urls = AuthorizeUrlBuilder::from_config(&self.config)?;

        debug!("Built service provider {}", self.config.name);
        Ok(ServiceProvider {
            config: self.config,
            exchanger,
            authorize_urls,
            store,
            clients,
            identity,
            consumed: ConsumedTokens::default(),
        })
    }
}

impl<S> ServiceProvider<S> {
    pub fn builder(config: ProviderConfig) -> ServiceProviderBuilder<S> {
        ServiceProviderBuilder {
            config,
            store: None,
            clients: None,
            identity: None,
            exchanger: None,
            http: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    pub fn api_key(&self) -> &str {
        &self.config.api_key
    }

    pub fn app_id(&self) -> Option<i64> {
        self.config.app_id
    }

    pub fn oauth_version(&self) -> OAuthVersion {
        self.config.oauth_version
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    // Handshake

    /// Start an OAuth 1 handshake. Falls back to the configured callback URL.
    ///
    /// The returned token belongs to the caller's session; the facade keeps no
    /// record of it.
    pub async fn fetch_new_request_token(
        &self,
        callback_url: Option<&str>,
    ) -> ConnectResult<OAuthToken> {
        self.require_oauth1("fetch_new_request_token")?;
        let callback_url = callback_url.or(self.config.callback_url.as_deref());
        info!("Fetching request token from {}", self.config.name);
        self.exchanger.fetch_request_token(callback_url).await
    }

    /// Where to send the member to grant access. OAuth 1 needs the request
    /// token value; OAuth 2 uses the configured callback URL.
    pub fn build_authorize_url(&self, request_token: Option<&str>) -> ConnectResult<String> {
        self.authorize_urls.build(request_token)
    }

    /// OAuth 2 authorize URL with an explicit redirect URI and CSRF state
    pub fn build_authorize_url_with_state(
        &self,
        redirect_uri: &str,
        state: &str,
    ) -> ConnectResult<String> {
        self.authorize_urls.build_oauth2(redirect_uri, Some(state))
    }

    /// Finish an OAuth 1 handshake and persist the new connection
    pub async fn connect_with_token(
        &self,
        account_id: &AccountId,
        request_token: &AuthorizedRequestToken,
    ) -> ConnectResult<AccountConnection> {
        self.require_oauth1("connect_with_token")?;
        if request_token.token.is_expired() {
            return Err(ConnectError::TokenExpired);
        }

        let access_token = self
            .exchange_once(request_token.value(), || {
                self.exchanger.exchange_for_access_token(request_token)
            })
            .await?;
        self.complete_connection(account_id, access_token).await
    }

    /// Finish an OAuth 2 handshake and persist the new connection
    pub async fn connect_with_code(
        &self,
        account_id: &AccountId,
        redirect_uri: &str,
        code: &str,
    ) -> ConnectResult<AccountConnection> {
        if self.config.oauth_version.is_oauth1() {
            return Err(ConnectError::unsupported(format!(
                "{} uses OAuth {}; connect with an authorized request token",
                self.config.name, self.config.oauth_version
            )));
        }

        let access_token = self
            .exchange_once(code, || {
                self.exchanger.exchange_code_for_access_token(redirect_uri, code)
            })
            .await?;
        self.complete_connection(account_id, access_token).await
    }

    /// Record a connection established out of band; no exchange takes place
    pub async fn add_connection(
        &self,
        account_id: &AccountId,
        access_token: OAuthToken,
        provider_account_id: &str,
    ) -> ConnectResult<AccountConnection> {
        validate_credential(self.config.oauth_version, &access_token)?;
        self.persist(account_id, access_token, provider_account_id)
            .await
    }

    /// Run an exchange at most once per one-shot credential. Transport
    /// failures release the claim so the same credential can be retried.
    async fn exchange_once<F, Fut>(&self, one_shot: &str, exchange: F) -> ConnectResult<OAuthToken>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ConnectResult<OAuthToken>>,
    {
        if !self.consumed.claim(one_shot) {
            warn!("Rejected reuse of a consumed credential for {}", self.config.name);
            return Err(ConnectError::TokenAlreadyConsumed);
        }

        match exchange().await {
            Ok(token) => Ok(token),
            Err(e) => {
                if e.is_retryable() {
                    self.consumed.release(one_shot);
                }
                warn!("Token exchange with {} failed: {}", self.config.name, e);
                Err(e)
            }
        }
    }

    async fn complete_connection(
        &self,
        account_id: &AccountId,
        access_token: OAuthToken,
    ) -> ConnectResult<AccountConnection> {
        let provider_account_id = self.identity.fetch_provider_account_id(&access_token).await?;
        debug!(
            "{} reported remote account {} for account {}",
            self.config.name, provider_account_id, account_id
        );
        self.persist(account_id, access_token, &provider_account_id)
            .await
    }

    async fn persist(
        &self,
        account_id: &AccountId,
        access_token: OAuthToken,
        provider_account_id: &str,
    ) -> ConnectResult<AccountConnection> {
        let connection = AccountConnection::new(
            account_id.clone(),
            &self.config.name,
            provider_account_id,
            access_token,
        );
        self.store.save(&connection).await?;
        info!(
            "Connected account {} to {} account {}",
            account_id, self.config.name, provider_account_id
        );
        Ok(connection)
    }

    // Resolution

    pub async fn is_connected(&self, account_id: &AccountId) -> ConnectResult<bool> {
        Ok(!self.get_connections(account_id).await?.is_empty())
    }

    /// Client for the account's oldest connection
    pub async fn resolve_by_account(&self, account_id: &AccountId) -> ConnectResult<S> {
        let connection = self.require_connection(account_id, None).await?;
        self.clients.build(&connection.access_token)
    }

    /// Client for an access token, whether or not it is stored
    pub fn resolve_by_token(&self, access_token: &OAuthToken) -> ConnectResult<S> {
        self.clients.build(access_token)
    }

    pub async fn resolve_by_account_and_provider_id(
        &self,
        account_id: &AccountId,
        provider_account_id: &str,
    ) -> ConnectResult<S> {
        let connection = self
            .require_connection(account_id, Some(provider_account_id))
            .await?;
        self.clients.build(&connection.access_token)
    }

    /// Snapshot of the account's connections, oldest first
    pub async fn get_connections(
        &self,
        account_id: &AccountId,
    ) -> ConnectResult<Vec<AccountConnection>> {
        self.store.find_all(&self.config.name, account_id).await
    }

    pub async fn find_connection_by_access_token(
        &self,
        access_token: &OAuthToken,
    ) -> ConnectResult<Option<AccountConnection>> {
        self.store
            .find_by_access_token(&self.config.name, access_token)
            .await
    }

    /// Remote identifier of the connection [`resolve_by_account`](Self::resolve_by_account) would use
    pub async fn get_provider_account_id(&self, account_id: &AccountId) -> ConnectResult<String> {
        Ok(self
            .require_connection(account_id, None)
            .await?
            .provider_account_id)
    }

    // Disconnect

    /// Remove every connection of the account. Returns how many were removed.
    pub async fn disconnect(&self, account_id: &AccountId) -> ConnectResult<u64> {
        let removed = self.store.delete(&self.config.name, account_id, None).await?;
        info!(
            "Disconnected account {} from {} ({} connection(s))",
            account_id, self.config.name, removed
        );
        Ok(removed)
    }

    pub async fn disconnect_provider_account(
        &self,
        account_id: &AccountId,
        provider_account_id: &str,
    ) -> ConnectResult<u64> {
        let removed = self
            .store
            .delete(&self.config.name, account_id, Some(provider_account_id))
            .await?;
        info!(
            "Disconnected account {} from {} account {}",
            account_id, self.config.name, provider_account_id
        );
        Ok(removed)
    }

    async fn require_connection(
        &self,
        account_id: &AccountId,
        provider_account_id: Option<&str>,
    ) -> ConnectResult<AccountConnection> {
        self.store
            .find_one(&self.config.name, account_id, provider_account_id)
            .await?
            .ok_or_else(|| {
                let target = match provider_account_id {
                    Some(pid) => format!("{} account {}", self.config.name, pid),
                    None => self.config.name.clone(),
                };
                ConnectError::NotConnected(format!(
                    "account {} has no connection to {}",
                    account_id, target
                ))
            })
    }

    fn require_oauth1(&self, operation: &str) -> ConnectResult<()> {
        if self.config.oauth_version.is_oauth1() {
            Ok(())
        } else {
            Err(ConnectError::unsupported(format!(
                "{} is not available for OAuth {} provider {}",
                operation, self.config.oauth_version, self.config.name
            )))
        }
    }
}
