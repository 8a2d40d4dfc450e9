// ABOUTME: Preconfigured Gowalla service provider and its client factory
// ABOUTME: Gowalla speaks OAuth 2.0 and identifies members by username

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use tether_connect::{
    oauth::build_http_client, AuthorizedClientFactory, ConnectResult, ConnectionStore,
    OAuthToken, OAuthVersion, ProfileResolver, ProviderConfig, ProviderEndpoints,
    ServiceClientFactory, ServiceProvider,
};

use crate::{client::GowallaClient, operations::GowallaOperations};

pub const PROVIDER_NAME: &str = "gowalla";
pub const API_BASE: &str = "https://api.gowalla.com";
pub const WEB_BASE: &str = "http://gowalla.com";

/// Provider configuration for the public Gowalla endpoints
pub fn gowalla_config(
    api_key: impl Into<String>,
    api_secret: impl Into<String>,
    callback_url: impl Into<String>,
) -> ProviderConfig {
    gowalla_config_with_base(api_key, api_secret, callback_url, WEB_BASE, API_BASE)
}

/// Same as [`gowalla_config`] against other hosts, e.g. a staging or mock server
pub fn gowalla_config_with_base(
    api_key: impl Into<String>,
    api_secret: impl Into<String>,
    callback_url: impl Into<String>,
    web_base: &str,
    api_base: &str,
) -> ProviderConfig {
    let web_base = web_base.trim_end_matches('/');
    let api_base = api_base.trim_end_matches('/');
    ProviderConfig::new(
        PROVIDER_NAME,
        "Gowalla",
        api_key,
        OAuthVersion::Two,
        ProviderEndpoints {
            request_token_url: None,
            authorize_url: format!("{}/api/oauth/new", web_base),
            access_token_url: format!("{}/api/oauth/token", api_base),
            profile_url: Some(format!("{}/users/me", api_base)),
        },
    )
    .with_api_secret(api_secret)
    .with_callback_url(callback_url)
    .with_profile_id_field("/username")
}

/// Builds [`GowallaClient`]s for stored credentials
#[derive(Debug, Clone)]
pub struct GowallaClientFactory {
    clients: AuthorizedClientFactory,
    api_key: String,
    api_base: String,
    web_base: String,
}

impl GowallaClientFactory {
    pub fn from_config(config: &ProviderConfig, http: Client) -> Self {
        let profile_url = config.endpoints.profile_url.as_deref().unwrap_or_default();
        let api_base = profile_url
            .strip_suffix("/users/me")
            .unwrap_or(API_BASE)
            .to_string();
        let web_base = config
            .endpoints
            .authorize_url
            .strip_suffix("/api/oauth/new")
            .unwrap_or(WEB_BASE)
            .to_string();

        Self {
            clients: AuthorizedClientFactory::from_config(config, http),
            api_key: config.api_key.clone(),
            api_base,
            web_base,
        }
    }
}

impl ServiceClientFactory<GowallaClient> for GowallaClientFactory {
    fn build(&self, access_token: &OAuthToken) -> ConnectResult<GowallaClient> {
        Ok(GowallaClient::new(
            self.clients.build(access_token)?,
            &self.api_key,
            &self.api_base,
            &self.web_base,
        ))
    }
}

/// Identity lookup through the Gowalla profile call
pub struct GowallaProfileResolver {
    clients: GowallaClientFactory,
}

impl GowallaProfileResolver {
    pub fn new(clients: GowallaClientFactory) -> Self {
        Self { clients }
    }
}

#[async_trait]
impl ProfileResolver for GowallaProfileResolver {
    async fn fetch_provider_account_id(&self, access_token: &OAuthToken) -> ConnectResult<String> {
        self.clients.build(access_token)?.profile_id().await
    }
}

/// Ready-to-use Gowalla provider over `store`
pub fn gowalla_service_provider(
    config: ProviderConfig,
    store: Arc<dyn ConnectionStore>,
) -> ConnectResult<ServiceProvider<GowallaClient>> {
    let http = build_http_client(&config)?;
    let factory = GowallaClientFactory::from_config(&config, http.clone());

    ServiceProvider::builder(config)
        .store(store)
        .http_client(http)
        .client_factory(factory.clone())
        .profile_resolver(GowallaProfileResolver::new(factory))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = gowalla_config("key", "secret", "https://app/cb");
        config.validate().unwrap();
        assert_eq!(config.name, "gowalla");
        assert_eq!(config.oauth_version, OAuthVersion::Two);
        assert_eq!(
            config.endpoints.authorize_url,
            "http://gowalla.com/api/oauth/new"
        );
        assert_eq!(
            config.endpoints.access_token_url,
            "https://api.gowalla.com/api/oauth/token"
        );
    }

    #[test]
    fn test_factory_derives_hosts_from_config() {
        let config = gowalla_config_with_base(
            "key",
            "secret",
            "https://app/cb",
            "http://web.test/",
            "http://api.test",
        );
        let factory = GowallaClientFactory::from_config(&config, Client::new());
        assert_eq!(factory.api_base, "http://api.test");
        assert_eq!(factory.web_base, "http://web.test");
    }
}
