// ABOUTME: TokenExchanger abstraction over the OAuth 1 and OAuth 2 handshakes
// ABOUTME: Builds the per-provider exchanger and HTTP client from configuration

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;

use crate::{
    config::ProviderConfig,
    error::{ConnectError, ConnectResult},
    oauth::{oauth1::OAuth1Exchanger, oauth2::OAuth2Exchanger},
    types::{AuthorizedRequestToken, OAuthToken, OAuthVersion},
};

/// Protocol-specific token handshake for one provider.
///
/// Implementations hold no per-handshake state. Every call is a single
/// round trip bounded by the HTTP client's timeouts and can be cancelled by
/// dropping the future.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    fn oauth_version(&self) -> OAuthVersion;

    /// Obtain an unauthorized request token (OAuth 1 only)
    async fn fetch_request_token(&self, callback_url: Option<&str>) -> ConnectResult<OAuthToken> {
        let _ = callback_url;
        Err(ConnectError::unsupported(format!(
            "OAuth {} providers do not issue request tokens",
            self.oauth_version()
        )))
    }

    /// Trade an authorized request token for an access token (OAuth 1 only)
    async fn exchange_for_access_token(
        &self,
        request_token: &AuthorizedRequestToken,
    ) -> ConnectResult<OAuthToken> {
        let _ = request_token;
        Err(ConnectError::unsupported(format!(
            "OAuth {} providers do not exchange request tokens",
            self.oauth_version()
        )))
    }

    /// Trade an authorization code for an access token (OAuth 2 only)
    async fn exchange_code_for_access_token(
        &self,
        redirect_uri: &str,
        code: &str,
    ) -> ConnectResult<OAuthToken> {
        let _ = (redirect_uri, code);
        Err(ConnectError::unsupported(format!(
            "OAuth {} providers do not exchange authorization codes",
            self.oauth_version()
        )))
    }
}

/// HTTP client with the provider's connect and request timeouts applied
pub fn build_http_client(config: &ProviderConfig) -> ConnectResult<Client> {
    Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| ConnectError::config(format!("Failed to build HTTP client: {}", e)))
}

/// Exchanger matching the provider's configured OAuth version
pub fn exchanger_for(config: &ProviderConfig, http: Client) -> ConnectResult<Arc<dyn TokenExchanger>> {
    if config.oauth_version.is_oauth1() {
        Ok(Arc::new(OAuth1Exchanger::from_config(config, http)?))
    } else {
        Ok(Arc::new(OAuth2Exchanger::from_config(config, http)?))
    }
}

/// 5xx answers are treated like transport failures; the caller may retry
pub(crate) fn server_failure(status: StatusCode, step: &str) -> Option<ConnectError> {
    status.is_server_error().then(|| {
        ConnectError::ProviderUnreachable(format!("{} failed with status {}", step, status))
    })
}

/// Parse `application/x-www-form-urlencoded` bodies
pub(crate) fn form_params(body: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub(crate) fn form_value(params: &[(String, String)], key: &str) -> Option<String> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}
