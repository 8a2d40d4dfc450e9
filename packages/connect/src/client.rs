// ABOUTME: Service client factories turning access credentials into typed API clients
// ABOUTME: Includes a generic authorized HTTP client usable with any configured provider

use reqwest::{
    header::{ACCEPT, AUTHORIZATION},
    Client, RequestBuilder, Response,
};
use serde_json::Value;
use url::Url;

use crate::{
    config::ProviderConfig,
    error::{ConnectError, ConnectResult},
    oauth::{exchanger::server_failure, signing::OAuth1Signer},
    types::{OAuthToken, OAuthVersion},
};

/// Builds the provider's API client `S` for an access credential.
///
/// Construction never touches the network.
pub trait ServiceClientFactory<S>: Send + Sync {
    fn build(&self, access_token: &OAuthToken) -> ConnectResult<S>;
}

impl<S, F> ServiceClientFactory<S> for F
where
    F: Fn(&OAuthToken) -> ConnectResult<S> + Send + Sync,
{
    fn build(&self, access_token: &OAuthToken) -> ConnectResult<S> {
        self(access_token)
    }
}

/// Reject credentials that cannot authorize a request for this OAuth version
pub fn validate_credential(version: OAuthVersion, token: &OAuthToken) -> ConnectResult<()> {
    if token.value.trim().is_empty() {
        return Err(ConnectError::InvalidCredential(
            "access token value is empty".to_string(),
        ));
    }
    if version.is_oauth1() && token.secret.is_empty() {
        return Err(ConnectError::InvalidCredential(
            "OAuth 1 access tokens require a token secret".to_string(),
        ));
    }
    Ok(())
}

/// HTTP client carrying one access credential
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    http: Client,
    token: OAuthToken,
    signer: Option<OAuth1Signer>,
}

impl AuthorizedClient {
    pub fn access_token(&self) -> &OAuthToken {
        &self.token
    }

    /// `Bearer` for OAuth 2, a signed `OAuth` header for OAuth 1
    pub fn authorization_header(&self, method: &str, url: &Url) -> ConnectResult<String> {
        match &self.signer {
            Some(signer) => signer.authorization_header(method, url, Some(&self.token), &[]),
            None => Ok(format!("Bearer {}", self.token.value)),
        }
    }

    /// Authorized GET request, ready for extra headers
    pub fn get(&self, url: &str) -> ConnectResult<RequestBuilder> {
        let url = Url::parse(url)
            .map_err(|e| ConnectError::config(format!("Invalid request URL {}: {}", url, e)))?;
        let header = self.authorization_header("GET", &url)?;
        Ok(self
            .http
            .get(url)
            .header(AUTHORIZATION, header)
            .header(ACCEPT, "application/json"))
    }

    pub async fn get_json(&self, url: &str) -> ConnectResult<Value> {
        let response = self.get(url)?.send().await?;
        read_json(response).await
    }
}

/// Decode a JSON API response, mapping failures onto the error taxonomy
pub async fn read_json(response: Response) -> ConnectResult<Value> {
    let status = response.status();
    if let Some(err) = server_failure(status, "API request") {
        return Err(err);
    }
    if !status.is_success() {
        return Err(ConnectError::ProviderRejected(format!(
            "API request failed with status {}",
            status
        )));
    }
    Ok(response.json::<Value>().await?)
}

/// Factory for [`AuthorizedClient`] bound to one provider's configuration
#[derive(Debug, Clone)]
pub struct AuthorizedClientFactory {
    http: Client,
    version: OAuthVersion,
    signer: Option<OAuth1Signer>,
}

impl AuthorizedClientFactory {
    pub fn from_config(config: &ProviderConfig, http: Client) -> Self {
        let signer = config
            .oauth_version
            .is_oauth1()
            .then(|| OAuth1Signer::new(&config.api_key, &config.api_secret));
        Self {
            http,
            version: config.oauth_version,
            signer,
        }
    }
}

impl ServiceClientFactory<AuthorizedClient> for AuthorizedClientFactory {
    fn build(&self, access_token: &OAuthToken) -> ConnectResult<AuthorizedClient> {
        validate_credential(self.version, access_token)?;
        Ok(AuthorizedClient {
            http: self.http.clone(),
            token: access_token.clone(),
            signer: self.signer.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEndpoints;

    fn config(version: OAuthVersion) -> ProviderConfig {
        ProviderConfig::new(
            "example",
            "Example",
            "key",
            version,
            ProviderEndpoints {
                request_token_url: None,
                authorize_url: "https://example.com/authorize".into(),
                access_token_url: "https://example.com/token".into(),
                profile_url: None,
            },
        )
        .with_api_secret("secret")
    }

    #[test]
    fn test_validate_credential() {
        assert!(validate_credential(OAuthVersion::Two, &OAuthToken::bearer("at")).is_ok());
        assert!(validate_credential(OAuthVersion::Two, &OAuthToken::bearer(" ")).is_err());
        assert!(validate_credential(OAuthVersion::OneA, &OAuthToken::bearer("at")).is_err());
        assert!(validate_credential(OAuthVersion::OneA, &OAuthToken::new("at", "s")).is_ok());
    }

    #[test]
    fn test_bearer_header_for_oauth2() {
        let factory = AuthorizedClientFactory::from_config(&config(OAuthVersion::Two), Client::new());
        let client = factory.build(&OAuthToken::bearer("at-1")).unwrap();
        let url = Url::parse("https://example.com/me").unwrap();
        assert_eq!(client.authorization_header("GET", &url).unwrap(), "Bearer at-1");
        assert_eq!(client.access_token(), &OAuthToken::bearer("at-1"));
    }

    #[test]
    fn test_signed_header_for_oauth1() {
        let factory = AuthorizedClientFactory::from_config(&config(OAuthVersion::One), Client::new());
        let client = factory.build(&OAuthToken::new("at-1", "ts-1")).unwrap();
        let url = Url::parse("https://example.com/me").unwrap();
        let header = client.authorization_header("GET", &url).unwrap();
        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_token=\"at-1\""));
    }

    #[test]
    fn test_closure_factory() {
        let factory = |token: &OAuthToken| -> ConnectResult<String> { Ok(token.value.clone()) };
        assert_eq!(factory.build(&OAuthToken::bearer("x")).unwrap(), "x");
    }

    #[test]
    fn test_invalid_credential_rejected() {
        let factory = AuthorizedClientFactory::from_config(&config(OAuthVersion::Two), Client::new());
        assert!(matches!(
            factory.build(&OAuthToken::bearer("")),
            Err(ConnectError::InvalidCredential(_))
        ));
    }
}
