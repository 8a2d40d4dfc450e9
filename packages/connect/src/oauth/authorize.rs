// ABOUTME: Authorization URL construction for both handshake variants
// ABOUTME: Pure function of provider configuration and the optional request token

use url::Url;

use crate::{
    config::{parse_url, ProviderConfig},
    error::{ConnectError, ConnectResult},
    types::OAuthVersion,
};

/// Builds the absolute URL a member visits to grant access
#[derive(Debug, Clone)]
pub struct AuthorizeUrlBuilder {
    version: OAuthVersion,
    authorize_url: Url,
    api_key: String,
    callback_url: Option<String>,
    scope: Option<String>,
}

impl AuthorizeUrlBuilder {
    pub fn from_config(config: &ProviderConfig) -> ConnectResult<Self> {
        Ok(Self {
            version: config.oauth_version,
            authorize_url: parse_url("authorize_url", &config.endpoints.authorize_url)?,
            api_key: config.api_key.clone(),
            callback_url: config.callback_url.clone(),
            scope: config.scope.clone(),
        })
    }

    /// OAuth 1 requires the request token; OAuth 2 ignores it and redirects
    /// to the configured callback URL.
    pub fn build(&self, request_token: Option<&str>) -> ConnectResult<String> {
        if self.version.is_oauth1() {
            let token = request_token.ok_or_else(|| {
                ConnectError::unsupported("OAuth 1 authorize URLs require a request token")
            })?;
            return Ok(self.oauth1_url(token));
        }

        let redirect_uri = self.callback_url.as_deref().ok_or_else(|| {
            ConnectError::config("OAuth 2.0 authorize URLs require a callback_url")
        })?;
        Ok(self.oauth2_url(redirect_uri, None))
    }

    /// OAuth 2 authorize URL for an explicit redirect URI and optional CSRF state
    pub fn build_oauth2(&self, redirect_uri: &str, state: Option<&str>) -> ConnectResult<String> {
        if self.version.is_oauth1() {
            return Err(ConnectError::unsupported(
                "OAuth 1 providers authorize with a request token",
            ));
        }
        Ok(self.oauth2_url(redirect_uri, state))
    }

    fn oauth1_url(&self, token: &str) -> String {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("oauth_token", token);
            if self.version == OAuthVersion::One {
                if let Some(callback) = &self.callback_url {
                    query.append_pair("oauth_callback", callback);
                }
            }
        }
        url.to_string()
    }

    fn oauth2_url(&self, redirect_uri: &str, state: Option<&str>) -> String {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.api_key)
                .append_pair("redirect_uri", redirect_uri);
            if let Some(scope) = &self.scope {
                query.append_pair("scope", scope);
            }
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url.to_string()
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
            "api-key-1",
            version,
            ProviderEndpoints {
                request_token_url: Some("https://example.com/oauth/request_token".into()),
                authorize_url: "https://example.com/oauth/authorize".into(),
                access_token_url: "https://example.com/oauth/access_token".into(),
                profile_url: None,
            },
        )
        .with_callback_url("https://app/cb")
    }

    #[test]
    fn test_oauth1a_url_carries_only_token() {
        let builder = AuthorizeUrlBuilder::from_config(&config(OAuthVersion::OneA)).unwrap();
        assert_eq!(
            builder.build(Some("T1")).unwrap(),
            "https://example.com/oauth/authorize?oauth_token=T1"
        );
    }

    #[test]
    fn test_oauth10_url_carries_callback() {
        let builder = AuthorizeUrlBuilder::from_config(&config(OAuthVersion::One)).unwrap();
        assert_eq!(
            builder.build(Some("T1")).unwrap(),
            "https://example.com/oauth/authorize?oauth_token=T1&oauth_callback=https%3A%2F%2Fapp%2Fcb"
        );
    }

    #[test]
    fn test_oauth1_requires_token() {
        let builder = AuthorizeUrlBuilder::from_config(&config(OAuthVersion::OneA)).unwrap();
        assert!(matches!(
            builder.build(None),
            Err(ConnectError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_oauth2_url() {
        let builder = AuthorizeUrlBuilder::from_config(&config(OAuthVersion::Two).with_scope("read write")).unwrap();
        assert_eq!(
            builder.build(None).unwrap(),
            "https://example.com/oauth/authorize?client_id=api-key-1&redirect_uri=https%3A%2F%2Fapp%2Fcb&scope=read+write"
        );
    }

    #[test]
    fn test_oauth2_url_is_deterministic_with_state() {
        let builder = AuthorizeUrlBuilder::from_config(&config(OAuthVersion::Two)).unwrap();
        let first = builder.build_oauth2("http://localhost:3737/cb", Some("xyz")).unwrap();
        let second = builder.build_oauth2("http://localhost:3737/cb", Some("xyz")).unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("&state=xyz"));
    }
}
