// ABOUTME: Gowalla API client built on the generic authorized HTTP client
// ABOUTME: Adds the application key header and decodes the member profile

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use tether_connect::{client::read_json, AuthorizedClient, ConnectError, ConnectResult};

use crate::operations::GowallaOperations;

pub const API_KEY_HEADER: &str = "X-Gowalla-API-Key";

/// Subset of `GET /users/me`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GowallaProfile {
    #[serde(default)]
    pub username: Option<String>,
    /// Site-relative profile path, e.g. `/users/habuma`
    pub url: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl GowallaProfile {
    /// Username, or the last segment of the profile path
    pub fn id(&self) -> Option<String> {
        self.username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| {
                self.url
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
    }
}

#[derive(Debug, Clone)]
pub struct GowallaClient {
    http: AuthorizedClient,
    api_key: String,
    api_base: String,
    web_base: String,
}

impl GowallaClient {
    pub fn new(
        http: AuthorizedClient,
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        web_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            api_base: api_base.into(),
            web_base: web_base.into(),
        }
    }

    pub fn authorized(&self) -> &AuthorizedClient {
        &self.http
    }

    pub async fn profile(&self) -> ConnectResult<GowallaProfile> {
        let url = format!("{}/users/me", self.api_base.trim_end_matches('/'));
        debug!("Fetching Gowalla profile");
        let response = self
            .http
            .get(&url)?
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let body = read_json(response).await?;
        serde_json::from_value(body).map_err(|e| {
            ConnectError::ProviderRejected(format!("Unexpected Gowalla profile: {}", e))
        })
    }
}

#[async_trait]
impl GowallaOperations for GowallaClient {
    async fn profile_id(&self) -> ConnectResult<String> {
        self.profile().await?.id().ok_or_else(|| {
            ConnectError::ProviderRejected("Gowalla profile has no username".to_string())
        })
    }

    async fn profile_url(&self) -> ConnectResult<String> {
        let profile = self.profile().await?;
        Ok(format!(
            "{}{}",
            self.web_base.trim_end_matches('/'),
            profile.url
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: Option<&str>, url: &str) -> GowallaProfile {
        GowallaProfile {
            username: username.map(str::to_string),
            url: url.to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_profile_id_prefers_username() {
        assert_eq!(
            profile(Some("habuma"), "/users/other").id(),
            Some("habuma".to_string())
        );
    }

    #[test]
    fn test_profile_id_falls_back_to_url() {
        assert_eq!(profile(None, "/users/habuma").id(), Some("habuma".to_string()));
        assert_eq!(profile(Some(" "), "/users/habuma/").id(), Some("habuma".to_string()));
        assert_eq!(profile(None, "/").id(), None);
    }
}
