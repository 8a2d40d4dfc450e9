// ABOUTME: Remote account identity lookup performed at the end of a handshake
// ABOUTME: Generic profile-endpoint resolver extracting the id with a JSON pointer

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
    client::{AuthorizedClientFactory, ServiceClientFactory},
    config::{parse_url, ProviderConfig},
    error::{ConnectError, ConnectResult},
    types::OAuthToken,
};

/// Asks the provider who the access token belongs to
#[async_trait]
pub trait ProfileResolver: Send + Sync {
    async fn fetch_provider_account_id(&self, access_token: &OAuthToken) -> ConnectResult<String>;
}

/// Authenticated `GET <profile_url>` returning the id at `profile_id_field`
pub struct HttpProfileResolver {
    clients: AuthorizedClientFactory,
    profile_url: String,
    id_pointer: String,
}

impl HttpProfileResolver {
    pub fn from_config(config: &ProviderConfig, http: Client) -> ConnectResult<Self> {
        let profile_url = config.endpoints.profile_url.clone().ok_or_else(|| {
            ConnectError::config(format!(
                "Provider {} has no profile_url for identity lookup",
                config.name
            ))
        })?;
        parse_url("profile_url", &profile_url)?;

        Ok(Self {
            clients: AuthorizedClientFactory::from_config(config, http),
            profile_url,
            id_pointer: config.profile_id_field.clone(),
        })
    }
}

#[async_trait]
impl ProfileResolver for HttpProfileResolver {
    async fn fetch_provider_account_id(&self, access_token: &OAuthToken) -> ConnectResult<String> {
        debug!("Fetching remote profile from {}", self.profile_url);
        let client = self.clients.build(access_token)?;
        let profile = client.get_json(&self.profile_url).await?;

        extract_account_id(&profile, &self.id_pointer).ok_or_else(|| {
            ConnectError::ProviderRejected(format!(
                "Profile response has no account id at {}",
                self.id_pointer
            ))
        })
    }
}

/// Strings are taken as-is and numbers are rendered in decimal
pub fn extract_account_id(profile: &Value, pointer: &str) -> Option<String> {
    match profile.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
