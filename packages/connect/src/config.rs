// ABOUTME: Provider configuration records and the providers file loader
// ABOUTME: Immutable settings handed to a ServiceProvider at construction

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use url::Url;

use crate::constants::{
    API_KEY_SUFFIX, API_SECRET_SUFFIX, TETHER_CONFIG_PATH, TETHER_HTTP_CONNECT_TIMEOUT_SECS,
    TETHER_HTTP_REQUEST_TIMEOUT_SECS,
};
use crate::error::{ConnectError, ConnectResult};
use crate::types::OAuthVersion;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Provider endpoints used by the handshake and identity lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
    /// OAuth 1 only
    #[serde(default)]
    pub request_token_url: Option<String>,
    pub authorize_url: String,
    pub access_token_url: String,
    /// Authenticated profile resource returning the remote account id
    #[serde(default)]
    pub profile_url: Option<String>,
}

/// Static configuration of one service provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub display_name: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default)]
    pub app_id: Option<i64>,
    pub oauth_version: OAuthVersion,
    pub endpoints: ProviderEndpoints,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// JSON pointer into the profile response
    #[serde(default = "default_profile_id_field")]
    pub profile_id_field: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub request_token_ttl_secs: Option<u64>,
}

fn default_profile_id_field() -> String {
    "/id".to_string()
}

fn default_request_timeout_secs() -> u64 {
    env_secs(TETHER_HTTP_REQUEST_TIMEOUT_SECS).unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
}

fn default_connect_timeout_secs() -> u64 {
    env_secs(TETHER_HTTP_CONNECT_TIMEOUT_SECS).unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}

fn env_secs(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

impl ProviderConfig {
    /// Minimal configuration; endpoints and the rest are set with the `with_*` methods
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        api_key: impl Into<String>,
        oauth_version: OAuthVersion,
        endpoints: ProviderEndpoints,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            api_key: api_key.into(),
            api_secret: String::new(),
            app_id: None,
            oauth_version,
            endpoints,
            callback_url: None,
            scope: None,
            profile_id_field: default_profile_id_field(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_token_ttl_secs: None,
        }
    }

    pub fn with_api_secret(mut self, secret: impl Into<String>) -> Self {
        self.api_secret = secret.into();
        self
    }

    pub fn with_app_id(mut self, app_id: i64) -> Self {
        self.app_id = Some(app_id);
        self
    }

    pub fn with_callback_url(mut self, callback_url: impl Into<String>) -> Self {
        self.callback_url = Some(callback_url.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_profile_id_field(mut self, pointer: impl Into<String>) -> Self {
        self.profile_id_field = pointer.into();
        self
    }

    pub fn with_request_token_ttl(mut self, secs: u64) -> Self {
        self.request_token_ttl_secs = Some(secs);
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Replace key/secret from `<NAME>_API_KEY` / `<NAME>_API_SECRET` when set
    pub fn apply_env_overrides(&mut self) {
        let prefix = self.name.to_uppercase().replace('-', "_");
        if let Ok(key) = std::env::var(format!("{}{}", prefix, API_KEY_SUFFIX)) {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var(format!("{}{}", prefix, API_SECRET_SUFFIX)) {
            self.api_secret = secret;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConnectResult<()> {
        if self.name.trim().is_empty() {
            return Err(ConnectError::config("Provider name is required"));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConnectError::config(format!(
                "API key is required for provider {}",
                self.name
            )));
        }

        parse_url("authorize_url", &self.endpoints.authorize_url)?;
        parse_url("access_token_url", &self.endpoints.access_token_url)?;
        if let Some(profile_url) = &self.endpoints.profile_url {
            parse_url("profile_url", profile_url)?;
        }
        if let Some(callback_url) = &self.callback_url {
            parse_url("callback_url", callback_url)?;
        }

        if self.oauth_version.is_oauth1() {
            match &self.endpoints.request_token_url {
                Some(url) => {
                    parse_url("request_token_url", url)?;
                }
                None => {
                    return Err(ConnectError::config(format!(
                        "OAuth {} provider {} requires a request_token_url",
                        self.oauth_version, self.name
                    )))
                }
            }
            if self.api_secret.is_empty() {
                return Err(ConnectError::config(format!(
                    "OAuth {} provider {} requires an api_secret for request signing",
                    self.oauth_version, self.name
                )));
            }
        } else if self.callback_url.is_none() {
            return Err(ConnectError::config(format!(
                "OAuth 2.0 provider {} requires a callback_url",
                self.name
            )));
        }

        if !self.profile_id_field.is_empty() && !self.profile_id_field.starts_with('/') {
            return Err(ConnectError::config(format!(
                "profile_id_field must be a JSON pointer, got {}",
                self.profile_id_field
            )));
        }

        Ok(())
    }
}

pub(crate) fn parse_url(field: &str, value: &str) -> ConnectResult<Url> {
    Url::parse(value).map_err(|e| ConnectError::config(format!("Invalid {}: {}", field, e)))
}

/// Contents of a providers TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersFile {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl ProvidersFile {
    /// `$TETHER_CONFIG_PATH`, falling back to `<config dir>/tether/providers.toml`
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(TETHER_CONFIG_PATH) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tether")
            .join("providers.toml")
    }

    /// Load, apply env overrides, and validate every provider
    pub async fn load(path: &Path) -> ConnectResult<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ConnectError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ConnectResult<Self> {
        let mut file: ProvidersFile = toml::from_str(content)
            .map_err(|e| ConnectError::config(format!("Invalid providers file: {}", e)))?;

        for provider in &mut file.providers {
            provider.apply_env_overrides();
            provider.validate()?;
        }

        let mut names: Vec<&str> = file.providers.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConnectError::config(format!(
                "Provider {} is configured more than once",
                dup[0]
            )));
        }

        Ok(file)
    }

    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth2_endpoints() -> ProviderEndpoints {
        ProviderEndpoints {
            request_token_url: None,
            authorize_url: "https://gowalla.com/api/oauth/new".to_string(),
            access_token_url: "https://api.gowalla.com/api/oauth/token".to_string(),
            profile_url: Some("https://api.gowalla.com/users/me".to_string()),
        }
    }

    #[test]
    fn test_oauth2_requires_callback() {
        let config =
            ProviderConfig::new("gowalla", "Gowalla", "key", OAuthVersion::Two, oauth2_endpoints());
        assert!(config.validate().is_err());

        let config = config.with_callback_url("https://app/cb");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_oauth1_requires_request_token_url_and_secret() {
        let mut endpoints = oauth2_endpoints();
        let config =
            ProviderConfig::new("tripit", "TripIt", "key", OAuthVersion::OneA, endpoints.clone());
        assert!(config.validate().is_err());

        endpoints.request_token_url = Some("https://api.tripit.com/oauth/request_token".into());
        let config = ProviderConfig::new("tripit", "TripIt", "key", OAuthVersion::OneA, endpoints);
        assert!(config.validate().is_err());
        assert!(config.with_api_secret("secret").validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_urls_and_empty_key() {
        let mut endpoints = oauth2_endpoints();
        endpoints.authorize_url = "not a url".to_string();
        let config = ProviderConfig::new("x", "X", "key", OAuthVersion::Two, endpoints)
            .with_callback_url("https://app/cb");
        assert!(config.validate().is_err());

        let config = ProviderConfig::new("x", "X", "  ", OAuthVersion::Two, oauth2_endpoints())
            .with_callback_url("https://app/cb");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_providers_file() {
        let content = r#"
            [[providers]]
            name = "gowalla"
            display_name = "Gowalla"
            api_key = "gw-key"
            api_secret = "gw-secret"
            oauth_version = "2.0"
            callback_url = "https://app/connect/gowalla"

            [providers.endpoints]
            authorize_url = "https://gowalla.com/api/oauth/new"
            access_token_url = "https://api.gowalla.com/api/oauth/token"
            profile_url = "https://api.gowalla.com/users/me"

            [[providers]]
            name = "tripit"
            display_name = "TripIt"
            api_key = "tp-key"
            api_secret = "tp-secret"
            oauth_version = "1.0a"
            request_token_ttl_secs = 600

            [providers.endpoints]
            request_token_url = "https://api.tripit.com/oauth/request_token"
            authorize_url = "https://www.tripit.com/oauth/authorize"
            access_token_url = "https://api.tripit.com/oauth/access_token"
        "#;

        let file = ProvidersFile::parse(content).unwrap();
        assert_eq!(file.providers.len(), 2);

        let gowalla = file.get("Gowalla").unwrap();
        assert_eq!(gowalla.oauth_version, OAuthVersion::Two);
        assert_eq!(gowalla.profile_id_field, "/id");

        let tripit = file.get("tripit").unwrap();
        assert_eq!(tripit.oauth_version, OAuthVersion::OneA);
        assert_eq!(tripit.request_token_ttl_secs, Some(600));
    }

    #[test]
    fn test_parse_rejects_duplicate_names() {
        let content = r#"
            [[providers]]
            name = "gowalla"
            display_name = "Gowalla"
            api_key = "k"
            oauth_version = "2.0"
            callback_url = "https://app/cb"
            [providers.endpoints]
            authorize_url = "https://gowalla.com/api/oauth/new"
            access_token_url = "https://api.gowalla.com/api/oauth/token"

            [[providers]]
            name = "gowalla"
            display_name = "Gowalla again"
            api_key = "k"
            oauth_version = "2.0"
            callback_url = "https://app/cb"
            [providers.endpoints]
            authorize_url = "https://gowalla.com/api/oauth/new"
            access_token_url = "https://api.gowalla.com/api/oauth/token"
        "#;

        assert!(matches!(
            ProvidersFile::parse(content),
            Err(ConnectError::Configuration(_))
        ));
    }
}
