// ABOUTME: OAuth 1.0 / 1.0a handshake: request token fetch and access token exchange
// ABOUTME: Maps oauth_problem reports onto the connection error taxonomy

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use tracing::{debug, error, warn};
use url::Url;

use crate::{
    config::{parse_url, ProviderConfig},
    error::{ConnectError, ConnectResult},
    oauth::{
        exchanger::{form_params, form_value, server_failure, TokenExchanger},
        signing::OAuth1Signer,
    },
    types::{AuthorizedRequestToken, OAuthToken, OAuthVersion},
};

/// Callback value for clients that cannot receive redirects
const OUT_OF_BAND: &str = "oob";

pub struct OAuth1Exchanger {
    version: OAuthVersion,
    signer: OAuth1Signer,
    http: Client,
    request_token_url: Url,
    access_token_url: Url,
    request_token_ttl_secs: Option<u64>,
}

impl OAuth1Exchanger {
    pub fn from_config(config: &ProviderConfig, http: Client) -> ConnectResult<Self> {
        if !config.oauth_version.is_oauth1() {
            return Err(ConnectError::config(format!(
                "Provider {} is not an OAuth 1 provider",
                config.name
            )));
        }
        let request_token_url = config.endpoints.request_token_url.as_deref().ok_or_else(|| {
            ConnectError::config(format!("Provider {} has no request_token_url", config.name))
        })?;

        Ok(Self {
            version: config.oauth_version,
            signer: OAuth1Signer::new(&config.api_key, &config.api_secret),
            http,
            request_token_url: parse_url("request_token_url", request_token_url)?,
            access_token_url: parse_url("access_token_url", &config.endpoints.access_token_url)?,
            request_token_ttl_secs: config.request_token_ttl_secs,
        })
    }

    /// Signed POST returning the form-encoded token response
    async fn post_signed(
        &self,
        url: &Url,
        token: Option<&OAuthToken>,
        extra: &[(&str, &str)],
        step: &str,
    ) -> ConnectResult<Vec<(String, String)>> {
        let header = self.signer.authorization_header("POST", url, token, extra)?;

        let response = self
            .http
            .post(url.clone())
            .header(AUTHORIZATION, header)
            .body("")
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Don't leak full response body - only log status for security
            error!("{} failed with status {}", step, status);
            return Err(problem_to_error(status, &body, step));
        }

        Ok(form_params(&body))
    }

    fn token_from(&self, params: &[(String, String)], step: &str, ttl: Option<u64>) -> ConnectResult<OAuthToken> {
        let value = form_value(params, "oauth_token");
        let secret = form_value(params, "oauth_token_secret");
        let (Some(value), Some(secret)) = (value, secret) else {
            return Err(ConnectError::ProviderRejected(format!(
                "{} response is missing oauth_token or oauth_token_secret",
                step
            )));
        };

        let token = OAuthToken::new(value, secret);
        let expires_in = form_value(params, "oauth_expires_in")
            .and_then(|v| v.parse::<i64>().ok())
            .or_else(|| ttl.and_then(|secs| i64::try_from(secs).ok()));

        Ok(match expires_in {
            Some(secs) => token.expires_in(secs),
            None => token,
        })
    }
}

#[async_trait]
impl TokenExchanger for OAuth1Exchanger {
    fn oauth_version(&self) -> OAuthVersion {
        self.version
    }

    async fn fetch_request_token(&self, callback_url: Option<&str>) -> ConnectResult<OAuthToken> {
        debug!("Requesting OAuth {} request token", self.version);

        // 1.0 passes the callback on the authorize URL instead
        let extra: Vec<(&str, &str)> = match self.version {
            OAuthVersion::OneA => vec![("oauth_callback", callback_url.unwrap_or(OUT_OF_BAND))],
            _ => Vec::new(),
        };

        let params = self
            .post_signed(&self.request_token_url, None, &extra, "Request token fetch")
            .await?;

        if self.version == OAuthVersion::OneA
            && form_value(&params, "oauth_callback_confirmed").as_deref() != Some("true")
        {
            warn!("Provider did not confirm the OAuth 1.0a callback");
        }

        self.token_from(&params, "Request token fetch", self.request_token_ttl_secs)
    }

    async fn exchange_for_access_token(
        &self,
        request_token: &AuthorizedRequestToken,
    ) -> ConnectResult<OAuthToken> {
        if request_token.token.is_expired() {
            return Err(ConnectError::TokenExpired);
        }

        let extra: Vec<(&str, &str)> = match (&request_token.verifier, self.version) {
            (Some(verifier), _) => vec![("oauth_verifier", verifier.as_str())],
            (None, OAuthVersion::OneA) => {
                return Err(ConnectError::AuthorizationNotGranted(
                    "OAuth 1.0a callback did not include an oauth_verifier".to_string(),
                ))
            }
            (None, _) => Vec::new(),
        };

        debug!("Exchanging OAuth {} request token for access token", self.version);
        let params = self
            .post_signed(
                &self.access_token_url,
                Some(&request_token.token),
                &extra,
                "Access token exchange",
            )
            .await?;

        self.token_from(&params, "Access token exchange", None)
    }
}

/// Translate an OAuth Problem Reporting answer into a connection error
fn problem_to_error(status: StatusCode, body: &str, step: &str) -> ConnectError {
    if let Some(err) = server_failure(status, step) {
        return err;
    }

    let problem = form_value(&form_params(body), "oauth_problem");
    match problem.as_deref() {
        Some("token_expired") => ConnectError::TokenExpired,
        Some("token_used") => ConnectError::TokenAlreadyConsumed,
        Some(
            p @ ("permission_denied" | "permission_unknown" | "token_rejected" | "token_revoked"
            | "verifier_invalid"),
        ) => ConnectError::AuthorizationNotGranted(p.to_string()),
        Some(other) => {
            ConnectError::ProviderRejected(format!("{} failed with status {} ({})", step, status, other))
        }
        None => ConnectError::ProviderRejected(format!("{} failed with status {}", step, status)),
    }
}
