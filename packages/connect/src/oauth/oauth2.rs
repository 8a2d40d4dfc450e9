// ABOUTME: OAuth 2.0 authorization code exchange
// ABOUTME: Accepts JSON or form-encoded token responses and maps RFC 6749 error codes

use async_trait::async_trait;
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client, StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::{
    config::{parse_url, ProviderConfig},
    error::{ConnectError, ConnectResult},
    oauth::exchanger::{form_params, form_value, server_failure, TokenExchanger},
    types::{OAuthToken, OAuthVersion},
};

/// OAuth token response from provider
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

pub struct OAuth2Exchanger {
    http: Client,
    client_id: String,
    client_secret: String,
    token_url: Url,
}

impl OAuth2Exchanger {
    pub fn from_config(config: &ProviderConfig, http: Client) -> ConnectResult<Self> {
        if config.oauth_version != OAuthVersion::Two {
            return Err(ConnectError::config(format!(
                "Provider {} is not an OAuth 2.0 provider",
                config.name
            )));
        }

        Ok(Self {
            http,
            client_id: config.api_key.clone(),
            client_secret: config.api_secret.clone(),
            token_url: parse_url("access_token_url", &config.endpoints.access_token_url)?,
        })
    }

    fn request_body(&self, redirect_uri: &str, code: &str) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", "authorization_code")
            .append_pair("code", code)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("client_id", &self.client_id);
        if !self.client_secret.is_empty() {
            form.append_pair("client_secret", &self.client_secret);
        }
        form.finish()
    }
}

#[async_trait]
impl TokenExchanger for OAuth2Exchanger {
    fn oauth_version(&self) -> OAuthVersion {
        OAuthVersion::Two
    }

    async fn exchange_code_for_access_token(
        &self,
        redirect_uri: &str,
        code: &str,
    ) -> ConnectResult<OAuthToken> {
        debug!("Exchanging authorization code at {}", self.token_url);

        let response = self
            .http
            .post(self.token_url.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(self.request_body(redirect_uri, code))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if let Some(err) = server_failure(status, "Token exchange") {
            error!("Token exchange failed with status {}", status);
            return Err(err);
        }

        let parsed = parse_token_response(&body);
        if !status.is_success() || parsed.error.is_some() {
            // Don't leak full response body - only log status for security
            error!("Token exchange failed with status {}", status);
            return Err(grant_error(status, &parsed));
        }

        let access_token = parsed.access_token.ok_or_else(|| {
            ConnectError::ProviderRejected("Token response is missing access_token".to_string())
        })?;

        let token = OAuthToken::bearer(access_token);
        Ok(match parsed.expires_in.as_ref().and_then(seconds) {
            Some(secs) => token.expires_in(secs),
            None => token,
        })
    }
}

/// JSON per RFC 6749, with a form-encoded fallback for older providers
fn parse_token_response(body: &str) -> TokenResponse {
    if let Ok(parsed) = serde_json::from_str::<TokenResponse>(body) {
        return parsed;
    }

    let params = form_params(body);
    TokenResponse {
        access_token: form_value(&params, "access_token"),
        expires_in: form_value(&params, "expires_in")
            .or_else(|| form_value(&params, "expires"))
            .map(Value::String),
        error: form_value(&params, "error"),
        error_description: form_value(&params, "error_description"),
    }
}

fn seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn grant_error(status: StatusCode, response: &TokenResponse) -> ConnectError {
    let detail = response
        .error_description
        .clone()
        .or_else(|| response.error.clone())
        .unwrap_or_else(|| format!("status {}", status));

    match response.error.as_deref() {
        Some("invalid_grant") => ConnectError::InvalidGrant(detail),
        Some("access_denied") => ConnectError::AuthorizationNotGranted(detail),
        _ => ConnectError::ProviderRejected(format!("Token exchange failed: {}", detail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEndpoints;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    async fn exchange_with_response(response: Value) -> ConnectResult<OAuthToken> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&server)
            .await;

        let config = ProviderConfig::new(
            "example2",
            "Example Two",
            "client-id",
            OAuthVersion::Two,
            ProviderEndpoints {
                request_token_url: None,
                authorize_url: format!("{}/oauth/authorize", server.uri()),
                access_token_url: format!("{}/oauth/token", server.uri()),
                profile_url: None,
            },
        )
        .with_api_secret("client-secret");
        let exchanger = OAuth2Exchanger::from_config(&config, Client::new())?;
        exchanger
            .exchange_code_for_access_token("https://app/cb", "C1")
            .await
    }

    #[tokio::test]
    async fn test_huge_expires_in_leaves_token_without_expiry() {
        for expires_in in [json!(i64::MAX), json!(1_000_000_000_000_000i64), json!("20000000000")] {
            let token = exchange_with_response(json!({
                "access_token": "AT",
                "expires_in": expires_in
            }))
            .await
            .unwrap();
            assert_eq!(token.value, "AT");
            assert_eq!(token.expires_at, None);
        }
    }

    #[tokio::test]
    async fn test_negative_expires_in() {
        let token = exchange_with_response(json!({"access_token": "AT", "expires_in": -60}))
            .await
            .unwrap();
        assert!(token.is_expired());

        let token = exchange_with_response(json!({"access_token": "AT", "expires_in": i64::MIN}))
            .await
            .unwrap();
        assert_eq!(token.expires_at, None);
    }

    #[test]
    fn test_parse_json_response() {
        let parsed = parse_token_response(r#"{"access_token":"at-1","expires_in":3600,"token_type":"bearer"}"#);
        assert_eq!(parsed.access_token.as_deref(), Some("at-1"));
        assert_eq!(parsed.expires_in.as_ref().and_then(seconds), Some(3600));
    }

    #[test]
    fn test_parse_form_response() {
        let parsed = parse_token_response("access_token=at-2&expires=5108");
        assert_eq!(parsed.access_token.as_deref(), Some("at-2"));
        assert_eq!(parsed.expires_in.as_ref().and_then(seconds), Some(5108));
    }

    #[test]
    fn test_grant_error_mapping() {
        let invalid = parse_token_response(r#"{"error":"invalid_grant","error_description":"Code was already redeemed."}"#);
        match grant_error(StatusCode::BAD_REQUEST, &invalid) {
            ConnectError::InvalidGrant(detail) => assert_eq!(detail, "Code was already redeemed."),
            other => panic!("unexpected error: {:?}", other),
        }

        let denied = parse_token_response("error=access_denied");
        assert!(matches!(
            grant_error(StatusCode::BAD_REQUEST, &denied),
            ConnectError::AuthorizationNotGranted(_)
        ));

        let unknown = parse_token_response("");
        assert!(matches!(
            grant_error(StatusCode::UNAUTHORIZED, &unknown),
            ConnectError::ProviderRejected(_)
        ));
    }
}
