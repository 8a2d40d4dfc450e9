// ABOUTME: Local redirect listener that captures the provider's authorization callback
// ABOUTME: Accepts one request on localhost and parses both OAuth 1 and OAuth 2 parameters

use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use tracing::{debug, error, info};
use url::Url;

use crate::{
    error::{ConnectError, ConnectResult},
    types::{AuthorizedRequestToken, OAuthToken},
};

pub const DEFAULT_CALLBACK_PORT: u16 = 3737;

const CALLBACK_PATH: &str = "/connect/callback";

/// Query parameters delivered to the redirect URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub oauth_token: Option<String>,
    pub oauth_verifier: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse the request target of the first HTTP line, e.g. `/connect/callback?code=x`
    pub fn from_request_target(target: &str) -> ConnectResult<Self> {
        let url = Url::parse("http://localhost")
            .and_then(|base| base.join(target))
            .map_err(|e| ConnectError::CallbackServer(format!("Malformed callback URL: {}", e)))?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "oauth_token" => params.oauth_token = value,
                "oauth_verifier" => params.oauth_verifier = value,
                // OAuth 1 providers signal a refusal with `denied`
                "error" | "denied" => params.error = value.or_else(|| Some(key.to_string())),
                _ => {}
            }
        }
        Ok(params)
    }

    fn ensure_granted(&self) -> ConnectResult<()> {
        match &self.error {
            Some(reason) => Err(ConnectError::AuthorizationNotGranted(reason.clone())),
            None => Ok(()),
        }
    }

    /// Pair the redirect's verifier with the request token issued earlier
    pub fn authorized_request_token(
        &self,
        request_token: &OAuthToken,
    ) -> ConnectResult<AuthorizedRequestToken> {
        self.ensure_granted()?;
        if let Some(returned) = &self.oauth_token {
            if returned != &request_token.value {
                return Err(ConnectError::AuthorizationNotGranted(
                    "Callback is for a different request token".to_string(),
                ));
            }
        }
        Ok(AuthorizedRequestToken::new(
            request_token.clone(),
            self.oauth_verifier.clone(),
        ))
    }

    /// The authorization code, after checking `state` against the value sent out
    pub fn authorization_code(&self, expected_state: Option<&str>) -> ConnectResult<String> {
        self.ensure_granted()?;
        if let Some(expected) = expected_state {
            if self.state.as_deref() != Some(expected) {
                return Err(ConnectError::AuthorizationNotGranted(
                    "State parameter mismatch".to_string(),
                ));
            }
        }
        self.code.clone().ok_or_else(|| {
            ConnectError::AuthorizationNotGranted("No authorization code in callback".to_string())
        })
    }
}

pub struct CallbackServer {
    port: u16,
    timeout: Duration,
}

impl Default for CallbackServer {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackServer {
    pub fn new() -> Self {
        Self {
            port: DEFAULT_CALLBACK_PORT,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::new()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}{}", self.port, CALLBACK_PATH)
    }

    /// Bind, accept a single redirect and answer it with a small HTML page
    pub async fn wait_for_callback(&self) -> ConnectResult<CallbackParams> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            ConnectError::CallbackServer(format!("Failed to bind to {}: {}", addr, e))
        })?;
        info!("Waiting for authorization callback on {}", addr);

        tokio::time::timeout(self.timeout, Self::accept_one(listener))
            .await
            .map_err(|_| {
                ConnectError::CallbackServer(format!(
                    "No callback received within {}s",
                    self.timeout.as_secs()
                ))
            })?
    }

    async fn accept_one(listener: TcpListener) -> ConnectResult<CallbackParams> {
        let (mut stream, peer_addr) = listener.accept().await.map_err(|e| {
            ConnectError::CallbackServer(format!("Failed to accept connection: {}", e))
        })?;
        debug!("Received connection from {}", peer_addr);

        let mut buffer = vec![0; 4096];
        let n = stream
            .read(&mut buffer)
            .await
            .map_err(|e| ConnectError::CallbackServer(format!("Failed to read request: {}", e)))?;
        let request = String::from_utf8_lossy(&buffer[..n]);

        let parsed = request_target(&request)
            .ok_or_else(|| ConnectError::CallbackServer("Malformed HTTP request".to_string()))
            .and_then(CallbackParams::from_request_target);

        let response = match &parsed {
            Ok(params) if params.error.is_none() => success_response(),
            Ok(params) => error_response(params.error.as_deref().unwrap_or("access denied")),
            Err(e) => error_response(&e.to_string()),
        };
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            error!("Failed to send callback response: {}", e);
        }

        parsed
    }
}

/// `GET /path?query HTTP/1.1` -> `/path?query`
fn request_target(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

fn success_response() -> String {
    html_response(
        "200 OK",
        "<html><body><h1>Account connected</h1><p>You can close this tab and return to your terminal.</p></body></html>",
    )
}

fn error_response(reason: &str) -> String {
    let escaped = reason
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    html_response(
        "400 Bad Request",
        &format!(
            "<html><body><h1>Connection failed</h1><p>{}</p><p>You can close this tab and return to your terminal.</p></body></html>",
            escaped
        ),
    )
}

fn html_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        assert_eq!(
            CallbackServer::new().callback_url(),
            "http://localhost:3737/connect/callback"
        );
        assert_eq!(
            CallbackServer::with_port(8080).callback_url(),
            "http://localhost:8080/connect/callback"
        );
    }

    #[test]
    fn test_request_target() {
        let request = "GET /connect/callback?code=abc&state=xyz HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(
            request_target(request),
            Some("/connect/callback?code=abc&state=xyz")
        );
        assert_eq!(request_target(""), None);
    }

    #[test]
    fn test_parse_oauth2_params() {
        let params =
            CallbackParams::from_request_target("/connect/callback?code=a%2Fb&state=s1").unwrap();
        assert_eq!(params.code.as_deref(), Some("a/b"));
        assert_eq!(params.authorization_code(Some("s1")).unwrap(), "a/b");
        assert!(matches!(
            params.authorization_code(Some("other")),
            Err(ConnectError::AuthorizationNotGranted(_))
        ));
    }

    #[test]
    fn test_parse_oauth1_params() {
        let params = CallbackParams::from_request_target(
            "/connect/callback?oauth_token=T1&oauth_verifier=V1",
        )
        .unwrap();
        let request_token = OAuthToken::new("T1", "S1");
        let authorized = params.authorized_request_token(&request_token).unwrap();
        assert_eq!(authorized.value(), "T1");
        assert_eq!(authorized.verifier.as_deref(), Some("V1"));

        assert!(params
            .authorized_request_token(&OAuthToken::new("T2", "S2"))
            .is_err());
    }

    #[test]
    fn test_denial_maps_to_not_granted() {
        let params = CallbackParams::from_request_target("/connect/callback?denied=T1").unwrap();
        assert!(matches!(
            params.authorized_request_token(&OAuthToken::new("T1", "S1")),
            Err(ConnectError::AuthorizationNotGranted(_))
        ));

        let params =
            CallbackParams::from_request_target("/connect/callback?error=access_denied").unwrap();
        assert!(matches!(
            params.authorization_code(None),
            Err(ConnectError::AuthorizationNotGranted(reason)) if reason == "access_denied"
        ));
    }

    #[tokio::test]
    async fn test_wait_for_callback_round_trip() {
        let server = CallbackServer::with_port(38_737).with_timeout(Duration::from_secs(5));
        let handle = tokio::spawn(async move { server.wait_for_callback().await });

        let mut attempts = 0;
        let mut stream = loop {
            match tokio::net::TcpStream::connect("127.0.0.1:38737").await {
                Ok(stream) => break stream,
                Err(_) if attempts < 50 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                Err(e) => panic!("callback server never started: {}", e),
            }
        };
        stream
            .write_all(b"GET /connect/callback?code=c1&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let params = handle.await.unwrap().unwrap();
        assert_eq!(params.code.as_deref(), Some("c1"));
        assert_eq!(params.state.as_deref(), Some("s1"));
    }
}
