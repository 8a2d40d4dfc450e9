// ABOUTME: OAuth 1.0 HMAC-SHA1 request signing (RFC 5849)
// ABOUTME: Builds signature base strings and Authorization headers for the OAuth 1 handshake

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use sha1::Sha1;
use url::Url;

use crate::error::{ConnectError, ConnectResult};
use crate::types::OAuthToken;

type HmacSha1 = Hmac<Sha1>;

/// RFC 3986 unreserved characters are the only ones left as-is
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const NONCE_LENGTH: usize = 32;

pub(crate) fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

/// Consumer credentials used to sign every OAuth 1 request for one provider
#[derive(Clone)]
pub struct OAuth1Signer {
    consumer_key: String,
    consumer_secret: String,
}

impl std::fmt::Debug for OAuth1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth1Signer")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

impl OAuth1Signer {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    /// Authorization header for a request with a fresh nonce and timestamp.
    ///
    /// `extra` carries protocol parameters such as `oauth_callback` or
    /// `oauth_verifier`; they are signed and sent in the header.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &Url,
        token: Option<&OAuthToken>,
        extra: &[(&str, &str)],
    ) -> ConnectResult<String> {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp();
        self.authorization_header_with(method, url, token, extra, &nonce, timestamp)
    }

    pub(crate) fn authorization_header_with(
        &self,
        method: &str,
        url: &Url,
        token: Option<&OAuthToken>,
        extra: &[(&str, &str)],
        nonce: &str,
        timestamp: i64,
    ) -> ConnectResult<String> {
        let timestamp = timestamp.to_string();
        let mut oauth_params: Vec<(String, String)> = vec![
            ("oauth_consumer_key".into(), self.consumer_key.clone()),
            ("oauth_nonce".into(), nonce.to_string()),
            ("oauth_signature_method".into(), SIGNATURE_METHOD.into()),
            ("oauth_timestamp".into(), timestamp),
            ("oauth_version".into(), "1.0".into()),
        ];
        if let Some(token) = token {
            oauth_params.push(("oauth_token".into(), token.value.clone()));
        }
        for (key, value) in extra {
            oauth_params.push((key.to_string(), value.to_string()));
        }

        // Query parameters are part of the signature but not of the header
        let mut signed = oauth_params.clone();
        signed.extend(
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );

        let base = signature_base_string(method, url, &signed);
        let token_secret = token.map(|t| t.secret.as_str()).unwrap_or("");
        let signature = sign(&base, &self.consumer_secret, token_secret)?;
        oauth_params.push(("oauth_signature".into(), signature));

        let header = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("OAuth {}", header))
    }
}

/// `METHOD&enc(base-url)&enc(normalized-params)`
pub(crate) fn signature_base_string(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let normalized = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(&base_url(url)),
        percent_encode(&normalized)
    )
}

fn base_url(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    }
}

pub(crate) fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> ConnectResult<String> {
    let key = format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret)
    );
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| ConnectError::InvalidCredential(format!("HMAC init failed: {}", e)))?;
    mac.update(base.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}
