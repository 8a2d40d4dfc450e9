// ABOUTME: Integration tests for the CLI context
// ABOUTME: Loads a providers file and drives connections against a temporary database

use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tether_cli::{keys, CliContext};
use tether_connect::{AccountId, OAuthToken, OAuthVersion};

const PROVIDERS_TOML: &str = r#"
[[providers]]
name = "gowalla"
display_name = "Gowalla"
api_key = "gowalla-key"
api_secret = "gowalla-secret"
oauth_version = "2.0"
callback_url = "http://localhost:3737/connect/callback"
profile_id_field = "/username"

[providers.endpoints]
authorize_url = "https://gowalla.com/api/oauth/new"
access_token_url = "https://api.gowalla.com/api/oauth/token"
profile_url = "https://api.gowalla.com/users/me"

[[providers]]
name = "tripit"
display_name = "TripIt"
api_key = "tripit-key"
api_secret = "tripit-secret"
oauth_version = "1.0"
callback_url = "https://app/cb"

[providers.endpoints]
request_token_url = "https://api.tripit.com/oauth/request_token"
authorize_url = "https://www.tripit.com/oauth/authorize"
access_token_url = "https://api.tripit.com/oauth/access_token"
profile_url = "https://api.tripit.com/v1/get/profile"
"#;

async fn setup_context() -> (CliContext, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("providers.toml");
    fs::write(&config_path, PROVIDERS_TOML).unwrap();

    let database_url = format!("sqlite://{}", temp_dir.path().join("connections.db").display());
    let cipher = keys::cipher_from(None, &temp_dir.path().join("credential.key")).unwrap();

    let ctx = CliContext::open(Some(config_path), Some(database_url), cipher)
        .await
        .unwrap();
    (ctx, temp_dir)
}

#[tokio::test]
async fn test_loads_providers() {
    let (ctx, _temp_dir) = setup_context().await;

    assert_eq!(ctx.providers.providers.len(), 2);
    let tripit = ctx.provider_config("TripIt").unwrap();
    assert_eq!(tripit.oauth_version, OAuthVersion::One);
    assert!(ctx.provider_config("unknown").is_err());
}

#[tokio::test]
async fn test_add_and_disconnect_through_context() {
    let (ctx, _temp_dir) = setup_context().await;
    let provider = ctx.provider("gowalla").unwrap();
    let account = AccountId::from("A42");

    provider
        .add_connection(&account, OAuthToken::bearer("gw-token"), "habuma")
        .await
        .unwrap();

    // A fresh provider over the same database sees the stored connection
    let again = ctx.provider("gowalla").unwrap();
    assert_eq!(again.get_provider_account_id(&account).await.unwrap(), "habuma");
    let client = again.resolve_by_account(&account).await.unwrap();
    assert_eq!(client.access_token().value, "gw-token");

    assert_eq!(again.disconnect(&account).await.unwrap(), 1);
    assert!(!again.is_connected(&account).await.unwrap());
}

#[tokio::test]
async fn test_connections_are_scoped_per_provider() {
    let (ctx, _temp_dir) = setup_context().await;
    let account = AccountId::from("A1");

    ctx.provider("tripit")
        .unwrap()
        .add_connection(&account, OAuthToken::new("t", "s"), "traveler")
        .await
        .unwrap();

    assert!(!ctx
        .provider("gowalla")
        .unwrap()
        .is_connected(&account)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_reopened_context_reads_with_same_key_file() {
    let (ctx, temp_dir) = setup_context().await;
    ctx.provider("gowalla")
        .unwrap()
        .add_connection(&"A1".into(), OAuthToken::bearer("gw-token"), "habuma")
        .await
        .unwrap();
    drop(ctx);

    let cipher = keys::cipher_from(None, &temp_dir.path().join("credential.key")).unwrap();
    let database_url = format!("sqlite://{}", temp_dir.path().join("connections.db").display());
    let reopened = CliContext::open(
        Some(temp_dir.path().join("providers.toml")),
        Some(database_url),
        cipher,
    )
    .await
    .unwrap();

    let connections = reopened
        .provider("gowalla")
        .unwrap()
        .get_connections(&"A1".into())
        .await
        .unwrap();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].access_token.value, "gw-token");
}
