// ABOUTME: CLI commands for connecting, inspecting, and disconnecting accounts
// ABOUTME: Drives interactive OAuth handshakes through a local callback listener

use anyhow::{Context, Result};
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use tether_cli::CliContext;
use tether_connect::{
    AccountConnection, AccountId, AuthorizedClient, CallbackServer, OAuthToken, ServiceProvider,
};
use tracing::warn;

pub async fn authorize(ctx: &CliContext, provider_name: &str, account: &str, port: u16) -> Result<()> {
    let provider = ctx.provider(provider_name)?;
    let account_id = AccountId::from(account);
    let server = CallbackServer::with_port(port);

    println!(
        "{}",
        format!("🔗 Connecting {} to {}...", account, provider.display_name())
            .bold()
            .cyan()
    );

    let connection = if provider.oauth_version().is_oauth1() {
        authorize_oauth1(&provider, &account_id, &server).await?
    } else {
        authorize_oauth2(&provider, &account_id, &server).await?
    };

    println!(
        "{} Connected {} account {}",
        "✓".green().bold(),
        provider.display_name(),
        connection.provider_account_id.bold()
    );
    Ok(())
}

async fn authorize_oauth1(
    provider: &ServiceProvider<AuthorizedClient>,
    account_id: &AccountId,
    server: &CallbackServer,
) -> Result<AccountConnection> {
    let request_token = provider
        .fetch_new_request_token(Some(&server.callback_url()))
        .await
        .context("Failed to obtain a request token")?;
    let url = provider.build_authorize_url(Some(&request_token.value))?;
    open_browser(&url);

    let params = server.wait_for_callback().await?;
    let authorized = params.authorized_request_token(&request_token)?;
    Ok(provider.connect_with_token(account_id, &authorized).await?)
}

async fn authorize_oauth2(
    provider: &ServiceProvider<AuthorizedClient>,
    account_id: &AccountId,
    server: &CallbackServer,
) -> Result<AccountConnection> {
    let redirect_uri = server.callback_url();
    let state = nanoid::nanoid!();
    let url = provider.build_authorize_url_with_state(&redirect_uri, &state)?;
    open_browser(&url);

    let params = server.wait_for_callback().await?;
    let code = params.authorization_code(Some(&state))?;
    Ok(provider
        .connect_with_code(account_id, &redirect_uri, &code)
        .await?)
}

fn open_browser(url: &str) {
    println!("Opening browser to authorize access:");
    println!("  {}", url.underline());
    if let Err(e) = open::that(url) {
        warn!("Failed to open browser: {}", e);
        println!("{}", "Please open the URL above manually.".yellow());
    }
}

pub async fn add(
    ctx: &CliContext,
    provider_name: &str,
    account: &str,
    provider_account_id: &str,
    token: &str,
    secret: Option<&str>,
) -> Result<()> {
    let provider = ctx.provider(provider_name)?;
    let access_token = OAuthToken::new(token, secret.unwrap_or_default());

    let connection = provider
        .add_connection(&AccountId::from(account), access_token, provider_account_id)
        .await?;

    println!(
        "{} Added {} connection {} for {}",
        "✓".green().bold(),
        provider.display_name(),
        connection.provider_account_id.bold(),
        account
    );
    Ok(())
}

pub async fn status(ctx: &CliContext, provider_name: &str, account: &str) -> Result<()> {
    let provider = ctx.provider(provider_name)?;
    let account_id = AccountId::from(account);

    if !provider.is_connected(&account_id).await? {
        println!(
            "{} {} is not connected to {}",
            "✗".red().bold(),
            account,
            provider.display_name()
        );
        return Ok(());
    }

    let connections = provider.get_connections(&account_id).await?;
    let primary = provider.get_provider_account_id(&account_id).await?;
    println!(
        "{} {} is connected to {} as {}",
        "✓".green().bold(),
        account,
        provider.display_name(),
        primary.bold()
    );
    if connections.len() > 1 {
        println!(
            "  {}",
            format!("{} connections in total", connections.len()).dimmed()
        );
    }
    Ok(())
}

pub async fn list(ctx: &CliContext, provider_name: &str, account: &str) -> Result<()> {
    let provider = ctx.provider(provider_name)?;
    let connections = provider.get_connections(&AccountId::from(account)).await?;

    if connections.is_empty() {
        println!(
            "{}",
            format!("No {} connections for {}", provider.display_name(), account).yellow()
        );
        println!(
            "{}",
            format!("Use 'tether authorize {} --account {}' to connect", provider.name(), account)
                .dimmed()
        );
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Provider Account", "Connected", "Token Expires", "ID"]);

    for connection in &connections {
        table.add_row(vec![
            connection.provider_account_id.clone(),
            connection.created_at.format("%Y-%m-%d %H:%M").to_string(),
            connection
                .access_token
                .expires_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
            connection.id.clone(),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub async fn disconnect(
    ctx: &CliContext,
    provider_name: &str,
    account: &str,
    provider_account_id: Option<&str>,
) -> Result<()> {
    let provider = ctx.provider(provider_name)?;
    let account_id = AccountId::from(account);

    let removed = match provider_account_id {
        Some(pid) => provider.disconnect_provider_account(&account_id, pid).await?,
        None => provider.disconnect(&account_id).await?,
    };

    if removed == 0 {
        println!(
            "{}",
            format!("Nothing to disconnect for {} on {}", account, provider.display_name())
                .yellow()
        );
    } else {
        println!(
            "{} Removed {} connection(s) for {}",
            "✓".green().bold(),
            removed,
            account
        );
    }
    Ok(())
}
