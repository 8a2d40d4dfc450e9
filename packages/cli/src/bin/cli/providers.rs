// ABOUTME: CLI command listing the configured service providers
// ABOUTME: Shows name, display name, OAuth version, and application id

use anyhow::Result;
use colored::*;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use tether_connect::ProvidersFile;

pub fn list_providers(providers: &ProvidersFile) -> Result<()> {
    if providers.providers.is_empty() {
        println!("{}", "No providers configured".yellow());
        println!(
            "{}",
            "Add a [[providers]] entry to your providers.toml".dimmed()
        );
        return Ok(());
    }

    println!("{}", "🔌 Service Providers".blue().bold());
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Name", "Display Name", "OAuth", "App ID", "Callback"]);

    for provider in &providers.providers {
        table.add_row(vec![
            provider.name.clone(),
            provider.display_name.clone(),
            provider.oauth_version.to_string(),
            provider
                .app_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            provider
                .callback_url
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", table);
    Ok(())
}
