use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process;

use tether_cli::{keys, CliContext};
use tether_connect::{callback::DEFAULT_CALLBACK_PORT, ProvidersFile};

mod cli;

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Tether CLI - connect local accounts to OAuth service providers")]
#[command(version)]
struct Cli {
    /// Providers file (defaults to $TETHER_CONFIG_PATH or ~/.config/tether/providers.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Connection database URL (defaults to $TETHER_DATABASE_URL)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Increase log verbosity
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured service providers
    Providers,
    /// Connect an account through the provider's authorization page
    Authorize {
        /// Provider name from the providers file
        provider: String,
        #[arg(long)]
        account: String,
        /// Local port for the authorization callback
        #[arg(long, default_value_t = DEFAULT_CALLBACK_PORT)]
        port: u16,
    },
    /// Record a connection whose access token was obtained elsewhere
    Add {
        provider: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        provider_account_id: String,
        #[arg(long)]
        token: String,
        /// Token secret (OAuth 1 providers)
        #[arg(long)]
        secret: Option<String>,
    },
    /// Show whether an account is connected
    Status {
        provider: String,
        #[arg(long)]
        account: String,
    },
    /// List an account's connections
    List {
        provider: String,
        #[arg(long)]
        account: String,
    },
    /// Remove an account's connections
    Disconnect {
        provider: String,
        #[arg(long)]
        account: String,
        /// Only remove this provider account
        #[arg(long)]
        provider_account_id: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = handle_command(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_command(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Providers = cli.command {
        let path = cli.config.unwrap_or_else(ProvidersFile::default_path);
        let providers = ProvidersFile::load(&path).await?;
        return cli::providers::list_providers(&providers);
    }

    let ctx = CliContext::open(cli.config, cli.database, keys::load_cipher()?).await?;

    match cli.command {
        Commands::Providers => Ok(()),
        Commands::Authorize {
            provider,
            account,
            port,
        } => cli::connections::authorize(&ctx, &provider, &account, port).await,
        Commands::Add {
            provider,
            account,
            provider_account_id,
            token,
            secret,
        } => {
            cli::connections::add(
                &ctx,
                &provider,
                &account,
                &provider_account_id,
                &token,
                secret.as_deref(),
            )
            .await
        }
        Commands::Status { provider, account } => {
            cli::connections::status(&ctx, &provider, &account).await
        }
        Commands::List { provider, account } => {
            cli::connections::list(&ctx, &provider, &account).await
        }
        Commands::Disconnect {
            provider,
            account,
            provider_account_id,
        } => {
            cli::connections::disconnect(&ctx, &provider, &account, provider_account_id.as_deref())
                .await
        }
    }
}
