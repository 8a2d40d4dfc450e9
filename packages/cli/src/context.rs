// ABOUTME: Shared CLI state: the providers file and the connection database
// ABOUTME: Builds a ServiceProvider for any configured provider on demand

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use tether_connect::{
    constants::TETHER_DATABASE_URL, oauth::build_http_client, AuthorizedClient,
    AuthorizedClientFactory, ConnectionStore, CredentialCipher, ProviderConfig, ProvidersFile,
    ServiceProvider, SqliteConnectionStore,
};
use tether_gowalla::{provider::PROVIDER_NAME as GOWALLA, GowallaClientFactory, GowallaProfileResolver};
use tracing::debug;

/// `<data dir>/tether`
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tether")
}

/// `$TETHER_DATABASE_URL`, falling back to `<data dir>/tether/connections.db`
pub fn default_database_url() -> String {
    std::env::var(TETHER_DATABASE_URL)
        .unwrap_or_else(|_| format!("sqlite://{}", data_dir().join("connections.db").display()))
}

pub struct CliContext {
    pub providers: ProvidersFile,
    store: Arc<SqliteConnectionStore>,
}

impl CliContext {
    pub async fn open(
        config_path: Option<PathBuf>,
        database_url: Option<String>,
        cipher: CredentialCipher,
    ) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(ProvidersFile::default_path);
        debug!("Loading providers from {}", config_path.display());
        let providers = ProvidersFile::load(&config_path)
            .await
            .with_context(|| format!("Failed to load providers from {}", config_path.display()))?;

        let database_url = match database_url {
            Some(url) => url,
            None => {
                // SQLite creates the file but not its directory
                std::fs::create_dir_all(data_dir()).context("Failed to create data directory")?;
                default_database_url()
            }
        };
        let store = SqliteConnectionStore::connect(&database_url, cipher)
            .await
            .with_context(|| format!("Failed to open connection database {}", database_url))?;

        Ok(Self {
            providers,
            store: Arc::new(store),
        })
    }

    pub fn provider_config(&self, name: &str) -> Result<&ProviderConfig> {
        self.providers.get(name).ok_or_else(|| {
            anyhow!(
                "Unknown provider '{}'. Run 'tether providers' to see configured providers",
                name
            )
        })
    }

    pub fn provider(&self, name: &str) -> Result<ServiceProvider<AuthorizedClient>> {
        let config = self.provider_config(name)?.clone();
        let http = build_http_client(&config)?;
        let store: Arc<dyn ConnectionStore> = self.store.clone();

        let mut builder = ServiceProvider::builder(config.clone())
            .store(store)
            .http_client(http.clone())
            .client_factory(AuthorizedClientFactory::from_config(&config, http.clone()));

        // Gowalla identifies members through its own profile call
        if config.name.eq_ignore_ascii_case(GOWALLA) {
            builder = builder.profile_resolver(GowallaProfileResolver::new(
                GowallaClientFactory::from_config(&config, http),
            ));
        }

        Ok(builder.build()?)
    }
}
