// ABOUTME: Credential encryption key management for the CLI
// ABOUTME: Uses TETHER_ENCRYPTION_KEY when set, otherwise a generated key file

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tether_connect::{constants::TETHER_ENCRYPTION_KEY, CredentialCipher};
use tracing::{debug, info};

/// `<data dir>/tether/credential.key`
pub fn default_key_path() -> PathBuf {
    crate::context::data_dir().join("credential.key")
}

/// Cipher from the environment secret, falling back to the key file
pub fn load_cipher() -> Result<CredentialCipher> {
    let secret = std::env::var(TETHER_ENCRYPTION_KEY).ok();
    cipher_from(secret.as_deref(), &default_key_path())
}

pub fn cipher_from(secret: Option<&str>, key_path: &Path) -> Result<CredentialCipher> {
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        debug!("Using encryption secret from {}", TETHER_ENCRYPTION_KEY);
        return Ok(CredentialCipher::from_secret(secret)?);
    }
    let key = load_or_create_key(key_path)?;
    Ok(CredentialCipher::from_key(&key)?)
}

fn load_or_create_key(path: &Path) -> Result<Vec<u8>> {
    if path.exists() {
        let encoded = fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file {}", path.display()))?;
        return hex::decode(encoded.trim())
            .with_context(|| format!("Key file {} is not valid hex", path.display()));
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let key = CredentialCipher::generate_key()?;
    write_key_file(path, &hex::encode(&key))
        .with_context(|| format!("Failed to write key file {}", path.display()))?;

    info!("Generated credential key at {}", path.display());
    Ok(key)
}

/// Create the key file owner-only from the start; never overwrites an existing file
fn write_key_file(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600); // Read/write for owner only
    }
    let mut file = options.open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}
