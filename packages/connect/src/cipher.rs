// ABOUTME: Credential encryption using ChaCha20-Poly1305 AEAD
// ABOUTME: Encrypts stored access tokens and fingerprints them for lookup

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::{
    aead::{self, Nonce, UnboundKey},
    hkdf,
    rand::{SecureRandom, SystemRandom},
};
use sha2::{Digest, Sha256};

use crate::error::{ConnectError, ConnectResult};

/// Nonce size for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

const KEY_SIZE: usize = 32;

/// Application salt for key derivation (constant, not secret)
const HKDF_SALT: &[u8] = b"tether-credential-encryption-v1";

/// Encrypts access token values and secrets before they reach storage
#[derive(Clone)]
pub struct CredentialCipher {
    rng: SystemRandom,
    key: Vec<u8>,
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}

impl CredentialCipher {
    /// Use a raw 256-bit key
    pub fn from_key(key: &[u8]) -> ConnectResult<Self> {
        if key.len() != KEY_SIZE {
            return Err(ConnectError::Encryption(format!(
                "Encryption key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }
        Ok(Self {
            rng: SystemRandom::new(),
            key: key.to_vec(),
        })
    }

    /// Derive the key from an operator-supplied secret with HKDF-SHA256
    pub fn from_secret(secret: &str) -> ConnectResult<Self> {
        if secret.is_empty() {
            return Err(ConnectError::Encryption(
                "Encryption secret must not be empty".to_string(),
            ));
        }

        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, HKDF_SALT);
        let prk = salt.extract(secret.as_bytes());

        let mut key = vec![0u8; KEY_SIZE];
        prk.expand(&[b"connection-credentials"], hkdf::HKDF_SHA256)
            .map_err(|_| ConnectError::Encryption("HKDF expansion failed".to_string()))?
            .fill(&mut key)
            .map_err(|_| ConnectError::Encryption("Key fill failed".to_string()))?;

        Self::from_key(&key)
    }

    /// Fresh random key, e.g. for a first-run key file
    pub fn generate_key() -> ConnectResult<Vec<u8>> {
        let mut key = vec![0u8; KEY_SIZE];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| ConnectError::Encryption("Failed to generate key".to_string()))?;
        Ok(key)
    }

    /// Encrypt to base64(nonce || ciphertext || tag). Empty input stays empty.
    pub fn encrypt(&self, plaintext: &str) -> ConnectResult<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ConnectError::Encryption("Failed to generate nonce".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let sealing_key = self.aead_key()?;
        let mut in_out = plaintext.as_bytes().to_vec();
        sealing_key
            .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| ConnectError::Encryption("Seal operation failed".to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + in_out.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&in_out);

        Ok(BASE64.encode(&result))
    }

    pub fn decrypt(&self, ciphertext: &str) -> ConnectResult<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let encrypted = BASE64
            .decode(ciphertext)
            .map_err(|_| ConnectError::Encryption("Invalid encrypted data format".to_string()))?;

        if encrypted.len() < NONCE_SIZE + aead::CHACHA20_POLY1305.tag_len() {
            return Err(ConnectError::Encryption(
                "Invalid encrypted data format".to_string(),
            ));
        }

        let (nonce_bytes, sealed) = encrypted.split_at(NONCE_SIZE);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| ConnectError::Encryption("Invalid nonce".to_string()))?;

        let opening_key = self.aead_key()?;
        let mut in_out = sealed.to_vec();
        let plaintext = opening_key
            .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
            .map_err(|_| ConnectError::Encryption("Open operation failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| ConnectError::Encryption("Invalid UTF-8 in decrypted data".to_string()))
    }

    fn aead_key(&self) -> ConnectResult<aead::LessSafeKey> {
        let unbound = UnboundKey::new(&aead::CHACHA20_POLY1305, &self.key)
            .map_err(|_| ConnectError::Encryption("Invalid key".to_string()))?;
        Ok(aead::LessSafeKey::new(unbound))
    }
}

/// Hex SHA-256 of a token value; lets storage match tokens without decrypting
pub fn fingerprint(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}
