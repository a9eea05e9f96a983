//! AES-256-GCM credential cipher
//!
//! Stored form is `hex(iv):hex(tag):hex(ciphertext)` with a 16-byte IV, the
//! framing used by credentials written before this service existed. The key
//! is derived once with scrypt from a deployment-wide passphrase.

use aes_gcm::{
    AeadCore, AesGcm, KeyInit,
    aead::{Aead, OsRng, consts::U16},
    aes::Aes256,
};
use application::{error::ApplicationError, ports::CredentialCipherPort};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

/// AES-256-GCM with a 128-bit nonce
type Aes256Gcm16 = AesGcm<Aes256, U16>;

const IV_SIZE: usize = 16;
const TAG_SIZE: usize = 16;
const KEY_SIZE: usize = 32;

/// scrypt cost: N = 2^14, r = 8, p = 1
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Encrypts mailbox passwords for storage
pub struct AesGcmCredentialCipher {
    cipher: Aes256Gcm16,
}

impl std::fmt::Debug for AesGcmCredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCredentialCipher")
            .field("cipher", &"[AES-256-GCM]")
            .finish()
    }
}

impl AesGcmCredentialCipher {
    /// Derive the key from `passphrase` and `salt`
    pub fn new(passphrase: &SecretString, salt: &str) -> Result<Self, ApplicationError> {
        if passphrase.expose_secret().is_empty() {
            return Err(ApplicationError::Configuration(
                "Encryption key must not be empty".to_string(),
            ));
        }

        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_SIZE)
            .map_err(|e| ApplicationError::Configuration(format!("Invalid scrypt parameters: {e}")))?;
        let mut key = [0u8; KEY_SIZE];
        scrypt::scrypt(
            passphrase.expose_secret().as_bytes(),
            salt.as_bytes(),
            &params,
            &mut key,
        )
        .map_err(|e| ApplicationError::Configuration(format!("Key derivation failed: {e}")))?;

        Self::from_key(&key)
    }

    /// Use a raw 32-byte key
    pub fn from_key(key: &[u8]) -> Result<Self, ApplicationError> {
        if key.len() != KEY_SIZE {
            return Err(ApplicationError::Configuration(format!(
                "Encryption key must be {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm16::new_from_slice(key)
            .map_err(|e| ApplicationError::Configuration(format!("Invalid encryption key: {e}")))?;

        debug!("Initialized AES-256-GCM credential cipher");
        Ok(Self { cipher })
    }
}

impl CredentialCipherPort for AesGcmCredentialCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, ApplicationError> {
        let iv = Aes256Gcm16::generate_nonce(&mut OsRng);
        let mut sealed = self.cipher.encrypt(&iv, plaintext.as_bytes()).map_err(|e| {
            warn!(error = %e, "Encryption failed");
            ApplicationError::Internal(format!("Encryption failed: {e}"))
        })?;

        // aes-gcm appends the tag to the ciphertext
        let tag = sealed.split_off(sealed.len() - TAG_SIZE);
        debug!(ciphertext_len = sealed.len(), "Encrypted credential");
        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(sealed)
        ))
    }

    fn decrypt(&self, encoded: &str) -> Result<SecretString, ApplicationError> {
        let mut parts = encoded.split(':');
        let (Some(iv_hex), Some(tag_hex), Some(data_hex), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ApplicationError::Decryption(
                "Expected iv:tag:ciphertext".to_string(),
            ));
        };

        let iv = decode_hex(iv_hex, "IV")?;
        let tag = decode_hex(tag_hex, "tag")?;
        let mut sealed = decode_hex(data_hex, "ciphertext")?;
        if iv.len() != IV_SIZE {
            return Err(ApplicationError::Decryption(format!(
                "IV must be {IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        if tag.len() != TAG_SIZE {
            return Err(ApplicationError::Decryption(format!(
                "Tag must be {TAG_SIZE} bytes, got {}",
                tag.len()
            )));
        }
        sealed.extend_from_slice(&tag);

        let nonce = aes_gcm::Nonce::<U16>::from_slice(&iv);
        let plaintext = self.cipher.decrypt(nonce, sealed.as_slice()).map_err(|_| {
            warn!("Credential failed authentication - tampered or wrong key");
            ApplicationError::Decryption("Authentication tag mismatch".to_string())
        })?;

        let plaintext = String::from_utf8(plaintext)
            .map_err(|_| ApplicationError::Decryption("Plaintext is not UTF-8".to_string()))?;
        Ok(SecretString::from(plaintext))
    }
}

fn decode_hex(value: &str, part: &str) -> Result<Vec<u8>, ApplicationError> {
    hex::decode(value).map_err(|e| ApplicationError::Decryption(format!("Invalid {part} hex: {e}")))
}
