//! Encryption at rest for the saved proxy password.
//!
//! The password is sealed with XChaCha20-Poly1305 and stored as hex in the
//! settings file. The key material comes from `WHEELFETCH_MASTER_KEY` when
//! set, otherwise from the system keychain, where one is generated on first
//! save.

use std::env;
use std::panic::{AssertUnwindSafe, catch_unwind};

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Environment variable that overrides the keychain key.
pub const MASTER_KEY_ENV: &str = "WHEELFETCH_MASTER_KEY";

const KEYRING_SERVICE: &str = "wheelfetch";
const KEYRING_ENTRY_NAME: &str = "settings-master-key-v1";
const MAGIC: &[u8; 4] = b"WFP1";
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Errors sealing or opening the saved password.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// No key in the environment and the keychain could not be used.
    #[error(
        "unable to access system keychain for the settings key; set {MASTER_KEY_ENV} or configure keychain access"
    )]
    KeychainUnavailable,
    /// Stored value is not a sealed password.
    #[error("saved proxy password is not a valid encrypted value")]
    InvalidPayload,
    /// Encryption failed.
    #[error("failed to encrypt proxy password")]
    EncryptionFailed,
    /// Decryption failed, usually because the key changed.
    #[error("failed to decrypt saved proxy password (was the key changed?)")]
    DecryptionFailed,
}

/// Key material for sealing, created in the keychain if missing.
///
/// # Errors
///
/// Returns [`SecretError::KeychainUnavailable`] when neither the environment
/// nor the keychain provides a key.
pub fn load_or_create_key() -> Result<String, SecretError> {
    if let Some(key) = env_key() {
        return Ok(key);
    }
    let entry = safe_keyring_entry()?;
    match safe_keyring_get_password(&entry) {
        Ok(existing) if !existing.trim().is_empty() => Ok(existing),
        _ => {
            let generated = generate_key_material();
            safe_keyring_set_password(&entry, &generated)?;
            Ok(generated)
        }
    }
}

/// Key material for opening; never creates one.
///
/// # Errors
///
/// Returns [`SecretError::KeychainUnavailable`] when no key exists.
pub fn load_key() -> Result<String, SecretError> {
    if let Some(key) = env_key() {
        return Ok(key);
    }
    let entry = safe_keyring_entry()?;
    safe_keyring_get_password(&entry)
}

/// Seals `password` and returns it hex encoded.
///
/// # Errors
///
/// Returns [`SecretError::EncryptionFailed`] if the cipher rejects the input.
pub fn seal(password: &str, key_material: &str) -> Result<String, SecretError> {
    let cipher = cipher(key_material);
    let mut nonce = [0_u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), password.as_bytes())
        .map_err(|_| SecretError::EncryptionFailed)?;

    let mut payload = Vec::with_capacity(MAGIC.len() + NONCE_LEN + ciphertext.len());
    payload.extend_from_slice(MAGIC);
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(hex_encode(&payload))
}

/// Opens a value produced by [`seal`].
///
/// # Errors
///
/// Returns [`SecretError::InvalidPayload`] for malformed input and
/// [`SecretError::DecryptionFailed`] for a wrong key.
pub fn open(sealed: &str, key_material: &str) -> Result<String, SecretError> {
    let payload = hex_decode(sealed.trim()).ok_or(SecretError::InvalidPayload)?;
    if payload.len() < MAGIC.len() + NONCE_LEN || &payload[..MAGIC.len()] != MAGIC {
        return Err(SecretError::InvalidPayload);
    }
    let (nonce, ciphertext) = payload[MAGIC.len()..].split_at(NONCE_LEN);
    let plaintext = cipher(key_material)
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| SecretError::DecryptionFailed)?;
    String::from_utf8(plaintext).map_err(|_| SecretError::InvalidPayload)
}

fn env_key() -> Option<String> {
    let key = env::var_os(MASTER_KEY_ENV)?.to_string_lossy().trim().to_string();
    if key.is_empty() { None } else { Some(key) }
}

fn cipher(key_material: &str) -> XChaCha20Poly1305 {
    let digest = Sha256::digest(key_material.as_bytes());
    XChaCha20Poly1305::new(Key::from_slice(&digest[..KEY_LEN]))
}

fn safe_keyring_entry() -> Result<keyring::Entry, SecretError> {
    catch_unwind(|| keyring::Entry::new(KEYRING_SERVICE, KEYRING_ENTRY_NAME))
        .map_err(|_| SecretError::KeychainUnavailable)?
        .map_err(|_| SecretError::KeychainUnavailable)
}

fn safe_keyring_get_password(entry: &keyring::Entry) -> Result<String, SecretError> {
    catch_unwind(AssertUnwindSafe(|| entry.get_password()))
        .map_err(|_| SecretError::KeychainUnavailable)?
        .map_err(|_| SecretError::KeychainUnavailable)
}

fn safe_keyring_set_password(entry: &keyring::Entry, password: &str) -> Result<(), SecretError> {
    catch_unwind(AssertUnwindSafe(|| entry.set_password(password)))
        .map_err(|_| SecretError::KeychainUnavailable)?
        .map_err(|_| SecretError::KeychainUnavailable)
}

fn generate_key_material() -> String {
    let mut bytes = [0_u8; KEY_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
