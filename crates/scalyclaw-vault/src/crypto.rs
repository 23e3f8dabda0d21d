//! AES-256-GCM at-rest encryption with a scrypt-derived key (spec.md §6
//! "Crypto primitives": AES-GCM, 12-byte IV, 16-byte auth tag; ciphertext
//! encoded `hex(iv):hex(tag):hex(ct)`; KDF is scrypt over a fixed salt).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use scrypt::Params;

use crate::error::{Result, VaultError};

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Fixed salt for the scrypt KDF. Not a secret — scrypt's cost parameters
/// are what make brute force expensive; the salt only needs to differ
/// between unrelated applications, which ScalyClaw's literal string does.
const SCRYPT_SALT: &[u8] = b"scalyclaw-vault-kdf-salt-v1";

/// Derive a 32-byte AES-256 key from the vault password via scrypt.
///
/// Uses scrypt's interactive parameters (N=2^15, r=8, p=1) — the crate
/// default recommended for deriving a single key on demand rather than a
/// high-throughput password-verification path.
pub fn derive_key(password: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(15, 8, 1, KEY_LEN).map_err(|_| VaultError::EncryptFailed)?;
    let mut key = [0u8; KEY_LEN];
    scrypt::scrypt(password, SCRYPT_SALT, &params, &mut key)
        .map_err(|_| VaultError::EncryptFailed)?;
    Ok(key)
}

/// Encrypt `plaintext` under `key`, returning `hex(iv):hex(tag):hex(ct)`.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let mut sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| VaultError::EncryptFailed)?;
    // `aes-gcm` appends the 16-byte tag to the ciphertext; split it so the
    // wire format can carry iv/tag/ct as three separate hex fields.
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!("{}:{}:{}", hex::encode(iv), hex::encode(tag), hex::encode(sealed)))
}

/// Inverse of [`encrypt`]. Fails closed on any malformed envelope or auth
/// tag mismatch — callers must treat `Err` as "secret unavailable", never
/// fall back to the plaintext input.
pub fn decrypt(key: &[u8; KEY_LEN], envelope: &str) -> Result<Vec<u8>> {
    let mut parts = envelope.splitn(3, ':');
    let iv_hex = parts
        .next()
        .ok_or_else(|| VaultError::MalformedEnvelope(envelope.to_string()))?;
    let tag_hex = parts
        .next()
        .ok_or_else(|| VaultError::MalformedEnvelope(envelope.to_string()))?;
    let ct_hex = parts
        .next()
        .ok_or_else(|| VaultError::MalformedEnvelope(envelope.to_string()))?;

    let iv = hex::decode(iv_hex).map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;
    let tag = hex::decode(tag_hex).map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;
    let ct = hex::decode(ct_hex).map_err(|e| VaultError::MalformedEnvelope(e.to_string()))?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(VaultError::MalformedEnvelope(envelope.to_string()));
    }

    let mut sealed = ct;
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(&iv);

    cipher
        .decrypt(nonce, sealed.as_ref())
        .map_err(|_| VaultError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_encrypt_decrypt() {
        let key = derive_key(b"correct horse battery staple").unwrap();
        let plaintext = b"sk-ant-REDACTED";

        let envelope = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &envelope).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let key_a = derive_key(b"password-a").unwrap();
        let key_b = derive_key(b"password-b").unwrap();

        let envelope = encrypt(&key_a, b"secret").unwrap();
        assert!(decrypt(&key_b, &envelope).is_err());
    }

    #[test]
    fn malformed_envelope_fails_closed() {
        let key = derive_key(b"password").unwrap();
        assert!(decrypt(&key, "not-a-valid-envelope").is_err());
    }

    #[test]
    fn derive_key_is_deterministic() {
        let a = derive_key(b"same password").unwrap();
        let b = derive_key(b"same password").unwrap();
        assert_eq!(a, b);
    }
}
