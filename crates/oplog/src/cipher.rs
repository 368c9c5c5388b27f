//! At-rest encryption for serialized journals.
//!
//! Envelope layout:
//! `[4-byte BE ciphertext length][12-byte nonce][ciphertext][16-byte tag]`
//!
//! The symmetric key is derived from the author's signing key with a
//! fixed-context KDF, so the journal can only be opened by the key that
//! wrote it.

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;

use identity::SecretKey;

use crate::error::{Error, Result};

const KEY_CONTEXT: &str = "logbook 2026-01-12 at-rest journal encryption";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const HEADER_LEN: usize = 4 + NONCE_LEN;

/// Derive the at-rest symmetric key from a signing key.
fn derive_key(key: &SecretKey) -> [u8; 32] {
    blake3::derive_key(KEY_CONTEXT, &key.to_bytes())
}

/// Seal plaintext into an envelope only `key` can open.
pub fn seal(key: &SecretKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let aead = ChaCha20Poly1305::new(Key::from_slice(&derive_key(key)));

    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    // sealed = ciphertext || tag
    let sealed = aead
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| Error::Cipher)?;
    let ct_len = (sealed.len() - TAG_LEN) as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + sealed.len());
    out.extend_from_slice(&ct_len.to_be_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open an envelope produced by [`seal`] with the same key.
pub fn open(key: &SecretKey, envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < HEADER_LEN + TAG_LEN {
        return Err(Error::Cipher);
    }

    let ct_len = u32::from_be_bytes(envelope[..4].try_into().expect("slice length checked"));
    let (nonce, sealed) = envelope[4..].split_at(NONCE_LEN);
    if sealed.len() != ct_len as usize + TAG_LEN {
        return Err(Error::Cipher);
    }

    let aead = ChaCha20Poly1305::new(Key::from_slice(&derive_key(key)));
    aead.decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| Error::Cipher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let key = SecretKey::generate();
        let msg = b"an encrypted journal";

        let envelope = seal(&key, msg).unwrap();
        assert_eq!(open(&key, &envelope).unwrap(), msg);
    }

    #[test]
    fn test_envelope_layout() {
        let key = SecretKey::generate();
        let msg = b"twelve bytes";

        let envelope = seal(&key, msg).unwrap();
        assert_eq!(envelope.len(), HEADER_LEN + msg.len() + TAG_LEN);

        let ct_len = u32::from_be_bytes(envelope[..4].try_into().unwrap());
        assert_eq!(ct_len as usize, msg.len());
    }

    #[test]
    fn test_wrong_key_fails() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();

        let envelope = seal(&a, b"secret").unwrap();
        assert!(matches!(open(&b, &envelope), Err(Error::Cipher)));
    }

    #[test]
    fn test_tampered_envelope_fails() {
        let key = SecretKey::generate();
        let mut envelope = seal(&key, b"secret").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0x01;
        assert!(matches!(open(&key, &envelope), Err(Error::Cipher)));
    }

    #[test]
    fn test_truncated_envelope_fails() {
        let key = SecretKey::generate();
        let envelope = seal(&key, b"secret").unwrap();
        assert!(open(&key, &envelope[..HEADER_LEN]).is_err());
        assert!(open(&key, &[]).is_err());
    }

    #[test]
    fn test_nonce_varies_between_seals() {
        let key = SecretKey::generate();
        let one = seal(&key, b"same plaintext").unwrap();
        let two = seal(&key, b"same plaintext").unwrap();
        assert_ne!(one, two);
    }
}
