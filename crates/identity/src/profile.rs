//! Profile identifiers derived from public keys.
//!
//! A profile id is the base-58 encoding of an IPFS-style multihash
//! (sha2-256) over the raw public key bytes. It is treated as an opaque
//! string everywhere above this crate.

use sha2::{Digest, Sha256};

use crate::key::{PublicKey, SecretKey};

// multihash header for a 32-byte sha2-256 digest
const MH_SHA2_256: u8 = 0x12;
const MH_LEN: u8 = 0x20;

/// Derive the profile identifier for a public key.
pub fn id_from_public_key(key: &PublicKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut buf = Vec::with_capacity(2 + digest.len());
    buf.push(MH_SHA2_256);
    buf.push(MH_LEN);
    buf.extend_from_slice(&digest);
    bs58::encode(buf).into_string()
}

/// Derive the profile identifier for the public half of a secret key.
pub fn id_from_secret_key(key: &SecretKey) -> String {
    id_from_public_key(&key.public())
}
