//! Author identity primitives for the logbook.
//!
//! This crate provides:
//! - Ed25519 key pairs (`SecretKey` / `PublicKey`)
//! - Detached signatures over arbitrary bytes
//! - Profile identifiers derived from public keys

pub mod key;
pub mod profile;

pub use key::{KeyParsingError, PublicKey, SecretKey, Signature, SignatureError};
pub use profile::{id_from_public_key, id_from_secret_key};
