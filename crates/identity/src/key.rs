//! Ed25519 key pairs used to attribute and verify log data.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

/// A public key identifying a logbook author.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// The length of an ed25519 `PublicKey`, in bytes.
    pub const LENGTH: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

    /// Get this public key as a byte array.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Construct a `PublicKey` from its byte representation.
    ///
    /// Fails if the bytes do not represent a valid ed25519 curve point.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, KeyParsingError> {
        let key = VerifyingKey::from_bytes(bytes)?;
        Ok(Self(key))
    }

    /// Verify a signature on a message against this public key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        self.0
            .verify_strict(message, &signature.0)
            .map_err(|_| SignatureError)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", bs58::encode(self.as_bytes()).into_string())
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.as_bytes()).into_string())
    }
}

impl FromStr for PublicKey {
    type Err = KeyParsingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 32] = bs58::decode(s)
            .into_vec()?
            .try_into()
            .map_err(|_| KeyParsingError::InvalidLength)?;
        Self::from_bytes(&bytes)
    }
}

/// A secret key. Owns the signing half of an author's key pair.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl SecretKey {
    /// Generate a new secret key from the operating system's entropy source.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        Self(SigningKey::generate(&mut rng))
    }

    /// The public key of this `SecretKey`.
    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    /// Sign the given message and return a detached signature.
    pub fn sign(&self, msg: &[u8]) -> Signature {
        Signature(self.0.sign(msg))
    }

    /// The bytes representing the secret part. The public part can always
    /// be recovered.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Create a secret key from its byte representation.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }
}

impl Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(..)")
    }
}

/// An ed25519 signature over canonical log bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    /// The length of an ed25519 `Signature`, in bytes.
    pub const LENGTH: usize = ed25519_dalek::Signature::BYTE_SIZE;

    /// Return the inner byte array.
    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        self.0.to_bytes()
    }

    /// Parse a signature from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyParsingError> {
        let bytes: [u8; Self::LENGTH] = bytes
            .try_into()
            .map_err(|_| KeyParsingError::InvalidLength)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&bytes)))
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", bs58::encode(self.to_bytes()).into_string())
    }
}

/// Error when parsing a key or signature from bytes or text.
#[derive(Debug, thiserror::Error)]
pub enum KeyParsingError {
    /// Base-58 decoding failed.
    #[error("invalid base-58 encoding")]
    Decode(#[from] bs58::decode::Error),
    /// The bytes do not form a valid ed25519 key.
    #[error("invalid key material")]
    Key(#[from] ed25519_dalek::SignatureError),
    /// The encoded information had the wrong length.
    #[error("invalid length")]
    InvalidLength,
}

/// Verification of a signature failed.
#[derive(Debug, thiserror::Error)]
#[error("invalid signature")]
pub struct SignatureError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_roundtrip() {
        let key = SecretKey::generate();
        let msg = b"an operation log";

        let sig = key.sign(msg);
        key.public().verify(msg, &sig).unwrap();
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let a = SecretKey::generate();
        let b = SecretKey::generate();

        let sig = a.sign(b"payload");
        assert!(b.public().verify(b"payload", &sig).is_err());
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let key = SecretKey::generate();
        let sig = key.sign(b"payload");
        assert!(key.public().verify(b"payload!", &sig).is_err());
    }

    #[test]
    fn test_public_key_string_roundtrip() {
        let key = SecretKey::generate().public();
        let parsed: PublicKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn test_secret_key_bytes_roundtrip() {
        let key = SecretKey::generate();
        let restored = SecretKey::from_bytes(&key.to_bytes());
        assert_eq!(key.public(), restored.public());
    }

    #[test]
    fn test_public_key_parse_rejects_garbage() {
        assert!("not-a-key".parse::<PublicKey>().is_err());
    }
}
