//! Process key pair.
//!
//! Loaded once at startup from `VIDLER_PUB_KEY` / `VIDLER_PRIV_KEY` and never
//! mutated afterwards, so it is shared across request tasks behind an `Arc`
//! without any locking.
//!
//! ## Format
//!
//! | Value       | Encoding | Size     |
//! |-------------|----------|----------|
//! | Public key  | hex      | 32 bytes |
//! | Private key | hex      | 32 bytes (Ed25519 seed) |
//! | Signature   | hex      | 64 bytes |

use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use super::signing::Signature;

/// Size of an Ed25519 public key or secret seed in bytes
pub const KEY_SIZE: usize = 32;

/// Environment variable holding the public key.
pub const PUB_KEY_ENV: &str = "VIDLER_PUB_KEY";

/// Environment variable holding the private key.
pub const PRIV_KEY_ENV: &str = "VIDLER_PRIV_KEY";

/// Key material could not be loaded. Always fatal at startup.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{0} not set. Please set {0} in your env.")]
    Missing(&'static str),

    #[error("{alias} is not a valid key: {reason}")]
    Malformed { alias: &'static str, reason: String },

    #[error("VIDLER_PRIV_KEY does not belong to VIDLER_PUB_KEY")]
    Mismatch,
}

/// The relay's signing key pair.
pub struct KeySet {
    /// Canonical (lowercase hex) form of the public key, as embedded in links.
    public_key: String,
    verifying_key: VerifyingKey,
    signing_key: SigningKey,
}

impl KeySet {
    /// Build the key set from its configured hex values.
    ///
    /// Both values are required, and the private key must derive the public
    /// key; anything else means the server must not start.
    pub fn from_hex(public_key: Option<&str>, private_key: Option<&str>) -> Result<Self, KeyError> {
        let public_key = non_empty(public_key).ok_or(KeyError::Missing(PUB_KEY_ENV))?;
        let private_key = non_empty(private_key).ok_or(KeyError::Missing(PRIV_KEY_ENV))?;

        let public_bytes = decode_key(PUB_KEY_ENV, public_key)?;
        let private_bytes = decode_key(PRIV_KEY_ENV, private_key)?;

        let verifying_key =
            VerifyingKey::from_bytes(&public_bytes).map_err(|e| KeyError::Malformed {
                alias: PUB_KEY_ENV,
                reason: e.to_string(),
            })?;
        let signing_key = SigningKey::from_bytes(&private_bytes);

        if signing_key.verifying_key() != verifying_key {
            return Err(KeyError::Mismatch);
        }

        Ok(Self {
            public_key: hex::encode(verifying_key.to_bytes()),
            verifying_key,
            signing_key,
        })
    }

    /// Generate a fresh random key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        Self {
            public_key: hex::encode(verifying_key.to_bytes()),
            verifying_key,
            signing_key,
        }
    }

    /// Public key as embedded in issued links.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Private key seed as hex.
    ///
    /// Only used by `vidler keygen`. Never log this value.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Sign a message. Ed25519 is deterministic, so signing the same message
    /// twice yields the same signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    /// Verify a hex-encoded signature over `message`.
    ///
    /// Malformed signatures (bad hex, wrong length) verify as `false`.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        match Signature::from_hex(signature_hex) {
            Ok(signature) => {
                let sig = Ed25519Signature::from_bytes(&signature.0);
                self.verifying_key.verify(message, &sig).is_ok()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting malformed signature");
                false
            }
        }
    }
}

impl std::fmt::Debug for KeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySet")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn decode_key(alias: &'static str, value: &str) -> Result<[u8; KEY_SIZE], KeyError> {
    let bytes = hex::decode(value).map_err(|e| KeyError::Malformed {
        alias,
        reason: e.to_string(),
    })?;
    bytes.as_slice().try_into().map_err(|_| KeyError::Malformed {
        alias,
        reason: format!("expected {} bytes, got {}", KEY_SIZE, bytes.len()),
    })
}
