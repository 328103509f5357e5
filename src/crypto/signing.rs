//! Ed25519 signatures in their wire (hex) form.

use thiserror::Error;

/// Size of an Ed25519 signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Errors decoding a signature from a link.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("signature must be 64 bytes, got {0}")]
    Length(usize),
}

/// An Ed25519 signature as carried in a download link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Create from a slice (must be exactly 64 bytes)
    fn from_slice(slice: &[u8]) -> Result<Self, SignatureError> {
        let bytes: [u8; SIGNATURE_SIZE] = slice
            .try_into()
            .map_err(|_| SignatureError::Length(slice.len()))?;
        Ok(Self(bytes))
    }

    /// Encode as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(hex_str.trim())?;
        Self::from_slice(&bytes)
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
