//! Capability tokens.
//!
//! A token is the triple {uri, pubkey, signature} carried in a download link.
//! Tokens are never stored: the issuer derives them from the key pair and the
//! relay re-verifies them on every request.

mod issuer;

pub use issuer::LinkIssuer;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use thiserror::Error;

use crate::crypto::KeySet;

/// Query/form parameters of `/head` and `/download`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadItem {
    /// Resource to relay.
    pub uri: String,
    /// Public key the link was issued under.
    #[serde(default, rename = "pubkey")]
    pub public_key: String,
    /// Hex signature over the signed message.
    #[serde(default)]
    pub signature: String,
    /// Unix timestamp after which the link is dead (only on expiring links).
    #[serde(default)]
    pub expires: Option<i64>,
}

/// A download link that failed validation. Always a client error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid publickey")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid uri")]
    InvalidUri,

    #[error("link expired")]
    Expired,

    #[error("invalid request: {0}")]
    Malformed(String),
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Prefix of the expiring message form. The NUL never appears in an accepted
/// URI, so an expiring signature cannot verify as a bare-URI one.
const EXPIRING_TAG: &str = "vidler-expiring-link\0";

/// The bytes a link signature covers: the bare URI, or
/// `EXPIRING_TAG + expires + NUL + uri` for expiring links.
pub fn signed_message(uri: &str, expires: Option<i64>) -> Vec<u8> {
    match expires {
        Some(expires) => format!("{}{}\0{}", EXPIRING_TAG, expires, uri).into_bytes(),
        None => uri.as_bytes().to_vec(),
    }
}

/// Check a token against the process key pair.
///
/// A public key mismatch is rejected before any signature work is done.
/// URIs carrying control characters are refused before verification.
pub fn validate_token(keys: &KeySet, item: &DownloadItem, now: i64) -> Result<(), TokenError> {
    if item.public_key != keys.public_key() {
        return Err(TokenError::InvalidPublicKey);
    }

    if item.uri.chars().any(char::is_control) {
        return Err(TokenError::InvalidUri);
    }

    if !keys.verify(&signed_message(&item.uri, item.expires), &item.signature) {
        return Err(TokenError::InvalidSignature);
    }

    match item.expires {
        Some(expires) if now > expires => Err(TokenError::Expired),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "https://example.com/path/video.mp4?q=1";

    fn item(keys: &KeySet, uri: &str) -> DownloadItem {
        DownloadItem {
            uri: uri.to_string(),
            public_key: keys.public_key().to_string(),
            signature: keys.sign(uri.as_bytes()).to_hex(),
            expires: None,
        }
    }

    #[test]
    fn test_valid_token_passes() {
        let keys = KeySet::generate();
        assert_eq!(validate_token(&keys, &item(&keys, URI), 0), Ok(()));
    }

    #[test]
    fn test_wrong_public_key_rejected_even_with_good_signature() {
        let keys = KeySet::generate();
        let other = KeySet::generate();

        let mut item = item(&keys, URI);
        item.public_key = other.public_key().to_string();

        assert_eq!(
            validate_token(&keys, &item, 0),
            Err(TokenError::InvalidPublicKey)
        );
    }

    #[test]
    fn test_signature_for_other_uri_rejected() {
        let keys = KeySet::generate();

        let mut item = item(&keys, URI);
        item.uri = "https://example.com/path/other.mp4".to_string();

        assert_eq!(
            validate_token(&keys, &item, 0),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_signature_rejected() {
        let keys = KeySet::generate();

        let mut item = item(&keys, URI);
        item.signature.clear();

        assert_eq!(
            validate_token(&keys, &item, 0),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expiring_token() {
        let keys = KeySet::generate();
        let expires = 1_000;
        let item = DownloadItem {
            uri: URI.to_string(),
            public_key: keys.public_key().to_string(),
            signature: keys.sign(&signed_message(URI, Some(expires))).to_hex(),
            expires: Some(expires),
        };

        assert_eq!(validate_token(&keys, &item, 999), Ok(()));
        assert_eq!(validate_token(&keys, &item, 1_000), Ok(()));
        assert_eq!(validate_token(&keys, &item, 1_001), Err(TokenError::Expired));
    }

    #[test]
    fn test_extending_expiry_breaks_signature() {
        let keys = KeySet::generate();
        let mut item = DownloadItem {
            uri: URI.to_string(),
            public_key: keys.public_key().to_string(),
            signature: keys.sign(&signed_message(URI, Some(1_000))).to_hex(),
            expires: Some(1_000),
        };
        item.expires = Some(i64::MAX);

        assert_eq!(
            validate_token(&keys, &item, 0),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expiry_cannot_be_folded_into_uri() {
        let keys = KeySet::generate();
        let signature = keys.sign(&signed_message(URI, Some(60))).to_hex();

        // Expiry moved into the URI, `expires` dropped.
        let folded = DownloadItem {
            uri: format!("{}\n60", URI),
            public_key: keys.public_key().to_string(),
            signature: signature.clone(),
            expires: None,
        };
        assert_eq!(validate_token(&keys, &folded, 1_000), Err(TokenError::InvalidUri));
        assert!(!keys.verify(folded.uri.as_bytes(), &signature));

        // The whole expiring message replayed as a bare URI.
        let replayed = DownloadItem {
            uri: String::from_utf8(signed_message(URI, Some(60))).unwrap(),
            expires: None,
            ..folded
        };
        assert!(keys.verify(replayed.uri.as_bytes(), &signature));
        assert_eq!(validate_token(&keys, &replayed, 1_000), Err(TokenError::InvalidUri));
    }

    #[test]
    fn test_control_characters_rejected_before_signature() {
        let keys = KeySet::generate();
        let uri = "https://example.com/a\tb.mp4";
        assert_eq!(
            validate_token(&keys, &item(&keys, uri), 0),
            Err(TokenError::InvalidUri)
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(TokenError::InvalidPublicKey.to_string(), "invalid publickey");
        assert_eq!(TokenError::InvalidSignature.to_string(), "invalid signature");
        assert_eq!(TokenError::InvalidUri.to_string(), "invalid uri");
        assert_eq!(TokenError::Expired.to_string(), "link expired");
    }

    #[test]
    fn test_error_response_is_bad_request() {
        let response = TokenError::InvalidSignature.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
