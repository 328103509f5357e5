//! Link signing.
//!
//! Every download link handed out by the server carries an Ed25519 signature
//! over the resource URI. The relay only fetches URIs whose signature checks
//! out against the process key pair.
//!
//! ```text
//!   issue:   uri ──► Sign(private key) ──► hex signature ──► /download?uri=…&signature=…&pubkey=…
//!   relay:   uri + signature ──► Verify(public key) ──► true / false
//! ```

mod keys;
mod signing;

pub use keys::{KeySet, PRIV_KEY_ENV, PUB_KEY_ENV};
