//! Signed download link construction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::signed_message;
use crate::crypto::KeySet;

/// Turns a discovered media URI into a signed `/download` link.
#[derive(Clone)]
pub struct LinkIssuer {
    keys: Arc<KeySet>,
    /// Lifetime of issued links. `None` issues links that never expire.
    ttl: Option<Duration>,
}

impl LinkIssuer {
    pub fn new(keys: Arc<KeySet>, ttl: Option<Duration>) -> Self {
        Self { keys, ttl }
    }

    /// Issue a link for `uri` as of now.
    pub fn issue_link(&self, uri: &str) -> String {
        self.issue_link_at(uri, Utc::now().timestamp())
    }

    /// Issue a link for `uri` as of the unix timestamp `now`.
    ///
    /// All query values are percent-encoded.
    pub fn issue_link_at(&self, uri: &str, now: i64) -> String {
        let expires = self
            .ttl
            .map(|ttl| now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)));
        let signature = self.keys.sign(&signed_message(uri, expires));

        let mut link = format!(
            "/download?uri={}&signature={}&pubkey={}",
            urlencoding::encode(uri),
            urlencoding::encode(&signature.to_hex()),
            urlencoding::encode(self.keys.public_key()),
        );
        if let Some(expires) = expires {
            link.push_str(&format!("&expires={}", expires));
        }
        link
    }
}
