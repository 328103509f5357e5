//! Signed download relay.
//!
//! Validates a capability token, then fetches the resource from its origin and
//! forwards it to the client:
//!
//! - `GET /head` relays only the origin's headers (an existence probe).
//! - `GET|POST /download` relays headers, a synthesized `Content-Disposition`,
//!   and the body as a stream.
//!
//! The body is moved chunk by chunk from the origin connection into the
//! response, so memory use does not grow with the size of the media. If the
//! client goes away mid-transfer the response body is dropped, which drops the
//! origin stream and releases its connection instead of draining it.

pub mod api;
pub mod client;
pub mod error;
pub mod headers;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::TryStreamExt;

use crate::crypto::KeySet;
use crate::token::{validate_token, DownloadItem, TokenError};

pub use client::{OriginClient, OriginConfig};
pub use error::RelayError;

/// Token validation plus origin fetches. Cheap to clone; shared by all
/// request tasks.
#[derive(Clone)]
pub struct Relay {
    keys: Arc<KeySet>,
    origin: OriginClient,
    /// Answer with the origin's status when it is 4xx/5xx instead of 200.
    preserve_origin_errors: bool,
}

impl Relay {
    pub fn new(keys: Arc<KeySet>, origin: OriginClient, preserve_origin_errors: bool) -> Self {
        Self {
            keys,
            origin,
            preserve_origin_errors,
        }
    }

    /// Check a token presented on `/head` or `/download`.
    pub fn validate_token(&self, item: &DownloadItem) -> Result<(), TokenError> {
        validate_token(&self.keys, item, Utc::now().timestamp()).inspect_err(|e| {
            tracing::warn!(uri = item.uri.as_str(), error = %e, "Rejected download token");
        })
    }

    /// HEAD the origin and return its headers unmodified.
    pub async fn probe_head(&self, uri: &str) -> Result<HeaderMap, RelayError> {
        let response = self.origin.head(uri).await?;
        self.check_status(uri, response.status())?;

        tracing::debug!(uri, status = response.status().as_u16(), "Probed origin");
        Ok(response.headers().clone())
    }

    /// GET the origin and build a response that streams its body.
    ///
    /// Status and headers are fixed before any body byte is forwarded.
    pub async fn stream_download(&self, uri: &str) -> Result<Response, RelayError> {
        let response = self.origin.get(uri).await?;
        let status = response.status();
        self.check_status(uri, status)?;

        let mut relayed = HeaderMap::new();
        headers::relay_headers(response.headers(), &mut relayed);
        headers::strip_hop_by_hop(&mut relayed);
        relayed.insert(
            header::CONTENT_DISPOSITION,
            headers::content_disposition(&headers::basename(uri)),
        );

        tracing::info!(
            uri,
            origin_status = status.as_u16(),
            content_length = response.content_length(),
            "Relaying download"
        );

        let stream_uri = uri.to_string();
        let body = response.bytes_stream().inspect_err(move |e| {
            tracing::warn!(uri = stream_uri.as_str(), error = %e, "Origin stream failed mid-transfer");
        });

        Ok((StatusCode::OK, relayed, Body::from_stream(body)).into_response())
    }

    fn check_status(&self, uri: &str, status: StatusCode) -> Result<(), RelayError> {
        if self.preserve_origin_errors && (status.is_client_error() || status.is_server_error()) {
            return Err(RelayError::OriginStatus {
                uri: uri.to_string(),
                status,
            });
        }
        Ok(())
    }
}
