//! Relay HTTP handlers.
//!
//! - `GET  /head?uri=…&pubkey=…&signature=…`     — Relay origin headers only
//! - `GET  /download?uri=…&pubkey=…&signature=…` — Stream the origin resource
//! - `POST /download` (form body, same fields)   — Same as GET

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};

use super::headers::{relay_headers, strip_hop_by_hop};
use super::Relay;
use crate::token::{DownloadItem, TokenError};

/// Routes served by the relay.
pub fn router(relay: Relay) -> Router {
    Router::new()
        .route("/head", get(head))
        .route("/download", get(download).post(download))
        .with_state(relay)
}

/// Unreadable link parameters are a token error like any other.
fn download_item(
    form: Result<Form<DownloadItem>, FormRejection>,
) -> Result<DownloadItem, TokenError> {
    form.map(|Form(item)| item).map_err(|rejection| {
        tracing::warn!(error = %rejection, "Rejected malformed download request");
        TokenError::Malformed(rejection.body_text())
    })
}

/// GET /head
///
/// Validates the token, then answers with the origin's headers and no body.
/// `Content-Length` describes the origin body, not this empty one, so it is
/// not relayed here.
pub async fn head(
    State(relay): State<Relay>,
    form: Result<Form<DownloadItem>, FormRejection>,
) -> Response {
    let item = match download_item(form) {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = relay.validate_token(&item) {
        return e.into_response();
    }

    match relay.probe_head(&item.uri).await {
        Ok(origin_headers) => {
            let mut headers = HeaderMap::new();
            relay_headers(&origin_headers, &mut headers);
            strip_hop_by_hop(&mut headers);
            headers.remove(header::CONTENT_LENGTH);
            (StatusCode::OK, headers).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET|POST /download
pub async fn download(
    State(relay): State<Relay>,
    form: Result<Form<DownloadItem>, FormRejection>,
) -> Response {
    let item = match download_item(form) {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = relay.validate_token(&item) {
        return e.into_response();
    }

    relay
        .stream_download(&item.uri)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}
