//! Discovery HTTP handler.
//!
//! - `POST /extrict/:extension` (form field `uri`) — Crawl a page and list
//!   signed download links for every media file found.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::post,
    Form, Router,
};
use serde::Deserialize;

use super::{collect_unique, Discovery};
use crate::pages::{results_page, MEDIA_EXTENSIONS};
use crate::token::LinkIssuer;

/// Shared state for discovery requests.
#[derive(Clone)]
pub struct DiscoveryState {
    pub discovery: Arc<dyn Discovery>,
    pub issuer: LinkIssuer,
    /// Traversal-depth bound handed to the collaborator.
    pub depth: usize,
}

/// Form posted from the crawl pages.
#[derive(Debug, Deserialize)]
pub struct SourceForm {
    /// Page to crawl.
    pub uri: String,
}

/// Routes for crawl submissions.
pub fn router(state: DiscoveryState) -> Router {
    Router::new()
        .route("/extrict/:extension", post(extrict))
        .with_state(state)
}

/// POST /extrict/:extension
///
/// Zero hits is not an error: the page says so with a 200.
pub async fn extrict(
    State(state): State<DiscoveryState>,
    Path(extension): Path<String>,
    Form(form): Form<SourceForm>,
) -> Response {
    if !MEDIA_EXTENSIONS.contains(&extension.as_str()) {
        return (StatusCode::NOT_FOUND, "unsupported extension").into_response();
    }

    let candidates = state.discovery.discover(&form.uri, &extension, state.depth);
    let hits = collect_unique(candidates).await;

    tracing::info!(
        source = form.uri.as_str(),
        extension = extension.as_str(),
        hits = hits.len(),
        "Discovery finished"
    );

    Html(results_page(&form.uri, &extension, &hits, &state.issuer)).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use futures::stream::{self, BoxStream, StreamExt};
    use tower::ServiceExt;

    use super::*;
    use crate::crypto::KeySet;

    /// Replays a fixed candidate list and records what it was asked for.
    struct FixedDiscovery {
        candidates: Vec<String>,
        calls: Mutex<Vec<(String, String, usize)>>,
    }

    impl Discovery for FixedDiscovery {
        fn discover(&self, source: &str, extension: &str, depth: usize) -> BoxStream<'static, String> {
            self.calls
                .lock()
                .unwrap()
                .push((source.to_string(), extension.to_string(), depth));
            stream::iter(self.candidates.clone()).boxed()
        }
    }

    fn app(candidates: &[&str]) -> (Router, Arc<FixedDiscovery>) {
        let discovery = Arc::new(FixedDiscovery {
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        });
        let state = DiscoveryState {
            discovery: discovery.clone(),
            issuer: LinkIssuer::new(Arc::new(KeySet::generate()), None),
            depth: 1,
        };
        (router(state), discovery)
    }

    fn post(path: &str, source: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("uri={}", urlencoding::encode(source))))
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_duplicates_rendered_once_in_first_seen_order() {
        let (app, discovery) = app(&[
            "https://cdn.example.com/b.mp4",
            "https://cdn.example.com/a.mp4",
            "https://cdn.example.com/b.mp4",
        ]);

        let response = app
            .oneshot(post("/extrict/mp4", "https://example.com/channel"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = body_string(response).await;
        assert!(page.contains("2 hits for"));
        assert_eq!(page.matches(">Download</a>").count(), 2);
        let b = page.find("cdn.example.com/b.mp4").unwrap();
        let a = page.find("cdn.example.com/a.mp4").unwrap();
        assert!(b < a);

        let calls = discovery.calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[("https://example.com/channel".to_string(), "mp4".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_no_hits_is_ok() {
        let (app, _) = app(&[]);

        let response = app
            .oneshot(post("/extrict/gif", "https://example.com/empty"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains("No hits found for &quot;https://example.com/empty&quot;"));
    }

    #[tokio::test]
    async fn test_unknown_extension_is_not_found() {
        let (app, discovery) = app(&["https://cdn.example.com/a.exe"]);

        let response = app
            .oneshot(post("/extrict/exe", "https://example.com/"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(discovery.calls.lock().unwrap().is_empty());
    }
}
