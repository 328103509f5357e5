//! Built-in HTTP crawler.
//!
//! Fetches the source page, pulls `href` / `src` / `content` attribute values
//! out of the markup, resolves them against the page URL and yields the ones
//! whose path ends in the wanted extension. Same-host pages linked from the
//! source are crawled too, up to the depth bound (depth 0 only scans the
//! source page itself).
//!
//! Pages are fetched lazily, one at a time, as the consumer polls the stream.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use regex::Regex;
use reqwest::{header, Url};

use super::{Discovery, DiscoveryError};
use crate::relay::{client::parse_origin_uri, OriginClient, RelayError};

/// Upper bound on pages fetched for one discovery request.
pub const MAX_PAGES_PER_CRAWL: usize = 50;

/// Pages larger than this are skipped.
pub const MAX_PAGE_SIZE: u64 = 5 * 1024 * 1024;

/// Extensions of nested links worth fetching as pages.
const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "php", "asp", "aspx", "jsp"];

/// Crawls pages over HTTP with the relay's origin client.
#[derive(Clone)]
pub struct HttpCrawler {
    client: OriginClient,
    link_pattern: Arc<Regex>,
    max_pages: usize,
}

impl HttpCrawler {
    pub fn new(client: OriginClient) -> Result<Self, DiscoveryError> {
        let link_pattern =
            Regex::new(r#"(?i)\b(?:href|src|content)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'<>`]+))"#)?;

        Ok(Self {
            client,
            link_pattern: Arc::new(link_pattern),
            max_pages: MAX_PAGES_PER_CRAWL,
        })
    }

    /// Fetch a page and return its markup.
    async fn fetch_page(&self, page: &Url) -> Result<String, DiscoveryError> {
        let response = self.client.get(page.as_str()).await?;

        if !response.status().is_success() {
            return Err(RelayError::OriginStatus {
                uri: page.to_string(),
                status: response.status(),
            }
            .into());
        }

        if let Some(size) = response.content_length() {
            if size > MAX_PAGE_SIZE {
                return Err(DiscoveryError::TooLarge { size });
            }
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        if !content_type.contains("html") {
            return Err(DiscoveryError::NotHtml { content_type });
        }

        // Chunked pages carry no Content-Length; count what is read.
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            body.extend_from_slice(&chunk.map_err(DiscoveryError::Body)?);
            if body.len() as u64 > MAX_PAGE_SIZE {
                return Err(DiscoveryError::TooLarge {
                    size: body.len() as u64,
                });
            }
        }

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Every link in `html`, resolved against `page`, without fragments.
    fn extract_links(&self, page: &Url, html: &str) -> Vec<Url> {
        self.link_pattern
            .captures_iter(html)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
            .filter_map(|raw| {
                let raw = raw.as_str().trim().replace("&amp;", "&");
                let mut url = page.join(&raw).ok()?;
                url.set_fragment(None);
                matches!(url.scheme(), "http" | "https").then_some(url)
            })
            .collect()
    }
}

impl Discovery for HttpCrawler {
    fn discover(&self, source: &str, extension: &str, depth: usize) -> BoxStream<'static, String> {
        let source = match parse_origin_uri(source) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot crawl source page");
                return stream::empty().boxed();
            }
        };

        let mut visited = HashSet::new();
        visited.insert(source.as_str().to_string());

        let state = CrawlState {
            crawler: self.clone(),
            suffix: format!(".{}", extension.trim_start_matches('.').to_ascii_lowercase()),
            depth_bound: depth,
            queue: VecDeque::from([(source, 0)]),
            visited,
            pending: VecDeque::new(),
            fetched: 0,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(hit) = state.pending.pop_front() {
                    return Some((hit, state));
                }
                if state.fetched >= state.crawler.max_pages {
                    tracing::debug!(pages = state.fetched, "Crawl page budget exhausted");
                    return None;
                }

                let (page, depth) = state.queue.pop_front()?;
                state.fetched += 1;
                state.scan(&page, depth).await;
            }
        })
        .boxed()
    }
}

/// Progress of one lazy crawl.
struct CrawlState {
    crawler: HttpCrawler,
    /// Lowercase `.ext` suffix of wanted media paths.
    suffix: String,
    depth_bound: usize,
    /// Pages still to fetch, with their depth.
    queue: VecDeque<(Url, usize)>,
    visited: HashSet<String>,
    /// Hits found but not yet yielded.
    pending: VecDeque<String>,
    fetched: usize,
}

impl CrawlState {
    async fn scan(&mut self, page: &Url, depth: usize) {
        let html = match self.crawler.fetch_page(page).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(page = page.as_str(), error = %e, "Skipping page");
                return;
            }
        };

        for link in self.crawler.extract_links(page, &html) {
            if link.path().to_ascii_lowercase().ends_with(&self.suffix) {
                self.pending.push_back(link.to_string());
            } else if depth < self.depth_bound
                && link.host_str() == page.host_str()
                && looks_like_page(&link)
                && self.visited.insert(link.as_str().to_string())
            {
                self.queue.push_back((link, depth + 1));
            }
        }

        tracing::debug!(
            page = page.as_str(),
            depth,
            hits = self.pending.len(),
            queued = self.queue.len(),
            "Scanned page"
        );
    }
}

/// Extensionless paths and common markup extensions are treated as pages.
fn looks_like_page(url: &Url) -> bool {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    match last.rsplit_once('.') {
        None => true,
        Some((_, ext)) => PAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
    }
}
