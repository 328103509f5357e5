//! Media discovery.
//!
//! Discovery is a collaborator of the relay: given a source page, a file
//! extension and a traversal-depth bound, it lazily yields candidate media
//! URIs. The stream is finite and consumed once. Consumers never trust it to
//! be duplicate-free and run it through [`collect_unique`].

pub mod api;
pub mod crawler;

use std::collections::HashSet;

use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

use crate::relay::RelayError;

pub use crawler::HttpCrawler;

/// Anything that can turn a page into candidate media URIs.
pub trait Discovery: Send + Sync {
    /// Produce candidate URIs ending in `.{extension}` found on `source`,
    /// following nested pages at most `depth` levels deep.
    fn discover(&self, source: &str, extension: &str, depth: usize) -> BoxStream<'static, String>;
}

/// Errors hit while crawling a single page. They never abort a discovery
/// request; the page is skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Fetch(#[from] RelayError),

    #[error("failed to read page body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("not an HTML page ({content_type})")]
    NotHtml { content_type: String },

    #[error("page too large ({size}+ bytes)")]
    TooLarge { size: u64 },

    #[error("invalid link pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Drain a candidate stream, keeping the first occurrence of each URI in
/// the order it was produced.
pub async fn collect_unique(mut candidates: BoxStream<'_, String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut hits = Vec::new();

    while let Some(candidate) = candidates.next().await {
        if seen.insert(candidate.clone()) {
            hits.push(candidate);
        }
    }

    hits
}
