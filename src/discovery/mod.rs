use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use url::Url;

use crate::config::DiscoveryStrategy;
use crate::error::Result;
use crate::models::{ProductUrl, SiteConfig};
use crate::utils::http::FetchPolicy;

mod crawl;
mod paginated;

pub use crawl::CrawlDiscoverer;
pub use paginated::PaginatedDiscoverer;

/// Finds up to `desired` product URLs for a site. Fewer is not an error.
#[async_trait]
pub trait UrlDiscoverer: Send + Sync {
    async fn discover(&self, client: &Client, site: &SiteConfig, desired: usize) -> Result<Vec<ProductUrl>>;
}

/// Pick the discovery strategy configured for `site`.
pub fn discoverer_for(site: &SiteConfig, policy: FetchPolicy) -> Box<dyn UrlDiscoverer> {
    match &site.discovery {
        DiscoveryStrategy::Crawl { max_pages } => Box::new(CrawlDiscoverer::new(*max_pages, policy)),
        DiscoveryStrategy::Paginated {
            listing_path,
            page_param,
            max_pages,
        } => Box::new(PaginatedDiscoverer::new(
            listing_path.clone(),
            page_param.clone(),
            *max_pages,
            policy,
        )),
    }
}

/// Insertion-ordered, deduplicated set of product URLs with a hard cap.
#[derive(Debug)]
pub(crate) struct UrlCollector {
    urls: Vec<ProductUrl>,
    seen: HashSet<String>,
    limit: usize,
}

impl UrlCollector {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            urls: Vec::with_capacity(limit.min(1024)),
            seen: HashSet::new(),
            limit,
        }
    }

    /// Add URLs until the cap is hit; returns how many were new.
    pub(crate) fn extend(&mut self, urls: impl IntoIterator<Item = Url>) -> usize {
        let mut added = 0;
        for url in urls {
            if self.is_full() {
                break;
            }
            if self.seen.insert(url.as_str().to_string()) {
                self.urls.push(ProductUrl(url.into()));
                added += 1;
            }
        }
        added
    }

    pub(crate) fn is_full(&self) -> bool {
        self.urls.len() >= self.limit
    }

    pub(crate) fn len(&self) -> usize {
        self.urls.len()
    }

    pub(crate) fn into_urls(self) -> Vec<ProductUrl> {
        self.urls
    }
}
