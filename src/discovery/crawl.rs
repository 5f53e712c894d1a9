use async_trait::async_trait;
use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

use super::{UrlCollector, UrlDiscoverer};
use crate::error::Result;
use crate::models::{ProductUrl, SiteConfig};
use crate::parsers::parse_listing;
use crate::utils::http::{fetch_page, FetchPolicy};

/// Breadth-first crawl from the site root over category-looking links.
/// Product pages are collected but never fetched here.
pub struct CrawlDiscoverer {
    max_pages: usize,
    policy: FetchPolicy,
}

impl CrawlDiscoverer {
    pub fn new(max_pages: usize, policy: FetchPolicy) -> Self {
        Self { max_pages, policy }
    }
}

#[async_trait]
impl UrlDiscoverer for CrawlDiscoverer {
    async fn discover(&self, client: &Client, site: &SiteConfig, desired: usize) -> Result<Vec<ProductUrl>> {
        let mut collector = UrlCollector::new(desired);
        let mut queue = VecDeque::from([site.base_url.clone()]);
        let mut queued: HashSet<String> = HashSet::from([site.base_url.to_string()]);
        let mut fetched = 0;

        while let Some(page_url) = queue.pop_front() {
            if fetched >= self.max_pages {
                info!("Reached the {} page crawl limit on {}", self.max_pages, site.id);
                break;
            }
            fetched += 1;

            let links = match fetch_page(client, page_url.as_str(), self.policy)
                .await
                .and_then(|body| parse_listing(&body, &page_url, site))
            {
                Ok(links) => links,
                Err(e) if fetched == 1 => return Err(e),
                Err(e) => {
                    warn!("Skipping listing page {}: {}", page_url, e);
                    continue;
                }
            };

            let added = collector.extend(links.products);
            debug!("{}: {} new product URLs ({} total)", page_url, added, collector.len());

            if collector.is_full() {
                break;
            }

            for category in links.categories {
                if queued.insert(category.to_string()) {
                    queue.push_back(category);
                }
            }
        }

        info!(
            "Crawled {} pages on {}, found {} product URLs",
            fetched,
            site.id,
            collector.len()
        );
        Ok(collector.into_urls())
    }
}
