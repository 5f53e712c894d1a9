use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

use super::{UrlCollector, UrlDiscoverer};
use crate::error::{Result, ScraperError};
use crate::models::{ProductUrl, SiteConfig};
use crate::parsers::parse_listing;
use crate::utils::http::{fetch_page, FetchPolicy};

/// Walks `listing_path?page=1`, `?page=2`, ... until enough URLs are found
/// or a page contributes nothing new.
pub struct PaginatedDiscoverer {
    listing_path: String,
    page_param: String,
    max_pages: usize,
    policy: FetchPolicy,
}

impl PaginatedDiscoverer {
    pub fn new(listing_path: String, page_param: String, max_pages: usize, policy: FetchPolicy) -> Self {
        Self {
            listing_path,
            page_param,
            max_pages,
            policy,
        }
    }

    fn page_url(&self, site: &SiteConfig, page: usize) -> Result<Url> {
        let mut url = site
            .base_url
            .join(&self.listing_path)
            .map_err(|e| ScraperError::Config(format!("Site {}: bad listing path: {}", site.id, e)))?;
        url.query_pairs_mut()
            .append_pair(&self.page_param, &page.to_string());
        Ok(url)
    }
}

#[async_trait]
impl UrlDiscoverer for PaginatedDiscoverer {
    async fn discover(&self, client: &Client, site: &SiteConfig, desired: usize) -> Result<Vec<ProductUrl>> {
        let mut collector = UrlCollector::new(desired);

        for page in 1..=self.max_pages {
            let page_url = self.page_url(site, page)?;

            let links = match fetch_page(client, page_url.as_str(), self.policy)
                .await
                .and_then(|body| parse_listing(&body, &page_url, site))
            {
                Ok(links) => links,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!("Stopping discovery on {} at page {}: {}", site.id, page, e);
                    break;
                }
            };

            let added = collector.extend(links.products);
            info!(
                "Listing page {} of {}: {} new product URLs ({} total)",
                page,
                site.id,
                added,
                collector.len()
            );

            if collector.is_full() {
                break;
            }
            if added == 0 {
                info!("No new products on page {}, {} is exhausted", page, site.id);
                break;
            }
        }

        Ok(collector.into_urls())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryStrategy;
    use crate::discovery::test_support::{anchors, site};
    use crate::utils::http::test_policy;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_page(server: &MockServer, page: &str, body: String) {
        Mock::given(method("GET"))
            .and(path("/listing"))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn discoverer() -> PaginatedDiscoverer {
        PaginatedDiscoverer::new("/listing".to_string(), "page".to_string(), 10, test_policy())
    }

    fn acme(server: &MockServer) -> SiteConfig {
        site(
            &server.uri(),
            DiscoveryStrategy::Paginated {
                listing_path: "/listing".to_string(),
                page_param: "page".to_string(),
                max_pages: 10,
            },
        )
    }

    fn strs(urls: &[ProductUrl], base: &str) -> Vec<String> {
        urls.iter().map(|u| u.0.replace(base, "")).collect()
    }

    #[tokio::test]
    async fn two_page_listing_yields_three_urls_in_order() {
        let server = MockServer::start().await;
        mount_page(&server, "1", anchors(&["/product/a", "/about", "/product/b"])).await;
        mount_page(&server, "2", anchors(&["/product/a", "/product/c"])).await;

        let urls = discoverer()
            .discover(&Client::new(), &acme(&server), 3)
            .await
            .unwrap();

        assert_eq!(
            strs(&urls, &server.uri()),
            vec!["/product/a", "/product/b", "/product/c"]
        );
    }

    #[tokio::test]
    async fn never_returns_more_than_desired() {
        let server = MockServer::start().await;
        mount_page(&server, "1", anchors(&["/product/a", "/product/b", "/product/c"])).await;

        let urls = discoverer()
            .discover(&Client::new(), &acme(&server), 2)
            .await
            .unwrap();

        assert_eq!(strs(&urls, &server.uri()), vec!["/product/a", "/product/b"]);
    }

    #[tokio::test]
    async fn exhausted_site_returns_fewer_without_error() {
        let server = MockServer::start().await;
        mount_page(&server, "1", anchors(&["/product/a"])).await;
        mount_page(&server, "2", anchors(&["/product/a"])).await;

        let urls = discoverer()
            .discover(&Client::new(), &acme(&server), 5)
            .await
            .unwrap();

        assert_eq!(strs(&urls, &server.uri()), vec!["/product/a"]);
    }

    #[tokio::test]
    async fn missing_later_page_ends_discovery() {
        let server = MockServer::start().await;
        mount_page(&server, "1", anchors(&["/product/a", "/product/b"])).await;

        let urls = discoverer()
            .discover(&Client::new(), &acme(&server), 5)
            .await
            .unwrap();

        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_first_page_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = discoverer()
            .discover(&Client::new(), &acme(&server), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { .. }));
    }

    #[tokio::test]
    async fn non_html_first_page_is_a_parse_error() {
        let server = MockServer::start().await;
        mount_page(&server, "1", "   ".to_string()).await;

        let err = discoverer()
            .discover(&Client::new(), &acme(&server), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Parse { .. }));
    }
}
