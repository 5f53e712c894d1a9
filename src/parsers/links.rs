use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::error::{Result, ScraperError};
use crate::models::SiteConfig;

/// Links that hint at listing/category pages worth crawling.
const CATEGORY_TERMS: &[&str] = &["product", "collection", "category", "shop"];

/// Same-site links found on one page, in document order, without duplicates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageLinks {
    pub products: Vec<Url>,
    pub categories: Vec<Url>,
}

/// Parse a fetched body as an HTML document. A body with no markup at all is rejected.
pub fn parse_html(body: &str, url: &str) -> Result<Html> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ScraperError::parse(url, "empty body"));
    }
    if !trimmed.contains('<') {
        return Err(ScraperError::parse(url, "body contains no HTML markup"));
    }
    Ok(Html::parse_document(body))
}

/// Parse a listing page body and pull its links in one go.
pub fn parse_listing(body: &str, page_url: &Url, site: &SiteConfig) -> Result<PageLinks> {
    let document = parse_html(body, page_url.as_str())?;
    Ok(extract_links(&document, page_url, site))
}

pub fn extract_links(document: &Html, page_url: &Url, site: &SiteConfig) -> PageLinks {
    let anchor_selector = Selector::parse("a[href]").expect("static selector");

    let mut links = PageLinks::default();
    let mut seen = HashSet::new();

    for anchor in document.select(&anchor_selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(mut url) = resolve_link(page_url, href) else {
            continue;
        };
        if !site.is_same_site(&url) {
            continue;
        }
        // `www.` and bare host name the same page
        if url.host_str() != Some(site.host()) && url.set_host(Some(site.host())).is_err() {
            continue;
        }
        if !seen.insert(url.clone()) {
            continue;
        }

        if is_site_root(&url) {
            continue;
        }

        if site.is_product_url(url.as_str()) {
            links.products.push(url);
        } else {
            let lower = url.as_str().to_lowercase();
            if CATEGORY_TERMS.iter().any(|term| lower.contains(term)) {
                links.categories.push(url);
            }
        }
    }

    links
}

/// Resolve `href` against the page and drop the fragment. Non-http(s) targets yield `None`.
pub fn resolve_link(page_url: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let mut url = page_url.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

fn is_site_root(url: &Url) -> bool {
    (url.path().is_empty() || url.path() == "/") && url.query().is_none()
}
