use regex::Regex;
use std::fmt;
use url::Url;

use crate::config::{DiscoveryStrategy, SiteEntry};
use crate::error::{Result, ScraperError};

/// Rule deciding whether a link points at a product page.
#[derive(Debug, Clone)]
pub enum ProductPattern {
    Substring(String),
    Regex(Regex),
}

impl ProductPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.strip_prefix("regex:") {
            Some(expr) => Regex::new(expr)
                .map(ProductPattern::Regex)
                .map_err(|e| ScraperError::Config(format!("Invalid product pattern {:?}: {}", raw, e))),
            None => Ok(ProductPattern::Substring(raw.to_string())),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            ProductPattern::Substring(s) => url.contains(s.as_str()),
            ProductPattern::Regex(re) => re.is_match(url),
        }
    }
}

impl fmt::Display for ProductPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductPattern::Substring(s) => write!(f, "{}", s),
            ProductPattern::Regex(re) => write!(f, "regex:{}", re.as_str()),
        }
    }
}

/// A validated site: the immutable value the pipeline works from.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub id: String,
    pub base_url: Url,
    pub product_pattern: ProductPattern,
    pub discovery: DiscoveryStrategy,
}

impl SiteConfig {
    pub fn from_entry(id: &str, entry: &SiteEntry) -> Result<Self> {
        let base_url = Url::parse(&entry.base_url)
            .map_err(|e| ScraperError::Config(format!("Site {}: invalid base_url {:?}: {}", id, entry.base_url, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(ScraperError::Config(format!(
                "Site {}: base_url must be an absolute http(s) URL",
                id
            )));
        }

        Ok(Self {
            id: id.to_string(),
            base_url,
            product_pattern: ProductPattern::parse(&entry.product_pattern)?,
            discovery: entry.discovery.clone(),
        })
    }

    pub fn host(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    /// Same host as the site, ignoring a leading `www.` on either side.
    pub fn is_same_site(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => strip_www(host).eq_ignore_ascii_case(strip_www(self.host())),
            None => false,
        }
    }

    pub fn is_product_url(&self, url: &str) -> bool {
        self.product_pattern.matches(url)
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
