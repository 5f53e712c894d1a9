use percent_encoding::percent_decode_str;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, ScraperError};
use crate::models::{ProductUrl, RawProduct};
use crate::parsers::{extract_raw_text, parse_html};
use crate::utils::http::{fetch_page, FetchPolicy};

const MAX_SLUG_LEN: usize = 120;

/// Fetches product pages and persists their text under `{output_dir}/{site_id}/`.
pub struct ProductScraper {
    client: Client,
    policy: FetchPolicy,
    site_dir: PathBuf,
}

impl ProductScraper {
    pub async fn new(client: Client, policy: FetchPolicy, output_dir: &Path, site_id: &str) -> Result<Self> {
        let site_dir = output_dir.join(site_id);
        tokio::fs::create_dir_all(&site_dir).await?;
        debug!("Writing raw product text to {}", site_dir.display());

        Ok(Self {
            client,
            policy,
            site_dir,
        })
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    pub async fn scrape(&self, url: &ProductUrl) -> Result<RawProduct> {
        let body = fetch_page(&self.client, url.as_str(), self.policy).await?;
        let raw_text = {
            let document = parse_html(&body, url.as_str())?;
            extract_raw_text(&document)
        };
        if raw_text.trim().is_empty() {
            return Err(ScraperError::EmptyContent(url.to_string()));
        }

        let path = self.site_dir().join(file_name_for(url.as_str()));
        let contents = format!("URL: {}\n\n\nRaw Text Content:\n{}", url, raw_text);
        tokio::fs::write(&path, contents).await?;
        info!("Saved {} ({} chars)", path.display(), raw_text.len());

        Ok(RawProduct {
            url: url.clone(),
            raw_text,
            path,
        })
    }
}

/// Deterministic, filesystem-safe `.txt` name for a product URL.
/// The readable slug is lossy, so a digest of the full URL keeps names unique.
pub fn file_name_for(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let decoded = percent_decode_str(path.trim_matches('/')).decode_utf8_lossy();
    let mut slug: String = decoded
        .chars()
        .map(|c| match c {
            '/' => '_',
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => c,
            _ => '_',
        })
        .collect();

    if slug.is_empty() {
        slug.push_str("index");
    }

    slug.truncate(MAX_SLUG_LEN);

    let digest = format!("{:x}", md5::compute(url.as_bytes()));
    format!("{}_{}.txt", slug, &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::http::test_policy;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn slug_of(name: &str) -> &str {
        // Strip `_xxxxxxxx.txt`
        &name[..name.len() - 13]
    }

    #[test]
    fn file_names_follow_the_url_path() {
        assert_eq!(
            slug_of(&file_name_for("https://vaperanger.com/products/geek-bar-pulse")),
            "products_geek-bar-pulse"
        );
        assert_eq!(slug_of(&file_name_for("https://acme.test/")), "index");
        assert_eq!(
            slug_of(&file_name_for("https://acme.test/product/caf%C3%A9%20ice")),
            "product_caf__ice"
        );
    }

    #[test]
    fn urls_with_the_same_slug_get_distinct_names() {
        let names = [
            "https://acme.test/product/a/b",
            "https://acme.test/product/a_b",
            "https://acme.test/product/caf%C3%A9",
            "https://acme.test/product/caf%C3%A8",
            "https://acme.test/p/x",
            "https://acme.test/p/x/",
            "https://www.acme.test/p/x",
        ]
        .map(file_name_for);

        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(slug_of(&names[0]), slug_of(&names[1]));
    }

    #[test]
    fn query_strings_get_a_digest_suffix() {
        let a = file_name_for("https://acme.test/product?id=1");
        let b = file_name_for("https://acme.test/product?id=2");
        assert_ne!(a, b);
        assert_eq!(slug_of(&a), "product");
        assert_eq!(a, file_name_for("https://acme.test/product?id=1"));
    }

    #[test]
    fn long_paths_are_truncated() {
        let url = format!("https://acme.test/product/{}", "x".repeat(300));
        let name = file_name_for(&url);
        assert_eq!(name.len(), MAX_SLUG_LEN + 1 + 8 + ".txt".len());
    }

    #[tokio::test]
    async fn scrape_writes_raw_text_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/product/pulse"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Pulse</title></head><body><main><p>5% nicotine</p></main></body></html>",
            ))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = ProductScraper::new(Client::new(), test_policy(), dir.path(), "acme")
            .await
            .unwrap();
        let url = ProductUrl(format!("{}/product/pulse", server.uri()));

        let raw = scraper.scrape(&url).await.unwrap();

        assert_eq!(raw.raw_text, "Title: Pulse\n5% nicotine");
        assert_eq!(raw.path, dir.path().join("acme").join(file_name_for(url.as_str())));
        let written = std::fs::read_to_string(&raw.path).unwrap();
        assert_eq!(
            written,
            format!("URL: {}\n\n\nRaw Text Content:\nTitle: Pulse\n5% nicotine", url)
        );
    }

    #[tokio::test]
    async fn colliding_slugs_keep_their_own_files() {
        let server = MockServer::start().await;
        for (at, title) in [("/product/a/b", "First product"), ("/product/a_b", "Second product")] {
            Mock::given(method("GET"))
                .and(path(at))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "<html><head><title>{}</title></head><body></body></html>",
                    title
                )))
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let scraper = ProductScraper::new(Client::new(), test_policy(), dir.path(), "acme")
            .await
            .unwrap();
        let first = scraper
            .scrape(&ProductUrl(format!("{}/product/a/b", server.uri())))
            .await
            .unwrap();
        let second = scraper
            .scrape(&ProductUrl(format!("{}/product/a_b", server.uri())))
            .await
            .unwrap();

        assert_ne!(first.path, second.path);
        let kept = std::fs::read_to_string(&first.path).unwrap();
        assert!(kept.contains("Title: First product"));
        assert!(!kept.contains("Second product"));
    }

    #[tokio::test]
    async fn empty_page_is_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html><body><script>x()</script></body></html>"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = ProductScraper::new(Client::new(), test_policy(), dir.path(), "acme")
            .await
            .unwrap();
        let err = scraper
            .scrape(&ProductUrl(format!("{}/product/blank", server.uri())))
            .await
            .unwrap_err();

        assert!(matches!(err, ScraperError::EmptyContent(_)));
        assert_eq!(std::fs::read_dir(scraper.site_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn not_found_is_a_fetch_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let scraper = ProductScraper::new(Client::new(), test_policy(), dir.path(), "acme")
            .await
            .unwrap();

        let err = scraper
            .scrape(&ProductUrl(format!("{}/product/gone", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { .. }));
        assert!(!err.is_fatal());
    }
}
