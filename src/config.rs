use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Name of the optional configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "product_scraper";
/// Prefix for environment overrides, e.g. `PRODUCT_SCRAPER__MAX_ATTEMPTS=5`.
pub const ENV_PREFIX: &str = "PRODUCT_SCRAPER";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sites: BTreeMap<String, SiteEntry>,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_delay_ms: u64,
    pub output_dir: PathBuf,
    pub llm: LlmSettings,
}

/// One row of the site table as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    pub base_url: String,
    /// Path substring, or a regex when prefixed with `regex:`.
    pub product_pattern: String,
    #[serde(default)]
    pub discovery: DiscoveryStrategy,
}

/// How listing pages are found for a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryStrategy {
    /// Breadth-first walk over category-like links starting at the base URL.
    Crawl {
        #[serde(default = "default_max_pages")]
        max_pages: usize,
    },
    /// Sequential `?page=N` listing pages under one path.
    Paginated {
        listing_path: String,
        #[serde(default = "default_page_param")]
        page_param: String,
        #[serde(default = "default_max_pages")]
        max_pages: usize,
    },
}

impl Default for DiscoveryStrategy {
    fn default() -> Self {
        DiscoveryStrategy::Crawl {
            max_pages: default_max_pages(),
        }
    }
}

fn default_max_pages() -> usize {
    200
}

fn default_page_param() -> String {
    "page".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub azure_api_version: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 500,
            timeout_secs: 60,
            max_attempts: 3,
            retry_delay_ms: 1000,
            azure_api_version: "2024-02-15-preview".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut sites = BTreeMap::new();

        sites.insert(
            "vaperanger".to_string(),
            SiteEntry {
                base_url: "https://vaperanger.com".to_string(),
                product_pattern: "/products/".to_string(),
                discovery: DiscoveryStrategy::Paginated {
                    listing_path: "/collections/all".to_string(),
                    page_param: default_page_param(),
                    max_pages: default_max_pages(),
                },
            },
        );

        sites.insert(
            "vapewholesale".to_string(),
            SiteEntry {
                base_url: "https://vapewholesaleusa.com".to_string(),
                product_pattern: "/".to_string(),
                discovery: DiscoveryStrategy::default(),
            },
        );

        Config {
            sites,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 25,
            max_attempts: 3,
            retry_delay_ms: 500,
            request_delay_ms: 1000,
            output_dir: PathBuf::from("output"),
            llm: LlmSettings::default(),
        }
    }
}

/// `PRODUCT_SCRAPER__LLM__MAX_TOKENS=250` sets `llm.max_tokens`.
fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

impl Config {
    /// Compiled-in defaults, overlaid by `product_scraper.{toml,json,...}` if present,
    /// overlaid by `PRODUCT_SCRAPER__*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false))
                .add_source(environment()),
        )
    }

    /// Parse a TOML document on top of the defaults.
    #[cfg(test)]
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::from_builder(
            config::Config::builder().add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let settings = builder.build().context("Failed to read configuration sources")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            anyhow::bail!("Configuration has no sites");
        }
        if self.max_attempts == 0 || self.llm.max_attempts == 0 {
            anyhow::bail!("Attempt counts must be at least 1");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
