//! Interactive run driver.
//!
//! A run is an explicit state machine:
//! `SelectSite -> ChooseUrlCount -> DiscoverUrls -> ChooseProductCount ->
//! ScrapeProducts -> ExtractAttributes -> WriteCsv -> Done`, with any fatal
//! error leading to `Aborted`. Each step is driven either by one operator
//! answer or by one component call finishing.

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::discovery::discoverer_for;
use crate::error::ScraperError;
use crate::extractor::AttributeExtractor;
use crate::models::{ProductUrl, RawProduct, SiteConfig, StructuredProduct};
use crate::registry::SiteRegistry;
use crate::scrapers::ProductScraper;
use crate::storage::CsvWriter;
use crate::utils::http::FetchPolicy;

mod prompt;

pub use prompt::Prompter;

#[derive(Debug)]
pub enum RunState {
    SelectSite,
    ChooseUrlCount {
        site: SiteConfig,
    },
    DiscoverUrls {
        site: SiteConfig,
        count: usize,
    },
    ChooseProductCount {
        site: SiteConfig,
        urls: Vec<ProductUrl>,
    },
    ScrapeProducts {
        site: SiteConfig,
        urls: Vec<ProductUrl>,
    },
    ExtractAttributes {
        raws: Vec<RawProduct>,
    },
    /// `abort_with` carries a fatal error raised after some rows were produced;
    /// the rows are still written before the run ends.
    WriteCsv {
        rows: Vec<StructuredProduct>,
        abort_with: Option<ScraperError>,
    },
    Done {
        csv_path: PathBuf,
    },
    Aborted {
        error: ScraperError,
    },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done { .. } | RunState::Aborted { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunState::SelectSite => "SelectSite",
            RunState::ChooseUrlCount { .. } => "ChooseUrlCount",
            RunState::DiscoverUrls { .. } => "DiscoverUrls",
            RunState::ChooseProductCount { .. } => "ChooseProductCount",
            RunState::ScrapeProducts { .. } => "ScrapeProducts",
            RunState::ExtractAttributes { .. } => "ExtractAttributes",
            RunState::WriteCsv { .. } => "WriteCsv",
            RunState::Done { .. } => "Done",
            RunState::Aborted { .. } => "Aborted",
        }
    }
}

/// Counters printed at the end of every run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    pub scraped: usize,
    pub extracted: usize,
    /// Rows emitted all-null because extraction failed.
    pub degraded: usize,
    /// Product pages skipped.
    pub failed: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "discovered: {}, scraped: {}, extracted: {} ({} degraded), failed: {}",
            self.discovered, self.scraped, self.extracted, self.degraded, self.failed
        )
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub csv_path: Option<PathBuf>,
    pub error: Option<ScraperError>,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Orchestrator<R, W> {
    config: Arc<Config>,
    registry: SiteRegistry,
    client: Client,
    extractor: AttributeExtractor,
    prompter: Prompter<R, W>,
    summary: RunSummary,
    csv_path: Option<PathBuf>,
    run_id: String,
}

impl<R: BufRead, W: Write> Orchestrator<R, W> {
    pub fn new(
        config: Arc<Config>,
        registry: SiteRegistry,
        client: Client,
        extractor: AttributeExtractor,
        prompter: Prompter<R, W>,
        run_id: String,
    ) -> Self {
        Self {
            config,
            registry,
            client,
            extractor,
            prompter,
            summary: RunSummary::default(),
            csv_path: None,
            run_id,
        }
    }

    pub async fn run(mut self) -> RunOutcome {
        info!("Starting run {}", self.run_id);
        let mut state = RunState::SelectSite;

        while !state.is_terminal() {
            let from = state.name();
            state = self.step(state).await;
            info!("{} -> {}", from, state.name());
        }

        let error = match state {
            RunState::Aborted { error } => {
                error!("Run aborted: {}", error);
                // Report the abort to the operator
                let _ = self.prompter.say(format!("\nRun aborted: {}", error));
                Some(error)
            }
            RunState::Done { csv_path } => {
                info!("Run complete, CSV at {}", csv_path.display());
                None
            }
            _ => None,
        };
        let _ = self.prompter.say(format!("Summary: {}", self.summary));

        RunOutcome {
            summary: self.summary,
            csv_path: self.csv_path,
            error,
        }
    }

    pub async fn step(&mut self, state: RunState) -> RunState {
        let next = match state {
            RunState::SelectSite => self.select_site(),
            RunState::ChooseUrlCount { site } => self.choose_url_count(site),
            RunState::DiscoverUrls { site, count } => self.discover_urls(site, count).await,
            RunState::ChooseProductCount { site, urls } => self.choose_product_count(site, urls),
            RunState::ScrapeProducts { site, urls } => self.scrape_products(site, urls).await,
            RunState::ExtractAttributes { raws } => Ok(self.extract_attributes(raws).await),
            RunState::WriteCsv { rows, abort_with } => self.write_csv(rows, abort_with),
            terminal => Ok(terminal),
        };

        next.unwrap_or_else(|error| RunState::Aborted { error })
    }

    fn select_site(&mut self) -> Result<RunState, ScraperError> {
        self.prompter.say("Available sites:")?;
        let menu: Vec<String> = self
            .registry
            .sites()
            .iter()
            .enumerate()
            .map(|(i, site)| format!("{}. {} ({})", i + 1, site.id, site.base_url))
            .collect();
        for line in menu {
            self.prompter.say(line)?;
        }

        let answer = self.prompter.ask("Select a site by number or name:")?;
        let site = self.registry.resolve(&answer)?.clone();
        info!("Selected site {} (product pattern {})", site.id, site.product_pattern);
        Ok(RunState::ChooseUrlCount { site })
    }

    fn choose_url_count(&mut self, site: SiteConfig) -> Result<RunState, ScraperError> {
        let count = self.prompter.ask_count("How many product URLs to find?", None)?;
        Ok(RunState::DiscoverUrls { site, count })
    }

    async fn discover_urls(&mut self, site: SiteConfig, count: usize) -> Result<RunState, ScraperError> {
        self.prompter
            .say(format!("Finding {} product URLs for {}...", count, site.id))?;

        let discoverer = discoverer_for(&site, self.fetch_policy());
        let urls = discoverer.discover(&self.client, &site, count).await?;

        self.summary.discovered = urls.len();
        self.prompter.say(format!("Found {} product URLs.", urls.len()))?;
        Ok(RunState::ChooseProductCount { site, urls })
    }

    fn choose_product_count(&mut self, site: SiteConfig, mut urls: Vec<ProductUrl>) -> Result<RunState, ScraperError> {
        if urls.is_empty() {
            self.prompter.say("No product URLs found, nothing to scrape.")?;
            return Ok(RunState::WriteCsv {
                rows: Vec::new(),
                abort_with: None,
            });
        }

        let count = self
            .prompter
            .ask_count("How many product pages to scrape?", Some(urls.len()))?;
        urls.truncate(count);
        Ok(RunState::ScrapeProducts { site, urls })
    }

    async fn scrape_products(&mut self, site: SiteConfig, urls: Vec<ProductUrl>) -> Result<RunState, ScraperError> {
        self.prompter.say("Scraping product pages...")?;
        let scraper = ProductScraper::new(
            self.client.clone(),
            self.fetch_policy(),
            &self.config.output_dir,
            &site.id,
        )
        .await?;

        let delay = Duration::from_millis(self.config.request_delay_ms);
        let progress = progress_bar(urls.len());
        let mut raws = Vec::with_capacity(urls.len());

        for (idx, url) in urls.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match scraper.scrape(url).await {
                Ok(raw) => {
                    info!("Scraped {} into {}", raw.url, raw.path.display());
                    self.summary.scraped += 1;
                    raws.push(raw);
                }
                Err(e) if !e.is_fatal() => {
                    warn!("Skipping {}: {}", url, e);
                    self.summary.failed += 1;
                }
                Err(e) => {
                    progress.abandon();
                    return Err(e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        self.prompter.say(format!("Scraped {} products.", raws.len()))?;
        Ok(RunState::ExtractAttributes { raws })
    }

    async fn extract_attributes(&mut self, raws: Vec<RawProduct>) -> RunState {
        // Announce extraction
        let _ = self.prompter.say("Running LLM extraction...");
        let progress = progress_bar(raws.len());
        let mut rows = Vec::with_capacity(raws.len());

        for raw in &raws {
            match self.extractor.extract(raw).await {
                Ok(extraction) => {
                    self.summary.extracted += 1;
                    if extraction.degraded {
                        self.summary.degraded += 1;
                    }
                    rows.push(extraction.product);
                }
                Err(e) => {
                    progress.abandon();
                    return RunState::WriteCsv {
                        rows,
                        abort_with: Some(e),
                    };
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        RunState::WriteCsv {
            rows,
            abort_with: None,
        }
    }

    fn write_csv(
        &mut self,
        rows: Vec<StructuredProduct>,
        abort_with: Option<ScraperError>,
    ) -> Result<RunState, ScraperError> {
        let path = CsvWriter::new(&self.config.output_dir).write(&rows, &self.run_id)?;
        self.csv_path = Some(path.clone());
        self.prompter.say(format!(
            "Saved structured data to CSV: {} ({} rows, {} columns)",
            path.display(),
            rows.len(),
            StructuredProduct::header().len()
        ))?;

        Ok(match abort_with {
            Some(error) => RunState::Aborted { error },
            None => RunState::Done { csv_path: path },
        })
    }

    fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy::from_config(&self.config)
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} ({eta})") {
        progress.set_style(style.progress_chars("=> "));
    }
    progress
}
