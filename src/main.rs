use anyhow::{Context, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;
mod discovery;
mod error;
mod extractor;
mod models;
mod parsers;
mod registry;
mod scrapers;
mod storage;
mod utils;

use crate::cli::{Orchestrator, Prompter};
use crate::config::Config;
use crate::error::ScraperError;
use crate::extractor::{AttributeExtractor, OpenAiClient, Provider};
use crate::registry::SiteRegistry;

// One request in flight at a time
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    dotenvy::dotenv().ok();

    // Logs go to stderr, prompts to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("product_scraper=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting Product Scraper");

    let config = Arc::new(Config::load()?);
    let registry = SiteRegistry::from_config(&config).context("Invalid site table")?;
    let client = utils::http::create_client(&config)?;

    let provider = Provider::from_env().ok_or_else(|| {
        ScraperError::LlmConfig(
            "no API credentials found; set AZURE_OPENAI_API_KEY, AZURE_OPENAI_ENDPOINT and \
             AZURE_OPENAI_DEPLOYMENT, or OPENAI_API_KEY"
                .to_string(),
        )
    })?;
    let llm = OpenAiClient::new(provider, config.llm.clone())?;
    let extractor = AttributeExtractor::new(Box::new(llm), &config.llm);

    let stdin = std::io::stdin();
    let prompter = Prompter::new(stdin.lock(), std::io::stdout());

    let outcome = Orchestrator::new(
        config,
        registry,
        client,
        extractor,
        prompter,
        storage::new_run_id(),
    )
    .run()
    .await;

    match &outcome.csv_path {
        Some(path) => info!("Run finished ({}), output in {}", outcome.summary, path.display()),
        None => info!("Run finished ({}), no CSV written", outcome.summary),
    }
    Ok(outcome.is_success())
}
