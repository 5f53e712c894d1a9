use thiserror::Error;

/// Everything that can go wrong during a run.
///
/// Item-level variants (`Fetch`, `Parse`, `EmptyContent`) are turned into a
/// skip by the orchestrator unless they hit the first listing page. The rest
/// end the run.
#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("No extractable text on {0}")]
    EmptyContent(String),

    #[error("LLM provider rejected credentials: {0}")]
    LlmAuth(String),

    #[error("LLM provider misconfigured: {0}")]
    LlmConfig(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ScraperError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        ScraperError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl ToString) -> Self {
        ScraperError::Parse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the whole run when raised for a single item.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ScraperError::Fetch { .. } | ScraperError::Parse { .. } | ScraperError::EmptyContent(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
