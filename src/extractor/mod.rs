//! LLM-backed attribute extraction.
//!
//! The prompt is a pure function of the product text, so with a deterministic
//! model the same [`RawProduct`] always yields the same [`StructuredProduct`].
//! Anything short of a credential or configuration problem degrades to an
//! all-null row instead of failing.

use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::LlmSettings;
use crate::error::{Result, ScraperError};
use crate::models::{ProductField, RawProduct, StructuredProduct};

pub mod llm;

pub use llm::{LlmClient, LlmError, OpenAiClient, Provider};

pub const SYSTEM_PROMPT: &str = "You are a precise data extraction assistant that extracts specific attributes from product information. Always respond with valid JSON.";

/// Values the model uses when it found nothing.
const NULL_WORDS: &[&str] = &["", "n/a", "na", "null", "none", "unknown", "not specified", "not found"];

/// Result of extracting one product: always a row, flagged when it fell back to all-null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub product: StructuredProduct,
    pub degraded: bool,
}

pub struct AttributeExtractor {
    client: Box<dyn LlmClient>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl AttributeExtractor {
    pub fn new(client: Box<dyn LlmClient>, settings: &LlmSettings) -> Self {
        Self {
            client,
            max_attempts: settings.max_attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    /// Exactly one row per product. Errors only on LLM auth/configuration failures.
    pub async fn extract(&self, raw: &RawProduct) -> Result<Extraction> {
        let prompt = build_prompt(&raw.raw_text);

        let content = match self.complete_with_retry(&prompt).await {
            Ok(content) => content,
            Err(LlmError::Auth(msg)) => return Err(ScraperError::LlmAuth(msg)),
            Err(LlmError::Config(msg)) => return Err(ScraperError::LlmConfig(msg)),
            Err(e) => {
                warn!("LLM call failed for {}: {}", raw.url, e);
                return Ok(degraded(raw));
            }
        };

        match parse_response(&content) {
            Some(values) => {
                let mut product = StructuredProduct::all_null(raw.url.as_str());
                for (field, value) in ProductField::ALL.into_iter().zip(values) {
                    product.set(field, value);
                }
                if product.is_all_null() {
                    info!("No attributes found for {}", raw.url);
                } else {
                    info!("Extracted attributes for {}", raw.url);
                }
                Ok(Extraction {
                    product,
                    degraded: false,
                })
            }
            None => {
                warn!("Unusable LLM response for {}: {}", raw.url, content);
                Ok(degraded(raw))
            }
        }
    }

    async fn complete_with_retry(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.complete(SYSTEM_PROMPT, prompt).await {
                Err(LlmError::Transient(msg)) if attempt < self.max_attempts => {
                    warn!(
                        "LLM attempt {}/{} failed: {}",
                        attempt, self.max_attempts, msg
                    );
                    sleep(self.retry_delay).await;
                }
                other => return other,
            }
        }
    }
}

fn degraded(raw: &RawProduct) -> Extraction {
    Extraction {
        product: StructuredProduct::all_null(raw.url.as_str()),
        degraded: true,
    }
}

/// Instruction listing the seven fields, the product text and the exact JSON shape wanted.
pub fn build_prompt(raw_text: &str) -> String {
    let field_list: String = ProductField::ALL
        .iter()
        .map(|f| format!("- {}\n", f.label()))
        .collect();

    let template: String = ProductField::ALL
        .iter()
        .map(|f| format!("  \"{}\": \"extracted {}\"", f.key(), f.label().to_lowercase()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "Extract the following attributes from this vape product information:\n\
         {field_list}\n\
         Product Information:\n\
         {raw_text}\n\n\
         Return ONLY a JSON object with exactly these keys and no other text:\n\
         {{\n{template}\n}}\n\n\
         If an attribute cannot be found, use null as its value.\n"
    )
}

/// Parse the model output into the seven field values, in [`ProductField::ALL`] order.
/// `None` when the output is not a JSON object carrying every key.
pub fn parse_response(content: &str) -> Option<[Option<String>; 7]> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }

    let object: Map<String, Value> = serde_json::from_str(&content[start..=end]).ok()?;

    let mut values: [Option<String>; 7] = Default::default();
    for (slot, field) in values.iter_mut().zip(ProductField::ALL) {
        *slot = normalize_value(object.get(field.key())?);
    }
    Some(values)
}

fn normalize_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };

    if NULL_WORDS.contains(&text.to_lowercase().as_str()) {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic stand-in for the model: answers by looking for a marker in the prompt.
    pub struct StubLlm {
        pub responses: Vec<(&'static str, std::result::Result<String, LlmError>)>,
        pub fallback: std::result::Result<String, LlmError>,
        pub calls: Arc<AtomicUsize>,
    }

    impl StubLlm {
        pub fn always(response: std::result::Result<String, LlmError>) -> Self {
            Self {
                responses: Vec::new(),
                fallback: response,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _system: &str, prompt: &str) -> std::result::Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .iter()
                .find(|(marker, _)| prompt.contains(marker))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    pub fn settings() -> LlmSettings {
        LlmSettings {
            retry_delay_ms: 1,
            ..LlmSettings::default()
        }
    }
}
