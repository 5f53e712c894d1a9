use reqwest::{Client, ClientBuilder, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{Result, ScraperError};

/// Attempt count and fixed pause between attempts for page fetches.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

pub fn create_client(config: &Config) -> anyhow::Result<Client> {
    let client = ClientBuilder::new()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .cookie_store(true)
        .build()?;

    Ok(client)
}

/// GET `url` and return the body. Non-2xx and transport errors become `ScraperError::Fetch`
/// once the attempts are used up; client errors other than 408/429 are not retried.
pub async fn fetch_page(client: &Client, url: &str, policy: FetchPolicy) -> Result<String> {
    let mut attempts = 0;
    let mut last_error = String::from("no attempt made");

    while attempts < policy.max_attempts {
        attempts += 1;

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!("GET {} -> {}", url, status);
                    return response
                        .text()
                        .await
                        .map_err(|e| ScraperError::fetch(url, format!("failed to read body: {}", e)));
                }

                warn!("HTTP error {}: {}", status, url);
                last_error = format!("HTTP {}", status);
                if !is_retryable(status) {
                    break;
                }
            }
            Err(e) => {
                error!("Request failed for {}: {}", url, e);
                last_error = e.to_string();
            }
        }

        if attempts < policy.max_attempts {
            warn!(
                "Retrying in {:?}... (attempt {}/{})",
                policy.retry_delay,
                attempts + 1,
                policy.max_attempts
            );
            sleep(policy.retry_delay).await;
        }
    }

    Err(ScraperError::fetch(
        url,
        format!("{} after {} attempt(s)", last_error, attempts),
    ))
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

#[cfg(test)]
pub(crate) fn test_policy() -> FetchPolicy {
    FetchPolicy {
        max_attempts: 2,
        retry_delay: Duration::from_millis(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
            .mount(&server)
            .await;

        let body = fetch_page(&Client::new(), &format!("{}/ok", server.uri()), test_policy())
            .await
            .unwrap();
        assert_eq!(body, "<html>hi</html>");
    }

    #[tokio::test]
    async fn not_found_is_a_fetch_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetch_page(&Client::new(), &format!("{}/missing", server.uri()), test_policy())
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Fetch { ref reason, .. } if reason.contains("404")));
    }

    #[tokio::test]
    async fn server_errors_use_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let result = fetch_page(&Client::new(), &format!("{}/flaky", server.uri()), test_policy()).await;
        tokio_test::assert_err!(result);
    }
}
