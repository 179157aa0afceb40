//! HTTP page fetcher
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Classifying responses into transient, skippable and fatal failures
//! - Retrying transient failures with exponential backoff

use crate::config::{FetchConfig, UserAgentConfig};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::Severity;
use crate::state::Cursor;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A fetched page, owned by one driver iteration
#[derive(Debug, Clone)]
pub struct Page {
    /// The cursor that was requested
    pub cursor: Cursor,

    /// Final URL after redirects; relative links resolve against it
    pub url: Url,

    pub status: u16,

    pub body: String,
}

/// Fetch failures that survive the retry loop
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server refuses the crawler; retrying will not help
    #[error("blocked by {url} (HTTP {status})")]
    Blocked { url: String, status: u16 },

    #[error("HTTP {status} from {url} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("timed out fetching {url} after {attempts} attempt(s)")]
    Timeout { url: String, attempts: u32 },

    #[error("network error fetching {url} after {attempts} attempt(s): {message}")]
    Network {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("cursor '{cursor}' is not a fetchable URL: {reason}")]
    InvalidCursor { cursor: String, reason: String },
}

impl FetchError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::Blocked { .. } | Self::InvalidCursor { .. } => Severity::Fatal,
            Self::Status { .. } | Self::Timeout { .. } | Self::Network { .. } => {
                Severity::Skippable
            }
        }
    }
}

/// Fetches one page per cursor
///
/// Transient failures are retried inside `fetch`; callers only ever see a
/// page or a skippable/fatal error.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, cursor: &Cursor) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// What a response status means for the fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Worth another attempt
    Transient,
    /// The crawler is refused
    Blocked,
    /// Give up on this page
    Skip,
}

/// Classifies a response status
///
/// Fatal statuses take precedence over everything else.
pub fn classify_status(status: u16, policy: &RetryPolicy, fatal_statuses: &[u16]) -> StatusClass {
    if fatal_statuses.contains(&status) {
        StatusClass::Blocked
    } else if (200..300).contains(&status) {
        StatusClass::Success
    } else if policy.is_retryable_status(status) {
        StatusClass::Transient
    } else {
        StatusClass::Skip
    }
}

/// Formats the User-Agent header: `Name/Version (+contact)`
pub fn format_user_agent(config: &UserAgentConfig) -> String {
    match &config.contact_url {
        Some(contact) => format!(
            "{}/{} (+{})",
            config.crawler_name, config.crawler_version, contact
        ),
        None => format!("{}/{}", config.crawler_name, config.crawler_version),
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `fetch` - Timeouts
/// * `user_agent` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    fetch: &FetchConfig,
    user_agent: &UserAgentConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(format_user_agent(user_agent))
        .connect_timeout(Duration::from_millis(fetch.connect_timeout_ms))
        .timeout(Duration::from_millis(fetch.request_timeout_ms))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Transient failure of a single attempt
enum Attempt {
    Status(u16),
    Timeout,
    Network(String),
}

impl Attempt {
    fn into_error(self, url: &Url, attempts: u32) -> FetchError {
        let url = url.to_string();
        match self {
            Self::Status(status) => FetchError::Status {
                url,
                status,
                attempts,
            },
            Self::Timeout => FetchError::Timeout { url, attempts },
            Self::Network(message) => FetchError::Network {
                url,
                attempts,
                message,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Status(status) => format!("HTTP {}", status),
            Self::Timeout => "timeout".to_string(),
            Self::Network(message) => message.clone(),
        }
    }
}

fn classify_transport(e: &reqwest::Error) -> Attempt {
    if e.is_timeout() {
        Attempt::Timeout
    } else {
        Attempt::Network(e.to_string())
    }
}

/// reqwest-backed fetcher, one per source job
pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
    fatal_statuses: Vec<u16>,
}

impl HttpFetcher {
    pub fn new(fetch: &FetchConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(fetch, user_agent)?,
            policy: RetryPolicy::from(fetch),
            fatal_statuses: fetch.fatal_statuses.clone(),
        })
    }

    /// Replaces the retry policy built from the fetch config
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, cursor: &Cursor) -> Result<Page, FetchError> {
        let url = cursor.to_url().map_err(|e| FetchError::InvalidCursor {
            cursor: cursor.to_string(),
            reason: e.to_string(),
        })?;

        let mut retries = 0;
        loop {
            let failure = match self.client.get(url.clone()).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match classify_status(status, &self.policy, &self.fatal_statuses) {
                        StatusClass::Success => {
                            let final_url = response.url().clone();
                            match response.text().await {
                                Ok(body) => {
                                    tracing::debug!(
                                        url = %final_url,
                                        status,
                                        bytes = body.len(),
                                        "Fetched page"
                                    );
                                    return Ok(Page {
                                        cursor: cursor.clone(),
                                        url: final_url,
                                        status,
                                        body,
                                    });
                                }
                                Err(e) => classify_transport(&e),
                            }
                        }
                        StatusClass::Blocked => {
                            return Err(FetchError::Blocked {
                                url: url.to_string(),
                                status,
                            });
                        }
                        StatusClass::Skip => {
                            return Err(FetchError::Status {
                                url: url.to_string(),
                                status,
                                attempts: retries + 1,
                            });
                        }
                        StatusClass::Transient => Attempt::Status(status),
                    }
                }
                Err(e) => classify_transport(&e),
            };

            if !self.policy.should_retry(retries) {
                return Err(failure.into_error(&url, retries + 1));
            }

            let delay = self.policy.delay_for(retries);
            retries += 1;
            tracing::warn!(
                url = %url,
                attempt = retries,
                "Transient failure ({}), retrying in {:?}",
                failure.describe(),
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}
