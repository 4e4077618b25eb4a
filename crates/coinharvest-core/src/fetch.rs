use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::config::ScrapeConfig;
use crate::domain::Asset;
use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest};

/// Browser identity sent with every page request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Why an asset page could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {status}")]
    HttpStatus { status: u16 },
    #[error("response body could not be decoded: {cause}")]
    Decode { cause: String },
    #[error("request failed: {cause}")]
    Other { cause: String },
}

impl FetchFailure {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 404 })
    }

    /// Whether a later attempt could plausibly succeed.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Other { .. } => true,
            Self::HttpStatus { status } => matches!(*status, 408 | 429 | 500..=599),
            Self::Decode { .. } => false,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "fetch.timeout",
            Self::HttpStatus { .. } => "fetch.http_status",
            Self::Decode { .. } => "fetch.decode",
            Self::Other { .. } => "fetch.other",
        }
    }
}

/// Retrieves the HTML of one asset page per call.
#[derive(Clone)]
pub struct PageFetcher {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    timeout_ms: u64,
}

impl PageFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>, timeout_ms: u64) -> Self {
        let base_url = base_url.into();
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout_ms,
        }
    }

    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &ScrapeConfig) -> Self {
        Self::new(http_client, config.base_url.as_str(), config.timeout_ms)
    }

    pub fn page_url(&self, asset: &Asset) -> String {
        format!(
            "{}/currencies/{}/",
            self.base_url,
            urlencoding::encode(asset.source_slug())
        )
    }

    pub async fn fetch(&self, asset: &Asset) -> Result<String, FetchFailure> {
        let url = self.page_url(asset);
        debug!(coin = asset.canonical_key(), %url, "fetching asset page");

        let request = HttpRequest::get(url)
            .with_header("user-agent", BROWSER_USER_AGENT)
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| match error.kind() {
                HttpErrorKind::Timeout => FetchFailure::Timeout,
                HttpErrorKind::Body => FetchFailure::Decode {
                    cause: error.message().to_owned(),
                },
                HttpErrorKind::Connect | HttpErrorKind::Other => FetchFailure::Other {
                    cause: error.message().to_owned(),
                },
            })?;

        if !response.is_success() {
            return Err(FetchFailure::HttpStatus {
                status: response.status,
            });
        }

        Ok(response.body)
    }
}
