use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Validation errors for asset keys and run configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyAssetKey { field: &'static str },
    #[error("{field} '{value}' may only contain lower-case ASCII letters, digits and '-'")]
    InvalidAssetKey { field: &'static str, value: String },
    #[error("asset '{key}' appears more than once in the catalog")]
    DuplicateAsset { key: String },
    #[error("source slug '{slug}' is shared by more than one asset")]
    DuplicateSlug { slug: String },

    #[error("batch size must be at least 1")]
    InvalidBatchSize,
    #[error("request timeout must be greater than zero")]
    InvalidTimeout,
    #[error("fetch window must cover at least one day")]
    InvalidFetchDays,
    #[error("top-N asset count must be at least 1")]
    InvalidTopN,
    #[error("quote currency must be a lower-case ASCII code: '{value}'")]
    InvalidCurrency { value: String },
    #[error("base URL must start with http:// or https://: '{value}'")]
    InvalidBaseUrl { value: String },
    #[error("CSS selector does not parse: '{selector}'")]
    InvalidSelector { selector: String },
}

/// Market-data client error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    NotFound,
    InvalidRequest,
    InvalidResponse,
}

/// Structured error returned by the market-data client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
            retryable: false,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, context: &str) -> Self {
        match status {
            404 => Self::not_found(format!("{context}: not found (HTTP 404)")),
            429 => Self::rate_limited(format!("{context}: rate limited (HTTP 429)")),
            400..=499 => Self::invalid_request(format!("{context}: rejected (HTTP {status})")),
            _ => Self::unavailable(format!("{context}: upstream error (HTTP {status})")),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Warehouse(#[from] coinharvest_warehouse::WarehouseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_separates_permanent_from_transient() {
        assert_eq!(
            SourceError::from_status(404, "bitcoin").kind(),
            SourceErrorKind::NotFound
        );
        assert!(SourceError::from_status(429, "bitcoin").retryable());
        assert!(!SourceError::from_status(401, "bitcoin").retryable());
        assert!(SourceError::from_status(503, "bitcoin").retryable());
    }

    #[test]
    fn display_includes_stable_code() {
        let error = SourceError::invalid_response("missing prices");
        assert_eq!(error.to_string(), "missing prices (source.invalid_response)");
    }
}
