//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all fetch operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching from an external price source.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines whether the fetch client backs off and retries.
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The requested symbol does not exist upstream.
    /// This is a terminal error - retrying won't help.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The symbol exists but has no rows in the requested period.
    #[error("No data for date range")]
    NoDataForRange,

    /// The source rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The source that rate limited the request
        provider: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The source that timed out
        provider: String,
    },

    /// The source answered with a gateway/availability error (502/503/504).
    #[error("Service unavailable: {provider} (HTTP {status})")]
    ServiceUnavailable {
        /// The source that failed
        provider: String,
        /// The HTTP status reported by the source
        status: u16,
    },

    /// A source-specific error that is not worth retrying.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The source that returned the error
        provider: String,
        /// The error message from the source
        message: String,
    },

    /// The source returned data that failed validation checks.
    #[error("Validation failed: {message}")]
    ValidationFailed {
        /// Description of the validation failure
        message: String,
    },

    /// A transient error persisted through every retry attempt.
    #[error("Retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts made, including the first one
        attempts: u32,
        /// The error returned by the final attempt
        last: Box<MarketDataError>,
    },

    /// The fetch worker pool has been shut down.
    #[error("Fetch workers unavailable")]
    WorkersClosed,
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: Don't retry, the error is terminal
    /// - [`RetryClass::WithBackoff`]: Retry with exponential backoff
    ///
    /// # Examples
    ///
    /// ```
    /// use pricesync_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::ServiceUnavailable { .. } => {
                RetryClass::WithBackoff
            }

            Self::SymbolNotFound(_)
            | Self::NoDataForRange
            | Self::ProviderError { .. }
            | Self::ValidationFailed { .. }
            | Self::RetriesExhausted { .. }
            | Self::WorkersClosed => RetryClass::Never,
        }
    }

    /// Returns true when the symbol is genuinely absent upstream.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::SymbolNotFound(_))
    }

    /// Maps an HTTP status code to the matching transient error, if any.
    pub fn from_status(provider: &str, status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimited {
                provider: provider.to_string(),
            }),
            502..=504 => Some(Self::ServiceUnavailable {
                provider: provider.to_string(),
                status,
            }),
            408 => Some(Self::Timeout {
                provider: provider.to_string(),
            }),
            _ => None,
        }
    }
}
