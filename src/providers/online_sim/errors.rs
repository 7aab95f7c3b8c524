//! Error types for the OnlineSim adapter.

use crate::errors::RetryableError;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::warn;

/// Error codes carried in the `response` field.
#[derive(Debug, Clone, PartialEq)]
pub enum OnlineSimErrorCode {
    /// No numbers for the country/service.
    NoNumber,
    /// Balance too low for the purchase.
    WarningLowBalance,
    /// API key missing.
    ErrorNoKey,
    /// API key invalid.
    ErrorWrongKey,
    /// No operation with this tzid.
    ErrorNoOperations,
    /// Malformed tzid.
    ErrorWrongTzid,
    /// Rate limited; retry later.
    TryAgainLater,
    /// Account blocked.
    AccountBlocked,
    /// Vendor internal failure.
    InternalError,
    /// Any other code.
    Unknown { raw: String },
}

impl OnlineSimErrorCode {
    /// Parse a `response` value.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "NO_NUMBER" | "NO_NUMBERS" => Self::NoNumber,
            "WARNING_LOW_BALANCE" => Self::WarningLowBalance,
            "ERROR_NO_KEY" => Self::ErrorNoKey,
            "ERROR_WRONG_KEY" => Self::ErrorWrongKey,
            "ERROR_NO_OPERATIONS" => Self::ErrorNoOperations,
            "ERROR_WRONG_TZID" => Self::ErrorWrongTzid,
            "TRY_AGAIN_LATER" => Self::TryAgainLater,
            "ACCOUNT_BLOCKED" => Self::AccountBlocked,
            "INTERNAL_ERROR" => Self::InternalError,
            other => Self::Unknown {
                raw: other.to_string(),
            },
        }
    }

    /// Returns the API code string.
    pub fn code_name(&self) -> &str {
        match self {
            Self::NoNumber => "NO_NUMBER",
            Self::WarningLowBalance => "WARNING_LOW_BALANCE",
            Self::ErrorNoKey => "ERROR_NO_KEY",
            Self::ErrorWrongKey => "ERROR_WRONG_KEY",
            Self::ErrorNoOperations => "ERROR_NO_OPERATIONS",
            Self::ErrorWrongTzid => "ERROR_WRONG_TZID",
            Self::TryAgainLater => "TRY_AGAIN_LATER",
            Self::AccountBlocked => "ACCOUNT_BLOCKED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::Unknown { raw } => raw.as_str(),
        }
    }

    /// Returns true if this error is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TryAgainLater | Self::InternalError)
    }

    /// Returns true if a fresh operation might succeed.
    pub fn should_retry_operation(&self) -> bool {
        matches!(
            self,
            Self::TryAgainLater | Self::InternalError | Self::NoNumber
        )
    }
}

impl Display for OnlineSimErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_name())
    }
}

/// Main error type for OnlineSim client operations.
#[derive(Debug, Error)]
pub enum OnlineSimError {
    /// Failed to build HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// Invalid endpoint or path.
    #[error("Invalid OnlineSim endpoint: {0}")]
    InvalidEndpoint(#[source] url::ParseError),

    /// Failed to send HTTP request.
    #[error("Failed to send HTTP request: {0}")]
    HttpRequest(#[from] reqwest_middleware::Error),

    /// Non-2xx HTTP status.
    #[error("OnlineSim returned HTTP error: {0}")]
    HttpStatus(#[source] reqwest::Error),

    /// Failed to read response body.
    #[error("Failed to read response: {0}")]
    ReadResponse(#[source] reqwest::Error),

    /// Error code from the service.
    #[error("OnlineSim service error: {0}")]
    Service(OnlineSimErrorCode),

    /// State outside the documented vocabulary, or an empty state list.
    #[error("Unexpected OnlineSim response: {0}")]
    UnexpectedResponse(String),

    /// Failed to deserialize JSON response.
    #[error("Failed to deserialize JSON response: {0}")]
    DeserializeJson(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OnlineSimError>;

impl OnlineSimError {
    /// Service error from a `response` code.
    pub(crate) fn service(raw: &str) -> Self {
        let code = OnlineSimErrorCode::from_raw(raw);
        warn!(code = %code, "OnlineSim service returned error");
        OnlineSimError::Service(code)
    }
}

impl RetryableError for OnlineSimError {
    fn is_retryable(&self) -> bool {
        match self {
            OnlineSimError::Service(code) => code.is_retryable(),
            OnlineSimError::HttpRequest(_) | OnlineSimError::HttpStatus(_) => true,
            OnlineSimError::BuildHttpClient(_)
            | OnlineSimError::InvalidEndpoint(_)
            | OnlineSimError::ReadResponse(_)
            | OnlineSimError::UnexpectedResponse(_)
            | OnlineSimError::DeserializeJson(_) => false,
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            OnlineSimError::Service(code) => code.should_retry_operation(),
            OnlineSimError::HttpRequest(_) | OnlineSimError::HttpStatus(_) => true,
            _ => false,
        }
    }
}
