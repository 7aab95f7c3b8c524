//! Error types for the 5sim adapter.

use crate::errors::RetryableError;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::warn;

/// Plain-text error messages returned by the 5sim API.
#[derive(Debug, Clone, PartialEq)]
pub enum FiveSimErrorCode {
    /// No numbers in stock.
    NoFreePhones,
    /// Balance too low for the purchase.
    NotEnoughBalance,
    /// Account rating too low to buy.
    NotEnoughRating,
    /// Unknown country name.
    BadCountry,
    /// Unknown operator name.
    BadOperator,
    /// Unknown product name.
    NoProduct,
    /// Vendor is temporarily down.
    ServerOffline,
    /// Order id does not exist.
    OrderNotFound,
    /// Order already expired.
    OrderExpired,
    /// Order already holds an SMS and cannot be canceled.
    OrderHasSms,
    /// Hosting orders do not support the requested action.
    HostingOrder,
    /// Any other message.
    Unknown { raw: String },
}

impl FiveSimErrorCode {
    /// Parse an error message. The API answers errors in lowercase prose.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "no free phones" => Self::NoFreePhones,
            "not enough user balance" => Self::NotEnoughBalance,
            "not enough rating" => Self::NotEnoughRating,
            "bad country" => Self::BadCountry,
            "bad operator" | "no operator" => Self::BadOperator,
            "no product" | "bad product" => Self::NoProduct,
            "server offline" => Self::ServerOffline,
            "order not found" | "record not found" => Self::OrderNotFound,
            "order expired" => Self::OrderExpired,
            "order has sms" => Self::OrderHasSms,
            "hosting order" => Self::HostingOrder,
            other => Self::Unknown {
                raw: other.to_string(),
            },
        }
    }

    /// Returns the wire message.
    pub fn message(&self) -> &str {
        match self {
            Self::NoFreePhones => "no free phones",
            Self::NotEnoughBalance => "not enough user balance",
            Self::NotEnoughRating => "not enough rating",
            Self::BadCountry => "bad country",
            Self::BadOperator => "bad operator",
            Self::NoProduct => "no product",
            Self::ServerOffline => "server offline",
            Self::OrderNotFound => "order not found",
            Self::OrderExpired => "order expired",
            Self::OrderHasSms => "order has sms",
            Self::HostingOrder => "hosting order",
            Self::Unknown { raw } => raw.as_str(),
        }
    }

    /// Returns true if this error is transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServerOffline)
    }

    /// Returns true if a fresh operation might succeed.
    pub fn should_retry_operation(&self) -> bool {
        matches!(
            self,
            Self::ServerOffline | Self::NoFreePhones | Self::BadOperator
        )
    }
}

impl Display for FiveSimErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Main error type for 5sim client operations.
#[derive(Debug, Error)]
pub enum FiveSimError {
    /// Failed to build HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// Invalid endpoint or path.
    #[error("Invalid 5sim endpoint: {0}")]
    InvalidEndpoint(#[source] url::ParseError),

    /// Failed to send HTTP request.
    #[error("Failed to send HTTP request: {0}")]
    HttpRequest(#[from] reqwest_middleware::Error),

    /// Failed to read response body.
    #[error("Failed to read response: {0}")]
    ReadResponse(#[source] reqwest::Error),

    /// API key rejected.
    #[error("5sim rejected the API key")]
    Unauthorized,

    /// Server-side HTTP failure.
    #[error("5sim returned HTTP {status}: {body}")]
    ServerStatus { status: u16, body: String },

    /// Error message from the service.
    #[error("5sim service error: {0}")]
    Service(FiveSimErrorCode),

    /// Status outside the documented vocabulary.
    #[error("Unexpected 5sim order status: {0}")]
    UnexpectedStatus(String),

    /// Failed to deserialize JSON response.
    #[error("Failed to deserialize JSON response: {0}")]
    DeserializeJson(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FiveSimError>;

impl FiveSimError {
    /// Service error from a non-JSON body.
    pub(crate) fn service(raw: &str) -> Self {
        let code = FiveSimErrorCode::from_raw(raw);
        warn!(code = %code, raw = %raw.trim(), "5sim service returned error");
        FiveSimError::Service(code)
    }
}

impl RetryableError for FiveSimError {
    fn is_retryable(&self) -> bool {
        match self {
            FiveSimError::Service(code) => code.is_retryable(),
            FiveSimError::HttpRequest(_) | FiveSimError::ServerStatus { .. } => true,
            FiveSimError::BuildHttpClient(_)
            | FiveSimError::InvalidEndpoint(_)
            | FiveSimError::ReadResponse(_)
            | FiveSimError::Unauthorized
            | FiveSimError::UnexpectedStatus(_)
            | FiveSimError::DeserializeJson(_) => false,
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            FiveSimError::Service(code) => code.should_retry_operation(),
            FiveSimError::HttpRequest(_) | FiveSimError::ServerStatus { .. } => true,
            _ => false,
        }
    }
}
