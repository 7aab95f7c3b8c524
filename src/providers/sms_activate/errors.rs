//! Error types for the SMS Activate adapter.

use crate::errors::RetryableError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;
use tracing::warn;

/// Error codes returned by the SMS Activate API as plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum SmsActivateErrorCode {
    // === Transient / Server Errors (Retryable) ===
    /// Internal SQL error on service side.
    ErrorSql,
    /// Account blocked by channel limits (temporary).
    ChannelsLimit,

    // === Purchase-time Errors ===
    /// No numbers available for the requested country/service.
    NoNumbers,
    /// Balance too low for the purchase.
    NoBalance,

    // === Fatal / Client Errors (Non-retryable) ===
    /// Activation with this id does not exist.
    NoActivation,
    /// Invalid API key.
    BadKey,
    /// Incorrect action.
    BadAction,
    /// Incorrect service code.
    BadService,
    /// Account banned until specified datetime.
    Banned { until: String },
    /// Maximum price is less than allowed minimum.
    WrongMaxPrice { min: Option<f64> },
    /// Not allowed to cancel within first 2 minutes.
    EarlyCancelDenied,
    /// Incorrect status.
    BadStatus,
    /// Invalid activation ID or ID is not a number.
    WrongActivationId,

    /// Unknown error code from service.
    Unknown { raw: String },
}

impl SmsActivateErrorCode {
    /// Returns the API error code string representation.
    pub fn code_name(&self) -> &str {
        match self {
            Self::ErrorSql => "ERROR_SQL",
            Self::ChannelsLimit => "CHANNELS_LIMIT",
            Self::NoNumbers => "NO_NUMBERS",
            Self::NoBalance => "NO_BALANCE",
            Self::NoActivation => "NO_ACTIVATION",
            Self::BadKey => "BAD_KEY",
            Self::BadAction => "BAD_ACTION",
            Self::BadService => "BAD_SERVICE",
            Self::Banned { .. } => "BANNED",
            Self::WrongMaxPrice { .. } => "WRONG_MAX_PRICE",
            Self::EarlyCancelDenied => "EARLY_CANCEL_DENIED",
            Self::BadStatus => "BAD_STATUS",
            Self::WrongActivationId => "WRONG_ACTIVATION_ID",
            Self::Unknown { raw } => raw.as_str(),
        }
    }

    /// Returns human-readable description.
    pub fn description(&self) -> String {
        match self {
            Self::ErrorSql => "Internal SQL error on service side".to_string(),
            Self::ChannelsLimit => "Account blocked by channel limits".to_string(),
            Self::NoNumbers => "No numbers available".to_string(),
            Self::NoBalance => "Insufficient balance".to_string(),
            Self::NoActivation => "Activation does not exist".to_string(),
            Self::BadKey => "Invalid API key".to_string(),
            Self::BadAction => "Incorrect action".to_string(),
            Self::BadService => "Incorrect service code".to_string(),
            Self::Banned { until } => format!("Account banned until {}", until),
            Self::WrongMaxPrice { min } => match min {
                Some(v) => format!("Maximum price is less than allowed minimum: {}", v),
                None => "Maximum price is less than allowed minimum".to_string(),
            },
            Self::EarlyCancelDenied => "Not allowed to cancel within first 2 minutes".to_string(),
            Self::BadStatus => "Incorrect status".to_string(),
            Self::WrongActivationId => "Invalid activation ID".to_string(),
            Self::Unknown { raw } => format!("Unknown error: {}", raw),
        }
    }

    /// Parse error code from raw API response.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let s = raw.trim();

        let code = match s {
            "ERROR_SQL" => Self::ErrorSql,
            "CHANNELS_LIMIT" => Self::ChannelsLimit,
            "NO_NUMBERS" => Self::NoNumbers,
            "NO_BALANCE" => Self::NoBalance,
            "NO_ACTIVATION" => Self::NoActivation,
            "BAD_KEY" => Self::BadKey,
            "BAD_ACTION" => Self::BadAction,
            "BAD_SERVICE" => Self::BadService,
            "EARLY_CANCEL_DENIED" => Self::EarlyCancelDenied,
            "BAD_STATUS" => Self::BadStatus,
            "WRONG_ACTIVATION_ID" => Self::WrongActivationId,
            _ => return Self::parse_parametrized_error(s),
        };

        Some(code)
    }

    /// Parse error codes with parameters (BANNED, WRONG_MAX_PRICE).
    fn parse_parametrized_error(s: &str) -> Option<Self> {
        // BANNED:'YYYY-m-d H-i-s'
        static RE_BANNED: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"^BANNED\s*:\s*['"]([^'"]+)['"]$"#).expect("banned regex is valid")
        });
        if let Some(until) = RE_BANNED.captures(s).and_then(|cap| cap.get(1)) {
            return Some(Self::Banned {
                until: until.as_str().to_string(),
            });
        }

        // WRONG_MAX_PRICE:<num>
        static RE_WRONG_MAX_PRICE: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r#"^WRONG_MAX_PRICE\s*:\s*([0-9]+(?:\.[0-9]+)?)$"#)
                .expect("max price regex is valid")
        });
        if let Some(cap) = RE_WRONG_MAX_PRICE.captures(s) {
            let min = cap.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            return Some(Self::WrongMaxPrice { min });
        }

        if Self::looks_like_error_code(s) {
            return Some(Self::Unknown { raw: s.to_string() });
        }

        None
    }

    /// Check if string looks like an error code format.
    fn looks_like_error_code(s: &str) -> bool {
        // Success vocabularies share the upper-snake shape
        if s.starts_with("ACCESS_") || s.starts_with("STATUS_") {
            return false;
        }

        const KNOWN_ERROR_PREFIXES: [&str; 8] = [
            "NO_", "ERROR_", "BAD_", "WRONG_", "EARLY_", "BANNED", "CHANNELS_", "ORDER_",
        ];

        KNOWN_ERROR_PREFIXES.iter().any(|p| s.starts_with(p))
    }

    /// Returns true if this error is transient and the call should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ErrorSql | Self::ChannelsLimit)
    }

    /// Returns true if a fresh operation might succeed.
    pub fn should_retry_operation(&self) -> bool {
        match self {
            Self::ErrorSql | Self::ChannelsLimit => true,
            // Another country may have stock
            Self::NoNumbers => true,
            // Activation-specific errors - fresh attempt might work
            Self::NoActivation | Self::WrongActivationId => true,
            Self::NoBalance
            | Self::BadKey
            | Self::BadAction
            | Self::BadService
            | Self::Banned { .. }
            | Self::WrongMaxPrice { .. }
            | Self::EarlyCancelDenied
            | Self::BadStatus
            | Self::Unknown { .. } => false,
        }
    }
}

impl Display for SmsActivateErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_name())
    }
}

/// Error returned by the SMS Activate service.
#[derive(Debug, Clone, Error)]
#[error("SMS Activate service error: code={code}, description={description}")]
pub struct SmsActivateServiceError {
    /// Error code from the service.
    pub code: SmsActivateErrorCode,
    /// Human-readable description.
    pub description: String,
    /// Original raw response text.
    pub raw: String,
}

impl SmsActivateServiceError {
    /// Create new service error from code and raw response.
    pub fn new(code: SmsActivateErrorCode, raw: String) -> Self {
        let description = code.description();
        Self {
            code,
            description,
            raw,
        }
    }
}

/// Parse SMS Activate error from API response text.
pub(crate) fn parse_sms_activate_error(raw: &str) -> Option<SmsActivateServiceError> {
    let code = SmsActivateErrorCode::from_raw(raw)?;
    let error = SmsActivateServiceError::new(code, raw.to_string());

    warn!(
        code = %error.code,
        description = %error.description,
        raw = %raw,
        "SMS Activate service returned error"
    );

    Some(error)
}

/// Main error type for SMS Activate client operations.
#[derive(Debug, Error)]
pub enum SmsActivateError {
    /// Failed to build HTTP client.
    #[error("Failed to build HTTP client: {0}")]
    BuildHttpClient(#[source] reqwest::Error),

    /// Invalid endpoint URL.
    #[error("Invalid SMS Activate endpoint: {0}")]
    InvalidEndpoint(#[source] url::ParseError),

    /// Error building SMS Activate request URL.
    #[error("Error building SMS Activate request URL: {0}")]
    BuildRequestUrl(#[source] serde_urlencoded::ser::Error),

    /// Failed to send HTTP request.
    #[error("Failed to send HTTP request: {0}")]
    HttpRequest(#[from] reqwest_middleware::Error),

    /// Non-2xx HTTP status.
    #[error("SMS Activate returned HTTP error: {0}")]
    HttpStatus(#[source] reqwest::Error),

    /// Failed to read response body.
    #[error("Failed to parse response: {0}")]
    ParseResponse(#[source] reqwest::Error),

    /// SMS Activate service error.
    #[error("SMS Activate service error: {0}")]
    Service(#[source] SmsActivateServiceError),

    /// Unrecognized text response.
    #[error("Unexpected SMS Activate response: {raw}")]
    UnexpectedResponse { raw: String },

    /// Failed to deserialize JSON response.
    #[error("Failed to deserialize JSON response: {0}")]
    DeserializeJson(#[source] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SmsActivateError>;

impl RetryableError for SmsActivateError {
    fn is_retryable(&self) -> bool {
        match self {
            SmsActivateError::Service(error) => error.code.is_retryable(),
            SmsActivateError::HttpRequest(_) | SmsActivateError::HttpStatus(_) => true,
            SmsActivateError::BuildHttpClient(_)
            | SmsActivateError::InvalidEndpoint(_)
            | SmsActivateError::BuildRequestUrl(_)
            | SmsActivateError::ParseResponse(_)
            | SmsActivateError::UnexpectedResponse { .. }
            | SmsActivateError::DeserializeJson(_) => false,
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            SmsActivateError::Service(error) => error.code.should_retry_operation(),
            SmsActivateError::HttpRequest(_) | SmsActivateError::HttpStatus(_) => true,
            SmsActivateError::BuildHttpClient(_)
            | SmsActivateError::InvalidEndpoint(_)
            | SmsActivateError::BuildRequestUrl(_)
            | SmsActivateError::ParseResponse(_)
            | SmsActivateError::UnexpectedResponse { .. }
            | SmsActivateError::DeserializeJson(_) => false,
        }
    }
}
