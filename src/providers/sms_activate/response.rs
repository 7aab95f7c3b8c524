//! Response parsing for SMS Activate API.

use super::errors::{SmsActivateServiceError, parse_sms_activate_error};
use serde::de::DeserializeOwned;

/// Unified response type for SMS Activate JSON calls.
#[derive(Debug)]
pub enum SmsActivateResponse<T> {
    Success(T),
    Error(SmsActivateServiceError),
}

impl<T> SmsActivateResponse<T> {
    /// Convert response into a Result for ergonomic error handling.
    pub fn into_result(self) -> Result<T, SmsActivateServiceError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Error(e) => Err(e),
        }
    }
}

impl<T: DeserializeOwned> SmsActivateResponse<T> {
    /// Parse SMS Activate response from raw text.
    ///
    /// Errors come back as plain text codes (`NO_NUMBERS`, `BAD_KEY`) while
    /// successful calls return JSON.
    pub fn from_text(text: &str) -> Result<Self, serde_json::Error> {
        if let Some(error) = parse_sms_activate_error(text) {
            return Ok(Self::Error(error));
        }

        let data = serde_json::from_str::<T>(text)?;
        Ok(Self::Success(data))
    }
}

/// Response type for the plain-text actions (getBalance, getStatus, setStatus).
#[derive(Debug)]
pub enum SmsActivateTextResponse {
    Success(String),
    Error(SmsActivateServiceError),
}

impl SmsActivateTextResponse {
    /// Parse response from raw text.
    pub fn from_text(text: &str) -> Self {
        if let Some(error) = parse_sms_activate_error(text) {
            Self::Error(error)
        } else {
            Self::Success(text.trim().to_string())
        }
    }

    /// Convert to Result.
    pub fn into_result(self) -> Result<String, SmsActivateServiceError> {
        match self {
            Self::Success(text) => Ok(text),
            Self::Error(e) => Err(e),
        }
    }
}
