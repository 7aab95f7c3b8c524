//! Types for SMS Activate API responses.

use crate::order::{OrderSnapshot, OrderStatus};
use crate::utils::de::{flexible_f64, string_or_number};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Timestamp layout used by `activationTime` and friends.
const VENDOR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Response from SMS Activate getNumberV2 API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPhoneNumberResponse {
    /// Activation id.
    #[serde(deserialize_with = "string_or_number")]
    pub activation_id: String,
    /// Full phone number with country code.
    pub phone_number: String,
    /// Cost of this activation.
    #[serde(deserialize_with = "flexible_f64")]
    pub activation_cost: f64,
    /// Country calling code.
    #[serde(default)]
    pub country_code: Option<String>,
    /// Vendor-local time from which the number accepts SMS.
    #[serde(default)]
    pub activation_time: Option<String>,
    /// Vendor-local expiry time.
    #[serde(default)]
    pub activation_end_time: Option<String>,
    /// Mobile operator name.
    #[serde(default)]
    pub activation_operator: Option<String>,
}

impl GetPhoneNumberResponse {
    /// Activation start as UTC, when it lies after `now`.
    ///
    /// The vendor reports local wall-clock time at `offset`.
    pub fn available_at(&self, offset: FixedOffset, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let raw = self.activation_time.as_deref()?;
        let at = parse_vendor_time(raw, offset)?;
        (at > now).then_some(at)
    }
}

/// Parse a vendor-local timestamp into UTC.
pub fn parse_vendor_time(raw: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), VENDOR_TIME_FORMAT).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Country entry from getCountries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryInfo {
    /// Vendor numeric country id.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// English name.
    pub eng: String,
    /// Whether the country is shown in the vendor catalog.
    #[serde(default)]
    pub visible: Option<u8>,
}

impl CountryInfo {
    /// Hidden countries are not sold.
    pub fn is_visible(&self) -> bool {
        self.visible.is_none_or(|v| v == 1)
    }
}

/// getCountries payload, keyed by country id.
pub type CountriesResponse = HashMap<String, CountryInfo>;

/// Price and stock of one service in one country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Unit price.
    #[serde(deserialize_with = "flexible_f64")]
    pub cost: f64,
    /// Numbers in stock.
    #[serde(default)]
    pub count: u32,
}

/// getPrices payload: country id -> service code -> price.
pub type PricesResponse = HashMap<String, HashMap<String, PriceEntry>>;

/// Parse `ACCESS_BALANCE:<amount>`.
pub fn parse_balance(raw: &str) -> Option<f64> {
    raw.trim()
        .strip_prefix("ACCESS_BALANCE:")
        .and_then(|amount| amount.trim().parse().ok())
}

/// Activation state reported by getStatus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    /// Waiting for the SMS.
    WaitCode,
    /// Waiting for a further SMS after `last`.
    WaitRetry { last: String },
    /// Waiting for a resend.
    WaitResend,
    /// Activation canceled.
    Cancel,
    /// Code received.
    Ok { code: String },
}

impl ActivationState {
    /// Parse the raw getStatus response.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let s = raw.trim();
        if let Some(code) = s.strip_prefix("STATUS_OK:") {
            let code = code.trim();
            // An empty payload carries nothing to record yet
            if code.is_empty() {
                return Some(Self::WaitCode);
            }
            return Some(Self::Ok {
                code: code.to_string(),
            });
        }
        if let Some(last) = s.strip_prefix("STATUS_WAIT_RETRY:") {
            return Some(Self::WaitRetry {
                last: last.trim().to_string(),
            });
        }
        match s {
            "STATUS_WAIT_CODE" => Some(Self::WaitCode),
            "STATUS_WAIT_RESEND" => Some(Self::WaitResend),
            "STATUS_CANCEL" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Map onto the normalized lifecycle.
    pub fn to_snapshot(&self) -> OrderSnapshot {
        match self {
            Self::WaitCode | Self::WaitRetry { .. } | Self::WaitResend => {
                OrderSnapshot::status(OrderStatus::Waiting)
            }
            Self::Cancel => OrderSnapshot::status(OrderStatus::Canceled),
            Self::Ok { code } => OrderSnapshot::received(code.as_str()),
        }
    }
}

/// Activation status codes for setStatus API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationStatus {
    /// Finish the activation.
    FinishActivation,
    /// Cancel the activation; also used to report a used or unusable number.
    CancelActivation,
}

impl ActivationStatus {
    /// Get the numeric status code for the API.
    pub fn code(&self) -> u8 {
        match self {
            Self::FinishActivation => 6,
            Self::CancelActivation => 8,
        }
    }
}

impl Display for ActivationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FinishActivation => write!(f, "FinishActivation(6)"),
            Self::CancelActivation => write!(f, "CancelActivation(8)"),
        }
    }
}

/// Response from setStatus API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetStatusResponse {
    /// Numbers readiness confirmed.
    Ready,
    /// Waiting for new SMS.
    RetryGet,
    /// Service successfully activated.
    Activation,
    /// Activation canceled.
    Cancel,
}

impl SetStatusResponse {
    /// Parse response from raw API response text.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ACCESS_READY" => Some(Self::Ready),
            "ACCESS_RETRY_GET" => Some(Self::RetryGet),
            "ACCESS_ACTIVATION" => Some(Self::Activation),
            "ACCESS_CANCEL" => Some(Self::Cancel),
            _ => None,
        }
    }

    /// Lifecycle status the vendor confirmed.
    pub fn to_snapshot(&self) -> OrderSnapshot {
        match self {
            Self::Activation => OrderSnapshot::status(OrderStatus::Finished),
            Self::Cancel => OrderSnapshot::status(OrderStatus::Canceled),
            Self::Ready | Self::RetryGet => OrderSnapshot::status(OrderStatus::Waiting),
        }
    }
}

impl Display for SetStatusResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ACCESS_READY"),
            Self::RetryGet => write!(f, "ACCESS_RETRY_GET"),
            Self::Activation => write!(f, "ACCESS_ACTIVATION"),
            Self::Cancel => write!(f, "ACCESS_CANCEL"),
        }
    }
}
