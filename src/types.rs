//! Core types shared by providers, the order store and the proxy pool.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// ProviderId
// =============================================================================

/// Identifier of an SMS verification vendor (e.g. `"5sim"`).
///
/// Every [`Country`], [`Balance`] and order records the provider it came from,
/// and the registry routes order operations by this id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a new ProviderId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// OrderId
// =============================================================================

/// Vendor-assigned identifier of a purchased number (activation id).
///
/// Only unique within one provider; use [`OrderKey`] to address an order
/// across vendors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new OrderId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// OrderKey
// =============================================================================

/// Globally unique order address: `(provider, vendor order id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    /// Provider that sold the number.
    pub provider: ProviderId,
    /// Vendor order id.
    pub id: OrderId,
}

impl OrderKey {
    /// Create a new OrderKey.
    pub fn new(provider: impl Into<ProviderId>, id: impl Into<OrderId>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl Display for OrderKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.id)
    }
}

// =============================================================================
// SmsCode
// =============================================================================

/// SMS verification code (OTP).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsCode(pub String);

impl SmsCode {
    /// Create a new SmsCode.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SmsCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SmsCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for SmsCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for SmsCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// =============================================================================
// PhoneNumber
// =============================================================================

/// Error when parsing a phone number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhoneNumberError {
    /// Number contains non-digit characters.
    #[error("phone number must contain only digits")]
    NonDigit,
    /// Number has invalid length.
    #[error("phone number must be between 7 and 15 digits")]
    InvalidLength,
}

/// Full international phone number, stored as digits without the leading `+`
/// (e.g. `"14155550100"`).
///
/// Vendors disagree on whether they prefix numbers with `+`; it is stripped on
/// construction so numbers compare equal regardless of source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Create a new PhoneNumber, validating E.164 digit length.
    pub fn new(s: impl AsRef<str>) -> Result<Self, PhoneNumberError> {
        let n = s.as_ref().trim().trim_start_matches('+');
        if !n.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneNumberError::NonDigit);
        }
        if !(7..=15).contains(&n.len()) {
            return Err(PhoneNumberError::InvalidLength);
        }
        Ok(Self(n.to_string()))
    }

    /// Get the digits as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Format the number with a leading `+`.
    pub fn with_plus_prefix(&self) -> String {
        format!("+{}", self.0)
    }
}

impl FromStr for PhoneNumber {
    type Err = PhoneNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Display for PhoneNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for PhoneNumber {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        PhoneNumber::new(raw).map_err(de::Error::custom)
    }
}

impl Serialize for PhoneNumber {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

// =============================================================================
// Region / ProxyId / SessionId
// =============================================================================

/// Geographic region label of a proxy (e.g. `"us"`, `"eu-west"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Region(String);

impl Region {
    /// Create a new Region. Labels are compared case-insensitively.
    pub fn new(region: impl AsRef<str>) -> Self {
        Self(region.as_ref().trim().to_ascii_lowercase())
    }

    /// Get the region label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Region {
    fn from(region: &str) -> Self {
        Self::new(region)
    }
}

/// Identifier of a proxy in the pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProxyId(String);

impl ProxyId {
    /// Create a new ProxyId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProxyId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProxyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier returned by the external messaging-session creator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new SessionId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Service
// =============================================================================

/// Target platform the number is bought for.
///
/// Vendors name the same platform differently; each adapter maps a
/// `Service` to its own product code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Service {
    /// WhatsApp.
    #[default]
    Whatsapp,
    /// Telegram.
    Telegram,
    /// Any other product, passed to the vendor verbatim.
    Other { code: String },
}

// =============================================================================
// Country / Balance
// =============================================================================

/// Normalized catalog entry: one vendor's offer for one country.
///
/// Not unique by ISO region; the same region may be sold by several
/// vendors at different prices, so the key is `(provider, code)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    /// Provider offering this country.
    pub provider: ProviderId,
    /// Vendor-specific country code used when purchasing.
    pub code: String,
    /// ISO 3166-1 alpha-2 code, when the vendor name could be matched.
    pub iso_hint: Option<String>,
    /// Vendor display name.
    pub display_name: String,
    /// Price of one number.
    pub unit_price: f64,
    /// Currency of `unit_price`.
    pub currency: String,
    /// Numbers currently in stock.
    pub available_count: u32,
    /// Operator the price applies to (`"any"` when aggregated).
    pub operator: String,
}

impl Country {
    /// Zero stock means the country cannot be ordered.
    pub fn is_orderable(&self) -> bool {
        self.available_count > 0
    }
}

/// Account balance at one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Provider holding the balance.
    pub provider: ProviderId,
    /// Available funds.
    pub amount: f64,
    /// Currency of `amount`.
    pub currency: String,
}

impl Balance {
    /// Whether a purchase at `price` leaves the balance non-negative.
    pub fn can_afford(&self, price: f64) -> bool {
        self.amount - price >= 0.0
    }
}
