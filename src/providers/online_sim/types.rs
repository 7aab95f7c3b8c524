//! Types for OnlineSim API responses.

use super::errors::OnlineSimError;
use crate::order::{OrderSnapshot, OrderStatus};
use crate::utils::code::extract_code;
use crate::utils::de::{flexible_f64, optional_f64, string_or_number};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Parse a body whose `response` field carries either success (`1`) or an
/// error code.
pub fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, OnlineSimError> {
    let value: Value = serde_json::from_str(text).map_err(OnlineSimError::DeserializeJson)?;

    if let Some(Value::String(code)) = value.get("response")
        && code.trim() != "1"
    {
        return Err(OnlineSimError::service(code));
    }

    serde_json::from_value(value).map_err(OnlineSimError::DeserializeJson)
}

/// Response from `getBalance.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// Available balance.
    #[serde(deserialize_with = "flexible_f64")]
    pub balance: f64,
}

/// Response from `getNum.php?number=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetNumResponse {
    /// Operation id.
    #[serde(deserialize_with = "string_or_number")]
    pub tzid: String,
    /// Purchased number.
    pub number: String,
}

/// One service offer inside a country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Numbers in stock.
    #[serde(default)]
    pub count: u32,
    /// Unit price.
    #[serde(deserialize_with = "flexible_f64")]
    pub price: f64,
    /// Service slug (`whatsapp`).
    #[serde(default)]
    pub slug: Option<String>,
}

/// One country entry from `getNumbersStats.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryStats {
    /// English country name.
    pub name: String,
    /// Whether the vendor currently sells this country.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Offers keyed by `service_<slug>`.
    #[serde(default)]
    pub services: HashMap<String, ServiceStats>,
}

fn enabled_by_default() -> bool {
    true
}

impl CountryStats {
    /// Offer for `slug`, matched by key or by the embedded slug.
    pub fn service(&self, slug: &str) -> Option<&ServiceStats> {
        self.services
            .get(&format!("service_{slug}"))
            .or_else(|| {
                self.services
                    .values()
                    .find(|s| s.slug.as_deref() == Some(slug))
            })
    }
}

/// `getNumbersStats.php` payload keyed by country dial code.
pub type NumbersStatsResponse = HashMap<String, CountryStats>;

/// One operation from `getState.php`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationState {
    /// Operation id.
    #[serde(deserialize_with = "string_or_number")]
    pub tzid: String,
    /// State code (`TZ_NUM_WAIT`, ...).
    pub response: String,
    /// Code when `message_to_code=1`, otherwise a message list.
    #[serde(default)]
    pub msg: Option<Value>,
    /// Number of the operation.
    #[serde(default)]
    pub number: Option<String>,
    /// Price charged.
    #[serde(default, deserialize_with = "optional_f64")]
    pub sum: Option<f64>,
}

impl OperationState {
    /// Code held by the operation, if any.
    pub fn code(&self) -> Option<String> {
        match self.msg.as_ref()? {
            Value::String(s) => {
                let s = s.trim();
                if s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty() {
                    Some(s.to_string())
                } else {
                    extract_code(s)
                }
            }
            Value::Number(n) => Some(n.to_string()),
            Value::Array(messages) => messages.iter().rev().find_map(|m| {
                m.get("msg")
                    .and_then(Value::as_str)
                    .and_then(extract_code)
            }),
            _ => None,
        }
    }

    /// Map onto the normalized lifecycle.
    pub fn to_snapshot(&self) -> Result<OrderSnapshot, OnlineSimError> {
        let status = map_state(&self.response)
            .ok_or_else(|| OnlineSimError::UnexpectedResponse(self.response.clone()))?;
        let code = self.code();

        Ok(match (status, code) {
            (OrderStatus::Received, Some(code)) => OrderSnapshot::received(code),
            (OrderStatus::Received, None) => OrderSnapshot::status(OrderStatus::Waiting),
            (status, code) => OrderSnapshot {
                status,
                code: code.map(Into::into),
            },
        })
    }
}

/// Vendor state to lifecycle status.
///
/// `TZ_INPOOL` is a purchased number not yet listening; from the poller's
/// point of view it is still waiting.
pub fn map_state(raw: &str) -> Option<OrderStatus> {
    match raw.trim() {
        "TZ_INPOOL" | "TZ_NUM_WAIT" => Some(OrderStatus::Waiting),
        "TZ_NUM_ANSWER" => Some(OrderStatus::Received),
        "TZ_OVER_EMPTY" => Some(OrderStatus::Timeout),
        "TZ_OVER_OK" => Some(OrderStatus::Finished),
        "TZ_DELETED" => Some(OrderStatus::Canceled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::online_sim::errors::OnlineSimErrorCode;
    use crate::types::SmsCode;

    fn state(response: &str, msg: Option<Value>) -> OperationState {
        OperationState {
            tzid: "1".to_string(),
            response: response.to_string(),
            msg,
            number: None,
            sum: None,
        }
    }

    #[test]
    fn test_state_vocabulary_mapping() {
        let cases = [
            ("TZ_INPOOL", OrderStatus::Waiting),
            ("TZ_NUM_WAIT", OrderStatus::Waiting),
            ("TZ_NUM_ANSWER", OrderStatus::Received),
            ("TZ_OVER_EMPTY", OrderStatus::Timeout),
            ("TZ_OVER_OK", OrderStatus::Finished),
            ("TZ_DELETED", OrderStatus::Canceled),
        ];
        for (raw, expected) in cases {
            assert_eq!(map_state(raw), Some(expected), "{raw}");
        }
        assert_eq!(map_state("TZ_SOMETHING"), None);
    }

    #[test]
    fn test_answer_snapshot() {
        let snapshot = state("TZ_NUM_ANSWER", Some(Value::from("482913")))
            .to_snapshot()
            .unwrap();
        assert_eq!(snapshot, OrderSnapshot::received(SmsCode::new("482913")));
    }

    #[test]
    fn test_over_ok_snapshot_keeps_code() {
        let snapshot = state("TZ_OVER_OK", Some(Value::from("482913")))
            .to_snapshot()
            .unwrap();
        assert_eq!(snapshot.status, OrderStatus::Finished);
        assert_eq!(snapshot.code, Some(SmsCode::new("482913")));
    }

    #[test]
    fn test_code_from_message_list() {
        let msg = serde_json::json!([{"service": "WhatsApp", "msg": "WhatsApp code 482-913"}]);
        assert_eq!(
            state("TZ_NUM_ANSWER", Some(msg)).code().as_deref(),
            Some("482913")
        );
    }

    #[test]
    fn test_parse_body_error_code() {
        let err = parse_body::<GetNumResponse>(r#"{"response": "NO_NUMBER"}"#).unwrap_err();
        assert!(matches!(
            err,
            OnlineSimError::Service(OnlineSimErrorCode::NoNumber)
        ));
    }

    #[test]
    fn test_parse_body_success() {
        let body: GetNumResponse =
            parse_body(r#"{"response": 1, "tzid": 1234567, "number": "+14155550100"}"#).unwrap();
        assert_eq!(body.tzid, "1234567");

        let balance: BalanceResponse =
            parse_body(r#"{"response": "1", "balance": "100.00", "zbalance": 0}"#).unwrap();
        assert_eq!(balance.balance, 100.0);
    }

    #[test]
    fn test_country_stats_service_lookup() {
        let json = r#"{
            "name": "USA",
            "services": {"service_whatsapp": {"count": 4, "price": 30, "slug": "whatsapp"}}
        }"#;
        let stats: CountryStats = serde_json::from_str(json).unwrap();
        assert!(stats.enabled);
        assert_eq!(stats.service("whatsapp").map(|s| s.count), Some(4));
        assert!(stats.service("telegram").is_none());
    }
}
