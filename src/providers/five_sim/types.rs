//! Types for 5sim API responses.

use super::errors::FiveSimError;
use crate::order::{OrderSnapshot, OrderStatus};
use crate::utils::code::extract_code;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Response from `/v1/user/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Account id.
    pub id: u64,
    /// Account email.
    #[serde(default)]
    pub email: Option<String>,
    /// Available balance.
    pub balance: f64,
    /// Account rating.
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Price and stock of one operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorPrice {
    /// Unit price.
    pub cost: f64,
    /// Numbers in stock.
    pub count: u32,
    /// Delivery success rate, percent.
    #[serde(default)]
    pub rate: Option<f64>,
}

/// `/v1/guest/prices` payload: country -> product -> operator -> price.
pub type PricesResponse = HashMap<String, HashMap<String, HashMap<String, OperatorPrice>>>;

/// Aggregate of one country's operators.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryOffer {
    /// Cheapest in-stock price, or the cheapest overall when nothing is in stock.
    pub cost: f64,
    /// Stock summed over operators.
    pub count: u32,
}

/// Collapse the per-operator prices of one country.
///
/// Returns `None` when the country lists no operators.
pub fn aggregate_operators(operators: &HashMap<String, OperatorPrice>) -> Option<CountryOffer> {
    let count = operators.values().map(|p| p.count).sum();
    let cheapest = |in_stock_only: bool| {
        operators
            .values()
            .filter(|p| !in_stock_only || p.count > 0)
            .map(|p| p.cost)
            .min_by(f64::total_cmp)
    };
    let cost = cheapest(true).or_else(|| cheapest(false))?;
    Some(CountryOffer { cost, count })
}

/// SMS attached to an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sms {
    /// Sender name.
    #[serde(default)]
    pub sender: Option<String>,
    /// Message body.
    #[serde(default)]
    pub text: String,
    /// Code parsed by the vendor, may be empty.
    #[serde(default)]
    pub code: String,
}

impl Sms {
    /// Vendor-parsed code, or one extracted from the text.
    pub fn verification_code(&self) -> Option<String> {
        let code = self.code.trim();
        if !code.is_empty() {
            return Some(code.to_string());
        }
        extract_code(&self.text)
    }
}

/// Order as returned by buy, check, cancel, finish and ban.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Order id.
    pub id: u64,
    /// Number with leading `+`.
    pub phone: String,
    /// Operator the number belongs to.
    #[serde(default)]
    pub operator: Option<String>,
    /// Product the number was bought for.
    #[serde(default)]
    pub product: Option<String>,
    /// Price paid.
    pub price: f64,
    /// Raw status.
    pub status: String,
    /// Received messages.
    #[serde(default)]
    pub sms: Option<Vec<Sms>>,
    /// Country name.
    #[serde(default)]
    pub country: Option<String>,
}

impl OrderResponse {
    /// First code among the received messages.
    pub fn code(&self) -> Option<String> {
        self.sms
            .iter()
            .flatten()
            .find_map(Sms::verification_code)
    }

    /// Map onto the normalized lifecycle.
    ///
    /// `PENDING` means the number is live and listening, so it maps to
    /// `WAITING`. A `RECEIVED` order without a readable code is still waiting.
    pub fn to_snapshot(&self) -> Result<OrderSnapshot, FiveSimError> {
        let status = map_status(&self.status)
            .ok_or_else(|| FiveSimError::UnexpectedStatus(self.status.clone()))?;
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

/// Vendor status to lifecycle status.
pub fn map_status(raw: &str) -> Option<OrderStatus> {
    match raw.trim() {
        "PENDING" => Some(OrderStatus::Waiting),
        "RECEIVED" => Some(OrderStatus::Received),
        "CANCELED" => Some(OrderStatus::Canceled),
        "TIMEOUT" => Some(OrderStatus::Timeout),
        "FINISHED" => Some(OrderStatus::Finished),
        "BANNED" => Some(OrderStatus::Banned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SmsCode;

    fn order(status: &str, sms: Option<Vec<Sms>>) -> OrderResponse {
        OrderResponse {
            id: 11631253,
            phone: "+79000381454".to_string(),
            operator: Some("beeline".to_string()),
            product: Some("whatsapp".to_string()),
            price: 21.0,
            status: status.to_string(),
            sms,
            country: Some("russia".to_string()),
        }
    }

    #[test]
    fn test_status_vocabulary_mapping() {
        let cases = [
            ("PENDING", OrderStatus::Waiting),
            ("RECEIVED", OrderStatus::Received),
            ("CANCELED", OrderStatus::Canceled),
            ("TIMEOUT", OrderStatus::Timeout),
            ("FINISHED", OrderStatus::Finished),
            ("BANNED", OrderStatus::Banned),
        ];
        for (raw, expected) in cases {
            assert_eq!(map_status(raw), Some(expected), "{raw}");
        }
        assert_eq!(map_status("PREPARATION"), None);
    }

    #[test]
    fn test_received_snapshot_carries_code() {
        let sms = Sms {
            sender: Some("WhatsApp".to_string()),
            text: "Your code: 482-913".to_string(),
            code: String::new(),
        };
        let snapshot = order("RECEIVED", Some(vec![sms])).to_snapshot().unwrap();
        assert_eq!(snapshot, OrderSnapshot::received(SmsCode::new("482913")));
    }

    #[test]
    fn test_finished_snapshot_keeps_code() {
        let sms = Sms {
            sender: Some("WhatsApp".to_string()),
            text: "Your code: 482913".to_string(),
            code: "482913".to_string(),
        };
        let snapshot = order("FINISHED", Some(vec![sms])).to_snapshot().unwrap();
        assert_eq!(snapshot.status, OrderStatus::Finished);
        assert_eq!(snapshot.code, Some(SmsCode::new("482913")));
    }

    #[test]
    fn test_received_without_code_stays_waiting() {
        let snapshot = order("RECEIVED", Some(vec![])).to_snapshot().unwrap();
        assert_eq!(snapshot.status, OrderStatus::Waiting);
    }

    #[test]
    fn test_unknown_status_is_error() {
        assert!(matches!(
            order("WEIRD", None).to_snapshot(),
            Err(FiveSimError::UnexpectedStatus(_))
        ));
    }

    #[test]
    fn test_aggregate_prefers_in_stock_operator() {
        let operators = HashMap::from([
            (
                "beeline".to_string(),
                OperatorPrice {
                    cost: 5.0,
                    count: 0,
                    rate: None,
                },
            ),
            (
                "mts".to_string(),
                OperatorPrice {
                    cost: 8.0,
                    count: 10,
                    rate: Some(99.0),
                },
            ),
            (
                "tele2".to_string(),
                OperatorPrice {
                    cost: 12.0,
                    count: 5,
                    rate: None,
                },
            ),
        ]);

        assert_eq!(
            aggregate_operators(&operators),
            Some(CountryOffer {
                cost: 8.0,
                count: 15
            })
        );
        assert_eq!(aggregate_operators(&HashMap::new()), None);
    }

    #[test]
    fn test_order_response_deserialization() {
        let json = r#"{
            "id": 11631253,
            "phone": "+79000381454",
            "operator": "beeline",
            "product": "vkontakte",
            "price": 21,
            "status": "PENDING",
            "expires": "2018-10-13T08:28:38.809469028Z",
            "sms": null,
            "created_at": "2018-10-13T08:13:38.809469028Z",
            "country": "russia"
        }"#;
        let order: OrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, 11631253);
        assert_eq!(order.price, 21.0);
        assert_eq!(
            order.to_snapshot().unwrap().status,
            OrderStatus::Waiting
        );
    }
}
