//! Market-related types and the Gamma API response shapes they are parsed from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use super::slug::event_url;

/// One possible resolution of a market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Position within the market.
    pub index: usize,
    /// Display name.
    pub name: String,
    /// CLOB instrument (token) ID.
    pub token_id: String,
    /// Price in [0, 1].
    pub price: Decimal,
    /// Implied probability in [0, 100].
    pub probability: Decimal,
}

impl Outcome {
    /// Build an outcome; probability is always `price * 100`.
    pub fn new(
        index: usize,
        name: impl Into<String>,
        token_id: impl Into<String>,
        price: Decimal,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            token_id: token_id.into(),
            price,
            probability: price * Decimal::ONE_HUNDRED,
        }
    }
}

/// A tradeable prediction-market event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Market {
    /// Event slug.
    pub slug: String,
    /// Event title.
    pub title: String,
    /// Event description.
    pub description: String,
    /// Outcomes in venue order.
    pub outcomes: Vec<Outcome>,
    /// Open for trading.
    pub active: bool,
    /// Close date.
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    /// Condition ID.
    pub condition_id: String,
    /// Question ID.
    pub question_id: Option<String>,
    /// Traded volume in USDC.
    pub volume: Option<Decimal>,
    /// Liquidity in USDC.
    pub liquidity: Option<Decimal>,
}

impl Market {
    /// Outcome at `index`.
    pub fn outcome(&self, index: usize) -> Option<&Outcome> {
        self.outcomes.get(index)
    }

    /// Public event URL.
    pub fn url(&self) -> String {
        event_url(&self.slug)
    }
}

/// Event record from the Gamma API.
///
/// Numeric and list fields are kept as raw JSON because the API returns them
/// either natively or as JSON-encoded strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaEvent {
    /// Event slug.
    pub slug: Option<String>,
    /// Event title.
    pub title: Option<String>,
    /// Event description.
    pub description: Option<String>,
    /// Whether the event is active.
    pub active: Option<bool>,
    /// Whether the event is closed.
    pub closed: Option<bool>,
    /// Close date (ISO 8601).
    pub end_date: Option<String>,
    /// Condition ID.
    pub condition_id: Option<String>,
    /// Question ID.
    #[serde(rename = "questionID")]
    pub question_id: Option<String>,
    /// Volume, string or number.
    pub volume: Option<Value>,
    /// Liquidity, string or number.
    pub liquidity: Option<Value>,
    /// Child markets, one per outcome.
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

/// Child market of a Gamma event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    /// Outcome label.
    pub outcome: Option<String>,
    /// Short label used on grouped events.
    pub group_item_title: Option<String>,
    /// Market question.
    pub question: Option<String>,
    /// Token IDs, array or JSON-encoded array.
    pub clob_token_ids: Option<Value>,
    /// Prices, array or JSON-encoded array.
    pub outcome_prices: Option<Value>,
}

/// Search response: a bare array or an object holding `events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchResponse {
    /// Bare array of events.
    Events(Vec<Value>),
    /// Wrapped results.
    Wrapped {
        /// Matching events.
        #[serde(default)]
        events: Vec<Value>,
    },
}

impl SearchResponse {
    /// Raw event entries.
    pub fn into_events(self) -> Vec<Value> {
        match self {
            SearchResponse::Events(events) => events,
            SearchResponse::Wrapped { events } => events,
        }
    }
}

/// Elements of a list that may be a JSON array or a string holding one.
pub fn flexible_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// First list element rendered as a string.
pub fn first_string(value: Option<&Value>) -> Option<String> {
    let first = flexible_list(value?).into_iter().next()?;
    match first {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decimal from a JSON string or number.
pub fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// First list element as a price in [0, 1].
pub fn first_price(value: Option<&Value>) -> Option<Decimal> {
    let first = flexible_list(value?).into_iter().next()?;
    decimal_value(&first).filter(|p| *p >= Decimal::ZERO && *p <= Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn probability_is_price_times_hundred() {
        let outcome = Outcome::new(0, "Yes", "123", dec!(0.37));
        assert_eq!(outcome.probability, dec!(37));
        let outcome = Outcome::new(1, "No", "456", dec!(0.005));
        assert_eq!(outcome.probability, dec!(0.5));
    }

    #[test]
    fn market_url_uses_slug() {
        let market = Market {
            slug: "fed-decision".to_string(),
            title: "Fed decision".to_string(),
            description: String::new(),
            outcomes: vec![Outcome::new(0, "Yes", "1", dec!(0.5))],
            active: true,
            end_date: None,
            condition_id: String::new(),
            question_id: None,
            volume: None,
            liquidity: None,
        };
        assert_eq!(market.url(), "https://polymarket.com/event/fed-decision");
        assert!(market.outcome(0).is_some());
        assert!(market.outcome(1).is_none());
    }

    #[test]
    fn flexible_lists_accept_arrays_and_encoded_strings() {
        assert_eq!(flexible_list(&json!(["a", "b"])).len(), 2);
        assert_eq!(flexible_list(&json!("[\"a\", \"b\"]")).len(), 2);
        assert!(flexible_list(&json!("not json")).is_empty());
        assert!(flexible_list(&json!(42)).is_empty());
    }

    #[test]
    fn first_price_accepts_strings_and_numbers() {
        assert_eq!(first_price(Some(&json!("[\"0.6\", \"0.4\"]"))), Some(dec!(0.6)));
        assert_eq!(first_price(Some(&json!([0.25, 0.75]))), Some(dec!(0.25)));
        assert_eq!(first_price(Some(&json!(["abc"]))), None);
        assert_eq!(first_price(Some(&json!(["1.5"]))), None);
        assert_eq!(first_price(Some(&json!([]))), None);
        assert_eq!(first_price(None), None);
    }

    #[test]
    fn first_string_renders_numbers() {
        assert_eq!(
            first_string(Some(&json!([12345, 678]))),
            Some("12345".to_string())
        );
        assert_eq!(
            first_string(Some(&json!("[\"tok-1\"]"))),
            Some("tok-1".to_string())
        );
    }

    #[test]
    fn search_response_accepts_both_shapes() {
        let bare: SearchResponse = serde_json::from_value(json!([{"slug": "a"}])).unwrap();
        assert_eq!(bare.into_events().len(), 1);

        let wrapped: SearchResponse =
            serde_json::from_value(json!({"events": [{"slug": "a"}, {"slug": "b"}]})).unwrap();
        assert_eq!(wrapped.into_events().len(), 2);
    }
}
