//! Gamma market-data API client.

use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, instrument, warn};

use crate::config::{Policy, Settings};
use crate::error::MarketError;
use crate::metrics;

use super::slug::extract_slug;
use super::types::{
    decimal_value, first_price, first_string, GammaEvent, Market, Outcome, SearchResponse,
};

/// Price assumed for an outcome the API reports no price for.
pub const DEFAULT_OUTCOME_PRICE: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Source of market data.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Resolve a URL or slug and fetch the market behind it.
    async fn fetch_market(&self, reference: &str) -> Result<Market, MarketError>;

    /// Markets matching a free-text query.
    async fn search_markets(&self, query: &str, limit: usize) -> Result<Vec<Market>, MarketError>;

    /// Open markets, newest first.
    async fn active_markets(&self, limit: usize, offset: usize)
        -> Result<Vec<Market>, MarketError>;
}

/// Client for the Gamma market-data API.
#[derive(Debug, Clone)]
pub struct GammaClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL, without trailing slash.
    base_url: String,
    /// Fallback strictness.
    policy: Policy,
}

impl GammaClient {
    /// Create a client from resolved settings.
    pub fn new(settings: &Settings) -> Result<Self, MarketError> {
        Self::with_endpoint(&settings.gamma_endpoint, settings.http_timeout, settings.policy)
    }

    /// Create a client for an explicit endpoint.
    pub fn with_endpoint(
        endpoint: &str,
        timeout: std::time::Duration,
        policy: Policy,
    ) -> Result<Self, MarketError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| MarketError::Network {
                context: "http client".to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: endpoint.trim_end_matches('/').to_string(),
            policy,
        })
    }

    /// Base URL of the API.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and return the body as JSON.
    ///
    /// Any non-2xx status, 404 included, is a network error.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        endpoint: &'static str,
    ) -> Result<Value, MarketError> {
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        let result = self.http.get(&url).query(query).send().await;
        metrics::record_market_fetch_latency(start, endpoint);

        let response = result.map_err(|e| MarketError::Network {
            context: url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketError::Network {
                context: url,
                reason: format!("HTTP {}", status),
            });
        }

        let body = response.text().await.map_err(|e| MarketError::Network {
            context: url.clone(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&body)
            .map_err(|e| MarketError::Parse(format!("invalid JSON from {}: {}", url, e)))
    }

    /// Parse a list of raw events, skipping entries that do not parse.
    fn parse_listing(&self, entries: Vec<Value>) -> Vec<Market> {
        let mut markets = Vec::with_capacity(entries.len());

        for entry in entries {
            let event: GammaEvent = match serde_json::from_value(entry) {
                Ok(event) => event,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed event");
                    continue;
                }
            };

            let slug = match event.slug.clone().filter(|s| !s.is_empty()) {
                Some(slug) => slug,
                None => {
                    debug!("Skipping event without slug");
                    continue;
                }
            };

            match parse_event(event, &slug, &self.policy) {
                Ok(market) => markets.push(market),
                Err(e) => debug!(slug = %slug, error = %e, "Skipping unparsable event"),
            }
        }

        metrics::inc_markets_fetched(markets.len());
        markets
    }
}

#[async_trait]
impl MarketSource for GammaClient {
    #[instrument(skip(self))]
    async fn fetch_market(&self, reference: &str) -> Result<Market, MarketError> {
        let slug = extract_slug(reference)?;
        debug!(slug = %slug, "Resolved market reference");

        let path = format!("/events/slug/{}", slug);
        let body = self.get_json(&path, &[], "events_slug").await?;

        let event: GammaEvent = serde_json::from_value(body)
            .map_err(|e| MarketError::Parse(format!("event {}: {}", slug, e)))?;

        let market = parse_event(event, &slug, &self.policy)?;
        metrics::inc_markets_fetched(1);
        Ok(market)
    }

    #[instrument(skip(self))]
    async fn search_markets(&self, query: &str, limit: usize) -> Result<Vec<Market>, MarketError> {
        let params = [("query", query.to_string()), ("limit", limit.to_string())];
        let body = self.get_json("/search", &params, "search").await?;

        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| MarketError::Parse(format!("search response: {}", e)))?;

        Ok(self.parse_listing(response.into_events()))
    }

    #[instrument(skip(self))]
    async fn active_markets(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Market>, MarketError> {
        let params = [
            ("closed", "false".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("order", "id".to_string()),
            ("ascending", "false".to_string()),
        ];
        let body = self.get_json("/events", &params, "events").await?;

        let entries = match body {
            Value::Array(entries) => entries,
            other => {
                return Err(MarketError::Parse(format!(
                    "expected an array of events, got {}",
                    json_kind(&other)
                )))
            }
        };

        Ok(self.parse_listing(entries))
    }
}

/// Convert a Gamma event into a [`Market`] keyed by `slug`.
pub fn parse_event(event: GammaEvent, slug: &str, policy: &Policy) -> Result<Market, MarketError> {
    let mut outcomes = Vec::with_capacity(event.markets.len());

    for (index, entry) in event.markets.into_iter().enumerate() {
        let name = [entry.outcome, entry.group_item_title, entry.question]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("Outcome {}", index));

        let token_id = first_string(entry.clob_token_ids.as_ref()).unwrap_or_default();

        let price = match first_price(entry.outcome_prices.as_ref()) {
            Some(price) => price,
            None if policy.strict_prices => {
                return Err(MarketError::Parse(format!(
                    "outcome {} of {} has no valid price",
                    index, slug
                )))
            }
            None => {
                debug!(slug = %slug, index, "Outcome price missing, using default");
                DEFAULT_OUTCOME_PRICE
            }
        };

        outcomes.push(Outcome::new(index, name, token_id, price));
    }

    let end_date = match event.end_date.as_deref().filter(|s| !s.trim().is_empty()) {
        None => None,
        Some(raw) => match parse_end_date(raw) {
            Some(date) => Some(date),
            None if policy.strict_dates => {
                return Err(MarketError::Parse(format!(
                    "unparsable end date {:?} for {}",
                    raw, slug
                )))
            }
            None => {
                warn!(slug = %slug, end_date = %raw, "Dropping unparsable end date");
                None
            }
        },
    };

    let active = event.active.unwrap_or(true) && !event.closed.unwrap_or(false);
    if active && outcomes.is_empty() {
        return Err(MarketError::Parse(format!(
            "active market {} has no outcomes",
            slug
        )));
    }

    Ok(Market {
        slug: slug.to_string(),
        title: event.title.unwrap_or_default(),
        description: event.description.unwrap_or_default(),
        outcomes,
        active,
        end_date,
        condition_id: event.condition_id.unwrap_or_default(),
        question_id: event.question_id,
        volume: event.volume.as_ref().and_then(decimal_value),
        liquidity: event.liquidity.as_ref().and_then(decimal_value),
    })
}

/// Parse an ISO-8601 timestamp or date.
///
/// Values without an offset are UTC, and a bare date is midnight UTC.
fn parse_end_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(date) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(date);
    }
    if let Ok(date) = OffsetDateTime::parse(raw, &Iso8601::DEFAULT) {
        return Some(date);
    }

    // A space may separate date and time.
    let local = raw.replacen(' ', "T", 1);
    if let Ok(date) = PrimitiveDateTime::parse(&local, &Iso8601::DEFAULT) {
        return Some(date.assume_utc());
    }
    Date::parse(raw, &Iso8601::DEFAULT)
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
