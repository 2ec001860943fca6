//! Market reference resolution.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::MarketError;

/// Host marker that identifies a full market URL.
const HOST_MARKER: &str = "polymarket.com";

/// Public event URL prefix.
pub const EVENT_URL_PREFIX: &str = "https://polymarket.com/event/";

// Tried in order.
static PATH_PATTERNS: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"polymarket\.com/event/([^/]+)").expect("valid regex"),
        Regex::new(r"polymarket\.com/market/([^/]+)").expect("valid regex"),
    ]
});

/// Extract the market slug from a URL or bare slug.
///
/// Query parameters are stripped first. A reference with no path separator
/// and no host marker is taken to already be a slug.
///
/// ```
/// use poly402::market::extract_slug;
///
/// let slug = extract_slug("https://polymarket.com/event/fed-decision?tid=1").unwrap();
/// assert_eq!(slug, "fed-decision");
/// ```
pub fn extract_slug(reference: &str) -> Result<String, MarketError> {
    let trimmed = reference.trim();
    let without_query = trimmed.split('?').next().unwrap_or_default();

    for pattern in PATH_PATTERNS.iter() {
        if let Some(slug) = pattern
            .captures(without_query)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
        {
            return Ok(slug.to_string());
        }
    }

    if !without_query.is_empty()
        && !without_query.contains('/')
        && !without_query.contains(HOST_MARKER)
    {
        return Ok(without_query.to_string());
    }

    Err(MarketError::NotFound {
        reference: reference.to_string(),
    })
}

/// Public URL of an event.
pub fn event_url(slug: &str) -> String {
    format!("{}{}", EVENT_URL_PREFIX, slug)
}
