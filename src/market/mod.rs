//! Market resolution.
//!
//! This module handles:
//! - Market reference (URL or slug) resolution
//! - Market and outcome types
//! - Gamma market-data client
//! - Mock source for testing

pub mod client;
pub mod mock;
pub mod slug;
pub mod types;

pub use client::{parse_event, GammaClient, MarketSource};
pub use mock::{MockMarketBuilder, MockMarketSource};
pub use slug::{event_url, extract_slug};
pub use types::{Market, Outcome};
