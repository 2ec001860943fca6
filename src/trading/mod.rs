//! Trading module for order submission.
//!
//! This module handles:
//! - Order types and the pricing policy
//! - Trade result records
//! - The venue seam and its CLOB implementation
//! - Idempotent order submission and its key ledger

pub mod clob;
pub mod ledger;
pub mod mock;
pub mod order;
pub mod result;
pub mod submitter;
pub mod venue;

pub use clob::ClobVenue;
pub use ledger::{KeyState, SubmissionLedger};
pub use mock::{MockVenue, MockVenueConfig};
pub use order::{effective_price, order_size, share_size, OrderParams};
pub use result::{PaymentInfo, TradeDetails, TradeResult, TradeStatus};
pub use submitter::OrderSubmitter;
pub use venue::{Authentication, Venue, VenueResponse};
