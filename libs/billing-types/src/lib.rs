//! Shared types for the marketplace billing engine.
//!
//! This crate provides:
//! - The `Limit` tagged value and its decoding from raw plan JSON
//! - Provider-agnostic `SettlementStatus`
//! - Quota display and usage response types
//! - API error codes

mod errors;
mod limit;
mod quota;
mod settlement;

pub use errors::{ErrorCode, LimitError};
pub use limit::{CategoryLimits, Limit, decode_category_limits, encode_category_limits};
pub use quota::{QuotaDisplay, UNLIMITED_LABEL, UsageResponse};
pub use settlement::SettlementStatus;
