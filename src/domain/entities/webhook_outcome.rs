use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// How a processed webhook event affected the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "webhook_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WebhookOutcome {
    /// Transaction moved out of pending
    Applied,
    /// Transaction already in the reported state
    Replayed,
    /// No transaction carries the reported provider reference
    Unmatched,
    /// Report disagrees with a terminal transaction
    Conflict,
    /// Pending report, nothing to do
    Ignored,
    /// Signature or payload rejected
    Invalid,
}

impl WebhookOutcome {
    pub fn needs_review(&self) -> bool {
        matches!(self, WebhookOutcome::Conflict)
    }

    pub fn mutated_ledger(&self) -> bool {
        matches!(self, WebhookOutcome::Applied)
    }
}
