use billing_types::SettlementStatus;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Ledger status of a payment transaction.
///
/// Allowed transitions: `pending -> completed`, `pending -> failed`,
/// `completed -> refunded`. Retrying a failed payment creates a new row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString, Default,
)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TransactionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl TransactionStatus {
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
                | (TransactionStatus::Completed, TransactionStatus::Refunded)
        )
    }

    /// Terminal with respect to provider settlement. A completed row can
    /// still be refunded by an admin, but no webhook moves it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Whether a provider report is consistent with this ledger state.
    ///
    /// A refunded transaction was once settled successfully, so a replayed
    /// success report agrees with it.
    pub fn agrees_with(&self, reported: SettlementStatus) -> bool {
        match reported {
            SettlementStatus::Pending => matches!(self, TransactionStatus::Pending),
            SettlementStatus::Success => matches!(
                self,
                TransactionStatus::Completed | TransactionStatus::Refunded
            ),
            SettlementStatus::Failed => matches!(self, TransactionStatus::Failed),
        }
    }

    /// Whether the row counts towards revenue
    pub fn is_revenue(&self) -> bool {
        matches!(self, TransactionStatus::Completed)
    }
}
