use billing_types::SettlementStatus;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Payment scenario for the dummy provider.
/// Simulates different settlement outcomes without any network traffic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum PaymentScenario {
    /// Payment settles successfully
    #[default]
    Success,
    /// Card is declined after redirect
    Decline,
    /// Insufficient funds after redirect
    InsufficientFunds,
    /// Subscriber never completes the hosted page
    Abandoned,
    /// Provider refuses to open a session
    Rejected,
    /// Provider cannot be reached
    Unavailable,
}

impl PaymentScenario {
    pub fn description(&self) -> &'static str {
        match self {
            PaymentScenario::Success => "Payment succeeds",
            PaymentScenario::Decline => "Card is declined",
            PaymentScenario::InsufficientFunds => "Card has insufficient funds",
            PaymentScenario::Abandoned => "Checkout is never completed",
            PaymentScenario::Rejected => "Provider rejects the payment request",
            PaymentScenario::Unavailable => "Provider is unreachable",
        }
    }

    /// Settlement the provider eventually reports for a session opened with this scenario.
    pub fn settlement(&self) -> SettlementStatus {
        match self {
            PaymentScenario::Success => SettlementStatus::Success,
            PaymentScenario::Decline
            | PaymentScenario::InsufficientFunds
            | PaymentScenario::Rejected => SettlementStatus::Failed,
            PaymentScenario::Abandoned | PaymentScenario::Unavailable => SettlementStatus::Pending,
        }
    }

    /// Whether opening the session itself fails
    pub fn fails_at_initiation(&self) -> bool {
        matches!(
            self,
            PaymentScenario::Rejected | PaymentScenario::Unavailable
        )
    }

    pub fn all() -> &'static [PaymentScenario] {
        &[
            PaymentScenario::Success,
            PaymentScenario::Decline,
            PaymentScenario::InsufficientFunds,
            PaymentScenario::Abandoned,
            PaymentScenario::Rejected,
            PaymentScenario::Unavailable,
        ]
    }
}
