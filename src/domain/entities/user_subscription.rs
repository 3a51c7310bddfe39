use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString, Default,
)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    /// Created at checkout, waiting for settlement
    #[default]
    Pending,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    /// Status as observed at `now`. An active row whose end date has passed
    /// reads as expired even if no sweep has persisted it yet.
    pub fn effective(&self, end_date: Option<NaiveDateTime>, now: NaiveDateTime) -> Self {
        match (self, end_date) {
            (SubscriptionStatus::Active, Some(end)) if end <= now => SubscriptionStatus::Expired,
            (status, _) => *status,
        }
    }

    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, SubscriptionStatus::Pending | SubscriptionStatus::Active)
    }
}
