use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Provider-agnostic outcome of a payment, as reported by `verify` or a webhook.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SettlementStatus {
    Success,
    Failed,
    Pending,
}

impl SettlementStatus {
    /// Pending reports never move the ledger.
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_roundtrip() {
        let json = serde_json::to_string(&SettlementStatus::Success).unwrap();
        assert_eq!(json, r#""success""#);
        let parsed: SettlementStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(parsed, SettlementStatus::Failed);
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!(
            "PENDING".parse::<SettlementStatus>().unwrap(),
            SettlementStatus::Pending
        );
        assert!("paid".parse::<SettlementStatus>().is_err());
    }

    #[test]
    fn test_is_final() {
        assert!(SettlementStatus::Success.is_final());
        assert!(SettlementStatus::Failed.is_final());
        assert!(!SettlementStatus::Pending.is_final());
    }
}
