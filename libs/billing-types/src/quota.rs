use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::limit::Limit;

pub const UNLIMITED_LABEL: &str = "Unlimited";

/// One category's quota as shown to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDisplay {
    pub category: String,
    pub used: u32,
    /// `None` when unlimited
    pub limit: Option<u32>,
    /// `None` when unlimited
    pub remaining: Option<u32>,
    /// Never computed against an unlimited grant
    pub percent_used: Option<u8>,
    pub unlimited: bool,
    pub label: String,
}

impl QuotaDisplay {
    pub fn new(category: impl Into<String>, limit: Limit, used: u32) -> Self {
        match limit {
            Limit::Unlimited => Self {
                category: category.into(),
                used,
                limit: None,
                remaining: None,
                percent_used: None,
                unlimited: true,
                label: UNLIMITED_LABEL.to_string(),
            },
            Limit::Bounded(max) => {
                let percent = (u64::from(used) * 100 / u64::from(max.max(1))).min(100) as u8;
                Self {
                    category: category.into(),
                    used,
                    limit: Some(max),
                    remaining: limit.remaining(used),
                    percent_used: Some(percent),
                    unlimited: false,
                    label: format!("{} / {}", used, max),
                }
            }
        }
    }
}

/// Usage and quota snapshot for one subscriber.
///
/// Categories the subscriber is not granted appear in neither quota list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UsageResponse {
    pub post_usage: BTreeMap<String, u32>,
    pub view_usage: BTreeMap<String, u32>,
    pub post_quotas: Vec<QuotaDisplay>,
    pub view_quotas: Vec<QuotaDisplay>,
}
