use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::LimitError;

/// Per-category allowance granted by a plan.
///
/// Raw plan data historically encoded "unlimited" as `-1`, `true`, `"true"` or
/// `"unlimited"`. Those spellings are decoded exactly once, at load time, into
/// this tagged value. A category that is not granted has no `Limit` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Limit {
    Unlimited,
    Bounded(u32),
}

/// Category name to granted limit. Categories absent from the map are not granted.
pub type CategoryLimits = BTreeMap<String, Limit>;

impl Limit {
    /// Decode a raw limit value.
    ///
    /// Returns `Ok(None)` for the explicit "not granted" spellings (`0`, `false`,
    /// `null`, `""`, `"false"`, `"0"`) and `Err` for anything unrecognised.
    pub fn try_from_raw(raw: &Value) -> Result<Option<Limit>, LimitError> {
        match raw {
            Value::Null => Ok(None),
            Value::Bool(true) => Ok(Some(Limit::Unlimited)),
            Value::Bool(false) => Ok(None),
            Value::Number(n) => match n.as_i64() {
                Some(v) => Self::from_integer(v).map_err(|_| LimitError::Invalid(n.to_string())),
                None => match n.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => {
                        Self::from_integer(f as i64).map_err(|_| LimitError::Invalid(n.to_string()))
                    }
                    _ => Err(LimitError::Invalid(n.to_string())),
                },
            },
            Value::String(s) => {
                let s = s.trim().to_ascii_lowercase();
                match s.as_str() {
                    "" | "false" => Ok(None),
                    "true" | "unlimited" => Ok(Some(Limit::Unlimited)),
                    other => other
                        .parse::<i64>()
                        .map_err(|_| LimitError::Invalid(other.to_string()))
                        .and_then(|v| {
                            Self::from_integer(v).map_err(|_| LimitError::Invalid(other.to_string()))
                        }),
                }
            }
            other => Err(LimitError::Invalid(other.to_string())),
        }
    }

    /// Lenient decoding used when loading stored plans: garbage means "not granted".
    pub fn from_raw(raw: &Value) -> Option<Limit> {
        Self::try_from_raw(raw).ok().flatten()
    }

    fn from_integer(v: i64) -> Result<Option<Limit>, ()> {
        match v {
            -1 => Ok(Some(Limit::Unlimited)),
            0 => Ok(None),
            n if n > 0 => Ok(Some(Limit::Bounded(u32::try_from(n).unwrap_or(u32::MAX)))),
            _ => Err(()),
        }
    }

    /// Storage form: `-1` for unlimited, the bound otherwise.
    pub fn to_raw(self) -> Value {
        match self {
            Limit::Unlimited => Value::from(-1),
            Limit::Bounded(n) => Value::from(n),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Limit::Unlimited)
    }

    /// Remaining allowance after `used`; `None` when unlimited.
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Limit::Unlimited => None,
            Limit::Bounded(limit) => Some(limit.saturating_sub(used)),
        }
    }

    /// Whether one more unit may be consumed after `used`.
    pub fn permits(&self, used: u32) -> bool {
        self.remaining(used).is_none_or(|r| r > 0)
    }
}

/// Grants for the same category combine by maximum; `Unlimited` is above every bound.
impl PartialOrd for Limit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Limit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (self, other) {
            (Limit::Unlimited, Limit::Unlimited) => Ordering::Equal,
            (Limit::Unlimited, _) => Ordering::Greater,
            (_, Limit::Unlimited) => Ordering::Less,
            (Limit::Bounded(a), Limit::Bounded(b)) => a.cmp(b),
        }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Limit::Unlimited => write!(f, "unlimited"),
            Limit::Bounded(n) => write!(f, "{}", n),
        }
    }
}

/// Decode a raw `{category: limit}` JSON object, dropping categories that are not granted.
///
/// Non-object input decodes to an empty map.
pub fn decode_category_limits(raw: &Value) -> CategoryLimits {
    let Some(obj) = raw.as_object() else {
        return CategoryLimits::new();
    };
    obj.iter()
        .filter_map(|(category, value)| Limit::from_raw(value).map(|l| (category.clone(), l)))
        .collect()
}

pub fn encode_category_limits(limits: &CategoryLimits) -> Value {
    Value::Object(
        limits
            .iter()
            .map(|(category, limit)| (category.clone(), limit.to_raw()))
            .collect(),
    )
}
