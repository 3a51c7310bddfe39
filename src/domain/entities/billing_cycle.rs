use chrono::{Datelike, Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Validity period a plan purchase grants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, AsRefStr, Display,
    EnumString,
)]
#[sqlx(type_name = "billing_cycle", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BillingCycle {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Lifetime,
}

impl BillingCycle {
    /// End of a period starting at `start`; `None` for lifetime plans.
    ///
    /// Month and year arithmetic clamps to the last day of the target month:
    /// Jan 31 + 1 month is Feb 28 (or 29), Feb 29 + 1 year is Feb 28.
    pub fn period_end(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            BillingCycle::Daily => start.checked_add_signed(Duration::days(1)),
            BillingCycle::Weekly => start.checked_add_signed(Duration::weeks(1)),
            BillingCycle::Monthly => start.checked_add_months(Months::new(1)),
            BillingCycle::Yearly => start.checked_add_months(Months::new(12)),
            BillingCycle::Lifetime => None,
        }
    }

    pub fn is_lifetime(&self) -> bool {
        matches!(self, BillingCycle::Lifetime)
    }

    /// `n`-th period boundary counted from `anchor`; `n = 0` is the anchor.
    ///
    /// Always measured from the anchor, so clamped month ends do not drift:
    /// Jan 31 gives Feb 28, then Mar 31.
    pub fn boundary(&self, anchor: NaiveDateTime, n: u32) -> Option<NaiveDateTime> {
        match self {
            BillingCycle::Daily => anchor.checked_add_signed(Duration::days(n.into())),
            BillingCycle::Weekly => anchor.checked_add_signed(Duration::weeks(n.into())),
            BillingCycle::Monthly => anchor.checked_add_months(Months::new(n)),
            BillingCycle::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
            BillingCycle::Lifetime => (n == 0).then_some(anchor),
        }
    }

    /// Start of the period containing `at` for a subscription anchored at `anchor`.
    pub fn period_start(&self, anchor: NaiveDateTime, at: NaiveDateTime) -> NaiveDateTime {
        self.boundary(anchor, self.period_index(anchor, at))
            .unwrap_or(anchor)
    }

    /// First anchored boundary strictly after `after`.
    pub fn next_boundary_after(
        &self,
        anchor: NaiveDateTime,
        after: NaiveDateTime,
    ) -> Option<NaiveDateTime> {
        let next = self.period_index(anchor, after).checked_add(1)?;
        self.boundary(anchor, next)
    }

    /// Largest `n` with `boundary(anchor, n) <= at`.
    fn period_index(&self, anchor: NaiveDateTime, at: NaiveDateTime) -> u32 {
        if at <= anchor {
            return 0;
        }
        let estimate = match self {
            BillingCycle::Daily => (at - anchor).num_days(),
            BillingCycle::Weekly => (at - anchor).num_weeks(),
            BillingCycle::Monthly => months_between(anchor, at),
            BillingCycle::Yearly => months_between(anchor, at) / 12,
            BillingCycle::Lifetime => 0,
        };
        let mut n = u32::try_from(estimate.max(0)).unwrap_or(u32::MAX);
        // Calendar estimates overshoot by one when `at` falls earlier in its month
        while n > 0 && self.boundary(anchor, n).is_none_or(|b| b > at) {
            n -= 1;
        }
        n
    }
}

fn months_between(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month())
}
