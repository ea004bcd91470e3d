//! Debit aggregation for the spending summary.
//!
//! Provides functions to total debits overall, by category and by calendar
//! month. Buckets without any debits are left out rather than zero-filled.

use std::{collections::BTreeMap, ops::RangeInclusive};

use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};

use crate::analytics::history::Debit;

/// How many calendar months the monthly spending trend looks back.
pub(super) const TREND_MONTHS: u8 = 6;

time::serde::format_description!(month_start, Date, "[year]-[month]-[day]");

/// The total debit amount for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    /// The category label as entered by the user.
    pub category: String,
    /// The sum of the debits in this category.
    pub total: f64,
}

/// The total debit amount for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// The first day of the month.
    #[serde(with = "month_start")]
    pub month: Date,
    /// The sum of the debits created in this month.
    pub total: f64,
}

/// Sums the amounts of all `debits`.
pub(super) fn total_spent(debits: &[Debit]) -> f64 {
    debits.iter().map(|debit| debit.amount).sum()
}

/// Groups `debits` by category label.
///
/// # Returns
/// One total per category that has at least one debit, sorted by label.
pub(super) fn totals_by_category(debits: &[Debit]) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();

    for debit in debits {
        *totals.entry(debit.category.as_str()).or_insert(0.0) += debit.amount;
    }

    totals
        .into_iter()
        .map(|(category, total)| CategoryTotal {
            category: category.to_owned(),
            total,
        })
        .collect()
}

/// Groups the `debits` created within `window` by calendar month.
///
/// # Returns
/// One total per month with at least one debit in the window, oldest first.
pub(super) fn monthly_totals(
    debits: &[Debit],
    window: RangeInclusive<OffsetDateTime>,
) -> Vec<MonthlyTotal> {
    let mut totals: BTreeMap<Date, f64> = BTreeMap::new();

    for debit in debits
        .iter()
        .filter(|debit| window.contains(&debit.created_at))
    {
        *totals.entry(first_of_month(debit.created_at.date())).or_insert(0.0) += debit.amount;
    }

    totals
        .into_iter()
        .map(|(month, total)| MonthlyTotal { month, total })
        .collect()
}

/// Steps back [TREND_MONTHS] calendar months from `now`, keeping the time of day.
///
/// The day is clamped to the length of the target month, e.g. 31 August
/// becomes 28 February.
pub(super) fn trend_window_start(now: OffsetDateTime) -> OffsetDateTime {
    let month = now.month().nth_prev(TREND_MONTHS);
    let year = if u8::from(now.month()) <= TREND_MONTHS {
        now.year() - 1
    } else {
        now.year()
    };

    let date = (1..=now.day())
        .rev()
        .find_map(|day| Date::from_calendar_date(year, month, day).ok())
        .unwrap_or(Date::MIN);

    now.replace_date(date)
}

fn first_of_month(date: Date) -> Date {
    date - Duration::days(i64::from(date.day()) - 1)
}
