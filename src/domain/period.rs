//! Budget period date arithmetic.
//!
//! Pure functions, no I/O: computing the date range a new budget covers,
//! advancing a range to its successor period, and testing expiry. All
//! ranges are inclusive on both ends; a day ends at 23:59:59.999 so two
//! adjacent periods never share an instant.

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::budget::BudgetPeriod;

/// An inclusive range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Inclusive interval intersection: ranges sharing exactly one endpoint
    /// day count as overlapping.
    pub fn intersects(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc()
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

fn month_range(year: i32, month: u32) -> DateRange {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    DateRange::new(day_start(first), day_end(last_day_of_month(year, month)))
}

fn year_range(year: i32) -> DateRange {
    DateRange::new(
        day_start(NaiveDate::from_ymd_opt(year, 1, 1).unwrap()),
        day_end(NaiveDate::from_ymd_opt(year, 12, 31).unwrap()),
    )
}

/// Compute the date range a budget of the given period covers, relative to
/// `today`. Weekly runs from the most recent Sunday through the following
/// Saturday; monthly and yearly cover the calendar month/year containing
/// `today`; custom passes the supplied bounds through.
pub fn period_date_range(
    period: BudgetPeriod,
    today: DateTime<Utc>,
    custom: Option<DateRange>,
) -> Result<DateRange> {
    let today = today.date_naive();
    match period {
        BudgetPeriod::Weekly => {
            let back = today.weekday().num_days_from_sunday() as u64;
            let sunday = today - Days::new(back);
            Ok(DateRange::new(day_start(sunday), day_end(sunday + Days::new(6))))
        }
        BudgetPeriod::Monthly => Ok(month_range(today.year(), today.month())),
        BudgetPeriod::Yearly => Ok(year_range(today.year())),
        BudgetPeriod::Custom => {
            let range = match custom {
                Some(range) => range,
                None => bail!("custom budgets require explicit start and end dates"),
            };
            if range.start > range.end {
                bail!("custom budget start date must not be after its end date");
            }
            Ok(range)
        }
    }
}

/// Advance a budget's range to the immediately following period. The
/// successor starts the day after the current range ends, with no gap and
/// no overlap. Custom ranges have no deterministic successor and always
/// fail.
pub fn next_period_date_range(period: BudgetPeriod, current: DateRange) -> Result<DateRange> {
    match period {
        BudgetPeriod::Weekly => {
            let next_start = current.end.date_naive() + Days::new(1);
            Ok(DateRange::new(
                day_start(next_start),
                day_end(next_start + Days::new(6)),
            ))
        }
        BudgetPeriod::Monthly => {
            let start = current.start.date_naive();
            let (year, month) = if start.month() == 12 {
                (start.year() + 1, 1)
            } else {
                (start.year(), start.month() + 1)
            };
            Ok(month_range(year, month))
        }
        BudgetPeriod::Yearly => Ok(year_range(current.start.date_naive().year() + 1)),
        BudgetPeriod::Custom => {
            bail!("cannot automatically calculate the next period for a custom budget")
        }
    }
}

/// Whether a budget period has ended as of `now`.
pub fn period_ended(range: DateRange, now: DateTime<Utc>) -> bool {
    now > range.end
}

/// Shift a date by whole months, clamping the day to the target month's
/// length. Used by the analytics presets (e.g. "last 3 months").
pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let total = date.year() * 12 + date.month() as i32 - 1 + months;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    let last = last_day_of_month(year, month).day();
    NaiveDate::from_ymd_opt(year, month, date.day().min(last)).unwrap()
}
