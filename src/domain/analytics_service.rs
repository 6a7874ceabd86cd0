//! Spending aggregation and trend analytics.
//!
//! Read-only queries over the expense set. Everything beyond fetching is a
//! pure function, so the grouping and bucketing logic is testable without
//! storage.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::models::expense::Expense;
use crate::domain::period::{shift_months, DateRange};
use crate::storage::{Connection, ExpenseStorage};

/// Granularity of a trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendAggregation {
    Daily,
    Weekly,
    Monthly,
}

/// One bucket of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket: String,
    pub total_amount: f64,
}

/// Spending in one category over a queried range.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category_id: String,
    pub total_amount: f64,
    /// Share of the range's overall spending, 0-100.
    pub percentage: f64,
}

/// Current-versus-previous period totals.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodComparison {
    pub current_total: f64,
    pub previous_total: f64,
    pub change_amount: f64,
    /// Percent change from previous to current; 0 when there is no previous
    /// spending to compare against.
    pub change_percentage: f64,
}

/// A named date range offered to callers as a canned filter.
#[derive(Debug, Clone)]
pub struct DateRangePreset {
    pub label: &'static str,
    pub range: DateRange,
}

/// Service responsible for read-only spending aggregation
#[derive(Clone)]
pub struct AnalyticsService<C: Connection> {
    expense_repository: C::ExpenseRepository,
}

impl<C: Connection> AnalyticsService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            expense_repository: connection.create_expense_repository(),
        }
    }

    /// Expenses inside the range, most recent first.
    pub fn expenses_for_date_range(&self, user_id: &str, range: DateRange) -> Result<Vec<Expense>> {
        self.expense_repository
            .list_expenses_in_range(user_id, range.start, range.end, None)
    }

    pub fn total_expenses(&self, user_id: &str, range: DateRange) -> Result<f64> {
        Ok(sum_amounts(&self.expenses_for_date_range(user_id, range)?))
    }

    /// Per-category totals with their share of the overall spending,
    /// largest first.
    pub fn expenses_by_category(&self, user_id: &str, range: DateRange) -> Result<Vec<CategoryTotal>> {
        let expenses = self.expenses_for_date_range(user_id, range)?;
        Ok(category_totals(&expenses))
    }

    /// The heaviest-spending categories in the range. `limit` defaults to 5.
    pub fn top_spending_categories(
        &self,
        user_id: &str,
        range: DateRange,
        limit: Option<usize>,
    ) -> Result<Vec<CategoryTotal>> {
        let mut totals = self.expenses_by_category(user_id, range)?;
        totals.truncate(limit.unwrap_or(5));
        Ok(totals)
    }

    pub fn compare_periods(
        &self,
        user_id: &str,
        current: DateRange,
        previous: DateRange,
    ) -> Result<PeriodComparison> {
        let current_total = self.total_expenses(user_id, current)?;
        let previous_total = self.total_expenses(user_id, previous)?;
        let change_amount = current_total - previous_total;
        let change_percentage = if previous_total > 0.0 {
            (change_amount / previous_total) * 100.0
        } else {
            0.0
        };
        Ok(PeriodComparison {
            current_total,
            previous_total,
            change_amount,
            change_percentage,
        })
    }

    /// Spending over time, bucketed at the requested granularity. Buckets
    /// with no spending are simply absent; output is in chronological order.
    pub fn expense_trends(
        &self,
        user_id: &str,
        range: DateRange,
        aggregation: TrendAggregation,
    ) -> Result<Vec<TrendPoint>> {
        let expenses = self.expenses_for_date_range(user_id, range)?;
        let mut buckets: BTreeMap<String, f64> = BTreeMap::new();
        for expense in &expenses {
            *buckets.entry(trend_bucket(expense.date, aggregation)).or_insert(0.0) +=
                expense.amount;
        }
        Ok(buckets
            .into_iter()
            .map(|(bucket, total_amount)| TrendPoint { bucket, total_amount })
            .collect())
    }

    /// The canned filter ranges offered alongside free-form dates.
    pub fn date_range_presets(today: DateTime<Utc>) -> Vec<DateRangePreset> {
        let day = today.date_naive();
        let range_back_days = |days: u64| {
            DateRange::new(
                (day - chrono::Days::new(days - 1)).and_hms_opt(0, 0, 0).unwrap().and_utc(),
                day.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc(),
            )
        };
        let range_back_months = |months: i32| {
            DateRange::new(
                shift_months(day, -months).and_hms_opt(0, 0, 0).unwrap().and_utc(),
                day.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc(),
            )
        };
        let this_month_start = day.with_day(1).unwrap();
        let this_year_start = day.with_ordinal(1).unwrap();

        vec![
            DateRangePreset { label: "Last 7 days", range: range_back_days(7) },
            DateRangePreset { label: "Last 30 days", range: range_back_days(30) },
            DateRangePreset { label: "Last 3 months", range: range_back_months(3) },
            DateRangePreset { label: "Last 6 months", range: range_back_months(6) },
            DateRangePreset { label: "Last year", range: range_back_months(12) },
            DateRangePreset {
                label: "This month",
                range: DateRange::new(
                    this_month_start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
                    day.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc(),
                ),
            },
            DateRangePreset {
                label: "This year",
                range: DateRange::new(
                    this_year_start.and_hms_opt(0, 0, 0).unwrap().and_utc(),
                    day.and_hms_milli_opt(23, 59, 59, 999).unwrap().and_utc(),
                ),
            },
        ]
    }
}

pub fn sum_amounts(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

/// Group expenses by category, largest total first, with each category's
/// share of the grand total.
pub fn category_totals(expenses: &[Expense]) -> Vec<CategoryTotal> {
    let grand_total = sum_amounts(expenses);
    let mut by_category: HashMap<&str, f64> = HashMap::new();
    for expense in expenses {
        *by_category.entry(expense.category_id.as_str()).or_insert(0.0) += expense.amount;
    }

    let mut totals: Vec<CategoryTotal> = by_category
        .into_iter()
        .map(|(category_id, total_amount)| CategoryTotal {
            category_id: category_id.to_string(),
            total_amount,
            percentage: if grand_total > 0.0 {
                (total_amount / grand_total) * 100.0
            } else {
                0.0
            },
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total_amount
            .partial_cmp(&a.total_amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    totals
}

/// The bucket key an expense date falls into. Weekly buckets use
/// Sunday-started week numbering to line up with weekly budget periods.
pub fn trend_bucket(date: DateTime<Utc>, aggregation: TrendAggregation) -> String {
    match aggregation {
        TrendAggregation::Daily => date.format("%Y-%m-%d").to_string(),
        TrendAggregation::Weekly => date.format("%Y-W%U").to_string(),
        TrendAggregation::Monthly => date.format("%Y-%m").to_string(),
    }
}
