//! Domain model for a budget period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::period::DateRange;

/// The recurrence scheme of a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetPeriod::Weekly => "weekly",
            BudgetPeriod::Monthly => "monthly",
            BudgetPeriod::Yearly => "yearly",
            BudgetPeriod::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "weekly" => Some(BudgetPeriod::Weekly),
            "monthly" => Some(BudgetPeriod::Monthly),
            "yearly" => Some(BudgetPeriod::Yearly),
            "custom" => Some(BudgetPeriod::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a budget period.
///
/// `Archiving` is a durable marker set before the multi-file archival
/// sequence runs, so a crash between the history snapshot, the successor
/// write, and the final flip can be resumed instead of leaving the store
/// silently inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetLifecycle {
    Active,
    Archiving,
    Archived,
}

impl BudgetLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetLifecycle::Active => "active",
            BudgetLifecycle::Archiving => "archiving",
            BudgetLifecycle::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(BudgetLifecycle::Active),
            "archiving" => Some(BudgetLifecycle::Archiving),
            "archived" => Some(BudgetLifecycle::Archived),
            _ => None,
        }
    }
}

/// A spending limit for one category over one date range.
///
/// `spent_amount` is a running total maintained incrementally on every
/// expense write; `BudgetService::recalculate_spent_amount` recomputes it
/// from the expense set to repair drift. `revision` is an
/// optimistic-concurrency token bumped by the repository on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub user_id: String,
    pub category_id: String,
    pub limit_amount: f64,
    pub spent_amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub lifecycle: BudgetLifecycle,
    /// Ids of earlier periods in this budget's lineage, oldest first.
    pub previous_period_ids: Vec<String>,
    /// Id of the successor period, set when this budget is archived.
    pub next_period_id: Option<String>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        user_id: &str,
        category_id: &str,
        limit_amount: f64,
        period: BudgetPeriod,
        range: DateRange,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            category_id: category_id.to_string(),
            limit_amount,
            spent_amount: 0.0,
            period,
            start_date: range.start,
            end_date: range.end,
            lifecycle: BudgetLifecycle::Active,
            previous_period_ids: Vec::new(),
            next_period_id: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == BudgetLifecycle::Active
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Whether the given instant falls inside this budget's period, inclusive
    /// on both ends.
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.date_range().contains(date)
    }
}
