//! Budget status classification and notification building.
//!
//! Pure functions over budget state; nothing here reads or writes storage.
//! Callers fetch budgets and categories themselves and hand them in.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::models::budget::Budget;
use crate::domain::models::category::Category;

pub const BUDGET_WARNING_THRESHOLD: f64 = 80.0;
pub const BUDGET_HIGH_WARNING_THRESHOLD: f64 = 90.0;
pub const BUDGET_DANGER_THRESHOLD: f64 = 95.0;
pub const BUDGET_EXCEEDED_THRESHOLD: f64 = 100.0;

/// Severity band of a budget's consumption, from its spent/limit ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BudgetStatus {
    Normal,
    Warning,
    HighWarning,
    Danger,
    Exceeded,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Normal => "normal",
            BudgetStatus::Warning => "warning",
            BudgetStatus::HighWarning => "high-warning",
            BudgetStatus::Danger => "danger",
            BudgetStatus::Exceeded => "exceeded",
        }
    }
}

/// Classification of a single budget.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: BudgetStatus,
    pub message: String,
    pub percentage: f64,
}

/// A user-facing alert for a budget that crossed a threshold.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetNotification {
    pub id: String,
    pub category_id: String,
    pub category_name: String,
    pub status: BudgetStatus,
    pub message: String,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

/// Percentage of the limit consumed. A non-positive limit classifies as 0%
/// rather than dividing by zero.
pub fn budget_percentage(budget: &Budget) -> f64 {
    if budget.limit_amount > 0.0 {
        (budget.spent_amount / budget.limit_amount) * 100.0
    } else {
        0.0
    }
}

/// Classify a budget against the warning thresholds. Thresholds are
/// evaluated highest first, so a budget sits in exactly one band.
pub fn check_budget_status(budget: &Budget, category_name: &str) -> StatusReport {
    let percentage = budget_percentage(budget);

    let (status, message) = if percentage >= BUDGET_EXCEEDED_THRESHOLD {
        (
            BudgetStatus::Exceeded,
            format!(
                "Your {} budget has been exceeded! You've spent {:.1}% of your budget.",
                category_name, percentage
            ),
        )
    } else if percentage >= BUDGET_DANGER_THRESHOLD {
        (
            BudgetStatus::Danger,
            format!(
                "Your {} budget is almost depleted! You've used {:.1}% of your budget.",
                category_name, percentage
            ),
        )
    } else if percentage >= BUDGET_HIGH_WARNING_THRESHOLD {
        (
            BudgetStatus::HighWarning,
            format!(
                "Your {} budget is running low. You've used {:.1}% of your budget.",
                category_name, percentage
            ),
        )
    } else if percentage >= BUDGET_WARNING_THRESHOLD {
        (
            BudgetStatus::Warning,
            format!(
                "You're approaching your {} budget limit. You've used {:.1}% of your budget.",
                category_name, percentage
            ),
        )
    } else {
        (
            BudgetStatus::Normal,
            format!(
                "Your {} budget is on track. You've used {:.1}% of your budget.",
                category_name, percentage
            ),
        )
    };

    StatusReport { status, message, percentage }
}

/// Build notifications for every budget that has crossed a threshold.
/// Budgets in the `Normal` band produce nothing.
pub fn budget_notifications(budgets: &[Budget], categories: &[Category]) -> Vec<BudgetNotification> {
    let now = Utc::now();
    budgets
        .iter()
        .filter_map(|budget| {
            let category_name = categories
                .iter()
                .find(|c| c.id == budget.category_id)
                .map(|c| c.name.as_str())
                .unwrap_or("Uncategorized");
            let report = check_budget_status(budget, category_name);
            if report.status == BudgetStatus::Normal {
                return None;
            }
            Some(BudgetNotification {
                id: Uuid::new_v4().to_string(),
                category_id: budget.category_id.clone(),
                category_name: category_name.to_string(),
                status: report.status,
                message: report.message,
                percentage: report.percentage,
                timestamp: now,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::budget::BudgetPeriod;
    use crate::domain::period::DateRange;
    use chrono::TimeZone;

    fn budget_with(spent: f64, limit: f64) -> Budget {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap(),
        );
        let mut budget = Budget::new("alice", "food", limit, BudgetPeriod::Monthly, range);
        budget.spent_amount = spent;
        budget
    }

    #[test]
    fn thresholds_classify_into_the_expected_bands() {
        let cases = [
            (500.0, 1000.0, BudgetStatus::Normal, 50.0),
            (799.9, 1000.0, BudgetStatus::Normal, 79.99),
            (800.0, 1000.0, BudgetStatus::Warning, 80.0),
            (900.0, 1000.0, BudgetStatus::HighWarning, 90.0),
            (950.0, 1000.0, BudgetStatus::Danger, 95.0),
            (1000.0, 1000.0, BudgetStatus::Exceeded, 100.0),
            (1500.0, 1000.0, BudgetStatus::Exceeded, 150.0),
        ];
        for (spent, limit, expected_status, expected_pct) in cases {
            let report = check_budget_status(&budget_with(spent, limit), "Food");
            assert_eq!(report.status, expected_status, "spent {} of {}", spent, limit);
            assert!((report.percentage - expected_pct).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_limit_classifies_as_normal_zero_percent() {
        let report = check_budget_status(&budget_with(100.0, 0.0), "Food");
        assert_eq!(report.status, BudgetStatus::Normal);
        assert_eq!(report.percentage, 0.0);
    }

    #[test]
    fn messages_name_the_category_and_percentage() {
        let report = check_budget_status(&budget_with(850.0, 1000.0), "Food & Dining");
        assert_eq!(
            report.message,
            "You're approaching your Food & Dining budget limit. \
             You've used 85.0% of your budget."
        );
    }

    #[test]
    fn each_band_carries_its_own_message() {
        let cases = [
            (500.0, "Your Food budget is on track."),
            (800.0, "You're approaching your Food budget limit."),
            (900.0, "Your Food budget is running low."),
            (950.0, "Your Food budget is almost depleted!"),
            (1200.0, "Your Food budget has been exceeded!"),
        ];
        for (spent, prefix) in cases {
            let report = check_budget_status(&budget_with(spent, 1000.0), "Food");
            assert!(
                report.message.starts_with(prefix),
                "spent {}: {}",
                spent,
                report.message
            );
        }
    }

    #[test]
    fn notifications_skip_normal_budgets_and_resolve_names() {
        let healthy = budget_with(100.0, 1000.0);
        let mut exceeded = budget_with(1200.0, 1000.0);
        exceeded.category_id = "cat-travel".to_string();

        let categories = vec![Category::default_entry("cat-travel", "Travel", "car", "#4ECDC4")];
        let notifications = budget_notifications(&[healthy, exceeded], &categories);

        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].status, BudgetStatus::Exceeded);
        assert_eq!(notifications[0].category_name, "Travel");
    }

    #[test]
    fn unknown_categories_fall_back_to_uncategorized() {
        let over = budget_with(900.0, 1000.0);
        let notifications = budget_notifications(&[over], &[]);
        assert_eq!(notifications[0].category_name, "Uncategorized");
    }
}
