//! Immutable snapshot of a completed budget period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::budget::{Budget, BudgetPeriod};

/// Written exactly once when a budget period is archived. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetHistory {
    pub id: String,
    pub budget_id: String,
    pub user_id: String,
    pub category_id: String,
    pub limit_amount: f64,
    pub spent_amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BudgetHistory {
    /// Snapshot a budget at archival time.
    pub fn snapshot(budget: &Budget, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            budget_id: budget.id.clone(),
            user_id: budget.user_id.clone(),
            category_id: budget.category_id.clone(),
            limit_amount: budget.limit_amount,
            spent_amount: budget.spent_amount,
            period: budget.period,
            start_date: budget.start_date,
            end_date: budget.end_date,
            created_at: budget.created_at,
            completed_at,
        }
    }
}
