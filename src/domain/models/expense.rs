//! Domain model for an expense.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a recurring expense repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            "yearly" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// A single expense owned by a user. `date` is when the money was spent,
/// which is the date budgets reconcile against; `created_at`/`updated_at`
/// track the document itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub category_id: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_recurring: bool,
    pub frequency: Option<Frequency>,
    /// For a spawned recurring instance, the expense it was cloned from.
    pub parent_expense_id: Option<String>,
    /// For a recurring template, the instances spawned from it.
    pub child_expense_ids: Vec<String>,
}

impl Expense {
    pub fn new(
        user_id: &str,
        amount: f64,
        category_id: &str,
        date: DateTime<Utc>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            amount,
            category_id: category_id.to_string(),
            date,
            description,
            created_at: now,
            updated_at: now,
            is_recurring: false,
            frequency: None,
            parent_expense_id: None,
            child_expense_ids: Vec::new(),
        }
    }
}
