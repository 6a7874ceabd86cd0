//! Domain-level command and query types
//! These structs are used by services inside the domain layer and are the
//! types a caller (CLI, API layer) maps its inputs onto.

pub mod expenses {
    use chrono::{DateTime, Utc};

    use crate::domain::models::expense::Frequency;

    /// Input for creating a new expense.
    #[derive(Debug, Clone)]
    pub struct CreateExpenseCommand {
        pub user_id: String,
        pub amount: f64,
        pub category_id: String,
        /// Defaults to now when not provided.
        pub date: Option<DateTime<Utc>>,
        pub description: Option<String>,
        pub is_recurring: bool,
        pub frequency: Option<Frequency>,
    }

    /// Input for updating an expense. `None` fields are left unchanged.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateExpenseCommand {
        pub amount: Option<f64>,
        pub category_id: Option<String>,
        pub date: Option<DateTime<Utc>>,
        pub description: Option<Option<String>>,
    }

    /// Query parameters for listing expenses.
    #[derive(Debug, Clone, Default)]
    pub struct ExpenseListQuery {
        pub limit: Option<u32>,
        pub start_date: Option<DateTime<Utc>>,
        pub end_date: Option<DateTime<Utc>>,
        pub category_id: Option<String>,
    }
}

pub mod budgets {
    use crate::domain::models::budget::BudgetPeriod;
    use crate::domain::period::DateRange;

    /// Input for creating a new budget.
    #[derive(Debug, Clone)]
    pub struct CreateBudgetCommand {
        pub user_id: String,
        pub category_id: String,
        pub limit_amount: f64,
        pub period: BudgetPeriod,
        /// Required for `BudgetPeriod::Custom`, ignored otherwise.
        pub custom_range: Option<DateRange>,
    }

    /// Input for updating a budget. `None` fields are left unchanged.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateBudgetCommand {
        pub limit_amount: Option<f64>,
        pub category_id: Option<String>,
    }
}

pub mod categories {
    /// Input for creating a user-defined category.
    #[derive(Debug, Clone)]
    pub struct CreateCategoryCommand {
        pub user_id: String,
        pub name: String,
        pub icon: Option<String>,
        pub color: Option<String>,
    }

    /// Input for updating a user-defined category. `None` fields are left
    /// unchanged.
    #[derive(Debug, Clone, Default)]
    pub struct UpdateCategoryCommand {
        pub name: Option<String>,
        pub icon: Option<Option<String>>,
        pub color: Option<Option<String>>,
    }
}
