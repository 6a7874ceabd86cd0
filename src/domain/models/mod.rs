//! Domain models for the expense tracker.

pub mod budget;
pub mod budget_history;
pub mod category;
pub mod expense;

pub use budget::{Budget, BudgetLifecycle, BudgetPeriod};
pub use budget_history::BudgetHistory;
pub use category::Category;
pub use expense::{Expense, Frequency};
