//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::domain::models::budget::Budget;
use crate::domain::models::budget_history::BudgetHistory;
use crate::domain::models::category::Category;
use crate::domain::models::expense::Expense;

/// Trait defining the interface for expense storage operations
///
/// This trait abstracts away the specific storage implementation details,
/// allowing the domain layer to work with different storage backends
/// (document stores, CSV files, etc.) without modification.
pub trait ExpenseStorage: Send + Sync {
    /// Store a new expense
    fn store_expense(&self, expense: &Expense) -> Result<()>;

    /// Retrieve a specific expense by ID
    fn get_expense(&self, user_id: &str, expense_id: &str) -> Result<Option<Expense>>;

    /// List expenses ordered by date descending (most recent first)
    fn list_expenses(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<Expense>>;

    /// List expenses whose date falls inside the inclusive range, optionally
    /// restricted to a single category. Ordered by date descending.
    fn list_expenses_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category_id: Option<&str>,
    ) -> Result<Vec<Expense>>;

    /// Update an existing expense
    fn update_expense(&self, expense: &Expense) -> Result<()>;

    /// Delete a single expense
    /// Returns true if the expense was found and deleted, false otherwise
    fn delete_expense(&self, user_id: &str, expense_id: &str) -> Result<bool>;
}

/// Trait defining the interface for category storage operations
pub trait CategoryStorage: Send + Sync {
    /// Store a new user-defined category
    fn store_category(&self, category: &Category) -> Result<()>;

    /// Retrieve a category by ID, searching the user's categories first and
    /// falling back to the shared defaults
    fn get_category(&self, user_id: &str, category_id: &str) -> Result<Option<Category>>;

    /// List the shared default categories
    fn list_default_categories(&self) -> Result<Vec<Category>>;

    /// List categories created by a specific user
    fn list_user_categories(&self, user_id: &str) -> Result<Vec<Category>>;

    /// Seed the shared default categories, skipping any that already exist.
    /// Returns the number of categories actually written.
    fn seed_default_categories(&self, defaults: &[Category]) -> Result<usize>;

    /// Update an existing user-defined category
    fn update_category(&self, category: &Category) -> Result<()>;

    /// Delete a user-defined category
    /// Returns true if the category was found and deleted, false otherwise
    fn delete_category(&self, user_id: &str, category_id: &str) -> Result<bool>;
}

/// Trait defining the interface for budget storage operations
pub trait BudgetStorage: Send + Sync {
    /// Store a new budget
    fn store_budget(&self, budget: &Budget) -> Result<()>;

    /// Retrieve a specific budget by ID
    fn get_budget(&self, user_id: &str, budget_id: &str) -> Result<Option<Budget>>;

    /// List all budgets for a user regardless of lifecycle state
    fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>>;

    /// List budgets currently in the Active lifecycle state
    fn list_active_budgets(&self, user_id: &str) -> Result<Vec<Budget>>;

    /// List budgets for the category whose date range contains the given
    /// instant, regardless of lifecycle state
    fn budgets_containing(
        &self,
        user_id: &str,
        category_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Vec<Budget>>;

    /// Update an existing budget. The stored revision must match the
    /// revision on the passed budget; on success the revision is bumped and
    /// the stored record is returned.
    fn update_budget(&self, budget: &Budget) -> Result<Budget>;

    /// Apply spent-amount deltas to multiple budgets in a single pass.
    /// Spent amounts are floored at zero. Returns the number of budgets
    /// actually changed.
    fn apply_spent_adjustments(&self, user_id: &str, deltas: &[(String, f64)]) -> Result<u32>;

    /// Delete a budget
    /// Returns true if the budget was found and deleted, false otherwise
    fn delete_budget(&self, user_id: &str, budget_id: &str) -> Result<bool>;
}

/// Trait defining the interface for budget history snapshot storage
pub trait BudgetHistoryStorage: Send + Sync {
    /// Store a completed-period snapshot (append-only)
    fn store_history(&self, history: &BudgetHistory) -> Result<()>;

    /// List all snapshots for a user ordered by completion date descending
    fn list_history(&self, user_id: &str) -> Result<Vec<BudgetHistory>>;

    /// List snapshots whose budget ID is in the given set, ordered by
    /// completion date descending
    fn history_for_budgets(&self, user_id: &str, budget_ids: &[String]) -> Result<Vec<BudgetHistory>>;
}

/// Trait defining the interface for storage connections
///
/// This trait abstracts away the specific connection type and provides
/// factory methods for creating repositories. This allows the domain layer
/// to work with any storage backend without knowing the implementation
/// details.
pub trait Connection: Send + Sync + Clone {
    /// The type of ExpenseStorage this connection creates
    type ExpenseRepository: ExpenseStorage + Clone;

    /// The type of CategoryStorage this connection creates
    type CategoryRepository: CategoryStorage + Clone;

    /// The type of BudgetStorage this connection creates
    type BudgetRepository: BudgetStorage + Clone;

    /// The type of BudgetHistoryStorage this connection creates
    type BudgetHistoryRepository: BudgetHistoryStorage + Clone;

    /// Create a new expense repository for this connection
    fn create_expense_repository(&self) -> Self::ExpenseRepository;

    /// Create a new category repository for this connection
    fn create_category_repository(&self) -> Self::CategoryRepository;

    /// Create a new budget repository for this connection
    fn create_budget_repository(&self) -> Self::BudgetRepository;

    /// Create a new budget history repository for this connection
    fn create_budget_history_repository(&self) -> Self::BudgetHistoryRepository;
}
