//! # CSV Storage Module
//!
//! File-based storage implementation backing the domain layer. Each user's
//! documents live in per-user CSV files under a shared base directory, and
//! every repository implements the same storage traits a remote document
//! store would, so the domain logic stays storage-agnostic.
//!
//! ## File Format
//!
//! List-valued columns (`child_expense_ids`, `previous_period_ids`) are
//! stored as JSON arrays inside a single CSV cell; dates are RFC 3339.

pub mod budget_repository;
pub mod category_repository;
pub mod connection;
pub mod expense_repository;
pub mod history_repository;

#[cfg(test)]
pub mod test_utils;

pub use budget_repository::BudgetRepository;
pub use category_repository::CategoryRepository;
pub use connection::CsvConnection;
pub use expense_repository::ExpenseRepository;
pub use history_repository::BudgetHistoryRepository;
