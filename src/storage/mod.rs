//! Storage layer: abstraction traits plus the CSV-backed implementation.

pub mod csv;
pub mod traits;

pub use traits::{
    BudgetHistoryStorage, BudgetStorage, CategoryStorage, Connection, ExpenseStorage,
};
