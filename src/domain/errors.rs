//! Domain error types.
//!
//! Services return `anyhow::Result`; failures a caller is expected to branch
//! on are raised as `DomainError` so they can be recovered with
//! `err.downcast_ref::<DomainError>()`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{0}")]
    PermissionDenied(String),

    /// A concurrent writer updated the budget between read and write.
    #[error("budget {id} was modified concurrently (expected revision {expected}, found {found})")]
    RevisionConflict { id: String, expected: u64, found: u64 },

    /// A category still referenced by expenses or budgets cannot be deleted.
    #[error("category {id} is still in use by {expenses} expense(s) and {budgets} budget(s)")]
    CategoryInUse { id: String, expenses: usize, budgets: usize },
}
