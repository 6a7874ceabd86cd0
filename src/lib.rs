//! # SpendTrack
//!
//! Expense tracking and budget lifecycle core backed by a CSV document
//! store. The domain layer (budgets, expenses, categories, notifications,
//! analytics, export) is storage-agnostic and talks to repositories through
//! the traits in [`storage`]; the CSV implementation keeps each user's data
//! in per-user files under a shared base directory.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

pub mod domain;
pub mod storage;

pub use storage::csv::CsvConnection;

/// Main backend struct that orchestrates all services
pub struct Backend {
    pub category_service: domain::CategoryService<CsvConnection>,
    pub expense_service: domain::ExpenseService<CsvConnection>,
    pub budget_service: domain::BudgetService<CsvConnection>,
    pub analytics_service: domain::AnalyticsService<CsvConnection>,
    pub export_service: domain::ExportService,
}

impl Backend {
    /// Open a backend over the given data directory, seeding the default
    /// categories when missing.
    pub fn open<P: AsRef<Path>>(data_directory: P) -> Result<Self> {
        Self::from_connection(CsvConnection::new(data_directory)?)
    }

    /// Open a backend over the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::from_connection(CsvConnection::new_default()?)
    }

    fn from_connection(connection: CsvConnection) -> Result<Self> {
        let connection = Arc::new(connection);

        let category_service = domain::CategoryService::new(connection.clone());
        category_service.ensure_defaults()?;

        Ok(Backend {
            category_service,
            expense_service: domain::ExpenseService::new(connection.clone()),
            budget_service: domain::BudgetService::new(connection.clone()),
            analytics_service: domain::AnalyticsService::new(connection),
            export_service: domain::ExportService::new(),
        })
    }
}
