//! Domain layer: models, commands and the services that hold the business
//! rules. Services are generic over a storage [`Connection`] and never touch
//! files directly.
//!
//! [`Connection`]: crate::storage::Connection

pub mod analytics_service;
pub mod budget_service;
pub mod category_service;
pub mod commands;
pub mod errors;
pub mod expense_service;
pub mod export_service;
pub mod models;
pub mod notification_service;
pub mod period;

pub use analytics_service::AnalyticsService;
pub use budget_service::{BudgetService, BudgetWriteOutcome};
pub use category_service::CategoryService;
pub use errors::DomainError;
pub use expense_service::ExpenseService;
pub use export_service::ExportService;
pub use period::DateRange;
