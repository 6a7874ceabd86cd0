/// Test utilities module for automatic cleanup and consistent test infrastructure
///
/// This module provides RAII-based cleanup that guarantees test data is removed
/// even if tests panic or fail.

use anyhow::Result;
use tempfile::TempDir;

use super::budget_repository::BudgetRepository;
use super::category_repository::CategoryRepository;
use super::connection::CsvConnection;
use super::expense_repository::ExpenseRepository;
use super::history_repository::BudgetHistoryRepository;

/// Test environment that provides a temporary directory and connection
/// that will be automatically cleaned up when the environment is dropped,
/// even if tests panic or fail.
pub struct TestEnvironment {
    pub connection: CsvConnection,
    /// Base directory path for manual inspection if needed
    pub base_path: std::path::PathBuf,
    _temp_dir: TempDir, // Keep alive to prevent cleanup
}

impl TestEnvironment {
    /// Create a new test environment with a temporary directory
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        Ok(Self {
            connection,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }
}

/// Test helper that provides repository instances for a test environment
pub struct TestHelper {
    pub env: TestEnvironment,
    pub expense_repo: ExpenseRepository,
    pub category_repo: CategoryRepository,
    pub budget_repo: BudgetRepository,
    pub history_repo: BudgetHistoryRepository,
}

impl TestHelper {
    /// Create a new test helper with a fresh environment
    pub fn new() -> Result<Self> {
        let env = TestEnvironment::new()?;
        let expense_repo = ExpenseRepository::new(env.connection.clone());
        let category_repo = CategoryRepository::new(env.connection.clone());
        let budget_repo = BudgetRepository::new(env.connection.clone());
        let history_repo = BudgetHistoryRepository::new(env.connection.clone());

        Ok(Self {
            env,
            expense_repo,
            category_repo,
            budget_repo,
            history_repo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_cleanup() -> Result<()> {
        let base_path;
        {
            let env = TestEnvironment::new()?;
            base_path = env.base_path.clone();
            assert!(base_path.exists());
            // Environment dropped here
        }
        assert!(!base_path.exists());
        Ok(())
    }
}
