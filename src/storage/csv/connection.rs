use anyhow::Result;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::storage::traits::Connection;

const EXPENSES_HEADER: &str = "id,user_id,amount,category_id,date,description,created_at,updated_at,is_recurring,frequency,parent_expense_id,child_expense_ids\n";
const CATEGORIES_HEADER: &str = "id,name,icon,color,is_default,user_id\n";
const BUDGETS_HEADER: &str = "id,user_id,category_id,limit_amount,spent_amount,period,start_date,end_date,lifecycle,previous_period_ids,next_period_id,revision,created_at,updated_at\n";
const BUDGET_HISTORY_HEADER: &str = "id,budget_id,user_id,category_id,limit_amount,spent_amount,period,start_date,end_date,created_at,completed_at\n";

/// CsvConnection manages file paths and ensures CSV files exist for each user.
///
/// Layout: each user gets a directory named after their sanitized user ID
/// containing `expenses.csv`, `categories.csv`, `budgets.csv` and
/// `budget_history.csv`. The shared default categories live in a single
/// `categories.csv` at the base directory root.
#[derive(Clone)]
pub struct CsvConnection {
    base_directory: Arc<Mutex<PathBuf>>,
}

impl CsvConnection {
    /// Create a new CSV connection with a base directory
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_directory: Arc::new(Mutex::new(base_path)),
        })
    }

    /// Create a new CSV connection in the default data directory,
    /// `~/Documents/SpendTrack` (falling back to the home directory when no
    /// Documents directory exists).
    pub fn new_default() -> Result<Self> {
        let documents_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

        let data_dir = documents_dir.join("SpendTrack");
        info!("Using default data directory: {}", data_dir.display());
        Self::new(data_dir)
    }

    /// Get the base directory path
    pub fn base_directory(&self) -> PathBuf {
        let base_dir = self.base_directory.lock().unwrap();
        base_dir.clone()
    }

    /// Turn a user ID into a directory name that is safe on every filesystem
    pub fn sanitize_user_id(user_id: &str) -> String {
        let sanitized: String = user_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        if sanitized.is_empty() {
            "unknown-user".to_string()
        } else {
            sanitized
        }
    }

    /// Get the directory path for a user's data
    pub fn get_user_directory(&self, user_id: &str) -> PathBuf {
        let base_dir = self.base_directory.lock().unwrap();
        base_dir.join(Self::sanitize_user_id(user_id))
    }

    pub fn get_expenses_file_path(&self, user_id: &str) -> PathBuf {
        self.get_user_directory(user_id).join("expenses.csv")
    }

    pub fn get_user_categories_file_path(&self, user_id: &str) -> PathBuf {
        self.get_user_directory(user_id).join("categories.csv")
    }

    /// Shared default categories, stored once at the base directory root
    pub fn get_default_categories_file_path(&self) -> PathBuf {
        let base_dir = self.base_directory.lock().unwrap();
        base_dir.join("categories.csv")
    }

    pub fn get_budgets_file_path(&self, user_id: &str) -> PathBuf {
        self.get_user_directory(user_id).join("budgets.csv")
    }

    pub fn get_budget_history_file_path(&self, user_id: &str) -> PathBuf {
        self.get_user_directory(user_id).join("budget_history.csv")
    }

    fn ensure_file(&self, path: &Path, header: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            fs::write(path, header)?;
        }
        Ok(())
    }

    /// Ensure a user's expenses file exists with its header
    pub fn ensure_expenses_file_exists(&self, user_id: &str) -> Result<()> {
        self.ensure_file(&self.get_expenses_file_path(user_id), EXPENSES_HEADER)
    }

    /// Ensure a user's categories file exists with its header
    pub fn ensure_user_categories_file_exists(&self, user_id: &str) -> Result<()> {
        self.ensure_file(&self.get_user_categories_file_path(user_id), CATEGORIES_HEADER)
    }

    /// Ensure the shared default categories file exists with its header
    pub fn ensure_default_categories_file_exists(&self) -> Result<()> {
        self.ensure_file(&self.get_default_categories_file_path(), CATEGORIES_HEADER)
    }

    /// Ensure a user's budgets file exists with its header
    pub fn ensure_budgets_file_exists(&self, user_id: &str) -> Result<()> {
        self.ensure_file(&self.get_budgets_file_path(user_id), BUDGETS_HEADER)
    }

    /// Ensure a user's budget history file exists with its header
    pub fn ensure_budget_history_file_exists(&self, user_id: &str) -> Result<()> {
        self.ensure_file(&self.get_budget_history_file_path(user_id), BUDGET_HISTORY_HEADER)
    }
}

impl Connection for CsvConnection {
    type ExpenseRepository = super::expense_repository::ExpenseRepository;
    type CategoryRepository = super::category_repository::CategoryRepository;
    type BudgetRepository = super::budget_repository::BudgetRepository;
    type BudgetHistoryRepository = super::history_repository::BudgetHistoryRepository;

    fn create_expense_repository(&self) -> Self::ExpenseRepository {
        super::expense_repository::ExpenseRepository::new(self.clone())
    }

    fn create_category_repository(&self) -> Self::CategoryRepository {
        super::category_repository::CategoryRepository::new(self.clone())
    }

    fn create_budget_repository(&self) -> Self::BudgetRepository {
        super::budget_repository::BudgetRepository::new(self.clone())
    }

    fn create_budget_history_repository(&self) -> Self::BudgetHistoryRepository {
        super::history_repository::BudgetHistoryRepository::new(self.clone())
    }
}
