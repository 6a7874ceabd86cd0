//! Category management service.
//!
//! Categories change rarely but are read on almost every operation, so the
//! service keeps a short-lived per-user cache of the merged default+user
//! listing. Every write goes through this service and invalidates the cache
//! explicitly.

use anyhow::Result;
use log::info;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::commands::categories::{CreateCategoryCommand, UpdateCategoryCommand};
use crate::domain::errors::DomainError;
use crate::domain::models::category::Category;
use crate::storage::{BudgetStorage, CategoryStorage, Connection, ExpenseStorage};

/// How long a cached category listing stays fresh.
const CACHE_TTL: Duration = Duration::from_secs(30);

struct CachedCategories {
    user_id: String,
    fetched_at: Instant,
    categories: Vec<Category>,
}

/// Service responsible for category lookups, custom categories and the
/// shared defaults
#[derive(Clone)]
pub struct CategoryService<C: Connection> {
    category_repository: C::CategoryRepository,
    expense_repository: C::ExpenseRepository,
    budget_repository: C::BudgetRepository,
    cache: Arc<Mutex<Option<CachedCategories>>>,
}

impl<C: Connection> CategoryService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            category_repository: connection.create_category_repository(),
            expense_repository: connection.create_expense_repository(),
            budget_repository: connection.create_budget_repository(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// The built-in categories every user sees.
    pub fn default_categories() -> Vec<Category> {
        vec![
            Category::default_entry("default-food-dining", "Food & Dining", "restaurant", "#FF6B6B"),
            Category::default_entry("default-transportation", "Transportation", "car", "#4ECDC4"),
            Category::default_entry("default-shopping", "Shopping", "cart", "#FFD93D"),
            Category::default_entry("default-entertainment", "Entertainment", "film", "#A78BFA"),
            Category::default_entry("default-bills-utilities", "Bills & Utilities", "receipt", "#F59E0B"),
            Category::default_entry("default-health", "Health", "medkit", "#34D399"),
            Category::default_entry("default-education", "Education", "school", "#60A5FA"),
            Category::default_entry("default-other", "Other", "ellipsis-horizontal", "#9CA3AF"),
        ]
    }

    /// Seed the shared default categories. Safe to call on every startup.
    pub fn ensure_defaults(&self) -> Result<()> {
        let written = self
            .category_repository
            .seed_default_categories(&Self::default_categories())?;
        if written > 0 {
            info!("Seeded {} default categories", written);
        }
        Ok(())
    }

    /// List all categories visible to a user (defaults plus their own),
    /// sorted by name. Served from cache when fresh.
    pub fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.user_id == user_id && cached.fetched_at.elapsed() < CACHE_TTL {
                    return Ok(cached.categories.clone());
                }
            }
        }

        let mut categories = self.category_repository.list_default_categories()?;
        categories.extend(self.category_repository.list_user_categories(user_id)?);
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CachedCategories {
            user_id: user_id.to_string(),
            fetched_at: Instant::now(),
            categories: categories.clone(),
        });
        Ok(categories)
    }

    /// Drop the cached listing. Called after every category write.
    pub fn invalidate_cache(&self) {
        let mut cache = self.cache.lock().unwrap();
        *cache = None;
    }

    pub fn get_category(&self, user_id: &str, category_id: &str) -> Result<Option<Category>> {
        self.category_repository.get_category(user_id, category_id)
    }

    /// Look up a category, failing with `DomainError::NotFound` when absent
    pub fn require_category(&self, user_id: &str, category_id: &str) -> Result<Category> {
        self.get_category(user_id, category_id)?
            .ok_or_else(|| {
                DomainError::NotFound {
                    kind: "Category",
                    id: category_id.to_string(),
                }
                .into()
            })
    }

    pub fn create_category(&self, command: CreateCategoryCommand) -> Result<Category> {
        let name = command.name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation("Category name cannot be empty".to_string()).into());
        }
        let duplicate = self
            .list_categories(&command.user_id)?
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(name));
        if duplicate {
            return Err(
                DomainError::Validation(format!("A category named '{}' already exists", name)).into(),
            );
        }

        let category = Category::new_user(&command.user_id, name, command.icon, command.color);
        self.category_repository.store_category(&category)?;
        self.invalidate_cache();
        info!("Created category '{}' for user {}", category.name, command.user_id);
        Ok(category)
    }

    pub fn update_category(
        &self,
        user_id: &str,
        category_id: &str,
        command: UpdateCategoryCommand,
    ) -> Result<Category> {
        let mut category = self.require_category(user_id, category_id)?;
        if category.is_default {
            return Err(
                DomainError::PermissionDenied("Default categories cannot be modified".to_string())
                    .into(),
            );
        }

        if let Some(name) = command.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(
                    DomainError::Validation("Category name cannot be empty".to_string()).into(),
                );
            }
            category.name = name;
        }
        if let Some(icon) = command.icon {
            category.icon = icon;
        }
        if let Some(color) = command.color {
            category.color = color;
        }

        self.category_repository.update_category(&category)?;
        self.invalidate_cache();
        Ok(category)
    }

    /// Delete a user-defined category. Refused while any expense or budget
    /// still references it, so no document is ever left pointing at a
    /// missing category.
    pub fn delete_category(&self, user_id: &str, category_id: &str) -> Result<()> {
        let category = self.require_category(user_id, category_id)?;
        if category.is_default {
            return Err(
                DomainError::PermissionDenied("Default categories cannot be deleted".to_string())
                    .into(),
            );
        }

        let expenses = self
            .expense_repository
            .list_expenses(user_id, None)?
            .iter()
            .filter(|e| e.category_id == category_id)
            .count();
        let budgets = self
            .budget_repository
            .list_budgets(user_id)?
            .iter()
            .filter(|b| b.category_id == category_id)
            .count();
        if expenses > 0 || budgets > 0 {
            return Err(DomainError::CategoryInUse {
                id: category_id.to_string(),
                expenses,
                budgets,
            }
            .into());
        }

        self.category_repository.delete_category(user_id, category_id)?;
        self.invalidate_cache();
        info!("Deleted category '{}' for user {}", category.name, user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::expense::Expense;
    use crate::storage::csv::test_utils::TestEnvironment;
    use chrono::Utc;

    fn service(env: &TestEnvironment) -> CategoryService<crate::storage::csv::CsvConnection> {
        let service = CategoryService::new(Arc::new(env.connection.clone()));
        service.ensure_defaults().unwrap();
        service
    }

    #[test]
    fn listing_merges_defaults_and_user_categories_sorted() -> Result<()> {
        let env = TestEnvironment::new()?;
        let service = service(&env);

        service.create_category(CreateCategoryCommand {
            user_id: "alice".to_string(),
            name: "Aquarium".to_string(),
            icon: None,
            color: None,
        })?;

        let categories = service.list_categories("alice")?;
        assert_eq!(categories.len(), 9);
        assert_eq!(categories[0].name, "Aquarium");
        assert!(categories.iter().any(|c| c.id == "default-food-dining"));
        Ok(())
    }

    #[test]
    fn cache_is_invalidated_by_writes() -> Result<()> {
        let env = TestEnvironment::new()?;
        let service = service(&env);

        assert_eq!(service.list_categories("alice")?.len(), 8);
        service.create_category(CreateCategoryCommand {
            user_id: "alice".to_string(),
            name: "Pets".to_string(),
            icon: None,
            color: None,
        })?;
        // A stale cache would still report 8 here.
        assert_eq!(service.list_categories("alice")?.len(), 9);
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() -> Result<()> {
        let env = TestEnvironment::new()?;
        let service = service(&env);

        let err = service
            .create_category(CreateCategoryCommand {
                user_id: "alice".to_string(),
                name: "food & dining".to_string(),
                icon: None,
                color: None,
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn default_categories_are_read_only() -> Result<()> {
        let env = TestEnvironment::new()?;
        let service = service(&env);

        let err = service.delete_category("alice", "default-other").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::PermissionDenied(_))
        ));
        Ok(())
    }

    #[test]
    fn referenced_categories_cannot_be_deleted() -> Result<()> {
        let env = TestEnvironment::new()?;
        let service = service(&env);
        let category = service.create_category(CreateCategoryCommand {
            user_id: "alice".to_string(),
            name: "Pets".to_string(),
            icon: None,
            color: None,
        })?;

        let expense_repo = env.connection.create_expense_repository();
        expense_repo.store_expense(&Expense::new("alice", 12.0, &category.id, Utc::now(), None))?;

        let err = service.delete_category("alice", &category.id).unwrap_err();
        match err.downcast_ref::<DomainError>() {
            Some(DomainError::CategoryInUse { expenses, budgets, .. }) => {
                assert_eq!(*expenses, 1);
                assert_eq!(*budgets, 0);
            }
            other => panic!("expected CategoryInUse, got {:?}", other),
        }

        expense_repo.delete_expense("alice", &expense_repo.list_expenses("alice", None)?[0].id)?;
        service.delete_category("alice", &category.id)?;
        Ok(())
    }
}
