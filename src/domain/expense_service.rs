//! Expense management service.
//!
//! Besides basic CRUD this service owns expense-to-budget reconciliation:
//! every expense write adjusts the running `spent_amount` of the budgets
//! whose category and date range the expense falls into. Adjustments are
//! computed as deltas and handed to the repository in a single batched pass,
//! so an edit that moves an expense between categories touches each budget
//! file exactly once.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;

use crate::domain::category_service::CategoryService;
use crate::domain::commands::expenses::{
    CreateExpenseCommand, ExpenseListQuery, UpdateExpenseCommand,
};
use crate::domain::errors::DomainError;
use crate::domain::models::expense::Expense;
use crate::storage::{BudgetStorage, Connection, ExpenseStorage};

/// Deltas below this are float noise, not real adjustments.
const MIN_ADJUSTMENT: f64 = 1e-9;

/// Service responsible for expense CRUD and budget reconciliation
#[derive(Clone)]
pub struct ExpenseService<C: Connection> {
    expense_repository: C::ExpenseRepository,
    budget_repository: C::BudgetRepository,
    category_service: CategoryService<C>,
}

impl<C: Connection> ExpenseService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            expense_repository: connection.create_expense_repository(),
            budget_repository: connection.create_budget_repository(),
            category_service: CategoryService::new(connection),
        }
    }

    pub fn create_expense(&self, command: CreateExpenseCommand) -> Result<Expense> {
        validate_amount(command.amount)?;
        self.category_service
            .require_category(&command.user_id, &command.category_id)?;
        if command.is_recurring && command.frequency.is_none() {
            return Err(DomainError::Validation(
                "Recurring expenses require a frequency".to_string(),
            )
            .into());
        }

        let date = command.date.unwrap_or_else(Utc::now);
        let mut expense = Expense::new(
            &command.user_id,
            command.amount,
            &command.category_id,
            date,
            command.description,
        );
        expense.is_recurring = command.is_recurring;
        expense.frequency = command.frequency;

        self.expense_repository.store_expense(&expense)?;
        self.adjust_matching_budgets(&expense.user_id, &expense.category_id, date, expense.amount)?;

        info!(
            "Created expense {} of {:.2} in category {} for user {}",
            expense.id, expense.amount, expense.category_id, expense.user_id
        );
        Ok(expense)
    }

    pub fn update_expense(
        &self,
        user_id: &str,
        expense_id: &str,
        command: UpdateExpenseCommand,
    ) -> Result<Expense> {
        let original = self.require_expense(user_id, expense_id)?;

        let mut updated = original.clone();
        if let Some(amount) = command.amount {
            validate_amount(amount)?;
            updated.amount = amount;
        }
        if let Some(category_id) = command.category_id {
            self.category_service.require_category(user_id, &category_id)?;
            updated.category_id = category_id;
        }
        if let Some(date) = command.date {
            updated.date = date;
        }
        if let Some(description) = command.description {
            updated.description = description;
        }
        updated.updated_at = Utc::now();

        // Persist the document first; the budget pass below works from the
        // new state.
        self.expense_repository.update_expense(&updated)?;

        let placement_changed =
            updated.category_id != original.category_id || updated.date != original.date;
        let mut deltas: Vec<(String, f64)> = Vec::new();
        if placement_changed {
            for budget in self.budget_repository.budgets_containing(
                user_id,
                &original.category_id,
                original.date,
            )? {
                deltas.push((budget.id, -original.amount));
            }
            for budget in self.budget_repository.budgets_containing(
                user_id,
                &updated.category_id,
                updated.date,
            )? {
                deltas.push((budget.id, updated.amount));
            }
        } else if (updated.amount - original.amount).abs() > MIN_ADJUSTMENT {
            for budget in self.budget_repository.budgets_containing(
                user_id,
                &updated.category_id,
                updated.date,
            )? {
                deltas.push((budget.id, updated.amount - original.amount));
            }
        }
        if !deltas.is_empty() {
            self.budget_repository.apply_spent_adjustments(user_id, &deltas)?;
        }

        Ok(updated)
    }

    pub fn delete_expense(&self, user_id: &str, expense_id: &str) -> Result<()> {
        let expense = self.require_expense(user_id, expense_id)?;

        self.adjust_matching_budgets(user_id, &expense.category_id, expense.date, -expense.amount)?;
        self.expense_repository.delete_expense(user_id, expense_id)?;

        // Keep the recurring template's child list consistent.
        if let Some(parent_id) = &expense.parent_expense_id {
            if let Some(mut parent) = self.expense_repository.get_expense(user_id, parent_id)? {
                parent.child_expense_ids.retain(|id| id != expense_id);
                parent.updated_at = Utc::now();
                self.expense_repository.update_expense(&parent)?;
            } else {
                warn!("Parent expense {} of {} is missing", parent_id, expense_id);
            }
        }

        info!("Deleted expense {} for user {}", expense_id, user_id);
        Ok(())
    }

    /// Clone a recurring template into a concrete expense on the given date.
    /// The instance reconciles against budgets like any other expense and is
    /// linked back to its template.
    pub fn spawn_recurring_instance(
        &self,
        user_id: &str,
        template_id: &str,
        date: DateTime<Utc>,
    ) -> Result<Expense> {
        let mut template = self.require_expense(user_id, template_id)?;
        if !template.is_recurring {
            return Err(DomainError::Validation(format!(
                "Expense {} is not a recurring template",
                template_id
            ))
            .into());
        }

        let mut instance = Expense::new(
            user_id,
            template.amount,
            &template.category_id,
            date,
            template.description.clone(),
        );
        instance.parent_expense_id = Some(template.id.clone());
        self.expense_repository.store_expense(&instance)?;

        template.child_expense_ids.push(instance.id.clone());
        template.updated_at = Utc::now();
        self.expense_repository.update_expense(&template)?;

        self.adjust_matching_budgets(user_id, &instance.category_id, date, instance.amount)?;

        info!(
            "Spawned recurring instance {} from template {} for user {}",
            instance.id, template_id, user_id
        );
        Ok(instance)
    }

    pub fn get_expense(&self, user_id: &str, expense_id: &str) -> Result<Option<Expense>> {
        self.expense_repository.get_expense(user_id, expense_id)
    }

    /// List expenses, most recent first, with optional date range, category
    /// and limit filters.
    pub fn list_expenses(&self, user_id: &str, query: ExpenseListQuery) -> Result<Vec<Expense>> {
        let mut expenses = if query.start_date.is_some() || query.end_date.is_some() {
            self.expense_repository.list_expenses_in_range(
                user_id,
                query.start_date.unwrap_or(DateTime::<Utc>::MIN_UTC),
                query.end_date.unwrap_or(DateTime::<Utc>::MAX_UTC),
                query.category_id.as_deref(),
            )?
        } else {
            let all = self.expense_repository.list_expenses(user_id, None)?;
            match query.category_id.as_deref() {
                Some(category) => all.into_iter().filter(|e| e.category_id == category).collect(),
                None => all,
            }
        };
        if let Some(limit) = query.limit {
            expenses.truncate(limit as usize);
        }
        Ok(expenses)
    }

    fn require_expense(&self, user_id: &str, expense_id: &str) -> Result<Expense> {
        self.expense_repository
            .get_expense(user_id, expense_id)?
            .ok_or_else(|| {
                DomainError::NotFound {
                    kind: "Expense",
                    id: expense_id.to_string(),
                }
                .into()
            })
    }

    fn adjust_matching_budgets(
        &self,
        user_id: &str,
        category_id: &str,
        date: DateTime<Utc>,
        delta: f64,
    ) -> Result<()> {
        if delta.abs() < MIN_ADJUSTMENT {
            return Ok(());
        }
        let deltas: Vec<(String, f64)> = self
            .budget_repository
            .budgets_containing(user_id, category_id, date)?
            .into_iter()
            .map(|b| (b.id, delta))
            .collect();
        if !deltas.is_empty() {
            self.budget_repository.apply_spent_adjustments(user_id, &deltas)?;
        }
        Ok(())
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(
            DomainError::Validation("Expense amount must be a positive number".to_string()).into(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::category_service::CategoryService;
    use crate::domain::models::budget::{Budget, BudgetPeriod};
    use crate::domain::period::DateRange;
    use crate::storage::csv::test_utils::TestEnvironment;
    use crate::storage::csv::CsvConnection;
    use chrono::TimeZone;

    struct Fixture {
        env: TestEnvironment,
        service: ExpenseService<CsvConnection>,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let env = TestEnvironment::new()?;
            let connection = Arc::new(env.connection.clone());
            CategoryService::new(connection.clone()).ensure_defaults()?;
            let service = ExpenseService::new(connection);
            Ok(Self { env, service })
        }

        fn june_budget(&self, category: &str, limit: f64) -> Result<Budget> {
            let range = DateRange::new(
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap(),
            );
            let budget = Budget::new("alice", category, limit, BudgetPeriod::Monthly, range);
            self.env.connection.create_budget_repository().store_budget(&budget)?;
            Ok(budget)
        }

        fn spent(&self, budget_id: &str) -> f64 {
            self.env
                .connection
                .create_budget_repository()
                .get_budget("alice", budget_id)
                .unwrap()
                .unwrap()
                .spent_amount
        }
    }

    fn create_command(amount: f64, category: &str, date: DateTime<Utc>) -> CreateExpenseCommand {
        CreateExpenseCommand {
            user_id: "alice".to_string(),
            amount,
            category_id: category.to_string(),
            date: Some(date),
            description: None,
            is_recurring: false,
            frequency: None,
        }
    }

    fn june(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn create_then_delete_leaves_budget_untouched() -> Result<()> {
        let fixture = Fixture::new()?;
        let budget = fixture.june_budget("default-food-dining", 500.0)?;

        let expense = fixture
            .service
            .create_expense(create_command(120.0, "default-food-dining", june(10)))?;
        assert_eq!(fixture.spent(&budget.id), 120.0);

        fixture.service.delete_expense("alice", &expense.id)?;
        assert_eq!(fixture.spent(&budget.id), 0.0);
        Ok(())
    }

    #[test]
    fn amount_edit_applies_only_the_difference() -> Result<()> {
        let fixture = Fixture::new()?;
        let budget = fixture.june_budget("default-food-dining", 500.0)?;
        let expense = fixture
            .service
            .create_expense(create_command(120.0, "default-food-dining", june(10)))?;

        fixture.service.update_expense(
            "alice",
            &expense.id,
            UpdateExpenseCommand {
                amount: Some(80.0),
                ..Default::default()
            },
        )?;
        assert_eq!(fixture.spent(&budget.id), 80.0);
        Ok(())
    }

    #[test]
    fn moving_an_expense_between_categories_moves_its_amount() -> Result<()> {
        let fixture = Fixture::new()?;
        let food = fixture.june_budget("default-food-dining", 500.0)?;
        let travel = fixture.june_budget("default-transportation", 300.0)?;
        let expense = fixture
            .service
            .create_expense(create_command(50.0, "default-food-dining", june(10)))?;
        assert_eq!(fixture.spent(&food.id), 50.0);

        fixture.service.update_expense(
            "alice",
            &expense.id,
            UpdateExpenseCommand {
                category_id: Some("default-transportation".to_string()),
                ..Default::default()
            },
        )?;
        assert_eq!(fixture.spent(&food.id), 0.0);
        assert_eq!(fixture.spent(&travel.id), 50.0);
        Ok(())
    }

    #[test]
    fn moving_an_expense_out_of_the_period_releases_its_amount() -> Result<()> {
        let fixture = Fixture::new()?;
        let budget = fixture.june_budget("default-food-dining", 500.0)?;
        let expense = fixture
            .service
            .create_expense(create_command(50.0, "default-food-dining", june(10)))?;

        fixture.service.update_expense(
            "alice",
            &expense.id,
            UpdateExpenseCommand {
                date: Some(Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap()),
                ..Default::default()
            },
        )?;
        assert_eq!(fixture.spent(&budget.id), 0.0);
        Ok(())
    }

    #[test]
    fn unknown_categories_and_bad_amounts_are_rejected() -> Result<()> {
        let fixture = Fixture::new()?;

        let err = fixture
            .service
            .create_expense(create_command(10.0, "no-such-category", june(1)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound { kind: "Category", .. })
        ));

        let err = fixture
            .service
            .create_expense(create_command(-5.0, "default-food-dining", june(1)))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::Validation(_))
        ));
        Ok(())
    }

    #[test]
    fn recurring_instances_link_back_to_their_template() -> Result<()> {
        let fixture = Fixture::new()?;
        let budget = fixture.june_budget("default-bills-utilities", 1000.0)?;

        let mut command = create_command(99.0, "default-bills-utilities", june(1));
        command.is_recurring = true;
        command.frequency = Some(crate::domain::models::expense::Frequency::Monthly);
        let template = fixture.service.create_expense(command)?;

        let instance = fixture
            .service
            .spawn_recurring_instance("alice", &template.id, june(15))?;
        assert_eq!(instance.parent_expense_id.as_deref(), Some(template.id.as_str()));

        let stored_template = fixture.service.get_expense("alice", &template.id)?.unwrap();
        assert_eq!(stored_template.child_expense_ids, vec![instance.id.clone()]);
        assert_eq!(fixture.spent(&budget.id), 198.0);

        // Deleting the instance unlinks it and releases its amount.
        fixture.service.delete_expense("alice", &instance.id)?;
        let stored_template = fixture.service.get_expense("alice", &template.id)?.unwrap();
        assert!(stored_template.child_expense_ids.is_empty());
        assert_eq!(fixture.spent(&budget.id), 99.0);
        Ok(())
    }

    #[test]
    fn listing_filters_by_range_and_category() -> Result<()> {
        let fixture = Fixture::new()?;
        fixture
            .service
            .create_expense(create_command(10.0, "default-food-dining", june(5)))?;
        fixture
            .service
            .create_expense(create_command(20.0, "default-health", june(10)))?;
        fixture
            .service
            .create_expense(create_command(30.0, "default-food-dining", june(20)))?;

        let listed = fixture.service.list_expenses(
            "alice",
            ExpenseListQuery {
                start_date: Some(june(1)),
                end_date: Some(june(15)),
                category_id: Some("default-food-dining".to_string()),
                limit: None,
            },
        )?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].amount, 10.0);

        let limited = fixture
            .service
            .list_expenses("alice", ExpenseListQuery { limit: Some(2), ..Default::default() })?;
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].amount, 30.0);
        Ok(())
    }
}
