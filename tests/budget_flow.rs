//! End-to-end flow through the public backend: seed categories, create a
//! budget, record expenses, and check that reconciliation and status
//! classification line up.

use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;

use spendtrack::domain::budget_service::BudgetWriteOutcome;
use spendtrack::domain::commands::budgets::CreateBudgetCommand;
use spendtrack::domain::commands::expenses::{CreateExpenseCommand, ExpenseListQuery};
use spendtrack::domain::models::budget::BudgetPeriod;
use spendtrack::domain::notification_service::{check_budget_status, BudgetStatus};
use spendtrack::Backend;

fn expense(amount: f64) -> CreateExpenseCommand {
    CreateExpenseCommand {
        user_id: "alice".to_string(),
        amount,
        category_id: "default-food-dining".to_string(),
        date: Some(Utc::now()),
        description: None,
        is_recurring: false,
        frequency: None,
    }
}

#[test]
fn weekly_budget_tracks_spending_through_to_exceeded() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Backend::open(temp_dir.path())?;

    let budget = match backend.budget_service.create_budget(CreateBudgetCommand {
        user_id: "alice".to_string(),
        category_id: "default-food-dining".to_string(),
        limit_amount: 10_000.0,
        period: BudgetPeriod::Weekly,
        custom_range: None,
    })? {
        BudgetWriteOutcome::Created(budget) => budget,
        other => panic!("expected Created, got {:?}", other),
    };
    assert_eq!(budget.spent_amount, 0.0);

    backend.expense_service.create_expense(expense(2_000.0))?;
    backend.expense_service.create_expense(expense(3_000.0))?;

    let mid = backend
        .budget_service
        .get_budget("alice", &budget.id)?
        .unwrap();
    assert_eq!(mid.spent_amount, 5_000.0);
    assert_eq!(
        check_budget_status(&mid, "Food & Dining").status,
        BudgetStatus::Normal
    );

    backend.expense_service.create_expense(expense(6_000.0))?;

    let exceeded = backend
        .budget_service
        .get_budget("alice", &budget.id)?
        .unwrap();
    assert_eq!(exceeded.spent_amount, 11_000.0);

    let report = check_budget_status(&exceeded, "Food & Dining");
    assert_eq!(report.status, BudgetStatus::Exceeded);
    assert!((report.percentage - 110.0).abs() < 1e-6);
    assert!(report.message.contains("Food & Dining"));

    // The running total matches a from-scratch recalculation.
    assert_eq!(
        backend
            .budget_service
            .recalculate_spent_amount("alice", &budget.id)?,
        11_000.0
    );

    let listed = backend
        .expense_service
        .list_expenses("alice", ExpenseListQuery::default())?;
    assert_eq!(listed.len(), 3);

    // A second backend over the same directory sees the same state.
    let reopened = Backend::open(temp_dir.path())?;
    assert_eq!(
        reopened
            .budget_service
            .get_budget("alice", &budget.id)?
            .unwrap()
            .spent_amount,
        11_000.0
    );
    Ok(())
}
