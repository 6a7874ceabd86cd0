//! Maintenance entry point: sweeps a user's budgets (resume interrupted
//! archivals, roll over expired periods, repair drifted spent amounts) and
//! prints the resulting status of every active budget.

use anyhow::Result;
use log::info;
use tracing_subscriber::EnvFilter;

use spendtrack::domain::notification_service::check_budget_status;
use spendtrack::Backend;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let user_id = match args.next() {
        Some(user_id) => user_id,
        None => {
            eprintln!("Usage: spendtrack <user-id> [data-dir]");
            std::process::exit(2);
        }
    };

    let backend = match args.next() {
        Some(data_dir) => Backend::open(data_dir)?,
        None => Backend::open_default()?,
    };

    let successors = backend.budget_service.check_and_update_expired_budgets(&user_id)?;
    if !successors.is_empty() {
        info!("Rolled {} budget(s) into their next period", successors.len());
    }

    let repaired = backend.budget_service.recalculate_all_spent_amounts(&user_id)?;
    if repaired > 0 {
        info!("Repaired spent amounts on {} budget(s)", repaired);
    }

    let categories = backend.category_service.list_categories(&user_id)?;
    let budgets = backend.budget_service.list_active_budgets(&user_id)?;
    if budgets.is_empty() {
        println!("No active budgets for user {}", user_id);
        return Ok(());
    }

    println!("Active budgets for {}:", user_id);
    for budget in &budgets {
        let category_name = categories
            .iter()
            .find(|c| c.id == budget.category_id)
            .map(|c| c.name.as_str())
            .unwrap_or("Uncategorized");
        let report = check_budget_status(budget, category_name);
        println!(
            "  [{:>12}] {:<25} {:>8.2} / {:>8.2} ({:.1}%)",
            report.status.as_str(),
            category_name,
            budget.spent_amount,
            budget.limit_amount,
            report.percentage,
        );
    }

    Ok(())
}
