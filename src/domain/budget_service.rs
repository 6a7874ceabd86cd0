//! Budget lifecycle service.
//!
//! Owns the whole life of a budget: creation with overlap detection, limit
//! edits, expiry detection, and the archival sequence that snapshots a
//! finished period into history and rolls the budget into its next period.
//!
//! Archival touches three documents (the history snapshot, the successor
//! budget, the archived budget itself) and the store has no multi-document
//! transactions, so the sequence is written to be resumable: the budget is
//! first parked in the `Archiving` state, every subsequent step checks for
//! work already done, and `resume_pending_archivals` finishes any sequence
//! a crash interrupted.

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

use crate::domain::category_service::CategoryService;
use crate::domain::commands::budgets::{CreateBudgetCommand, UpdateBudgetCommand};
use crate::domain::errors::DomainError;
use crate::domain::models::budget::{Budget, BudgetLifecycle, BudgetPeriod};
use crate::domain::models::budget_history::BudgetHistory;
use crate::domain::period::{next_period_date_range, period_date_range, period_ended, DateRange};
use crate::storage::{BudgetHistoryStorage, BudgetStorage, Connection, ExpenseStorage};

/// Running totals and recalculated totals within this distance are treated
/// as equal. Half a cent absorbs float accumulation noise.
const SPENT_DRIFT_EPSILON: f64 = 0.005;

/// Outcome of a budget write that ran overlap detection. The caller decides
/// how to proceed; nothing is written for the conflict variants except
/// `UpdateCandidate`, which only reports the existing budget.
#[derive(Debug, Clone)]
pub enum BudgetWriteOutcome {
    /// No overlap; the budget was stored.
    Created(Budget),
    /// The edit was applied.
    Updated(Budget),
    /// Exactly one overlapping budget with the same period exists. The
    /// natural resolution is updating its limit instead of creating a twin.
    UpdateCandidate(Budget),
    /// Exactly one overlapping budget with a different period exists.
    PeriodConflict(Budget),
    /// Several overlapping budgets exist.
    MultipleConflicts(Vec<Budget>),
}

/// Service responsible for budget lifecycle, overlap detection and
/// spent-amount repair
#[derive(Clone)]
pub struct BudgetService<C: Connection> {
    budget_repository: C::BudgetRepository,
    history_repository: C::BudgetHistoryRepository,
    expense_repository: C::ExpenseRepository,
    category_service: CategoryService<C>,
}

impl<C: Connection> BudgetService<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            budget_repository: connection.create_budget_repository(),
            history_repository: connection.create_budget_history_repository(),
            expense_repository: connection.create_expense_repository(),
            category_service: CategoryService::new(connection),
        }
    }

    pub fn create_budget(&self, command: CreateBudgetCommand) -> Result<BudgetWriteOutcome> {
        validate_limit(command.limit_amount)?;
        self.category_service
            .require_category(&command.user_id, &command.category_id)?;

        let range = period_date_range(command.period, Utc::now(), command.custom_range)?;
        let mut overlapping =
            self.check_budget_overlap(&command.user_id, &command.category_id, range, None)?;

        match overlapping.len() {
            0 => {
                let mut budget = Budget::new(
                    &command.user_id,
                    &command.category_id,
                    command.limit_amount,
                    command.period,
                    range,
                );
                // The running total starts at whatever was already spent in
                // the period, not at zero.
                budget.spent_amount = self.sum_expenses_in_range(
                    &command.user_id,
                    &command.category_id,
                    budget.date_range(),
                )?;
                self.budget_repository.store_budget(&budget)?;
                info!(
                    "Created {} budget {} for category {} (limit {:.2})",
                    budget.period, budget.id, budget.category_id, budget.limit_amount
                );
                Ok(BudgetWriteOutcome::Created(budget))
            }
            1 => {
                let existing = overlapping.remove(0);
                if existing.period == command.period {
                    Ok(BudgetWriteOutcome::UpdateCandidate(existing))
                } else {
                    Ok(BudgetWriteOutcome::PeriodConflict(existing))
                }
            }
            _ => Ok(BudgetWriteOutcome::MultipleConflicts(overlapping)),
        }
    }

    /// The "update instead" resolution for `UpdateCandidate`: change only
    /// the limit of an existing budget.
    pub fn update_budget_limit(
        &self,
        user_id: &str,
        budget_id: &str,
        limit_amount: f64,
    ) -> Result<Budget> {
        validate_limit(limit_amount)?;
        let mut budget = self.require_budget(user_id, budget_id)?;
        budget.limit_amount = limit_amount;
        self.budget_repository.update_budget(&budget)
    }

    pub fn update_budget(
        &self,
        user_id: &str,
        budget_id: &str,
        command: UpdateBudgetCommand,
    ) -> Result<BudgetWriteOutcome> {
        let mut budget = self.require_budget(user_id, budget_id)?;

        if let Some(limit_amount) = command.limit_amount {
            validate_limit(limit_amount)?;
            budget.limit_amount = limit_amount;
        }
        if let Some(category_id) = command.category_id {
            self.category_service.require_category(user_id, &category_id)?;
            budget.category_id = category_id;
        }

        let mut overlapping = self.check_budget_overlap(
            user_id,
            &budget.category_id,
            budget.date_range(),
            Some(budget_id),
        )?;
        match overlapping.len() {
            0 => {
                // A category move re-anchors the running total to the new
                // category's expenses.
                budget.spent_amount =
                    self.sum_expenses_in_range(user_id, &budget.category_id, budget.date_range())?;
                let updated = self.budget_repository.update_budget(&budget)?;
                Ok(BudgetWriteOutcome::Updated(updated))
            }
            1 => {
                let existing = overlapping.remove(0);
                if existing.period == budget.period {
                    Ok(BudgetWriteOutcome::UpdateCandidate(existing))
                } else {
                    Ok(BudgetWriteOutcome::PeriodConflict(existing))
                }
            }
            _ => Ok(BudgetWriteOutcome::MultipleConflicts(overlapping)),
        }
    }

    pub fn delete_budget(&self, user_id: &str, budget_id: &str) -> Result<()> {
        self.require_budget(user_id, budget_id)?;
        self.budget_repository.delete_budget(user_id, budget_id)?;
        info!("Deleted budget {} for user {}", budget_id, user_id);
        Ok(())
    }

    pub fn get_budget(&self, user_id: &str, budget_id: &str) -> Result<Option<Budget>> {
        self.budget_repository.get_budget(user_id, budget_id)
    }

    pub fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.budget_repository.list_budgets(user_id)
    }

    pub fn list_active_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.budget_repository.list_active_budgets(user_id)
    }

    /// Active budgets of the same user and category whose range intersects
    /// the given one. Inclusive at both ends, so ranges sharing a single
    /// endpoint day conflict. `exclude_id` leaves out the budget being
    /// edited so it never conflicts with itself.
    pub fn check_budget_overlap(
        &self,
        user_id: &str,
        category_id: &str,
        range: DateRange,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Budget>> {
        Ok(self
            .budget_repository
            .list_active_budgets(user_id)?
            .into_iter()
            .filter(|b| b.category_id == category_id)
            .filter(|b| b.date_range().intersects(&range))
            .filter(|b| exclude_id != Some(b.id.as_str()))
            .collect())
    }

    /// Completed-period snapshots in this budget's lineage, most recent
    /// first. A first-period budget has no lineage and gets an empty list.
    pub fn get_budget_history(&self, user_id: &str, budget_id: &str) -> Result<Vec<BudgetHistory>> {
        let budget = self.require_budget(user_id, budget_id)?;
        if budget.previous_period_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.history_repository
            .history_for_budgets(user_id, &budget.previous_period_ids)
    }

    /// Archive a budget whose period has ended and roll it into the next
    /// period. Returns the successor's ID when one was created or already
    /// existed.
    ///
    /// Idempotent: an already archived budget returns its recorded
    /// successor, a budget still mid-period returns `None` without writing,
    /// and a budget found in the `Archiving` state resumes where the
    /// interrupted run left off.
    pub fn archive_budget_and_create_next(
        &self,
        user_id: &str,
        budget_id: &str,
    ) -> Result<Option<String>> {
        let budget = self.require_budget(user_id, budget_id)?;
        let budget = match budget.lifecycle {
            BudgetLifecycle::Archived => return Ok(budget.next_period_id),
            BudgetLifecycle::Archiving => {
                info!("Resuming interrupted archival of budget {}", budget_id);
                budget
            }
            BudgetLifecycle::Active => {
                if !period_ended(budget.date_range(), Utc::now()) {
                    return Ok(None);
                }
                // Durable marker first, so a crash in any later step leaves
                // a resumable record instead of a half-archived budget.
                let mut marking = budget;
                marking.lifecycle = BudgetLifecycle::Archiving;
                self.budget_repository.update_budget(&marking)?
            }
        };
        self.finish_archival(user_id, budget)
    }

    /// Finish any archival a previous run left in the `Archiving` state.
    /// Returns the number of budgets resumed.
    pub fn resume_pending_archivals(&self, user_id: &str) -> Result<usize> {
        let pending: Vec<Budget> = self
            .budget_repository
            .list_budgets(user_id)?
            .into_iter()
            .filter(|b| b.lifecycle == BudgetLifecycle::Archiving)
            .collect();
        let resumed = pending.len();
        for budget in pending {
            warn!("Found budget {} stuck in archival, resuming", budget.id);
            self.finish_archival(user_id, budget)?;
        }
        Ok(resumed)
    }

    /// Sweep a user's budgets: resume interrupted archivals, then archive
    /// every active budget whose period has ended. Returns the IDs of the
    /// successor budgets created.
    pub fn check_and_update_expired_budgets(&self, user_id: &str) -> Result<Vec<String>> {
        self.resume_pending_archivals(user_id)?;

        let now = Utc::now();
        let mut successors = Vec::new();
        for budget in self.budget_repository.list_active_budgets(user_id)? {
            if period_ended(budget.date_range(), now) {
                if let Some(successor_id) =
                    self.archive_budget_and_create_next(user_id, &budget.id)?
                {
                    successors.push(successor_id);
                }
            }
        }
        Ok(successors)
    }

    /// Recompute a budget's spent amount from its expenses and repair the
    /// stored running total when it has drifted. Returns the true total.
    pub fn recalculate_spent_amount(&self, user_id: &str, budget_id: &str) -> Result<f64> {
        let budget = self.require_budget(user_id, budget_id)?;
        let actual =
            self.sum_expenses_in_range(user_id, &budget.category_id, budget.date_range())?;

        let drift = actual - budget.spent_amount;
        if drift.abs() > SPENT_DRIFT_EPSILON {
            warn!(
                "Budget {} spent amount drifted by {:.2} (stored {:.2}, actual {:.2}), repairing",
                budget_id, drift, budget.spent_amount, actual
            );
            self.budget_repository
                .apply_spent_adjustments(user_id, &[(budget_id.to_string(), drift)])?;
        }
        Ok(actual)
    }

    /// Run drift repair across all of a user's budgets. Returns the number
    /// of budgets that needed repair.
    pub fn recalculate_all_spent_amounts(&self, user_id: &str) -> Result<usize> {
        let mut deltas = Vec::new();
        for budget in self.budget_repository.list_budgets(user_id)? {
            let actual =
                self.sum_expenses_in_range(user_id, &budget.category_id, budget.date_range())?;
            let drift = actual - budget.spent_amount;
            if drift.abs() > SPENT_DRIFT_EPSILON {
                deltas.push((budget.id, drift));
            }
        }
        if deltas.is_empty() {
            return Ok(0);
        }
        let repaired = self.budget_repository.apply_spent_adjustments(user_id, &deltas)?;
        info!("Repaired spent amounts on {} budget(s) for user {}", repaired, user_id);
        Ok(repaired as usize)
    }

    /// The resumable tail of the archival sequence. Every step is a no-op
    /// when a previous run already did the work.
    fn finish_archival(&self, user_id: &str, budget: Budget) -> Result<Option<String>> {
        let completed_at = budget.end_date;

        let already_snapshotted = !self
            .history_repository
            .history_for_budgets(user_id, &[budget.id.clone()])?
            .is_empty();
        if !already_snapshotted {
            self.history_repository
                .store_history(&BudgetHistory::snapshot(&budget, completed_at))?;
        }

        let successor_id = if budget.period == BudgetPeriod::Custom {
            // Custom periods have no deterministic successor.
            None
        } else {
            Some(self.find_or_create_successor(user_id, &budget)?)
        };

        let mut archived = budget;
        archived.lifecycle = BudgetLifecycle::Archived;
        archived.next_period_id = successor_id.clone();
        self.budget_repository.update_budget(&archived)?;

        info!(
            "Archived budget {} for user {}{}",
            archived.id,
            user_id,
            successor_id
                .as_deref()
                .map(|id| format!(", successor {}", id))
                .unwrap_or_default()
        );
        Ok(successor_id)
    }

    fn find_or_create_successor(&self, user_id: &str, budget: &Budget) -> Result<String> {
        // An interrupted run may already have written the successor.
        if let Some(existing) = self
            .budget_repository
            .list_budgets(user_id)?
            .into_iter()
            .find(|b| b.previous_period_ids.last() == Some(&budget.id))
        {
            return Ok(existing.id);
        }

        let range = next_period_date_range(budget.period, budget.date_range())?;
        let mut successor = Budget::new(
            user_id,
            &budget.category_id,
            budget.limit_amount,
            budget.period,
            range,
        );
        successor.previous_period_ids = budget.previous_period_ids.clone();
        successor.previous_period_ids.push(budget.id.clone());
        successor.spent_amount =
            self.sum_expenses_in_range(user_id, &budget.category_id, range)?;
        self.budget_repository.store_budget(&successor)?;
        Ok(successor.id)
    }

    fn sum_expenses_in_range(
        &self,
        user_id: &str,
        category_id: &str,
        range: DateRange,
    ) -> Result<f64> {
        Ok(self
            .expense_repository
            .list_expenses_in_range(user_id, range.start, range.end, Some(category_id))?
            .iter()
            .map(|e| e.amount)
            .sum())
    }

    fn require_budget(&self, user_id: &str, budget_id: &str) -> Result<Budget> {
        self.budget_repository
            .get_budget(user_id, budget_id)?
            .ok_or_else(|| {
                DomainError::NotFound {
                    kind: "Budget",
                    id: budget_id.to_string(),
                }
                .into()
            })
    }
}

fn validate_limit(limit_amount: f64) -> Result<()> {
    if !limit_amount.is_finite() || limit_amount <= 0.0 {
        return Err(
            DomainError::Validation("Budget limit must be a positive number".to_string()).into(),
        );
    }
    Ok(())
}
