use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::{Reader, StringRecord, Writer};
use log::warn;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::errors::DomainError;
use crate::domain::models::budget::{Budget, BudgetLifecycle, BudgetPeriod};
use crate::storage::traits::BudgetStorage;

/// CSV-based budget repository
#[derive(Clone)]
pub struct BudgetRepository {
    connection: CsvConnection,
}

impl BudgetRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.connection.ensure_budgets_file_exists(user_id)?;

        let file = File::open(self.connection.get_budgets_file_path(user_id))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut budgets = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            budgets.push(parse_record(&record));
        }
        Ok(budgets)
    }

    fn write_budgets(&self, user_id: &str, budgets: &[Budget]) -> Result<()> {
        self.connection.ensure_budgets_file_exists(user_id)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.connection.get_budgets_file_path(user_id))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record([
            "id",
            "user_id",
            "category_id",
            "limit_amount",
            "spent_amount",
            "period",
            "start_date",
            "end_date",
            "lifecycle",
            "previous_period_ids",
            "next_period_id",
            "revision",
            "created_at",
            "updated_at",
        ])?;

        for budget in budgets {
            csv_writer.write_record([
                budget.id.as_str(),
                budget.user_id.as_str(),
                budget.category_id.as_str(),
                budget.limit_amount.to_string().as_str(),
                budget.spent_amount.to_string().as_str(),
                budget.period.as_str(),
                budget.start_date.to_rfc3339().as_str(),
                budget.end_date.to_rfc3339().as_str(),
                budget.lifecycle.as_str(),
                serde_json::to_string(&budget.previous_period_ids)?.as_str(),
                budget.next_period_id.as_deref().unwrap_or(""),
                budget.revision.to_string().as_str(),
                budget.created_at.to_rfc3339().as_str(),
                budget.updated_at.to_rfc3339().as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn parse_date(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            warn!("Failed to parse date '{}': {}. Using current time.", value, e);
            Utc::now()
        }
    }
}

fn parse_record(record: &StringRecord) -> Budget {
    let previous_raw = record.get(9).unwrap_or("[]");
    let previous_period_ids = serde_json::from_str(previous_raw).unwrap_or_else(|e| {
        warn!("Failed to parse previous period ids '{}': {}", previous_raw, e);
        Vec::new()
    });

    Budget {
        id: record.get(0).unwrap_or("").to_string(),
        user_id: record.get(1).unwrap_or("").to_string(),
        category_id: record.get(2).unwrap_or("").to_string(),
        limit_amount: record.get(3).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
        spent_amount: record.get(4).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
        period: record
            .get(5)
            .and_then(BudgetPeriod::parse)
            .unwrap_or(BudgetPeriod::Monthly),
        start_date: parse_date(record.get(6).unwrap_or("")),
        end_date: parse_date(record.get(7).unwrap_or("")),
        lifecycle: record
            .get(8)
            .and_then(BudgetLifecycle::parse)
            .unwrap_or(BudgetLifecycle::Active),
        previous_period_ids,
        next_period_id: match record.get(10) {
            Some("") | None => None,
            Some(v) => Some(v.to_string()),
        },
        revision: record.get(11).unwrap_or("0").parse::<u64>().unwrap_or(0),
        created_at: parse_date(record.get(12).unwrap_or("")),
        updated_at: parse_date(record.get(13).unwrap_or("")),
    }
}

impl BudgetStorage for BudgetRepository {
    fn store_budget(&self, budget: &Budget) -> Result<()> {
        let mut budgets = self.read_budgets(&budget.user_id)?;
        budgets.push(budget.clone());
        self.write_budgets(&budget.user_id, &budgets)
    }

    fn get_budget(&self, user_id: &str, budget_id: &str) -> Result<Option<Budget>> {
        let budgets = self.read_budgets(user_id)?;
        Ok(budgets.into_iter().find(|b| b.id == budget_id))
    }

    fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        self.read_budgets(user_id)
    }

    fn list_active_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        Ok(self
            .read_budgets(user_id)?
            .into_iter()
            .filter(|b| b.is_active())
            .collect())
    }

    fn budgets_containing(
        &self,
        user_id: &str,
        category_id: &str,
        instant: DateTime<Utc>,
    ) -> Result<Vec<Budget>> {
        Ok(self
            .read_budgets(user_id)?
            .into_iter()
            .filter(|b| b.category_id == category_id && b.contains(instant))
            .collect())
    }

    fn update_budget(&self, budget: &Budget) -> Result<Budget> {
        let mut budgets = self.read_budgets(&budget.user_id)?;
        let stored = budgets
            .iter_mut()
            .find(|b| b.id == budget.id)
            .ok_or_else(|| DomainError::NotFound {
                kind: "Budget",
                id: budget.id.clone(),
            })?;

        if stored.revision != budget.revision {
            return Err(DomainError::RevisionConflict {
                id: budget.id.clone(),
                expected: budget.revision,
                found: stored.revision,
            }
            .into());
        }

        let mut updated = budget.clone();
        updated.revision = budget.revision + 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();

        self.write_budgets(&budget.user_id, &budgets)?;
        Ok(updated)
    }

    fn apply_spent_adjustments(&self, user_id: &str, deltas: &[(String, f64)]) -> Result<u32> {
        if deltas.is_empty() {
            return Ok(0);
        }

        // Merge deltas so each budget is rewritten at most once per pass.
        let mut merged: HashMap<&str, f64> = HashMap::new();
        for (budget_id, delta) in deltas {
            *merged.entry(budget_id.as_str()).or_insert(0.0) += delta;
        }

        let mut budgets = self.read_budgets(user_id)?;
        let mut changed = 0u32;
        let now = Utc::now();
        for budget in budgets.iter_mut() {
            if let Some(delta) = merged.get(budget.id.as_str()) {
                let adjusted = (budget.spent_amount + delta).max(0.0);
                if adjusted != budget.spent_amount {
                    budget.spent_amount = adjusted;
                    budget.revision += 1;
                    budget.updated_at = now;
                    changed += 1;
                }
            }
        }

        if changed > 0 {
            self.write_budgets(user_id, &budgets)?;
        }
        Ok(changed)
    }

    fn delete_budget(&self, user_id: &str, budget_id: &str) -> Result<bool> {
        let mut budgets = self.read_budgets(user_id)?;
        let original_len = budgets.len();
        budgets.retain(|b| b.id != budget_id);
        if budgets.len() == original_len {
            return Ok(false);
        }
        self.write_budgets(user_id, &budgets)?;
        Ok(true)
    }
}
