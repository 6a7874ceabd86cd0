use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::{Reader, StringRecord, Writer};
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::models::budget::BudgetPeriod;
use crate::domain::models::budget_history::BudgetHistory;
use crate::storage::traits::BudgetHistoryStorage;

/// CSV-based budget history repository. Snapshots are append-only.
#[derive(Clone)]
pub struct BudgetHistoryRepository {
    connection: CsvConnection,
}

impl BudgetHistoryRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_history(&self, user_id: &str) -> Result<Vec<BudgetHistory>> {
        self.connection.ensure_budget_history_file_exists(user_id)?;

        let file = File::open(self.connection.get_budget_history_file_path(user_id))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut snapshots = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            snapshots.push(parse_record(&record));
        }
        Ok(snapshots)
    }

    fn write_history(&self, user_id: &str, snapshots: &[BudgetHistory]) -> Result<()> {
        self.connection.ensure_budget_history_file_exists(user_id)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.connection.get_budget_history_file_path(user_id))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record([
            "id",
            "budget_id",
            "user_id",
            "category_id",
            "limit_amount",
            "spent_amount",
            "period",
            "start_date",
            "end_date",
            "created_at",
            "completed_at",
        ])?;

        for snapshot in snapshots {
            csv_writer.write_record([
                snapshot.id.as_str(),
                snapshot.budget_id.as_str(),
                snapshot.user_id.as_str(),
                snapshot.category_id.as_str(),
                snapshot.limit_amount.to_string().as_str(),
                snapshot.spent_amount.to_string().as_str(),
                snapshot.period.as_str(),
                snapshot.start_date.to_rfc3339().as_str(),
                snapshot.end_date.to_rfc3339().as_str(),
                snapshot.created_at.to_rfc3339().as_str(),
                snapshot.completed_at.to_rfc3339().as_str(),
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

fn parse_record(record: &StringRecord) -> BudgetHistory {
    BudgetHistory {
        id: record.get(0).unwrap_or("").to_string(),
        budget_id: record.get(1).unwrap_or("").to_string(),
        user_id: record.get(2).unwrap_or("").to_string(),
        category_id: record.get(3).unwrap_or("").to_string(),
        limit_amount: record.get(4).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
        spent_amount: record.get(5).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
        period: record
            .get(6)
            .and_then(BudgetPeriod::parse)
            .unwrap_or(BudgetPeriod::Monthly),
        start_date: parse_date(record.get(7).unwrap_or("")),
        end_date: parse_date(record.get(8).unwrap_or("")),
        created_at: parse_date(record.get(9).unwrap_or("")),
        completed_at: parse_date(record.get(10).unwrap_or("")),
    }
}

impl BudgetHistoryStorage for BudgetHistoryRepository {
    fn store_history(&self, history: &BudgetHistory) -> Result<()> {
        let mut snapshots = self.read_history(&history.user_id)?;
        snapshots.push(history.clone());
        self.write_history(&history.user_id, &snapshots)
    }

    fn list_history(&self, user_id: &str) -> Result<Vec<BudgetHistory>> {
        let mut snapshots = self.read_history(user_id)?;
        snapshots.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(snapshots)
    }

    fn history_for_budgets(&self, user_id: &str, budget_ids: &[String]) -> Result<Vec<BudgetHistory>> {
        let mut snapshots: Vec<BudgetHistory> = self
            .read_history(user_id)?
            .into_iter()
            .filter(|h| budget_ids.contains(&h.budget_id))
            .collect();
        snapshots.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(snapshots)
    }
}
