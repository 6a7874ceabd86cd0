use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::{Reader, StringRecord, Writer};
use log::warn;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};

use super::connection::CsvConnection;
use crate::domain::models::expense::{Expense, Frequency};
use crate::storage::traits::ExpenseStorage;

/// CSV-based expense repository
#[derive(Clone)]
pub struct ExpenseRepository {
    connection: CsvConnection,
}

impl ExpenseRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    /// Read all expenses for a user from their CSV file
    fn read_expenses(&self, user_id: &str) -> Result<Vec<Expense>> {
        self.connection.ensure_expenses_file_exists(user_id)?;

        let file = File::open(self.connection.get_expenses_file_path(user_id))?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut expenses = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            expenses.push(self.parse_record(&record));
        }
        Ok(expenses)
    }

    fn parse_record(&self, record: &StringRecord) -> Expense {
        let child_ids_raw = record.get(11).unwrap_or("[]");
        let child_expense_ids = serde_json::from_str(child_ids_raw).unwrap_or_else(|e| {
            warn!("Failed to parse child expense ids '{}': {}", child_ids_raw, e);
            Vec::new()
        });

        Expense {
            id: record.get(0).unwrap_or("").to_string(),
            user_id: record.get(1).unwrap_or("").to_string(),
            amount: record.get(2).unwrap_or("0").parse::<f64>().unwrap_or(0.0),
            category_id: record.get(3).unwrap_or("").to_string(),
            date: parse_date(record.get(4).unwrap_or("")),
            description: non_empty(record.get(5)),
            created_at: parse_date(record.get(6).unwrap_or("")),
            updated_at: parse_date(record.get(7).unwrap_or("")),
            is_recurring: record.get(8).unwrap_or("false") == "true",
            frequency: record.get(9).and_then(Frequency::parse),
            parent_expense_id: non_empty(record.get(10)),
            child_expense_ids,
        }
    }

    /// Write all expenses for a user to their CSV file
    fn write_expenses(&self, user_id: &str, expenses: &[Expense]) -> Result<()> {
        self.connection.ensure_expenses_file_exists(user_id)?;

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.connection.get_expenses_file_path(user_id))?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record([
            "id",
            "user_id",
            "amount",
            "category_id",
            "date",
            "description",
            "created_at",
            "updated_at",
            "is_recurring",
            "frequency",
            "parent_expense_id",
            "child_expense_ids",
        ])?;

        for expense in expenses {
            csv_writer.write_record([
                expense.id.as_str(),
                expense.user_id.as_str(),
                expense.amount.to_string().as_str(),
                expense.category_id.as_str(),
                expense.date.to_rfc3339().as_str(),
                expense.description.as_deref().unwrap_or(""),
                expense.created_at.to_rfc3339().as_str(),
                expense.updated_at.to_rfc3339().as_str(),
                if expense.is_recurring { "true" } else { "false" },
                expense.frequency.map(|f| f.as_str()).unwrap_or(""),
                expense.parent_expense_id.as_deref().unwrap_or(""),
                serde_json::to_string(&expense.child_expense_ids)?.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    match value {
        Some("") | None => None,
        Some(v) => Some(v.to_string()),
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

impl ExpenseStorage for ExpenseRepository {
    fn store_expense(&self, expense: &Expense) -> Result<()> {
        let mut expenses = self.read_expenses(&expense.user_id)?;
        expenses.push(expense.clone());
        self.write_expenses(&expense.user_id, &expenses)
    }

    fn get_expense(&self, user_id: &str, expense_id: &str) -> Result<Option<Expense>> {
        let expenses = self.read_expenses(user_id)?;
        Ok(expenses.into_iter().find(|e| e.id == expense_id))
    }

    fn list_expenses(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<Expense>> {
        let mut expenses = self.read_expenses(user_id)?;
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        if let Some(limit) = limit {
            expenses.truncate(limit as usize);
        }
        Ok(expenses)
    }

    fn list_expenses_in_range(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        category_id: Option<&str>,
    ) -> Result<Vec<Expense>> {
        let mut expenses: Vec<Expense> = self
            .read_expenses(user_id)?
            .into_iter()
            .filter(|e| e.date >= start && e.date <= end)
            .filter(|e| category_id.map_or(true, |c| e.category_id == c))
            .collect();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(expenses)
    }

    fn update_expense(&self, expense: &Expense) -> Result<()> {
        let mut expenses = self.read_expenses(&expense.user_id)?;
        match expenses.iter_mut().find(|e| e.id == expense.id) {
            Some(stored) => *stored = expense.clone(),
            None => anyhow::bail!("Expense not found: {}", expense.id),
        }
        self.write_expenses(&expense.user_id, &expenses)
    }

    fn delete_expense(&self, user_id: &str, expense_id: &str) -> Result<bool> {
        let mut expenses = self.read_expenses(user_id)?;
        let original_len = expenses.len();
        expenses.retain(|e| e.id != expense_id);
        if expenses.len() == original_len {
            return Ok(false);
        }
        self.write_expenses(user_id, &expenses)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::test_utils::TestHelper;
    use chrono::TimeZone;

    fn expense_on(user: &str, amount: f64, category: &str, date: DateTime<Utc>) -> Expense {
        Expense::new(user, amount, category, date, Some("test expense".to_string()))
    }

    #[test]
    fn store_and_get_round_trips_all_fields() -> Result<()> {
        let helper = TestHelper::new()?;
        let date = Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap();

        let mut expense = expense_on("alice", 42.5, "cat-food", date);
        expense.is_recurring = true;
        expense.frequency = Some(Frequency::Monthly);
        expense.child_expense_ids = vec!["child-1".to_string(), "child-2".to_string()];
        helper.expense_repo.store_expense(&expense)?;

        let stored = helper.expense_repo.get_expense("alice", &expense.id)?.unwrap();
        assert_eq!(stored.amount, 42.5);
        assert_eq!(stored.date, date);
        assert_eq!(stored.frequency, Some(Frequency::Monthly));
        assert_eq!(stored.child_expense_ids, expense.child_expense_ids);
        assert_eq!(stored.description.as_deref(), Some("test expense"));
        Ok(())
    }

    #[test]
    fn list_expenses_orders_most_recent_first() -> Result<()> {
        let helper = TestHelper::new()?;
        let older = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2025, 6, 20, 0, 0, 0).unwrap();

        helper.expense_repo.store_expense(&expense_on("alice", 10.0, "c", older))?;
        helper.expense_repo.store_expense(&expense_on("alice", 20.0, "c", newer))?;

        let expenses = helper.expense_repo.list_expenses("alice", None)?;
        assert_eq!(expenses.len(), 2);
        assert_eq!(expenses[0].amount, 20.0);
        assert_eq!(expenses[1].amount, 10.0);

        let limited = helper.expense_repo.list_expenses("alice", Some(1))?;
        assert_eq!(limited.len(), 1);
        Ok(())
    }

    #[test]
    fn range_listing_filters_by_date_and_category() -> Result<()> {
        let helper = TestHelper::new()?;
        let inside = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2025, 7, 10, 0, 0, 0).unwrap();

        helper.expense_repo.store_expense(&expense_on("alice", 10.0, "food", inside))?;
        helper.expense_repo.store_expense(&expense_on("alice", 20.0, "travel", inside))?;
        helper.expense_repo.store_expense(&expense_on("alice", 30.0, "food", outside))?;

        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap();

        let all = helper.expense_repo.list_expenses_in_range("alice", start, end, None)?;
        assert_eq!(all.len(), 2);

        let food = helper
            .expense_repo
            .list_expenses_in_range("alice", start, end, Some("food"))?;
        assert_eq!(food.len(), 1);
        assert_eq!(food[0].amount, 10.0);
        Ok(())
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() -> Result<()> {
        let helper = TestHelper::new()?;
        let expense = expense_on("alice", 5.0, "c", Utc::now());
        helper.expense_repo.store_expense(&expense)?;

        assert!(helper.expense_repo.delete_expense("alice", &expense.id)?);
        assert!(!helper.expense_repo.delete_expense("alice", &expense.id)?);
        assert!(helper.expense_repo.get_expense("alice", &expense.id)?.is_none());
        Ok(())
    }

    #[test]
    fn users_do_not_see_each_others_expenses() -> Result<()> {
        let helper = TestHelper::new()?;
        helper.expense_repo.store_expense(&expense_on("alice", 5.0, "c", Utc::now()))?;

        assert!(helper.expense_repo.list_expenses("bob", None)?.is_empty());
        Ok(())
    }
}
