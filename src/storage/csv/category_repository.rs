use anyhow::Result;
use csv::{Reader, StringRecord, Writer};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::connection::CsvConnection;
use crate::domain::models::category::Category;
use crate::storage::traits::CategoryStorage;

/// CSV-based category repository.
///
/// Defaults and user categories live in separate files: the shared defaults
/// at the base directory root, each user's own categories inside their user
/// directory.
#[derive(Clone)]
pub struct CategoryRepository {
    connection: CsvConnection,
}

impl CategoryRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn read_categories(&self, path: &Path) -> Result<Vec<Category>> {
        let file = File::open(path)?;
        let mut csv_reader = Reader::from_reader(BufReader::new(file));

        let mut categories = Vec::new();
        for result in csv_reader.records() {
            let record = result?;
            categories.push(parse_record(&record));
        }
        Ok(categories)
    }

    fn write_categories(&self, path: &Path, categories: &[Category]) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut csv_writer = Writer::from_writer(BufWriter::new(file));

        csv_writer.write_record(["id", "name", "icon", "color", "is_default", "user_id"])?;
        for category in categories {
            csv_writer.write_record([
                category.id.as_str(),
                category.name.as_str(),
                category.icon.as_deref().unwrap_or(""),
                category.color.as_deref().unwrap_or(""),
                if category.is_default { "true" } else { "false" },
                category.user_id.as_deref().unwrap_or(""),
            ])?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    fn read_defaults(&self) -> Result<Vec<Category>> {
        self.connection.ensure_default_categories_file_exists()?;
        self.read_categories(&self.connection.get_default_categories_file_path())
    }

    fn read_user(&self, user_id: &str) -> Result<Vec<Category>> {
        self.connection.ensure_user_categories_file_exists(user_id)?;
        self.read_categories(&self.connection.get_user_categories_file_path(user_id))
    }

    fn write_user(&self, user_id: &str, categories: &[Category]) -> Result<()> {
        self.connection.ensure_user_categories_file_exists(user_id)?;
        self.write_categories(&self.connection.get_user_categories_file_path(user_id), categories)
    }
}

fn parse_record(record: &StringRecord) -> Category {
    let opt = |value: Option<&str>| match value {
        Some("") | None => None,
        Some(v) => Some(v.to_string()),
    };
    Category {
        id: record.get(0).unwrap_or("").to_string(),
        name: record.get(1).unwrap_or("").to_string(),
        icon: opt(record.get(2)),
        color: opt(record.get(3)),
        is_default: record.get(4).unwrap_or("false") == "true",
        user_id: opt(record.get(5)),
    }
}

impl CategoryStorage for CategoryRepository {
    fn store_category(&self, category: &Category) -> Result<()> {
        let user_id = category
            .user_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("User categories must carry a user id"))?;
        let mut categories = self.read_user(user_id)?;
        categories.push(category.clone());
        self.write_user(user_id, &categories)
    }

    fn get_category(&self, user_id: &str, category_id: &str) -> Result<Option<Category>> {
        if let Some(found) = self.read_user(user_id)?.into_iter().find(|c| c.id == category_id) {
            return Ok(Some(found));
        }
        Ok(self.read_defaults()?.into_iter().find(|c| c.id == category_id))
    }

    fn list_default_categories(&self) -> Result<Vec<Category>> {
        self.read_defaults()
    }

    fn list_user_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        self.read_user(user_id)
    }

    fn seed_default_categories(&self, defaults: &[Category]) -> Result<usize> {
        let mut existing = self.read_defaults()?;
        let mut written = 0;
        for default in defaults {
            if !existing.iter().any(|c| c.id == default.id) {
                existing.push(default.clone());
                written += 1;
            }
        }
        if written > 0 {
            self.write_categories(&self.connection.get_default_categories_file_path(), &existing)?;
        }
        Ok(written)
    }

    fn update_category(&self, category: &Category) -> Result<()> {
        let user_id = category
            .user_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Default categories cannot be updated"))?;
        let mut categories = self.read_user(user_id)?;
        match categories.iter_mut().find(|c| c.id == category.id) {
            Some(stored) => *stored = category.clone(),
            None => anyhow::bail!("Category not found: {}", category.id),
        }
        self.write_user(user_id, &categories)
    }

    fn delete_category(&self, user_id: &str, category_id: &str) -> Result<bool> {
        let mut categories = self.read_user(user_id)?;
        let original_len = categories.len();
        categories.retain(|c| c.id != category_id);
        if categories.len() == original_len {
            return Ok(false);
        }
        self.write_user(user_id, &categories)?;
        Ok(true)
    }
}
