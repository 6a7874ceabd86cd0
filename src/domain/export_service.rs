//! Export service domain logic.
//!
//! Builds CSV and plain-text reports from a range of expenses and writes
//! them to disk, including orchestration of data collection, filename
//! generation and path handling. Callers only handle presentation concerns.

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{error, info};
use std::fs;

use crate::domain::analytics_service::{category_totals, sum_amounts, AnalyticsService};
use crate::domain::category_service::CategoryService;
use crate::domain::models::category::Category;
use crate::domain::models::expense::Expense;
use crate::domain::period::DateRange;
use crate::storage::Connection;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Text => "txt",
        }
    }
}

/// How dates are rendered in the generated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `06/15/2025`
    Short,
    /// `June 15, 2025`
    Long,
}

impl DateStyle {
    fn format(&self, date: DateTime<Utc>) -> String {
        match self {
            DateStyle::Short => date.format("%m/%d/%Y").to_string(),
            DateStyle::Long => date.format("%B %-d, %Y").to_string(),
        }
    }
}

/// Rendering options for both formats.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include_headers: bool,
    pub date_style: DateStyle,
    pub currency_symbol: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_headers: true,
            date_style: DateStyle::Short,
            currency_symbol: "₦".to_string(),
        }
    }
}

/// Everything an export run works from, collected up front.
#[derive(Debug, Clone)]
pub struct ExportData {
    pub expenses: Vec<Expense>,
    pub categories: Vec<Category>,
    pub range: DateRange,
    pub total_amount: f64,
}

/// Result of writing an export to disk. Write failures are reported in the
/// outcome rather than as errors, so callers can surface the message as-is.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub expense_count: usize,
}

/// Export service that handles all export-related business logic
#[derive(Clone, Default)]
pub struct ExportService;

impl ExportService {
    pub fn new() -> Self {
        Self
    }

    /// Collect the expenses and category metadata for a range.
    pub fn build_export_data<C: Connection>(
        &self,
        user_id: &str,
        range: DateRange,
        analytics_service: &AnalyticsService<C>,
        category_service: &CategoryService<C>,
    ) -> Result<ExportData> {
        let expenses = analytics_service.expenses_for_date_range(user_id, range)?;
        let categories = category_service.list_categories(user_id)?;
        let total_amount = sum_amounts(&expenses);
        Ok(ExportData { expenses, categories, range, total_amount })
    }

    /// Problems that make an export pointless or misleading. An empty list
    /// means the data is fit to export.
    pub fn validate_export_data(&self, data: &ExportData) -> Vec<String> {
        let mut problems = Vec::new();
        if data.expenses.is_empty() {
            problems.push("No expenses in the selected date range".to_string());
        }
        if data.range.start > data.range.end {
            problems.push("Date range start is after its end".to_string());
        }
        let known: Vec<&str> = data.categories.iter().map(|c| c.id.as_str()).collect();
        let orphaned = data
            .expenses
            .iter()
            .filter(|e| !known.contains(&e.category_id.as_str()))
            .count();
        if orphaned > 0 {
            problems.push(format!("{} expense(s) reference an unknown category", orphaned));
        }
        problems
    }

    /// Render CSV content: one row per expense, chronological.
    pub fn generate_csv(&self, data: &ExportData, options: &ExportOptions) -> String {
        let mut content = String::new();
        if options.include_headers {
            content.push_str("Date,Amount,Category,Description\n");
        }

        let mut expenses = data.expenses.clone();
        expenses.sort_by(|a, b| a.date.cmp(&b.date));

        for expense in &expenses {
            let row = format!(
                "{},\"{}{:.2}\",\"{}\",\"{}\"\n",
                options.date_style.format(expense.date),
                options.currency_symbol,
                expense.amount,
                csv_escape(self.category_name(data, &expense.category_id)),
                csv_escape(expense.description.as_deref().unwrap_or("")),
            );
            content.push_str(&row);
        }
        content
    }

    /// Render a human-readable plain-text report with a per-category summary
    /// followed by the full chronological expense listing.
    pub fn generate_report(&self, data: &ExportData, options: &ExportOptions) -> String {
        let symbol = &options.currency_symbol;
        let mut report = String::new();

        report.push_str(&format!("{:^50}\n", "EXPENSE REPORT"));
        report.push_str(&format!("{}\n\n", "=".repeat(50)));
        report.push_str(&format!(
            "Period: {} - {}\n",
            options.date_style.format(data.range.start),
            options.date_style.format(data.range.end)
        ));
        report.push_str(&format!("Total spent: {}{:.2}\n", symbol, data.total_amount));
        report.push_str(&format!("Expenses: {}\n\n", data.expenses.len()));

        report.push_str("SUMMARY BY CATEGORY\n");
        report.push_str(&format!("{}\n", "-".repeat(50)));
        for total in category_totals(&data.expenses) {
            report.push_str(&format!(
                "{:<30}{:>12}  {:>5.1}%\n",
                self.category_name(data, &total.category_id),
                format!("{}{:.2}", symbol, total.total_amount),
                total.percentage,
            ));
        }
        report.push('\n');

        report.push_str("DETAILED TRANSACTIONS\n");
        report.push_str(&format!("{}\n", "-".repeat(50)));
        let mut expenses = data.expenses.clone();
        expenses.sort_by(|a, b| a.date.cmp(&b.date));
        for expense in &expenses {
            report.push_str(&format!(
                "{}  {:<25}{:>12}  {}\n",
                options.date_style.format(expense.date),
                self.category_name(data, &expense.category_id),
                format!("{}{:.2}", symbol, expense.amount),
                expense.description.as_deref().unwrap_or(""),
            ));
        }

        report.push_str(&format!(
            "\nGenerated {}\n",
            Utc::now().format("%Y-%m-%d %H:%M UTC")
        ));
        report
    }

    /// `expense-report-2025-06-01-to-2025-06-30.csv`
    pub fn export_file_name(&self, range: DateRange, format: ExportFormat) -> String {
        format!(
            "expense-report-{}-to-{}.{}",
            range.start.format("%Y-%m-%d"),
            range.end.format("%Y-%m-%d"),
            format.extension()
        )
    }

    /// Write an export to `custom_path` (a directory), or to the user's
    /// Documents folder when none is given.
    pub fn export_to_path(
        &self,
        data: &ExportData,
        format: ExportFormat,
        options: &ExportOptions,
        custom_path: Option<&str>,
    ) -> Result<ExportOutcome> {
        let export_dir = match custom_path {
            Some(path) if !path.trim().is_empty() => {
                std::path::PathBuf::from(self.sanitize_path(path))
            }
            _ => match dirs::document_dir().or_else(dirs::home_dir) {
                Some(dir) => dir,
                None => {
                    error!("Could not determine default export directory");
                    return Ok(ExportOutcome {
                        success: false,
                        message: "Failed to determine export directory".to_string(),
                        file_path: String::new(),
                        expense_count: 0,
                    });
                }
            },
        };

        let content = match format {
            ExportFormat::Csv => self.generate_csv(data, options),
            ExportFormat::Text => self.generate_report(data, options),
        };
        let file_path = export_dir.join(self.export_file_name(data.range, format));

        if let Err(e) = fs::create_dir_all(&export_dir) {
            error!("Failed to create export directory {:?}: {}", export_dir, e);
            return Ok(ExportOutcome {
                success: false,
                message: format!("Failed to create export directory: {}", e),
                file_path: export_dir.to_string_lossy().to_string(),
                expense_count: 0,
            });
        }

        match fs::write(&file_path, &content) {
            Ok(_) => {
                let file_path_str = file_path.to_string_lossy().to_string();
                info!(
                    "Exported {} expense(s) to {}",
                    data.expenses.len(),
                    file_path_str
                );
                Ok(ExportOutcome {
                    success: true,
                    message: format!("File exported successfully to: {}", file_path_str),
                    file_path: file_path_str,
                    expense_count: data.expenses.len(),
                })
            }
            Err(e) => {
                error!("Failed to write export file to {:?}: {}", file_path, e);
                Ok(ExportOutcome {
                    success: false,
                    message: format!("Failed to write export file: {}", e),
                    file_path: file_path.to_string_lossy().to_string(),
                    expense_count: 0,
                })
            }
        }
    }

    fn category_name<'a>(&self, data: &'a ExportData, category_id: &str) -> &'a str {
        data.categories
            .iter()
            .find(|c| c.id == category_id)
            .map(|c| c.name.as_str())
            .unwrap_or("Uncategorized")
    }

    /// Basic path sanitization to handle common user input issues
    fn sanitize_path(&self, path: &str) -> String {
        let mut cleaned = path.trim().to_string();

        // Remove surrounding quotes (single or double). A lone quote matches
        // both starts_with and ends_with on the same byte, so only strip when
        // there is an actual pair.
        if cleaned.len() >= 2
            && ((cleaned.starts_with('"') && cleaned.ends_with('"'))
                || (cleaned.starts_with('\'') && cleaned.ends_with('\'')))
        {
            cleaned = cleaned[1..cleaned.len() - 1].to_string();
        }
        cleaned = cleaned.trim().to_string();

        // Handle escaped spaces (common on some systems)
        cleaned = cleaned.replace("\\ ", " ");

        // Remove any trailing slashes/backslashes
        while cleaned.ends_with('/') || cleaned.ends_with('\\') {
            cleaned.pop();
        }

        // Handle tilde expansion for home directory
        if cleaned.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                if cleaned == "~" {
                    cleaned = home.to_string_lossy().to_string();
                } else if cleaned.starts_with("~/") || cleaned.starts_with("~\\") {
                    cleaned = home.join(&cleaned[2..]).to_string_lossy().to_string();
                }
            }
        }

        cleaned
    }
}

fn csv_escape(value: &str) -> String {
    value.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_data() -> ExportData {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 30, 23, 59, 59).unwrap(),
        );
        let expenses = vec![
            Expense::new(
                "alice",
                120.0,
                "cat-food",
                Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
                Some("Groceries \"weekly\"".to_string()),
            ),
            Expense::new(
                "alice",
                80.0,
                "cat-travel",
                Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap(),
                None,
            ),
        ];
        let total_amount = sum_amounts(&expenses);
        ExportData {
            expenses,
            categories: vec![
                Category::default_entry("cat-food", "Food", "restaurant", "#FF6B6B"),
                Category::default_entry("cat-travel", "Travel", "car", "#4ECDC4"),
            ],
            range,
            total_amount,
        }
    }

    #[test]
    fn csv_is_chronological_with_escaped_quotes() {
        let service = ExportService::new();
        let csv = service.generate_csv(&sample_data(), &ExportOptions::default());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Date,Amount,Category,Description");
        assert!(lines[1].starts_with("06/03/2025"), "oldest expense first: {}", lines[1]);
        assert!(lines[1].contains("\"₦80.00\""));
        assert!(lines[2].contains("Groceries \"\"weekly\"\""));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn csv_headers_can_be_disabled() {
        let service = ExportService::new();
        let options = ExportOptions { include_headers: false, ..Default::default() };
        let csv = service.generate_csv(&sample_data(), &options);
        assert!(!csv.starts_with("Date,"));
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn report_carries_summary_totals_and_details() {
        let service = ExportService::new();
        let options = ExportOptions { date_style: DateStyle::Long, ..Default::default() };
        let report = service.generate_report(&sample_data(), &options);

        assert!(report.contains("EXPENSE REPORT"));
        assert!(report.contains("Total spent: ₦200.00"));
        assert!(report.contains("SUMMARY BY CATEGORY"));
        assert!(report.contains("60.0%")); // food share
        assert!(report.contains("DETAILED TRANSACTIONS"));
        assert!(report.contains("June 15, 2025"));
    }

    #[test]
    fn file_names_embed_range_and_format() {
        let service = ExportService::new();
        let data = sample_data();
        assert_eq!(
            service.export_file_name(data.range, ExportFormat::Csv),
            "expense-report-2025-06-01-to-2025-06-30.csv"
        );
        assert_eq!(
            service.export_file_name(data.range, ExportFormat::Text),
            "expense-report-2025-06-01-to-2025-06-30.txt"
        );
    }

    #[test]
    fn validation_flags_empty_ranges_and_orphaned_categories() {
        let service = ExportService::new();
        let mut data = sample_data();
        assert!(service.validate_export_data(&data).is_empty());

        data.expenses[0].category_id = "missing".to_string();
        let problems = service.validate_export_data(&data);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("unknown category"));

        data.expenses.clear();
        assert!(service
            .validate_export_data(&data)
            .iter()
            .any(|p| p.contains("No expenses")));
    }

    #[test]
    fn export_to_path_writes_the_file() -> Result<()> {
        let service = ExportService::new();
        let temp_dir = TempDir::new()?;
        let outcome = service.export_to_path(
            &sample_data(),
            ExportFormat::Csv,
            &ExportOptions::default(),
            Some(&temp_dir.path().to_string_lossy()),
        )?;

        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.expense_count, 2);
        let written = fs::read_to_string(&outcome.file_path)?;
        assert!(written.starts_with("Date,Amount,Category,Description"));
        Ok(())
    }

    #[test]
    fn sanitize_path_handles_quotes_spaces_and_tilde() {
        let service = ExportService::new();
        assert_eq!(service.sanitize_path("  /path/to/dir  "), "/path/to/dir");
        assert_eq!(service.sanitize_path("/path\\ to\\ dir"), "/path to dir");
        assert_eq!(service.sanitize_path("/path/to/dir/"), "/path/to/dir");
        assert_eq!(service.sanitize_path("\"/quoted/dir\""), "/quoted/dir");

        let home = dirs::home_dir().unwrap();
        assert_eq!(
            service.sanitize_path("~/Documents"),
            home.join("Documents").to_string_lossy().to_string()
        );
    }

    #[test]
    fn sanitize_path_keeps_a_lone_quote_intact() {
        let service = ExportService::new();
        assert_eq!(service.sanitize_path("\""), "\"");
        assert_eq!(service.sanitize_path("'"), "'");
        assert_eq!(service.sanitize_path("  \"  "), "\"");
    }

    #[test]
    fn export_to_path_survives_a_lone_quote_path() -> Result<()> {
        let service = ExportService::new();
        let outcome = service.export_to_path(
            &sample_data(),
            ExportFormat::Csv,
            &ExportOptions::default(),
            Some("\""),
        )?;
        // A bare quote must come back as an outcome, never a slice panic.
        // It sanitizes to a relative directory literally named `"`.
        assert!(!outcome.message.is_empty());
        if outcome.success {
            let _ = fs::remove_dir_all("\"");
        }
        Ok(())
    }
}
