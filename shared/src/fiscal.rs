//! Fiscal years and document numbering

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default fiscal year start (April)
pub const DEFAULT_FISCAL_START_MONTH: u32 = 4;

/// A fiscal year identified by the calendar year it starts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalYear {
    pub start_year: i32,
    pub start_month: u32,
}

impl FiscalYear {
    /// Fiscal year containing `date`
    pub fn containing(date: NaiveDate, start_month: u32) -> Self {
        let start_month = start_month.clamp(1, 12);
        let start_year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };
        Self {
            start_year,
            start_month,
        }
    }

    /// Parse a "2024-25" style label
    pub fn parse(label: &str, start_month: u32) -> Option<Self> {
        let (start, end) = label.trim().split_once('-')?;
        let start_year: i32 = start.parse().ok()?;
        let end_suffix: i32 = end.parse().ok()?;
        if start_month != 1 && (start_year + 1) % 100 != end_suffix % 100 {
            return None;
        }
        Some(Self {
            start_year,
            start_month: start_month.clamp(1, 12),
        })
    }

    /// "2024-25"; a January-start year is labelled "2024-24"
    pub fn label(&self) -> String {
        let end_year = if self.start_month == 1 {
            self.start_year
        } else {
            self.start_year + 1
        };
        format!("{}-{:02}", self.start_year, end_year % 100)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year, self.start_month, 1)
            .unwrap_or(NaiveDate::MIN)
    }

    /// First day of the following fiscal year (exclusive bound)
    pub fn next_first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.start_year + 1, self.start_month, 1)
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date < self.next_first_day()
    }
}

impl std::fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Sequence kinds kept per branch and fiscal year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Consignment,
    Manifest,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Consignment => "consignment",
            SequenceKind::Manifest => "manifest",
        }
    }
}

/// Consignment number, e.g. "DEL/2024-25/00042"
pub fn format_consignment_number(branch: &str, fiscal_year: &FiscalYear, sequence: i64) -> String {
    format!("{}/{}/{:05}", branch, fiscal_year.label(), sequence)
}

/// Manifest number, e.g. "M/DEL/2024-25/0007"
pub fn format_manifest_number(branch: &str, fiscal_year: &FiscalYear, sequence: i64) -> String {
    format!("M/{}/{}/{:04}", branch, fiscal_year.label(), sequence)
}

/// Consignment number for goods returned to a branch
pub fn branch_return_number(original: &str, branch: &str) -> String {
    format!("{}/{}/R", original, branch)
}
