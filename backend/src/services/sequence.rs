//! Consignment and manifest numbering per branch and fiscal year

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use shared::{
    format_consignment_number, format_manifest_number, validate_branch_code, FiscalYear,
    SequenceKind,
};

use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::store::{SequenceStore, Stores};

#[derive(Clone)]
pub struct SequenceService {
    sequences: Arc<dyn SequenceStore>,
    fiscal_start_month: u32,
}

/// A freshly allocated document number
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedNumber {
    pub number: String,
    pub branch: String,
    pub fiscal_year: String,
    pub sequence: i64,
}

impl SequenceService {
    pub fn new(stores: &Stores, lifecycle: &LifecycleConfig) -> Self {
        Self {
            sequences: stores.sequences.clone(),
            fiscal_start_month: lifecycle.fiscal_year_start_month,
        }
    }

    pub fn fiscal_year(&self, date: NaiveDate) -> FiscalYear {
        FiscalYear::containing(date, self.fiscal_start_month)
    }

    pub fn parse_fiscal_year(&self, label: &str) -> AppResult<FiscalYear> {
        FiscalYear::parse(label, self.fiscal_start_month)
            .ok_or_else(|| AppError::validation("fiscal_year", "expected a label like 2024-25"))
    }

    /// Allocate the next consignment number for `branch`
    pub async fn next_consignment_number(
        &self,
        branch: &str,
        date: NaiveDate,
    ) -> AppResult<AllocatedNumber> {
        self.allocate(branch, SequenceKind::Consignment, date).await
    }

    /// Allocate the next manifest number for `branch`
    pub async fn next_manifest_number(
        &self,
        branch: &str,
        date: NaiveDate,
    ) -> AppResult<AllocatedNumber> {
        self.allocate(branch, SequenceKind::Manifest, date).await
    }

    async fn allocate(
        &self,
        branch: &str,
        kind: SequenceKind,
        date: NaiveDate,
    ) -> AppResult<AllocatedNumber> {
        validate_branch_code(branch).map_err(|m| AppError::validation("branch", m))?;

        let fiscal_year = self.fiscal_year(date);
        let label = fiscal_year.label();
        let sequence = self.sequences.next_value(branch, kind, &label).await?;

        let number = match kind {
            SequenceKind::Consignment => format_consignment_number(branch, &fiscal_year, sequence),
            SequenceKind::Manifest => format_manifest_number(branch, &fiscal_year, sequence),
        };
        tracing::debug!("Allocated {} number {}", kind.as_str(), number);

        Ok(AllocatedNumber {
            number,
            branch: branch.to_string(),
            fiscal_year: label,
            sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> SequenceService {
        SequenceService::new(&Stores::in_memory(), &LifecycleConfig::default())
    }

    #[tokio::test]
    async fn test_numbers_increment_per_branch_and_kind() {
        let service = service();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let first = service.next_consignment_number("DEL", date).await.unwrap();
        let second = service.next_consignment_number("DEL", date).await.unwrap();
        let other = service.next_consignment_number("BOM", date).await.unwrap();
        let manifest = service.next_manifest_number("DEL", date).await.unwrap();

        assert_eq!(first.number, "DEL/2024-25/00001");
        assert_eq!(second.number, "DEL/2024-25/00002");
        assert_eq!(other.number, "BOM/2024-25/00001");
        assert_eq!(manifest.number, "M/DEL/2024-25/0001");
    }

    #[tokio::test]
    async fn test_sequence_restarts_in_new_fiscal_year() {
        let service = service();
        let march = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let april = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();

        service.next_consignment_number("DEL", march).await.unwrap();
        let next = service.next_consignment_number("DEL", april).await.unwrap();
        assert_eq!(next.fiscal_year, "2025-26");
        assert_eq!(next.sequence, 1);
    }

    #[tokio::test]
    async fn test_invalid_branch_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(service().next_consignment_number("", date).await.is_err());
    }
}
