//! Fiscal-year billing summaries and CSV export

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::{FiscalYear, RequestScope, ShipmentStatus};

use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::store::{ShipmentFilter, Stores};

#[derive(Clone)]
pub struct ReportingService {
    stores: Stores,
    fiscal_start_month: u32,
}

/// One consignor's billable work in a fiscal year
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummaryRow {
    pub fiscal_year: String,
    pub consignor_id: String,
    pub consignor_name: String,
    pub delivered_consignments: u64,
    pub invoiced_consignments: u64,
    pub delivered_quantity: Decimal,
    pub total_charges: Decimal,
}

impl ReportingService {
    pub fn new(stores: Stores, lifecycle: &LifecycleConfig) -> Self {
        Self {
            stores,
            fiscal_start_month: lifecycle.fiscal_year_start_month,
        }
    }

    /// Delivered and invoiced consignments booked in `fiscal_year`, grouped
    /// by consignor and ordered by consignor name
    pub async fn billing_summary(
        &self,
        scope: &RequestScope,
        fiscal_year: &str,
    ) -> AppResult<Vec<BillingSummaryRow>> {
        let year = FiscalYear::parse(fiscal_year, self.fiscal_start_month)
            .ok_or_else(|| AppError::validation("fiscal_year", "expected a label like 2024-25"))?;

        let filter = ShipmentFilter {
            branch: scope.branch.clone(),
            booked_from: Some(year.first_day()),
            booked_until: Some(year.next_first_day()),
            ..Default::default()
        };
        let shipments = self.stores.shipments.list_shipments(&filter).await?;

        let mut rows: BTreeMap<String, BillingSummaryRow> = BTreeMap::new();
        for shipment in shipments.iter().filter(|s| {
            matches!(
                s.shipment_status,
                ShipmentStatus::Delivered | ShipmentStatus::Invoiced
            )
        }) {
            let row = rows
                .entry(shipment.consignor.id.clone())
                .or_insert_with(|| BillingSummaryRow {
                    fiscal_year: year.label(),
                    consignor_id: shipment.consignor.id.clone(),
                    consignor_name: shipment.consignor.name.clone(),
                    delivered_consignments: 0,
                    invoiced_consignments: 0,
                    delivered_quantity: Decimal::ZERO,
                    total_charges: Decimal::ZERO,
                });

            match shipment.shipment_status {
                ShipmentStatus::Invoiced => row.invoiced_consignments += 1,
                _ => row.delivered_consignments += 1,
            }
            row.delivered_quantity += shipment.total_delivered();
            row.total_charges += shipment.total_charges();
        }

        let mut rows: Vec<BillingSummaryRow> = rows.into_values().collect();
        rows.sort_by(|a, b| {
            a.consignor_name
                .cmp(&b.consignor_name)
                .then_with(|| a.consignor_id.cmp(&b.consignor_id))
        });

        tracing::debug!(
            "Billing summary {} for {:?}: {} consignors",
            year,
            scope.branch,
            rows.len()
        );
        Ok(rows)
    }

    /// Export report data as CSV
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
