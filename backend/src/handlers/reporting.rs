//! Reporting handlers for billing summaries and CSV export

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::Scope;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Deserialize)]
pub struct BillingQuery {
    /// "2024-25"; the current fiscal year when absent
    pub fiscal_year: Option<String>,
    pub format: Option<String>, // "json" or "csv"
}

/// Per-consignor billing summary for a fiscal year
pub async fn get_billing_summary(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Query(query): Query<BillingQuery>,
) -> AppResult<Response> {
    let service = ReportingService::new(state.stores.clone(), &state.config.lifecycle);
    let fiscal_year = match query.fiscal_year {
        Some(label) => label,
        None => shared::FiscalYear::containing(
            Utc::now().date_naive(),
            state.config.lifecycle.fiscal_year_start_month,
        )
        .label(),
    };

    let data = service.billing_summary(&scope, &fiscal_year).await?;

    if query.format.as_deref() == Some("csv") {
        let csv = ReportingService::export_to_csv(&data)?;
        let disposition = format!("attachment; filename=\"billing_{}.csv\"", fiscal_year);
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response());
    }

    Ok(Json(data).into_response())
}
