//! HTTP handler for number allocation

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::LifecycleError;

use crate::error::AppResult;
use crate::middleware::Scope;
use crate::services::sequence::AllocatedNumber;
use crate::services::SequenceService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SequenceQuery {
    pub date: Option<NaiveDate>,
}

/// Allocate the next consignment number for the caller's branch
pub async fn next_consignment_number(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Query(query): Query<SequenceQuery>,
) -> AppResult<Json<AllocatedNumber>> {
    let branch = scope
        .branch
        .code()
        .ok_or(LifecycleError::BranchNotSelected)?;
    let service = SequenceService::new(&state.stores, &state.config.lifecycle);
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let allocated = service.next_consignment_number(branch, date).await?;
    Ok(Json(allocated))
}
