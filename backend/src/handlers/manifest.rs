//! HTTP handlers for manifest endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Manifest, PaginatedResponse};

use crate::error::AppResult;
use crate::middleware::Scope;
use crate::services::lifecycle::{
    CreateManifestInput, ManifestCreation, ManifestSelection, ManifestTransition,
};
use crate::services::manifest::ManifestQuery;
use crate::services::{BatchReport, LifecycleService, ManifestService};
use crate::AppState;

/// Load consignments onto a new manifest
pub async fn create_manifest(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<CreateManifestInput>,
) -> AppResult<(StatusCode, Json<ManifestCreation>)> {
    let service = LifecycleService::new(state.stores, state.config.lifecycle.clone());
    let creation = service.create_manifest(&scope, input).await?;
    let status = if creation.manifest.is_some() {
        StatusCode::CREATED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(creation)))
}

/// List manifests in scope
pub async fn list_manifests(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Query(query): Query<ManifestQuery>,
) -> AppResult<Json<PaginatedResponse<Manifest>>> {
    let service = ManifestService::new(state.stores);
    let manifests = service.list(&scope, query).await?;
    Ok(Json(manifests))
}

/// Get a manifest by number
pub async fn get_manifest(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(number): Path<String>,
) -> AppResult<Json<Manifest>> {
    let service = ManifestService::new(state.stores);
    let manifest = service.get(&scope, &number).await?;
    Ok(Json(manifest))
}

/// Mark manifests delivered
pub async fn deliver_manifests(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<ManifestSelection>,
) -> AppResult<Json<BatchReport<ManifestTransition>>> {
    let service = LifecycleService::new(state.stores, state.config.lifecycle.clone());
    let report = service.deliver_manifests(&scope, input).await?;
    Ok(Json(report))
}

/// Cancel manifests
pub async fn cancel_manifests(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<ManifestSelection>,
) -> AppResult<Json<BatchReport<ManifestTransition>>> {
    let service = LifecycleService::new(state.stores, state.config.lifecycle.clone());
    let report = service.cancel_manifests(&scope, input).await?;
    Ok(Json(report))
}
