//! HTTP handlers for consignment endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{PaginatedResponse, Shipment};

use crate::error::AppResult;
use crate::middleware::Scope;
use crate::services::lifecycle::{ReturnInput, ReturnResult};
use crate::services::shipment::{
    BookShipmentInput, CancelShipmentInput, DeliveryRecord, DirectDeliveryInput, ShipmentQuery,
    UpdateShipmentInput,
};
use crate::services::{BatchReport, LifecycleService, ShipmentService};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSelection {
    #[serde(default)]
    pub consignment_numbers: Vec<String>,
}

/// Book a consignment
pub async fn book_shipment(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<BookShipmentInput>,
) -> AppResult<(StatusCode, Json<Shipment>)> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let shipment = service.book(&scope, input).await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// List consignments in scope
pub async fn list_shipments(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Query(query): Query<ShipmentQuery>,
) -> AppResult<Json<PaginatedResponse<Shipment>>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let shipments = service.list(&scope, query).await?;
    Ok(Json(shipments))
}

/// Get a consignment by number
pub async fn get_shipment(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(number): Path<String>,
) -> AppResult<Json<Shipment>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let shipment = service.get(&scope, &number).await?;
    Ok(Json(shipment))
}

/// Edit a consignment
pub async fn update_shipment(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(number): Path<String>,
    Json(input): Json<UpdateShipmentInput>,
) -> AppResult<Json<Shipment>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let shipment = service.update(&scope, &number, input).await?;
    Ok(Json(shipment))
}

/// Soft-cancel a consignment
pub async fn cancel_shipment(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(number): Path<String>,
    Json(input): Json<CancelShipmentInput>,
) -> AppResult<Json<Shipment>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let shipment = service.cancel(&scope, &number, input).await?;
    Ok(Json(shipment))
}

/// Book the return of a consignment
pub async fn return_shipment(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Path(number): Path<String>,
    Json(input): Json<ReturnInput>,
) -> AppResult<(StatusCode, Json<ReturnResult>)> {
    let service = LifecycleService::new(state.stores, state.config.lifecycle.clone());
    let result = service.return_consignment(&scope, &number, input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Record deliveries made outside a manifest
pub async fn deliver_items(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<Vec<DirectDeliveryInput>>,
) -> AppResult<Json<BatchReport<DeliveryRecord>>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let report = service.deliver_items(&scope, input).await?;
    Ok(Json(report))
}

/// Move delivered consignments to Invoiced
pub async fn mark_invoiced(
    State(state): State<AppState>,
    Scope(scope): Scope,
    Json(input): Json<InvoiceSelection>,
) -> AppResult<Json<BatchReport<Shipment>>> {
    let service = ShipmentService::new(state.stores, state.config.lifecycle.clone());
    let report = service
        .mark_invoiced(&scope, input.consignment_numbers)
        .await?;
    Ok(Json(report))
}
