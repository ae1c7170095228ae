//! Route definitions for the Courier Logistics Service

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/shipments", shipment_routes())
        .nest("/manifests", manifest_routes())
        .nest("/sequences", sequence_routes())
        .nest("/reports", report_routes())
}

/// Consignment routes.
///
/// Document numbers contain `/`; clients percent-encode them (`%2F`) in paths.
fn shipment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_shipments).post(handlers::book_shipment),
        )
        // Batch endpoints before the catch-all number route
        .route("/deliver", post(handlers::deliver_items))
        .route("/invoice", post(handlers::mark_invoiced))
        .route(
            "/:number",
            get(handlers::get_shipment).put(handlers::update_shipment),
        )
        .route("/:number/cancel", post(handlers::cancel_shipment))
        .route("/:number/return", post(handlers::return_shipment))
}

/// Manifest routes
fn manifest_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_manifests).post(handlers::create_manifest),
        )
        .route("/deliver", post(handlers::deliver_manifests))
        .route("/cancel", post(handlers::cancel_manifests))
        .route("/:number", get(handlers::get_manifest))
}

fn sequence_routes() -> Router<AppState> {
    Router::new().route("/consignment", get(handlers::next_consignment_number))
}

fn report_routes() -> Router<AppState> {
    Router::new().route("/billing", get(handlers::get_billing_summary))
}
