//! WebAssembly module for the Courier Logistics booking desk
//!
//! Runs the shared lifecycle engine in the browser so the desk can:
//! - Preview what a manifest will move before submitting it
//! - Recompute a shipment's status after local edits
//! - Check quantity conservation on offline drafts
//! - Validate document and vehicle numbers as they are typed

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{
    check_conservation, derive_status, move_to_transit, normalize_type, returnable_quantity,
    FiscalYear, ManifestConsignment,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

fn parse_shipment(shipment_json: &str) -> Result<Shipment, String> {
    serde_json::from_str(shipment_json).map_err(|e| format!("Invalid shipment JSON: {}", e))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestPreview {
    consignment: ManifestConsignment,
    shipment: Shipment,
}

fn manifest_preview(shipment_json: &str, manifest_number: &str) -> Result<String, String> {
    let mut shipment = parse_shipment(shipment_json)?;
    let consignment = move_to_transit(&mut shipment, manifest_number).map_err(|e| e.to_string())?;
    serde_json::to_string(&ManifestPreview {
        consignment,
        shipment,
    })
    .map_err(|e| e.to_string())
}

/// Shipment and manifest copy as they would look after manifesting
#[wasm_bindgen]
pub fn preview_manifest(shipment_json: &str, manifest_number: &str) -> Result<String, JsValue> {
    manifest_preview(shipment_json, manifest_number).map_err(to_js)
}

fn status_of(shipment_json: &str) -> Result<String, String> {
    let shipment = parse_shipment(shipment_json)?;
    Ok(derive_status(&shipment).as_str().to_string())
}

/// Status the server would assign to the shipment's current counters
#[wasm_bindgen]
pub fn shipment_status(shipment_json: &str) -> Result<String, JsValue> {
    status_of(shipment_json).map_err(to_js)
}

fn conservation_of(shipment_json: &str) -> Result<Option<String>, String> {
    let shipment = parse_shipment(shipment_json)?;
    Ok(check_conservation(&shipment).err().map(|e| e.to_string()))
}

/// `undefined` when every line balances, otherwise the first violation
#[wasm_bindgen]
pub fn conservation_error(shipment_json: &str) -> Result<Option<String>, JsValue> {
    conservation_of(shipment_json).map_err(to_js)
}

fn returnable_of(shipment_json: &str) -> Result<String, String> {
    let shipment = parse_shipment(shipment_json)?;
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for line in shipment.products() {
        *totals.entry(normalize_type(&line.product_type)).or_default() +=
            returnable_quantity(line);
    }
    serde_json::to_string(&totals).map_err(|e| e.to_string())
}

/// Quantity per product type a return booking would carry
#[wasm_bindgen]
pub fn returnable_quantities(shipment_json: &str) -> Result<String, JsValue> {
    returnable_of(shipment_json).map_err(to_js)
}

fn fiscal_label(date: &str, start_month: u32) -> Result<String, String> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date {}: {}", date, e))?;
    Ok(FiscalYear::containing(date, start_month).label())
}

/// Fiscal year label ("2024-25") for an ISO date
#[wasm_bindgen]
pub fn fiscal_year_label(date: &str, start_month: u32) -> Result<String, JsValue> {
    fiscal_label(date, start_month).map_err(to_js)
}

/// Validation message for a consignment or manifest number, if any
#[wasm_bindgen]
pub fn document_number_error(number: &str) -> Option<String> {
    validate_document_number(number).err().map(str::to_string)
}

/// Validation message for a vehicle registration, if any
#[wasm_bindgen]
pub fn vehicle_number_error(vehicle: &str) -> Option<String> {
    validate_vehicle_number(vehicle).err().map(str::to_string)
}
