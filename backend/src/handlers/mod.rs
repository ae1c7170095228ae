//! HTTP handlers

pub mod health;
pub mod manifest;
pub mod reporting;
pub mod sequence;
pub mod shipment;

pub use health::health_check;
pub use manifest::{
    cancel_manifests, create_manifest, deliver_manifests, get_manifest, list_manifests,
};
pub use reporting::get_billing_summary;
pub use sequence::next_consignment_number;
pub use shipment::{
    book_shipment, cancel_shipment, deliver_items, get_shipment, list_shipments, mark_invoiced,
    return_shipment, update_shipment,
};
