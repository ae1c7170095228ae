//! Domain models for the Courier Logistics Service

mod manifest;
mod shipment;

pub use manifest::*;
pub use shipment::*;
