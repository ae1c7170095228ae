//! Business logic services for the Courier Logistics Service

pub mod batch;
pub mod lifecycle;
pub mod manifest;
pub mod reporting;
pub mod sequence;
pub mod shipment;

pub use batch::{BatchFailure, BatchReport};
pub use lifecycle::LifecycleService;
pub use manifest::ManifestService;
pub use reporting::ReportingService;
pub use sequence::SequenceService;
pub use shipment::ShipmentService;
