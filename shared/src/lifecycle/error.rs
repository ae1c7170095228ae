use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{ManifestOperation, ManifestStatus, ShipmentStatus};

/// Rule violations raised by the lifecycle engine
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LifecycleError {
    #[error("A specific branch must be selected")]
    BranchNotSelected,

    #[error("No consignments selected")]
    EmptySelection,

    #[error("Consignment {consignment} belongs to branch {owner}, not {requested}")]
    OutOfScope {
        consignment: String,
        owner: String,
        requested: String,
    },

    #[error("Consignment {0} has no product lines")]
    NoProducts(String),

    #[error("Consignment {consignment}: invalid product line: {reason}")]
    InvalidProduct { consignment: String, reason: String },

    #[error("Consignment {0} has nothing in stock to manifest")]
    NothingInStock(String),

    #[error("Consignment {0} still has goods in transit")]
    StockInTransit(String),

    #[error("Consignment {0} has nothing to return")]
    NothingToReturn(String),

    #[error("Cannot {action} consignment {consignment} in status {status}")]
    InvalidShipmentTransition {
        consignment: String,
        status: ShipmentStatus,
        action: &'static str,
    },

    #[error("Cannot {action} manifest {manifest} in status {status}")]
    InvalidManifestTransition {
        manifest: String,
        status: ManifestStatus,
        action: &'static str,
    },

    #[error("Manifest {manifest} is busy with a running {operation}")]
    ManifestBusy {
        manifest: String,
        operation: ManifestOperation,
    },

    #[error("Transition {0} was already applied")]
    AlreadyApplied(String),

    #[error(
        "Consignment {consignment}, {product_type}: counters sum to {accounted}, booked {amount}"
    )]
    ConservationViolated {
        consignment: String,
        product_type: String,
        accounted: Decimal,
        amount: Decimal,
    },
}
