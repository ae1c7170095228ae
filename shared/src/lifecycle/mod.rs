//! Shipment lifecycle engine
//!
//! Pure quantity bookkeeping for a consignment's product lines as they move
//! `instock` -> `intransitstock` -> `deliveredstock`, and back again on
//! cancellation. Nothing here performs I/O: the backend loads documents,
//! calls these functions, and persists the results.
//!
//! Manifest and shipment documents are reconciled through a
//! [`QuantityLedger`], keyed by product type with the stable line id as a
//! first-choice match. Each applied ledger group leaves an idempotency key on
//! the shipment so a retried update is a no-op.

mod error;
mod ledger;
mod returns;
mod transitions;

pub use error::LifecycleError;
pub use ledger::{
    apply_ledger, normalize_type, transition_key, ApplyOutcome, LedgerEntry, Movement,
    QuantityLedger, TransitionOp,
};
pub use returns::{
    build_return, check_returnable, mark_returned, returnable_quantity, ReturnMode,
};
pub use transitions::{
    apply_cancellation, apply_delivery, apply_direct_delivery, book, cancel_on_manifest,
    cancel_shipment, cancellation_ledger, check_conservation, deliver_on_manifest,
    derive_status, mark_invoiced, move_to_transit, refresh_status,
};
