//! Return bookings

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::LifecycleError;
use crate::models::{Invoice, ProductLine, Shipment, ShipmentStatus};

/// How goods come back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnMode {
    /// Back to the origin branch; numbered `<original>/<branch>/R`
    Branch,
    /// Customer sends goods back; new sequence number, parties swapped
    Customer,
}

/// Units on a line that can travel back: everything not currently in transit
pub fn returnable_quantity(line: &ProductLine) -> Decimal {
    line.instock + line.deliveredstock
}

/// Reject returns of cancelled or already returned bookings and of
/// bookings with stock still on a manifest.
pub fn check_returnable(original: &Shipment) -> Result<(), LifecycleError> {
    if matches!(
        original.shipment_status,
        ShipmentStatus::Returned | ShipmentStatus::Cancelled
    ) {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment: original.consignment_number.clone(),
            status: original.shipment_status,
            action: "return",
        });
    }
    if original.total_in_transit() > Decimal::ZERO {
        return Err(LifecycleError::StockInTransit(
            original.consignment_number.clone(),
        ));
    }
    Ok(())
}

/// Build the new booking for a return of `original`.
///
/// Charges are cloned. Each product line carries its returnable quantity
/// under a fresh line id, all of it in stock.
pub fn build_return(
    original: &Shipment,
    mode: ReturnMode,
    new_number: String,
    branch: &str,
    now: DateTime<Utc>,
) -> Result<Shipment, LifecycleError> {
    check_returnable(original)?;

    let invoices: Vec<Invoice> = original
        .invoices
        .iter()
        .filter_map(|invoice| {
            let products: Vec<ProductLine> = invoice
                .products
                .iter()
                .filter_map(|line| {
                    let qty = returnable_quantity(line);
                    (qty > Decimal::ZERO).then(|| ProductLine {
                        line_id: Uuid::new_v4(),
                        product_type: line.product_type.clone(),
                        amount: qty,
                        instock: qty,
                        intransitstock: Decimal::ZERO,
                        deliveredstock: Decimal::ZERO,
                    })
                })
                .collect();
            (!products.is_empty()).then(|| Invoice {
                invoice_number: invoice.invoice_number.clone(),
                invoice_value: invoice.invoice_value,
                products,
            })
        })
        .collect();

    if invoices.is_empty() {
        return Err(LifecycleError::NothingToReturn(
            original.consignment_number.clone(),
        ));
    }

    let (consignor, consignee, pickup_address, delivery_address) = match mode {
        ReturnMode::Branch => (
            original.consignor.clone(),
            original.consignee.clone(),
            original.pickup_address.clone(),
            original.delivery_address.clone(),
        ),
        ReturnMode::Customer => (
            original.consignee.clone(),
            original.consignor.clone(),
            original.delivery_address.clone(),
            original.pickup_address.clone(),
        ),
    };

    Ok(Shipment {
        consignment_number: new_number,
        branch: branch.to_string(),
        username: original.username.clone(),
        email: original.email.clone(),
        booking_date: now.date_naive(),
        shipment_status: ShipmentStatus::Pending,
        cancel_reason: None,
        consignor,
        consignee,
        billing_address: original.billing_address.clone(),
        pickup_address,
        delivery_address,
        charges: original.charges.clone(),
        invoices,
        applied_transitions: BTreeSet::new(),
        return_of: Some(original.consignment_number.clone()),
        version: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Re-tag the original booking once its return exists
pub fn mark_returned(original: &mut Shipment) -> Result<(), LifecycleError> {
    check_returnable(original)?;
    original.shipment_status = ShipmentStatus::Returned;
    Ok(())
}
