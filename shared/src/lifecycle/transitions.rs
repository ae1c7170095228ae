//! Booking, manifesting, delivery and cancellation transitions

use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LifecycleError;
use super::ledger::{apply_ledger, transition_key, ApplyOutcome, Movement, QuantityLedger, TransitionOp};
use crate::models::{
    ManifestConsignment, ManifestInvoice, ManifestProduct, Shipment, ShipmentStatus,
};

/// Prepare a freshly booked shipment: every unit sits in `instock`
pub fn book(shipment: &mut Shipment) -> Result<(), LifecycleError> {
    let consignment = shipment.consignment_number.clone();
    if shipment.products().next().is_none() {
        return Err(LifecycleError::NoProducts(consignment));
    }

    for line in shipment.products_mut() {
        if line.product_type.trim().is_empty() {
            return Err(LifecycleError::InvalidProduct {
                consignment,
                reason: "product type is required".to_string(),
            });
        }
        if line.amount < Decimal::ZERO {
            return Err(LifecycleError::InvalidProduct {
                consignment,
                reason: format!("{} has a negative amount", line.product_type),
            });
        }
        if line.line_id.is_nil() {
            line.line_id = Uuid::new_v4();
        }
        line.instock = line.amount;
        line.intransitstock = Decimal::ZERO;
        line.deliveredstock = Decimal::ZERO;
    }

    shipment.cancel_reason = None;
    shipment.shipment_status = ShipmentStatus::Pending;
    Ok(())
}

/// Aggregate status implied by the quantity counters.
///
/// Invoiced, Returned and Cancelled are kept as they are.
pub fn derive_status(shipment: &Shipment) -> ShipmentStatus {
    if shipment.shipment_status.is_sticky() {
        return shipment.shipment_status;
    }

    let delivered = shipment.total_delivered();
    let in_transit = shipment.total_in_transit();

    if delivered > Decimal::ZERO && shipment.products().all(|p| p.is_fully_delivered()) {
        ShipmentStatus::Delivered
    } else if in_transit > Decimal::ZERO {
        ShipmentStatus::InTransit
    } else if delivered > Decimal::ZERO {
        ShipmentStatus::PartiallyDelivered
    } else {
        ShipmentStatus::Pending
    }
}

pub fn refresh_status(shipment: &mut Shipment) {
    shipment.shipment_status = derive_status(shipment);
}

/// Move every in-stock unit of `shipment` onto manifest `manifest_number`.
///
/// Returns the consignment copy the manifest stores, with `manifestQty` set
/// to the quantity moved per line. Lines with nothing in stock are left off.
pub fn move_to_transit(
    shipment: &mut Shipment,
    manifest_number: &str,
) -> Result<ManifestConsignment, LifecycleError> {
    let consignment = shipment.consignment_number.clone();

    if shipment.shipment_status.is_sticky() || shipment.shipment_status == ShipmentStatus::Delivered
    {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment,
            status: shipment.shipment_status,
            action: "manifest",
        });
    }
    if shipment.total_instock() <= Decimal::ZERO {
        return Err(LifecycleError::NothingInStock(consignment));
    }

    let prefix = transition_key(TransitionOp::Dispatch, manifest_number, &consignment);
    if let Some(key) = shipment
        .applied_transitions
        .iter()
        .find(|k| k.starts_with(&format!("{}:", prefix)))
    {
        return Err(LifecycleError::AlreadyApplied(key.clone()));
    }

    for line in shipment.products_mut().filter(|l| l.line_id.is_nil()) {
        line.line_id = Uuid::new_v4();
    }

    let mut ledger = QuantityLedger::new();
    for line in shipment.products() {
        ledger.record(Some(line.line_id), &line.product_type, line.instock);
    }
    apply_ledger(shipment, &ledger, Movement::Dispatch, &prefix);

    let invoices = shipment
        .invoices
        .iter()
        .filter_map(|invoice| {
            let products: Vec<ManifestProduct> = invoice
                .products
                .iter()
                .filter_map(|line| {
                    let moved = ledger
                        .entries()
                        .iter()
                        .find(|e| e.line_id == Some(line.line_id))
                        .map(|e| e.qty)?;
                    Some(ManifestProduct {
                        line_id: line.line_id,
                        product_type: line.product_type.clone(),
                        amount: line.amount,
                        manifest_qty: moved,
                        instock: line.instock,
                        intransitstock: moved,
                        deliveredstock: line.deliveredstock,
                    })
                })
                .collect();
            (!products.is_empty()).then(|| ManifestInvoice {
                invoice_number: invoice.invoice_number.clone(),
                products,
            })
        })
        .collect();

    refresh_status(shipment);

    Ok(ManifestConsignment {
        consignment_number: consignment,
        consignor_name: shipment.consignor.name.clone(),
        consignee_name: shipment.consignee.name.clone(),
        invoices,
        fully_delivered: false,
    })
}

/// Deliver the manifest's copy of a consignment.
///
/// Per product: the in-transit quantity becomes delivered and is recorded as
/// the new `manifestQty`. Returns the ledger to post to the shipment. A second
/// call finds nothing in transit and returns an empty ledger.
pub fn deliver_on_manifest(consignment: &mut ManifestConsignment) -> QuantityLedger {
    let mut ledger = QuantityLedger::new();

    for product in consignment.products_mut() {
        let delivered_qty = product.intransitstock.max(Decimal::ZERO);
        product.deliveredstock += delivered_qty;
        product.manifest_qty = delivered_qty;
        product.intransitstock = Decimal::ZERO;
        ledger.record(Some(product.line_id), &product.product_type, delivered_qty);
    }

    let fully_delivered = consignment.products().all(|p| {
        p.deliveredstock >= p.amount
            || (p.instock == Decimal::ZERO && p.intransitstock == Decimal::ZERO)
    });
    consignment.fully_delivered = fully_delivered;

    ledger
}

/// Quantities a manifest moved, to be reverted on cancellation.
///
/// Products already delivered on this manifest hold nothing in transit and
/// are left out.
pub fn cancellation_ledger(consignment: &ManifestConsignment) -> QuantityLedger {
    let mut ledger = QuantityLedger::new();
    for product in consignment.products() {
        if product.intransitstock > Decimal::ZERO {
            ledger.record(Some(product.line_id), &product.product_type, product.manifest_qty);
        }
    }
    ledger
}

/// Cancel the manifest's copy of a consignment and return the ledger to revert
pub fn cancel_on_manifest(consignment: &mut ManifestConsignment) -> QuantityLedger {
    let ledger = cancellation_ledger(consignment);
    for product in consignment.products_mut() {
        if product.intransitstock > Decimal::ZERO {
            product.instock += product.manifest_qty;
            product.intransitstock = Decimal::ZERO;
        }
    }
    ledger
}

/// Post a manifest delivery to the shipment: intransitstock -> deliveredstock
pub fn apply_delivery(
    shipment: &mut Shipment,
    manifest_number: &str,
    ledger: &QuantityLedger,
) -> Result<ApplyOutcome, LifecycleError> {
    if matches!(
        shipment.shipment_status,
        ShipmentStatus::Cancelled | ShipmentStatus::Returned
    ) {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment: shipment.consignment_number.clone(),
            status: shipment.shipment_status,
            action: "deliver",
        });
    }

    let prefix = transition_key(
        TransitionOp::Deliver,
        manifest_number,
        &shipment.consignment_number,
    );
    let outcome = apply_ledger(shipment, ledger, Movement::Deliver, &prefix);
    refresh_status(shipment);
    Ok(outcome)
}

/// Post a delivery that did not go through a manifest (bulk deliver endpoint)
pub fn apply_direct_delivery(
    shipment: &mut Shipment,
    reference: &str,
    ledger: &QuantityLedger,
) -> Result<ApplyOutcome, LifecycleError> {
    if shipment.shipment_status.is_sticky() {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment: shipment.consignment_number.clone(),
            status: shipment.shipment_status,
            action: "deliver",
        });
    }

    let prefix = transition_key(
        TransitionOp::DirectDeliver,
        reference,
        &shipment.consignment_number,
    );
    let outcome = apply_ledger(shipment, ledger, Movement::Deliver, &prefix);
    refresh_status(shipment);
    Ok(outcome)
}

/// Post a manifest cancellation to the shipment: intransitstock -> instock.
///
/// Always accepted so it can serve as a compensating step.
pub fn apply_cancellation(
    shipment: &mut Shipment,
    manifest_number: &str,
    ledger: &QuantityLedger,
) -> ApplyOutcome {
    let prefix = transition_key(
        TransitionOp::Cancel,
        manifest_number,
        &shipment.consignment_number,
    );
    let outcome = apply_ledger(shipment, ledger, Movement::Revert, &prefix);
    refresh_status(shipment);
    outcome
}

/// Soft-cancel a booking that has not moved any stock
pub fn cancel_shipment(shipment: &mut Shipment, reason: Option<String>) -> Result<(), LifecycleError> {
    if shipment.shipment_status.is_sticky() {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment: shipment.consignment_number.clone(),
            status: shipment.shipment_status,
            action: "cancel",
        });
    }
    if shipment.has_moved_stock() {
        return Err(LifecycleError::StockInTransit(
            shipment.consignment_number.clone(),
        ));
    }

    shipment.shipment_status = ShipmentStatus::Cancelled;
    shipment.cancel_reason = reason.filter(|r| !r.trim().is_empty());
    Ok(())
}

/// Delivered -> Invoiced
pub fn mark_invoiced(shipment: &mut Shipment) -> Result<(), LifecycleError> {
    if shipment.shipment_status != ShipmentStatus::Delivered {
        return Err(LifecycleError::InvalidShipmentTransition {
            consignment: shipment.consignment_number.clone(),
            status: shipment.shipment_status,
            action: "invoice",
        });
    }
    shipment.shipment_status = ShipmentStatus::Invoiced;
    Ok(())
}

/// Check instock + intransitstock + deliveredstock == amount on every line
pub fn check_conservation(shipment: &Shipment) -> Result<(), LifecycleError> {
    for line in shipment.products() {
        if !line.is_conserved()
            || line.instock < Decimal::ZERO
            || line.intransitstock < Decimal::ZERO
            || line.deliveredstock < Decimal::ZERO
        {
            return Err(LifecycleError::ConservationViolated {
                consignment: shipment.consignment_number.clone(),
                product_type: line.product_type.clone(),
                accounted: line.accounted(),
                amount: line.amount,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::shipment_with_lines;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_book_moves_amount_into_stock() {
        let mut shipment = shipment_with_lines("C1", &[("Carton", 10)]);
        shipment.invoices[0].products[0].instock = Decimal::ZERO;
        shipment.invoices[0].products[0].line_id = Uuid::nil();

        book(&mut shipment).unwrap();

        let line = &shipment.invoices[0].products[0];
        assert_eq!(line.instock, dec(10));
        assert!(!line.line_id.is_nil());
        assert_eq!(shipment.shipment_status, ShipmentStatus::Pending);
    }

    #[test]
    fn test_book_rejects_empty_and_negative() {
        let mut empty = shipment_with_lines("C1", &[]);
        assert_eq!(book(&mut empty), Err(LifecycleError::NoProducts("C1".into())));

        let mut negative = shipment_with_lines("C2", &[("Box", -1)]);
        assert!(matches!(
            book(&mut negative),
            Err(LifecycleError::InvalidProduct { .. })
        ));
    }

    #[test]
    fn test_carton_manifest_then_deliver() {
        let mut shipment = shipment_with_lines("C1", &[("Carton", 10)]);

        let mut copy = move_to_transit(&mut shipment, "M1").unwrap();
        let line = &shipment.invoices[0].products[0];
        assert_eq!((line.instock, line.intransitstock), (dec(0), dec(10)));
        assert_eq!(shipment.shipment_status, ShipmentStatus::InTransit);
        assert_eq!(copy.invoices[0].products[0].manifest_qty, dec(10));

        let ledger = deliver_on_manifest(&mut copy);
        assert!(copy.fully_delivered);
        apply_delivery(&mut shipment, "M1", &ledger).unwrap();

        let line = &shipment.invoices[0].products[0];
        assert_eq!(line.intransitstock, dec(0));
        assert_eq!(line.deliveredstock, dec(10));
        assert_eq!(shipment.shipment_status, ShipmentStatus::Delivered);
    }

    #[test]
    fn test_manifest_then_cancel_restores_stock() {
        let mut shipment = shipment_with_lines("C1", &[("Carton", 10)]);
        let copy = move_to_transit(&mut shipment, "M1").unwrap();

        apply_cancellation(&mut shipment, "M1", &cancellation_ledger(&copy));

        let line = &shipment.invoices[0].products[0];
        assert_eq!((line.instock, line.intransitstock), (dec(10), dec(0)));
        assert_eq!(shipment.shipment_status, ShipmentStatus::Pending);
    }

    #[test]
    fn test_cancel_on_manifest_skips_delivered_copies() {
        let mut shipment = shipment_with_lines("C1", &[("Carton", 10)]);
        let mut copy = move_to_transit(&mut shipment, "M1").unwrap();

        let ledger = cancel_on_manifest(&mut copy);
        assert_eq!(ledger.total(), dec(10));
        assert_eq!(copy.invoices[0].products[0].instock, dec(10));
        assert!(cancel_on_manifest(&mut copy).is_empty());

        let mut delivered = move_to_transit(&mut shipment_with_lines("C2", &[("Box", 2)]), "M1").unwrap();
        deliver_on_manifest(&mut delivered);
        assert!(cancellation_ledger(&delivered).is_empty());
    }

    #[test]
    fn test_second_delivery_on_manifest_is_empty() {
        let mut shipment = shipment_with_lines("C1", &[("Carton", 10)]);
        let mut copy = move_to_transit(&mut shipment, "M1").unwrap();
        deliver_on_manifest(&mut copy);

        let again = deliver_on_manifest(&mut copy);
        assert!(again.is_empty());
        assert_eq!(copy.invoices[0].products[0].deliveredstock, dec(10));
        assert_eq!(copy.invoices[0].products[0].manifest_qty, dec(0));
    }

    #[test]
    fn test_partial_delivery_status() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 4), ("Bag", 6)]);
        let mut copy = move_to_transit(&mut shipment, "M1").unwrap();
        let bag = copy.invoices[0].products[1].line_id;
        copy.invoices[0].products.retain(|p| p.line_id != bag);

        let ledger = deliver_on_manifest(&mut copy);
        apply_delivery(&mut shipment, "M1", &ledger).unwrap();
        assert_eq!(shipment.shipment_status, ShipmentStatus::InTransit);

        let bag_ledger = QuantityLedger::from_type_quantities([("Bag", dec(6))]);
        apply_cancellation(&mut shipment, "M1", &bag_ledger);
        assert_eq!(shipment.shipment_status, ShipmentStatus::PartiallyDelivered);
    }

    #[test]
    fn test_manifest_rejects_empty_stock_and_duplicates() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 3)]);
        move_to_transit(&mut shipment, "M1").unwrap();
        assert_eq!(
            move_to_transit(&mut shipment, "M2"),
            Err(LifecycleError::NothingInStock("C1".into()))
        );

        let mut other = shipment_with_lines("C2", &[("Box", 3)]);
        other
            .applied_transitions
            .insert("dispatch:M1:C2:Box".to_string());
        assert!(matches!(
            move_to_transit(&mut other, "M1"),
            Err(LifecycleError::AlreadyApplied(_))
        ));
    }

    #[test]
    fn test_cancel_shipment_rules() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 3)]);
        cancel_shipment(&mut shipment, Some("Customer request".into())).unwrap();
        assert_eq!(shipment.shipment_status, ShipmentStatus::Cancelled);

        let mut moving = shipment_with_lines("C2", &[("Box", 3)]);
        move_to_transit(&mut moving, "M1").unwrap();
        assert_eq!(
            cancel_shipment(&mut moving, None),
            Err(LifecycleError::StockInTransit("C2".into()))
        );
    }

    #[test]
    fn test_mark_invoiced_requires_delivery() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 3)]);
        assert!(mark_invoiced(&mut shipment).is_err());
        shipment.shipment_status = ShipmentStatus::Delivered;
        mark_invoiced(&mut shipment).unwrap();
        assert_eq!(shipment.shipment_status, ShipmentStatus::Invoiced);
    }

    #[test]
    fn test_check_conservation_detects_drift() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 3)]);
        assert!(check_conservation(&shipment).is_ok());
        shipment.invoices[0].products[0].deliveredstock = dec(1);
        assert!(matches!(
            check_conservation(&shipment),
            Err(LifecycleError::ConservationViolated { .. })
        ));
    }
}
