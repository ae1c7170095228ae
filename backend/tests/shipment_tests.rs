//! Shipment service tests
//!
//! Booking, edits, soft cancellation, direct delivery and invoicing.

mod common;

use common::*;
use courier_backend::services::lifecycle::ReturnInput;
use courier_backend::services::shipment::{
    CancelShipmentInput, DeliveredItem, DirectDeliveryInput, InvoiceInput, ProductInput,
    ShipmentQuery, UpdateShipmentInput,
};
use courier_backend::AppError;
use shared::{
    check_conservation, Address, LifecycleError, RequestScope, ReturnMode, ShipmentStatus,
};

fn delivery(number: &str, reference: &str, items: &[(&str, i64)]) -> DirectDeliveryInput {
    DirectDeliveryInput {
        consignment_number: number.to_string(),
        reference: Some(reference.to_string()),
        items: items
            .iter()
            .map(|(t, qty)| DeliveredItem {
                product_type: t.to_string(),
                qty: dec(*qty),
            })
            .collect(),
    }
}

// ============================================================================
// Booking
// ============================================================================

#[cfg(test)]
mod booking_tests {
    use super::*;

    #[tokio::test]
    async fn test_booking_puts_everything_in_stock() {
        let s = services();
        let shipment = book(&s, &del(), "C1", &[("Box", 3), ("Bag", 7)]).await;

        assert_eq!(shipment.branch, "DEL");
        assert_eq!(shipment.version, 1);
        assert_eq!(shipment.shipment_status, ShipmentStatus::Pending);
        assert_eq!(
            counters(&shipment),
            vec![(dec(3), dec(0), dec(0)), (dec(7), dec(0), dec(0))]
        );
        assert!(shipment.products().all(|p| !p.line_id.is_nil()));
        assert!(check_conservation(&shipment).is_ok());
    }

    #[tokio::test]
    async fn test_booking_allocates_number_from_sequence() {
        let s = services();
        let mut input = booking("unused", &[("Box", 1)]);
        input.consignment_number = None;

        let shipment = s.shipments.book(&del(), input).await.unwrap();
        assert_eq!(shipment.consignment_number, "DEL/2024-25/00001");
    }

    #[tokio::test]
    async fn test_booking_requires_specific_branch() {
        let s = services();
        let err = s
            .shipments
            .book(&RequestScope::all_branches(), booking("C1", &[("Box", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Lifecycle(LifecycleError::BranchNotSelected)
        ));
    }

    #[tokio::test]
    async fn test_booking_rejects_bad_input() {
        let s = services();

        let mut no_invoices = booking("C1", &[("Box", 1)]);
        no_invoices.invoices.clear();
        assert!(matches!(
            s.shipments.book(&del(), no_invoices).await,
            Err(AppError::Validation { .. })
        ));

        let mut no_products = booking("C1", &[("Box", 1)]);
        no_products.invoices[0].products.clear();
        assert!(matches!(
            s.shipments.book(&del(), no_products).await,
            Err(AppError::Validation { field, .. }) if field == "products"
        ));

        let negative = booking("C2", &[("Box", -1)]);
        assert!(s.shipments.book(&del(), negative).await.is_err());

        let mut bad_address = booking("C3", &[("Box", 1)]);
        bad_address.delivery_address = Address {
            city: "Pune".to_string(),
            pincode: "41100".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            s.shipments.book(&del(), bad_address).await,
            Err(AppError::Validation { field, .. }) if field == "deliveryAddress"
        ));
    }

    #[tokio::test]
    async fn test_consignment_numbers_unique_across_branches() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 1)]).await;

        let err = s
            .shipments
            .book(&RequestScope::for_branch("BOM"), booking("C1", &[("Box", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEntry(_)));
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_filtered() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 1)]).await;
        book(&s, &del(), "C2", &[("Box", 1)]).await;
        book(&s, &RequestScope::for_branch("BOM"), "B1", &[("Box", 1)]).await;
        s.shipments
            .cancel(&del(), "C2", CancelShipmentInput { reason: None })
            .await
            .unwrap();

        let page = s.shipments.list(&del(), ShipmentQuery::default()).await.unwrap();
        assert_eq!(page.pagination.total_items, 2);

        let all = s
            .shipments
            .list(&RequestScope::all_branches(), ShipmentQuery::default())
            .await
            .unwrap();
        assert_eq!(all.pagination.total_items, 3);

        let cancelled = s
            .shipments
            .list(
                &del(),
                ShipmentQuery {
                    status: Some("Cancelled".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.data.len(), 1);
        assert_eq!(cancelled.data[0].consignment_number, "C2");
    }

    #[tokio::test]
    async fn test_other_branch_gets_not_found() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 1)]).await;

        let err = s
            .shipments
            .get(&RequestScope::for_branch("BOM"), "C1")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

// ============================================================================
// Edits and Cancellation
// ============================================================================

#[cfg(test)]
mod edit_tests {
    use super::*;

    fn replacement(amount: i64) -> Vec<InvoiceInput> {
        vec![InvoiceInput {
            invoice_number: "INV-2".to_string(),
            invoice_value: dec(900),
            products: vec![ProductInput {
                line_id: None,
                product_type: "Crate".to_string(),
                amount: dec(amount),
            }],
        }]
    }

    #[tokio::test]
    async fn test_invoices_editable_before_dispatch() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 3)]).await;

        let updated = s
            .shipments
            .update(
                &del(),
                "C1",
                UpdateShipmentInput {
                    invoices: Some(replacement(8)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(counters(&updated), vec![(dec(8), dec(0), dec(0))]);
        assert_eq!(updated.invoices[0].products[0].product_type, "Crate");
    }

    #[tokio::test]
    async fn test_invoices_locked_once_stock_moved() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 3)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();

        let err = s
            .shipments
            .update(
                &del(),
                "C1",
                UpdateShipmentInput {
                    invoices: Some(replacement(8)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Lifecycle(LifecycleError::StockInTransit(_))
        ));

        let renamed = s
            .shipments
            .update(
                &del(),
                "C1",
                UpdateShipmentInput {
                    consignee: Some(party("CL-9", "New Consignee")),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.consignee.name, "New Consignee");
        assert_eq!(renamed.total_in_transit(), dec(3));
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 3)]).await;
        s.shipments
            .update(&del(), "C1", UpdateShipmentInput::default())
            .await
            .unwrap();

        let err = s
            .shipments
            .update(
                &del(),
                "C1",
                UpdateShipmentInput {
                    version: Some(1),
                    charges: Some(vec![]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_cancel_only_without_moved_stock() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 3)]).await;
        book(&s, &del(), "C2", &[("Box", 3)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C2"]))
            .await
            .unwrap();

        let cancelled = s
            .shipments
            .cancel(
                &del(),
                "C1",
                CancelShipmentInput {
                    reason: Some("customer request".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(cancelled.shipment_status, ShipmentStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer request"));

        let err = s
            .shipments
            .cancel(&del(), "C2", CancelShipmentInput { reason: None })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Lifecycle(LifecycleError::StockInTransit(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_consignment_cannot_be_returned() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 3)]).await;
        s.shipments
            .cancel(&del(), "C1", CancelShipmentInput { reason: None })
            .await
            .unwrap();

        let err = s
            .lifecycle
            .return_consignment(
                &del(),
                "C1",
                ReturnInput {
                    mode: ReturnMode::Customer,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Lifecycle(LifecycleError::InvalidShipmentTransition { .. })
        ));
    }
}

// ============================================================================
// Direct Delivery and Invoicing
// ============================================================================

#[cfg(test)]
mod delivery_tests {
    use super::*;

    #[tokio::test]
    async fn test_direct_delivery_spreads_over_same_type_lines() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 5), ("Box", 3)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();

        let report = s
            .shipments
            .deliver_items(&del(), vec![delivery("C1", "POD-1", &[("Box", 6)])])
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.succeeded[0].shipment_status, ShipmentStatus::InTransit);

        let shipment = s.shipments.get(&del(), "C1").await.unwrap();
        assert_eq!(
            counters(&shipment),
            vec![(dec(0), dec(0), dec(5)), (dec(0), dec(2), dec(1))]
        );
        assert!(check_conservation(&shipment).is_ok());
    }

    #[tokio::test]
    async fn test_direct_delivery_rejects_non_positive_quantities() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 4)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();

        for qty in [0, -2] {
            let err = s
                .shipments
                .deliver_items(
                    &del(),
                    vec![delivery("C1", "POD-1", &[("Box", 1), ("Box", qty)])],
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                AppError::Validation { field, .. } if field == "items[1].qty"
            ));
        }

        let shipment = s.shipments.get(&del(), "C1").await.unwrap();
        assert_eq!(counters(&shipment), vec![(dec(0), dec(4), dec(0))]);
    }

    #[tokio::test]
    async fn test_direct_delivery_reference_is_idempotent() {
        let s = services();
        book(&s, &del(), "C1", &[("Bag", 4)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();

        for _ in 0..3 {
            s.shipments
                .deliver_items(&del(), vec![delivery("C1", "POD-1", &[("Bag", 2)])])
                .await
                .unwrap();
        }

        let shipment = s.shipments.get(&del(), "C1").await.unwrap();
        assert_eq!(counters(&shipment), vec![(dec(0), dec(2), dec(2))]);
    }

    #[tokio::test]
    async fn test_over_delivery_is_unreconciled() {
        let s = services();
        book(&s, &del(), "C1", &[("Bag", 4)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();

        let report = s
            .shipments
            .deliver_items(&del(), vec![delivery("C1", "POD-1", &[("Bag", 9)])])
            .await
            .unwrap();
        let record = &report.succeeded[0];
        assert_eq!(record.outcome.unreconciled.get("Bag"), Some(&dec(5)));
        assert_eq!(record.shipment_status, ShipmentStatus::Delivered);
    }

    #[tokio::test]
    async fn test_invoicing_requires_delivery() {
        let s = services();
        book(&s, &del(), "C1", &[("Box", 2)]).await;
        book(&s, &del(), "C2", &[("Box", 2)]).await;
        s.lifecycle
            .create_manifest(&del(), manifest_input("M1", &["C1"]))
            .await
            .unwrap();
        s.lifecycle
            .deliver_manifests(&del(), selection(&["M1"]))
            .await
            .unwrap();

        let report = s
            .shipments
            .mark_invoiced(&del(), vec!["C1".to_string(), "C2".to_string()])
            .await
            .unwrap();

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].shipment_status, ShipmentStatus::Invoiced);
        assert_eq!(report.failed[0].item, "C2");
        assert_eq!(report.failed[0].code, "INVALID_STATE_TRANSITION");
    }

    #[tokio::test]
    async fn test_empty_batches_rejected() {
        let s = services();
        assert!(matches!(
            s.shipments.deliver_items(&del(), vec![]).await,
            Err(AppError::Lifecycle(LifecycleError::EmptySelection))
        ));
        assert!(matches!(
            s.shipments.mark_invoiced(&del(), vec![]).await,
            Err(AppError::Lifecycle(LifecycleError::EmptySelection))
        ));
    }
}
