//! Quantity reconciliation properties
//!
//! Property-based tests over the full service stack:
//! - Quantity conservation after every transition
//! - Manifest then cancel restores stock
//! - Repeated delivery never over-delivers
//! - Same-type lines reconcile regardless of line order

mod common;

use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{check_conservation, ShipmentStatus};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// One to four "Box" lines with small amounts
fn box_lines_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..50, 1..5)
}

/// Mixed product types
fn mixed_lines_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::vec(
        (
            prop_oneof![
                Just("Box".to_string()),
                Just("Bag".to_string()),
                Just("Carton".to_string()),
            ],
            1i64..30,
        ),
        1..6,
    )
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Manifest,
    Deliver,
    Cancel,
}

fn steps_strategy() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        prop_oneof![Just(Step::Manifest), Just(Step::Deliver), Just(Step::Cancel)],
        1..8,
    )
}

fn lines_ref(lines: &[(String, i64)]) -> Vec<(&str, i64)> {
    lines.iter().map(|(t, a)| (t.as_str(), *a)).collect()
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(40))]

        /// Every line stays conserved through any sequence of operations
        #[test]
        fn prop_conservation_through_any_sequence(
            lines in mixed_lines_strategy(),
            steps in steps_strategy(),
        ) {
            tokio_test::block_on(async {
                let s = services();
                let booked = book(&s, &del(), "C1", &lines_ref(&lines)).await;
                let amounts: Vec<Decimal> = booked.products().map(|p| p.amount).collect();

                let mut last_manifest: Option<String> = None;
                for (i, step) in steps.iter().enumerate() {
                    match step {
                        Step::Manifest => {
                            let number = format!("M{}", i);
                            let creation = s
                                .lifecycle
                                .create_manifest(&del(), manifest_input(&number, &["C1"]))
                                .await
                                .unwrap();
                            if creation.manifest.is_some() {
                                last_manifest = Some(number);
                            }
                        }
                        Step::Deliver | Step::Cancel => {
                            if let Some(number) = &last_manifest {
                                let sel = selection(&[number.as_str()]);
                                let report = match step {
                                    Step::Deliver => s.lifecycle.deliver_manifests(&del(), sel).await,
                                    _ => s.lifecycle.cancel_manifests(&del(), sel).await,
                                };
                                report.unwrap();
                            }
                        }
                    }

                    let shipment = s.shipments.get(&del(), "C1").await.unwrap();
                    check_conservation(&shipment).unwrap();
                    let now: Vec<Decimal> = shipment.products().map(|p| p.amount).collect();
                    assert_eq!(&now, &amounts);
                }
            });
        }

        /// Manifesting then cancelling puts every unit back in stock
        #[test]
        fn prop_manifest_cancel_round_trip(lines in mixed_lines_strategy()) {
            tokio_test::block_on(async {
                let s = services();
                let booked = book(&s, &del(), "C1", &lines_ref(&lines)).await;

                s.lifecycle
                    .create_manifest(&del(), manifest_input("M1", &["C1"]))
                    .await
                    .unwrap();
                s.lifecycle
                    .cancel_manifests(&del(), selection(&["M1"]))
                    .await
                    .unwrap();

                let shipment = s.shipments.get(&del(), "C1").await.unwrap();
                assert_eq!(counters(&shipment), counters(&booked));
                assert_eq!(shipment.shipment_status, ShipmentStatus::Pending);
            });
        }

        /// Delivering the same manifest repeatedly never exceeds the booked amount
        #[test]
        fn prop_repeated_delivery_is_idempotent(
            lines in box_lines_strategy(),
            repeats in 1usize..4,
        ) {
            tokio_test::block_on(async {
                let s = services();
                let layout: Vec<(&str, i64)> = lines.iter().map(|a| ("Box", *a)).collect();
                book(&s, &del(), "C1", &layout).await;
                s.lifecycle
                    .create_manifest(&del(), manifest_input("M1", &["C1"]))
                    .await
                    .unwrap();

                for _ in 0..=repeats {
                    s.lifecycle
                        .deliver_manifests(&del(), selection(&["M1"]))
                        .await
                        .unwrap();
                }

                let shipment = s.shipments.get(&del(), "C1").await.unwrap();
                for line in shipment.products() {
                    assert_eq!(line.deliveredstock, line.amount);
                }
                assert_eq!(shipment.shipment_status, ShipmentStatus::Delivered);
            });
        }

        /// Two or more Box lines sum correctly whichever order they were booked in
        #[test]
        fn prop_same_type_lines_order_independent(lines in box_lines_strategy()) {
            tokio_test::block_on(async {
                let forward: Vec<(&str, i64)> = lines.iter().map(|a| ("Box", *a)).collect();
                let mut backward = forward.clone();
                backward.reverse();
                let total: i64 = lines.iter().sum();

                for layout in [forward, backward] {
                    let s = services();
                    book(&s, &del(), "C1", &layout).await;
                    let creation = s
                        .lifecycle
                        .create_manifest(&del(), manifest_input("M1", &["C1"]))
                        .await
                        .unwrap();
                    assert_eq!(creation.manifest.unwrap().total_manifest_qty(), dec(total));

                    s.lifecycle
                        .deliver_manifests(&del(), selection(&["M1"]))
                        .await
                        .unwrap();

                    let shipment = s.shipments.get(&del(), "C1").await.unwrap();
                    assert_eq!(shipment.total_delivered(), dec(total));
                    assert!(shipment.products().all(|p| p.deliveredstock == p.amount));
                }
            });
        }
    }
}
