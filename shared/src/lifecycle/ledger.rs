//! Type-keyed quantity ledger used to reconcile manifests with shipments

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ProductLine, Shipment};

/// Canonical form of a product type used as the reconciliation key
pub fn normalize_type(product_type: &str) -> String {
    product_type.trim().to_string()
}

/// Lifecycle operations that leave an idempotency key behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOp {
    Dispatch,
    Deliver,
    Cancel,
    DirectDeliver,
}

impl TransitionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionOp::Dispatch => "dispatch",
            TransitionOp::Deliver => "deliver",
            TransitionOp::Cancel => "cancel",
            TransitionOp::DirectDeliver => "direct",
        }
    }
}

/// Key prefix for one (operation, manifest, consignment); the product type is appended per group
pub fn transition_key(op: TransitionOp, reference: &str, consignment_number: &str) -> String {
    format!("{}:{}:{}", op.as_str(), reference, consignment_number)
}

fn group_key(prefix: &str, product_type: &str) -> String {
    format!("{}:{}", prefix, product_type)
}

/// Direction a ledger moves quantity on a shipment line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// instock -> intransitstock
    Dispatch,
    /// intransitstock -> deliveredstock
    Deliver,
    /// intransitstock -> instock
    Revert,
}

impl Movement {
    /// Most this movement can take from a line without going negative
    pub fn capacity(&self, line: &ProductLine) -> Decimal {
        let available = match self {
            Movement::Dispatch => line.instock,
            Movement::Deliver | Movement::Revert => line.intransitstock,
        };
        available.max(Decimal::ZERO)
    }

    fn apply(&self, line: &mut ProductLine, qty: Decimal) {
        match self {
            Movement::Dispatch => {
                line.instock -= qty;
                line.intransitstock += qty;
            }
            Movement::Deliver => {
                line.intransitstock -= qty;
                line.deliveredstock += qty;
            }
            Movement::Revert => {
                line.intransitstock -= qty;
                line.instock += qty;
            }
        }
    }
}

/// One recorded quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub line_id: Option<Uuid>,
    pub product_type: String,
    pub qty: Decimal,
}

/// Quantities accumulated per product line and type before being applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuantityLedger {
    entries: Vec<LedgerEntry>,
}

impl QuantityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger without line identities, as posted by the bulk delivery endpoint
    pub fn from_type_quantities<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut ledger = Self::new();
        for (product_type, qty) in items {
            ledger.record(None, product_type.as_ref(), qty);
        }
        ledger
    }

    /// Record a quantity; zero and negative quantities are ignored
    pub fn record(&mut self, line_id: Option<Uuid>, product_type: &str, qty: Decimal) {
        if qty <= Decimal::ZERO {
            return;
        }
        self.entries.push(LedgerEntry {
            line_id: line_id.filter(|id| !id.is_nil()),
            product_type: normalize_type(product_type),
            qty,
        });
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> Decimal {
        self.entries.iter().map(|e| e.qty).sum()
    }

    pub fn totals_by_type(&self) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for entry in &self.entries {
            *totals
                .entry(entry.product_type.clone())
                .or_insert(Decimal::ZERO) += entry.qty;
        }
        totals
    }

    pub fn product_types(&self) -> BTreeSet<String> {
        self.entries.iter().map(|e| e.product_type.clone()).collect()
    }
}

/// Result of applying a ledger to a shipment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Quantity placed per product type
    pub applied: BTreeMap<String, Decimal>,
    /// Quantity that found no line with spare capacity
    pub unreconciled: BTreeMap<String, Decimal>,
    /// Types whose idempotency key was already present
    pub skipped: Vec<String>,
}

impl ApplyOutcome {
    pub fn total_applied(&self) -> Decimal {
        self.applied.values().copied().sum()
    }

    pub fn is_fully_reconciled(&self) -> bool {
        self.unreconciled.is_empty()
    }
}

/// Apply `ledger` to `shipment`, moving quantity in the given direction.
///
/// Entries carrying a line id are placed on that line first (when it still has
/// the same type). Whatever is left is spread over the shipment's lines of the
/// same type in document order, never beyond a line's capacity. A type group
/// whose key `<key_prefix>:<type>` is already recorded on the shipment is
/// skipped entirely.
pub fn apply_ledger(
    shipment: &mut Shipment,
    ledger: &QuantityLedger,
    movement: Movement,
    key_prefix: &str,
) -> ApplyOutcome {
    let mut outcome = ApplyOutcome::default();

    let skipped: BTreeSet<String> = ledger
        .product_types()
        .into_iter()
        .filter(|t| {
            shipment
                .applied_transitions
                .contains(&group_key(key_prefix, t))
        })
        .collect();
    outcome.skipped = skipped.iter().cloned().collect();

    let mut residual: BTreeMap<String, Decimal> = BTreeMap::new();

    for entry in ledger.entries() {
        if skipped.contains(&entry.product_type) {
            continue;
        }
        let mut remaining = entry.qty;

        if let Some(line_id) = entry.line_id {
            if let Some(line) = shipment.products_mut().find(|line| {
                line.line_id == line_id && normalize_type(&line.product_type) == entry.product_type
            }) {
                let take = remaining.min(movement.capacity(line));
                movement.apply(line, take);
                remaining -= take;
            }
        }

        if remaining > Decimal::ZERO {
            *residual
                .entry(entry.product_type.clone())
                .or_insert(Decimal::ZERO) += remaining;
        }
    }

    for (product_type, mut remaining) in residual {
        for line in shipment.products_mut() {
            if remaining <= Decimal::ZERO {
                break;
            }
            if normalize_type(&line.product_type) != product_type {
                continue;
            }
            let take = remaining.min(movement.capacity(line));
            movement.apply(line, take);
            remaining -= take;
        }
        if remaining > Decimal::ZERO {
            outcome.unreconciled.insert(product_type, remaining);
        }
    }

    for (product_type, total) in ledger.totals_by_type() {
        if skipped.contains(&product_type) {
            continue;
        }
        let left = outcome
            .unreconciled
            .get(&product_type)
            .copied()
            .unwrap_or(Decimal::ZERO);
        outcome.applied.insert(product_type.clone(), total - left);
        shipment
            .applied_transitions
            .insert(group_key(key_prefix, &product_type));
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Invoice, ShipmentStatus};
    use crate::testing::shipment_with_lines;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn test_record_ignores_zero_and_trims_type() {
        let mut ledger = QuantityLedger::new();
        ledger.record(None, " Box ", dec(3));
        ledger.record(None, "Box", Decimal::ZERO);
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.totals_by_type().get("Box"), Some(&dec(3)));
    }

    #[test]
    fn test_same_type_lines_are_summed() {
        let ledger = QuantityLedger::from_type_quantities([("Box", dec(2)), ("Box", dec(5))]);
        assert_eq!(ledger.totals_by_type().get("Box"), Some(&dec(7)));
        assert_eq!(ledger.total(), dec(7));
    }

    #[test]
    fn test_line_id_match_takes_priority() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 4), ("Box", 6)]);
        for line in shipment.products_mut() {
            line.intransitstock = line.instock;
            line.instock = Decimal::ZERO;
        }
        let second = shipment.invoices[0].products[1].line_id;

        let mut ledger = QuantityLedger::new();
        ledger.record(Some(second), "Box", dec(6));
        let outcome = apply_ledger(&mut shipment, &ledger, Movement::Deliver, "deliver:M1:C1");

        assert_eq!(shipment.invoices[0].products[0].deliveredstock, Decimal::ZERO);
        assert_eq!(shipment.invoices[0].products[1].deliveredstock, dec(6));
        assert_eq!(outcome.applied.get("Box"), Some(&dec(6)));
    }

    #[test]
    fn test_residual_spreads_in_document_order() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 4), ("Bag", 1), ("Box", 6)]);
        let ledger = QuantityLedger::from_type_quantities([("Box", dec(7))]);
        apply_ledger(&mut shipment, &ledger, Movement::Dispatch, "dispatch:M1:C1");

        let lines: Vec<_> = shipment.products().cloned().collect();
        assert_eq!(lines[0].intransitstock, dec(4));
        assert_eq!(lines[1].intransitstock, Decimal::ZERO);
        assert_eq!(lines[2].intransitstock, dec(3));
        assert_eq!(lines[2].instock, dec(3));
    }

    #[test]
    fn test_unplaceable_quantity_is_reported() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 2)]);
        let ledger = QuantityLedger::from_type_quantities([("Box", dec(5)), ("Crate", dec(1))]);
        let outcome = apply_ledger(&mut shipment, &ledger, Movement::Dispatch, "p");

        assert_eq!(outcome.applied.get("Box"), Some(&dec(2)));
        assert_eq!(outcome.unreconciled.get("Box"), Some(&dec(3)));
        assert_eq!(outcome.unreconciled.get("Crate"), Some(&dec(1)));
        assert!(shipment.products().all(|p| p.is_conserved()));
    }

    #[test]
    fn test_applied_key_skips_second_application() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 10)]);
        let ledger = QuantityLedger::from_type_quantities([("Box", dec(4))]);

        apply_ledger(&mut shipment, &ledger, Movement::Dispatch, "dispatch:M1:C1");
        let again = apply_ledger(&mut shipment, &ledger, Movement::Dispatch, "dispatch:M1:C1");

        assert_eq!(again.skipped, vec!["Box".to_string()]);
        assert_eq!(shipment.invoices[0].products[0].intransitstock, dec(4));
        assert!(shipment.applied_transitions.contains("dispatch:M1:C1:Box"));
    }

    #[test]
    fn test_revert_never_goes_negative() {
        let mut shipment = shipment_with_lines("C1", &[("Box", 10)]);
        shipment.invoices.push(Invoice {
            invoice_number: "INV-2".to_string(),
            invoice_value: Decimal::ZERO,
            products: vec![],
        });
        shipment.shipment_status = ShipmentStatus::InTransit;
        let line = &mut shipment.invoices[0].products[0];
        line.instock = dec(7);
        line.intransitstock = dec(3);

        let ledger = QuantityLedger::from_type_quantities([("Box", dec(8))]);
        let outcome = apply_ledger(&mut shipment, &ledger, Movement::Revert, "cancel:M1:C1");

        let line = &shipment.invoices[0].products[0];
        assert_eq!(line.intransitstock, Decimal::ZERO);
        assert_eq!(line.instock, dec(10));
        assert_eq!(outcome.unreconciled.get("Box"), Some(&dec(5)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Placed plus unreconciled always equals what the ledger asked for
            #[test]
            fn prop_dispatch_accounts_for_every_unit(
                amounts in prop::collection::vec(1i64..40, 1..5),
                requested in 1i64..200,
            ) {
                let lines: Vec<(&str, i64)> = amounts.iter().map(|a| ("Box", *a)).collect();
                let mut shipment = shipment_with_lines("C1", &lines);
                let ledger = QuantityLedger::from_type_quantities([("Box", dec(requested))]);

                let outcome = apply_ledger(&mut shipment, &ledger, Movement::Dispatch, "p");

                let left = outcome.unreconciled.get("Box").copied().unwrap_or(Decimal::ZERO);
                prop_assert_eq!(outcome.total_applied() + left, dec(requested));
                prop_assert_eq!(shipment.total_in_transit(), outcome.total_applied());
                prop_assert!(shipment.products().all(|p| p.is_conserved()));
            }
        }
    }
}
