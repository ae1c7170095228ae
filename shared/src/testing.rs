//! Fixtures for unit tests

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::models::{
    Address, Charge, Invoice, PartyKind, PartyRef, ProductLine, Shipment, ShipmentStatus,
};

/// A booked shipment in branch DEL with one invoice holding the given lines
pub fn shipment_with_lines(consignment: &str, lines: &[(&str, i64)]) -> Shipment {
    let now = Utc::now();
    Shipment {
        consignment_number: consignment.to_string(),
        branch: "DEL".to_string(),
        username: Some("clerk".to_string()),
        email: None,
        booking_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        shipment_status: ShipmentStatus::Pending,
        cancel_reason: None,
        consignor: PartyRef {
            kind: PartyKind::Client,
            id: "CL-1".to_string(),
            name: "Acme Traders".to_string(),
        },
        consignee: PartyRef {
            kind: PartyKind::Guest,
            id: "G-7".to_string(),
            name: "R. Sharma".to_string(),
        },
        billing_address: Address::default(),
        pickup_address: Address::default(),
        delivery_address: Address::default(),
        charges: vec![Charge {
            name: "Freight".to_string(),
            amount: Decimal::from(100),
        }],
        invoices: vec![Invoice {
            invoice_number: "INV-1".to_string(),
            invoice_value: Decimal::from(1000),
            products: lines
                .iter()
                .map(|(t, amount)| ProductLine::new(*t, Decimal::from(*amount)))
                .collect(),
        }],
        applied_transitions: BTreeSet::new(),
        return_of: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}
