//! Fixtures shared by the integration tests

#![allow(dead_code)]

use courier_backend::config::LifecycleConfig;
use courier_backend::services::lifecycle::{CreateManifestInput, ManifestSelection};
use courier_backend::services::shipment::{BookShipmentInput, InvoiceInput, ProductInput};
use courier_backend::services::{LifecycleService, ManifestService, ShipmentService};
use courier_backend::Stores;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{Address, Charge, PartyKind, PartyRef, RequestScope, Shipment};

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

pub struct Services {
    pub stores: Stores,
    pub shipments: ShipmentService,
    pub manifests: ManifestService,
    pub lifecycle: LifecycleService,
}

pub fn services() -> Services {
    let stores = Stores::in_memory();
    let config = LifecycleConfig::default();
    Services {
        shipments: ShipmentService::new(stores.clone(), config.clone()),
        manifests: ManifestService::new(stores.clone()),
        lifecycle: LifecycleService::new(stores.clone(), config),
        stores,
    }
}

pub fn del() -> RequestScope {
    RequestScope::for_branch("DEL").with_user("clerk")
}

pub fn party(id: &str, name: &str) -> PartyRef {
    PartyRef {
        kind: PartyKind::Client,
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Booking request with one invoice holding `lines`
pub fn booking(number: &str, lines: &[(&str, i64)]) -> BookShipmentInput {
    BookShipmentInput {
        consignment_number: Some(number.to_string()),
        booking_date: NaiveDate::from_ymd_opt(2024, 6, 10),
        consignor: party("CL-1", "Acme Traders"),
        consignee: party("CL-2", "Bharat Stores"),
        billing_address: Address::default(),
        pickup_address: Address::default(),
        delivery_address: Address::default(),
        charges: vec![Charge {
            name: "Freight".to_string(),
            amount: dec(250),
        }],
        invoices: vec![InvoiceInput {
            invoice_number: "INV-1".to_string(),
            invoice_value: dec(5000),
            products: lines
                .iter()
                .map(|(t, amount)| ProductInput {
                    line_id: None,
                    product_type: t.to_string(),
                    amount: dec(*amount),
                })
                .collect(),
        }],
    }
}

pub async fn book(
    services: &Services,
    scope: &RequestScope,
    number: &str,
    lines: &[(&str, i64)],
) -> Shipment {
    services
        .shipments
        .book(scope, booking(number, lines))
        .await
        .expect("booking succeeds")
}

pub fn manifest_input(number: &str, consignments: &[&str]) -> CreateManifestInput {
    CreateManifestInput {
        manifestation_number: Some(number.to_string()),
        consignment_numbers: consignments.iter().map(|c| c.to_string()).collect(),
        vehicle_number: "DL01AB1234".to_string(),
        driver_name: Some("Ramesh".to_string()),
        transport_partner: None,
    }
}

pub fn selection(numbers: &[&str]) -> ManifestSelection {
    ManifestSelection {
        manifestation_numbers: numbers.iter().map(|n| n.to_string()).collect(),
    }
}

/// (instock, intransitstock, deliveredstock) of every line in document order
pub fn counters(shipment: &Shipment) -> Vec<(Decimal, Decimal, Decimal)> {
    shipment
        .products()
        .map(|p| (p.instock, p.intransitstock, p.deliveredstock))
        .collect()
}
