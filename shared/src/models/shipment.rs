//! Shipment (consignment) models

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One consignment booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub consignment_number: String,
    /// Owning location
    pub branch: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub booking_date: NaiveDate,
    pub shipment_status: ShipmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub consignor: PartyRef,
    pub consignee: PartyRef,
    #[serde(default)]
    pub billing_address: Address,
    #[serde(default)]
    pub pickup_address: Address,
    #[serde(default)]
    pub delivery_address: Address,
    #[serde(default)]
    pub charges: Vec<Charge>,
    pub invoices: Vec<Invoice>,
    /// Idempotency keys of lifecycle deltas already applied to this document
    #[serde(default)]
    pub applied_transitions: BTreeSet<String>,
    /// Original consignment when this booking is a return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_of: Option<String>,
    /// Optimistic concurrency counter, maintained by the store
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    /// All product lines across invoices, in document order
    pub fn products(&self) -> impl Iterator<Item = &ProductLine> {
        self.invoices.iter().flat_map(|inv| inv.products.iter())
    }

    pub fn products_mut(&mut self) -> impl Iterator<Item = &mut ProductLine> {
        self.invoices.iter_mut().flat_map(|inv| inv.products.iter_mut())
    }

    pub fn total_instock(&self) -> Decimal {
        self.products().map(|p| p.instock).sum()
    }

    pub fn total_in_transit(&self) -> Decimal {
        self.products().map(|p| p.intransitstock).sum()
    }

    pub fn total_delivered(&self) -> Decimal {
        self.products().map(|p| p.deliveredstock).sum()
    }

    pub fn total_charges(&self) -> Decimal {
        self.charges.iter().map(|c| c.amount).sum()
    }

    /// Whether any quantity has left `instock` since booking
    pub fn has_moved_stock(&self) -> bool {
        self.products()
            .any(|p| p.intransitstock > Decimal::ZERO || p.deliveredstock > Decimal::ZERO)
    }
}

/// Aggregate status of a consignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    #[serde(rename = "In Transit")]
    InTransit,
    #[serde(rename = "Partially Delivered")]
    PartiallyDelivered,
    Delivered,
    Invoiced,
    Returned,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::InTransit => "In Transit",
            ShipmentStatus::PartiallyDelivered => "Partially Delivered",
            ShipmentStatus::Delivered => "Delivered",
            ShipmentStatus::Invoiced => "Invoiced",
            ShipmentStatus::Returned => "Returned",
            ShipmentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "Pending" => Some(ShipmentStatus::Pending),
            "In Transit" => Some(ShipmentStatus::InTransit),
            "Partially Delivered" => Some(ShipmentStatus::PartiallyDelivered),
            "Delivered" => Some(ShipmentStatus::Delivered),
            "Invoiced" => Some(ShipmentStatus::Invoiced),
            "Returned" => Some(ShipmentStatus::Returned),
            s if s.starts_with("Cancelled") => Some(ShipmentStatus::Cancelled),
            _ => None,
        }
    }

    /// Statuses the quantity engine never recomputes
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Invoiced | ShipmentStatus::Returned | ShipmentStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consignor or consignee reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartyRef {
    pub kind: PartyKind,
    /// Client or guest identifier in the directory service
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Client,
    Guest,
}

/// Postal address block
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Freight or ancillary charge on a booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Charge {
    pub name: String,
    pub amount: Decimal,
}

/// Customer invoice travelling with the consignment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub invoice_number: String,
    #[serde(default)]
    pub invoice_value: Decimal,
    pub products: Vec<ProductLine>,
}

/// One product line with its three quantity counters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductLine {
    /// Stable identifier assigned at booking and kept across edits
    #[serde(rename = "lineId", default = "Uuid::nil")]
    pub line_id: Uuid,
    /// Product type, the reconciliation key between manifests and shipments
    #[serde(rename = "type")]
    pub product_type: String,
    pub amount: Decimal,
    #[serde(default)]
    pub instock: Decimal,
    #[serde(default)]
    pub intransitstock: Decimal,
    #[serde(default)]
    pub deliveredstock: Decimal,
}

impl ProductLine {
    pub fn new(product_type: impl Into<String>, amount: Decimal) -> Self {
        Self {
            line_id: Uuid::new_v4(),
            product_type: product_type.into(),
            amount,
            instock: amount,
            intransitstock: Decimal::ZERO,
            deliveredstock: Decimal::ZERO,
        }
    }

    /// instock + intransitstock + deliveredstock
    pub fn accounted(&self) -> Decimal {
        self.instock + self.intransitstock + self.deliveredstock
    }

    pub fn is_conserved(&self) -> bool {
        self.accounted() == self.amount
    }

    /// Delivered in full, or nothing left anywhere upstream of delivery
    pub fn is_fully_delivered(&self) -> bool {
        self.deliveredstock >= self.amount
            || (self.instock == Decimal::ZERO && self.intransitstock == Decimal::ZERO)
    }
}
