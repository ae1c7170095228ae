//! Manifest (vehicle trip) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A vehicle trip consolidating several consignments
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub manifestation_number: String,
    pub branch: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub vehicle_number: String,
    pub driver_name: Option<String>,
    pub transport_partner: Option<String>,
    pub mshipment_status: ManifestStatus,
    pub consignments: Vec<ManifestConsignment>,
    /// Held while a delivery or cancellation posts to the shipments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ManifestClaim>,
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Manifest {
    pub fn consignment_numbers(&self) -> Vec<String> {
        self.consignments
            .iter()
            .map(|c| c.consignment_number.clone())
            .collect()
    }

    pub fn total_manifest_qty(&self) -> Decimal {
        self.consignments
            .iter()
            .flat_map(|c| c.products())
            .map(|p| p.manifest_qty)
            .sum()
    }
}

/// Closing operation on an in-transit manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestOperation {
    Deliver,
    Cancel,
}

impl ManifestOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestOperation::Deliver => "deliver",
            ManifestOperation::Cancel => "cancel",
        }
    }

    pub fn target_status(&self) -> ManifestStatus {
        match self {
            ManifestOperation::Deliver => ManifestStatus::Delivered,
            ManifestOperation::Cancel => ManifestStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for ManifestOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusive hold on a manifest for one closing operation.
///
/// Only the holder of `token` may finish the operation. A stale claim may be
/// taken over by the same operation, which replays idempotently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestClaim {
    pub token: Uuid,
    pub operation: ManifestOperation,
    pub claimed_at: DateTime<Utc>,
}

impl ManifestClaim {
    pub fn new(operation: ManifestOperation, now: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            operation,
            claimed_at: now,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.claimed_at >= ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestStatus {
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    Cancelled,
}

impl ManifestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManifestStatus::InTransit => "In Transit",
            ManifestStatus::Delivered => "Delivered",
            ManifestStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "In Transit" => Some(ManifestStatus::InTransit),
            "Delivered" => Some(ManifestStatus::Delivered),
            "Cancelled" => Some(ManifestStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ManifestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Consignment copy held by a manifest, denormalized at manifest creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestConsignment {
    pub consignment_number: String,
    pub consignor_name: String,
    pub consignee_name: String,
    pub invoices: Vec<ManifestInvoice>,
    #[serde(default)]
    pub fully_delivered: bool,
}

impl ManifestConsignment {
    pub fn products(&self) -> impl Iterator<Item = &ManifestProduct> {
        self.invoices.iter().flat_map(|inv| inv.products.iter())
    }

    pub fn products_mut(&mut self) -> impl Iterator<Item = &mut ManifestProduct> {
        self.invoices.iter_mut().flat_map(|inv| inv.products.iter_mut())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInvoice {
    pub invoice_number: String,
    pub products: Vec<ManifestProduct>,
}

/// Product line as carried on a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestProduct {
    #[serde(rename = "lineId", default = "Uuid::nil")]
    pub line_id: Uuid,
    #[serde(rename = "type")]
    pub product_type: String,
    pub amount: Decimal,
    /// Quantity this manifest moved; rewritten to the delivered quantity on delivery
    #[serde(rename = "manifestQty")]
    pub manifest_qty: Decimal,
    pub instock: Decimal,
    pub intransitstock: Decimal,
    pub deliveredstock: Decimal,
}
