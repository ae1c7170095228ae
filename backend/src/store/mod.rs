//! Document stores for shipments, manifests and number sequences
//!
//! Shipment and manifest documents are independently mutable; the stores
//! only guarantee per-document atomicity through a `version` counter. A write
//! carrying a stale version fails with [`AppError::VersionConflict`].
//!
//! [`AppError::VersionConflict`]: crate::error::AppError::VersionConflict

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::{BranchScope, Manifest, ManifestStatus, SequenceKind, Shipment, ShipmentStatus};
use sqlx::PgPool;

use crate::error::AppResult;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shipment listing filter
#[derive(Debug, Clone, Default)]
pub struct ShipmentFilter {
    pub branch: BranchScope,
    pub status: Option<ShipmentStatus>,
    pub username: Option<String>,
    /// Inclusive
    pub booked_from: Option<NaiveDate>,
    /// Exclusive
    pub booked_until: Option<NaiveDate>,
}

impl ShipmentFilter {
    pub fn matches(&self, shipment: &Shipment) -> bool {
        self.branch.includes(&shipment.branch)
            && self.status.map_or(true, |s| s == shipment.shipment_status)
            && self
                .username
                .as_ref()
                .map_or(true, |u| shipment.username.as_ref() == Some(u))
            && self.booked_from.map_or(true, |d| shipment.booking_date >= d)
            && self.booked_until.map_or(true, |d| shipment.booking_date < d)
    }
}

/// Manifest listing filter
#[derive(Debug, Clone, Default)]
pub struct ManifestFilter {
    pub branch: BranchScope,
    pub status: Option<ManifestStatus>,
}

impl ManifestFilter {
    pub fn matches(&self, manifest: &Manifest) -> bool {
        self.branch.includes(&manifest.branch)
            && self.status.map_or(true, |s| s == manifest.mshipment_status)
    }
}

#[async_trait]
pub trait ShipmentStore: Send + Sync {
    /// Store a new shipment at version 1
    async fn insert_shipment(&self, shipment: Shipment) -> AppResult<Shipment>;

    async fn get_shipment(&self, consignment_number: &str) -> AppResult<Option<Shipment>>;

    async fn list_shipments(&self, filter: &ShipmentFilter) -> AppResult<Vec<Shipment>>;

    /// Replace the stored document if its version still equals `shipment.version`
    async fn update_shipment(&self, shipment: Shipment) -> AppResult<Shipment>;
}

#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn insert_manifest(&self, manifest: Manifest) -> AppResult<Manifest>;

    async fn get_manifest(&self, manifestation_number: &str) -> AppResult<Option<Manifest>>;

    async fn list_manifests(&self, filter: &ManifestFilter) -> AppResult<Vec<Manifest>>;

    async fn update_manifest(&self, manifest: Manifest) -> AppResult<Manifest>;
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Next value (starting at 1) of the sequence for branch, kind and fiscal year
    async fn next_value(&self, branch: &str, kind: SequenceKind, fiscal_year: &str)
        -> AppResult<i64>;
}

/// The three stores services work against
#[derive(Clone)]
pub struct Stores {
    pub shipments: Arc<dyn ShipmentStore>,
    pub manifests: Arc<dyn ManifestStore>,
    pub sequences: Arc<dyn SequenceStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::default());
        Self {
            shipments: store.clone(),
            manifests: store.clone(),
            sequences: store,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            shipments: store.clone(),
            manifests: store.clone(),
            sequences: store,
        }
    }
}
