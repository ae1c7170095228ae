//! In-process store used in development and tests

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use shared::{Manifest, SequenceKind, Shipment};
use tokio::sync::RwLock;

use super::{ManifestFilter, ManifestStore, SequenceStore, ShipmentFilter, ShipmentStore};
use crate::error::{AppError, AppResult};

#[derive(Default)]
pub struct MemoryStore {
    shipments: RwLock<HashMap<String, Shipment>>,
    manifests: RwLock<HashMap<String, Manifest>>,
    sequences: RwLock<HashMap<(String, SequenceKind, String), i64>>,
}

#[async_trait]
impl ShipmentStore for MemoryStore {
    async fn insert_shipment(&self, mut shipment: Shipment) -> AppResult<Shipment> {
        let mut shipments = self.shipments.write().await;
        if shipments.contains_key(&shipment.consignment_number) {
            return Err(AppError::DuplicateEntry(format!(
                "Consignment {}",
                shipment.consignment_number
            )));
        }
        shipment.version = 1;
        shipments.insert(shipment.consignment_number.clone(), shipment.clone());
        Ok(shipment)
    }

    async fn get_shipment(&self, consignment_number: &str) -> AppResult<Option<Shipment>> {
        Ok(self.shipments.read().await.get(consignment_number).cloned())
    }

    async fn list_shipments(&self, filter: &ShipmentFilter) -> AppResult<Vec<Shipment>> {
        let shipments = self.shipments.read().await;
        let mut found: Vec<Shipment> = shipments
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.booking_date
                .cmp(&a.booking_date)
                .then_with(|| a.consignment_number.cmp(&b.consignment_number))
        });
        Ok(found)
    }

    async fn update_shipment(&self, mut shipment: Shipment) -> AppResult<Shipment> {
        let mut shipments = self.shipments.write().await;
        let stored = shipments
            .get_mut(&shipment.consignment_number)
            .ok_or_else(|| {
                AppError::NotFound(format!("Shipment {}", shipment.consignment_number))
            })?;
        if stored.version != shipment.version {
            return Err(AppError::VersionConflict {
                resource: format!("Shipment {}", shipment.consignment_number),
                expected: shipment.version,
            });
        }
        shipment.version += 1;
        shipment.updated_at = Utc::now();
        *stored = shipment.clone();
        Ok(shipment)
    }
}

#[async_trait]
impl ManifestStore for MemoryStore {
    async fn insert_manifest(&self, mut manifest: Manifest) -> AppResult<Manifest> {
        let mut manifests = self.manifests.write().await;
        if manifests.contains_key(&manifest.manifestation_number) {
            return Err(AppError::DuplicateEntry(format!(
                "Manifest {}",
                manifest.manifestation_number
            )));
        }
        manifest.version = 1;
        manifests.insert(manifest.manifestation_number.clone(), manifest.clone());
        Ok(manifest)
    }

    async fn get_manifest(&self, manifestation_number: &str) -> AppResult<Option<Manifest>> {
        Ok(self.manifests.read().await.get(manifestation_number).cloned())
    }

    async fn list_manifests(&self, filter: &ManifestFilter) -> AppResult<Vec<Manifest>> {
        let manifests = self.manifests.read().await;
        let mut found: Vec<Manifest> = manifests
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_manifest(&self, mut manifest: Manifest) -> AppResult<Manifest> {
        let mut manifests = self.manifests.write().await;
        let stored = manifests
            .get_mut(&manifest.manifestation_number)
            .ok_or_else(|| {
                AppError::NotFound(format!("Manifest {}", manifest.manifestation_number))
            })?;
        if stored.version != manifest.version {
            return Err(AppError::VersionConflict {
                resource: format!("Manifest {}", manifest.manifestation_number),
                expected: manifest.version,
            });
        }
        manifest.version += 1;
        manifest.updated_at = Utc::now();
        *stored = manifest.clone();
        Ok(manifest)
    }
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn next_value(
        &self,
        branch: &str,
        kind: SequenceKind,
        fiscal_year: &str,
    ) -> AppResult<i64> {
        let mut sequences = self.sequences.write().await;
        let value = sequences
            .entry((branch.to_string(), kind, fiscal_year.to_string()))
            .or_insert(0);
        *value += 1;
        Ok(*value)
    }
}
