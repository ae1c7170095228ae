//! Multi-document lifecycle operations
//!
//! Manifest creation, delivery, cancellation and returns each touch one
//! manifest and many shipments. The documents are updated independently, so
//! every operation is written as a saga:
//!
//! - shipment deltas carry idempotency keys, so re-running an operation never
//!   double-counts
//! - shipments are written before the manifest that records them, so a failed
//!   manifest write is repaired by retrying the same call
//! - per-consignment failures are reported, never rolled back silently

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    apply_cancellation, apply_delivery, branch_return_number, build_return, cancel_on_manifest,
    cancel_shipment, cancellation_ledger, check_returnable, deliver_on_manifest, mark_returned,
    move_to_transit, validate_document_number, validate_vehicle_number, ApplyOutcome, BranchScope,
    LifecycleError, Manifest, ManifestClaim, ManifestConsignment, ManifestOperation,
    ManifestStatus, QuantityLedger, RequestScope, ReturnMode, Shipment, ShipmentStatus,
};
use validator::Validate;

use super::batch::{mutate_manifest, mutate_shipment, run_batch, BatchFailure, BatchReport};
use super::sequence::SequenceService;
use super::shipment::dedup;
use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::store::Stores;

#[derive(Clone)]
pub struct LifecycleService {
    stores: Stores,
    lifecycle: LifecycleConfig,
    sequences: SequenceService,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateManifestInput {
    /// Allocated from the branch sequence when absent
    #[validate(length(min = 1, max = 64))]
    pub manifestation_number: Option<String>,
    #[serde(default)]
    pub consignment_numbers: Vec<String>,
    #[validate(length(min = 1, max = 20))]
    pub vehicle_number: String,
    #[validate(length(max = 100))]
    pub driver_name: Option<String>,
    #[validate(length(max = 100))]
    pub transport_partner: Option<String>,
}

/// Outcome of manifest creation.
///
/// `manifest` is absent when no selected consignment could be moved.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCreation {
    pub manifest: Option<Manifest>,
    pub manifested: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSelection {
    #[serde(default)]
    pub manifestation_numbers: Vec<String>,
}

/// Result of delivering or cancelling one manifest
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTransition {
    pub manifestation_number: String,
    pub mshipment_status: ManifestStatus,
    pub consignments: BatchReport<ConsignmentMovement>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsignmentMovement {
    pub consignment_number: String,
    pub shipment_status: ShipmentStatus,
    pub outcome: ApplyOutcome,
}

#[derive(Debug, Deserialize)]
pub struct ReturnInput {
    pub mode: ReturnMode,
}

#[derive(Debug, Serialize)]
pub struct ReturnResult {
    pub original: Shipment,
    pub returned: Shipment,
}

impl LifecycleService {
    pub fn new(stores: Stores, lifecycle: LifecycleConfig) -> Self {
        let sequences = SequenceService::new(&stores, &lifecycle);
        Self {
            stores,
            lifecycle,
            sequences,
        }
    }

    /// Load selected consignments onto a new manifest.
    ///
    /// Every in-stock unit of each consignment moves to transit. Consignments
    /// that cannot move are reported; the manifest lists only the ones that did.
    pub async fn create_manifest(
        &self,
        scope: &RequestScope,
        input: CreateManifestInput,
    ) -> AppResult<ManifestCreation> {
        let branch = scope
            .branch
            .code()
            .ok_or(LifecycleError::BranchNotSelected)?
            .to_string();
        let selection = dedup(input.consignment_numbers.clone());
        if selection.is_empty() {
            return Err(LifecycleError::EmptySelection.into());
        }
        input.validate()?;
        validate_vehicle_number(&input.vehicle_number)
            .map_err(|m| AppError::validation("vehicleNumber", m))?;

        let manifestation_number = match &input.manifestation_number {
            Some(number) => {
                let number = number.trim().to_string();
                validate_document_number(&number)
                    .map_err(|m| AppError::validation("manifestationNumber", m))?;
                if self.stores.manifests.get_manifest(&number).await?.is_some() {
                    return Err(AppError::DuplicateEntry(format!("Manifest {}", number)));
                }
                number
            }
            None => {
                self.sequences
                    .next_manifest_number(&branch, Utc::now().date_naive())
                    .await?
                    .number
            }
        };

        let store = self.stores.shipments.clone();
        let retries = self.lifecycle.conflict_retries;
        let owner = branch.clone();
        let number = manifestation_number.clone();

        let report = run_batch(
            selection,
            self.lifecycle.max_parallel_updates,
            |n| n.clone(),
            move |consignment_number| {
                let store = store.clone();
                let owner = owner.clone();
                let number = number.clone();
                async move {
                    let (_, copy) = mutate_shipment(
                        &store,
                        &BranchScope::All,
                        &consignment_number,
                        retries,
                        |s| {
                            if s.branch != owner {
                                return Err(LifecycleError::OutOfScope {
                                    consignment: s.consignment_number.clone(),
                                    owner: s.branch.clone(),
                                    requested: owner.clone(),
                                }
                                .into());
                            }
                            Ok(move_to_transit(s, &number)?)
                        },
                    )
                    .await?;
                    Ok(copy)
                }
            },
        )
        .await;

        let manifested: Vec<String> = report
            .succeeded
            .iter()
            .map(|c| c.consignment_number.clone())
            .collect();

        if report.succeeded.is_empty() {
            tracing::warn!(
                "Manifest {} not created: none of {} consignments could be moved",
                manifestation_number,
                report.failed.len()
            );
            return Ok(ManifestCreation {
                manifest: None,
                manifested,
                failed: report.failed,
            });
        }

        let now = Utc::now();
        let manifest = Manifest {
            manifestation_number: manifestation_number.clone(),
            branch,
            username: scope.username.clone(),
            email: scope.email.clone(),
            vehicle_number: input.vehicle_number.trim().to_string(),
            driver_name: input.driver_name,
            transport_partner: input.transport_partner,
            mshipment_status: ManifestStatus::InTransit,
            consignments: report.succeeded.clone(),
            claim: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        match self.stores.manifests.insert_manifest(manifest).await {
            Ok(manifest) => {
                tracing::info!(
                    "Created manifest {} with {} consignments ({} rejected)",
                    manifest.manifestation_number,
                    manifested.len(),
                    report.failed.len()
                );
                Ok(ManifestCreation {
                    manifest: Some(manifest),
                    manifested,
                    failed: report.failed,
                })
            }
            Err(e) => {
                tracing::error!(
                    "Manifest {} could not be stored, reverting {} consignments: {}",
                    manifestation_number,
                    report.succeeded.len(),
                    e
                );
                self.revert_dispatch(&manifestation_number, &report.succeeded)
                    .await;
                Err(e)
            }
        }
    }

    /// Compensation for a manifest that was never stored
    async fn revert_dispatch(
        &self,
        manifestation_number: &str,
        consignments: &[ManifestConsignment],
    ) {
        for consignment in consignments {
            let ledger = cancellation_ledger(consignment);
            let result = mutate_shipment(
                &self.stores.shipments,
                &BranchScope::All,
                &consignment.consignment_number,
                self.lifecycle.conflict_retries,
                |s| Ok(apply_cancellation(s, manifestation_number, &ledger)),
            )
            .await;
            if let Err(e) = result {
                tracing::error!(
                    "Could not revert consignment {} after failed manifest {}: {}",
                    consignment.consignment_number,
                    manifestation_number,
                    e
                );
            }
        }
    }

    /// Mark manifests delivered and post the delivered quantities to their
    /// shipments. A manifest already Delivered is left as it is.
    pub async fn deliver_manifests(
        &self,
        scope: &RequestScope,
        selection: ManifestSelection,
    ) -> AppResult<BatchReport<ManifestTransition>> {
        self.transition_manifests(scope, selection, ManifestOperation::Deliver)
            .await
    }

    /// Cancel manifests and return their in-transit quantities to stock.
    /// A manifest already Cancelled is left as it is.
    pub async fn cancel_manifests(
        &self,
        scope: &RequestScope,
        selection: ManifestSelection,
    ) -> AppResult<BatchReport<ManifestTransition>> {
        self.transition_manifests(scope, selection, ManifestOperation::Cancel)
            .await
    }

    async fn transition_manifests(
        &self,
        scope: &RequestScope,
        selection: ManifestSelection,
        operation: ManifestOperation,
    ) -> AppResult<BatchReport<ManifestTransition>> {
        let numbers = dedup(selection.manifestation_numbers);
        if numbers.is_empty() {
            return Err(LifecycleError::EmptySelection.into());
        }

        let mut report = BatchReport::default();
        for number in numbers {
            match self.transition_manifest(scope, &number, operation).await {
                Ok(transition) => report.succeeded.push(transition),
                Err(e) => {
                    tracing::warn!("Could not {} manifest {}: {}", operation, number, e);
                    report.failure(number, &e);
                }
            }
        }
        Ok(report)
    }

    /// Close one manifest.
    ///
    /// The manifest is claimed before any shipment is touched, so a concurrent
    /// delivery and cancellation of the same manifest cannot both post. The
    /// claim is released by the write that records the posted copies.
    async fn transition_manifest(
        &self,
        scope: &RequestScope,
        manifestation_number: &str,
        operation: ManifestOperation,
    ) -> AppResult<ManifestTransition> {
        let current = self
            .stores
            .manifests
            .get_manifest(manifestation_number)
            .await?
            .filter(|m| scope.branch.includes(&m.branch))
            .ok_or_else(|| AppError::NotFound(format!("Manifest {}", manifestation_number)))?;

        let target = operation.target_status();
        if current.mshipment_status == target {
            return Ok(unchanged(current));
        }

        let claim = ManifestClaim::new(operation, Utc::now());
        let token = claim.token;
        let ttl = self.lifecycle.claim_ttl();
        let (manifest, claimed) = mutate_manifest(
            &self.stores.manifests,
            &scope.branch,
            manifestation_number,
            self.lifecycle.conflict_retries,
            |m| {
                if m.mshipment_status == target {
                    return Ok(false);
                }
                check_open(m, operation)?;
                if let Some(held) = &m.claim {
                    if held.operation != operation || !held.is_stale(Utc::now(), ttl) {
                        return Err(LifecycleError::ManifestBusy {
                            manifest: m.manifestation_number.clone(),
                            operation: held.operation,
                        }
                        .into());
                    }
                    tracing::warn!(
                        "Resuming {} of manifest {} claimed at {}",
                        operation,
                        m.manifestation_number,
                        held.claimed_at
                    );
                }
                m.claim = Some(claim.clone());
                Ok(true)
            },
        )
        .await?;
        if !claimed {
            return Ok(unchanged(manifest));
        }

        let mut copies: BTreeMap<String, ManifestConsignment> = BTreeMap::new();
        let mut postings: Vec<(String, QuantityLedger)> = Vec::new();
        for consignment in &manifest.consignments {
            let mut copy = consignment.clone();
            let ledger = match operation {
                ManifestOperation::Deliver => deliver_on_manifest(&mut copy),
                ManifestOperation::Cancel => cancel_on_manifest(&mut copy),
            };
            postings.push((copy.consignment_number.clone(), ledger));
            copies.insert(copy.consignment_number.clone(), copy);
        }

        let store = self.stores.shipments.clone();
        let retries = self.lifecycle.conflict_retries;
        let number = manifestation_number.to_string();

        let consignments = run_batch(
            postings,
            self.lifecycle.max_parallel_updates,
            |(n, _)| n.clone(),
            move |(consignment_number, ledger)| {
                let store = store.clone();
                let number = number.clone();
                async move {
                    let (shipment, outcome) = mutate_shipment(
                        &store,
                        &BranchScope::All,
                        &consignment_number,
                        retries,
                        |s| match operation {
                            ManifestOperation::Deliver => {
                                Ok(apply_delivery(s, &number, &ledger)?)
                            }
                            ManifestOperation::Cancel => {
                                Ok(apply_cancellation(s, &number, &ledger))
                            }
                        },
                    )
                    .await?;

                    if !outcome.is_fully_reconciled() {
                        tracing::warn!(
                            "Manifest {} left {:?} unreconciled on {}",
                            number,
                            outcome.unreconciled,
                            consignment_number
                        );
                    }
                    Ok(ConsignmentMovement {
                        consignment_number,
                        shipment_status: shipment.shipment_status,
                        outcome,
                    })
                }
            },
        )
        .await;

        let posted: BTreeSet<&str> = consignments
            .succeeded
            .iter()
            .map(|c| c.consignment_number.as_str())
            .collect();
        let complete = consignments.is_complete();

        let (saved, _) = mutate_manifest(
            &self.stores.manifests,
            &scope.branch,
            manifestation_number,
            self.lifecycle.conflict_retries,
            |m| {
                match &m.claim {
                    Some(held) if held.token == token => {}
                    held => {
                        return Err(LifecycleError::ManifestBusy {
                            manifest: m.manifestation_number.clone(),
                            operation: held.as_ref().map_or(operation, |c| c.operation),
                        }
                        .into())
                    }
                }
                for consignment in m.consignments.iter_mut() {
                    if posted.contains(consignment.consignment_number.as_str()) {
                        if let Some(copy) = copies.get(&consignment.consignment_number) {
                            *consignment = copy.clone();
                        }
                    }
                }
                if complete {
                    m.mshipment_status = target;
                }
                m.claim = None;
                Ok(())
            },
        )
        .await
        .map_err(|e| {
            tracing::error!(
                "Manifest {} posted but not recorded, {} stays claimed: {}",
                manifestation_number,
                operation,
                e
            );
            e
        })?;

        tracing::info!(
            "Manifest {} {}: {} consignments posted, {} failed",
            saved.manifestation_number,
            saved.mshipment_status,
            consignments.succeeded.len(),
            consignments.failed.len()
        );

        Ok(ManifestTransition {
            manifestation_number: saved.manifestation_number,
            mshipment_status: saved.mshipment_status,
            consignments,
        })
    }

    /// Book the return of a consignment from the caller's branch and tag the
    /// original as Returned.
    pub async fn return_consignment(
        &self,
        scope: &RequestScope,
        consignment_number: &str,
        input: ReturnInput,
    ) -> AppResult<ReturnResult> {
        let branch = scope
            .branch
            .code()
            .ok_or(LifecycleError::BranchNotSelected)?
            .to_string();

        let original = self
            .stores
            .shipments
            .get_shipment(consignment_number)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Shipment {}", consignment_number)))?;

        check_returnable(&original)?;
        let now = Utc::now();
        let new_number = match input.mode {
            ReturnMode::Branch => branch_return_number(&original.consignment_number, &branch),
            ReturnMode::Customer => {
                self.sequences
                    .next_consignment_number(&branch, now.date_naive())
                    .await?
                    .number
            }
        };

        let mut returned = build_return(&original, input.mode, new_number, &branch, now)?;
        if scope.username.is_some() {
            returned.username = scope.username.clone();
            returned.email = scope.email.clone();
        }
        let returned = self.stores.shipments.insert_shipment(returned).await?;

        let marked = mutate_shipment(
            &self.stores.shipments,
            &BranchScope::All,
            consignment_number,
            self.lifecycle.conflict_retries,
            |s| Ok(mark_returned(s)?),
        )
        .await;

        match marked {
            Ok((original, _)) => {
                tracing::info!(
                    "Consignment {} returned as {}",
                    original.consignment_number,
                    returned.consignment_number
                );
                Ok(ReturnResult { original, returned })
            }
            Err(e) => {
                tracing::error!(
                    "Could not mark {} returned, cancelling return booking {}: {}",
                    consignment_number,
                    returned.consignment_number,
                    e
                );
                let rollback = mutate_shipment(
                    &self.stores.shipments,
                    &BranchScope::All,
                    &returned.consignment_number,
                    self.lifecycle.conflict_retries,
                    |s| Ok(cancel_shipment(s, Some("return rolled back".to_string()))?),
                )
                .await;
                if let Err(rollback_err) = rollback {
                    tracing::error!(
                        "Return booking {} left active: {}",
                        returned.consignment_number,
                        rollback_err
                    );
                }
                Err(e)
            }
        }
    }
}

fn check_open(manifest: &Manifest, operation: ManifestOperation) -> Result<(), LifecycleError> {
    if manifest.mshipment_status != ManifestStatus::InTransit {
        return Err(LifecycleError::InvalidManifestTransition {
            manifest: manifest.manifestation_number.clone(),
            status: manifest.mshipment_status,
            action: operation.as_str(),
        });
    }
    Ok(())
}

fn unchanged(manifest: Manifest) -> ManifestTransition {
    tracing::info!(
        "Manifest {} is already {}",
        manifest.manifestation_number,
        manifest.mshipment_status
    );
    ManifestTransition {
        manifestation_number: manifest.manifestation_number,
        mshipment_status: manifest.mshipment_status,
        consignments: BatchReport::default(),
    }
}
