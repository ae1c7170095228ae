//! Bounded-concurrency batches and conflict-retrying document updates
//!
//! A batch never fails as a whole: every item either lands in `succeeded` or
//! carries its own error in `failed`.

use std::{future::Future, sync::Arc};

use serde::Serialize;
use shared::{BranchScope, Manifest, Shipment};
use tokio::{sync::Semaphore, task::JoinSet};

use crate::error::{AppError, AppResult};
use crate::store::{ManifestStore, ShipmentStore};

/// Per-item outcome of a batch operation
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub item: String,
    pub code: &'static str,
    pub error: String,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&mut self, item: impl Into<String>, error: &AppError) {
        self.failed.push(BatchFailure {
            item: item.into(),
            code: error.code(),
            error: error.to_string(),
        });
    }
}

/// Run `op` for every item, at most `limit` at a time.
///
/// Results are reported in input order regardless of completion order.
pub async fn run_batch<I, T, F, Fut>(
    items: Vec<I>,
    limit: usize,
    label: impl Fn(&I) -> String,
    op: F,
) -> BatchReport<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let mut labels = Vec::with_capacity(items.len());

    for (index, item) in items.into_iter().enumerate() {
        labels.push(label(&item));
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let fut = op(item);
        tasks.spawn(async move {
            let _permit = permit;
            (index, fut.await)
        });
    }

    let mut results: Vec<(usize, AppResult<T>)> = Vec::with_capacity(labels.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("Batch task aborted: {}", e),
        }
    }
    results.sort_by_key(|(index, _)| *index);

    let mut report = BatchReport::default();
    let mut seen = vec![false; labels.len()];
    for (index, result) in results {
        seen[index] = true;
        match result {
            Ok(value) => report.succeeded.push(value),
            Err(e) => report.failure(labels[index].clone(), &e),
        }
    }
    for (index, label) in labels.into_iter().enumerate() {
        if !seen[index] {
            report.failure(label, &AppError::Internal("task did not complete".to_string()));
        }
    }

    report
}

/// Load a shipment, apply `change` and write it back, reloading and
/// reapplying up to `retries` times when another writer got there first.
pub async fn mutate_shipment<T, F>(
    store: &Arc<dyn ShipmentStore>,
    scope: &BranchScope,
    consignment_number: &str,
    retries: u32,
    mut change: F,
) -> AppResult<(Shipment, T)>
where
    F: FnMut(&mut Shipment) -> AppResult<T>,
{
    let mut attempt = 0;
    loop {
        let mut shipment = store
            .get_shipment(consignment_number)
            .await?
            .filter(|s| scope.includes(&s.branch))
            .ok_or_else(|| AppError::NotFound(format!("Shipment {}", consignment_number)))?;

        let value = change(&mut shipment)?;

        match store.update_shipment(shipment).await {
            Ok(saved) => return Ok((saved, value)),
            Err(e) if e.is_conflict() && attempt < retries => {
                attempt += 1;
                tracing::debug!(
                    "Version conflict on shipment {}, retry {}/{}",
                    consignment_number,
                    attempt,
                    retries
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// Manifest counterpart of [`mutate_shipment`]
pub async fn mutate_manifest<T, F>(
    store: &Arc<dyn ManifestStore>,
    scope: &BranchScope,
    manifestation_number: &str,
    retries: u32,
    mut change: F,
) -> AppResult<(Manifest, T)>
where
    F: FnMut(&mut Manifest) -> AppResult<T>,
{
    let mut attempt = 0;
    loop {
        let mut manifest = store
            .get_manifest(manifestation_number)
            .await?
            .filter(|m| scope.includes(&m.branch))
            .ok_or_else(|| AppError::NotFound(format!("Manifest {}", manifestation_number)))?;

        let value = change(&mut manifest)?;

        match store.update_manifest(manifest).await {
            Ok(saved) => return Ok((saved, value)),
            Err(e) if e.is_conflict() && attempt < retries => {
                attempt += 1;
                tracing::debug!(
                    "Version conflict on manifest {}, retry {}/{}",
                    manifestation_number,
                    attempt,
                    retries
                );
            }
            Err(e) => return Err(e),
        }
    }
}
