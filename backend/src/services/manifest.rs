//! Manifest queries

use serde::Deserialize;
use shared::{Manifest, ManifestStatus, PaginatedResponse, Pagination, RequestScope};

use crate::error::{AppError, AppResult};
use crate::store::{ManifestFilter, Stores};

#[derive(Clone)]
pub struct ManifestService {
    stores: Stores,
}

#[derive(Debug, Default, Deserialize)]
pub struct ManifestQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ManifestService {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    pub async fn get(&self, scope: &RequestScope, manifestation_number: &str) -> AppResult<Manifest> {
        self.stores
            .manifests
            .get_manifest(manifestation_number)
            .await?
            .filter(|m| scope.branch.includes(&m.branch))
            .ok_or_else(|| AppError::NotFound(format!("Manifest {}", manifestation_number)))
    }

    pub async fn list(
        &self,
        scope: &RequestScope,
        query: ManifestQuery,
    ) -> AppResult<PaginatedResponse<Manifest>> {
        let status = match query.status.as_deref() {
            Some(raw) => Some(
                ManifestStatus::parse(raw)
                    .ok_or_else(|| AppError::validation("status", "unknown manifest status"))?,
            ),
            None => None,
        };
        let filter = ManifestFilter {
            branch: scope.branch.clone(),
            status,
        };
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(50).min(500),
        };

        let manifests = self.stores.manifests.list_manifests(&filter).await?;
        Ok(pagination.paginate(&manifests))
    }
}
