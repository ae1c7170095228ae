//! PostgreSQL store keeping each document as JSONB next to its indexed columns

use async_trait::async_trait;
use shared::{Manifest, SequenceKind, Shipment};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};

use super::{ManifestFilter, ManifestStore, SequenceStore, ShipmentFilter, ShipmentStore};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn with_version<T>(row: (Json<T>, i64), set: impl FnOnce(&mut T, i64)) -> T {
    let (Json(mut document), version) = row;
    set(&mut document, version);
    document
}

#[async_trait]
impl ShipmentStore for PgStore {
    async fn insert_shipment(&self, mut shipment: Shipment) -> AppResult<Shipment> {
        shipment.version = 1;
        let result = sqlx::query(
            r#"
            INSERT INTO shipments (consignment_number, branch, status, username, booking_date, document, version)
            VALUES ($1, $2, $3, $4, $5, $6, 1)
            "#,
        )
        .bind(&shipment.consignment_number)
        .bind(&shipment.branch)
        .bind(shipment.shipment_status.as_str())
        .bind(&shipment.username)
        .bind(shipment.booking_date)
        .bind(Json(&shipment))
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(shipment),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEntry(format!(
                "Consignment {}",
                shipment.consignment_number
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_shipment(&self, consignment_number: &str) -> AppResult<Option<Shipment>> {
        let row = sqlx::query_as::<_, (Json<Shipment>, i64)>(
            "SELECT document, version FROM shipments WHERE consignment_number = $1",
        )
        .bind(consignment_number)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| with_version(r, |s, v| s.version = v)))
    }

    async fn list_shipments(&self, filter: &ShipmentFilter) -> AppResult<Vec<Shipment>> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT document, version FROM shipments WHERE TRUE");
        if let Some(branch) = filter.branch.code() {
            query.push(" AND branch = ").push_bind(branch.to_string());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(username) = &filter.username {
            query.push(" AND username = ").push_bind(username.clone());
        }
        if let Some(from) = filter.booked_from {
            query.push(" AND booking_date >= ").push_bind(from);
        }
        if let Some(until) = filter.booked_until {
            query.push(" AND booking_date < ").push_bind(until);
        }
        query.push(" ORDER BY booking_date DESC, consignment_number ASC");

        let rows = query
            .build_query_as::<(Json<Shipment>, i64)>()
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| with_version(r, |s, v| s.version = v))
            .collect())
    }

    async fn update_shipment(&self, mut shipment: Shipment) -> AppResult<Shipment> {
        let expected = shipment.version;
        shipment.version = expected + 1;
        shipment.updated_at = chrono::Utc::now();

        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE shipments
            SET branch = $1, status = $2, username = $3, booking_date = $4, document = $5,
                version = version + 1, updated_at = NOW()
            WHERE consignment_number = $6 AND version = $7
            RETURNING version
            "#,
        )
        .bind(&shipment.branch)
        .bind(shipment.shipment_status.as_str())
        .bind(&shipment.username)
        .bind(shipment.booking_date)
        .bind(Json(&shipment))
        .bind(&shipment.consignment_number)
        .bind(expected)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(version) => {
                shipment.version = version;
                Ok(shipment)
            }
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM shipments WHERE consignment_number = $1)",
                )
                .bind(&shipment.consignment_number)
                .fetch_one(&self.db)
                .await?;

                if exists {
                    Err(AppError::VersionConflict {
                        resource: format!("Shipment {}", shipment.consignment_number),
                        expected,
                    })
                } else {
                    Err(AppError::NotFound(format!(
                        "Shipment {}",
                        shipment.consignment_number
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl ManifestStore for PgStore {
    async fn insert_manifest(&self, mut manifest: Manifest) -> AppResult<Manifest> {
        manifest.version = 1;
        let result = sqlx::query(
            r#"
            INSERT INTO manifests (manifestation_number, branch, status, document, version)
            VALUES ($1, $2, $3, $4, 1)
            "#,
        )
        .bind(&manifest.manifestation_number)
        .bind(&manifest.branch)
        .bind(manifest.mshipment_status.as_str())
        .bind(Json(&manifest))
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(manifest),
            Err(e) if is_unique_violation(&e) => Err(AppError::DuplicateEntry(format!(
                "Manifest {}",
                manifest.manifestation_number
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_manifest(&self, manifestation_number: &str) -> AppResult<Option<Manifest>> {
        let row = sqlx::query_as::<_, (Json<Manifest>, i64)>(
            "SELECT document, version FROM manifests WHERE manifestation_number = $1",
        )
        .bind(manifestation_number)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| with_version(r, |m, v| m.version = v)))
    }

    async fn list_manifests(&self, filter: &ManifestFilter) -> AppResult<Vec<Manifest>> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT document, version FROM manifests WHERE TRUE");
        if let Some(branch) = filter.branch.code() {
            query.push(" AND branch = ").push_bind(branch.to_string());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<(Json<Manifest>, i64)>()
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| with_version(r, |m, v| m.version = v))
            .collect())
    }

    async fn update_manifest(&self, mut manifest: Manifest) -> AppResult<Manifest> {
        let expected = manifest.version;
        manifest.version = expected + 1;
        manifest.updated_at = chrono::Utc::now();

        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE manifests
            SET status = $1, document = $2, version = version + 1, updated_at = NOW()
            WHERE manifestation_number = $3 AND version = $4
            RETURNING version
            "#,
        )
        .bind(manifest.mshipment_status.as_str())
        .bind(Json(&manifest))
        .bind(&manifest.manifestation_number)
        .bind(expected)
        .fetch_optional(&self.db)
        .await?;

        match updated {
            Some(version) => {
                manifest.version = version;
                Ok(manifest)
            }
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM manifests WHERE manifestation_number = $1)",
                )
                .bind(&manifest.manifestation_number)
                .fetch_one(&self.db)
                .await?;

                if exists {
                    Err(AppError::VersionConflict {
                        resource: format!("Manifest {}", manifest.manifestation_number),
                        expected,
                    })
                } else {
                    Err(AppError::NotFound(format!(
                        "Manifest {}",
                        manifest.manifestation_number
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl SequenceStore for PgStore {
    async fn next_value(
        &self,
        branch: &str,
        kind: SequenceKind,
        fiscal_year: &str,
    ) -> AppResult<i64> {
        let value = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO sequences (branch, kind, fiscal_year, value)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (branch, kind, fiscal_year)
            DO UPDATE SET value = sequences.value + 1
            RETURNING value
            "#,
        )
        .bind(branch)
        .bind(kind.as_str())
        .bind(fiscal_year)
        .fetch_one(&self.db)
        .await?;

        Ok(value)
    }
}
