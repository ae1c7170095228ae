//! Shipment (consignment) booking, queries and direct status changes

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    apply_direct_delivery, book, cancel_shipment, mark_invoiced, validate_address,
    validate_document_number, validate_shipment_lines, Address, ApplyOutcome, BranchScope, Charge,
    Invoice, LifecycleError, PaginatedResponse, Pagination, PartyRef, ProductLine, QuantityLedger,
    RequestScope, Shipment, ShipmentStatus,
};
use uuid::Uuid;
use validator::Validate;

use super::batch::{mutate_shipment, run_batch, BatchReport};
use super::sequence::SequenceService;
use crate::config::LifecycleConfig;
use crate::error::{AppError, AppResult};
use crate::store::{ShipmentFilter, Stores};

#[derive(Clone)]
pub struct ShipmentService {
    stores: Stores,
    lifecycle: LifecycleConfig,
    sequences: SequenceService,
}

/// Booking request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookShipmentInput {
    /// Allocated from the branch sequence when absent
    #[validate(length(min = 1, max = 64))]
    pub consignment_number: Option<String>,
    pub booking_date: Option<NaiveDate>,
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
    #[validate(length(min = 1))]
    pub invoices: Vec<InvoiceInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceInput {
    #[validate(length(min = 1, max = 64))]
    pub invoice_number: String,
    #[serde(default)]
    pub invoice_value: Decimal,
    #[validate(length(min = 1))]
    pub products: Vec<ProductInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductInput {
    /// Kept when editing an existing line
    #[serde(rename = "lineId")]
    pub line_id: Option<Uuid>,
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100))]
    pub product_type: String,
    pub amount: Decimal,
}

/// Partial edit of a booking. Invoices can only change before any stock moved.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShipmentInput {
    /// Version the client last read; the stored one is used when absent
    pub version: Option<i64>,
    pub consignor: Option<PartyRef>,
    pub consignee: Option<PartyRef>,
    pub billing_address: Option<Address>,
    pub pickup_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub charges: Option<Vec<Charge>>,
    #[validate(length(min = 1))]
    pub invoices: Option<Vec<InvoiceInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShipmentQuery {
    pub status: Option<String>,
    pub username: Option<String>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CancelShipmentInput {
    pub reason: Option<String>,
}

/// Delivery recorded outside any manifest
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DirectDeliveryInput {
    #[validate(length(min = 1, max = 64))]
    pub consignment_number: String,
    /// Client reference making retries idempotent
    pub reference: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<DeliveredItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveredItem {
    #[serde(rename = "type")]
    pub product_type: String,
    pub qty: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRecord {
    pub consignment_number: String,
    pub shipment_status: ShipmentStatus,
    pub outcome: ApplyOutcome,
}

fn validate_invoices(inputs: &[InvoiceInput]) -> AppResult<()> {
    for invoice in inputs {
        invoice.validate()?;
        for product in &invoice.products {
            product.validate()?;
        }
    }
    Ok(())
}

fn build_invoices(inputs: Vec<InvoiceInput>) -> Vec<Invoice> {
    inputs
        .into_iter()
        .map(|invoice| Invoice {
            invoice_number: invoice.invoice_number.trim().to_string(),
            invoice_value: invoice.invoice_value,
            products: invoice
                .products
                .into_iter()
                .map(|p| ProductLine {
                    line_id: p.line_id.unwrap_or_else(Uuid::nil),
                    ..ProductLine::new(p.product_type.trim(), p.amount)
                })
                .collect(),
        })
        .collect()
}

fn check_addresses(addresses: [&Address; 3]) -> AppResult<()> {
    for (field, address) in ["billingAddress", "pickupAddress", "deliveryAddress"]
        .into_iter()
        .zip(addresses)
    {
        validate_address(address).map_err(|m| AppError::validation(field, m))?;
    }
    Ok(())
}

impl ShipmentService {
    pub fn new(stores: Stores, lifecycle: LifecycleConfig) -> Self {
        let sequences = SequenceService::new(&stores, &lifecycle);
        Self {
            stores,
            lifecycle,
            sequences,
        }
    }

    /// Book a new consignment in the caller's branch
    pub async fn book(
        &self,
        scope: &RequestScope,
        input: BookShipmentInput,
    ) -> AppResult<Shipment> {
        let branch = scope
            .branch
            .code()
            .ok_or(LifecycleError::BranchNotSelected)?
            .to_string();
        input.validate()?;
        validate_invoices(&input.invoices)?;
        check_addresses([
            &input.billing_address,
            &input.pickup_address,
            &input.delivery_address,
        ])?;

        let booking_date = input.booking_date.unwrap_or_else(|| Utc::now().date_naive());
        let consignment_number = match input.consignment_number {
            Some(number) => number.trim().to_string(),
            None => {
                self.sequences
                    .next_consignment_number(&branch, booking_date)
                    .await?
                    .number
            }
        };
        validate_document_number(&consignment_number)
            .map_err(|m| AppError::validation("consignmentNumber", m))?;

        let now = Utc::now();
        let mut shipment = Shipment {
            consignment_number,
            branch,
            username: scope.username.clone(),
            email: scope.email.clone(),
            booking_date,
            shipment_status: ShipmentStatus::Pending,
            cancel_reason: None,
            consignor: input.consignor,
            consignee: input.consignee,
            billing_address: input.billing_address,
            pickup_address: input.pickup_address,
            delivery_address: input.delivery_address,
            charges: input.charges,
            invoices: build_invoices(input.invoices),
            applied_transitions: BTreeSet::new(),
            return_of: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        validate_shipment_lines(&shipment).map_err(|m| AppError::validation("invoices", m))?;
        book(&mut shipment)?;

        let shipment = self.stores.shipments.insert_shipment(shipment).await?;
        tracing::info!(
            "Booked consignment {} at {}",
            shipment.consignment_number,
            shipment.branch
        );
        Ok(shipment)
    }

    /// Get a consignment visible in the caller's scope
    pub async fn get(&self, scope: &RequestScope, consignment_number: &str) -> AppResult<Shipment> {
        self.stores
            .shipments
            .get_shipment(consignment_number)
            .await?
            .filter(|s| scope.branch.includes(&s.branch))
            .ok_or_else(|| AppError::NotFound(format!("Shipment {}", consignment_number)))
    }

    pub async fn list(
        &self,
        scope: &RequestScope,
        query: ShipmentQuery,
    ) -> AppResult<PaginatedResponse<Shipment>> {
        let status = match query.status.as_deref() {
            Some(raw) => Some(
                ShipmentStatus::parse(raw)
                    .ok_or_else(|| AppError::validation("status", "unknown shipment status"))?,
            ),
            None => None,
        };
        let filter = ShipmentFilter {
            branch: scope.branch.clone(),
            status,
            username: query.username,
            booked_from: query.from,
            booked_until: query.until,
        };
        let pagination = Pagination {
            page: query.page.unwrap_or(1),
            per_page: query.per_page.unwrap_or(50).min(500),
        };

        let shipments = self.stores.shipments.list_shipments(&filter).await?;
        Ok(pagination.paginate(&shipments))
    }

    /// Edit a booking
    pub async fn update(
        &self,
        scope: &RequestScope,
        consignment_number: &str,
        input: UpdateShipmentInput,
    ) -> AppResult<Shipment> {
        input.validate()?;
        if let Some(invoices) = &input.invoices {
            validate_invoices(invoices)?;
        }

        let mut shipment = self.get(scope, consignment_number).await?;
        if let Some(version) = input.version {
            shipment.version = version;
        }
        if shipment.shipment_status.is_sticky() {
            return Err(LifecycleError::InvalidShipmentTransition {
                consignment: shipment.consignment_number.clone(),
                status: shipment.shipment_status,
                action: "edit",
            }
            .into());
        }

        if let Some(consignor) = input.consignor {
            shipment.consignor = consignor;
        }
        if let Some(consignee) = input.consignee {
            shipment.consignee = consignee;
        }
        if let Some(address) = input.billing_address {
            shipment.billing_address = address;
        }
        if let Some(address) = input.pickup_address {
            shipment.pickup_address = address;
        }
        if let Some(address) = input.delivery_address {
            shipment.delivery_address = address;
        }
        if let Some(charges) = input.charges {
            shipment.charges = charges;
        }
        check_addresses([
            &shipment.billing_address,
            &shipment.pickup_address,
            &shipment.delivery_address,
        ])?;

        if let Some(invoices) = input.invoices {
            if shipment.has_moved_stock() || shipment.shipment_status != ShipmentStatus::Pending {
                return Err(
                    LifecycleError::StockInTransit(shipment.consignment_number.clone()).into(),
                );
            }
            shipment.invoices = build_invoices(invoices);
            validate_shipment_lines(&shipment).map_err(|m| AppError::validation("invoices", m))?;
            book(&mut shipment)?;
        }

        let shipment = self.stores.shipments.update_shipment(shipment).await?;
        tracing::info!("Updated consignment {}", shipment.consignment_number);
        Ok(shipment)
    }

    /// Soft-cancel a booking that has not moved any stock
    pub async fn cancel(
        &self,
        scope: &RequestScope,
        consignment_number: &str,
        input: CancelShipmentInput,
    ) -> AppResult<Shipment> {
        let (shipment, _) = mutate_shipment(
            &self.stores.shipments,
            &scope.branch,
            consignment_number,
            self.lifecycle.conflict_retries,
            |s| Ok(cancel_shipment(s, input.reason.clone())?),
        )
        .await?;

        tracing::info!("Cancelled consignment {}", shipment.consignment_number);
        Ok(shipment)
    }

    /// Record deliveries that did not travel on a manifest
    pub async fn deliver_items(
        &self,
        scope: &RequestScope,
        deliveries: Vec<DirectDeliveryInput>,
    ) -> AppResult<BatchReport<DeliveryRecord>> {
        if deliveries.is_empty() {
            return Err(LifecycleError::EmptySelection.into());
        }
        for delivery in &deliveries {
            delivery.validate()?;
            for (i, item) in delivery.items.iter().enumerate() {
                if item.qty <= Decimal::ZERO {
                    return Err(AppError::validation(
                        format!("items[{}].qty", i),
                        "Quantity must be positive",
                    ));
                }
            }
        }

        let store = self.stores.shipments.clone();
        let branch = scope.branch.clone();
        let retries = self.lifecycle.conflict_retries;

        let report = run_batch(
            deliveries,
            self.lifecycle.max_parallel_updates,
            |d| d.consignment_number.clone(),
            move |delivery| {
                let store = store.clone();
                let branch = branch.clone();
                async move {
                    let reference = delivery
                        .reference
                        .clone()
                        .unwrap_or_else(|| Uuid::new_v4().to_string());
                    let ledger = QuantityLedger::from_type_quantities(
                        delivery.items.iter().map(|i| (i.product_type.as_str(), i.qty)),
                    );
                    let (shipment, outcome) = mutate_shipment(
                        &store,
                        &branch,
                        &delivery.consignment_number,
                        retries,
                        |s| Ok(apply_direct_delivery(s, &reference, &ledger)?),
                    )
                    .await?;

                    if !outcome.is_fully_reconciled() {
                        tracing::warn!(
                            "Delivery on {} left {:?} unreconciled",
                            shipment.consignment_number,
                            outcome.unreconciled
                        );
                    }
                    Ok(DeliveryRecord {
                        consignment_number: shipment.consignment_number,
                        shipment_status: shipment.shipment_status,
                        outcome,
                    })
                }
            },
        )
        .await;

        tracing::info!(
            "Direct delivery: {} recorded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Move delivered consignments to Invoiced
    pub async fn mark_invoiced(
        &self,
        scope: &RequestScope,
        consignment_numbers: Vec<String>,
    ) -> AppResult<BatchReport<Shipment>> {
        if consignment_numbers.is_empty() {
            return Err(LifecycleError::EmptySelection.into());
        }

        let store = self.stores.shipments.clone();
        let branch: BranchScope = scope.branch.clone();
        let retries = self.lifecycle.conflict_retries;

        let report = run_batch(
            dedup(consignment_numbers),
            self.lifecycle.max_parallel_updates,
            |n| n.clone(),
            move |number| {
                let store = store.clone();
                let branch = branch.clone();
                async move {
                    let (shipment, _) = mutate_shipment(&store, &branch, &number, retries, |s| {
                        Ok(mark_invoiced(s)?)
                    })
                    .await?;
                    Ok(shipment)
                }
            },
        )
        .await;

        tracing::info!(
            "Invoiced {} consignments, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Drop repeated numbers, keeping first-seen order
pub(crate) fn dedup(numbers: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    numbers
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect()
}
