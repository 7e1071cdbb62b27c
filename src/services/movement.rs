//! Movement engine: atomic transfers between the SALE/HOLD/DUMP buckets of
//! one record, and bulk receipt into any bucket. Every mutation and every
//! audit row for it commit in one transaction.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionError, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::entities::inventory_movement_log::{Bucket, MovementType};
use crate::entities::inventory_record::{self, Entity as InventoryRecord};
use crate::errors::ServiceError;
use crate::events::{outbox, Event, EventSender};
use crate::services::audit::{self, MovementLogEntry};

fn bucket_quantity(record: &inventory_record::Model, bucket: Bucket) -> Decimal {
    match bucket {
        Bucket::Sale => record.available_quantity,
        Bucket::Hold => record.hold_quantity,
        Bucket::Dump => record.dump_quantity,
    }
}

fn set_bucket_quantity(
    active: &mut inventory_record::ActiveModel,
    bucket: Bucket,
    value: Decimal,
) {
    match bucket {
        Bucket::Sale => active.available_quantity = Set(value),
        Bucket::Hold => active.hold_quantity = Set(value),
        Bucket::Dump => active.dump_quantity = Set(value),
    }
}

/// One line of a bulk receipt: quantity added to a target bucket of a SKU.
#[derive(Debug, Clone)]
pub struct ReceiptLine {
    pub sku_code: String,
    pub bucket: Bucket,
    pub quantity: Decimal,
    pub remarks: Option<String>,
}

#[derive(Clone)]
pub struct MovementService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl MovementService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Transfers `quantity` from one bucket to another on a single record.
    ///
    /// Emits exactly two audit rows, one per side of the transfer, with the
    /// bucket pair recorded in the remarks. Quantity is neither created nor
    /// destroyed: the bucket sum is identical before and after.
    #[instrument(skip(self))]
    pub async fn move_stock(
        &self,
        store_id: i32,
        sku_code: &str,
        from: Bucket,
        to: Bucket,
        quantity: Decimal,
        actor: &str,
        source: &str,
    ) -> Result<inventory_record::Model, ServiceError> {
        if from == to {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot move stock from {} to itself",
                from.as_str()
            )));
        }
        let quantity = quantity.round_dp(3);
        if quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "movement quantity {} must be positive",
                quantity
            )));
        }

        let sku = sku_code.to_string();
        let actor = actor.to_string();
        let source = source.to_string();

        let updated = self
            .db
            .transaction::<_, inventory_record::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let record = InventoryRecord::find()
                        .filter(inventory_record::Column::StoreId.eq(store_id))
                        .filter(inventory_record::Column::SkuCode.eq(sku.clone()))
                        .one(txn)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "inventory for sku {} not found in store {}",
                                sku, store_id
                            ))
                        })?;

                    let from_before = bucket_quantity(&record, from);
                    let to_before = bucket_quantity(&record, to);
                    let from_after = (from_before - quantity).round_dp(3);
                    if from_after < Decimal::ZERO {
                        return Err(ServiceError::InsufficientStock(format!(
                            "bucket {} of sku {} holds {} but {} was requested",
                            from.as_str(),
                            sku,
                            from_before,
                            quantity
                        )));
                    }
                    let to_after = (to_before + quantity).round_dp(3);

                    let mut active: inventory_record::ActiveModel = record.clone().into();
                    set_bucket_quantity(&mut active, from, from_after);
                    set_bucket_quantity(&mut active, to, to_after);
                    active.version = Set(record.version + 1);
                    active.updated_at = Set(chrono::Utc::now());
                    let updated = active.update(txn).await?;

                    audit::append(
                        txn,
                        MovementLogEntry {
                            store_id,
                            sku_code: sku.clone(),
                            source: source.clone(),
                            delta: -quantity,
                            from_quantity: from_before,
                            to_quantity: from_after,
                            bucket: from,
                            movement_type: MovementType::Movement,
                            remarks: Some(format!("{}-{}", from.as_str(), to.as_str())),
                            actor: actor.clone(),
                        },
                    )
                    .await?;
                    audit::append(
                        txn,
                        MovementLogEntry {
                            store_id,
                            sku_code: sku.clone(),
                            source: source.clone(),
                            delta: quantity,
                            from_quantity: to_before,
                            to_quantity: to_after,
                            bucket: to,
                            movement_type: MovementType::Movement,
                            remarks: Some(format!("{}-{}", to.as_str(), from.as_str())),
                            actor: actor.clone(),
                        },
                    )
                    .await?;

                    outbox::enqueue(
                        txn,
                        store_id,
                        &sku,
                        "stock_movement",
                        json!({
                            "from": from.as_str(),
                            "to": to.as_str(),
                            "quantity": quantity,
                            "availableQuantity": updated.available_quantity,
                        }),
                    )
                    .await?;

                    Ok(updated)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            store_id,
            sku_code,
            from = from.as_str(),
            to = to.as_str(),
            %quantity,
            "stock moved between buckets"
        );

        self.event_sender
            .send(Event::StockMoved {
                store_id,
                sku_code: sku_code.to_string(),
                from,
                to,
                quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Adds quantity to the target bucket of each line, all lines in one
    /// transaction. Used for warehouse receiving (SALE), goods receipts
    /// against approved purchase orders (GRN), and manual hold-bucket
    /// adjustments with free-text remarks.
    #[instrument(skip(self, lines))]
    pub async fn receive(
        &self,
        store_id: i32,
        lines: Vec<ReceiptLine>,
        movement_type: MovementType,
        actor: &str,
        source: &str,
    ) -> Result<u64, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "receipt must contain at least one line".to_string(),
            ));
        }
        for line in &lines {
            if line.quantity.round_dp(3) <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "receipt quantity {} for sku {} must be positive",
                    line.quantity, line.sku_code
                )));
            }
        }

        let actor = actor.to_string();
        let source = source.to_string();
        let applied: Vec<(String, Bucket, Decimal)> = lines
            .iter()
            .map(|l| (l.sku_code.clone(), l.bucket, l.quantity.round_dp(3)))
            .collect();

        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    for line in lines {
                        let quantity = line.quantity.round_dp(3);
                        let record = InventoryRecord::find()
                            .filter(inventory_record::Column::StoreId.eq(store_id))
                            .filter(inventory_record::Column::SkuCode.eq(line.sku_code.clone()))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "inventory for sku {} not found in store {}",
                                    line.sku_code, store_id
                                ))
                            })?;

                        let before = bucket_quantity(&record, line.bucket);
                        let after = (before + quantity).round_dp(3);

                        let mut active: inventory_record::ActiveModel = record.clone().into();
                        set_bucket_quantity(&mut active, line.bucket, after);
                        active.version = Set(record.version + 1);
                        active.updated_at = Set(chrono::Utc::now());
                        active.update(txn).await?;

                        audit::append(
                            txn,
                            MovementLogEntry {
                                store_id,
                                sku_code: line.sku_code.clone(),
                                source: source.clone(),
                                delta: quantity,
                                from_quantity: before,
                                to_quantity: after,
                                bucket: line.bucket,
                                movement_type,
                                remarks: line.remarks.clone(),
                                actor: actor.clone(),
                            },
                        )
                        .await?;

                        outbox::enqueue(
                            txn,
                            store_id,
                            &line.sku_code,
                            "stock_receipt",
                            json!({
                                "bucket": line.bucket.as_str(),
                                "quantity": quantity,
                                "newQuantity": after,
                            }),
                        )
                        .await?;
                    }
                    Ok(())
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        let count = applied.len() as u64;
        for (sku_code, bucket, quantity) in applied {
            self.event_sender
                .send(Event::StockReceived {
                    store_id,
                    sku_code,
                    bucket,
                    quantity,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        info!(store_id, lines = count, "stock receipt applied");
        Ok(count)
    }
}
