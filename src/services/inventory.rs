//! Ledger service: mapping SKUs into stores, partial updates to stock and
//! price fields (always through the reservation validator), bulk admin
//! updates, and the scheduled quantity reset.

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::entities::inventory_movement_log::{Bucket, MovementType};
use crate::entities::inventory_record::{self, Entity as InventoryRecord};
use crate::entities::product::{self, Entity as Product};
use crate::errors::ServiceError;
use crate::events::{outbox, Event, EventSender};
use crate::services::audit::{self, MovementLogEntry};
use crate::services::price_brackets::{validate_brackets, PriceBracket};
use crate::services::reservation::reserve_to_total;

/// Explicit partial update: one optional field per mutable attribute.
/// Untouched fields stay `None` and are left alone by [`merge_patch`].
#[derive(Debug, Clone, Default)]
pub struct InventoryPatch {
    /// New committed total; available quantity is derived through the
    /// reservation validator, never set directly.
    pub requested_total: Option<Decimal>,
    pub reset_quantity: Option<Decimal>,
    pub market_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    /// `Some(None)` clears the standing marketing override.
    pub marketing_sale_price: Option<Option<Decimal>>,
    pub price_brackets: Option<Vec<PriceBracket>>,
    pub is_active: Option<bool>,
    pub is_complimentary: Option<bool>,
}

/// One row of a bulk update.
#[derive(Debug, Clone)]
pub struct SkuPatch {
    pub sku_code: String,
    pub patch: InventoryPatch,
}

/// Applies a patch to a loaded record, returning the active model to
/// persist plus the audit entry for any quantity change. This is the single
/// merge point for every field-by-field update path.
fn merge_patch(
    record: &inventory_record::Model,
    patch: &InventoryPatch,
    actor: &str,
    source: &str,
) -> Result<(inventory_record::ActiveModel, Option<MovementLogEntry>), ServiceError> {
    let mut active: inventory_record::ActiveModel = record.clone().into();
    let mut log_entry = None;

    if let Some(requested_total) = patch.requested_total {
        let requested_total = requested_total.round_dp(3);
        let new_available = reserve_to_total(record, requested_total)?;
        active.available_quantity = Set(new_available);
        active.committed_total = Set(requested_total);

        // The reset target follows the committed total unless the caller
        // pinned one explicitly in the same patch.
        if requested_total != record.committed_total && patch.reset_quantity.is_none() {
            active.reset_quantity = Set(requested_total);
        }

        if new_available != record.available_quantity {
            log_entry = Some(MovementLogEntry {
                store_id: record.store_id,
                sku_code: record.sku_code.clone(),
                source: source.to_string(),
                delta: new_available - record.available_quantity,
                from_quantity: record.available_quantity,
                to_quantity: new_available,
                bucket: Bucket::Sale,
                movement_type: MovementType::AdminAdjustment,
                remarks: Some(format!("committed total set to {}", requested_total)),
                actor: actor.to_string(),
            });
        }
    }

    if let Some(reset_quantity) = patch.reset_quantity {
        if reset_quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "reset quantity must not be negative".to_string(),
            ));
        }
        active.reset_quantity = Set(reset_quantity.round_dp(3));
    }
    if let Some(market_price) = patch.market_price {
        if market_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "market price must not be negative".to_string(),
            ));
        }
        active.market_price = Set(market_price.round_dp(2));
    }
    if let Some(sale_price) = patch.sale_price {
        if sale_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "sale price must not be negative".to_string(),
            ));
        }
        active.sale_price = Set(sale_price.round_dp(2));
    }
    if let Some(marketing) = &patch.marketing_sale_price {
        active.marketing_sale_price = Set(marketing.map(|p| p.round_dp(2)));
    }
    if let Some(brackets) = &patch.price_brackets {
        let validated = validate_brackets(brackets)?;
        active.price_brackets = Set(Some(serde_json::to_value(&validated).map_err(|e| {
            ServiceError::InternalError(format!("failed to serialize price brackets: {}", e))
        })?));
    }
    if let Some(is_active) = patch.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(is_complimentary) = patch.is_complimentary {
        active.is_complimentary = Set(is_complimentary);
    }

    active.version = Set(record.version + 1);
    active.updated_at = Set(chrono::Utc::now());
    Ok((active, log_entry))
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Creates the zero-stock ledger row when a SKU is first mapped into a
    /// store. The (store, SKU) pair is unique; mapping twice surfaces as
    /// [`ServiceError::AlreadyExists`].
    #[instrument(skip(self))]
    pub async fn create_mapping(
        &self,
        store_id: i32,
        sku_code: &str,
    ) -> Result<inventory_record::Model, ServiceError> {
        let product = Product::find()
            .filter(product::Column::SkuCode.eq(sku_code))
            .one(self.db.as_ref())
            .await?;
        if product.is_none() {
            return Err(ServiceError::NotFound(format!(
                "sku {} does not exist in the catalog",
                sku_code
            )));
        }

        let now = chrono::Utc::now();
        let row = inventory_record::ActiveModel {
            store_id: Set(store_id),
            sku_code: Set(sku_code.to_string()),
            available_quantity: Set(Decimal::ZERO),
            committed_total: Set(Decimal::ZERO),
            hold_quantity: Set(Decimal::ZERO),
            dump_quantity: Set(Decimal::ZERO),
            market_price: Set(Decimal::ZERO),
            sale_price: Set(Decimal::ZERO),
            max_price: Set(None),
            marketing_sale_price: Set(None),
            price_brackets: Set(None),
            reset_quantity: Set(Decimal::ZERO),
            is_active: Set(true),
            is_complimentary: Set(false),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = row
            .insert(self.db.as_ref())
            .await
            .map_err(|e| ServiceError::from_insert_err(e, store_id, sku_code))?;

        self.event_sender
            .send(Event::InventoryMapped {
                store_id,
                sku_code: sku_code.to_string(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(store_id, sku_code, "sku mapped into store");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(
        &self,
        store_id: i32,
        sku_code: &str,
    ) -> Result<Option<inventory_record::Model>, ServiceError> {
        let record = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id))
            .filter(inventory_record::Column::SkuCode.eq(sku_code))
            .one(self.db.as_ref())
            .await?;
        Ok(record)
    }

    /// Paginated listing of a store's ledger rows.
    #[instrument(skip(self))]
    pub async fn list_store(
        &self,
        store_id: i32,
        only_active: bool,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_record::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(ServiceError::ValidationError(
                "Limit must be between 1 and 1000".to_string(),
            ));
        }

        let mut query = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id));
        if only_active {
            query = query.filter(inventory_record::Column::IsActive.eq(true));
        }
        query = query.order_by_asc(inventory_record::Column::SkuCode);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let records = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;
        Ok((records, total))
    }

    /// Applies one patch to one row inside a transaction.
    #[instrument(skip(self, patch))]
    pub async fn update_stock(
        &self,
        store_id: i32,
        sku_code: &str,
        patch: InventoryPatch,
        actor: &str,
        source: &str,
    ) -> Result<inventory_record::Model, ServiceError> {
        let updated = self
            .apply_patches(store_id, vec![SkuPatch {
                sku_code: sku_code.to_string(),
                patch,
            }], actor, source)
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("patch produced no row".to_string()))?;
        Ok(updated)
    }

    /// Applies patches to many rows of one store, all-or-nothing. Both the
    /// admin bulk update and the CSV-driven bulk update land here.
    #[instrument(skip(self, patches), fields(batch = patches.len()))]
    pub async fn bulk_update(
        &self,
        store_id: i32,
        patches: Vec<SkuPatch>,
        actor: &str,
        source: &str,
    ) -> Result<u64, ServiceError> {
        let count = patches.len() as u64;
        self.apply_patches(store_id, patches, actor, source).await?;
        Ok(count)
    }

    async fn apply_patches(
        &self,
        store_id: i32,
        patches: Vec<SkuPatch>,
        actor: &str,
        source: &str,
    ) -> Result<Vec<inventory_record::Model>, ServiceError> {
        if patches.is_empty() {
            return Err(ServiceError::ValidationError(
                "update batch must not be empty".to_string(),
            ));
        }

        let actor = actor.to_string();
        let source = source.to_string();

        let updated = self
            .db
            .transaction::<_, Vec<inventory_record::Model>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let mut results = Vec::with_capacity(patches.len());
                    for SkuPatch { sku_code, patch } in patches {
                        let record = InventoryRecord::find()
                            .filter(inventory_record::Column::StoreId.eq(store_id))
                            .filter(inventory_record::Column::SkuCode.eq(sku_code.clone()))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "inventory for sku {} not found in store {}",
                                    sku_code, store_id
                                ))
                            })?;

                        let (active, log_entry) =
                            merge_patch(&record, &patch, &actor, &source)?;
                        let saved = active.update(txn).await?;

                        if let Some(entry) = log_entry {
                            audit::append(txn, entry).await?;
                        }

                        outbox::enqueue(
                            txn,
                            store_id,
                            &saved.sku_code,
                            "inventory_update",
                            json!({
                                "availableQuantity": saved.available_quantity,
                                "committedTotal": saved.committed_total,
                                "salePrice": saved.sale_price,
                                "marketPrice": saved.market_price,
                            }),
                        )
                        .await?;

                        results.push(saved);
                    }
                    Ok(results)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        for record in &updated {
            self.event_sender
                .send(Event::StockLevelSet {
                    store_id,
                    sku_code: record.sku_code.clone(),
                    committed_total: record.committed_total,
                    available_quantity: record.available_quantity,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(updated)
    }

    /// Scheduled reset: restores every active row's available quantity to
    /// its reset target, preserving the externally held amount. Triggered
    /// by an external cron, executed synchronously per store.
    #[instrument(skip(self))]
    pub async fn reset_store_quantities(
        &self,
        store_id: i32,
        actor: &str,
    ) -> Result<u64, ServiceError> {
        let actor = actor.to_string();
        let reset_count = self
            .db
            .transaction::<_, u64, ServiceError>(move |txn| {
                Box::pin(async move {
                    let records = InventoryRecord::find()
                        .filter(inventory_record::Column::StoreId.eq(store_id))
                        .filter(inventory_record::Column::IsActive.eq(true))
                        .all(txn)
                        .await?;

                    let mut count = 0u64;
                    for record in records {
                        let target = record.reset_quantity.round_dp(3);
                        if record.available_quantity == target {
                            continue;
                        }
                        let held = record.externally_held();

                        let mut active: inventory_record::ActiveModel = record.clone().into();
                        active.available_quantity = Set(target);
                        active.committed_total = Set((target + held).round_dp(3));
                        active.version = Set(record.version + 1);
                        active.updated_at = Set(chrono::Utc::now());
                        active.update(txn).await?;

                        audit::append(
                            txn,
                            MovementLogEntry {
                                store_id,
                                sku_code: record.sku_code.clone(),
                                source: "Scheduled Reset".to_string(),
                                delta: target - record.available_quantity,
                                from_quantity: record.available_quantity,
                                to_quantity: target,
                                bucket: Bucket::Sale,
                                movement_type: MovementType::Reset,
                                remarks: None,
                                actor: actor.clone(),
                            },
                        )
                        .await?;
                        count += 1;
                    }
                    Ok(count)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        self.event_sender
            .send(Event::StoreReset {
                store_id,
                records_reset: reset_count,
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(store_id, reset_count, "store quantities reset");
        Ok(reset_count)
    }

    /// Soft-deactivates a row; ledger rows are never hard-deleted.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, store_id: i32, sku_code: &str) -> Result<(), ServiceError> {
        let record = self.get(store_id, sku_code).await?.ok_or_else(|| {
            ServiceError::NotFound(format!(
                "inventory for sku {} not found in store {}",
                sku_code, store_id
            ))
        })?;

        let version = record.version;
        let mut active: inventory_record::ActiveModel = record.into();
        active.is_active = Set(false);
        active.version = Set(version + 1);
        active.updated_at = Set(chrono::Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
