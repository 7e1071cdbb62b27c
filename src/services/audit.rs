//! Append-only movement log. Stock engines write entries inside their own
//! transactions via [`append`]; paths outside a critical section use
//! [`AuditLogService::record_best_effort`], which never propagates a
//! failure back to the caller. No update or delete exists for this table.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::inventory_movement_log::{self, Bucket, Entity as MovementLog, MovementType};
use crate::errors::ServiceError;

/// One audit entry, before it is assigned an id and timestamp.
#[derive(Debug, Clone)]
pub struct MovementLogEntry {
    pub store_id: i32,
    pub sku_code: String,
    pub source: String,
    pub delta: Decimal,
    pub from_quantity: Decimal,
    pub to_quantity: Decimal,
    pub bucket: Bucket,
    pub movement_type: MovementType,
    pub remarks: Option<String>,
    pub actor: String,
}

/// Writes one entry on the caller's connection (usually an open
/// transaction, so the entry commits or rolls back with the mutation it
/// describes).
pub async fn append<C: ConnectionTrait>(
    db: &C,
    entry: MovementLogEntry,
) -> Result<(), ServiceError> {
    let row = inventory_movement_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(entry.store_id),
        sku_code: Set(entry.sku_code),
        source: Set(entry.source),
        delta: Set(entry.delta),
        from_quantity: Set(entry.from_quantity),
        to_quantity: Set(entry.to_quantity),
        bucket: Set(entry.bucket.as_str().to_string()),
        movement_type: Set(entry.movement_type.as_str().to_string()),
        remarks: Set(entry.remarks),
        actor: Set(entry.actor),
        created_at: Set(Utc::now()),
    };
    row.insert(db).await?;
    Ok(())
}

#[derive(Clone)]
pub struct AuditLogService {
    db: Arc<DatabaseConnection>,
}

impl AuditLogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Writes an entry outside any transaction, swallowing failures: a
    /// logging problem must never block a stock mutation that already
    /// committed.
    pub async fn record_best_effort(&self, entry: MovementLogEntry) {
        let sku = entry.sku_code.clone();
        if let Err(e) = append(self.db.as_ref(), entry).await {
            warn!(sku_code = %sku, error = %e, "movement log write failed, continuing");
        }
    }

    /// Paginated listing for reporting and support tooling.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        store_id: i32,
        sku_code: Option<&str>,
        movement_type: Option<MovementType>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_movement_log::Model>, u64), ServiceError> {
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

        let mut query = MovementLog::find()
            .filter(inventory_movement_log::Column::StoreId.eq(store_id));
        if let Some(sku) = sku_code {
            query = query.filter(inventory_movement_log::Column::SkuCode.eq(sku));
        }
        if let Some(mt) = movement_type {
            query = query.filter(inventory_movement_log::Column::MovementType.eq(mt.as_str()));
        }
        query = query.order_by_desc(inventory_movement_log::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let entries = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok((entries, total))
    }
}
