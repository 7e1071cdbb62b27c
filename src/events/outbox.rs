//! Transactional outbox for pushes to the external warehouse service.
//!
//! The local DB commit and the warehouse push are not atomic with each
//! other, so stock/price writers enqueue a row here **inside the same
//! transaction** as their mutation, and this worker drains the rows
//! asynchronously with exponential backoff. A row that exhausts its retry
//! budget is parked as `failed` for support tooling; it never rolls back
//! the already-committed local change.

use chrono::{Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::warehouse::{WarehousePush, WarehouseClient};
use crate::entities::warehouse_outbox::{self, Entity as WarehouseOutbox, OutboxStatus};
use crate::errors::ServiceError;

const MAX_ATTEMPTS: i32 = 8;
const BASE_BACKOFF_SECS: i64 = 2;

/// Enqueue a warehouse push. Call with the caller's open transaction so the
/// outbox row commits or rolls back together with the stock mutation.
pub async fn enqueue<C: ConnectionTrait>(
    db: &C,
    store_id: i32,
    sku_code: &str,
    event_type: &str,
    payload: Value,
) -> Result<Uuid, ServiceError> {
    let now = Utc::now();
    let id = Uuid::new_v4();
    let row = warehouse_outbox::ActiveModel {
        id: Set(id),
        store_id: Set(store_id),
        sku_code: Set(sku_code.to_string()),
        event_type: Set(event_type.to_string()),
        payload: Set(payload),
        status: Set(OutboxStatus::Pending.as_str().to_string()),
        attempts: Set(0),
        available_at: Set(now),
        last_error: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    };
    row.insert(db).await?;
    Ok(id)
}

/// Background worker that polls the outbox and pushes rows to the warehouse
/// client.
pub struct OutboxWorker {
    db: Arc<DatabaseConnection>,
    warehouse: Arc<dyn WarehouseClient>,
    poll_interval: Duration,
}

impl OutboxWorker {
    pub fn new(
        db: Arc<DatabaseConnection>,
        warehouse: Arc<dyn WarehouseClient>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            db,
            warehouse,
            poll_interval,
        }
    }

    /// Spawns the polling loop. One worker per deployment is expected.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("warehouse outbox worker started");
            loop {
                if let Err(e) = self.drain_once(50).await {
                    error!(error = %e, "outbox drain failed");
                }
                sleep(self.poll_interval).await;
            }
        })
    }

    /// Claims and dispatches up to `batch_size` due rows. Public so tests
    /// can drive the worker without the polling loop.
    pub async fn drain_once(&self, batch_size: u64) -> Result<u64, ServiceError> {
        let now = Utc::now();
        let due = WarehouseOutbox::find()
            .filter(warehouse_outbox::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .filter(warehouse_outbox::Column::AvailableAt.lte(now))
            .order_by_asc(warehouse_outbox::Column::CreatedAt)
            .limit(batch_size)
            .all(self.db.as_ref())
            .await?;

        let mut delivered = 0u64;
        for row in due {
            let attempts = row.attempts + 1;
            let mut claim: warehouse_outbox::ActiveModel = row.clone().into();
            claim.status = Set(OutboxStatus::Processing.as_str().to_string());
            claim.attempts = Set(attempts);
            claim.updated_at = Set(Utc::now());
            let claimed = claim.update(self.db.as_ref()).await?;

            let push = WarehousePush {
                store_id: row.store_id,
                sku_code: row.sku_code.clone(),
                event_type: row.event_type.clone(),
                payload: row.payload.clone(),
            };

            match self.warehouse.push(&push).await {
                Ok(()) => {
                    let mut done: warehouse_outbox::ActiveModel = claimed.into();
                    done.status = Set(OutboxStatus::Delivered.as_str().to_string());
                    done.last_error = Set(None);
                    done.updated_at = Set(Utc::now());
                    done.update(self.db.as_ref()).await?;
                    delivered += 1;
                }
                Err(e) => {
                    let mut retry: warehouse_outbox::ActiveModel = claimed.into();
                    if attempts < MAX_ATTEMPTS {
                        let backoff = BASE_BACKOFF_SECS.saturating_pow(attempts as u32);
                        retry.status = Set(OutboxStatus::Pending.as_str().to_string());
                        retry.available_at = Set(Utc::now() + ChronoDuration::seconds(backoff));
                        retry.last_error = Set(Some(e.to_string()));
                        warn!(
                            outbox_id = %row.id,
                            attempts,
                            backoff_secs = backoff,
                            "warehouse push failed, scheduling retry"
                        );
                    } else {
                        retry.status = Set(OutboxStatus::Failed.as_str().to_string());
                        retry.last_error = Set(Some(format!("max attempts exceeded: {}", e)));
                        error!(outbox_id = %row.id, "warehouse push permanently failed");
                    }
                    retry.updated_at = Set(Utc::now());
                    retry.update(self.db.as_ref()).await?;
                }
            }
        }
        Ok(delivered)
    }
}
