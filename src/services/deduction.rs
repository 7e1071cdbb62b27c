//! Deduction engine: batch, all-or-nothing stock decrement enforcing the
//! per-product buffer floor. Used for order deduction and admin corrections.

use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionError, TransactionTrait,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::clients::recommendations::{PurchaseSignal, RecommendationClient};
use crate::entities::inventory_movement_log::{Bucket, MovementType};
use crate::entities::inventory_record::{self, Entity as InventoryRecord};
use crate::entities::product::{self, Entity as Product};
use crate::errors::{
    DeductionOutcome, ServiceError, SkuDeductionError, StockErrorCode,
};
use crate::events::{Event, EventSender};
use crate::services::audit::{self, MovementLogEntry};

const DEDUCTION_SOURCE: &str = "Verify and Deduct";

/// One requested decrement.
#[derive(Debug, Clone)]
pub struct DeductionRequest {
    pub sku_code: String,
    pub quantity: Decimal,
}

#[derive(Debug, Clone)]
struct PlannedDeduction {
    record: inventory_record::Model,
    quantity: Decimal,
    updated: Decimal,
}

#[derive(Clone)]
pub struct DeductionService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    recommendations: Arc<dyn RecommendationClient>,
}

impl DeductionService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        recommendations: Arc<dyn RecommendationClient>,
    ) -> Self {
        Self {
            db,
            event_sender,
            recommendations,
        }
    }

    /// Verifies the whole batch against current stock and the per-product
    /// buffer floor, then applies it atomically. Any failing SKU rejects
    /// the entire batch with structured per-SKU errors and no mutation.
    ///
    /// All quantity arithmetic is fixed to 3 decimal places before
    /// comparison and storage so repeated fractional deductions cannot
    /// accumulate float drift.
    #[instrument(skip(self, requests), fields(batch = requests.len()))]
    pub async fn verify_and_deduct(
        &self,
        store_id: i32,
        user_id: Option<&str>,
        requests: Vec<DeductionRequest>,
    ) -> Result<DeductionOutcome, ServiceError> {
        if requests.is_empty() {
            return Err(ServiceError::ValidationError(
                "deduction batch must not be empty".to_string(),
            ));
        }
        for request in &requests {
            if request.quantity.round_dp(3) <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "deduction quantity {} for sku {} must be positive",
                    request.quantity, request.sku_code
                )));
            }
        }

        let sku_codes: Vec<String> = requests.iter().map(|r| r.sku_code.clone()).collect();

        let records: HashMap<String, inventory_record::Model> = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id))
            .filter(inventory_record::Column::SkuCode.is_in(sku_codes.clone()))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|r| (r.sku_code.clone(), r))
            .collect();

        let buffers: HashMap<String, Decimal> = Product::find()
            .filter(product::Column::SkuCode.is_in(sku_codes))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|p| (p.sku_code, p.buffer_quantity))
            .collect();

        let mut errors: Vec<SkuDeductionError> = Vec::new();
        let mut planned: Vec<PlannedDeduction> = Vec::new();

        for request in &requests {
            let Some(record) = records.get(&request.sku_code) else {
                errors.push(SkuDeductionError {
                    sku_code: request.sku_code.clone(),
                    code: StockErrorCode::InventoryNotFoundInStore,
                    max_quantity: None,
                    message: format!(
                        "sku {} is not stocked in store {}",
                        request.sku_code, store_id
                    ),
                });
                continue;
            };

            let quantity = request.quantity.round_dp(3);
            let available = record.available_quantity.round_dp(3);
            let buffer = buffers
                .get(&request.sku_code)
                .copied()
                .unwrap_or(Decimal::ZERO)
                .round_dp(3);
            let updated = (available - quantity).round_dp(3);

            if updated < buffer {
                errors.push(SkuDeductionError {
                    sku_code: request.sku_code.clone(),
                    code: StockErrorCode::BelowBufferQuantity,
                    max_quantity: Some((available - buffer).round_dp(3)),
                    message: format!(
                        "deducting {} would leave {} below the buffer of {}",
                        quantity, updated, buffer
                    ),
                });
                continue;
            }

            planned.push(PlannedDeduction {
                record: record.clone(),
                quantity,
                updated,
            });
        }

        if !errors.is_empty() {
            info!(
                store_id,
                failed = errors.len(),
                "deduction batch rejected, no mutation applied"
            );
            return Ok(DeductionOutcome::rejected(errors));
        }

        let to_apply = planned.clone();
        self.db
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    for plan in to_apply {
                        let result = InventoryRecord::update_many()
                            .col_expr(
                                inventory_record::Column::AvailableQuantity,
                                Expr::value(plan.updated),
                            )
                            .col_expr(
                                inventory_record::Column::Version,
                                Expr::col(inventory_record::Column::Version).add(1),
                            )
                            .col_expr(
                                inventory_record::Column::UpdatedAt,
                                Expr::value(chrono::Utc::now()),
                            )
                            .filter(inventory_record::Column::Id.eq(plan.record.id))
                            .filter(inventory_record::Column::Version.eq(plan.record.version))
                            .exec(txn)
                            .await?;

                        // A raced row means our verification snapshot is
                        // stale; roll the whole batch back.
                        if result.rows_affected != 1 {
                            return Err(ServiceError::ConcurrentModification {
                                store_id: plan.record.store_id,
                                sku_code: plan.record.sku_code.clone(),
                            });
                        }

                        audit::append(
                            txn,
                            MovementLogEntry {
                                store_id: plan.record.store_id,
                                sku_code: plan.record.sku_code.clone(),
                                source: DEDUCTION_SOURCE.to_string(),
                                delta: -plan.quantity,
                                from_quantity: plan.record.available_quantity,
                                to_quantity: plan.updated,
                                bucket: Bucket::Sale,
                                movement_type: MovementType::Deduction,
                                remarks: None,
                                actor: DEDUCTION_SOURCE.to_string(),
                            },
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

        // Purchase signals are fire-and-forget: the deduction has committed
        // and a recommendation failure must not undo or fail it.
        let signals: Vec<PurchaseSignal> = planned
            .iter()
            .map(|p| PurchaseSignal {
                user_id: user_id.map(|u| u.to_string()),
                sku_code: p.record.sku_code.clone(),
                quantity: p.quantity,
            })
            .collect();
        let recommendations = self.recommendations.clone();
        tokio::spawn(async move {
            if let Err(e) = recommendations.record_purchases(signals).await {
                warn!(error = %e, "purchase signal push failed");
            }
        });

        for plan in &planned {
            self.event_sender
                .send(Event::StockDeducted {
                    store_id,
                    sku_code: plan.record.sku_code.clone(),
                    quantity: plan.quantity,
                    remaining: plan.updated,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        info!(store_id, applied = planned.len(), "deduction batch applied");
        Ok(DeductionOutcome::ok())
    }
}
