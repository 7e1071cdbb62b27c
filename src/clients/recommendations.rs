use rust_decimal::Decimal;
use tracing::debug;

use crate::errors::ServiceError;

/// One purchased line forwarded to the recommendation pipeline.
#[derive(Debug, Clone)]
pub struct PurchaseSignal {
    pub user_id: Option<String>,
    pub sku_code: String,
    pub quantity: Decimal,
}

/// Fire-and-forget downstream. Callers spawn the call and never let a
/// failure here fail the stock operation that produced the signals.
#[async_trait::async_trait]
pub trait RecommendationClient: Send + Sync {
    async fn record_purchases(&self, signals: Vec<PurchaseSignal>) -> Result<(), ServiceError>;
}

#[derive(Debug, Default, Clone)]
pub struct NoopRecommendationClient;

#[async_trait::async_trait]
impl RecommendationClient for NoopRecommendationClient {
    async fn record_purchases(&self, signals: Vec<PurchaseSignal>) -> Result<(), ServiceError> {
        debug!(count = signals.len(), "purchase signals dropped (noop client)");
        Ok(())
    }
}
