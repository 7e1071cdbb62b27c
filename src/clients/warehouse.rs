use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::ServiceError;

/// One unit of work for the warehouse service, as stored in the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehousePush {
    pub store_id: i32,
    pub sku_code: String,
    pub event_type: String,
    pub payload: Value,
}

/// Outbound interface to the warehouse/catalog service. Only the outbox
/// worker calls this; services never push directly.
#[async_trait::async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn push(&self, push: &WarehousePush) -> Result<(), ServiceError>;
}

/// HTTP implementation posting JSON to the warehouse sync endpoint.
pub struct HttpWarehouseClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWarehouseClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl WarehouseClient for HttpWarehouseClient {
    async fn push(&self, push: &WarehousePush) -> Result<(), ServiceError> {
        let url = format!("{}/v1/inventory/sync", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(push)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "warehouse sync returned {}",
                response.status()
            )));
        }
        debug!(sku_code = %push.sku_code, event_type = %push.event_type, "warehouse push delivered");
        Ok(())
    }
}

/// No-op client for environments without a warehouse endpoint.
#[derive(Debug, Default, Clone)]
pub struct NoopWarehouseClient;

#[async_trait::async_trait]
impl WarehouseClient for NoopWarehouseClient {
    async fn push(&self, push: &WarehousePush) -> Result<(), ServiceError> {
        debug!(sku_code = %push.sku_code, "warehouse push skipped (noop client)");
        Ok(())
    }
}
