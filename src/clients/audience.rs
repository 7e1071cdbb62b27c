use std::collections::HashMap;
use std::sync::RwLock;

use crate::errors::ServiceError;

/// What the address/audience service knows about a shopper: the society
/// their delivery address resolves to, the marketing audiences they belong
/// to, and how many orders they have ever placed.
#[derive(Debug, Clone, Default)]
pub struct ShopperProfile {
    pub society_id: Option<String>,
    pub audience_ids: Vec<String>,
    pub lifetime_order_count: i64,
}

/// Best-effort lookup against the address/audience service. An empty
/// profile is an acceptable answer upstream, but transport failures are
/// surfaced to the caller.
#[async_trait::async_trait]
pub trait AudienceClient: Send + Sync {
    async fn shopper_profile(&self, user_id: &str) -> Result<ShopperProfile, ServiceError>;
}

/// Map-backed client for tests and single-box deployments.
#[derive(Debug, Default)]
pub struct StaticAudienceClient {
    profiles: RwLock<HashMap<String, ShopperProfile>>,
}

impl StaticAudienceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, profile: ShopperProfile) {
        self.profiles
            .write()
            .expect("profile map poisoned")
            .insert(user_id.into(), profile);
    }
}

#[async_trait::async_trait]
impl AudienceClient for StaticAudienceClient {
    async fn shopper_profile(&self, user_id: &str) -> Result<ShopperProfile, ServiceError> {
        Ok(self
            .profiles
            .read()
            .map_err(|e| ServiceError::InternalError(e.to_string()))?
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}
