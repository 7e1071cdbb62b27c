use rust_decimal::Decimal;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};

/// Unified error type returned by every service in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification on store {store_id} sku {sku_code}")]
    ConcurrentModification { store_id: i32, sku_code: String },

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Translates a unique-constraint violation on (store, SKU) into the
    /// domain-level "already present" signal; everything else passes through.
    pub fn from_insert_err(err: DbErr, store_id: i32, sku_code: &str) -> Self {
        let text = err.to_string();
        if text.contains("UNIQUE") || text.contains("unique") || text.contains("duplicate key") {
            ServiceError::AlreadyExists(format!(
                "Inventory for sku {} already mapped in store {}",
                sku_code, store_id
            ))
        } else {
            ServiceError::DatabaseError(err)
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// Machine-readable per-SKU failure codes for batch stock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockErrorCode {
    InventoryNotFoundInStore,
    BelowBufferQuantity,
}

/// One failed row in a batch deduction. `max_quantity` carries the largest
/// quantity the caller could still deduct for that SKU without breaching the
/// buffer floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuDeductionError {
    pub sku_code: String,
    pub code: StockErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<Decimal>,
    pub message: String,
}

/// Batch deduction result: either every SKU was deducted, or none were and
/// `errors` names the failing rows so the caller can retry only that subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeductionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SkuDeductionError>,
}

impl DeductionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<SkuDeductionError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Per-row validation failure for bulk discount-program uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRowError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_code: Option<String>,
    pub message: String,
}
