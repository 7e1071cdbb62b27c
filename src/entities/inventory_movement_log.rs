use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three quantity pools on an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucket {
    Sale,
    Hold,
    Dump,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Sale => "SALE",
            Bucket::Hold => "HOLD",
            Bucket::Dump => "DUMP",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SALE" => Some(Bucket::Sale),
            "HOLD" => Some(Bucket::Hold),
            "DUMP" => Some(Bucket::Dump),
            _ => None,
        }
    }
}

/// Why a quantity changed. Stored as a string column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    /// Bucket-to-bucket transfer (sale ⇄ hold ⇄ dump)
    Movement,
    /// Warehouse receiving or manual bucket top-up
    Receive,
    /// Goods receipt note from an approved purchase order
    Grn,
    /// Admin correction outside the normal flows
    AdminAdjustment,
    /// Order-driven batch deduction
    Deduction,
    /// Scheduled restore to the reset quantity
    Reset,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Movement => "MOVEMENT",
            MovementType::Receive => "RECEIVE",
            MovementType::Grn => "GRN",
            MovementType::AdminAdjustment => "ADMIN_ADJUSTMENT",
            MovementType::Deduction => "DEDUCTION",
            MovementType::Reset => "RESET",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MOVEMENT" => Some(MovementType::Movement),
            "RECEIVE" => Some(MovementType::Receive),
            "GRN" => Some(MovementType::Grn),
            "ADMIN_ADJUSTMENT" => Some(MovementType::AdminAdjustment),
            "DEDUCTION" => Some(MovementType::Deduction),
            "RESET" => Some(MovementType::Reset),
            _ => None,
        }
    }
}

/// Append-only audit entry for every quantity change. Rows are never
/// mutated after creation; reporting and support tooling depend on this
/// shape staying stable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_movement_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: i32,
    pub sku_code: String,
    /// Caller-supplied label, e.g. "Verify and Deduct" or "PO Approval"
    pub source: String,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub delta: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub from_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub to_quantity: Decimal,
    pub bucket: String,
    pub movement_type: String,
    pub remarks: Option<String>,
    pub actor: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
