use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog read model, one row per SKU. The catalog collaborator owns
/// writes; this crate only reads it (most importantly `buffer_quantity`,
/// the safety floor below which available stock may not be driven by
/// deduction).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub sku_code: String,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub buffer_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))", nullable)]
    pub max_orderable_quantity: Option<Decimal>,
    /// Customer-facing pack description, e.g. "500 g"
    pub display_qty: Option<String>,
    pub procurement_tag: Option<String>,
    pub procurement_tag_expiry: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_record::Entity")]
    InventoryRecord,
}

impl Related<super::inventory_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
