use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One sellable SKU in one store, unique on (store_id, sku_code).
///
/// The three quantity buckets (`available_quantity` = SALE, `hold_quantity`,
/// `dump_quantity`) plus the `committed_total` baseline form the quantity
/// ledger. `committed_total - available_quantity` is the amount already
/// reserved by carts/orders outside this system and must be preserved across
/// committed-total updates. Price fields are owned by the discount
/// resolution engine; `buffer_quantity` deliberately lives on the product
/// row, not here.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_inventory")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub store_id: i32,
    pub sku_code: String,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub available_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub committed_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub hold_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub dump_quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub market_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))")]
    pub sale_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub max_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub marketing_sale_price: Option<Decimal>,
    /// Serialized `Vec<PriceBracket>`; validated before every write.
    #[sea_orm(column_type = "Json", nullable)]
    pub price_brackets: Option<Json>,
    #[sea_orm(column_type = "Decimal(Some((19, 3)))")]
    pub reset_quantity: Decimal,
    pub is_active: bool,
    pub is_complimentary: bool,
    /// Optimistic concurrency column, bumped on every mutating write.
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Quantity already committed to carts/orders outside this system.
    pub fn externally_held(&self) -> Decimal {
        self.committed_total - self.available_quantity
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::SkuCode",
        to = "super::product::Column::SkuCode"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
