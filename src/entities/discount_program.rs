use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reserved society id denoting the global fallback program that applies to
/// all qualifying shoppers.
pub const GLOBAL_SOCIETY_ID: &str = "ALL";

/// Which shopper dimension a program is keyed on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgramScope {
    Society,
    Audience,
}

/// How a per-SKU discount entry is priced. FLAT is a fixed target price;
/// PERCENTAGE is a proportional reduction off the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountKind {
    #[serde(rename = "PERCENTAGE")]
    Percentage,
    #[serde(rename = "FLAT")]
    Flat,
}

impl DiscountKind {
    /// Pure pricing function for this variant. PERCENTAGE reduces `price` by
    /// the rounded proportional amount; FLAT is the discount value itself
    /// (callers only accept it when strictly lower than their running
    /// candidate).
    pub fn apply(&self, price: Decimal, discount: Decimal) -> Decimal {
        match self {
            DiscountKind::Percentage => price - (price * discount / Decimal::from(100)).round_dp(2),
            DiscountKind::Flat => discount,
        }
    }
}

/// One per-SKU entry inside a discount program. Stored inside the program's
/// JSON column, never persisted standalone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuDiscount {
    pub sku_code: String,
    pub discount: Decimal,
    /// Missing type is treated as PERCENTAGE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_type: Option<DiscountKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace_with_sku_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procurement_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procurement_tag_expiry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_qty: Option<String>,
    /// Copied from the owning program on upsert.
    #[serde(default)]
    pub is_maximum_price: bool,
}

impl SkuDiscount {
    pub fn kind(&self) -> DiscountKind {
        self.discount_type.unwrap_or(DiscountKind::Percentage)
    }
}

/// A scoped discount rule set: SOCIETY programs are keyed by a
/// neighborhood-like group id (with `"ALL"` reserved for the global
/// fallback), AUDIENCE programs by a marketing audience id. Programs are
/// soft-deactivated and superseded, never edited in place.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "discount_programs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub scope: String,
    pub scope_id: String,
    /// Program is inert once the computed order-cutoff date reaches this.
    pub valid_delivery_date: NaiveDate,
    #[sea_orm(column_type = "Decimal(Some((19, 2)))", nullable)]
    pub default_discount_percent: Option<Decimal>,
    /// Serialized `Vec<SkuDiscount>`.
    #[sea_orm(column_type = "Json")]
    pub sku_discounts: Json,
    pub is_maximum_price: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn scope_kind(&self) -> Option<ProgramScope> {
        self.scope.parse().ok()
    }

    pub fn entries(&self) -> Vec<SkuDiscount> {
        serde_json::from_value(self.sku_discounts.clone()).unwrap_or_default()
    }

    pub fn is_global_fallback(&self) -> bool {
        self.scope == ProgramScope::Society.to_string() && self.scope_id == GLOBAL_SOCIETY_ID
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
