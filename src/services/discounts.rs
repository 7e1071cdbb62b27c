//! Discount resolution engine.
//!
//! Merges society-wide, audience-targeted, and marketing-override pricing
//! into one authoritative shopper price per inventory record, with fixed
//! precedence: a standing marketing sale price wins outright; otherwise the
//! society tier resolves first (global fallback before the shopper's actual
//! society), then the audience tier may undercut it. FLAT entries are fixed
//! target prices and only win when strictly cheaper; maximum-price entries
//! cap the displayed price instead of reducing it and are cleared whenever
//! a cheaper audience result wins.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cache::{self, CacheBackend};
use crate::clients::audience::AudienceClient;
use crate::clients::parameters::{
    self, ParameterStore, FALLBACK_ORDER_COUNT_THRESHOLD, ORDER_CUTOFF_TIME,
};
use crate::entities::discount_program::{
    self, DiscountKind, Entity as DiscountProgram, ProgramScope, SkuDiscount, GLOBAL_SOCIETY_ID,
};
use crate::entities::inventory_record::{self, Entity as InventoryRecord};
use crate::entities::product::{self, Entity as Product};
use crate::errors::{ProgramRowError, ServiceError};
use crate::events::{Event, EventSender};

const PROGRAM_CACHE_TTL: Duration = Duration::from_secs(120);

/// Everything the engine needs to know about the shopper being priced.
#[derive(Debug, Clone, Default)]
pub struct ShopperContext {
    pub user_id: Option<String>,
    pub society_id: Option<String>,
    pub audience_ids: Vec<String>,
    pub lifetime_order_count: i64,
}

impl ShopperContext {
    /// Context used for anonymous listings and the scheduled price refresh.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// Resolved price for one line, consumed by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedLine {
    pub sku_code: String,
    /// Set when a replacement rule substituted this SKU for another.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_from: Option<String>,
    pub market_price: Decimal,
    pub sale_price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    pub is_flat_discount_applied: bool,
    pub is_maximum_price: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_qty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procurement_tag_expiry: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_orderable_quantity: Option<Decimal>,
}

/// Input for creating or superseding a program.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramUpsert {
    pub scope: ProgramScope,
    pub scope_id: String,
    pub valid_delivery_date: NaiveDate,
    pub default_discount_percent: Option<Decimal>,
    pub is_maximum_price: bool,
    pub entries: Vec<SkuDiscount>,
}

/// Outcome of a program upsert: either the new program, or the rows the
/// bulk upload must fix. Mirrors the batch deduction shape so callers can
/// retry only the failed subset.
#[derive(Debug)]
pub struct ProgramUpsertOutcome {
    pub program: Option<discount_program::Model>,
    pub row_errors: Vec<ProgramRowError>,
}

/// The order cutoff rolls to today once the local time passes the
/// configured cutoff; before that, yesterday's date is still the operative
/// one. A program is applicable only while its delivery date is strictly
/// after this date.
pub fn order_cutoff_date(now: NaiveDateTime, cutoff: NaiveTime) -> NaiveDate {
    if now.time() > cutoff {
        now.date()
    } else {
        now.date().pred_opt().unwrap_or(now.date())
    }
}

fn is_applicable(program: &discount_program::Model, cutoff: NaiveDate) -> bool {
    program.is_active && program.valid_delivery_date > cutoff
}

/// The winner of one tier's minimum-candidate computation.
#[derive(Debug, Clone)]
struct TierCandidate {
    sale_price: Decimal,
    market_price: Decimal,
    flat_entry: Option<SkuDiscount>,
}

fn consider(winner: &mut Option<TierCandidate>, candidate: TierCandidate) {
    let is_better = winner
        .as_ref()
        .map(|w| candidate.sale_price < w.sale_price)
        .unwrap_or(true);
    if is_better {
        *winner = Some(candidate);
    }
}

/// Minimum candidate across a program's entries for one SKU, with the
/// program default applying only when no entry matches. FLAT entries are
/// only considered when strictly below the running candidate.
fn best_candidate(
    entries: &[SkuDiscount],
    default_percent: Option<Decimal>,
    sku_code: &str,
    sale_price: Decimal,
    market_price: Decimal,
) -> Option<TierCandidate> {
    let matching: Vec<&SkuDiscount> =
        entries.iter().filter(|e| e.sku_code == sku_code).collect();

    let mut winner: Option<TierCandidate> = None;

    if matching.is_empty() {
        if let Some(percent) = default_percent {
            let kind = DiscountKind::Percentage;
            consider(
                &mut winner,
                TierCandidate {
                    sale_price: kind.apply(sale_price, percent),
                    market_price: kind.apply(market_price, percent),
                    flat_entry: None,
                },
            );
        }
        return winner;
    }

    for entry in matching {
        match entry.kind() {
            DiscountKind::Percentage => consider(
                &mut winner,
                TierCandidate {
                    sale_price: DiscountKind::Percentage.apply(sale_price, entry.discount),
                    market_price: DiscountKind::Percentage.apply(market_price, entry.discount),
                    flat_entry: None,
                },
            ),
            DiscountKind::Flat => {
                let flat = entry.discount;
                let beats_current = winner
                    .as_ref()
                    .map(|w| flat < w.sale_price)
                    .unwrap_or(flat < sale_price);
                if beats_current {
                    winner = Some(TierCandidate {
                        sale_price: flat,
                        market_price,
                        flat_entry: Some(entry.clone()),
                    });
                }
            }
        }
    }

    winner
}

/// Pure per-line resolution, steps 1-4 of the precedence ladder.
/// Replacement is handled by the caller before this runs. Exposed so
/// embedders can price an already-loaded row without a round trip.
pub fn resolve_line(
    record: &inventory_record::Model,
    product: Option<&product::Model>,
    society: Option<&discount_program::Model>,
    audience_programs: &[discount_program::Model],
) -> PricedLine {
    let mut line = PricedLine {
        sku_code: record.sku_code.clone(),
        replaced_from: None,
        market_price: record.market_price.round_dp(2),
        sale_price: record.sale_price.round_dp(2),
        max_price: None,
        is_flat_discount_applied: false,
        is_maximum_price: false,
        display_qty: product.and_then(|p| p.display_qty.clone()),
        procurement_tag: None,
        procurement_tag_expiry: None,
        max_orderable_quantity: product.and_then(|p| p.max_orderable_quantity),
    };

    // Marketing override set out-of-band wins outright.
    if let Some(marketing) = record.marketing_sale_price {
        line.sale_price = marketing.round_dp(2);
        return line;
    }

    let base_sale = line.sale_price;
    let base_market = line.market_price;

    // Society tier: a single program, either the global fallback or the
    // shopper's actual society.
    let mut society_winner: Option<TierCandidate> = None;
    if let Some(program) = society {
        let entries = program.entries();
        let max_price_entry = entries
            .iter()
            .find(|e| e.sku_code == record.sku_code && e.is_maximum_price);
        if let Some(entry) = max_price_entry {
            // Maximum-price mode caps the display price; no discount math.
            line.max_price = Some(entry.discount.round_dp(2));
            line.is_maximum_price = true;
        } else {
            society_winner = best_candidate(
                &entries,
                program.default_discount_percent,
                &record.sku_code,
                base_sale,
                base_market,
            );
        }
    }

    let society_price = society_winner
        .as_ref()
        .map(|c| c.sale_price)
        .unwrap_or(base_sale);

    // Audience tier: minimum across every matching audience program.
    let mut audience_winner: Option<TierCandidate> = None;
    for program in audience_programs {
        let candidate = best_candidate(
            &program.entries(),
            program.default_discount_percent,
            &record.sku_code,
            base_sale,
            base_market,
        );
        if let Some(candidate) = candidate {
            let is_better = audience_winner
                .as_ref()
                .map(|w| candidate.sale_price < w.sale_price)
                .unwrap_or(true);
            if is_better {
                audience_winner = Some(candidate);
            }
        }
    }

    let winner = match (&society_winner, &audience_winner) {
        (_, Some(aud)) if aud.sale_price < society_price => {
            // Audience result wins: any maximum-price state is cleared.
            line.max_price = None;
            line.is_maximum_price = false;
            Some(aud.clone())
        }
        (Some(soc), _) => Some(soc.clone()),
        _ => None,
    };

    if let Some(winner) = winner {
        line.sale_price = winner.sale_price.round_dp(2).max(Decimal::ZERO);
        line.market_price = winner.market_price.round_dp(2).max(Decimal::ZERO);
        line.is_flat_discount_applied = winner.flat_entry.is_some();

        // The winning FLAT entry may carry side effects for the line.
        if let Some(entry) = winner.flat_entry {
            if let Some(display_qty) = entry.display_qty {
                line.display_qty = Some(display_qty);
            }
            if let (Some(tag), Some(expiry)) =
                (entry.procurement_tag.as_deref(), entry.procurement_tag_expiry)
            {
                if !tag.is_empty() {
                    line.procurement_tag = Some(tag.to_string());
                    line.procurement_tag_expiry = Some(expiry);
                }
            }
            if let Some(max_quantity) = entry.max_quantity {
                line.max_orderable_quantity = Some(max_quantity);
            }
        }
    }

    line
}

/// Validates bulk upload rows, reporting every bad row instead of failing
/// on the first.
pub fn validate_rows(entries: &[SkuDiscount]) -> Vec<ProgramRowError> {
    let mut errors = Vec::new();
    for (idx, entry) in entries.iter().enumerate() {
        let mut fail = |message: String| {
            errors.push(ProgramRowError {
                row: idx + 1,
                sku_code: if entry.sku_code.is_empty() {
                    None
                } else {
                    Some(entry.sku_code.clone())
                },
                message,
            });
        };

        if entry.sku_code.trim().is_empty() {
            fail("sku code is required".to_string());
            continue;
        }
        if entry.discount < Decimal::ZERO {
            fail(format!("discount {} must not be negative", entry.discount));
        }
        // In maximum-price mode the discount field carries a price cap, so
        // the percentage bound does not apply.
        if !entry.is_maximum_price
            && entry.kind() == DiscountKind::Percentage
            && entry.discount > Decimal::from(100)
        {
            fail(format!(
                "percentage discount {} exceeds 100",
                entry.discount
            ));
        }
        if let Some(max_quantity) = entry.max_quantity {
            if max_quantity <= Decimal::ZERO {
                fail(format!("max quantity {} must be positive", max_quantity));
            }
        }
        if let Some(replace) = &entry.replace_with_sku_code {
            if replace.trim().is_empty() {
                fail("replacement sku code must not be blank".to_string());
            }
        }
    }
    errors
}

#[derive(Clone)]
pub struct DiscountService {
    db: Arc<DatabaseConnection>,
    cache: Arc<dyn CacheBackend>,
    params: Arc<dyn ParameterStore>,
    audience: Arc<dyn AudienceClient>,
    event_sender: Arc<EventSender>,
}

impl DiscountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        cache: Arc<dyn CacheBackend>,
        params: Arc<dyn ParameterStore>,
        audience: Arc<dyn AudienceClient>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            cache,
            params,
            audience,
            event_sender,
        }
    }

    /// Builds the shopper context, resolving the society from the shopper's
    /// address when the caller did not supply one.
    #[instrument(skip(self))]
    pub async fn shopper_context(
        &self,
        user_id: Option<&str>,
        society_id: Option<String>,
    ) -> Result<ShopperContext, ServiceError> {
        let Some(user_id) = user_id else {
            return Ok(ShopperContext {
                society_id,
                ..ShopperContext::anonymous()
            });
        };

        let profile = self.audience.shopper_profile(user_id).await?;
        Ok(ShopperContext {
            user_id: Some(user_id.to_string()),
            society_id: society_id.or(profile.society_id),
            audience_ids: profile.audience_ids,
            lifetime_order_count: profile.lifetime_order_count,
        })
    }

    async fn current_cutoff_date(&self) -> Result<NaiveDate, ServiceError> {
        let raw = self
            .params
            .get_string(ORDER_CUTOFF_TIME, "23:00")
            .await?;
        let cutoff_time = parameters::parse_cutoff_time(&raw);
        Ok(order_cutoff_date(Local::now().naive_local(), cutoff_time))
    }

    /// Cached lookup of the single active program for a scope. The cache is
    /// invalidated by [`Self::upsert_program`], so a TTL miss is the worst
    /// staleness a multi-instance deployment can see.
    #[instrument(skip(self))]
    pub async fn active_program(
        &self,
        scope: ProgramScope,
        scope_id: &str,
    ) -> Result<Option<discount_program::Model>, ServiceError> {
        let key = format!("discount:program:{}:{}", scope, scope_id);
        match cache::get_json::<discount_program::Model>(self.cache.as_ref(), &key).await {
            Ok(Some(program)) => return Ok(Some(program)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "program cache read failed, falling back to db"),
        }

        let program = DiscountProgram::find()
            .filter(discount_program::Column::Scope.eq(scope.to_string()))
            .filter(discount_program::Column::ScopeId.eq(scope_id))
            .filter(discount_program::Column::IsActive.eq(true))
            .order_by_desc(discount_program::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;

        if let Some(ref model) = program {
            if let Err(e) =
                cache::put_json(self.cache.as_ref(), &key, model, Some(PROGRAM_CACHE_TTL)).await
            {
                warn!(error = %e, "program cache write failed");
            }
        }
        Ok(program)
    }

    /// Picks the society-tier program: the global fallback when the shopper
    /// qualifies for it, otherwise their actual society's program.
    async fn society_program(
        &self,
        ctx: &ShopperContext,
        cutoff: NaiveDate,
    ) -> Result<Option<discount_program::Model>, ServiceError> {
        let threshold = self
            .params
            .get_i64(FALLBACK_ORDER_COUNT_THRESHOLD, 3)
            .await?;

        if ctx.lifetime_order_count < threshold {
            if let Some(global) = self
                .active_program(ProgramScope::Society, GLOBAL_SOCIETY_ID)
                .await?
            {
                if is_applicable(&global, cutoff) {
                    return Ok(Some(global));
                }
            }
        }

        if let Some(society_id) = &ctx.society_id {
            if let Some(program) = self
                .active_program(ProgramScope::Society, society_id)
                .await?
            {
                if is_applicable(&program, cutoff) {
                    return Ok(Some(program));
                }
            }
        }

        Ok(None)
    }

    async fn audience_programs(
        &self,
        ctx: &ShopperContext,
        cutoff: NaiveDate,
    ) -> Result<Vec<discount_program::Model>, ServiceError> {
        let mut programs = Vec::new();
        for audience_id in &ctx.audience_ids {
            if let Some(program) = self
                .active_program(ProgramScope::Audience, audience_id)
                .await?
            {
                if is_applicable(&program, cutoff) {
                    programs.push(program);
                }
            }
        }
        Ok(programs)
    }

    /// Resolves the price the given shopper pays for each requested SKU in
    /// a store. Inactive rows are skipped; a replacement entry substitutes
    /// the named SKU wholesale and bypasses the discount ladder.
    #[instrument(skip(self, ctx), fields(skus = sku_codes.len()))]
    pub async fn price_for_shopper(
        &self,
        store_id: i32,
        sku_codes: &[String],
        ctx: &ShopperContext,
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let cutoff = self.current_cutoff_date().await?;
        let society = self.society_program(ctx, cutoff).await?;
        let audience_programs = self.audience_programs(ctx, cutoff).await?;

        let records: Vec<inventory_record::Model> = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id))
            .filter(inventory_record::Column::SkuCode.is_in(sku_codes.to_vec()))
            .filter(inventory_record::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await?;

        let products: HashMap<String, product::Model> = Product::find()
            .filter(product::Column::SkuCode.is_in(sku_codes.to_vec()))
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|p| (p.sku_code.clone(), p))
            .collect();

        let mut lines = Vec::with_capacity(records.len());
        for record in &records {
            if let Some(replacement_sku) =
                self.replacement_for(&record.sku_code, society.as_ref(), &audience_programs)
            {
                match self
                    .replacement_line(store_id, &record.sku_code, &replacement_sku)
                    .await?
                {
                    Some(line) => {
                        lines.push(line);
                        continue;
                    }
                    None => warn!(
                        sku_code = %record.sku_code,
                        replacement = %replacement_sku,
                        "replacement sku not stocked, falling back to discount ladder"
                    ),
                }
            }

            lines.push(resolve_line(
                record,
                products.get(&record.sku_code),
                society.as_ref(),
                &audience_programs,
            ));
        }

        Ok(lines)
    }

    fn replacement_for(
        &self,
        sku_code: &str,
        society: Option<&discount_program::Model>,
        audience_programs: &[discount_program::Model],
    ) -> Option<String> {
        let from_program = |program: &discount_program::Model| {
            program
                .entries()
                .into_iter()
                .find(|e| e.sku_code == sku_code)
                .and_then(|e| e.replace_with_sku_code)
                .filter(|r| !r.trim().is_empty())
        };

        society
            .and_then(from_program)
            .or_else(|| audience_programs.iter().find_map(from_program))
    }

    /// Loads the substitute SKU's record and product; the line copies their
    /// fields untouched by any discount math.
    async fn replacement_line(
        &self,
        store_id: i32,
        original_sku: &str,
        replacement_sku: &str,
    ) -> Result<Option<PricedLine>, ServiceError> {
        let Some(record) = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id))
            .filter(inventory_record::Column::SkuCode.eq(replacement_sku))
            .filter(inventory_record::Column::IsActive.eq(true))
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let product = Product::find()
            .filter(product::Column::SkuCode.eq(replacement_sku))
            .one(self.db.as_ref())
            .await?;

        Ok(Some(PricedLine {
            sku_code: record.sku_code.clone(),
            replaced_from: Some(original_sku.to_string()),
            market_price: record.market_price.round_dp(2),
            sale_price: record.sale_price.round_dp(2),
            max_price: record.max_price,
            is_flat_discount_applied: false,
            is_maximum_price: false,
            display_qty: product.as_ref().and_then(|p| p.display_qty.clone()),
            procurement_tag: None,
            procurement_tag_expiry: None,
            max_orderable_quantity: product.and_then(|p| p.max_orderable_quantity),
        }))
    }

    /// Creates a program, superseding any active one for the same scope:
    /// the prior version is deactivated and the replacement inserted in one
    /// transaction. Row errors reject the upload without touching the
    /// current program.
    #[instrument(skip(self, input), fields(scope = %input.scope, scope_id = %input.scope_id))]
    pub async fn upsert_program(
        &self,
        input: ProgramUpsert,
    ) -> Result<ProgramUpsertOutcome, ServiceError> {
        if input.scope_id.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "scope id must not be empty".to_string(),
            ));
        }
        if input.scope == ProgramScope::Audience && input.scope_id == GLOBAL_SOCIETY_ID {
            return Err(ServiceError::ValidationError(format!(
                "scope id {} is reserved for the society fallback",
                GLOBAL_SOCIETY_ID
            )));
        }

        // The program-level maximum-price flag is copied onto each entry so
        // resolution never needs the owning program back.
        let mut entries = input.entries.clone();
        if input.is_maximum_price {
            for entry in &mut entries {
                entry.is_maximum_price = true;
            }
        }

        let row_errors = validate_rows(&entries);
        if !row_errors.is_empty() {
            return Ok(ProgramUpsertOutcome {
                program: None,
                row_errors,
            });
        }

        let scope = input.scope.to_string();
        let scope_id = input.scope_id.clone();
        let now = Utc::now();
        let sku_discounts = serde_json::to_value(&entries).map_err(|e| {
            ServiceError::InternalError(format!("failed to serialize sku discounts: {}", e))
        })?;

        let program = self
            .db
            .transaction::<_, discount_program::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    DiscountProgram::update_many()
                        .col_expr(discount_program::Column::IsActive, Expr::value(false))
                        .col_expr(discount_program::Column::UpdatedAt, Expr::value(now))
                        .filter(discount_program::Column::Scope.eq(scope.clone()))
                        .filter(discount_program::Column::ScopeId.eq(scope_id.clone()))
                        .filter(discount_program::Column::IsActive.eq(true))
                        .exec(txn)
                        .await?;

                    let row = discount_program::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        scope: Set(scope),
                        scope_id: Set(scope_id),
                        valid_delivery_date: Set(input.valid_delivery_date),
                        default_discount_percent: Set(input.default_discount_percent),
                        sku_discounts: Set(sku_discounts),
                        is_maximum_price: Set(input.is_maximum_price),
                        is_active: Set(true),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    Ok(row.insert(txn).await?)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        let key = format!("discount:program:{}:{}", program.scope, program.scope_id);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(error = %e, "program cache invalidation failed");
        }

        self.event_sender
            .send(Event::ProgramSuperseded {
                program_id: program.id,
                scope: program.scope.clone(),
                scope_id: program.scope_id.clone(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(program_id = %program.id, "discount program superseded");
        Ok(ProgramUpsertOutcome {
            program: Some(program),
            row_errors: Vec::new(),
        })
    }

    /// Scheduled price refresh: re-resolves every active row of a store
    /// against the anonymous context and persists the outcome. The market
    /// price is used as the resolution base so repeated refreshes never
    /// compound earlier discounts.
    #[instrument(skip(self))]
    pub async fn refresh_store_prices(&self, store_id: i32) -> Result<u64, ServiceError> {
        let cutoff = self.current_cutoff_date().await?;
        let ctx = ShopperContext::anonymous();
        let society = self.society_program(&ctx, cutoff).await?;

        let records = InventoryRecord::find()
            .filter(inventory_record::Column::StoreId.eq(store_id))
            .filter(inventory_record::Column::IsActive.eq(true))
            .all(self.db.as_ref())
            .await?;

        let mut resolved = Vec::new();
        for record in records {
            let mut base = record.clone();
            base.sale_price = record.market_price;
            let line = resolve_line(&base, None, society.as_ref(), &[]);
            if line.sale_price != record.sale_price || line.max_price != record.max_price {
                resolved.push((record, line));
            }
        }

        let updated = resolved.len() as u64;
        if !resolved.is_empty() {
            self.db
                .transaction::<_, (), ServiceError>(move |txn| {
                    Box::pin(async move {
                        for (record, line) in resolved {
                            let version = record.version;
                            let mut active: inventory_record::ActiveModel = record.into();
                            active.sale_price = Set(line.sale_price);
                            active.max_price = Set(line.max_price);
                            active.version = Set(version + 1);
                            active.updated_at = Set(Utc::now());
                            active.update(txn).await?;
                        }
                        Ok(())
                    })
                })
                .await
                .map_err(|e| match e {
                    TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                    TransactionError::Transaction(service_err) => service_err,
                })?;
        }

        self.event_sender
            .send(Event::PricesRefreshed {
                store_id,
                records_updated: updated,
                refreshed_at: Utc::now(),
            })
            .await
            .map_err(ServiceError::EventError)?;

        info!(store_id, updated, "store prices refreshed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn record(sale: Decimal, market: Decimal) -> inventory_record::Model {
        inventory_record::Model {
            id: 1,
            store_id: 10,
            sku_code: "SKU-1".into(),
            available_quantity: dec!(10),
            committed_total: dec!(10),
            hold_quantity: dec!(0),
            dump_quantity: dec!(0),
            market_price: market,
            sale_price: sale,
            max_price: None,
            marketing_sale_price: None,
            price_brackets: None,
            reset_quantity: dec!(10),
            is_active: true,
            is_complimentary: false,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn program(
        scope: ProgramScope,
        scope_id: &str,
        default_percent: Option<Decimal>,
        entries: Vec<SkuDiscount>,
    ) -> discount_program::Model {
        discount_program::Model {
            id: Uuid::new_v4(),
            scope: scope.to_string(),
            scope_id: scope_id.to_string(),
            valid_delivery_date: NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(),
            default_discount_percent: default_percent,
            sku_discounts: serde_json::to_value(&entries).unwrap(),
            is_maximum_price: entries.iter().any(|e| e.is_maximum_price),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn entry(sku: &str, discount: Decimal, kind: DiscountKind) -> SkuDiscount {
        SkuDiscount {
            sku_code: sku.to_string(),
            discount,
            discount_type: Some(kind),
            replace_with_sku_code: None,
            procurement_tag: None,
            procurement_tag_expiry: None,
            max_quantity: None,
            display_qty: None,
            is_maximum_price: false,
        }
    }

    #[test]
    fn cutoff_rolls_to_today_after_the_cutoff_time() {
        let cutoff = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        let before = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(22, 59, 0)
            .unwrap();
        let after = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap();
        assert_eq!(
            order_cutoff_date(before, cutoff),
            NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
        );
        assert_eq!(
            order_cutoff_date(after, cutoff),
            NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
        );
    }

    #[test]
    fn program_on_the_cutoff_date_is_inert() {
        let p = program(ProgramScope::Society, "S1", Some(dec!(10)), vec![]);
        let mut expired = p.clone();
        expired.valid_delivery_date = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let cutoff = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(!is_applicable(&expired, cutoff));
        assert!(is_applicable(&p, cutoff));
    }

    #[test]
    fn marketing_override_wins_outright() {
        let mut rec = record(dec!(100), dec!(120));
        rec.marketing_sale_price = Some(dec!(55));
        let society = program(
            ProgramScope::Society,
            "S1",
            Some(dec!(50)),
            vec![entry("SKU-1", dec!(10), DiscountKind::Flat)],
        );
        let line = resolve_line(&rec, None, Some(&society), &[]);
        assert_eq!(line.sale_price, dec!(55));
        assert!(!line.is_flat_discount_applied);
        assert!(!line.is_maximum_price);
    }

    #[test]
    fn flat_beats_default_percentage_when_cheaper() {
        // 100 sale, 10% default, FLAT 70 -> 70, flat applied
        let rec = record(dec!(100), dec!(120));
        let society = program(
            ProgramScope::Society,
            "S1",
            Some(dec!(10)),
            vec![
                entry("SKU-1", dec!(10), DiscountKind::Percentage),
                entry("SKU-1", dec!(70), DiscountKind::Flat),
            ],
        );
        let line = resolve_line(&rec, None, Some(&society), &[]);
        assert_eq!(line.sale_price, dec!(70));
        assert!(line.is_flat_discount_applied);
    }

    #[test]
    fn audience_percentage_does_not_displace_cheaper_society_flat() {
        // Society FLAT 70 vs audience 5% (95): flat still wins
        let rec = record(dec!(100), dec!(120));
        let society = program(
            ProgramScope::Society,
            "S1",
            Some(dec!(10)),
            vec![entry("SKU-1", dec!(70), DiscountKind::Flat)],
        );
        let audience = program(
            ProgramScope::Audience,
            "A1",
            None,
            vec![entry("SKU-1", dec!(5), DiscountKind::Percentage)],
        );
        let line = resolve_line(&rec, None, Some(&society), &[audience]);
        assert_eq!(line.sale_price, dec!(70));
        assert!(line.is_flat_discount_applied);
    }

    #[test]
    fn cheaper_audience_price_wins_and_clears_maximum_price() {
        let rec = record(dec!(100), dec!(120));
        let mut cap = entry("SKU-1", dec!(110), DiscountKind::Percentage);
        cap.is_maximum_price = true;
        let society = program(ProgramScope::Society, "S1", None, vec![cap]);
        let audience = program(
            ProgramScope::Audience,
            "A1",
            None,
            vec![entry("SKU-1", dec!(20), DiscountKind::Percentage)],
        );

        // Society alone: maximum-price mode, no math
        let capped = resolve_line(&rec, None, Some(&society), &[]);
        assert!(capped.is_maximum_price);
        assert_eq!(capped.max_price, Some(dec!(110)));
        assert_eq!(capped.sale_price, dec!(100));

        // Audience undercuts: cap cleared
        let line = resolve_line(&rec, None, Some(&society), &[audience]);
        assert!(!line.is_maximum_price);
        assert_eq!(line.max_price, None);
        assert_eq!(line.sale_price, dec!(80));
    }

    #[test]
    fn default_percent_applies_only_without_sku_entry() {
        let rec = record(dec!(100), dec!(120));
        let society = program(
            ProgramScope::Society,
            "S1",
            Some(dec!(50)),
            vec![entry("SKU-1", dec!(10), DiscountKind::Percentage)],
        );
        let line = resolve_line(&rec, None, Some(&society), &[]);
        // the 50% default is ignored because an entry matches
        assert_eq!(line.sale_price, dec!(90));
    }

    #[test]
    fn flat_above_current_price_is_ignored() {
        let rec = record(dec!(100), dec!(120));
        let society = program(
            ProgramScope::Society,
            "S1",
            None,
            vec![entry("SKU-1", dec!(150), DiscountKind::Flat)],
        );
        let line = resolve_line(&rec, None, Some(&society), &[]);
        assert_eq!(line.sale_price, dec!(100));
        assert!(!line.is_flat_discount_applied);
    }

    #[test]
    fn winning_flat_entry_side_effects_apply() {
        let rec = record(dec!(100), dec!(120));
        let mut flat = entry("SKU-1", dec!(70), DiscountKind::Flat);
        flat.display_qty = Some("2 x 500 g".to_string());
        flat.procurement_tag = Some("clearance".to_string());
        flat.procurement_tag_expiry = Some(Utc::now());
        flat.max_quantity = Some(dec!(5));
        let society = program(ProgramScope::Society, "S1", None, vec![flat]);

        let line = resolve_line(&rec, None, Some(&society), &[]);
        assert_eq!(line.display_qty.as_deref(), Some("2 x 500 g"));
        assert_eq!(line.procurement_tag.as_deref(), Some("clearance"));
        assert!(line.procurement_tag_expiry.is_some());
        assert_eq!(line.max_orderable_quantity, Some(dec!(5)));
    }

    #[test]
    fn procurement_tag_without_expiry_does_not_propagate() {
        let rec = record(dec!(100), dec!(120));
        let mut flat = entry("SKU-1", dec!(70), DiscountKind::Flat);
        flat.procurement_tag = Some("clearance".to_string());
        let society = program(ProgramScope::Society, "S1", None, vec![flat]);

        let line = resolve_line(&rec, None, Some(&society), &[]);
        assert_eq!(line.procurement_tag, None);
        assert_eq!(line.procurement_tag_expiry, None);
    }

    #[test]
    fn resolution_is_idempotent() {
        let rec = record(dec!(100), dec!(120));
        let society = program(
            ProgramScope::Society,
            "S1",
            Some(dec!(10)),
            vec![entry("SKU-1", dec!(70), DiscountKind::Flat)],
        );
        let audience = program(
            ProgramScope::Audience,
            "A1",
            None,
            vec![entry("SKU-1", dec!(5), DiscountKind::Percentage)],
        );
        let first = resolve_line(&rec, None, Some(&society), std::slice::from_ref(&audience));
        let second = resolve_line(&rec, None, Some(&society), std::slice::from_ref(&audience));
        assert_eq!(first, second);
    }

    #[test]
    fn row_validation_reports_every_bad_row() {
        let rows = vec![
            entry("", dec!(10), DiscountKind::Percentage),
            entry("SKU-2", dec!(120), DiscountKind::Percentage),
            entry("SKU-3", dec!(-5), DiscountKind::Flat),
            entry("SKU-4", dec!(10), DiscountKind::Percentage),
        ];
        let errors = validate_rows(&rows);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].row, 1);
        assert_eq!(errors[1].sku_code.as_deref(), Some("SKU-2"));
    }
}
