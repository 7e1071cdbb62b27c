mod common;

use assert_matches::assert_matches;
use chrono::{Days, Local, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storeops_api::{
    entities::discount_program::{
        self, DiscountKind, Entity as DiscountProgram, ProgramScope, SkuDiscount,
        GLOBAL_SOCIETY_ID,
    },
    errors::ServiceError,
    services::discounts::{ProgramUpsert, ShopperContext},
};

use common::{seed_product, seed_record, TestApp};

const STORE: i32 = 7;

fn future_delivery_date() -> NaiveDate {
    Local::now()
        .date_naive()
        .checked_add_days(Days::new(2))
        .unwrap()
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

fn upsert(
    scope: ProgramScope,
    scope_id: &str,
    default_percent: Option<Decimal>,
    entries: Vec<SkuDiscount>,
) -> ProgramUpsert {
    ProgramUpsert {
        scope,
        scope_id: scope_id.to_string(),
        valid_delivery_date: future_delivery_date(),
        default_discount_percent: default_percent,
        is_maximum_price: false,
        entries,
    }
}

#[tokio::test]
async fn upserting_a_program_supersedes_the_prior_version() {
    let app = TestApp::new().await;

    let first = app
        .services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "GREENWOOD",
            Some(dec!(5)),
            vec![],
        ))
        .await
        .expect("first upsert")
        .program
        .expect("no row errors");

    let second = app
        .services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "GREENWOOD",
            Some(dec!(8)),
            vec![],
        ))
        .await
        .expect("second upsert")
        .program
        .expect("no row errors");

    // prior version is soft-deactivated, never deleted
    let rows = DiscountProgram::find()
        .filter(discount_program::Column::ScopeId.eq("GREENWOOD"))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    let old = rows.iter().find(|r| r.id == first.id).unwrap();
    assert!(!old.is_active);

    // cache was invalidated, so the lookup sees the replacement
    let active = app
        .services
        .discounts
        .active_program(ProgramScope::Society, "GREENWOOD")
        .await
        .unwrap()
        .expect("active program");
    assert_eq!(active.id, second.id);
    assert_eq!(active.default_discount_percent, Some(dec!(8)));
}

#[tokio::test]
async fn bad_rows_reject_the_upload_without_touching_the_program() {
    let app = TestApp::new().await;

    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "LAKESIDE",
            Some(dec!(5)),
            vec![],
        ))
        .await
        .expect("seed program");

    let outcome = app
        .services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "LAKESIDE",
            None,
            vec![
                entry("", dec!(10), DiscountKind::Percentage),
                entry("SKU-OK", dec!(10), DiscountKind::Percentage),
                entry("SKU-BAD", dec!(140), DiscountKind::Percentage),
            ],
        ))
        .await
        .expect("upsert call");

    assert!(outcome.program.is_none());
    assert_eq!(outcome.row_errors.len(), 2);
    assert_eq!(outcome.row_errors[0].row, 1);
    assert_eq!(outcome.row_errors[1].sku_code.as_deref(), Some("SKU-BAD"));

    // prior program still active and unchanged
    let active = app
        .services
        .discounts
        .active_program(ProgramScope::Society, "LAKESIDE")
        .await
        .unwrap()
        .expect("still active");
    assert_eq!(active.default_discount_percent, Some(dec!(5)));
}

#[tokio::test]
async fn society_flat_wins_over_default_and_audience_percentage() {
    let app = TestApp::new().await;
    seed_product(&app.db, "GHEE-1L", dec!(0)).await;
    seed_record(&app.db, STORE, "GHEE-1L", dec!(100), dec!(100), dec!(100), dec!(120)).await;

    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "GREENWOOD",
            Some(dec!(10)),
            vec![entry("GHEE-1L", dec!(70), DiscountKind::Flat)],
        ))
        .await
        .expect("society program");
    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Audience,
            "loyal-customers",
            None,
            vec![entry("GHEE-1L", dec!(5), DiscountKind::Percentage)],
        ))
        .await
        .expect("audience program");

    let ctx = ShopperContext {
        user_id: Some("user-1".to_string()),
        society_id: Some("GREENWOOD".to_string()),
        audience_ids: vec!["loyal-customers".to_string()],
        lifetime_order_count: 50,
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["GHEE-1L".to_string()], &ctx)
        .await
        .expect("pricing");

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].sale_price, dec!(70));
    assert!(lines[0].is_flat_discount_applied);
    assert!(!lines[0].is_maximum_price);
}

#[tokio::test]
async fn global_fallback_applies_only_below_the_order_count_threshold() {
    let app = TestApp::new().await;
    seed_product(&app.db, "HONEY", dec!(0)).await;
    seed_record(&app.db, STORE, "HONEY", dec!(50), dec!(50), dec!(200), dec!(220)).await;

    // global fallback gives 20%, the actual society only 5%
    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            GLOBAL_SOCIETY_ID,
            Some(dec!(20)),
            vec![],
        ))
        .await
        .expect("global program");
    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "GREENWOOD",
            Some(dec!(5)),
            vec![],
        ))
        .await
        .expect("society program");

    let newcomer = ShopperContext {
        user_id: Some("new-user".to_string()),
        society_id: Some("GREENWOOD".to_string()),
        audience_ids: vec![],
        lifetime_order_count: 1,
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["HONEY".to_string()], &newcomer)
        .await
        .unwrap();
    assert_eq!(lines[0].sale_price, dec!(160));

    let regular = ShopperContext {
        lifetime_order_count: 25,
        ..newcomer
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["HONEY".to_string()], &regular)
        .await
        .unwrap();
    assert_eq!(lines[0].sale_price, dec!(190));
}

#[tokio::test]
async fn past_delivery_dates_make_a_program_inert() {
    let app = TestApp::new().await;
    seed_product(&app.db, "JAM", dec!(0)).await;
    seed_record(&app.db, STORE, "JAM", dec!(10), dec!(10), dec!(80), dec!(90)).await;

    let mut stale = upsert(ProgramScope::Society, "GREENWOOD", Some(dec!(50)), vec![]);
    stale.valid_delivery_date = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(3))
        .unwrap();
    app.services
        .discounts
        .upsert_program(stale)
        .await
        .expect("stale program");

    let ctx = ShopperContext {
        society_id: Some("GREENWOOD".to_string()),
        lifetime_order_count: 10,
        ..ShopperContext::anonymous()
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["JAM".to_string()], &ctx)
        .await
        .unwrap();
    // no discount: the program's delivery window has passed
    assert_eq!(lines[0].sale_price, dec!(80));
}

#[tokio::test]
async fn maximum_price_program_caps_instead_of_discounting() {
    let app = TestApp::new().await;
    seed_product(&app.db, "SPICE-BOX", dec!(0)).await;
    seed_record(&app.db, STORE, "SPICE-BOX", dec!(10), dec!(10), dec!(500), dec!(550)).await;

    let mut capped = upsert(
        ProgramScope::Society,
        "GREENWOOD",
        None,
        vec![entry("SPICE-BOX", dec!(450), DiscountKind::Percentage)],
    );
    capped.is_maximum_price = true;
    app.services
        .discounts
        .upsert_program(capped)
        .await
        .expect("capped program");

    let ctx = ShopperContext {
        society_id: Some("GREENWOOD".to_string()),
        lifetime_order_count: 10,
        ..ShopperContext::anonymous()
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["SPICE-BOX".to_string()], &ctx)
        .await
        .unwrap();

    assert!(lines[0].is_maximum_price);
    assert_eq!(lines[0].max_price, Some(dec!(450)));
    // sale price untouched: no percentage/flat math in cap mode
    assert_eq!(lines[0].sale_price, dec!(500));
}

#[tokio::test]
async fn replacement_entries_substitute_the_line_wholesale() {
    let app = TestApp::new().await;
    seed_product(&app.db, "BUTTER-100G", dec!(0)).await;
    seed_product(&app.db, "BUTTER-500G", dec!(0)).await;
    seed_record(&app.db, STORE, "BUTTER-100G", dec!(10), dec!(10), dec!(60), dec!(65)).await;
    seed_record(&app.db, STORE, "BUTTER-500G", dec!(10), dec!(10), dec!(240), dec!(260)).await;

    let mut replacement = entry("BUTTER-100G", dec!(10), DiscountKind::Percentage);
    replacement.replace_with_sku_code = Some("BUTTER-500G".to_string());
    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            "GREENWOOD",
            Some(dec!(10)),
            vec![replacement],
        ))
        .await
        .expect("program with replacement");

    let ctx = ShopperContext {
        society_id: Some("GREENWOOD".to_string()),
        lifetime_order_count: 10,
        ..ShopperContext::anonymous()
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["BUTTER-100G".to_string()], &ctx)
        .await
        .unwrap();

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].sku_code, "BUTTER-500G");
    assert_eq!(lines[0].replaced_from.as_deref(), Some("BUTTER-100G"));
    // the replacement's own prices, untouched by the discount ladder
    assert_eq!(lines[0].sale_price, dec!(240));
    assert!(!lines[0].is_flat_discount_applied);
}

#[tokio::test]
async fn marketing_override_bypasses_all_programs() {
    let app = TestApp::new().await;
    seed_product(&app.db, "COFFEE", dec!(0)).await;
    seed_record(&app.db, STORE, "COFFEE", dec!(10), dec!(10), dec!(300), dec!(320)).await;

    app.services
        .inventory
        .update_stock(
            STORE,
            "COFFEE",
            storeops_api::services::inventory::InventoryPatch {
                marketing_sale_price: Some(Some(dec!(199))),
                ..Default::default()
            },
            "marketing",
            "campaign-june",
        )
        .await
        .expect("set marketing price");

    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            GLOBAL_SOCIETY_ID,
            Some(dec!(50)),
            vec![],
        ))
        .await
        .expect("program");

    let ctx = ShopperContext {
        lifetime_order_count: 0,
        ..ShopperContext::anonymous()
    };
    let lines = app
        .services
        .discounts
        .price_for_shopper(STORE, &["COFFEE".to_string()], &ctx)
        .await
        .unwrap();
    assert_eq!(lines[0].sale_price, dec!(199));
    assert!(!lines[0].is_flat_discount_applied);
}

#[tokio::test]
async fn shopper_context_resolves_society_from_the_audience_service() {
    let app = TestApp::new().await;
    app.audience.insert(
        "user-77",
        storeops_api::clients::audience::ShopperProfile {
            society_id: Some("LAKESIDE".to_string()),
            audience_ids: vec!["weekend-deals".to_string()],
            lifetime_order_count: 12,
        },
    );

    let ctx = app
        .services
        .discounts
        .shopper_context(Some("user-77"), None)
        .await
        .expect("context");
    assert_eq!(ctx.society_id.as_deref(), Some("LAKESIDE"));
    assert_eq!(ctx.audience_ids, vec!["weekend-deals".to_string()]);
    assert_eq!(ctx.lifetime_order_count, 12);

    // an explicitly supplied society wins over the resolved one
    let ctx = app
        .services
        .discounts
        .shopper_context(Some("user-77"), Some("GREENWOOD".to_string()))
        .await
        .expect("context");
    assert_eq!(ctx.society_id.as_deref(), Some("GREENWOOD"));
}

#[tokio::test]
async fn price_refresh_persists_the_anonymous_resolution() {
    let app = TestApp::new().await;
    seed_product(&app.db, "OATS", dec!(0)).await;
    // sale price equals market price before any program applies
    seed_record(&app.db, STORE, "OATS", dec!(10), dec!(10), dec!(100), dec!(100)).await;

    app.services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Society,
            GLOBAL_SOCIETY_ID,
            Some(dec!(10)),
            vec![],
        ))
        .await
        .expect("global program");

    let updated = app
        .services
        .discounts
        .refresh_store_prices(STORE)
        .await
        .expect("refresh");
    assert_eq!(updated, 1);

    let record = app
        .services
        .inventory
        .get(STORE, "OATS")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.sale_price, dec!(90));
    assert_eq!(record.market_price, dec!(100));

    // refreshing again resolves from the market price, so nothing compounds
    let updated = app
        .services
        .discounts
        .refresh_store_prices(STORE)
        .await
        .expect("second refresh");
    assert_eq!(updated, 0);
}

#[tokio::test]
async fn reserved_scope_id_is_rejected_for_audience_programs() {
    let app = TestApp::new().await;
    let result = app
        .services
        .discounts
        .upsert_program(upsert(
            ProgramScope::Audience,
            GLOBAL_SOCIETY_ID,
            Some(dec!(5)),
            vec![],
        ))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}
