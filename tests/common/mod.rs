//! Test harness: a private in-memory SQLite database per test, migrated
//! schema, and fully wired services with map-backed collaborators.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use storeops_api::{
    cache::InMemoryCache,
    clients::{
        audience::StaticAudienceClient, parameters::InMemoryParameterStore,
        recommendations::NoopRecommendationClient,
    },
    db::{self, DbConfig},
    entities::{inventory_record, product},
    events,
    CoreServices,
};

pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: CoreServices,
    pub audience: Arc<StaticAudienceClient>,
    pub params: Arc<InMemoryParameterStore>,
    pub cache: Arc<InMemoryCache>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        // One connection keeps the private in-memory database alive for the
        // lifetime of the pool and serializes test traffic.
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(5),
        };
        let pool = db::establish_connection_with_config(&cfg)
            .await
            .expect("failed to open sqlite");
        db::run_migrations(&pool).await.expect("migrations failed");
        let db = Arc::new(pool);

        let (event_sender, rx) = events::event_channel(100);
        let event_task = events::spawn_event_logger(rx);

        let cache = Arc::new(InMemoryCache::default());
        let params = Arc::new(InMemoryParameterStore::new());
        let audience = Arc::new(StaticAudienceClient::new());

        let services = CoreServices::new(
            db.clone(),
            Arc::new(event_sender),
            cache.clone(),
            params.clone(),
            audience.clone(),
            Arc::new(NoopRecommendationClient),
        );

        Self {
            db,
            services,
            audience,
            params,
            cache,
            _event_task: event_task,
        }
    }
}

pub async fn seed_product(
    db: &DatabaseConnection,
    sku_code: &str,
    buffer_quantity: Decimal,
) -> product::Model {
    let now = Utc::now();
    product::ActiveModel {
        sku_code: Set(sku_code.to_string()),
        name: Set(format!("Product {}", sku_code)),
        buffer_quantity: Set(buffer_quantity),
        max_orderable_quantity: Set(None),
        display_qty: Set(None),
        procurement_tag: Set(None),
        procurement_tag_expiry: Set(None),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed product")
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_record(
    db: &DatabaseConnection,
    store_id: i32,
    sku_code: &str,
    available: Decimal,
    committed: Decimal,
    sale_price: Decimal,
    market_price: Decimal,
) -> inventory_record::Model {
    let now = Utc::now();
    inventory_record::ActiveModel {
        store_id: Set(store_id),
        sku_code: Set(sku_code.to_string()),
        available_quantity: Set(available),
        committed_total: Set(committed),
        hold_quantity: Set(Decimal::ZERO),
        dump_quantity: Set(Decimal::ZERO),
        market_price: Set(market_price),
        sale_price: Set(sale_price),
        max_price: Set(None),
        marketing_sale_price: Set(None),
        price_brackets: Set(None),
        reset_quantity: Set(available),
        is_active: Set(true),
        is_complimentary: Set(false),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("failed to seed inventory record")
}
