use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

pub mod outbox;

use crate::entities::inventory_movement_log::Bucket;

/// Domain events emitted by the stock and pricing engines after their
/// transactions commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryMapped {
        store_id: i32,
        sku_code: String,
    },
    StockLevelSet {
        store_id: i32,
        sku_code: String,
        committed_total: Decimal,
        available_quantity: Decimal,
    },
    StockMoved {
        store_id: i32,
        sku_code: String,
        from: Bucket,
        to: Bucket,
        quantity: Decimal,
    },
    StockReceived {
        store_id: i32,
        sku_code: String,
        bucket: Bucket,
        quantity: Decimal,
    },
    StockDeducted {
        store_id: i32,
        sku_code: String,
        quantity: Decimal,
        remaining: Decimal,
    },
    StoreReset {
        store_id: i32,
        records_reset: u64,
    },
    ProgramSuperseded {
        program_id: Uuid,
        scope: String,
        scope_id: String,
    },
    PricesRefreshed {
        store_id: i32,
        records_updated: u64,
        refreshed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Builds a channel pair and a background task that logs every event.
/// Embedders that want real consumers keep the receiver instead.
pub fn event_channel(buffer: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventSender::new(tx), rx)
}

pub fn spawn_event_logger(mut rx: mpsc::Receiver<Event>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(?event, "domain event");
        }
    })
}
