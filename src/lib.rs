//! StoreOps API Library
//!
//! Core engine for multi-store retail stock control and shopper pricing.
//! The crate tracks per-store, per-SKU quantity buckets (sellable stock,
//! quality hold, write-off), enforces a product-level safety floor on
//! deductions, and resolves the price a specific shopper pays by layering
//! society, audience, and marketing-override discount programs.
//!
//! There is no wire protocol here: a thin API layer calls the services
//! in-process, and outbound pushes to the warehouse service go through a
//! transactional outbox.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod clients;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod migrator;
pub mod services;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::cache::CacheBackend;
use crate::clients::{
    audience::AudienceClient, parameters::ParameterStore, recommendations::RecommendationClient,
};
use crate::events::EventSender;
use crate::services::{
    audit::AuditLogService, deduction::DeductionService, discounts::DiscountService,
    inventory::InventoryService, movement::MovementService,
};

/// Bundle of fully wired services, shared by the embedding API layer.
/// The warehouse client is not held here: only the outbox worker
/// ([`events::outbox::OutboxWorker`]) talks to it.
#[derive(Clone)]
pub struct CoreServices {
    pub inventory: InventoryService,
    pub movement: MovementService,
    pub deduction: DeductionService,
    pub discounts: DiscountService,
    pub audit: AuditLogService,
}

impl CoreServices {
    /// Wires every service against one shared connection pool and one set of
    /// collaborators. The cache and clients are injected so tests and
    /// multi-instance deployments can swap them out.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        cache: Arc<dyn CacheBackend>,
        params: Arc<dyn ParameterStore>,
        audience: Arc<dyn AudienceClient>,
        recommendations: Arc<dyn RecommendationClient>,
    ) -> Self {
        Self {
            inventory: InventoryService::new(db.clone(), event_sender.clone()),
            movement: MovementService::new(db.clone(), event_sender.clone()),
            deduction: DeductionService::new(db.clone(), event_sender.clone(), recommendations),
            discounts: DiscountService::new(db.clone(), cache, params, audience, event_sender),
            audit: AuditLogService::new(db),
        }
    }
}
