pub mod discount_program;
pub mod inventory_movement_log;
pub mod inventory_record;
pub mod product;
pub mod warehouse_outbox;
