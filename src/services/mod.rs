// Quantity ledger and stock engines
pub mod audit;
pub mod deduction;
pub mod inventory;
pub mod movement;
pub mod reservation;

// Pricing
pub mod discounts;
pub mod price_brackets;
