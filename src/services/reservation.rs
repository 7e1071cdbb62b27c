//! Reservation validator: reconciles a new committed-total request against
//! a ledger row without disturbing the quantity already committed elsewhere.

use rust_decimal::Decimal;

use crate::entities::inventory_record;
use crate::errors::ServiceError;

/// Computes the new available quantity implied by `requested_total`.
///
/// `committed_total - available_quantity` is the amount already reserved by
/// carts/orders outside this system; that difference must survive the
/// update, so the new available quantity is `requested_total` minus the
/// externally held amount. A negative result means the caller asked for a
/// total below what is already committed elsewhere; that is a client error
/// and is never silently clamped.
///
/// Pure: the caller applies the result (sets `available_quantity` and
/// `committed_total`, and rolls `reset_quantity` forward when the total
/// changed and no explicit reset quantity was supplied).
pub fn reserve_to_total(
    record: &inventory_record::Model,
    requested_total: Decimal,
) -> Result<Decimal, ServiceError> {
    let requested_total = requested_total.round_dp(3);
    if requested_total < Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "requested total {} must not be negative",
            requested_total
        )));
    }

    let externally_held = record.externally_held().round_dp(3);
    let new_available = (requested_total - externally_held).round_dp(3);
    if new_available < Decimal::ZERO {
        return Err(ServiceError::Conflict(format!(
            "requested total {} for sku {} is below the {} already committed elsewhere",
            requested_total, record.sku_code, externally_held
        )));
    }

    Ok(new_available)
}
