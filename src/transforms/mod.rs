//! Warehouse transformations
//!
//! Each scheduled job is described twice from the same declarations: as SQL
//! the warehouse runs on a schedule, and as plain Rust over in-memory rows so
//! the business rules can be tested without a warehouse.

pub mod cost_interval;
pub mod daily_asin;
pub mod settlement_pnl;
pub mod sql;

use rust_decimal::Decimal;

/// `numerator / denominator`, `None` when the denominator is zero
pub fn safe_divide(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator.checked_div(denominator)
}

/// `total - part`, floored at zero
pub fn non_negative_difference(total: Decimal, part: Decimal) -> Decimal {
    (total - part).max(Decimal::ZERO)
}
