use rust_decimal::{Decimal, RoundingStrategy};
use storefront_shared::MONEY_SCALE;

/// Round a monetary amount to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
