//! Money arithmetic. Amounts are `Decimal` and always presented at two
//! decimal places, rounding halves away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of `price * quantity` over all lines, rounded once at the end.
pub fn order_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    round_money(
        lines
            .into_iter()
            .map(|(price, qty)| line_total(price, qty))
            .sum(),
    )
}
