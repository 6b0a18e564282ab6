use rust_decimal::{Decimal, RoundingStrategy};

/// Round a monetary amount to two decimal places, half away from zero.
///
/// Every total, fee and earnings figure in the system goes through this
/// before it is stored or returned, so reconstructed splits always add up.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
