use rust_decimal::Decimal;

use crate::error::TransactionError;

/// Fixed scale used everywhere a money amount contributes to a hash or is
/// persisted: exactly 8 fractional digits.
pub const AMOUNT_SCALE: u32 = 8;

/// Round `amount` to the canonical 8-fractional-digit scale.
pub fn canonicalize(amount: Decimal) -> Decimal {
    amount.round_dp(AMOUNT_SCALE)
}

/// An amount is valid when it is strictly positive. NaN cannot be
/// represented by `Decimal`, so only the sign needs checking.
pub fn validate_positive(amount: Decimal) -> Result<(), TransactionError> {
    if amount <= Decimal::ZERO {
        return Err(TransactionError::InvalidAmount);
    }
    Ok(())
}

/// Canonical 8-decimal string form, e.g. `"10.00000000"`.
pub fn format_canonical(amount: Decimal) -> String {
    canonicalize(amount).to_string()
}
