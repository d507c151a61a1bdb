//! Checked integer helpers shared by share accounting and loan fees.
//!
//! All products are taken in `u128` so `u64 * u64` never overflows; only the
//! final narrowing back to `u64` can fail.

use crate::{config::BPS_DENOMINATOR, error::PoolError};

/// `floor(a * b / c)`
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Result<u64, PoolError> {
    if c == 0 {
        return Err(PoolError::MathOverflow);
    }
    let q = u128::from(a) * u128::from(b) / u128::from(c);
    u64::try_from(q).map_err(|_| PoolError::MathOverflow)
}

/// `ceil(a * b / c)`
pub fn mul_div_ceil(a: u64, b: u64, c: u64) -> Result<u64, PoolError> {
    if c == 0 {
        return Err(PoolError::MathOverflow);
    }
    let c = u128::from(c);
    let q = (u128::from(a) * u128::from(b) + (c - 1)) / c;
    u64::try_from(q).map_err(|_| PoolError::MathOverflow)
}

/// Flash-loan fee, rounded up so the pool never under-charges.
pub fn flash_loan_fee(amount: u64, fee_rate_bps: u16) -> Result<u64, PoolError> {
    mul_div_ceil(amount, u64::from(fee_rate_bps), BPS_DENOMINATOR)
}
