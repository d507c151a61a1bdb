use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Seed for the derived pool authority address
pub const POOL_SEED: &[u8] = b"flash_loan";
/// Seed for the derived vault token account address
pub const VAULT_SEED: &[u8] = b"flash_loan_vault";
/// Basis points in one whole
pub const BPS_DENOMINATOR: u64 = 10_000;
/// Flash loan fee charged when a pool is created without an explicit rate (0.09%)
pub const DEFAULT_FEE_RATE_BPS: u16 = 9;

/// Per-pool parameters fixed at creation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Flash loan fee rate (bps)
    pub fee_rate_bps: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            fee_rate_bps: DEFAULT_FEE_RATE_BPS,
        }
    }
}

impl PoolConfig {
    /// Validated config with the given fee rate
    pub fn new(fee_rate_bps: u16) -> Result<Self, PoolError> {
        let config = Self { fee_rate_bps };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document such as `{"fee_rate_bps": 30}`.
    pub fn from_json(raw: &str) -> Result<Self, PoolError> {
        let config: Self = serde_json::from_str(raw).map_err(|e| {
            log::warn!("rejecting pool config: {}", e);
            PoolError::InvalidConfig
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a fee rate above 100%
    pub fn validate(&self) -> Result<(), PoolError> {
        if u64::from(self.fee_rate_bps) > BPS_DENOMINATOR {
            return Err(PoolError::InvalidFeeRate);
        }
        Ok(())
    }
}
