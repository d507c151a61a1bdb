use std::collections::HashMap;

use solana_program::pubkey::Pubkey;

use crate::error::PoolError;

/// Outstanding loan, alive only inside one atomic sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoanMarker {
    /// Derived authority of the lending pool
    pub pool: Pubkey,
    /// Amount lent
    pub principal: u64,
    /// Fee owed on top of the principal
    pub fee: u64,
    /// Vault balance just before the loan left it
    pub vault_balance_snapshot: u64,
}

impl LoanMarker {
    /// Principal plus fee
    pub fn total_owed(&self) -> Result<u64, PoolError> {
        self.principal
            .checked_add(self.fee)
            .ok_or(PoolError::MathOverflow)
    }

    /// Lowest vault balance acceptable once the loan is repaid
    pub fn required_vault_balance(&self) -> Result<u64, PoolError> {
        self.vault_balance_snapshot
            .checked_add(self.fee)
            .ok_or(PoolError::MathOverflow)
    }
}

/// Result of a successful repay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// The loan being closed
    pub loan: LoanMarker,
    /// Principal actually returned
    pub principal_repaid: u64,
    /// Fee actually paid
    pub fee_paid: u64,
    /// Vault balance after the repay transfer
    pub vault_balance: u64,
}

/// Where a pool's loan stands within the current sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoanState {
    /// No loan taken in this sequence
    Idle,
    /// Principal is out
    Borrowed,
    /// Loan taken and repaid
    Settled,
}

/// Sequence-scoped arena of loan markers, keyed by pool authority.
///
/// One book lives exactly as long as one atomic sequence; dropping it with
/// the sequence is the only cleanup a marker ever needs.
#[derive(Clone, Debug, Default)]
pub struct LoanBook {
    active: HashMap<Pubkey, LoanMarker>,
    settled: Vec<Settlement>,
}

impl LoanBook {
    /// Empty book for a fresh sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the loan of `pool` stands
    pub fn state(&self, pool: &Pubkey) -> LoanState {
        if self.active.contains_key(pool) {
            LoanState::Borrowed
        } else if self.settled.iter().any(|s| s.loan.pool == *pool) {
            LoanState::Settled
        } else {
            LoanState::Idle
        }
    }

    /// Outstanding marker of `pool`, if any
    pub fn active(&self, pool: &Pubkey) -> Option<&LoanMarker> {
        self.active.get(pool)
    }

    /// Whether `pool` has principal out
    pub fn is_active(&self, pool: &Pubkey) -> bool {
        self.active.contains_key(pool)
    }

    /// Idle (or settled) → Borrowed
    pub fn open(&mut self, marker: LoanMarker) -> Result<(), PoolError> {
        if self.active.contains_key(&marker.pool) {
            return Err(PoolError::BorrowBeforeRepay);
        }
        self.active.insert(marker.pool, marker);
        Ok(())
    }

    /// Borrowed → Settled; the marker is discarded
    pub fn settle(&mut self, settlement: Settlement) -> Result<(), PoolError> {
        self.active
            .remove(&settlement.loan.pool)
            .ok_or(PoolError::NoActiveLoan)?;
        self.settled.push(settlement);
        Ok(())
    }

    /// Loans settled so far, in order
    pub fn settlements(&self) -> &[Settlement] {
        &self.settled
    }

    /// Fail if any loan is still out at the end of the sequence.
    pub fn ensure_settled(&self) -> Result<(), PoolError> {
        if let Some(marker) = self.active.values().next() {
            log::warn!(
                "sequence ended with {} of pool {} unrepaid",
                marker.principal,
                marker.pool
            );
            return Err(PoolError::UnrepaidLoan);
        }
        Ok(())
    }
}
