//! Proportional share accounting for deposits and withdrawals.
//!
//! Shares are priced off the live vault balance `V` and share supply `S`.
//! Both conversions round down, so the pool keeps every remainder and the
//! share supply can never claim more than the vault holds. Fees that land in
//! the vault without minting raise `V/S` for every existing holder.

use solana_program::pubkey::Pubkey;

use crate::{
    error::{fatal, PoolError},
    ledger::TokenLedger,
    math::mul_div_floor,
    state::PoolAuthority,
};

/// Vault balance and share supply read together
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Underlying units held by the vault (`V`)
    pub vault_balance: u64,
    /// Outstanding share units (`S`)
    pub share_supply: u64,
}

impl PoolSnapshot {
    /// Read `V` and `S` for `pool`.
    pub fn read<L: TokenLedger + ?Sized>(ledger: &L, pool: &PoolAuthority) -> Result<Self, PoolError> {
        Ok(Self {
            vault_balance: ledger.balance_of(&pool.vault)?,
            share_supply: ledger.supply_of(&pool.share_mint)?,
        })
    }

    /// Every outstanding share must be backed by a non-empty vault.
    pub fn check_backing(&self) -> Result<(), PoolError> {
        if self.share_supply > 0 && self.vault_balance == 0 {
            return Err(PoolError::DegenerateShareSupply);
        }
        Ok(())
    }

    /// Whether `V/S` here is at least `V/S` in `other`, compared without division.
    pub fn price_at_least(&self, other: &PoolSnapshot) -> bool {
        u128::from(self.vault_balance) * u128::from(other.share_supply)
            >= u128::from(other.vault_balance) * u128::from(self.share_supply)
    }

    /// Whether `V/S` here is strictly above `V/S` in `other`.
    pub fn price_above(&self, other: &PoolSnapshot) -> bool {
        u128::from(self.vault_balance) * u128::from(other.share_supply)
            > u128::from(other.vault_balance) * u128::from(self.share_supply)
    }
}

/// Shares minted for depositing `amount` against the current snapshot.
pub fn quote_deposit(amount: u64, snapshot: &PoolSnapshot) -> Result<u64, PoolError> {
    if amount == 0 {
        return Err(PoolError::InvalidAmount);
    }
    if snapshot.share_supply == 0 {
        // first depositor sets the 1:1 baseline
        return Ok(amount);
    }
    if snapshot.vault_balance == 0 {
        return Err(fatal(
            PoolError::DegenerateShareSupply,
            "share supply outstanding against an empty vault",
        ));
    }
    let shares = mul_div_floor(amount, snapshot.share_supply, snapshot.vault_balance)?;
    if shares == 0 {
        return Err(PoolError::AmountTooSmall);
    }
    Ok(shares)
}

/// Underlying units paid out for burning `shares` against the current snapshot.
pub fn quote_withdraw(shares: u64, snapshot: &PoolSnapshot) -> Result<u64, PoolError> {
    if shares == 0 {
        return Err(PoolError::InvalidAmount);
    }
    if snapshot.share_supply == 0 {
        return Err(PoolError::PoolEmpty);
    }
    if shares > snapshot.share_supply {
        return Err(PoolError::InsufficientShares);
    }
    if snapshot.vault_balance == 0 {
        return Err(fatal(
            PoolError::DegenerateShareSupply,
            "share supply outstanding against an empty vault",
        ));
    }
    let amount = mul_div_floor(shares, snapshot.vault_balance, snapshot.share_supply)?;
    if amount == 0 {
        return Err(PoolError::AmountTooSmall);
    }
    Ok(amount)
}

/// Accounts a depositor brings
#[derive(Clone, Copy, Debug)]
pub struct Depositor {
    /// Owner of `source`
    pub authority: Pubkey,
    /// Underlying token account debited
    pub source: Pubkey,
    /// Share token account credited
    pub share_destination: Pubkey,
}

/// Accounts a withdrawer brings
#[derive(Clone, Copy, Debug)]
pub struct Withdrawer {
    /// Owner of `share_source`
    pub authority: Pubkey,
    /// Share token account burned from
    pub share_source: Pubkey,
    /// Underlying token account credited
    pub destination: Pubkey,
}

/// Deposit `amount` of the underlying and mint shares for it.
///
/// Reads `V` and `S` before the transfer; the caller provides the
/// single-writer guarantee between this read and the writes below.
pub fn deposit<L: TokenLedger + ?Sized>(
    ledger: &mut L,
    pool: &PoolAuthority,
    amount: u64,
    depositor: &Depositor,
) -> Result<u64, PoolError> {
    let snapshot = PoolSnapshot::read(ledger, pool)?;
    let shares = quote_deposit(amount, &snapshot)?;
    log::debug!(
        "deposit quote: amount={} V={} S={} shares={}",
        amount,
        snapshot.vault_balance,
        snapshot.share_supply,
        shares
    );

    let source = ledger.require_mint(&depositor.source, &pool.underlying_mint)?;
    if source.owner != depositor.authority {
        return Err(PoolError::Unauthorized);
    }
    if source.amount < amount {
        return Err(PoolError::InsufficientFunds);
    }
    ledger.require_mint(&depositor.share_destination, &pool.share_mint)?;
    let authority = pool.authority()?;

    ledger.transfer(&depositor.source, &pool.vault, &depositor.authority, amount)?;
    ledger.mint_to(&pool.share_mint, &depositor.share_destination, &authority, shares)?;

    log::info!(
        "deposited {} into {}: minted {} shares to {}",
        amount,
        pool.vault,
        shares,
        depositor.share_destination
    );
    Ok(shares)
}

/// Burn `shares` and pay out the matching slice of the vault.
pub fn withdraw<L: TokenLedger + ?Sized>(
    ledger: &mut L,
    pool: &PoolAuthority,
    shares: u64,
    withdrawer: &Withdrawer,
) -> Result<u64, PoolError> {
    if shares == 0 {
        return Err(PoolError::InvalidAmount);
    }
    let snapshot = PoolSnapshot::read(ledger, pool)?;
    if snapshot.share_supply == 0 {
        return Err(PoolError::PoolEmpty);
    }

    let share_source = ledger.require_mint(&withdrawer.share_source, &pool.share_mint)?;
    if share_source.owner != withdrawer.authority {
        return Err(PoolError::Unauthorized);
    }
    if share_source.amount < shares {
        return Err(PoolError::InsufficientShares);
    }
    ledger.require_mint(&withdrawer.destination, &pool.underlying_mint)?;

    let amount = quote_withdraw(shares, &snapshot)?;
    log::debug!(
        "withdraw quote: shares={} V={} S={} amount={}",
        shares,
        snapshot.vault_balance,
        snapshot.share_supply,
        amount
    );
    let authority = pool.authority()?;

    ledger.burn(&withdrawer.share_source, &pool.share_mint, &withdrawer.authority, shares)?;
    ledger.transfer(&pool.vault, &withdrawer.destination, &authority, amount)?;

    log::info!(
        "withdrew {} from {}: burned {} shares from {}",
        amount,
        pool.vault,
        shares,
        withdrawer.share_source
    );
    Ok(amount)
}
