//! Token balances the pool reads and moves
//!
//! The pool never touches balances directly. Everything goes through a
//! [`TokenLedger`], which is expected to check authorization itself and to
//! apply each call atomically.

/// Hash-map backed ledger for tests and off-chain simulation
pub mod memory;

pub use memory::MemoryLedger;

use solana_program::pubkey::Pubkey;
use spl_token::state::{Account, Mint};

use crate::error::PoolError;

/// Fungible token ledger with SPL token semantics
pub trait TokenLedger {
    /// Mint state at `mint`
    fn mint(&self, mint: &Pubkey) -> Result<Mint, PoolError>;

    /// Token account state at `address`
    fn token_account(&self, address: &Pubkey) -> Result<Account, PoolError>;

    /// Open an empty token account for `mint` owned by `owner`
    fn initialize_account(
        &mut self,
        address: &Pubkey,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<(), PoolError>;

    /// Move `amount` between two accounts of the same mint; `authority` must own `source`
    fn transfer(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError>;

    /// Create `amount` new units in `destination`; `authority` must be the mint authority
    fn mint_to(
        &mut self,
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError>;

    /// Destroy `amount` units held in `source`; `authority` must own `source`
    fn burn(
        &mut self,
        source: &Pubkey,
        mint: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError>;

    /// Hand mint authority from `current_authority` to `new_authority`
    fn set_mint_authority(
        &mut self,
        mint: &Pubkey,
        current_authority: &Pubkey,
        new_authority: Option<Pubkey>,
    ) -> Result<(), PoolError>;

    /// Balance of the token account at `address`
    fn balance_of(&self, address: &Pubkey) -> Result<u64, PoolError> {
        Ok(self.token_account(address)?.amount)
    }

    /// Outstanding supply of `mint`
    fn supply_of(&self, mint: &Pubkey) -> Result<u64, PoolError> {
        Ok(self.mint(mint)?.supply)
    }

    /// Fail unless `address` is a token account of `mint`.
    fn require_mint(&self, address: &Pubkey, mint: &Pubkey) -> Result<Account, PoolError> {
        let account = self.token_account(address)?;
        if account.mint != *mint {
            return Err(PoolError::MintMismatch);
        }
        Ok(account)
    }
}
