use std::collections::HashMap;

use solana_program::{program_option::COption, pubkey::Pubkey};
use spl_token::state::{Account, AccountState, Mint};

use super::TokenLedger;
use crate::error::PoolError;

/// In-process ledger keeping SPL token state in hash maps.
///
/// Cloning yields an independent snapshot, which is how [`crate::sequence::AtomicSequence`]
/// stages a whole sequence before committing it.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedger {
    mints: HashMap<Pubkey, Mint>,
    accounts: HashMap<Pubkey, Account>,
}

impl MemoryLedger {
    /// Ledger with no mints or accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new mint with zero supply.
    pub fn create_mint(
        &mut self,
        address: Pubkey,
        mint_authority: Pubkey,
        decimals: u8,
    ) -> Result<(), PoolError> {
        if self.mints.contains_key(&address) || self.accounts.contains_key(&address) {
            return Err(PoolError::AccountAlreadyInitialized);
        }
        self.mints.insert(
            address,
            Mint {
                mint_authority: COption::Some(mint_authority),
                supply: 0,
                decimals,
                is_initialized: true,
                freeze_authority: COption::None,
            },
        );
        Ok(())
    }

    /// Sum of every account balance held in `mint`.
    pub fn holders_total(&self, mint: &Pubkey) -> u128 {
        self.accounts
            .values()
            .filter(|account| account.mint == *mint)
            .map(|account| u128::from(account.amount))
            .sum()
    }

    fn account_mut(&mut self, address: &Pubkey) -> Result<&mut Account, PoolError> {
        self.accounts
            .get_mut(address)
            .ok_or(PoolError::AccountNotFound)
    }

    fn mint_mut(&mut self, address: &Pubkey) -> Result<&mut Mint, PoolError> {
        self.mints.get_mut(address).ok_or(PoolError::AccountNotFound)
    }
}

fn require_mint_authority(mint: &Mint, authority: &Pubkey) -> Result<(), PoolError> {
    match mint.mint_authority {
        COption::Some(current) if current == *authority => Ok(()),
        _ => Err(PoolError::Unauthorized),
    }
}

impl TokenLedger for MemoryLedger {
    fn mint(&self, mint: &Pubkey) -> Result<Mint, PoolError> {
        self.mints.get(mint).copied().ok_or(PoolError::AccountNotFound)
    }

    fn token_account(&self, address: &Pubkey) -> Result<Account, PoolError> {
        self.accounts
            .get(address)
            .copied()
            .ok_or(PoolError::AccountNotFound)
    }

    fn initialize_account(
        &mut self,
        address: &Pubkey,
        mint: &Pubkey,
        owner: &Pubkey,
    ) -> Result<(), PoolError> {
        if self.accounts.contains_key(address) || self.mints.contains_key(address) {
            return Err(PoolError::AccountAlreadyInitialized);
        }
        if !self.mints.contains_key(mint) {
            return Err(PoolError::AccountNotFound);
        }
        self.accounts.insert(
            *address,
            Account {
                mint: *mint,
                owner: *owner,
                state: AccountState::Initialized,
                ..Account::default()
            },
        );
        Ok(())
    }

    fn transfer(
        &mut self,
        source: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError> {
        let from = self.token_account(source)?;
        let to = self.token_account(destination)?;
        if from.mint != to.mint {
            return Err(PoolError::MintMismatch);
        }
        if from.owner != *authority {
            return Err(PoolError::Unauthorized);
        }
        if from.amount < amount {
            return Err(PoolError::InsufficientFunds);
        }
        if source == destination {
            return Ok(());
        }
        let credited = to
            .amount
            .checked_add(amount)
            .ok_or(PoolError::MathOverflow)?;

        self.account_mut(source)?.amount = from.amount - amount;
        self.account_mut(destination)?.amount = credited;
        Ok(())
    }

    fn mint_to(
        &mut self,
        mint: &Pubkey,
        destination: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError> {
        let state = self.mint(mint)?;
        require_mint_authority(&state, authority)?;
        let to = self.token_account(destination)?;
        if to.mint != *mint {
            return Err(PoolError::MintMismatch);
        }
        let supply = state
            .supply
            .checked_add(amount)
            .ok_or(PoolError::MathOverflow)?;
        let credited = to
            .amount
            .checked_add(amount)
            .ok_or(PoolError::MathOverflow)?;

        self.mint_mut(mint)?.supply = supply;
        self.account_mut(destination)?.amount = credited;
        Ok(())
    }

    fn burn(
        &mut self,
        source: &Pubkey,
        mint: &Pubkey,
        authority: &Pubkey,
        amount: u64,
    ) -> Result<(), PoolError> {
        let state = self.mint(mint)?;
        let from = self.token_account(source)?;
        if from.mint != *mint {
            return Err(PoolError::MintMismatch);
        }
        if from.owner != *authority {
            return Err(PoolError::Unauthorized);
        }
        if from.amount < amount {
            return Err(PoolError::InsufficientFunds);
        }
        let supply = state
            .supply
            .checked_sub(amount)
            .ok_or(PoolError::MathOverflow)?;

        self.mint_mut(mint)?.supply = supply;
        self.account_mut(source)?.amount = from.amount - amount;
        Ok(())
    }

    fn set_mint_authority(
        &mut self,
        mint: &Pubkey,
        current_authority: &Pubkey,
        new_authority: Option<Pubkey>,
    ) -> Result<(), PoolError> {
        let state = self.mint(mint)?;
        require_mint_authority(&state, current_authority)?;
        self.mint_mut(mint)?.mint_authority = new_authority.into();
        Ok(())
    }
}
