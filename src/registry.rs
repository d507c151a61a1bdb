use std::collections::HashMap;

use solana_program::{program_option::COption, pubkey::Pubkey};

use crate::{
    config::PoolConfig,
    error::PoolError,
    ledger::TokenLedger,
    state::{derive_authority, PoolAuthority},
};

/// Deterministic map from underlying mint to its pool.
///
/// Records are kept in their packed account form, keyed by the derived
/// authority address, so a pool is found from the mint alone.
#[derive(Clone, Debug, Default)]
pub struct PoolRegistry {
    records: HashMap<Pubkey, Vec<u8>>,
    share_mints: HashMap<Pubkey, Pubkey>,
}

impl PoolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the pool for `underlying_mint`.
    ///
    /// Opens the vault under the derived authority and hands it mint
    /// authority over `share_mint`; `share_mint_authority` must currently
    /// hold that authority. All checks run before the first ledger call.
    pub fn create_pool<L: TokenLedger + ?Sized>(
        &mut self,
        ledger: &mut L,
        underlying_mint: &Pubkey,
        share_mint: &Pubkey,
        share_mint_authority: &Pubkey,
        config: &PoolConfig,
    ) -> Result<PoolAuthority, PoolError> {
        config.validate()?;

        let (authority, _) = derive_authority(underlying_mint);
        if self.records.contains_key(&authority) {
            return Err(PoolError::AlreadyExists);
        }
        if share_mint == underlying_mint {
            return Err(PoolError::InvalidShareMint);
        }
        if self.share_mints.contains_key(share_mint) {
            return Err(PoolError::ShareMintInUse);
        }

        let underlying = ledger.mint(underlying_mint)?;
        let shares = ledger.mint(share_mint)?;
        if shares.supply != 0 || shares.decimals != underlying.decimals {
            return Err(PoolError::InvalidShareMint);
        }
        if shares.mint_authority != COption::Some(*share_mint_authority) {
            return Err(PoolError::Unauthorized);
        }

        let pool = PoolAuthority::new(*underlying_mint, *share_mint, config);
        ledger.initialize_account(&pool.vault, underlying_mint, &authority)?;
        ledger.set_mint_authority(share_mint, share_mint_authority, Some(authority))?;

        self.records.insert(authority, pool.to_bytes().to_vec());
        self.share_mints.insert(*share_mint, *underlying_mint);

        log::info!(
            "pool created: mint={} share_mint={} vault={} fee_bps={}",
            underlying_mint,
            share_mint,
            pool.vault,
            pool.fee_rate_bps
        );
        Ok(pool)
    }

    /// Look up the pool for `underlying_mint`.
    pub fn resolve(&self, underlying_mint: &Pubkey) -> Result<PoolAuthority, PoolError> {
        let (authority, _) = derive_authority(underlying_mint);
        self.load(&authority)
    }

    /// Look up a pool by its derived authority address.
    pub fn load(&self, authority: &Pubkey) -> Result<PoolAuthority, PoolError> {
        let data = self.records.get(authority).ok_or(PoolError::NotFound)?;
        PoolAuthority::from_bytes(data)
    }

    /// Whether `address` is the derived authority of a registered pool.
    pub fn is_pool_authority(&self, address: &Pubkey) -> bool {
        self.records.contains_key(address)
    }

    /// Number of pools
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no pool exists yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
