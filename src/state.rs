use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_program::{
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    config::{PoolConfig, POOL_SEED, VAULT_SEED},
    error::PoolError,
};

/// Current layout version of [`PoolAuthority`]
pub const POOL_AUTHORITY_VERSION: u8 = 1;

/// Derive the signing authority of the pool for `mint`.
///
/// Any party can compute this from the mint alone; nothing is stored.
pub fn derive_authority(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_SEED, mint.as_ref()], &crate::id())
}

/// Derive the vault token account address of the pool for `mint`.
pub fn derive_vault(mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, mint.as_ref()], &crate::id())
}

/// Pool record binding one underlying mint to one share mint and one vault
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolAuthority {
    /// Version of the struct
    pub version: u8,
    /// Bump seed for the derived pool authority
    pub bump: u8,
    /// Bump seed for the derived vault address
    pub vault_bump: u8,
    /// Flash loan fee rate (bps), fixed at creation
    pub fee_rate_bps: u16,
    /// Mint of the token deposited and lent
    pub underlying_mint: Pubkey,
    /// Mint of the token representing shares in the pool
    pub share_mint: Pubkey,
    /// Token account holding the pooled underlying balance
    pub vault: Pubkey,
}

impl PoolAuthority {
    /// Build the record for a freshly derived pool.
    pub fn new(underlying_mint: Pubkey, share_mint: Pubkey, config: &PoolConfig) -> Self {
        let (_, bump) = derive_authority(&underlying_mint);
        let (vault, vault_bump) = derive_vault(&underlying_mint);
        Self {
            version: POOL_AUTHORITY_VERSION,
            bump,
            vault_bump,
            fee_rate_bps: config.fee_rate_bps,
            underlying_mint,
            share_mint,
            vault,
        }
    }

    /// Re-derive the pool authority from the stored bump.
    pub fn authority(&self) -> Result<Pubkey, PoolError> {
        Pubkey::create_program_address(
            &[POOL_SEED, self.underlying_mint.as_ref(), &[self.bump]],
            &crate::id(),
        )
        .map_err(|_| PoolError::InvalidAccountData)
    }

    /// Fail unless `candidate` is this pool's derived authority.
    pub fn verify_authority(&self, candidate: &Pubkey) -> Result<(), PoolError> {
        if self.authority()? != *candidate {
            return Err(PoolError::AddressMismatch);
        }
        Ok(())
    }

    /// Re-derive the vault address from the stored vault bump.
    pub fn vault_address(&self) -> Result<Pubkey, PoolError> {
        Pubkey::create_program_address(
            &[VAULT_SEED, self.underlying_mint.as_ref(), &[self.vault_bump]],
            &crate::id(),
        )
        .map_err(|_| PoolError::InvalidAccountData)
    }

    /// Fail unless `candidate` is this pool's vault.
    pub fn verify_vault(&self, candidate: &Pubkey) -> Result<(), PoolError> {
        if self.vault_address()? != *candidate || self.vault != *candidate {
            return Err(PoolError::AddressMismatch);
        }
        Ok(())
    }

    /// Encode into a fresh account-sized buffer.
    pub fn to_bytes(&self) -> [u8; POOL_AUTHORITY_LEN] {
        let mut buf = [0u8; POOL_AUTHORITY_LEN];
        self.pack_into_slice(&mut buf);
        buf
    }

    /// Decode a stored record, rejecting short or uninitialized data.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PoolError> {
        Self::unpack(data).map_err(|_| PoolError::InvalidAccountData)
    }
}

impl Sealed for PoolAuthority {}

impl IsInitialized for PoolAuthority {
    fn is_initialized(&self) -> bool {
        self.version != 0
    }
}

const POOL_AUTHORITY_LEN: usize = 128; // 1 + 1 + 1 + 2 + 32 + 32 + 32 + padding

impl Pack for PoolAuthority {
    const LEN: usize = POOL_AUTHORITY_LEN;

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let output = array_mut_ref![dst, 0, POOL_AUTHORITY_LEN];
        let (version, bump, vault_bump, fee_rate_bps, underlying_mint, share_mint, vault, _padding) =
            mut_array_refs![output, 1, 1, 1, 2, 32, 32, 32, 27];

        version[0] = self.version;
        bump[0] = self.bump;
        vault_bump[0] = self.vault_bump;
        *fee_rate_bps = self.fee_rate_bps.to_le_bytes();
        underlying_mint.copy_from_slice(self.underlying_mint.as_ref());
        share_mint.copy_from_slice(self.share_mint.as_ref());
        vault.copy_from_slice(self.vault.as_ref());
    }

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let input = array_ref![src, 0, POOL_AUTHORITY_LEN];
        let (version, bump, vault_bump, fee_rate_bps, underlying_mint, share_mint, vault, _padding) =
            array_refs![input, 1, 1, 1, 2, 32, 32, 32, 27];

        if version[0] > POOL_AUTHORITY_VERSION {
            return Err(ProgramError::InvalidAccountData);
        }

        Ok(Self {
            version: version[0],
            bump: bump[0],
            vault_bump: vault_bump[0],
            fee_rate_bps: u16::from_le_bytes(*fee_rate_bps),
            underlying_mint: Pubkey::new_from_array(*underlying_mint),
            share_mint: Pubkey::new_from_array(*share_mint),
            vault: Pubkey::new_from_array(*vault),
        })
    }
}
