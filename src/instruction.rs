use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::convert::TryInto;
use std::mem::size_of;

use crate::{
    error::PoolError,
    state::{derive_authority, derive_vault},
};

/// Instructions supported by the flash pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolInstruction {
    /// Create the pool for an underlying mint
    ///
    /// Accounts expected by this instruction:
    ///
    /// 0. `[signer]` Current mint authority of the share mint
    /// 1. `[]` Underlying mint
    /// 2. `[writable]` Share mint
    /// 3. `[writable]` Derived pool authority
    /// 4. `[writable]` Derived vault
    InitPool {
        /// Flash loan fee rate (bps)
        fee_rate_bps: u16,
    },

    /// Deposit underlying tokens in exchange for shares
    ///
    /// 0. `[signer]` Depositor
    /// 1. `[writable]` Source underlying token account
    /// 2. `[writable]` Vault
    /// 3. `[writable]` Share token account to credit
    /// 4. `[writable]` Share mint
    /// 5. `[]` Derived pool authority
    Deposit {
        /// Underlying amount to deposit
        amount: u64,
    },

    /// Burn shares for a proportional slice of the vault
    ///
    /// 0. `[signer]` Withdrawer
    /// 1. `[writable]` Share token account to burn from
    /// 2. `[writable]` Destination underlying token account
    /// 3. `[writable]` Vault
    /// 4. `[writable]` Share mint
    /// 5. `[]` Derived pool authority
    Withdraw {
        /// Shares to burn
        shares: u64,
    },

    /// Flash Loan
    ///
    /// Lends from the vault. A `Repay` for the same pool covering principal
    /// and fee must follow later in the same sequence, or the borrow is
    /// refused before any transfer.
    ///
    /// 0. `[signer]` Borrower
    /// 1. `[writable]` Vault
    /// 2. `[writable]` Destination token account
    /// 3. `[]` Derived pool authority
    Borrow {
        /// The amount to borrow
        amount: u64,
    },

    /// Return a flash loan with its fee
    ///
    /// 0. `[signer]` Repayer
    /// 1. `[writable]` Source token account
    /// 2. `[writable]` Vault
    /// 3. `[]` Derived pool authority
    Repay {
        /// Principal returned
        principal: u64,
        /// Fee paid on top of the principal
        fee: u64,
    },
}

/// Pool authority position in `InitPool` accounts
pub const INIT_POOL_AUTHORITY_INDEX: usize = 3;
/// Pool authority position in `Deposit` accounts
pub const DEPOSIT_POOL_AUTHORITY_INDEX: usize = 5;
/// Pool authority position in `Withdraw` accounts
pub const WITHDRAW_POOL_AUTHORITY_INDEX: usize = 5;
/// Pool authority position in `Borrow` accounts
pub const BORROW_POOL_AUTHORITY_INDEX: usize = 3;
/// Pool authority position in `Repay` accounts
pub const REPAY_POOL_AUTHORITY_INDEX: usize = 3;

impl PoolInstruction {
    /// Unpacks a byte buffer into a PoolInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, PoolError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(PoolError::InvalidInstruction)?;

        Ok(match tag {
            0 => {
                let fee_rate_bps = rest
                    .get(..2)
                    .and_then(|slice| slice.try_into().ok())
                    .map(u16::from_le_bytes)
                    .ok_or(PoolError::InvalidInstruction)?;
                Self::InitPool { fee_rate_bps }
            }
            1 => Self::Deposit {
                amount: Self::unpack_u64(rest, 0)?,
            },
            2 => Self::Withdraw {
                shares: Self::unpack_u64(rest, 0)?,
            },
            3 => Self::Borrow {
                amount: Self::unpack_u64(rest, 0)?,
            },
            4 => Self::Repay {
                principal: Self::unpack_u64(rest, 0)?,
                fee: Self::unpack_u64(rest, 8)?,
            },
            _ => return Err(PoolError::InvalidInstruction),
        })
    }

    fn unpack_u64(input: &[u8], offset: usize) -> Result<u64, PoolError> {
        input
            .get(offset..offset + 8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(PoolError::InvalidInstruction)
    }

    /// Packs a PoolInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::InitPool { fee_rate_bps } => {
                buf.push(0);
                buf.extend_from_slice(&fee_rate_bps.to_le_bytes());
            }
            Self::Deposit { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Withdraw { shares } => {
                buf.push(2);
                buf.extend_from_slice(&shares.to_le_bytes());
            }
            Self::Borrow { amount } => {
                buf.push(3);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::Repay { principal, fee } => {
                buf.push(4);
                buf.extend_from_slice(&principal.to_le_bytes());
                buf.extend_from_slice(&fee.to_le_bytes());
            }
        }
        buf
    }

    /// Index of the derived pool authority in this instruction's accounts
    pub fn pool_authority_index(&self) -> usize {
        match self {
            Self::InitPool { .. } => INIT_POOL_AUTHORITY_INDEX,
            Self::Deposit { .. } => DEPOSIT_POOL_AUTHORITY_INDEX,
            Self::Withdraw { .. } => WITHDRAW_POOL_AUTHORITY_INDEX,
            Self::Borrow { .. } => BORROW_POOL_AUTHORITY_INDEX,
            Self::Repay { .. } => REPAY_POOL_AUTHORITY_INDEX,
        }
    }
}

/// Decode `instruction` if it belongs to this program, returning it with the
/// pool authority it targets.
pub fn decode_pool_instruction(instruction: &Instruction) -> Option<(PoolInstruction, Pubkey)> {
    if instruction.program_id != crate::id() {
        return None;
    }
    let decoded = PoolInstruction::unpack(&instruction.data).ok()?;
    let pool = instruction.accounts.get(decoded.pool_authority_index())?.pubkey;
    Some((decoded, pool))
}

/// Creates an InitPool instruction
pub fn init_pool(
    underlying_mint: Pubkey,
    share_mint: Pubkey,
    share_mint_authority: Pubkey,
    fee_rate_bps: u16,
) -> Instruction {
    let (pool_authority, _) = derive_authority(&underlying_mint);
    let (vault, _) = derive_vault(&underlying_mint);
    Instruction {
        program_id: crate::id(),
        accounts: vec![
            AccountMeta::new_readonly(share_mint_authority, true),
            AccountMeta::new_readonly(underlying_mint, false),
            AccountMeta::new(share_mint, false),
            AccountMeta::new(pool_authority, false),
            AccountMeta::new(vault, false),
        ],
        data: PoolInstruction::InitPool { fee_rate_bps }.pack(),
    }
}

/// Creates a Deposit instruction
pub fn deposit(
    underlying_mint: Pubkey,
    share_mint: Pubkey,
    depositor: Pubkey,
    source: Pubkey,
    share_destination: Pubkey,
    amount: u64,
) -> Instruction {
    let (pool_authority, _) = derive_authority(&underlying_mint);
    let (vault, _) = derive_vault(&underlying_mint);
    Instruction {
        program_id: crate::id(),
        accounts: vec![
            AccountMeta::new_readonly(depositor, true),
            AccountMeta::new(source, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(share_destination, false),
            AccountMeta::new(share_mint, false),
            AccountMeta::new_readonly(pool_authority, false),
        ],
        data: PoolInstruction::Deposit { amount }.pack(),
    }
}

/// Creates a Withdraw instruction
pub fn withdraw(
    underlying_mint: Pubkey,
    share_mint: Pubkey,
    withdrawer: Pubkey,
    share_source: Pubkey,
    destination: Pubkey,
    shares: u64,
) -> Instruction {
    let (pool_authority, _) = derive_authority(&underlying_mint);
    let (vault, _) = derive_vault(&underlying_mint);
    Instruction {
        program_id: crate::id(),
        accounts: vec![
            AccountMeta::new_readonly(withdrawer, true),
            AccountMeta::new(share_source, false),
            AccountMeta::new(destination, false),
            AccountMeta::new(vault, false),
            AccountMeta::new(share_mint, false),
            AccountMeta::new_readonly(pool_authority, false),
        ],
        data: PoolInstruction::Withdraw { shares }.pack(),
    }
}

/// Creates a Borrow instruction
pub fn borrow(
    underlying_mint: Pubkey,
    borrower: Pubkey,
    destination: Pubkey,
    amount: u64,
) -> Instruction {
    let (pool_authority, _) = derive_authority(&underlying_mint);
    let (vault, _) = derive_vault(&underlying_mint);
    Instruction {
        program_id: crate::id(),
        accounts: vec![
            AccountMeta::new_readonly(borrower, true),
            AccountMeta::new(vault, false),
            AccountMeta::new(destination, false),
            AccountMeta::new_readonly(pool_authority, false),
        ],
        data: PoolInstruction::Borrow { amount }.pack(),
    }
}

/// Creates a Repay instruction
pub fn repay(
    underlying_mint: Pubkey,
    repayer: Pubkey,
    source: Pubkey,
    principal: u64,
    fee: u64,
) -> Instruction {
    let (pool_authority, _) = derive_authority(&underlying_mint);
    let (vault, _) = derive_vault(&underlying_mint);
    Instruction {
        program_id: crate::id(),
        accounts: vec![
            AccountMeta::new_readonly(repayer, true),
            AccountMeta::new(source, false),
            AccountMeta::new(vault, false),
            AccountMeta::new_readonly(pool_authority, false),
        ],
        data: PoolInstruction::Repay { principal, fee }.pack(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        assert_eq!(PoolInstruction::InitPool { fee_rate_bps: 30 }.pack(), vec![0, 30, 0]);
        assert_eq!(
            PoolInstruction::Borrow { amount: 500 }.pack(),
            [vec![3u8], 500u64.to_le_bytes().to_vec()].concat()
        );
        let repay = PoolInstruction::Repay { principal: 500, fee: 2 };
        assert_eq!(repay.pack().len(), 17);
        assert_eq!(PoolInstruction::unpack(&repay.pack()).unwrap(), repay);
    }

    #[test]
    fn rejects_malformed_data() {
        assert_eq!(PoolInstruction::unpack(&[]), Err(PoolError::InvalidInstruction));
        assert_eq!(PoolInstruction::unpack(&[9, 0, 0]), Err(PoolError::InvalidInstruction));
        assert_eq!(PoolInstruction::unpack(&[1, 0, 0, 0]), Err(PoolError::InvalidInstruction));
        // repay with the fee field cut short
        assert_eq!(
            PoolInstruction::unpack(&[vec![4u8], vec![0u8; 12]].concat()),
            Err(PoolError::InvalidInstruction)
        );
    }

    #[test]
    fn builders_place_pool_authority() {
        let mint = Pubkey::new_unique();
        let (pool_authority, _) = derive_authority(&mint);
        let ix = borrow(mint, Pubkey::new_unique(), Pubkey::new_unique(), 10);
        let (decoded, pool) = decode_pool_instruction(&ix).unwrap();
        assert_eq!(decoded, PoolInstruction::Borrow { amount: 10 });
        assert_eq!(pool, pool_authority);
        assert!(ix.accounts[0].is_signer);

        let ix = deposit(mint, Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique(), Pubkey::new_unique(), 1);
        assert_eq!(decode_pool_instruction(&ix).unwrap().1, pool_authority);

        let foreign = Instruction {
            program_id: Pubkey::new_unique(),
            ..ix
        };
        assert!(decode_pool_instruction(&foreign).is_none());
    }
}
