use solana_program::{instruction::AccountMeta, pubkey::Pubkey};

use crate::{
    config::PoolConfig,
    context::AtomicTransactionContext,
    error::PoolError,
    flash_loan::{self, LoanBook, LoanMarker, Repayer, Settlement},
    instruction::PoolInstruction,
    ledger::TokenLedger,
    registry::PoolRegistry,
    shares::{self, Depositor, Withdrawer},
    state::{derive_authority, derive_vault, PoolAuthority},
};

/// What one executed instruction produced
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationOutcome {
    /// New pool record
    PoolCreated(PoolAuthority),
    /// Shares credited to the depositor
    Deposited {
        /// Share units minted
        shares_minted: u64,
    },
    /// Underlying paid out to the withdrawer
    Withdrawn {
        /// Underlying units transferred out of the vault
        amount_out: u64,
    },
    /// Loan issued; repaid later in the same sequence
    Borrowed(LoanMarker),
    /// Loan settled
    Repaid(Settlement),
    /// A token program instruction applied to the ledger
    Token,
}

pub(crate) fn next_account_meta<'a, I: Iterator<Item = &'a AccountMeta>>(
    iter: &mut I,
) -> Result<&'a AccountMeta, PoolError> {
    iter.next().ok_or(PoolError::InvalidInstruction)
}

pub(crate) fn next_signer<'a, I: Iterator<Item = &'a AccountMeta>>(
    iter: &mut I,
) -> Result<&'a AccountMeta, PoolError> {
    let meta = next_account_meta(iter)?;
    if !meta.is_signer {
        return Err(PoolError::MissingSigner);
    }
    Ok(meta)
}

fn require_key(meta: &AccountMeta, expected: &Pubkey) -> Result<(), PoolError> {
    if meta.pubkey != *expected {
        return Err(PoolError::AddressMismatch);
    }
    Ok(())
}

/// Instruction processor
pub struct Processor;

impl Processor {
    /// Process the operation the context is positioned at
    pub fn process<L, C>(
        registry: &mut PoolRegistry,
        ledger: &mut L,
        loans: &mut LoanBook,
        context: &C,
    ) -> Result<OperationOutcome, PoolError>
    where
        L: TokenLedger + ?Sized,
        C: AtomicTransactionContext + ?Sized,
    {
        let operation = context.current_operation()?;
        if operation.program_id != crate::id() {
            return Err(PoolError::UnsupportedProgram);
        }
        let instruction = PoolInstruction::unpack(&operation.data)?;
        let accounts = &operation.accounts;

        match instruction {
            PoolInstruction::InitPool { fee_rate_bps } => {
                log::debug!("Instruction: InitPool");
                Self::process_init_pool(registry, ledger, accounts, fee_rate_bps)
            }
            PoolInstruction::Deposit { amount } => {
                log::debug!("Instruction: Deposit");
                Self::process_deposit(registry, ledger, loans, accounts, amount)
            }
            PoolInstruction::Withdraw { shares } => {
                log::debug!("Instruction: Withdraw");
                Self::process_withdraw(registry, ledger, loans, accounts, shares)
            }
            PoolInstruction::Borrow { amount } => {
                log::debug!("Instruction: Borrow");
                Self::process_borrow(registry, ledger, loans, context, accounts, amount)
            }
            PoolInstruction::Repay { principal, fee } => {
                log::debug!("Instruction: Repay");
                Self::process_repay(registry, ledger, loans, accounts, principal, fee)
            }
        }
    }

    fn process_init_pool<L: TokenLedger + ?Sized>(
        registry: &mut PoolRegistry,
        ledger: &mut L,
        accounts: &[AccountMeta],
        fee_rate_bps: u16,
    ) -> Result<OperationOutcome, PoolError> {
        let account_iter = &mut accounts.iter();
        // Account 0: Current share mint authority
        let share_mint_authority = next_signer(account_iter)?;
        // Account 1: Underlying mint
        let underlying_mint = next_account_meta(account_iter)?;
        // Account 2: Share mint
        let share_mint = next_account_meta(account_iter)?;
        // Account 3: Derived pool authority
        let pool_authority = next_account_meta(account_iter)?;
        // Account 4: Derived vault
        let vault = next_account_meta(account_iter)?;

        require_key(pool_authority, &derive_authority(&underlying_mint.pubkey).0)?;
        require_key(vault, &derive_vault(&underlying_mint.pubkey).0)?;

        let config = PoolConfig::new(fee_rate_bps)?;
        let pool = registry.create_pool(
            ledger,
            &underlying_mint.pubkey,
            &share_mint.pubkey,
            &share_mint_authority.pubkey,
            &config,
        )?;
        Ok(OperationOutcome::PoolCreated(pool))
    }

    fn process_deposit<L: TokenLedger + ?Sized>(
        registry: &PoolRegistry,
        ledger: &mut L,
        loans: &LoanBook,
        accounts: &[AccountMeta],
        amount: u64,
    ) -> Result<OperationOutcome, PoolError> {
        let account_iter = &mut accounts.iter();
        let depositor = next_signer(account_iter)?;
        let source = next_account_meta(account_iter)?;
        let vault = next_account_meta(account_iter)?;
        let share_destination = next_account_meta(account_iter)?;
        let share_mint = next_account_meta(account_iter)?;
        let pool_authority = next_account_meta(account_iter)?;

        let pool = registry.load(&pool_authority.pubkey)?;
        pool.verify_vault(&vault.pubkey)?;
        require_key(share_mint, &pool.share_mint)?;
        if loans.is_active(&pool_authority.pubkey) {
            return Err(PoolError::LoanOutstanding);
        }

        let shares_minted = shares::deposit(
            ledger,
            &pool,
            amount,
            &Depositor {
                authority: depositor.pubkey,
                source: source.pubkey,
                share_destination: share_destination.pubkey,
            },
        )?;
        Ok(OperationOutcome::Deposited { shares_minted })
    }

    fn process_withdraw<L: TokenLedger + ?Sized>(
        registry: &PoolRegistry,
        ledger: &mut L,
        loans: &LoanBook,
        accounts: &[AccountMeta],
        shares_burned: u64,
    ) -> Result<OperationOutcome, PoolError> {
        let account_iter = &mut accounts.iter();
        let withdrawer = next_signer(account_iter)?;
        let share_source = next_account_meta(account_iter)?;
        let destination = next_account_meta(account_iter)?;
        let vault = next_account_meta(account_iter)?;
        let share_mint = next_account_meta(account_iter)?;
        let pool_authority = next_account_meta(account_iter)?;

        let pool = registry.load(&pool_authority.pubkey)?;
        pool.verify_vault(&vault.pubkey)?;
        require_key(share_mint, &pool.share_mint)?;
        if loans.is_active(&pool_authority.pubkey) {
            return Err(PoolError::LoanOutstanding);
        }

        let amount_out = shares::withdraw(
            ledger,
            &pool,
            shares_burned,
            &Withdrawer {
                authority: withdrawer.pubkey,
                share_source: share_source.pubkey,
                destination: destination.pubkey,
            },
        )?;
        Ok(OperationOutcome::Withdrawn { amount_out })
    }

    fn process_borrow<L, C>(
        registry: &PoolRegistry,
        ledger: &mut L,
        loans: &mut LoanBook,
        context: &C,
        accounts: &[AccountMeta],
        amount: u64,
    ) -> Result<OperationOutcome, PoolError>
    where
        L: TokenLedger + ?Sized,
        C: AtomicTransactionContext + ?Sized,
    {
        let account_iter = &mut accounts.iter();
        // Account 0: Borrower
        next_signer(account_iter)?;
        // Account 1: Vault
        let vault = next_account_meta(account_iter)?;
        // Account 2: Destination
        let destination = next_account_meta(account_iter)?;
        // Account 3: Derived pool authority
        let pool_authority = next_account_meta(account_iter)?;

        let pool = registry.load(&pool_authority.pubkey)?;
        pool.verify_vault(&vault.pubkey)?;

        let marker = flash_loan::borrow(ledger, &pool, amount, &destination.pubkey, context, loans)?;
        Ok(OperationOutcome::Borrowed(marker))
    }

    fn process_repay<L: TokenLedger + ?Sized>(
        registry: &PoolRegistry,
        ledger: &mut L,
        loans: &mut LoanBook,
        accounts: &[AccountMeta],
        principal: u64,
        fee: u64,
    ) -> Result<OperationOutcome, PoolError> {
        let account_iter = &mut accounts.iter();
        // Account 0: Repayer
        let repayer = next_signer(account_iter)?;
        // Account 1: Source
        let source = next_account_meta(account_iter)?;
        // Account 2: Vault
        let vault = next_account_meta(account_iter)?;
        // Account 3: Derived pool authority
        let pool_authority = next_account_meta(account_iter)?;

        let pool = registry.load(&pool_authority.pubkey)?;
        pool.verify_vault(&vault.pubkey)?;

        let settlement = flash_loan::repay(
            ledger,
            &pool,
            principal,
            fee,
            &Repayer {
                authority: repayer.pubkey,
                source: source.pubkey,
            },
            loans,
        )?;
        Ok(OperationOutcome::Repaid(settlement))
    }
}
