//! All-or-nothing execution of an ordered list of instructions.
//!
//! The sequence runs against staged copies of the ledger and registry and
//! only writes them back once every instruction has succeeded and no loan is
//! left outstanding. A failure anywhere discards everything, which is what
//! keeps an unrepaid borrow from ever being observed.

use solana_program::{instruction::Instruction, program_error::ProgramError};
use spl_token::instruction::TokenInstruction;
use thiserror::Error;

use crate::{
    context::{AtomicTransactionContext, SequenceContext},
    error::PoolError,
    flash_loan::LoanBook,
    ledger::TokenLedger,
    processor::{next_account_meta, next_signer, OperationOutcome, Processor},
    registry::PoolRegistry,
};

/// Failure of one instruction, which aborted the whole sequence
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("operation {index} failed: {error}")]
pub struct SequenceError {
    /// Position of the failing instruction; equals the sequence length when
    /// the end-of-sequence loan check failed
    pub index: usize,
    /// Why it failed
    pub error: PoolError,
}

impl SequenceError {
    fn new(index: usize, error: PoolError) -> Self {
        if error.is_fatal() {
            log::error!("sequence aborted at operation {}: {} (fatal)", index, error);
        } else {
            log::warn!("sequence aborted at operation {}: {}", index, error);
        }
        Self { index, error }
    }
}

impl From<SequenceError> for ProgramError {
    fn from(e: SequenceError) -> Self {
        e.error.into()
    }
}

/// Ordered operations applied together or not at all
#[derive(Clone, Debug, Default)]
pub struct AtomicSequence {
    operations: Vec<Instruction>,
}

impl AtomicSequence {
    /// Sequence over `operations`, run in the given order
    pub fn new(operations: Vec<Instruction>) -> Self {
        Self { operations }
    }

    /// Append one operation
    pub fn push(&mut self, operation: Instruction) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Operations in execution order
    pub fn operations(&self) -> &[Instruction] {
        &self.operations
    }

    /// Run every operation in order; commit to `registry` and `ledger` only
    /// if all of them succeed.
    pub fn execute<L: TokenLedger + Clone>(
        &self,
        registry: &mut PoolRegistry,
        ledger: &mut L,
    ) -> Result<Vec<OperationOutcome>, SequenceError> {
        let mut staged_registry = registry.clone();
        let mut staged_ledger = ledger.clone();
        let mut loans = LoanBook::new();
        let mut outcomes = Vec::with_capacity(self.operations.len());

        for index in 0..self.operations.len() {
            let context = SequenceContext::new(&self.operations, index);
            let outcome = Self::step(&mut staged_registry, &mut staged_ledger, &mut loans, &context)
                .map_err(|error| SequenceError::new(index, error))?;
            outcomes.push(outcome);
        }
        loans
            .ensure_settled()
            .map_err(|error| SequenceError::new(self.operations.len(), error))?;

        *registry = staged_registry;
        *ledger = staged_ledger;
        log::debug!("sequence of {} operations committed", outcomes.len());
        Ok(outcomes)
    }

    fn step<L: TokenLedger>(
        registry: &mut PoolRegistry,
        ledger: &mut L,
        loans: &mut LoanBook,
        context: &SequenceContext<'_>,
    ) -> Result<OperationOutcome, PoolError> {
        let operation = context.current_operation()?;
        // derived authorities only ever sign through the pool itself
        if operation
            .accounts
            .iter()
            .any(|meta| meta.is_signer && registry.is_pool_authority(&meta.pubkey))
        {
            return Err(PoolError::UnauthorizedSigner);
        }

        if operation.program_id == crate::id() {
            Processor::process(registry, ledger, loans, context)
        } else if operation.program_id == spl_token::id() {
            apply_token_instruction(ledger, operation)
        } else {
            Err(PoolError::UnsupportedProgram)
        }
    }
}

/// Apply an SPL token `Transfer`, `MintTo` or `Burn` to the ledger.
fn apply_token_instruction<L: TokenLedger>(
    ledger: &mut L,
    operation: &Instruction,
) -> Result<OperationOutcome, PoolError> {
    let instruction =
        TokenInstruction::unpack(&operation.data).map_err(|_| PoolError::InvalidInstruction)?;
    let account_iter = &mut operation.accounts.iter();

    match instruction {
        TokenInstruction::Transfer { amount } => {
            let source = next_account_meta(account_iter)?;
            let destination = next_account_meta(account_iter)?;
            let authority = next_signer(account_iter)?;
            ledger.transfer(&source.pubkey, &destination.pubkey, &authority.pubkey, amount)?;
        }
        TokenInstruction::MintTo { amount } => {
            let mint = next_account_meta(account_iter)?;
            let destination = next_account_meta(account_iter)?;
            let authority = next_signer(account_iter)?;
            ledger.mint_to(&mint.pubkey, &destination.pubkey, &authority.pubkey, amount)?;
        }
        TokenInstruction::Burn { amount } => {
            let source = next_account_meta(account_iter)?;
            let mint = next_account_meta(account_iter)?;
            let authority = next_signer(account_iter)?;
            ledger.burn(&source.pubkey, &mint.pubkey, &authority.pubkey, amount)?;
        }
        _ => return Err(PoolError::UnsupportedProgram),
    }
    Ok(OperationOutcome::Token)
}
