use solana_program::pubkey::Pubkey;

use super::loan::{LoanBook, LoanMarker, Settlement};
use crate::{
    context::AtomicTransactionContext,
    error::{fatal, PoolError},
    instruction::{decode_pool_instruction, PoolInstruction},
    ledger::TokenLedger,
    math::flash_loan_fee,
    state::PoolAuthority,
};

/// Accounts a repayer brings
#[derive(Clone, Copy, Debug)]
pub struct Repayer {
    /// Owner of `source`
    pub authority: Pubkey,
    /// Token account the principal and fee come from
    pub source: Pubkey,
}

/// Check that the sequence settles a loan of `amount` owing `fee`.
///
/// The operation at the current index must be this very borrow, issued at
/// the top level. Looking strictly forward, the first of this program's
/// operations that touches the same pool decides: a `Repay` covering
/// principal and fee passes, anything short of that is an unrepaid loan, and
/// a second `Borrow` is refused outright.
pub fn require_repayment<C: AtomicTransactionContext + ?Sized>(
    context: &C,
    pool: &Pubkey,
    amount: u64,
    fee: u64,
) -> Result<(), PoolError> {
    match decode_pool_instruction(context.current_operation()?) {
        Some((PoolInstruction::Borrow { amount: current }, target))
            if current == amount && target == *pool => {}
        _ => return Err(PoolError::ContextMismatch),
    }

    for (offset, operation) in context.later_operations().iter().enumerate() {
        let Some((instruction, target)) = decode_pool_instruction(operation) else {
            continue;
        };
        if target != *pool {
            continue;
        }
        match instruction {
            PoolInstruction::Repay { principal, fee: paid } => {
                log::debug!(
                    "repay found {} operations ahead: principal={} fee={} (owed {} + {})",
                    offset + 1,
                    principal,
                    paid,
                    amount,
                    fee
                );
                if principal >= amount && paid >= fee {
                    return Ok(());
                }
                return Err(PoolError::UnrepaidLoan);
            }
            PoolInstruction::Borrow { .. } => return Err(PoolError::BorrowBeforeRepay),
            _ => {}
        }
    }
    Err(PoolError::UnrepaidLoan)
}

/// Lend `amount` from the vault to `destination`.
///
/// Nothing moves unless the surrounding sequence already contains a
/// qualifying repay; the returned marker is also recorded in `loans`.
pub fn borrow<L, C>(
    ledger: &mut L,
    pool: &PoolAuthority,
    amount: u64,
    destination: &Pubkey,
    context: &C,
    loans: &mut LoanBook,
) -> Result<LoanMarker, PoolError>
where
    L: TokenLedger + ?Sized,
    C: AtomicTransactionContext + ?Sized,
{
    if amount == 0 {
        return Err(PoolError::InvalidAmount);
    }
    let authority = pool.authority()?;
    if loans.is_active(&authority) {
        return Err(PoolError::BorrowBeforeRepay);
    }

    let vault_balance = ledger.balance_of(&pool.vault)?;
    if amount > vault_balance {
        return Err(PoolError::InsufficientLiquidity);
    }
    let fee = flash_loan_fee(amount, pool.fee_rate_bps)?;

    require_repayment(context, &authority, amount, fee)?;
    ledger.require_mint(destination, &pool.underlying_mint)?;

    ledger.transfer(&pool.vault, destination, &authority, amount)?;

    let marker = LoanMarker {
        pool: authority,
        principal: amount,
        fee,
        vault_balance_snapshot: vault_balance,
    };
    loans.open(marker)?;

    log::info!(
        "flash loan: amount={} fee={} repay={} vault_before={}",
        amount,
        fee,
        marker.total_owed()?,
        vault_balance
    );
    Ok(marker)
}

/// Return an outstanding loan with its fee and settle it.
pub fn repay<L: TokenLedger + ?Sized>(
    ledger: &mut L,
    pool: &PoolAuthority,
    principal: u64,
    fee_paid: u64,
    repayer: &Repayer,
    loans: &mut LoanBook,
) -> Result<Settlement, PoolError> {
    let authority = pool.authority()?;
    let marker = *loans.active(&authority).ok_or(PoolError::NoActiveLoan)?;
    if principal < marker.principal || fee_paid < marker.fee {
        return Err(PoolError::InsufficientRepayment);
    }
    let total = principal
        .checked_add(fee_paid)
        .ok_or(PoolError::MathOverflow)?;

    let source = ledger.require_mint(&repayer.source, &pool.underlying_mint)?;
    if source.owner != repayer.authority {
        return Err(PoolError::Unauthorized);
    }
    if source.amount < total {
        return Err(PoolError::InsufficientFunds);
    }

    ledger.transfer(&repayer.source, &pool.vault, &repayer.authority, total)?;

    let vault_balance = ledger.balance_of(&pool.vault)?;
    let required = marker.required_vault_balance()?;
    if vault_balance < required {
        return Err(fatal(
            PoolError::InvariantViolation,
            &format!(
                "vault {} holds {} after repay, expected at least {}",
                pool.vault, vault_balance, required
            ),
        ));
    }

    let settlement = Settlement {
        loan: marker,
        principal_repaid: principal,
        fee_paid,
        vault_balance,
    };
    loans.settle(settlement)?;

    log::info!(
        "flash loan repaid: principal={} fee={} vault_after={}",
        principal,
        fee_paid,
        vault_balance
    );
    Ok(settlement)
}
