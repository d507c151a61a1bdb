mod common;

use common::{Harness, User};
use flash_pool::{
    flash_loan::{self, Repayer},
    instruction, LoanBook, LoanState, OperationOutcome, PoolError, SequenceContext, TokenLedger,
};
use solana_program::{instruction::Instruction, pubkey::Pubkey};

const LIQUIDITY: u64 = 10_000;

/// Pool at 30 bps holding `LIQUIDITY`, plus a borrower with `borrower_funds`
fn funded_pool(borrower_funds: u64) -> (Harness, User, User) {
    let mut h = Harness::new(30);
    let lender = h.user(LIQUIDITY);
    let borrower = h.user(borrower_funds);
    h.run(vec![h.deposit_ix(&lender, LIQUIDITY)]).unwrap();
    (h, lender, borrower)
}

fn repayer(user: &User) -> Repayer {
    Repayer {
        authority: user.owner,
        source: user.token,
    }
}

#[test]
fn test_flash_loan_with_repay() {
    let (mut h, _, borrower) = funded_pool(2);
    let before = h.snapshot();

    let outcomes = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.repay_ix(&borrower, 500, 2),
        ])
        .unwrap();

    match outcomes[0] {
        OperationOutcome::Borrowed(marker) => {
            assert_eq!(marker.principal, 500);
            assert_eq!(marker.fee, 2);
            assert_eq!(marker.vault_balance_snapshot, LIQUIDITY);
            assert_eq!(marker.pool, h.authority());
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }
    match outcomes[1] {
        OperationOutcome::Repaid(settlement) => {
            assert_eq!(settlement.principal_repaid, 500);
            assert_eq!(settlement.fee_paid, 2);
            assert_eq!(settlement.vault_balance, LIQUIDITY + 2);
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    assert_eq!(h.vault_balance(), LIQUIDITY + 2);
    assert_eq!(h.tokens_of(&borrower), 0);
    assert_eq!(h.share_supply(), before.share_supply);
    assert!(h.snapshot().price_above(&before));
    h.assert_backed();
}

#[test]
fn test_fee_accrues_to_share_holders() {
    let (mut h, lender, borrower) = funded_pool(1_000);

    h.run(vec![
        h.borrow_ix(&borrower, LIQUIDITY),
        h.repay_ix(&borrower, LIQUIDITY, 30),
    ])
    .unwrap();

    let outcomes = h.run(vec![h.withdraw_ix(&lender, LIQUIDITY)]).unwrap();
    assert_eq!(
        outcomes[0],
        OperationOutcome::Withdrawn {
            amount_out: LIQUIDITY + 30
        }
    );
    assert_eq!(h.vault_balance(), 0);
    assert_eq!(h.tokens_of(&borrower), 970);
}

#[test]
fn test_overpaying_is_accepted() {
    let (mut h, _, borrower) = funded_pool(100);

    h.run(vec![
        h.borrow_ix(&borrower, 500),
        h.repay_ix(&borrower, 510, 5),
    ])
    .unwrap();

    assert_eq!(h.vault_balance(), LIQUIDITY + 15);
    assert_eq!(h.tokens_of(&borrower), 85);
}

#[test]
fn test_repay_from_another_wallet() {
    let (mut h, _, borrower) = funded_pool(0);
    let backer = h.user(2);

    // principal handed over to the backer, who also covers the fee
    let mut move_funds = h.donate_ix(&borrower, 500);
    move_funds.accounts[1].pubkey = backer.token;
    h.run(vec![
        h.borrow_ix(&borrower, 500),
        move_funds,
        h.repay_ix(&backer, 500, 2),
    ])
    .unwrap();

    assert_eq!(h.vault_balance(), LIQUIDITY + 2);
    assert_eq!(h.tokens_of(&backer), 0);
}

#[test]
fn test_short_fee_fails_borrow() {
    let (mut h, _, borrower) = funded_pool(10);
    let before = h.snapshot();

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.repay_ix(&borrower, 500, 1),
        ])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::UnrepaidLoan);
    assert_eq!(h.snapshot(), before);
    assert_eq!(h.tokens_of(&borrower), 10);
}

#[test]
fn test_short_principal_fails_borrow() {
    let (mut h, _, borrower) = funded_pool(10);

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.repay_ix(&borrower, 499, 2),
        ])
        .unwrap_err();

    assert_eq!(err.error, PoolError::UnrepaidLoan);
    assert_eq!(h.vault_balance(), LIQUIDITY);
}

#[test]
fn test_borrow_without_repay() {
    let (mut h, _, borrower) = funded_pool(0);

    let err = h.run(vec![h.borrow_ix(&borrower, 500)]).unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::UnrepaidLoan);
    assert_eq!(h.vault_balance(), LIQUIDITY);
    assert_eq!(h.tokens_of(&borrower), 0);
}

#[test]
fn test_repay_before_borrow_does_not_count() {
    let (mut h, _, borrower) = funded_pool(10);

    let err = h
        .run(vec![
            h.repay_ix(&borrower, 500, 2),
            h.borrow_ix(&borrower, 500),
        ])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::NoActiveLoan);
}

#[test]
fn test_repay_to_another_pool_does_not_count() {
    let (mut h, _, borrower) = funded_pool(10);
    let other_mint = Pubkey::new_unique();

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            instruction::repay(other_mint, borrower.owner, borrower.token, 500, 2),
        ])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::UnrepaidLoan);
}

#[test]
fn test_second_borrow_before_repay() {
    let (mut h, _, borrower) = funded_pool(10);

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 100),
            h.borrow_ix(&borrower, 100),
            h.repay_ix(&borrower, 100, 1),
            h.repay_ix(&borrower, 100, 1),
        ])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::BorrowBeforeRepay);
    assert_eq!(h.vault_balance(), LIQUIDITY);
}

#[test]
fn test_sequential_loans_in_one_sequence() {
    let (mut h, _, borrower) = funded_pool(10);

    h.run(vec![
        h.borrow_ix(&borrower, 100),
        h.repay_ix(&borrower, 100, 1),
        h.borrow_ix(&borrower, 200),
        h.repay_ix(&borrower, 200, 1),
    ])
    .unwrap();

    assert_eq!(h.vault_balance(), LIQUIDITY + 2);
    assert_eq!(h.tokens_of(&borrower), 8);
}

#[test]
fn test_borrow_amount_checks() {
    let (mut h, _, borrower) = funded_pool(100);

    let err = h
        .run(vec![h.borrow_ix(&borrower, 0), h.repay_ix(&borrower, 0, 0)])
        .unwrap_err();
    assert_eq!(err.error, PoolError::InvalidAmount);

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, LIQUIDITY + 1),
            h.repay_ix(&borrower, LIQUIDITY + 1, 31),
        ])
        .unwrap_err();
    assert_eq!(err.error, PoolError::InsufficientLiquidity);
}

#[test]
fn test_borrow_into_share_account_rejected() {
    let (mut h, _, borrower) = funded_pool(10);

    let mut borrow = h.borrow_ix(&borrower, 500);
    borrow.accounts[2].pubkey = borrower.shares;
    let err = h
        .run(vec![borrow, h.repay_ix(&borrower, 500, 2)])
        .unwrap_err();

    assert_eq!(err.index, 0);
    assert_eq!(err.error, PoolError::MintMismatch);
    assert_eq!(h.vault_balance(), LIQUIDITY);
    assert_eq!(h.shares_of(&borrower), 0);
}

#[test]
fn test_repay_from_share_account_rejected() {
    let (mut h, _, borrower) = funded_pool(10);

    let mut repay = h.repay_ix(&borrower, 500, 2);
    repay.accounts[1].pubkey = borrower.shares;
    let err = h
        .run(vec![h.borrow_ix(&borrower, 500), repay])
        .unwrap_err();

    assert_eq!(err.index, 1);
    assert_eq!(err.error, PoolError::MintMismatch);
    assert_eq!(h.vault_balance(), LIQUIDITY);
    assert_eq!(h.tokens_of(&borrower), 10);
}

#[test]
fn test_deposit_and_withdraw_blocked_during_loan() {
    let (mut h, lender, borrower) = funded_pool(10);
    let before = h.snapshot();

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.withdraw_ix(&lender, 100),
            h.repay_ix(&borrower, 500, 2),
        ])
        .unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.error, PoolError::LoanOutstanding);

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.deposit_ix(&borrower, 5),
            h.repay_ix(&borrower, 500, 2),
        ])
        .unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.error, PoolError::LoanOutstanding);

    assert_eq!(h.snapshot(), before);
}

#[test]
fn test_failed_repay_rolls_back_loan() {
    let (mut h, _, borrower) = funded_pool(1);

    // covers principal but not the 2 unit fee
    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            h.repay_ix(&borrower, 500, 2),
        ])
        .unwrap_err();

    assert_eq!(err.index, 1);
    assert_eq!(err.error, PoolError::InsufficientFunds);
    assert_eq!(h.vault_balance(), LIQUIDITY);
    assert_eq!(h.tokens_of(&borrower), 1);
}

#[test]
fn test_pool_authority_cannot_sign() {
    let (mut h, _, borrower) = funded_pool(0);
    let authority = h.authority();
    let drain = spl_token::instruction::transfer(
        &spl_token::id(),
        &h.pool.vault,
        &borrower.token,
        &authority,
        &[],
        LIQUIDITY,
    )
    .unwrap();

    let err = h.run(vec![drain]).unwrap_err();
    assert_eq!(err.error, PoolError::UnauthorizedSigner);
    assert_eq!(h.vault_balance(), LIQUIDITY);
}

#[test]
fn test_unknown_program_rejected() {
    let (mut h, _, borrower) = funded_pool(10);
    let foreign = Instruction {
        program_id: Pubkey::new_unique(),
        accounts: vec![],
        data: vec![],
    };

    let err = h
        .run(vec![
            h.borrow_ix(&borrower, 500),
            foreign,
            h.repay_ix(&borrower, 500, 2),
        ])
        .unwrap_err();
    assert_eq!(err.index, 1);
    assert_eq!(err.error, PoolError::UnsupportedProgram);
}

#[test]
fn test_engine_repay_transitions() {
    let (mut h, _, borrower) = funded_pool(10);
    let authority = h.authority();
    let operations = vec![h.borrow_ix(&borrower, 500), h.repay_ix(&borrower, 500, 2)];
    let context = SequenceContext::new(&operations, 0);
    let mut loans = LoanBook::new();
    assert_eq!(loans.state(&authority), LoanState::Idle);

    let marker = flash_loan::borrow(
        &mut h.ledger,
        &h.pool,
        500,
        &borrower.token,
        &context,
        &mut loans,
    )
    .unwrap();
    assert_eq!(loans.state(&authority), LoanState::Borrowed);
    assert_eq!(loans.active(&authority), Some(&marker));
    assert_eq!(loans.ensure_settled(), Err(PoolError::UnrepaidLoan));
    assert_eq!(h.vault_balance(), LIQUIDITY - 500);

    assert_eq!(
        flash_loan::repay(&mut h.ledger, &h.pool, 500, 1, &repayer(&borrower), &mut loans),
        Err(PoolError::InsufficientRepayment)
    );
    assert_eq!(
        flash_loan::repay(&mut h.ledger, &h.pool, 499, 2, &repayer(&borrower), &mut loans),
        Err(PoolError::InsufficientRepayment)
    );
    assert_eq!(loans.state(&authority), LoanState::Borrowed);

    let settlement =
        flash_loan::repay(&mut h.ledger, &h.pool, 500, 2, &repayer(&borrower), &mut loans)
            .unwrap();
    assert_eq!(settlement.loan, marker);
    assert_eq!(loans.state(&authority), LoanState::Settled);
    assert_eq!(loans.settlements(), &[settlement]);
    assert!(loans.ensure_settled().is_ok());
    assert_eq!(h.vault_balance(), LIQUIDITY + 2);

    assert_eq!(
        flash_loan::repay(&mut h.ledger, &h.pool, 500, 2, &repayer(&borrower), &mut loans),
        Err(PoolError::NoActiveLoan)
    );
}

#[test]
fn test_engine_borrow_checks_context() {
    let (mut h, lender, borrower) = funded_pool(10);
    let mut loans = LoanBook::new();

    // positioned at a deposit rather than the borrow
    let operations = vec![h.deposit_ix(&lender, 1), h.repay_ix(&borrower, 500, 2)];
    let context = SequenceContext::new(&operations, 0);
    assert_eq!(
        flash_loan::borrow(&mut h.ledger, &h.pool, 500, &borrower.token, &context, &mut loans),
        Err(PoolError::ContextMismatch)
    );

    // borrow in the sequence is for a different amount
    let operations = vec![h.borrow_ix(&borrower, 400), h.repay_ix(&borrower, 500, 2)];
    let context = SequenceContext::new(&operations, 0);
    assert_eq!(
        flash_loan::borrow(&mut h.ledger, &h.pool, 500, &borrower.token, &context, &mut loans),
        Err(PoolError::ContextMismatch)
    );

    // index past the end
    let context = SequenceContext::new(&operations, 5);
    assert_eq!(
        flash_loan::borrow(&mut h.ledger, &h.pool, 500, &borrower.token, &context, &mut loans),
        Err(PoolError::ContextMismatch)
    );

    assert_eq!(h.vault_balance(), LIQUIDITY);
    assert_eq!(loans.state(&h.authority()), LoanState::Idle);
}

#[test]
fn test_engine_require_repayment_looks_forward_only() {
    let (h, _, borrower) = funded_pool(10);
    let authority = h.authority();
    let operations = vec![
        h.repay_ix(&borrower, 500, 2),
        h.borrow_ix(&borrower, 500),
        h.repay_ix(&borrower, 500, 2),
    ];
    let context = SequenceContext::new(&operations, 1);

    assert!(flash_loan::require_repayment(&context, &authority, 500, 2).is_ok());
    assert_eq!(
        flash_loan::require_repayment(&context, &authority, 500, 3),
        Err(PoolError::UnrepaidLoan)
    );

    let truncated = &operations[..2];
    let context = SequenceContext::new(truncated, 1);
    assert_eq!(
        flash_loan::require_repayment(&context, &authority, 500, 2),
        Err(PoolError::UnrepaidLoan)
    );
}

#[test]
fn test_engine_detects_drained_vault_on_repay() {
    let (mut h, lender, borrower) = funded_pool(10);
    let authority = h.authority();
    let operations = vec![h.borrow_ix(&borrower, 500), h.repay_ix(&borrower, 500, 2)];
    let context = SequenceContext::new(&operations, 0);
    let mut loans = LoanBook::new();

    flash_loan::borrow(
        &mut h.ledger,
        &h.pool,
        500,
        &borrower.token,
        &context,
        &mut loans,
    )
    .unwrap();
    // funds leave the vault through a path the pool never sanctioned
    h.ledger
        .transfer(&h.pool.vault, &lender.token, &authority, LIQUIDITY - 500)
        .unwrap();

    let err = flash_loan::repay(&mut h.ledger, &h.pool, 500, 2, &repayer(&borrower), &mut loans)
        .unwrap_err();
    assert_eq!(err, PoolError::InvariantViolation);
    assert!(err.is_fatal());
    assert_eq!(loans.state(&authority), LoanState::Borrowed);
}
