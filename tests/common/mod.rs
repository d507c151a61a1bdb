#![allow(dead_code)]

use flash_pool::{
    instruction,
    shares::{Depositor, Withdrawer},
    AtomicSequence, MemoryLedger, OperationOutcome, PoolAuthority, PoolConfig, PoolRegistry,
    PoolSnapshot, SequenceError, TokenLedger,
};
use solana_program::{instruction::Instruction, pubkey::Pubkey};

pub const DECIMALS: u8 = 9;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Wallet with one underlying token account and one share account
#[derive(Clone, Copy, Debug)]
pub struct User {
    pub owner: Pubkey,
    pub token: Pubkey,
    pub shares: Pubkey,
}

/// One pool on an in-memory ledger
pub struct Harness {
    pub ledger: MemoryLedger,
    pub registry: PoolRegistry,
    pub mint: Pubkey,
    pub mint_authority: Pubkey,
    pub pool: PoolAuthority,
}

impl Harness {
    pub fn new(fee_rate_bps: u16) -> Self {
        init_logger();
        let mut ledger = MemoryLedger::new();
        let mut registry = PoolRegistry::new();
        let mint = Pubkey::new_unique();
        let mint_authority = Pubkey::new_unique();
        let share_mint = Pubkey::new_unique();
        let share_mint_authority = Pubkey::new_unique();
        ledger.create_mint(mint, mint_authority, DECIMALS).unwrap();
        ledger
            .create_mint(share_mint, share_mint_authority, DECIMALS)
            .unwrap();
        let pool = registry
            .create_pool(
                &mut ledger,
                &mint,
                &share_mint,
                &share_mint_authority,
                &PoolConfig::new(fee_rate_bps).unwrap(),
            )
            .unwrap();
        Self {
            ledger,
            registry,
            mint,
            mint_authority,
            pool,
        }
    }

    pub fn user(&mut self, funds: u64) -> User {
        let user = User {
            owner: Pubkey::new_unique(),
            token: Pubkey::new_unique(),
            shares: Pubkey::new_unique(),
        };
        self.ledger
            .initialize_account(&user.token, &self.mint, &user.owner)
            .unwrap();
        self.ledger
            .initialize_account(&user.shares, &self.pool.share_mint, &user.owner)
            .unwrap();
        if funds > 0 {
            self.fund(&user, funds);
        }
        user
    }

    pub fn fund(&mut self, user: &User, amount: u64) {
        self.ledger
            .mint_to(&self.mint, &user.token, &self.mint_authority, amount)
            .unwrap();
    }

    pub fn authority(&self) -> Pubkey {
        self.pool.authority().unwrap()
    }

    pub fn depositor(&self, user: &User) -> Depositor {
        Depositor {
            authority: user.owner,
            source: user.token,
            share_destination: user.shares,
        }
    }

    pub fn withdrawer(&self, user: &User) -> Withdrawer {
        Withdrawer {
            authority: user.owner,
            share_source: user.shares,
            destination: user.token,
        }
    }

    pub fn deposit_ix(&self, user: &User, amount: u64) -> Instruction {
        instruction::deposit(
            self.mint,
            self.pool.share_mint,
            user.owner,
            user.token,
            user.shares,
            amount,
        )
    }

    pub fn withdraw_ix(&self, user: &User, shares: u64) -> Instruction {
        instruction::withdraw(
            self.mint,
            self.pool.share_mint,
            user.owner,
            user.shares,
            user.token,
            shares,
        )
    }

    pub fn borrow_ix(&self, user: &User, amount: u64) -> Instruction {
        instruction::borrow(self.mint, user.owner, user.token, amount)
    }

    pub fn repay_ix(&self, user: &User, principal: u64, fee: u64) -> Instruction {
        instruction::repay(self.mint, user.owner, user.token, principal, fee)
    }

    /// SPL token transfer straight into the vault, bypassing the pool
    pub fn donate_ix(&self, user: &User, amount: u64) -> Instruction {
        spl_token::instruction::transfer(
            &spl_token::id(),
            &user.token,
            &self.pool.vault,
            &user.owner,
            &[],
            amount,
        )
        .unwrap()
    }

    pub fn run(&mut self, operations: Vec<Instruction>) -> Result<Vec<OperationOutcome>, SequenceError> {
        AtomicSequence::new(operations).execute(&mut self.registry, &mut self.ledger)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot::read(&self.ledger, &self.pool).unwrap()
    }

    pub fn vault_balance(&self) -> u64 {
        self.ledger.balance_of(&self.pool.vault).unwrap()
    }

    pub fn share_supply(&self) -> u64 {
        self.ledger.supply_of(&self.pool.share_mint).unwrap()
    }

    pub fn shares_of(&self, user: &User) -> u64 {
        self.ledger.balance_of(&user.shares).unwrap()
    }

    pub fn tokens_of(&self, user: &User) -> u64 {
        self.ledger.balance_of(&user.token).unwrap()
    }

    /// Share balances add up to supply, and supply is backed by the vault.
    pub fn assert_backed(&self) {
        assert_eq!(
            self.ledger.holders_total(&self.pool.share_mint),
            u128::from(self.share_supply())
        );
        self.snapshot().check_backing().unwrap();
    }
}

pub fn shares_minted(outcome: &OperationOutcome) -> u64 {
    match outcome {
        OperationOutcome::Deposited { shares_minted } => *shares_minted,
        other => panic!("expected a deposit, got {:?}", other),
    }
}
