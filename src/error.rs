use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors that may be returned by the flash pool
#[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
pub enum PoolError {
    /// Zero or otherwise unusable amount
    #[error("Invalid amount")]
    InvalidAmount,

    /// Deposit or withdrawal rounds to nothing
    #[error("Amount is too small to mint or redeem a whole unit")]
    AmountTooSmall,

    /// Withdrawer holds fewer shares than requested
    #[error("Insufficient shares")]
    InsufficientShares,

    /// No shares exist to withdraw
    #[error("Pool has no outstanding shares")]
    PoolEmpty,

    /// Vault holds less than the requested loan
    #[error("Insufficient liquidity available")]
    InsufficientLiquidity,

    /// Repay carries less than the principal or fee owed
    #[error("The repayment amount is incorrect")]
    InsufficientRepayment,

    /// No pool exists for the underlying mint
    #[error("Pool not found")]
    NotFound,

    /// Pool or account already exists
    #[error("Pool already exists")]
    AlreadyExists,

    /// Borrow without a qualifying later repay in the sequence
    #[error("There is no repayment instruction for this loan")]
    UnrepaidLoan,

    /// Repay without a matching borrow
    #[error("No active loan for this pool")]
    NoActiveLoan,

    /// A second borrow of the same pool before the first is repaid
    #[error("Cannot borrow before repay")]
    BorrowBeforeRepay,

    /// Borrow is not the operation the context is executing
    #[error("Borrow is not the current top-level operation")]
    ContextMismatch,

    /// Deposit or withdraw while the pool has principal out on loan
    #[error("Pool has an outstanding flash loan")]
    LoanOutstanding,

    /// Shares exist but the vault is empty
    #[error("Share supply is not backed by the vault")]
    DegenerateShareSupply,

    /// Vault lost funds between borrow and repay
    #[error("Vault balance invariant violated")]
    InvariantViolation,

    /// Checked arithmetic failed
    #[error("Math overflow")]
    MathOverflow,

    /// Instruction data could not be decoded
    #[error("Invalid instruction")]
    InvalidInstruction,

    /// Stored pool record could not be decoded
    #[error("Invalid account data")]
    InvalidAccountData,

    /// Account key differs from the one the pool expects
    #[error("Address mismatch")]
    AddressMismatch,

    /// Token account holds a different mint than expected
    #[error("Mint mismatch")]
    MintMismatch,

    /// Share mint cannot back a new pool
    #[error("Invalid share mint")]
    InvalidShareMint,

    /// Share mint is already bound to another pool
    #[error("Share mint already in use by another pool")]
    ShareMintInUse,

    /// Fee rate above 100%
    #[error("Invalid fee rate")]
    InvalidFeeRate,

    /// Configuration could not be parsed
    #[error("Invalid configuration")]
    InvalidConfig,

    /// Required signer flag absent
    #[error("Missing required signature")]
    MissingSigner,

    /// A derived pool authority was presented as a top-level signer
    #[error("Derived authority cannot sign")]
    UnauthorizedSigner,

    /// Authority does not own the account or mint
    #[error("Owner mismatch")]
    Unauthorized,

    /// Token account balance too low
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// Ledger has no such account or mint
    #[error("Account not found")]
    AccountNotFound,

    /// Ledger already has an account at that address
    #[error("Account already initialized")]
    AccountAlreadyInitialized,

    /// Instruction targets a program the sequence cannot run
    #[error("Unsupported program")]
    UnsupportedProgram,
}

impl PoolError {
    /// Numeric code carried in `ProgramError::Custom`.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Recover a variant from its numeric code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }

    /// The pool's backing guarantee was already broken before this call.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::DegenerateShareSupply | Self::InvariantViolation)
    }

    /// Caller attempted to sidestep flash-loan atomicity.
    pub fn is_protocol_safety(self) -> bool {
        matches!(
            self,
            Self::UnrepaidLoan | Self::NoActiveLoan | Self::BorrowBeforeRepay | Self::ContextMismatch
        )
    }
}

impl From<PoolError> for ProgramError {
    fn from(e: PoolError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

/// Log a fatal invariant violation and hand the error back for propagation.
pub(crate) fn fatal(err: PoolError, detail: &str) -> PoolError {
    log::error!("FATAL {}: {}", err, detail);
    err
}
