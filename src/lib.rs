#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Flash Pool
//!
//! Accounting core of a single-asset lending pool. Depositors receive share
//! tokens priced off the vault balance; anyone may take a flash loan from the
//! vault as long as the repayment, plus a fee that accrues to share holders,
//! is part of the same atomic sequence.

/// Pool parameters and seeds
pub mod config;
/// Atomic sequence context seen by borrow
pub mod context;
/// Program error types
pub mod error;
/// Flash loan issuance and repayment
pub mod flash_loan;
/// Instruction types and builders
pub mod instruction;
/// Token ledger abstraction
pub mod ledger;
/// Checked arithmetic helpers
pub mod math;
/// Instruction processing logic
pub mod processor;
/// Pool lookup by underlying mint
pub mod registry;
/// All-or-nothing execution of instruction lists
pub mod sequence;
/// Deposit and withdrawal share accounting
pub mod shares;
/// Pool state record
pub mod state;

pub use config::PoolConfig;
pub use context::{AtomicTransactionContext, SequenceContext};
pub use error::PoolError;
pub use flash_loan::{LoanBook, LoanMarker, LoanState, Settlement};
pub use ledger::{MemoryLedger, TokenLedger};
pub use processor::{OperationOutcome, Processor};
pub use registry::PoolRegistry;
pub use sequence::{AtomicSequence, SequenceError};
pub use shares::PoolSnapshot;
pub use state::{derive_authority, derive_vault, PoolAuthority};

// Export current SDK types for downstream users
pub use solana_program;

solana_program::declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");
