/// Flash loans issued from a pool's vault
///
/// A loan moves `Idle → Borrowed → Settled` inside a single atomic sequence.
/// Borrow is conditioned on the sequence already carrying the repayment, so
/// there is no rollback path here: if the sequence aborts, nothing it did
/// persists, loan included.

pub mod engine;
/// Loan markers and the per-sequence loan book
pub mod loan;

pub use engine::{borrow, repay, require_repayment, Repayer};
pub use loan::{LoanBook, LoanMarker, LoanState, Settlement};
