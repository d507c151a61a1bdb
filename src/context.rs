//! The atomic sequence an operation runs inside.
//!
//! A flash loan is only safe if its repayment is already part of the same
//! all-or-nothing sequence. Borrow reads that sequence through this trait
//! instead of reaching for global state, so a synthetic sequence is enough to
//! exercise it.

use solana_program::instruction::Instruction;

use crate::error::PoolError;

/// Ordered, already-decided list of sibling operations
pub trait AtomicTransactionContext {
    /// Every operation in the sequence, in execution order
    fn operations_in_sequence(&self) -> &[Instruction];

    /// Position of the operation currently executing
    fn current_index(&self) -> usize;

    /// Operation at the current index; `ContextMismatch` when out of range
    fn current_operation(&self) -> Result<&Instruction, PoolError> {
        self.operations_in_sequence()
            .get(self.current_index())
            .ok_or(PoolError::ContextMismatch)
    }

    /// Operations strictly after the current one
    fn later_operations(&self) -> &[Instruction] {
        let operations = self.operations_in_sequence();
        let next = self.current_index().saturating_add(1).min(operations.len());
        &operations[next..]
    }
}

/// Borrowed view of a sequence positioned at one operation
#[derive(Clone, Copy, Debug)]
pub struct SequenceContext<'a> {
    operations: &'a [Instruction],
    current: usize,
}

impl<'a> SequenceContext<'a> {
    /// View of `operations` positioned at `current`
    pub fn new(operations: &'a [Instruction], current: usize) -> Self {
        Self { operations, current }
    }

    /// Same sequence, positioned at `current`.
    pub fn at(&self, current: usize) -> Self {
        Self::new(self.operations, current)
    }
}

impl AtomicTransactionContext for SequenceContext<'_> {
    fn operations_in_sequence(&self) -> &[Instruction] {
        self.operations
    }

    fn current_index(&self) -> usize {
        self.current
    }
}
