//! These errors are for internal IR failures, found by [`crate::Context::verify`].  Mutation
//! through the public block API can't produce them, so they indicate a bug in this crate or in
//! code poking at crate internals.
//!
//! Blocks are identified by number and instructions by their rendered text.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IrError {
    #[error("Block {0} has a terminator before its last instruction.")]
    MisplacedTerminator(usize),
    #[error("Block {0} has a terminated flag which disagrees with its last instruction.")]
    InconsistentTermination(usize),
    #[error("Instruction `{0}` in block {1} doesn't record that block as its parent.")]
    InconsistentParent(String, usize),
    #[error("Successors of block {0} don't match the jump targets of its terminator.")]
    InconsistentSuccessors(usize),
    #[error("Edge from block {0} to block {1} isn't recorded on both ends.")]
    AsymmetricEdge(usize, usize),
    #[error("Variable `{0}` is referenced by `{1}` but isn't in the symbol table.")]
    UnknownVariable(String, String),
    #[error("Variable `{0}` is referenced by `{1}` but the reference isn't registered.")]
    MissingReference(String, String),
    #[error("Variable `{0}` has a registered reference from an instruction not referencing it.")]
    StaleReference(String),
}
