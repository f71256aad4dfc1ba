//! Represents a 'basic block' of [`Instruction`]s in a control flow graph.
//!
//! [`Block`]s contain zero or more _non-terminating_ instructions and at most one _terminating_
//! instruction or _terminator_.  Terminators are branches, jumps, returns or `unreachable` and are
//! always the last instruction in the block.  Once a block is terminated nothing more may be
//! appended to it until the terminator is deleted again.
//!
//! The successor and predecessor sets of every block are derived from terminators and are kept
//! symmetric: `b` is a successor of `a` exactly when `a` is a predecessor of `b`.

use rustc_hash::FxHashSet;

use crate::{
    context::Context,
    expression::Expr,
    instruction::{Assignment, Instruction},
    FxIndexSet,
};

/// A wrapper around an [ECS](https://github.com/orlp/slotmap) handle into the [`Context`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Block(pub slotmap::DefaultKey);

#[doc(hidden)]
pub struct BlockContent {
    /// Block number, used when printing and cross referencing.
    pub number: usize,
    /// List of instructions in the block.
    pub(crate) instructions: Vec<Instruction>,
    /// CFG predecessors.
    pub(crate) preds: FxIndexSet<Block>,
    /// CFG successors.
    pub(crate) succs: FxIndexSet<Block>,
    pub(crate) terminated: bool,
}

impl Block {
    /// Return a new block handle.
    ///
    /// Blocks are numbered in order of creation within the context.
    pub fn new(context: &mut Context) -> Block {
        let content = BlockContent {
            number: context.get_next_block_number(),
            instructions: Vec::new(),
            preds: FxIndexSet::default(),
            succs: FxIndexSet::default(),
            terminated: false,
        };
        Block(context.blocks.insert(content))
    }

    /// Get the number of this block.
    pub fn get_number(&self, context: &Context) -> usize {
        context.blocks[self.0].number
    }

    /// Get the number of instructions in this block.
    pub fn num_instructions(&self, context: &Context) -> usize {
        context.blocks[self.0].instructions.len()
    }

    pub fn is_empty(&self, context: &Context) -> bool {
        context.blocks[self.0].instructions.is_empty()
    }

    /// Get instruction at position `pos`.
    ///
    /// Returns `None` if `pos` is out of range.
    pub fn get_instruction_at(&self, context: &Context, pos: usize) -> Option<Instruction> {
        context.blocks[self.0].instructions.get(pos).copied()
    }

    /// Get an iterator over this block's instructions, in order.
    pub fn instruction_iter<'a>(
        &self,
        context: &'a Context,
    ) -> impl DoubleEndedIterator<Item = Instruction> + 'a {
        context.blocks[self.0].instructions.iter().copied()
    }

    /// Return whether this block ends with a terminator.
    pub fn is_terminated(&self, context: &Context) -> bool {
        context.blocks[self.0].terminated
    }

    /// Get the block terminator.
    ///
    /// Returns `None` if the block isn't terminated.
    pub fn get_terminator(&self, context: &Context) -> Option<Instruction> {
        let content = &context.blocks[self.0];
        if content.terminated {
            content.instructions.last().copied()
        } else {
            None
        }
    }

    /// Get an iterator over this block's predecessor blocks.
    pub fn pred_iter<'a>(&self, context: &'a Context) -> impl Iterator<Item = Block> + 'a {
        context.blocks[self.0].preds.iter().copied()
    }

    /// Get an iterator over this block's successor blocks.
    pub fn succ_iter<'a>(&self, context: &'a Context) -> impl Iterator<Item = Block> + 'a {
        context.blocks[self.0].succs.iter().copied()
    }

    /// Get the number of predecessor blocks, i.e., blocks which branch to this one.
    pub fn num_predecessors(&self, context: &Context) -> usize {
        context.blocks[self.0].preds.len()
    }

    /// Get the number of successor blocks, i.e., blocks this one may branch to.
    pub fn num_successors(&self, context: &Context) -> usize {
        context.blocks[self.0].succs.len()
    }

    pub fn has_predecessor(&self, context: &Context, pred: Block) -> bool {
        context.blocks[self.0].preds.contains(&pred)
    }

    pub fn has_successor(&self, context: &Context, succ: Block) -> bool {
        context.blocks[self.0].succs.contains(&succ)
    }

    /// Append an instruction to this block.
    ///
    /// The instruction is registered with the symbol table and, if it is a terminator, the block
    /// becomes terminated and gains an edge to every jump target.
    ///
    /// Panics if the block is already terminated, if the instruction is already in a block or if
    /// it references a variable unknown to the symbol table.
    pub fn add_instruction(&self, context: &mut Context, inst: Instruction) {
        self.add_instructions(context, [inst]);
    }

    /// Append several instructions to this block.  Only the last of them may be a terminator.
    ///
    /// Every precondition is checked before anything is appended, so a failed call leaves the
    /// block unchanged.
    pub fn add_instructions<I: IntoIterator<Item = Instruction>>(
        &self,
        context: &mut Context,
        insts: I,
    ) {
        let insts: Vec<_> = insts.into_iter().collect();
        self.check_insertable(context, &insts);
        for inst in insts {
            self.append_instruction(context, inst);
        }
    }

    /// Append an assignment instruction.
    pub fn add_assignment(&self, context: &mut Context, assignment: Assignment) -> Instruction {
        self.assert_not_terminated(context);
        let inst = Instruction::new_assignment(context, assignment);
        self.add_instruction(context, inst);
        inst
    }

    /// Append a jump to `dest`.
    pub fn add_jump(&self, context: &mut Context, dest: Block) -> Instruction {
        self.assert_not_terminated(context);
        let inst = Instruction::new_jump(context, dest);
        self.add_instruction(context, inst);
        inst
    }

    /// Append a branch on `condition` to either `on_true` or `on_false`.
    pub fn add_branch(
        &self,
        context: &mut Context,
        condition: Expr,
        on_true: Block,
        on_false: Block,
    ) -> Instruction {
        self.assert_not_terminated(context);
        let inst = Instruction::new_branch(context, condition, on_true, on_false);
        self.add_instruction(context, inst);
        inst
    }

    /// Append a return of `expression`.
    pub fn add_return(&self, context: &mut Context, expression: Expr) -> Instruction {
        self.assert_not_terminated(context);
        let inst = Instruction::new_return(context, expression);
        self.add_instruction(context, inst);
        inst
    }

    /// Terminate this block with an `unreachable`, for code paths known never to execute.
    pub fn add_unreachable(&self, context: &mut Context) -> Instruction {
        self.assert_not_terminated(context);
        let inst = Instruction::new_unreachable(context);
        self.add_instruction(context, inst);
        inst
    }

    /// Remove an instruction from this block.
    pub fn delete_instruction(&self, context: &mut Context, inst: Instruction) {
        self.delete_instructions(context, &[inst]);
    }

    /// Remove instructions from this block.
    ///
    /// Removed instructions are unregistered from the symbol table and detached, so they may be
    /// added to a block again later.  Removing the terminator un-terminates the block and drops
    /// every edge to its successors, in both directions.
    pub fn delete_instructions(&self, context: &mut Context, to_delete: &[Instruction]) {
        let number = context.blocks[self.0].number;
        for inst in to_delete {
            assert!(
                context.instructions[inst.0].block == Some(*self),
                "Cannot delete an instruction which isn't in block {number}."
            );
        }
        let to_delete: FxHashSet<Instruction> = to_delete.iter().copied().collect();

        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut context.blocks[self.0].instructions)
                .into_iter()
                .partition(|inst| to_delete.contains(inst));
        context.blocks[self.0].instructions = kept;

        for inst in removed {
            context
                .symbols
                .unregister_instruction(inst, &context.instructions[inst.0]);
            let content = &mut context.instructions[inst.0];
            content.block = None;
            tracing::trace!(block = number, "deleted instruction");
            if content.op.is_terminal() {
                self.clear_successors(context);
            }
        }
    }

    /// Delete every instruction in this block.
    pub fn clear(&self, context: &mut Context) {
        let all = context.blocks[self.0].instructions.clone();
        self.delete_instructions(context, &all);
    }

    /// Return the canonical text for this block: a header followed by one line per instruction.
    pub fn render(&self, context: &Context) -> String {
        crate::printer::block_to_string(context, *self)
    }

    /// Add `succ` to the set of successors of this block, and this block to its predecessors.
    pub(crate) fn add_successor(&self, context: &mut Context, succ: Block) {
        context.blocks[self.0].succs.insert(succ);
        context.blocks[succ.0].preds.insert(*self);
    }

    fn clear_successors(&self, context: &mut Context) {
        let content = &mut context.blocks[self.0];
        content.terminated = false;
        let succs = std::mem::take(&mut content.succs);
        for succ in succs {
            context.blocks[succ.0].preds.shift_remove(self);
        }
    }

    fn append_instruction(&self, context: &mut Context, inst: Instruction) {
        let number = context.blocks[self.0].number;
        context.blocks[self.0].instructions.push(inst);
        context.instructions[inst.0].block = Some(*self);
        context
            .symbols
            .register_instruction(inst, &context.instructions[inst.0]);
        tracing::trace!(block = number, "added instruction");

        let content = &context.instructions[inst.0];
        if content.op.is_terminal() {
            let targets: Vec<Block> = content.jump_targets().iter().copied().collect();
            context.blocks[self.0].terminated = true;
            for succ in targets {
                self.add_successor(context, succ);
            }
        }
    }

    fn assert_not_terminated(&self, context: &Context) {
        let content = &context.blocks[self.0];
        assert!(
            !content.terminated,
            "Cannot add an instruction to terminated block {}.",
            content.number
        );
    }

    fn check_insertable(&self, context: &Context, insts: &[Instruction]) {
        self.assert_not_terminated(context);
        let number = context.blocks[self.0].number;
        let mut seen = FxHashSet::default();
        for (idx, inst) in insts.iter().enumerate() {
            let content = &context.instructions[inst.0];
            if let Some(holder) = content.block {
                panic!(
                    "Instruction is already in block {}.",
                    context.blocks[holder.0].number
                );
            }
            assert!(seen.insert(*inst), "Instruction added twice to block {number}.");
            assert!(
                !content.op.is_terminal() || idx + 1 == insts.len(),
                "A terminator must be the last instruction added to block {number}."
            );
            context.symbols.check_known_variables(content);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::{
        expression::test_expr::{int, var},
        symbol_table::VariableAttributes,
    };

    fn assert_edges_symmetric(context: &Context) {
        for a in context.block_iter() {
            for b in context.block_iter() {
                assert_eq!(
                    a.has_successor(context, b),
                    b.has_predecessor(context, a),
                    "edge between blocks {} and {} is asymmetric",
                    a.get_number(context),
                    b.get_number(context)
                );
            }
        }
    }

    #[test]
    fn numbering() {
        let mut context = Context::new();
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);

        assert_eq!(b0.get_number(&context), 0);
        assert_eq!(b1.get_number(&context), 1);
        assert!(b0.is_empty(&context));
        assert!(!b0.is_terminated(&context));
    }

    #[test]
    fn terminator_adds_symmetric_edges() {
        let mut context = Context::new();
        context.add_variable("c", VariableAttributes::flag());
        let entry = Block::new(&mut context);
        let then_block = Block::new(&mut context);
        let else_block = Block::new(&mut context);

        let branch = entry.add_branch(&mut context, var("c"), then_block, else_block);

        assert!(entry.is_terminated(&context));
        assert_eq!(entry.get_terminator(&context), Some(branch));
        assert_eq!(
            entry.succ_iter(&context).collect::<Vec<_>>(),
            vec![then_block, else_block]
        );
        assert_eq!(then_block.pred_iter(&context).collect::<Vec<_>>(), vec![entry]);
        assert_eq!(else_block.pred_iter(&context).collect::<Vec<_>>(), vec![entry]);
        assert_eq!(branch.get_block(&context), Some(entry));
        assert_edges_symmetric(&context);
    }

    #[test]
    fn add_after_termination_fails_without_change() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);
        b0.add_jump(&mut context, b1);

        let result = catch_unwind(AssertUnwindSafe(|| {
            b0.add_assignment(&mut context, Assignment::new("x", int(1)));
        }));
        assert!(result.is_err());

        // A detached instruction is refused too.
        let unreachable = Instruction::new_unreachable(&mut context);
        let result = catch_unwind(AssertUnwindSafe(|| {
            b0.add_instruction(&mut context, unreachable);
        }));
        assert!(result.is_err());

        assert_eq!(b0.num_instructions(&context), 1);
        assert_eq!(b0.succ_iter(&context).collect::<Vec<_>>(), vec![b1]);
        assert!(context.symbol_table()["x"].is_unreferenced());
        assert_eq!(unreachable.get_block(&context), None);
    }

    #[test]
    #[should_panic(expected = "terminated block 0")]
    fn add_unreachable_to_terminated_block() {
        let mut context = Context::new();
        let block = Block::new(&mut context);
        block.add_unreachable(&mut context);
        block.add_unreachable(&mut context);
    }

    #[test]
    #[should_panic(expected = "must be the last instruction")]
    fn terminator_in_the_middle_of_a_batch() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        let block = Block::new(&mut context);
        let ret = Instruction::new_return(&mut context, int(0));
        let assign = Instruction::new_assignment(&mut context, Assignment::new("x", int(1)));
        block.add_instructions(&mut context, [ret, assign]);
    }

    #[test]
    fn deleting_terminator_clears_edges() {
        let mut context = Context::new();
        context.add_variable("c", VariableAttributes::flag());
        let entry = Block::new(&mut context);
        let then_block = Block::new(&mut context);
        let else_block = Block::new(&mut context);
        let branch = entry.add_branch(&mut context, var("c"), then_block, else_block);

        entry.delete_instruction(&mut context, branch);

        assert!(!entry.is_terminated(&context));
        assert_eq!(entry.num_successors(&context), 0);
        assert_eq!(then_block.num_predecessors(&context), 0);
        assert_eq!(else_block.num_predecessors(&context), 0);
        assert_eq!(branch.get_block(&context), None);
        assert_edges_symmetric(&context);

        // The block may be terminated again, and the deleted instruction reused elsewhere.
        entry.add_jump(&mut context, else_block);
        assert_eq!(else_block.pred_iter(&context).collect::<Vec<_>>(), vec![entry]);
        assert_edges_symmetric(&context);
    }

    #[test]
    fn deleting_body_keeps_terminator() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        context.add_variable("y", VariableAttributes::default());
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);
        let x = b0.add_assignment(&mut context, Assignment::new("x", int(1)));
        let y = b0.add_assignment(&mut context, Assignment::new("y", var("x")));
        b0.add_jump(&mut context, b1);

        b0.delete_instruction(&mut context, x);

        assert_eq!(b0.num_instructions(&context), 2);
        assert_eq!(b0.get_instruction_at(&context, 0), Some(y));
        assert!(b0.is_terminated(&context));
        assert!(b1.has_predecessor(&context, b0));
    }

    #[test]
    fn clear_empties_the_block() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);
        b0.add_assignment(&mut context, Assignment::new("x", int(1)));
        b0.add_jump(&mut context, b1);

        b0.clear(&mut context);

        assert!(b0.is_empty(&context));
        assert!(!b0.is_terminated(&context));
        assert_eq!(b1.num_predecessors(&context), 0);
        assert!(!context.symbol_table().contains("x"));
    }

    #[test]
    fn shared_successor_keeps_other_predecessor() {
        let mut context = Context::new();
        let a = Block::new(&mut context);
        let b = Block::new(&mut context);
        let join = Block::new(&mut context);
        let a_jump = a.add_jump(&mut context, join);
        b.add_jump(&mut context, join);

        a.delete_instruction(&mut context, a_jump);

        assert_eq!(join.pred_iter(&context).collect::<Vec<_>>(), vec![b]);
        assert_edges_symmetric(&context);
    }

    #[test]
    #[should_panic(expected = "isn't in block 1")]
    fn delete_from_wrong_block() {
        let mut context = Context::new();
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);
        let ret = b0.add_unreachable(&mut context);
        b1.delete_instruction(&mut context, ret);
    }

    #[test]
    fn reinsert_detached_instruction() {
        let mut context = Context::new();
        let b0 = Block::new(&mut context);
        let b1 = Block::new(&mut context);
        let b2 = Block::new(&mut context);
        let jump = b0.add_jump(&mut context, b2);

        b0.delete_instruction(&mut context, jump);
        b1.add_instruction(&mut context, jump);

        assert_eq!(jump.get_block(&context), Some(b1));
        assert_eq!(b2.pred_iter(&context).collect::<Vec<_>>(), vec![b1]);
        assert_edges_symmetric(&context);
    }
}
