//! Code to validate the IR in a [`Context`].
//!
//! Block mutation maintains a number of cross references: instruction parents, successor and
//! predecessor edges, the terminated flag and the symbol table's reference sets.  Passes which
//! edit the IR can use [`Context::verify`] to check they are still in step.

use crate::{
    block::{Block, BlockContent},
    context::Context,
    error::IrError,
    instruction::Instruction,
    FxIndexSet,
};

impl Context {
    /// Verify the contents of this [`Context`] are consistent.
    pub fn verify(self) -> Result<Self, IrError> {
        for block in self.block_iter() {
            self.verify_block(block, &self.blocks[block.0])?;
        }
        self.verify_symbol_table()?;
        Ok(self)
    }

    fn verify_block(&self, block: Block, content: &BlockContent) -> Result<(), IrError> {
        let number = content.number;

        let last_idx = content.instructions.len().checked_sub(1);
        for (idx, inst) in content.instructions.iter().enumerate() {
            if inst.is_terminal(self) && Some(idx) != last_idx {
                return Err(IrError::MisplacedTerminator(number));
            }
            if inst.get_block(self) != Some(block) {
                return Err(IrError::InconsistentParent(inst.render(self), number));
            }
            self.verify_references(*inst)?;
        }

        let terminator = content
            .instructions
            .last()
            .filter(|inst| inst.is_terminal(self));
        if content.terminated != terminator.is_some() {
            return Err(IrError::InconsistentTermination(number));
        }

        let empty = FxIndexSet::default();
        let targets = terminator.map_or(&empty, |inst| inst.get_jump_targets(self));
        if targets.len() != content.succs.len() || !targets.iter().all(|t| content.succs.contains(t))
        {
            return Err(IrError::InconsistentSuccessors(number));
        }

        for succ in &content.succs {
            if !self.blocks[succ.0].preds.contains(&block) {
                return Err(IrError::AsymmetricEdge(number, succ.get_number(self)));
            }
        }
        for pred in &content.preds {
            if !self.blocks[pred.0].succs.contains(&block) {
                return Err(IrError::AsymmetricEdge(pred.get_number(self), number));
            }
        }

        Ok(())
    }

    fn verify_references(&self, inst: Instruction) -> Result<(), IrError> {
        for var in self.instructions[inst.0].referenced_variables() {
            match self.symbols.get(var) {
                None => return Err(IrError::UnknownVariable(var.clone(), inst.render(self))),
                Some(entry) if !entry.is_referenced_by(inst) => {
                    return Err(IrError::MissingReference(var.clone(), inst.render(self)))
                }
                Some(_) => (),
            }
        }
        Ok(())
    }

    fn verify_symbol_table(&self) -> Result<(), IrError> {
        for (name, entry) in self.symbols.iter() {
            let stale = entry.references().any(|inst| {
                self.instructions.get(inst.0).map_or(true, |content| {
                    content.block.is_none() || !content.referenced_variables().any(|var| var == name)
                })
            });
            if stale {
                return Err(IrError::StaleReference(name.to_owned()));
            }
        }
        Ok(())
    }
}
