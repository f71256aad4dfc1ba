//! The main handle to an IR instance.
//!
//! [`Context`] contains [slotmap](https://github.com/orlp/slotmap) collections to maintain the IR
//! ECS, along with the [`SymbolTable`] describing the variables of the code fragment.
//!
//! It is passed around as a mutable reference to many of the Leap-IR APIs.

use slotmap::{DefaultKey, SlotMap};

use crate::{
    block::{Block, BlockContent},
    instruction::InstructionContent,
    symbol_table::{SymbolTable, VariableAttributes},
};

/// The main IR context handle.
///
/// Every block and instruction is stored here, as is the symbol table which must be kept
/// consistent with the instructions inserted into blocks.
#[derive(Default)]
pub struct Context {
    pub(crate) blocks: SlotMap<DefaultKey, BlockContent>,
    pub(crate) instructions: SlotMap<DefaultKey, InstructionContent>,
    pub(crate) symbols: SymbolTable,

    next_block_number: usize,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the symbol table of this code fragment.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Return the symbol table of this code fragment for adding variables or allocating names.
    ///
    /// Instruction references are only ever registered by block mutation, which is why those
    /// operations aren't reachable from here.
    pub fn symbol_table_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Shorthand for [`SymbolTable::add_variable`].
    pub fn add_variable<S: Into<String>>(&mut self, name: S, attributes: VariableAttributes) {
        self.symbols.add_variable(name, attributes);
    }

    /// Shorthand for [`SymbolTable::get_fresh_variable_name`].
    pub fn get_fresh_variable_name(&mut self, prefix: &str) -> String {
        self.symbols.get_fresh_variable_name(prefix)
    }

    /// Return every block in this context, ordered by block number.
    pub fn block_iter(&self) -> impl Iterator<Item = Block> {
        let mut blocks: Vec<_> = self
            .blocks
            .iter()
            .map(|(key, content)| (content.number, Block(key)))
            .collect();
        blocks.sort_unstable_by_key(|(number, _)| *number);
        blocks.into_iter().map(|(_, block)| block)
    }

    /// Return the number of blocks in this context.
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Get a fresh block number.
    pub(crate) fn get_next_block_number(&mut self) -> usize {
        let number = self.next_block_number;
        self.next_block_number += 1;
        number
    }
}

use std::fmt::{Display, Error, Formatter};

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", crate::printer::to_string(self))
    }
}

impl From<Context> for String {
    fn from(context: Context) -> Self {
        crate::printer::to_string(&context)
    }
}
