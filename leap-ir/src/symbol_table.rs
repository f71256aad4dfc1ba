//! Variable metadata for a code fragment.
//!
//! Besides its attributes, every [`SymbolTableEntry`] records the [`Instruction`]s currently
//! referencing the variable, either by defining or by using it.  Block mutation keeps those
//! reference sets in step with the instructions actually inserted into blocks, which lets passes
//! answer liveness questions ("is anything still reading `x`?") without scanning the graph.

use rustc_hash::FxHashSet;

use crate::{instruction::Instruction, instruction::InstructionContent, FxIndexMap, FxIndexSet};

/// Independent boolean attributes of a variable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VariableAttributes {
    pub is_global: bool,
    pub is_return_value: bool,
    /// Flags are expected to also be tracked by a [`crate::FlagAnalysis`].
    pub is_flag: bool,
}

impl VariableAttributes {
    pub fn global() -> Self {
        VariableAttributes {
            is_global: true,
            ..Self::default()
        }
    }

    pub fn return_value() -> Self {
        VariableAttributes {
            is_return_value: true,
            ..Self::default()
        }
    }

    pub fn flag() -> Self {
        VariableAttributes {
            is_flag: true,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SymbolTableEntry {
    attributes: VariableAttributes,
    references: FxIndexSet<Instruction>,
}

impl SymbolTableEntry {
    fn new(attributes: VariableAttributes) -> Self {
        SymbolTableEntry {
            attributes,
            references: FxIndexSet::default(),
        }
    }

    pub fn get_attributes(&self) -> VariableAttributes {
        self.attributes
    }

    pub fn is_global(&self) -> bool {
        self.attributes.is_global
    }

    pub fn is_return_value(&self) -> bool {
        self.attributes.is_return_value
    }

    pub fn is_flag(&self) -> bool {
        self.attributes.is_flag
    }

    /// Return whether no inserted instruction references this variable.
    pub fn is_unreferenced(&self) -> bool {
        self.references.is_empty()
    }

    /// Iterate over the instructions which define or use this variable, in registration order.
    pub fn references(&self) -> impl Iterator<Item = Instruction> + '_ {
        self.references.iter().copied()
    }

    pub fn num_references(&self) -> usize {
        self.references.len()
    }

    pub fn is_referenced_by(&self, inst: Instruction) -> bool {
        self.references.contains(&inst)
    }
}

/// Holds information regarding the variables in a code fragment.
#[derive(Default)]
pub struct SymbolTable {
    variables: FxIndexMap<String, SymbolTableEntry>,
    /// Every name ever handed out, including pruned and fresh ones.
    named_variables: FxHashSet<String>,
}

impl SymbolTable {
    /// Add a variable named `name`.
    ///
    /// A name may be added again after its variable was pruned or removed, but not while it is
    /// still known to the table.
    pub fn add_variable<S: Into<String>>(&mut self, name: S, attributes: VariableAttributes) {
        let name = name.into();
        assert!(
            !self.variables.contains_key(&name),
            "Variable `{name}` is already in the symbol table."
        );
        self.named_variables.insert(name.clone());
        self.variables.insert(name, SymbolTableEntry::new(attributes));
    }

    /// Drop an unreferenced variable.  Its name stays reserved.
    pub fn remove_variable(&mut self, name: &str) -> Option<SymbolTableEntry> {
        if let Some(entry) = self.variables.get(name) {
            assert!(
                entry.is_unreferenced(),
                "Cannot remove variable `{name}` while instructions still reference it."
            );
        }
        self.variables.shift_remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&SymbolTableEntry> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Iterate over the currently known variables in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SymbolTableEntry)> {
        self.variables.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Return whether `name` was ever allocated in this table, even if it has since been pruned.
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.named_variables.contains(name)
    }

    /// Get a name starting with `prefix` which has never been allocated in this table, and
    /// reserve it.
    ///
    /// The name will be `prefix` itself if that is free, otherwise `prefix_N` for the smallest
    /// free decimal `N`.
    pub fn get_fresh_variable_name(&mut self, prefix: &str) -> String {
        let name = std::iter::once(prefix.to_owned())
            .chain((0..).map(|idx: u64| format!("{prefix}_{idx}")))
            .find(|candidate| !self.named_variables.contains(candidate))
            .unwrap_or_else(|| unreachable!("Fresh name candidates are unbounded."));
        tracing::trace!(name = %name, "allocated fresh variable name");
        self.named_variables.insert(name.clone());
        name
    }

    /// Add `inst` to the reference set of every variable it defines or uses.
    ///
    /// Only block mutation calls this.
    pub(crate) fn register_instruction(&mut self, inst: Instruction, content: &InstructionContent) {
        self.check_known_variables(content);
        for var in content.referenced_variables() {
            if let Some(entry) = self.variables.get_mut(var) {
                entry.references.insert(inst);
            }
        }
    }

    /// Panic unless every variable referenced by `content` is known to this table.
    pub(crate) fn check_known_variables(&self, content: &InstructionContent) {
        if let Some(var) = content
            .referenced_variables()
            .find(|var| !self.variables.contains_key(*var))
        {
            panic!("Instruction references unknown variable `{var}`.");
        }
    }

    /// Remove `inst` from the reference set of every variable it defines or uses.  A variable
    /// left with no references is pruned from the table.
    ///
    /// Only block mutation calls this.
    pub(crate) fn unregister_instruction(
        &mut self,
        inst: Instruction,
        content: &InstructionContent,
    ) {
        for var in content.referenced_variables() {
            let Some(entry) = self.variables.get_mut(var) else {
                panic!("Instruction references unknown variable `{var}`.");
            };
            entry.references.shift_remove(&inst);
            if entry.is_unreferenced() {
                tracing::trace!(variable = %var, "pruning unreferenced variable");
                self.variables.shift_remove(var);
            }
        }
    }
}

impl std::ops::Index<&str> for SymbolTable {
    type Output = SymbolTableEntry;

    fn index(&self, name: &str) -> &Self::Output {
        self.variables
            .get(name)
            .unwrap_or_else(|| panic!("Variable `{name}` is not in the symbol table."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::Block,
        context::Context,
        expression::test_expr::{binary, int, var},
        instruction::Assignment,
    };
    use tracing_test::traced_test;

    #[test]
    fn attributes() {
        let mut table = SymbolTable::default();
        table.add_variable("y", VariableAttributes::global());
        table.add_variable("ret", VariableAttributes::return_value());
        table.add_variable("first_step", VariableAttributes::flag());
        table.add_variable("tmp", VariableAttributes::default());

        assert!(table["y"].is_global());
        assert!(!table["y"].is_flag());
        assert!(table["ret"].is_return_value());
        assert!(table["first_step"].is_flag());
        assert_eq!(table["tmp"].get_attributes(), VariableAttributes::default());
        assert_eq!(
            table.names().collect::<Vec<_>>(),
            vec!["y", "ret", "first_step", "tmp"]
        );
    }

    #[test]
    fn fresh_names_never_collide() {
        let mut table = SymbolTable::default();
        table.add_variable("tmp", VariableAttributes::default());
        table.add_variable("tmp_0", VariableAttributes::default());

        let first = table.get_fresh_variable_name("tmp");
        let second = table.get_fresh_variable_name("tmp");
        assert_eq!(first, "tmp_1");
        assert_eq!(second, "tmp_2");

        let unused = table.get_fresh_variable_name("k");
        assert_eq!(unused, "k");
        assert_eq!(table.get_fresh_variable_name("k"), "k_0");

        // Fresh names are reserved but not added as variables.
        assert!(table.is_name_taken("k"));
        assert!(!table.contains("k"));
    }

    #[test]
    fn references_follow_block_mutation() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        context.add_variable("y", VariableAttributes::default());
        let block = Block::new(&mut context);

        let def = block.add_assignment(&mut context, Assignment::new("x", int(1)));
        let usage = block.add_assignment(
            &mut context,
            Assignment::new("y", binary("*", var("x"), int(2))),
        );

        let x = &context.symbol_table()["x"];
        assert_eq!(x.references().collect::<Vec<_>>(), vec![def, usage]);
        assert!(context.symbol_table()["y"].is_referenced_by(usage));

        block.delete_instruction(&mut context, def);
        let x = &context.symbol_table()["x"];
        assert_eq!(x.references().collect::<Vec<_>>(), vec![usage]);
    }

    #[test]
    #[traced_test]
    fn unreferenced_variables_are_pruned() {
        let mut context = Context::new();
        context.add_variable("x", VariableAttributes::default());
        context.add_variable("unused", VariableAttributes::default());
        let block = Block::new(&mut context);

        let def = block.add_assignment(&mut context, Assignment::new("x", int(1)));
        block.delete_instruction(&mut context, def);

        assert!(!context.symbol_table().contains("x"));
        assert!(logs_contain("pruning unreferenced variable"));

        // Never referenced, so never pruned.
        assert!(context.symbol_table().contains("unused"));
        assert!(context.symbol_table()["unused"].is_unreferenced());

        // The pruned name is still reserved.
        assert!(context.symbol_table().is_name_taken("x"));
        assert_eq!(context.get_fresh_variable_name("x"), "x_0");
    }

    #[test]
    #[should_panic(expected = "unknown variable `z`")]
    fn registering_unknown_variable_panics() {
        let mut context = Context::new();
        let block = Block::new(&mut context);
        block.add_return(&mut context, var("z"));
    }

    #[test]
    #[should_panic(expected = "already in the symbol table")]
    fn duplicate_variable_panics() {
        let mut table = SymbolTable::default();
        table.add_variable("x", VariableAttributes::default());
        table.add_variable("x", VariableAttributes::global());
    }

    #[test]
    fn remove_unreferenced_variable() {
        let mut table = SymbolTable::default();
        table.add_variable("x", VariableAttributes::flag());

        let entry = table.remove_variable("x").unwrap();
        assert!(entry.is_flag());
        assert!(table.is_empty());
        assert!(table.remove_variable("x").is_none());

        table.add_variable("x", VariableAttributes::default());
        assert_eq!(table.len(), 1);
    }
}
