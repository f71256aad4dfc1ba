//! Instructions for assigning variables, but mostly control flow.
//!
//! The instruction set is small and closed: straight-line code consists only of [`Assignment`]s,
//! and every [`Block`] is ended by one of the four terminators, a conditional branch, an
//! unconditional jump, a return or an `unreachable` marker.
//!
//! An [`Instruction`] is immutable once created.  The only thing that changes over its lifetime is
//! which block, if any, currently holds it.  Because of that the variable and jump target sets
//! derived from it are computed on first request and cached.

use once_cell::unsync::OnceCell;

use crate::{block::Block, context::Context, expression::Expr, FxIndexSet};

/// A wrapper around an [ECS](https://github.com/orlp/slotmap) handle into the [`Context`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Instruction(pub slotmap::DefaultKey);

#[doc(hidden)]
pub struct InstructionContent {
    pub(crate) op: InstOp,
    /// The block holding this instruction, `None` while detached.
    pub(crate) block: Option<Block>,

    defined_variables: OnceCell<FxIndexSet<String>>,
    used_variables: OnceCell<FxIndexSet<String>>,
    jump_targets: OnceCell<FxIndexSet<Block>>,
}

#[derive(Debug, Clone)]
pub enum InstOp {
    /// A conditional jump with the condition and the true or false destinations.
    Branch {
        condition: Expr,
        on_true: Block,
        on_false: Block,
    },
    /// Assign one or more variables.
    Assign(Assignment),
    /// An unconditional jump.
    Jump(Block),
    /// Return the value of an expression.
    Return(Expr),
    /// Marks a point control never reaches.
    Unreachable,
}

/// The target form of an [`InstOp::Assign`].
#[derive(Debug, Clone)]
pub enum Assignment {
    /// `assignee <- expression`
    Expression { assignee: String, expression: Expr },
    /// Several assignees each bound to one evaluation of a component.
    ComponentCall(ComponentCall),
}

/// One evaluation step of a named external component against several state update targets.
///
/// Every target shares the component and the time expression but has its own argument list.
#[derive(Debug, Clone)]
pub struct ComponentCall {
    pub component_id: String,
    pub time: Expr,
    pub targets: Vec<CallTarget>,
}

#[derive(Debug, Clone)]
pub struct CallTarget {
    pub assignee: String,
    /// `(argument name, argument expression)` pairs, in call order.
    pub arguments: Vec<(String, Expr)>,
}

impl Assignment {
    pub fn new<S: Into<String>>(assignee: S, expression: Expr) -> Self {
        Assignment::Expression {
            assignee: assignee.into(),
            expression,
        }
    }

    /// Return the names this assignment writes, in order.
    pub fn get_assignees(&self) -> FxIndexSet<String> {
        match self {
            Assignment::Expression { assignee, .. } => FxIndexSet::from_iter([assignee.clone()]),
            Assignment::ComponentCall(call) => call
                .targets
                .iter()
                .map(|target| target.assignee.clone())
                .collect(),
        }
    }

    /// Return the names this assignment reads.
    pub fn get_read_variables(&self) -> FxIndexSet<String> {
        match self {
            Assignment::Expression { expression, .. } => expression.referenced_variables(),
            Assignment::ComponentCall(call) => {
                let mut vars = call.time.referenced_variables();
                for target in &call.targets {
                    for (_, arg) in &target.arguments {
                        vars.extend(arg.referenced_variables());
                    }
                }
                vars
            }
        }
    }
}

impl From<ComponentCall> for Assignment {
    fn from(call: ComponentCall) -> Self {
        Assignment::ComponentCall(call)
    }
}

impl ComponentCall {
    pub fn new<S: Into<String>>(component_id: S, time: Expr) -> Self {
        ComponentCall {
            component_id: component_id.into(),
            time,
            targets: Vec::new(),
        }
    }

    /// Add a target assigned from a call with `arguments`.
    pub fn with_target<S: Into<String>>(
        mut self,
        assignee: S,
        arguments: Vec<(String, Expr)>,
    ) -> Self {
        self.targets.push(CallTarget {
            assignee: assignee.into(),
            arguments,
        });
        self
    }
}

impl InstOp {
    /// Return whether this instruction ends a block.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstOp::Assign(_))
    }

    fn defined_variables(&self) -> FxIndexSet<String> {
        match self {
            InstOp::Assign(assignment) => assignment.get_assignees(),
            InstOp::Branch { .. } | InstOp::Jump(_) | InstOp::Return(_) | InstOp::Unreachable => {
                FxIndexSet::default()
            }
        }
    }

    fn used_variables(&self) -> FxIndexSet<String> {
        match self {
            InstOp::Branch { condition, .. } => condition.referenced_variables(),
            InstOp::Assign(assignment) => assignment.get_read_variables(),
            InstOp::Return(expression) => expression.referenced_variables(),
            InstOp::Jump(_) | InstOp::Unreachable => FxIndexSet::default(),
        }
    }

    fn jump_targets(&self) -> FxIndexSet<Block> {
        match self {
            InstOp::Branch {
                on_true, on_false, ..
            } => FxIndexSet::from_iter([*on_true, *on_false]),
            InstOp::Jump(dest) => FxIndexSet::from_iter([*dest]),
            InstOp::Assign(_) | InstOp::Return(_) | InstOp::Unreachable => FxIndexSet::default(),
        }
    }
}

impl InstructionContent {
    fn new(op: InstOp) -> Self {
        InstructionContent {
            op,
            block: None,
            defined_variables: OnceCell::new(),
            used_variables: OnceCell::new(),
            jump_targets: OnceCell::new(),
        }
    }

    pub(crate) fn defined_variables(&self) -> &FxIndexSet<String> {
        self.defined_variables.get_or_init(|| self.op.defined_variables())
    }

    pub(crate) fn used_variables(&self) -> &FxIndexSet<String> {
        self.used_variables.get_or_init(|| self.op.used_variables())
    }

    pub(crate) fn jump_targets(&self) -> &FxIndexSet<Block> {
        self.jump_targets.get_or_init(|| self.op.jump_targets())
    }

    /// Every variable either defined or used, each reported once.
    pub(crate) fn referenced_variables(&self) -> impl Iterator<Item = &String> {
        let defined = self.defined_variables();
        defined.iter().chain(
            self.used_variables()
                .iter()
                .filter(move |var| !defined.contains(*var)),
        )
    }
}

impl Instruction {
    /// Return a new detached instruction handle.  It must be added to a block with
    /// [`Block::add_instruction`] before it takes part in the control flow graph.
    pub fn new(context: &mut Context, op: InstOp) -> Instruction {
        Instruction(context.instructions.insert(InstructionContent::new(op)))
    }

    pub fn new_assignment(context: &mut Context, assignment: Assignment) -> Instruction {
        Self::new(context, InstOp::Assign(assignment))
    }

    pub fn new_branch(
        context: &mut Context,
        condition: Expr,
        on_true: Block,
        on_false: Block,
    ) -> Instruction {
        Self::new(
            context,
            InstOp::Branch {
                condition,
                on_true,
                on_false,
            },
        )
    }

    pub fn new_jump(context: &mut Context, dest: Block) -> Instruction {
        Self::new(context, InstOp::Jump(dest))
    }

    pub fn new_return(context: &mut Context, expression: Expr) -> Instruction {
        Self::new(context, InstOp::Return(expression))
    }

    pub fn new_unreachable(context: &mut Context) -> Instruction {
        Self::new(context, InstOp::Unreachable)
    }

    pub fn get_op<'a>(&self, context: &'a Context) -> &'a InstOp {
        &context.instructions[self.0].op
    }

    /// Get the block holding this instruction, or `None` if it isn't currently in a block.
    pub fn get_block(&self, context: &Context) -> Option<Block> {
        context.instructions[self.0].block
    }

    /// Return whether this instruction ends a block.
    pub fn is_terminal(&self, context: &Context) -> bool {
        context.instructions[self.0].op.is_terminal()
    }

    /// Get the set of variables written by this instruction.
    pub fn get_defined_variables<'a>(&self, context: &'a Context) -> &'a FxIndexSet<String> {
        context.instructions[self.0].defined_variables()
    }

    /// Get the set of variables read by this instruction.
    pub fn get_used_variables<'a>(&self, context: &'a Context) -> &'a FxIndexSet<String> {
        context.instructions[self.0].used_variables()
    }

    /// Get the set of blocks this instruction may transfer control to.
    pub fn get_jump_targets<'a>(&self, context: &'a Context) -> &'a FxIndexSet<Block> {
        context.instructions[self.0].jump_targets()
    }

    /// Return whether `variable` is defined or used by this instruction.
    pub fn references_variable(&self, context: &Context, variable: &str) -> bool {
        let content = &context.instructions[self.0];
        content.defined_variables().contains(variable) || content.used_variables().contains(variable)
    }

    /// Return the canonical text for this instruction.
    pub fn render(&self, context: &Context) -> String {
        crate::printer::instruction_to_string(context, *self)
    }
}
