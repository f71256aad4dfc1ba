//! The control flow graph reachable from a start block.
//!
//! A [`ControlFlowGraph`] doesn't own its blocks, they live in the [`Context`].  It caches a
//! postorder traversal and whether the graph contains a loop, both computed by [`update`].  The
//! cache isn't maintained incrementally: after editing blocks call [`update`] again before relying
//! on the order or on [`is_acyclic`].
//!
//! [`update`]: ControlFlowGraph::update
//! [`is_acyclic`]: ControlFlowGraph::is_acyclic

use rustc_hash::FxHashMap;

use crate::{block::Block, context::Context, printer::DotConfig};

pub struct ControlFlowGraph {
    start_block: Block,
    postorder_traversal: Vec<Block>,
    acyclic: bool,
}

/// Depth first traversal state.  Blocks not yet reached have no state at all.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Expanded, with descendants still being traversed.  Reaching a block in this state again
    /// means following a back edge.
    InProgress,
    Finished,
}

impl ControlFlowGraph {
    /// Build the graph of blocks reachable from `start_block`.
    pub fn new(context: &Context, start_block: Block) -> Self {
        let mut cfg = ControlFlowGraph {
            start_block,
            postorder_traversal: Vec::new(),
            acyclic: true,
        };
        cfg.update(context);
        cfg
    }

    pub fn get_start_block(&self) -> Block {
        self.start_block
    }

    /// Return true if the graph contained no loops when last updated.
    pub fn is_acyclic(&self) -> bool {
        self.acyclic
    }

    /// Traverse the graph, recomputing the postorder and whether it is acyclic.
    ///
    /// The traversal is an iterative depth first search.  A block is pushed once for every edge
    /// reaching it before it is expanded, and is finished when its stack entry surfaces again
    /// after all of its descendants.
    pub fn update(&mut self, context: &Context) {
        let mut postorder = Vec::new();
        let mut states = FxHashMap::<Block, Visit>::default();
        let mut stack = vec![self.start_block];
        let mut acyclic = true;

        while let Some(&top) = stack.last() {
            match states.get(&top).copied() {
                None => {
                    states.insert(top, Visit::InProgress);
                    for succ in top.succ_iter(context) {
                        match states.get(&succ).copied() {
                            Some(Visit::InProgress) => acyclic = false,
                            Some(Visit::Finished) => (),
                            None => stack.push(succ),
                        }
                    }
                }
                Some(Visit::InProgress) => {
                    states.insert(top, Visit::Finished);
                    postorder.push(top);
                    stack.pop();
                }
                Some(Visit::Finished) => {
                    // A stale entry, the block was reached along another edge first.
                    stack.pop();
                }
            }
        }

        tracing::debug!(
            start = self.start_block.get_number(context),
            blocks = postorder.len(),
            acyclic,
            "updated control flow graph"
        );
        self.postorder_traversal = postorder;
        self.acyclic = acyclic;
    }

    /// Iterate over the blocks in postorder: every block comes after the blocks it reaches,
    /// except along back edges.
    pub fn postorder(&self) -> impl DoubleEndedIterator<Item = Block> + '_ {
        self.postorder_traversal.iter().copied()
    }

    /// Iterate over the blocks in reverse postorder, the usual order for forward dataflow.  The
    /// start block always comes first.
    pub fn reverse_postorder(&self) -> impl DoubleEndedIterator<Item = Block> + '_ {
        self.postorder_traversal.iter().rev().copied()
    }

    /// Same as [`ControlFlowGraph::postorder`].
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Block> + '_ {
        self.postorder()
    }

    /// Get the number of reachable blocks.
    pub fn len(&self) -> usize {
        self.postorder_traversal.len()
    }

    /// A graph always holds at least its start block, so this is only true before the first
    /// update, which [`ControlFlowGraph::new`] already performs.
    pub fn is_empty(&self) -> bool {
        self.postorder_traversal.is_empty()
    }

    /// Return whether `block` was reachable from the start block when last updated.
    pub fn contains(&self, block: Block) -> bool {
        self.postorder_traversal.contains(&block)
    }

    /// Return every block's rendering in reverse postorder.
    pub fn render(&self, context: &Context) -> String {
        crate::printer::cfg_to_string(context, self)
    }

    /// Return a graphviz rendering of the graph.  See [`crate::printer::dot_graph`].
    pub fn to_dot(&self, context: &Context, config: &DotConfig) -> String {
        crate::printer::dot_graph(context, self, config)
    }
}
