//! Print IR to human readable text.
//!
//! The instruction and block renderings are a stable contract: downstream tooling parses them for
//! display and cross references blocks by number.  The graphviz export is a convenience and its
//! exact syntax may change, though every block, edge and instruction will always be present.
//!
//! The graphviz document is put together with the same small document builder the IR printer
//! has always used.

use itertools::Itertools;

use crate::{
    block::Block,
    cfg::ControlFlowGraph,
    context::Context,
    instruction::{Assignment, CallTarget, InstOp, Instruction},
};

#[derive(Debug)]
pub(crate) enum Doc {
    Empty,

    Text(String),
    Line(Box<Doc>),

    Pair(Box<Doc>, Box<Doc>),

    List(Vec<Doc>),

    Indent(i64, Box<Doc>),
}

impl Doc {
    pub(crate) fn text_line<S: Into<String>>(s: S) -> Self {
        Doc::Line(Box::new(Doc::Text(s.into())))
    }

    fn indent(n: i64, doc: Doc) -> Doc {
        Doc::Indent(n, Box::new(doc))
    }

    pub(crate) fn append(self, doc: Doc) -> Doc {
        match (&self, &doc) {
            (Doc::Empty, _) => doc,
            (_, Doc::Empty) => self,
            _ => Doc::Pair(Box::new(self), Box::new(doc)),
        }
    }

    pub(crate) fn build(self) -> String {
        build_doc(self, 0)
    }
}

/// Options for [`dot_graph`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DotConfig {
    /// The name given to the `digraph`.
    pub graph_name: String,
    /// Instruction text longer than this many columns is wrapped.
    pub wrap_width: usize,
    /// Continuation lines of wrapped text are indented by this many spaces.
    pub wrap_indent: usize,
}

impl Default for DotConfig {
    fn default() -> Self {
        DotConfig {
            graph_name: "ControlFlowGraph".to_owned(),
            wrap_width: 80,
            wrap_indent: 4,
        }
    }
}

/// Print every block in the [`Context`] to a string, in block number order.
pub fn to_string(context: &Context) -> String {
    context
        .block_iter()
        .map(|block| block_to_string(context, block))
        .join("\n")
}

/// Print the canonical text for one instruction.
///
/// Most instructions are a single line, but a component call assignment prints one line per
/// assignee.
pub fn instruction_to_string(context: &Context, inst: Instruction) -> String {
    let block_number = |block: &Block| context.blocks[block.0].number;
    match inst.get_op(context) {
        InstOp::Branch {
            condition,
            on_true,
            on_false,
        } => format!(
            "if {} then goto block {} else goto block {}",
            condition.render(),
            block_number(on_true),
            block_number(on_false)
        ),
        InstOp::Assign(Assignment::Expression {
            assignee,
            expression,
        }) => format!("{assignee} <- {}", expression.render()),
        InstOp::Assign(Assignment::ComponentCall(call)) => {
            let time = call.time.render();
            call.targets
                .iter()
                .map(|CallTarget { assignee, arguments }| {
                    if arguments.is_empty() {
                        format!("{assignee} <- {}({time})", call.component_id)
                    } else {
                        let args = arguments
                            .iter()
                            .map(|(name, expr)| format!("{name}={}", expr.render()))
                            .join(", ");
                        format!("{assignee} <- {}({time}, {args})", call.component_id)
                    }
                })
                .join("\n")
        }
        InstOp::Jump(dest) => format!("goto block {}", block_number(dest)),
        InstOp::Return(expression) => format!("return {}", expression.render()),
        InstOp::Unreachable => "unreachable".to_owned(),
    }
}

/// Print a block header followed by each of its instructions.
pub fn block_to_string(context: &Context, block: Block) -> String {
    std::iter::once(format!(
        "===== basic block {} =====",
        block.get_number(context)
    ))
    .chain(
        block
            .instruction_iter(context)
            .map(|inst| instruction_to_string(context, inst)),
    )
    .join("\n")
}

/// Print every block of a control flow graph in reverse postorder.
pub fn cfg_to_string(context: &Context, cfg: &ControlFlowGraph) -> String {
    cfg.reverse_postorder()
        .map(|block| block_to_string(context, block))
        .join("\n")
}

/// Return a string in the graphviz language that represents the control flow graph.
///
/// There is a node per block, in postorder, labelled with the block number and its instructions,
/// an edge per successor and an invisible `entry` node pointing at the start block.
pub fn dot_graph(context: &Context, cfg: &ControlFlowGraph, config: &DotConfig) -> String {
    let indent = " ".repeat(config.wrap_indent);
    let wrap_options = textwrap::Options::new(config.wrap_width).subsequent_indent(&indent);

    let blocks = cfg
        .postorder()
        .map(|block| {
            let number = block.get_number(context);
            let code = block
                .instruction_iter(context)
                .flat_map(|inst| {
                    let text = instruction_to_string(context, inst);
                    textwrap::wrap(&text, &wrap_options)
                        .into_iter()
                        .map(|line| {
                            Doc::text_line(format!(
                                "<tr><td align=\"left\"><font face=\"Courier\">{}</font></td></tr>",
                                escape_html(&line)
                            ))
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
            let edges = block
                .succ_iter(context)
                .map(|succ| {
                    Doc::text_line(format!("{number} -> {};", succ.get_number(context)))
                })
                .collect();
            Doc::text_line(format!("{number} [shape=box,label=<<table border=\"0\">"))
                .append(Doc::indent(
                    4,
                    Doc::text_line(format!(
                        "<tr><td align=\"center\"><font face=\"Helvetica\"><b>basic block {number}</b></font></td></tr>"
                    ))
                    .append(Doc::List(code)),
                ))
                .append(Doc::text_line("</table>>];"))
                .append(Doc::List(edges))
        })
        .fold(Doc::Empty, Doc::append);

    let entry = Doc::text_line("entry [style=invisible];").append(Doc::text_line(format!(
        "entry -> {};",
        cfg.get_start_block().get_number(context)
    )));

    Doc::text_line(format!("digraph {} {{", config.graph_name))
        .append(Doc::indent(4, blocks.append(entry)))
        .append(Doc::text_line("}"))
        .build()
}

/// Escape text for a graphviz HTML-like label.  Spaces become non-breaking so indentation
/// survives.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            ' ' => escaped.push_str("&nbsp;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn build_doc(doc: Doc, indent: i64) -> String {
    match doc {
        Doc::Empty => "".into(),

        Doc::Text(t) => t,
        Doc::Line(d) => {
            if matches!(*d, Doc::Empty) {
                "\n".into()
            } else {
                format!("{}{}\n", " ".repeat(indent as usize), build_doc(*d, indent))
            }
        }

        Doc::Pair(l, r) => [build_doc(*l, indent), build_doc(*r, indent)].concat(),

        Doc::List(v) => v
            .into_iter()
            .map(|d| build_doc(d, indent))
            .collect::<Vec<String>>()
            .concat(),

        Doc::Indent(n, d) => build_doc(*d, indent + n),
    }
}
