//! The boundary with the expression sublanguage.
//!
//! Instructions carry arithmetic and relational expression trees which are owned by the front-end.
//! The IR only ever needs to print them and to know which variables they read, so that is all the
//! [`Expression`] trait asks for.

use std::{fmt, rc::Rc};

use crate::FxIndexSet;

/// An immutable symbolic expression.
pub trait Expression: fmt::Debug {
    /// The textual form of the expression, as it appears in instruction renderings.
    fn render(&self) -> String;

    /// The names of every variable the expression reads.
    fn referenced_variables(&self) -> FxIndexSet<String>;
}

/// A shared expression handle.  Expressions are immutable so instructions may freely share them.
pub type Expr = Rc<dyn Expression>;

#[cfg(test)]
pub(crate) mod test_expr {
    use super::*;

    /// Just enough of an expression language to build instructions in unit tests.
    #[derive(Debug)]
    pub(crate) enum TestExpr {
        Var(&'static str),
        Int(i64),
        Binary(&'static str, Expr, Expr),
    }

    impl Expression for TestExpr {
        fn render(&self) -> String {
            match self {
                TestExpr::Var(name) => name.to_string(),
                TestExpr::Int(value) => value.to_string(),
                TestExpr::Binary(op, lhs, rhs) => {
                    format!("{} {op} {}", lhs.render(), rhs.render())
                }
            }
        }

        fn referenced_variables(&self) -> FxIndexSet<String> {
            match self {
                TestExpr::Var(name) => FxIndexSet::from_iter([name.to_string()]),
                TestExpr::Int(_) => FxIndexSet::default(),
                TestExpr::Binary(_, lhs, rhs) => {
                    let mut vars = lhs.referenced_variables();
                    vars.extend(rhs.referenced_variables());
                    vars
                }
            }
        }
    }

    pub(crate) fn var(name: &'static str) -> Expr {
        Rc::new(TestExpr::Var(name))
    }

    pub(crate) fn int(value: i64) -> Expr {
        Rc::new(TestExpr::Int(value))
    }

    pub(crate) fn binary(op: &'static str, lhs: Expr, rhs: Expr) -> Expr {
        Rc::new(TestExpr::Binary(op, lhs, rhs))
    }
}
