use log::trace;

use crate::tree::{Node, NodeId, OpKind, Tree};
use crate::variables::VariableTable;

mod error;
pub use error::{EvalError, EvalResult};

/// Supplies values for variables that are still unbound when evaluation reaches them.
pub trait Resolve {
    fn resolve(&mut self, name: &str) -> f64;
}

impl<F: FnMut(&str) -> f64> Resolve for F {
    fn resolve(&mut self, name: &str) -> f64 {
        self(name)
    }
}

/// Leaves unbound variables as NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unresolved;

impl Resolve for Unresolved {
    fn resolve(&mut self, _name: &str) -> f64 {
        f64::NAN
    }
}

impl Tree {
    /// Value of the whole tree. Unbound variables are passed to `resolver` and the answer is
    /// stored back into `vars`, so each one is asked for once.
    pub fn evaluate(
        &self,
        vars: &mut VariableTable,
        resolver: &mut impl Resolve,
    ) -> EvalResult<f64> {
        let root = self.root().ok_or(EvalError::EmptyTree)?;
        self.evaluate_node(root, vars, resolver)
    }

    pub fn evaluate_node(
        &self,
        id: NodeId,
        vars: &mut VariableTable,
        resolver: &mut impl Resolve,
    ) -> EvalResult<f64> {
        let mut lookup = |index: usize| -> EvalResult<f64> {
            let var = vars
                .find_by_index(index)
                .ok_or(EvalError::UnknownVariable(index))?;
            if !var.is_bound() {
                var.value = resolver.resolve(&var.name);
                trace!("resolved {} to {}", var.name, var.value);
            }
            Ok(var.value)
        };
        self.walk(id, &mut lookup)
    }

    /// Value of the tree with variable `index` replaced by `value`. Leaves `vars` untouched.
    pub fn evaluate_at(&self, vars: &VariableTable, index: usize, value: f64) -> EvalResult<f64> {
        let root = self.root().ok_or(EvalError::EmptyTree)?;
        let mut lookup = |i: usize| -> EvalResult<f64> {
            if i == index {
                Ok(value)
            } else {
                vars.value(i).ok_or(EvalError::UnknownVariable(i))
            }
        };
        self.walk(root, &mut lookup)
    }

    fn walk<F>(&self, id: NodeId, lookup: &mut F) -> EvalResult<f64>
    where
        F: FnMut(usize) -> EvalResult<f64>,
    {
        match self.node(id)? {
            Node::Number(value) => Ok(value),
            Node::Variable(index) => lookup(index),
            Node::Operation { op, left, right } => {
                let (left, right) = operands(id, op, left, right)?;
                let left = match left {
                    Some(left) => self.walk(left, lookup)?,
                    None => f64::NAN,
                };
                let right = self.walk(right, lookup)?;
                Ok(op.apply(left, right))
            }
        }
    }
}

/// Checks that an operation's children match its arity. Unary operators yield `None` on the left.
pub(crate) fn operands(
    id: NodeId,
    op: OpKind,
    left: Option<NodeId>,
    right: Option<NodeId>,
) -> EvalResult<(Option<NodeId>, NodeId)> {
    match (left, right) {
        (Some(left), Some(right)) if op.is_binary() => Ok((Some(left), right)),
        (None, Some(right)) if !op.is_binary() => Ok((None, right)),
        _ => Err(EvalError::BadArity { op, id }),
    }
}
