use thiserror::Error;

use crate::tree::{NodeId, OpKind, TreeError};

/// Structural failures met while walking a tree.
///
/// Numeric edge cases such as division by zero are not errors; they come out as NaN or infinity.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("the expression is empty")]
    EmptyTree,
    #[error("operation {op} at node {id} has children that do not match its arity")]
    BadArity { op: OpKind, id: NodeId },
    #[error("variable #{0} is not in the variable table")]
    UnknownVariable(usize),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

pub type EvalResult<T> = Result<T, EvalError>;
