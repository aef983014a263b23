use thiserror::Error;

use crate::eval::EvalError;
use crate::parse::ParseError;
use crate::tree::TreeError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("no derivatives have been computed yet")]
    NotDifferentiated,
}

pub type Result<T> = std::result::Result<T, Error>;
