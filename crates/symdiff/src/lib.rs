//! Symbolic differentiation of infix expressions.
//!
//! Expressions are parsed into arena [`tree::Tree`]s whose variables are interned in a
//! [`variables::VariableTable`]. Trees can be evaluated, simplified and differentiated any
//! number of times; [`Session`] ties these steps together.

pub mod calculus;
pub mod compute;
pub mod display;
mod error;
pub mod eval;
pub mod parse;
pub mod session;
pub mod simplify;
pub mod tree;
pub mod variables;

#[cfg(test)]
mod proptests;

pub use error::{Error, Result};
pub use session::Session;
