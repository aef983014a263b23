use crate::eval::{EvalError, EvalResult};
use crate::tree::Tree;
use crate::variables::VariableTable;

/// A tree viewed as a function of one variable, for sampling.
///
/// Holds its own copy of the variable table, so sampling never binds anything.
#[derive(Debug, Clone)]
pub struct RealFunction {
    pub tree: Tree,
    vars: VariableTable,
    variable: usize,
}

impl RealFunction {
    pub fn new(tree: &Tree, vars: &VariableTable, variable: usize) -> EvalResult<Self> {
        if tree.is_empty() {
            return Err(EvalError::EmptyTree);
        }
        Ok(Self {
            tree: tree.clone(),
            vars: vars.clone(),
            variable,
        })
    }

    pub fn variable_name(&self) -> Option<&str> {
        self.vars.name(self.variable)
    }

    pub fn eval_point(&self, x: f64) -> EvalResult<f64> {
        self.tree.evaluate_at(&self.vars, self.variable, x)
    }

    pub fn eval_points(&self, xs: &[f64]) -> EvalResult<Vec<f64>> {
        xs.iter().map(|&x| self.eval_point(x)).collect()
    }
}
