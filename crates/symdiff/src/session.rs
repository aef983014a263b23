use log::debug;

use crate::calculus::{derivative_tree, taylor_polynomial};
use crate::compute::RealFunction;
use crate::error::{Error, Result};
use crate::eval::{EvalResult, Resolve};
use crate::parse::{ParseResult, parse};
use crate::tree::Tree;
use crate::variables::{Variable, VariableTable};

/// An expression together with its successive derivatives by one variable.
///
/// Derivative `k` is computed from derivative `k - 1`, the first one from the expression.
#[derive(Debug, Clone)]
pub struct Session {
    expression: Tree,
    derivatives: Vec<Tree>,
    vars: VariableTable,
    var_to_diff: Option<usize>,
}

impl Session {
    pub fn parse(source: &str) -> ParseResult<Self> {
        Self::parse_with(source, VariableTable::new())
    }

    /// Parses into an existing table, keeping whatever values it already binds.
    pub fn parse_with(source: &str, mut vars: VariableTable) -> ParseResult<Self> {
        let expression = parse(source, &mut vars)?;
        Ok(Self {
            expression,
            derivatives: Vec::new(),
            vars,
            var_to_diff: None,
        })
    }

    pub fn expression(&self) -> &Tree {
        &self.expression
    }

    pub fn vars(&self) -> &VariableTable {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VariableTable {
        &mut self.vars
    }

    pub fn evaluate(&mut self, resolver: &mut impl Resolve) -> EvalResult<f64> {
        self.expression.evaluate(&mut self.vars, resolver)
    }

    /// Replaces any earlier derivatives with `times` new ones by `var_name`.
    ///
    /// A name the expression never mentions is registered, and every derivative is then `0`.
    /// Returns the variable's index.
    pub fn differentiate(&mut self, var_name: &str, times: usize) -> Result<usize> {
        let var = self.vars.find_or_add(var_name)?;
        let mut derivatives: Vec<Tree> = Vec::new();

        for order in 1..=times {
            let previous = derivatives.last().unwrap_or(&self.expression);
            let next = derivative_tree(previous, var)?;
            debug!(
                "derivative {order} by {var_name} has {} nodes",
                next.size()
            );
            derivatives.push(next);
        }

        // Earlier results survive a failed run
        self.derivatives = derivatives;
        self.var_to_diff = Some(var);
        Ok(var)
    }

    pub fn derivatives(&self) -> &[Tree] {
        &self.derivatives
    }

    /// The `order`-th derivative, counting from 1.
    pub fn derivative(&self, order: usize) -> Option<&Tree> {
        order.checked_sub(1).and_then(|i| self.derivatives.get(i))
    }

    pub fn var_to_diff(&self) -> Option<&Variable> {
        self.var_to_diff.and_then(|index| self.vars.get(index))
    }

    /// Taylor polynomial around `var_to_diff = point` from the derivatives computed so far.
    pub fn taylor(&self, point: f64) -> Result<Tree> {
        let var = self.var_to_diff.ok_or(Error::NotDifferentiated)?;
        Ok(taylor_polynomial(
            &self.expression,
            &self.derivatives,
            &self.vars,
            var,
            point,
        )?)
    }

    /// The expression (order 0) or one of its derivatives as a function of `var_to_diff`.
    pub fn real_function(&self, order: usize) -> Result<RealFunction> {
        let var = self.var_to_diff.ok_or(Error::NotDifferentiated)?;
        let tree = if order == 0 {
            &self.expression
        } else {
            self.derivative(order).ok_or(Error::NotDifferentiated)?
        };
        Ok(RealFunction::new(tree, &self.vars, var)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Unresolved;
    use crate::tree::Node;
    use approx::assert_relative_eq;

    #[test]
    fn successive_derivatives() {
        let mut session = Session::parse("x^3 + y").unwrap();
        let var = session.differentiate("x", 4).unwrap();
        assert_eq!(var, 0);
        assert_eq!(session.var_to_diff().unwrap().name, "x");
        assert_eq!(session.derivatives().len(), 4);

        let vars = session.vars();
        for (order, expected) in [(1, 12.0), (2, 12.0), (3, 6.0), (4, 0.0)] {
            let tree = session.derivative(order).unwrap();
            assert_relative_eq!(tree.evaluate_at(vars, 0, 2.0).unwrap(), expected);
        }
        assert!(session.derivative(0).is_none());
        assert!(session.derivative(5).is_none());
    }

    #[test]
    fn differentiating_again_replaces() {
        let mut session = Session::parse("x * y").unwrap();
        session.differentiate("x", 3).unwrap();
        session.differentiate("y", 1).unwrap();
        assert_eq!(session.derivatives().len(), 1);
        let tree = session.derivative(1).unwrap();
        assert_eq!(tree.node(tree.root().unwrap()).unwrap(), Node::Variable(0));
    }

    #[test]
    fn unknown_variable_gives_zero() {
        let mut session = Session::parse("sin(x)").unwrap();
        let var = session.differentiate("t", 2).unwrap();
        assert_eq!(var, 1);
        for tree in session.derivatives() {
            assert_eq!(tree.node(tree.root().unwrap()).unwrap(), Node::Number(0.0));
        }
    }

    #[test]
    fn failed_run_keeps_earlier_derivatives() {
        let mut session = Session::parse("x^2").unwrap();
        session.differentiate("x", 2).unwrap();

        session.expression = Tree::new();
        assert!(session.differentiate("y", 1).is_err());
        assert_eq!(session.var_to_diff().unwrap().name, "x");
        assert_eq!(session.derivatives().len(), 2);
    }

    #[test]
    fn evaluation_caches_values() {
        let mut vars = VariableTable::new();
        vars.set_value("k", 2.0).unwrap();
        let mut session = Session::parse_with("k * x", vars).unwrap();
        let value = session.evaluate(&mut |_: &str| 5.0).unwrap();
        assert_relative_eq!(value, 10.0);
        assert_eq!(session.vars().value(1), Some(5.0));
        assert_relative_eq!(session.evaluate(&mut Unresolved).unwrap(), 10.0);
    }

    #[test]
    fn taylor_needs_derivatives() {
        let session = Session::parse("ch(x)").unwrap();
        assert!(matches!(session.taylor(0.0), Err(Error::NotDifferentiated)));

        let mut session = session;
        session.differentiate("x", 2).unwrap();
        let poly = session.taylor(0.0).unwrap();
        assert_relative_eq!(
            poly.evaluate_at(session.vars(), 0, 0.5).unwrap(),
            1.125,
            max_relative = 1e-12
        );
    }

    #[test]
    fn real_functions() {
        let mut session = Session::parse("x^2").unwrap();
        assert!(session.real_function(0).is_err());
        session.differentiate("x", 1).unwrap();
        let f = session.real_function(0).unwrap();
        let df = session.real_function(1).unwrap();
        assert_relative_eq!(f.eval_point(3.0).unwrap(), 9.0);
        assert_relative_eq!(df.eval_point(3.0).unwrap(), 6.0);
        assert!(session.real_function(2).is_err());
    }
}
