use log::debug;

use crate::eval::EvalResult;
use crate::tree::Tree;
use crate::variables::VariableTable;

/// Taylor polynomial of `expression` around `var = point`, using as many terms as there are
/// `derivatives` (tree k holds the (k+1)-th derivative).
///
/// Coefficients are evaluated with `var` substituted; any other variable keeps its stored
/// value. The result is simplified.
pub fn taylor_polynomial(
    expression: &Tree,
    derivatives: &[Tree],
    vars: &VariableTable,
    var: usize,
    point: f64,
) -> EvalResult<Tree> {
    let mut tree = Tree::new();
    let constant = expression.evaluate_at(vars, var, point)?;
    let mut sum = tree.num(constant)?;
    let mut factorial = 1.0;

    for (k, derivative) in (1u32..).zip(derivatives) {
        factorial *= f64::from(k);
        let coefficient = derivative.evaluate_at(vars, var, point)? / factorial;

        let coefficient = tree.num(coefficient)?;
        let x = tree.var(var)?;
        let center = tree.num(point)?;
        let shifted = tree.sub(x, center)?;
        let power = tree.pow_num(shifted, f64::from(k))?;
        let term = tree.mul(coefficient, power)?;
        sum = tree.add(sum, term)?;
    }

    tree.set_root(Some(sum));
    tree.simplify()?;
    debug!(
        "built taylor polynomial of order {} around {point}",
        derivatives.len()
    );
    Ok(tree)
}
