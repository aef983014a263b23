use std::collections::HashSet;

use crate::eval::{EvalError, EvalResult, operands};
use crate::tree::{Node, NodeId, OpKind, Tree, TreeResult};

/// Builds d(`node`)/d(variable `var`) inside `dest`, leaving `src` untouched.
///
/// The result is not simplified. Subtrees that do not mention `var` differentiate to a
/// single `0`.
pub fn derivative(src: &Tree, node: NodeId, var: usize, dest: &mut Tree) -> EvalResult<NodeId> {
    let dependent = src.nodes_containing_variable(node, var)?;
    Differentiator {
        src,
        dest,
        var,
        dependent,
    }
    .diff(node)
}

/// Differentiates the whole of `src` into a new simplified tree.
pub fn derivative_tree(src: &Tree, var: usize) -> EvalResult<Tree> {
    let root = src.root().ok_or(EvalError::EmptyTree)?;
    let mut dest = Tree::new();
    let root = derivative(src, root, var, &mut dest)?;
    dest.set_root(Some(root));
    dest.simplify()?;
    Ok(dest)
}

impl Tree {
    /// Whether variable `index` occurs anywhere below `id`.
    pub fn contains_variable(&self, id: NodeId, index: usize) -> TreeResult<bool> {
        Ok(match self.node(id)? {
            Node::Number(_) => false,
            Node::Variable(var) => var == index,
            Node::Operation { left, right, .. } => {
                for child in [left, right].into_iter().flatten() {
                    if self.contains_variable(child, index)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }

    /// Every node below `id`, itself included, under which variable `index` occurs.
    ///
    /// One walk over the subtree.
    pub fn nodes_containing_variable(
        &self,
        id: NodeId,
        index: usize,
    ) -> TreeResult<HashSet<NodeId>> {
        let mut found = HashSet::new();
        self.collect_containing(id, index, &mut found)?;
        Ok(found)
    }

    fn collect_containing(
        &self,
        id: NodeId,
        index: usize,
        found: &mut HashSet<NodeId>,
    ) -> TreeResult<bool> {
        let contains = match self.node(id)? {
            Node::Number(_) => false,
            Node::Variable(var) => var == index,
            Node::Operation { left, right, .. } => {
                let mut any = false;
                for child in [left, right].into_iter().flatten() {
                    any |= self.collect_containing(child, index, found)?;
                }
                any
            }
        };
        if contains {
            found.insert(id);
        }
        Ok(contains)
    }
}

struct Differentiator<'a> {
    src: &'a Tree,
    dest: &'a mut Tree,
    var: usize,
    /// Source nodes that mention `var`
    dependent: HashSet<NodeId>,
}

impl Differentiator<'_> {
    fn diff(&mut self, id: NodeId) -> EvalResult<NodeId> {
        if !self.dependent.contains(&id) {
            return Ok(self.dest.num(0.0)?);
        }

        match self.src.node(id)? {
            Node::Number(_) => Ok(self.dest.num(0.0)?),
            Node::Variable(index) => {
                let value = if index == self.var { 1.0 } else { 0.0 };
                Ok(self.dest.num(value)?)
            }
            Node::Operation { op, left, right } => match operands(id, op, left, right)? {
                (Some(left), right) => self.binary(id, op, left, right),
                (None, right) => self.unary(id, op, right),
            },
        }
    }

    fn copy(&mut self, id: NodeId) -> TreeResult<NodeId> {
        self.dest.graft(self.src, id)
    }

    /// `op(copy of id)`
    fn wrap(&mut self, op: OpKind, id: NodeId) -> TreeResult<NodeId> {
        let copy = self.copy(id)?;
        self.dest.unary(op, copy)
    }

    /// `1 op (copy of id)^2`
    fn one_and_square(&mut self, op: OpKind, id: NodeId) -> TreeResult<NodeId> {
        let one = self.dest.num(1.0)?;
        let copy = self.copy(id)?;
        let square = self.dest.pow_num(copy, 2.0)?;
        self.dest.binary(op, one, square)
    }

    fn binary(&mut self, id: NodeId, op: OpKind, l: NodeId, r: NodeId) -> EvalResult<NodeId> {
        use OpKind::*;

        let node = match op {
            Add | Sub => {
                let dl = self.diff(l)?;
                let dr = self.diff(r)?;
                self.dest.binary(op, dl, dr)?
            }
            Mul => {
                let dl = self.diff(l)?;
                let cr = self.copy(r)?;
                let first = self.dest.mul(dl, cr)?;
                let cl = self.copy(l)?;
                let dr = self.diff(r)?;
                let second = self.dest.mul(cl, dr)?;
                self.dest.add(first, second)?
            }
            Div => {
                let dl = self.diff(l)?;
                let cr = self.copy(r)?;
                let first = self.dest.mul(dl, cr)?;
                let cl = self.copy(l)?;
                let dr = self.diff(r)?;
                let second = self.dest.mul(cl, dr)?;
                let numerator = self.dest.sub(first, second)?;
                let cr = self.copy(r)?;
                let cr2 = self.copy(r)?;
                let denominator = self.dest.mul(cr, cr2)?;
                self.dest.div(numerator, denominator)?
            }
            Pow => match (
                self.dependent.contains(&l),
                self.dependent.contains(&r),
            ) {
                // n * (dl * ln(r) + l * (dr / r))
                (true, true) => {
                    let whole = self.copy(id)?;
                    let dl = self.diff(l)?;
                    let ln_r = self.wrap(Ln, r)?;
                    let first = self.dest.mul(dl, ln_r)?;
                    let cl = self.copy(l)?;
                    let dr = self.diff(r)?;
                    let cr = self.copy(r)?;
                    let ratio = self.dest.div(dr, cr)?;
                    let second = self.dest.mul(cl, ratio)?;
                    let sum = self.dest.add(first, second)?;
                    self.dest.mul(whole, sum)?
                }
                // (r * l^(r - 1)) * dl
                (true, false) => {
                    let cr = self.copy(r)?;
                    let cl = self.copy(l)?;
                    let exponent = self.copy(r)?;
                    let one = self.dest.num(1.0)?;
                    let lowered = self.dest.sub(exponent, one)?;
                    let power = self.dest.pow(cl, lowered)?;
                    let scaled = self.dest.mul(cr, power)?;
                    let dl = self.diff(l)?;
                    self.dest.mul(scaled, dl)?
                }
                // n * ln(l), without the factor dr
                (false, true) => {
                    let whole = self.copy(id)?;
                    let ln_l = self.wrap(Ln, l)?;
                    self.dest.mul(whole, ln_l)?
                }
                (false, false) => self.dest.num(0.0)?,
            },
            Log => match (
                self.dependent.contains(&l),
                self.dependent.contains(&r),
            ) {
                (false, false) => self.dest.num(0.0)?,
                // dr / (r * ln(l))
                (false, true) => {
                    let dr = self.diff(r)?;
                    let cr = self.copy(r)?;
                    let ln_l = self.wrap(Ln, l)?;
                    let denominator = self.dest.mul(cr, ln_l)?;
                    self.dest.div(dr, denominator)?
                }
                // (dr / r * ln(l) - ln(r) * (dl / l)) / ln(l)^2
                (true, _) => {
                    let dr = self.diff(r)?;
                    let cr = self.copy(r)?;
                    let ratio = self.dest.div(dr, cr)?;
                    let ln_l = self.wrap(Ln, l)?;
                    let first = self.dest.mul(ratio, ln_l)?;
                    let ln_r = self.wrap(Ln, r)?;
                    let dl = self.diff(l)?;
                    let cl = self.copy(l)?;
                    let ratio = self.dest.div(dl, cl)?;
                    let second = self.dest.mul(ln_r, ratio)?;
                    let numerator = self.dest.sub(first, second)?;
                    let ln_l = self.wrap(Ln, l)?;
                    let denominator = self.dest.pow_num(ln_l, 2.0)?;
                    self.dest.div(numerator, denominator)?
                }
            },
            _ => return Err(EvalError::BadArity { op, id }),
        };
        Ok(node)
    }

    fn unary(&mut self, id: NodeId, op: OpKind, r: NodeId) -> EvalResult<NodeId> {
        use OpKind::*;

        let node = match op {
            Ln => {
                let dr = self.diff(r)?;
                let cr = self.copy(r)?;
                self.dest.div(dr, cr)?
            }
            Sin | Cos | Sinh | Cosh => {
                let outer = match op {
                    Sin => Cos,
                    Cos => Sin,
                    Sinh => Cosh,
                    _ => Sinh,
                };
                let outer = self.wrap(outer, r)?;
                let dr = self.diff(r)?;
                let product = self.dest.mul(outer, dr)?;
                if op == Cos {
                    self.dest.neg(product)?
                } else {
                    product
                }
            }
            // 1 / (cos(r) * dr)^2, the inner derivative is squared along with the cosine
            Tan | Cot => {
                let one = self.dest.num(1.0)?;
                let inner = self.wrap(if op == Tan { Cos } else { Sin }, r)?;
                let dr = self.diff(r)?;
                let product = self.dest.mul(inner, dr)?;
                let square = self.dest.pow_num(product, 2.0)?;
                self.dest.div(one, square)?
            }
            Asin | Acos => {
                let dr = self.diff(r)?;
                let numerator = if op == Acos { self.dest.neg(dr)? } else { dr };
                let base = self.one_and_square(Sub, r)?;
                let root = self.dest.pow_num(base, 0.5)?;
                self.dest.div(numerator, root)?
            }
            Atan | Acot => {
                let dr = self.diff(r)?;
                let numerator = if op == Acot { self.dest.neg(dr)? } else { dr };
                let denominator = self.one_and_square(Add, r)?;
                self.dest.div(numerator, denominator)?
            }
            Tanh | Coth => {
                let dr = self.diff(r)?;
                let numerator = if op == Coth { self.dest.neg(dr)? } else { dr };
                let inner = self.wrap(if op == Tanh { Cosh } else { Sinh }, r)?;
                let square = self.dest.pow_num(inner, 2.0)?;
                self.dest.div(numerator, square)?
            }
            _ => return Err(EvalError::BadArity { op, id }),
        };
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use crate::variables::VariableTable;
    use approx::assert_relative_eq;

    fn derive(source: &str, var: &str) -> (Tree, VariableTable, usize) {
        let mut vars = VariableTable::new();
        let tree = parse(source, &mut vars).unwrap();
        let index = vars.find_or_add(var).unwrap();
        let derived = derivative_tree(&tree, index).unwrap();
        derived.verify().unwrap();
        (derived, vars, index)
    }

    fn slope_at(source: &str, x: f64) -> f64 {
        let (tree, vars, index) = derive(source, "x");
        tree.evaluate_at(&vars, index, x).unwrap()
    }

    #[test]
    fn square_gives_twice_x() {
        for (x, expected) in [(-3.0, -6.0), (0.0, 0.0), (1.0, 2.0), (5.0, 10.0)] {
            assert_relative_eq!(slope_at("x^2", x), expected);
        }
    }

    #[test]
    fn arithmetic_rules() {
        let x: f64 = 0.7;
        assert_relative_eq!(slope_at("3*x + x - 2", x), 4.0);
        assert_relative_eq!(slope_at("x * sin(x)", x), x.sin() + x * x.cos());
        assert_relative_eq!(
            slope_at("x / (x + 1)", x),
            1.0 / (x + 1.0).powi(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn function_rules() {
        let x: f64 = 0.3;
        for (source, expected) in [
            ("ln(x)", 1.0 / x),
            ("sin(x)", x.cos()),
            ("cos(x)", -x.sin()),
            ("tg(x)", 1.0 / x.cos().powi(2)),
            ("ctg(x)", 1.0 / x.sin().powi(2)),
            ("arcsin(x)", 1.0 / (1.0 - x * x).sqrt()),
            ("arccos(x)", -1.0 / (1.0 - x * x).sqrt()),
            ("arctg(x)", 1.0 / (1.0 + x * x)),
            ("arcctg(x)", -1.0 / (1.0 + x * x)),
            ("sh(x)", x.cosh()),
            ("ch(x)", x.sinh()),
            ("th(x)", 1.0 / x.cosh().powi(2)),
            ("cth(x)", -1.0 / x.sinh().powi(2)),
        ] {
            assert_relative_eq!(slope_at(source, x), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn chain_rule() {
        let x: f64 = 0.4;
        assert_relative_eq!(
            slope_at("sin(x^2)", x),
            2.0 * x * (x * x).cos(),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            slope_at("ln(3*x + 1)", x),
            3.0 / (3.0 * x + 1.0),
            max_relative = 1e-12
        );
    }

    #[test]
    fn tangent_squares_the_inner_derivative() {
        let x: f64 = 0.2;
        assert_relative_eq!(
            slope_at("tg(2*x)", x),
            1.0 / ((2.0 * x).cos() * 2.0).powi(2),
            max_relative = 1e-12
        );
    }

    #[test]
    fn power_cases() {
        let x: f64 = 2.0;
        assert_relative_eq!(slope_at("x^x", x), 4.0 * (x.ln() + 1.0), max_relative = 1e-12);
        assert_relative_eq!(slope_at("(x+1)^3", x), 27.0);
        assert_relative_eq!(slope_at("2^x", x), 4.0 * 2f64.ln(), max_relative = 1e-12);
        // The exponent's own derivative is not applied
        assert_relative_eq!(
            slope_at("2^(3*x)", x),
            64.0 * 2f64.ln(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn logarithm_cases() {
        let x: f64 = 2.0;
        assert_relative_eq!(
            slope_at("log(2, x)", x),
            1.0 / (x * 2f64.ln()),
            max_relative = 1e-12
        );
        assert_relative_eq!(
            slope_at("log(x, 8)", x),
            -3.0 / (2.0 * 2f64.ln()),
            max_relative = 1e-12
        );
        assert_relative_eq!(slope_at("log(x, x)", x), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn constants_differentiate_to_zero() {
        for source in ["5", "y", "tg(2) + y*3", "ctg(y)^y", "log(y, 2)"] {
            let (tree, ..) = derive(source, "x");
            assert_eq!(tree.node(tree.root().unwrap()).unwrap(), Node::Number(0.0));
            assert_eq!(tree.size(), 1);
        }
    }

    #[test]
    fn other_variables_are_constants() {
        let (tree, mut vars, _) = derive("y*x", "x");
        assert_eq!(tree.node(tree.root().unwrap()).unwrap(), Node::Variable(0));
        vars.set_value("y", 3.0).unwrap();
        assert_relative_eq!(tree.evaluate(&mut vars, &mut crate::eval::Unresolved).unwrap(), 3.0);
    }

    #[test]
    fn source_is_untouched() {
        let mut vars = VariableTable::new();
        let tree = parse("x * ln(x)", &mut vars).unwrap();
        let snapshot = tree.clone();
        let mut dest = Tree::new();
        derivative(&tree, tree.root().unwrap(), 0, &mut dest).unwrap();
        assert!(
            tree.same_shape(tree.root().unwrap(), &snapshot, snapshot.root().unwrap())
                .unwrap()
        );
        assert_eq!(tree.size(), snapshot.size());
    }

    #[test]
    fn variable_search() {
        let mut vars = VariableTable::new();
        let tree = parse("sin(a) + log(b, 2)", &mut vars).unwrap();
        let root = tree.root().unwrap();
        assert!(tree.contains_variable(root, 0).unwrap());
        assert!(tree.contains_variable(root, 1).unwrap());
        assert!(!tree.contains_variable(root, 2).unwrap());
    }

    #[test]
    fn dependent_nodes_in_one_walk() {
        let mut vars = VariableTable::new();
        let tree = parse("sin(a) + log(b, 2)", &mut vars).unwrap();
        let root = tree.root().unwrap();

        let dependent = tree.nodes_containing_variable(root, 1).unwrap();
        assert_eq!(dependent.len(), 3);
        assert!(dependent.contains(&root));
        let Node::Operation { left: Some(sine), .. } = tree.node(root).unwrap() else {
            panic!("expected an addition");
        };
        assert!(!dependent.contains(&sine));
        assert!(tree.nodes_containing_variable(root, 2).unwrap().is_empty());
    }

    #[test]
    fn empty_tree() {
        assert!(matches!(
            derivative_tree(&Tree::new(), 0),
            Err(EvalError::EmptyTree)
        ));
    }
}
