//! Property-based tests over randomly generated expressions.

#[cfg(test)]
mod tests {
    use approx::relative_eq;
    use proptest::prelude::*;

    use crate::calculus::derivative_tree;
    use crate::eval::Unresolved;
    use crate::parse::parse;
    use crate::tree::{Node, Tree};
    use crate::variables::VariableTable;

    const FUNCTIONS: [&str; 13] = [
        "ln", "sin", "cos", "tg", "ctg", "arcsin", "arccos", "arctg", "arcctg", "sh", "ch", "th",
        "cth",
    ];

    fn number() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u32..20).prop_map(|n| n.to_string()),
            (0u32..10, 1u32..100).prop_map(|(i, f)| format!("{i}.{f}")),
        ]
    }

    /// Any grammar-conforming expression over the given leaves
    fn expression(leaf: BoxedStrategy<String>) -> impl Strategy<Value = String> {
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                (
                    inner.clone(),
                    prop::sample::select(vec!['+', '-', '*', '/', '^']),
                    inner.clone()
                )
                    .prop_map(|(a, op, b)| format!("({a}) {op} ({b})")),
                (prop::sample::select(FUNCTIONS.to_vec()), inner.clone())
                    .prop_map(|(func, a)| format!("{func}({a})")),
                (inner.clone(), inner).prop_map(|(a, b)| format!("log({a}, {b})")),
            ]
        })
    }

    fn constant_source() -> impl Strategy<Value = String> {
        expression(number().boxed())
    }

    fn source_without_x() -> impl Strategy<Value = String> {
        expression(prop_oneof![number(), Just("y".to_owned()), Just("z".to_owned())].boxed())
    }

    fn any_source() -> impl Strategy<Value = String> {
        expression(prop_oneof![number(), Just("x".to_owned()), Just("y".to_owned())].boxed())
    }

    /// Expressions in `x` that stay finite and smooth on [-2, 2]
    fn smooth_source() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![number(), Just("x".to_owned())];
        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                (
                    inner.clone(),
                    prop::sample::select(vec!['+', '-', '*']),
                    inner.clone()
                )
                    .prop_map(|(a, op, b)| format!("({a}) {op} ({b})")),
                (inner.clone(), 1u32..4).prop_map(|(a, n)| format!("({a}) ^ {n}")),
                (inner.clone(), 1u32..9).prop_map(|(a, c)| format!("({a}) / {c}")),
                (prop::sample::select(vec!["sin", "cos", "arctg", "th"]), inner)
                    .prop_map(|(func, a)| format!("{func}({a})")),
            ]
        })
    }

    fn same_value(a: f64, b: f64) -> bool {
        (a.is_nan() && b.is_nan()) || relative_eq!(a, b, epsilon = 1e-9, max_relative = 1e-9)
    }

    fn derive(source: &str, vars: &mut VariableTable) -> Tree {
        let tree = parse(source, vars).unwrap();
        let x = vars.find_or_add("x").unwrap();
        derivative_tree(&tree, x).unwrap()
    }

    proptest! {
        #[test]
        fn constants_fold_to_their_value(source in constant_source()) {
            let mut vars = VariableTable::new();
            let mut tree = parse(&source, &mut vars).unwrap();
            let direct = tree.evaluate(&mut vars, &mut Unresolved).unwrap();

            tree.simplify().unwrap();
            tree.verify().unwrap();
            prop_assert_eq!(tree.size(), 1);
            let folded = tree.node(tree.root().unwrap()).unwrap().as_number().unwrap();
            prop_assert!(same_value(folded, direct), "{} folded to {} but is {}", source, folded, direct);
        }

        #[test]
        fn derivative_is_linear(a in smooth_source(), b in smooth_source()) {
            let mut vars = VariableTable::new();
            let sum = derive(&format!("({a}) + ({b})"), &mut vars);
            let da = derive(&a, &mut vars);
            let db = derive(&b, &mut vars);
            sum.verify().unwrap();

            let x = vars.index_of("x").unwrap();
            for point in [-1.5, -0.25, 0.5, 1.75] {
                let lhs = sum.evaluate_at(&vars, x, point).unwrap();
                let rhs = da.evaluate_at(&vars, x, point).unwrap()
                    + db.evaluate_at(&vars, x, point).unwrap();
                prop_assert!(same_value(lhs, rhs), "at {}: {} vs {}", point, lhs, rhs);
            }
        }

        #[test]
        fn derivative_of_constant_is_zero(source in source_without_x()) {
            let mut vars = VariableTable::new();
            let derived = derive(&source, &mut vars);
            prop_assert_eq!(derived.size(), 1);
            prop_assert_eq!(derived.node(derived.root().unwrap()).unwrap(), Node::Number(0.0));
        }

        #[test]
        fn simplification_is_idempotent(source in any_source()) {
            let mut vars = VariableTable::new();
            let mut tree = parse(&source, &mut vars).unwrap();
            tree.simplify().unwrap();
            let once = tree.clone();

            prop_assert_eq!(tree.simplify().unwrap(), 1);
            tree.verify().unwrap();
            prop_assert!(tree.same_shape(tree.root().unwrap(), &once, once.root().unwrap()).unwrap());
        }

        #[test]
        fn derivatives_keep_tree_invariants(source in any_source()) {
            let mut vars = VariableTable::new();
            let tree = parse(&source, &mut vars).unwrap();
            tree.verify().unwrap();
            let mut derived = tree;
            for _ in 0..2 {
                derived = derivative_tree(&derived, 0).unwrap();
                derived.verify().unwrap();
            }
        }
    }
}
