use std::fmt::Display;

use lazy_regex::regex_is_match;
use symdiff_utils::raise_superscript;

use crate::eval::{EvalError, EvalResult, operands};
use crate::tree::{Node, NodeId, OpKind, Tree};
use crate::variables::VariableTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrintOptions {
    /// Render integer exponents as superscripts, `x²` instead of `x^2`
    pub unicode_exponents: bool,
}

/// Read-only view of one node, with variable indices resolved to names.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeView<'a> {
    Number(f64),
    Variable(&'a str),
    Operation {
        op: OpKind,
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
}

fn wrap_if(s: &str, wrap: bool) -> String {
    if wrap { format!("({s})") } else { s.to_owned() }
}

impl Tree {
    pub fn view<'a>(&self, id: NodeId, vars: &'a VariableTable) -> EvalResult<NodeView<'a>> {
        Ok(match self.node(id)? {
            Node::Number(value) => NodeView::Number(value),
            Node::Variable(index) => {
                NodeView::Variable(vars.name(index).ok_or(EvalError::UnknownVariable(index))?)
            }
            Node::Operation { op, left, right } => NodeView::Operation { op, left, right },
        })
    }

    pub fn display<'a>(&'a self, vars: &'a VariableTable) -> TreeDisplay<'a> {
        TreeDisplay {
            tree: self,
            vars,
            opts: PrintOptions::default(),
        }
    }

    pub fn display_opts<'a>(
        &'a self,
        vars: &'a VariableTable,
        opts: PrintOptions,
    ) -> TreeDisplay<'a> {
        TreeDisplay {
            tree: self,
            vars,
            opts,
        }
    }

    /// Infix rendering with the fewest parentheses the grammar allows.
    ///
    /// The output always parses back. Negations, which the grammar has no sign for, print as
    /// `0 - x`, or as `a - x` when they are the right side of an addition.
    pub fn node_to_string(
        &self,
        id: NodeId,
        vars: &VariableTable,
        opts: PrintOptions,
    ) -> EvalResult<String> {
        if let Some(operand) = self.negated_operand(id, vars, opts)? {
            return Ok(format!("0 - {operand}"));
        }
        Ok(match self.view(id, vars)? {
            NodeView::Number(value) if value == 0.0 => "0".to_owned(),
            NodeView::Number(value) => value.to_string(),
            NodeView::Variable(name) => name.to_owned(),
            NodeView::Operation { op, left, right } => {
                match operands(id, op, left, right)? {
                    (Some(base), arg) if op == OpKind::Log => format!(
                        "log({}, {})",
                        self.node_to_string(base, vars, opts)?,
                        self.node_to_string(arg, vars, opts)?
                    ),
                    (None, arg) => format!("{op}({})", self.node_to_string(arg, vars, opts)?),
                    (Some(left), right) => self.infix_to_string(op, left, right, vars, opts)?,
                }
            }
        })
    }

    fn infix_to_string(
        &self,
        op: OpKind,
        left: NodeId,
        right: NodeId,
        vars: &VariableTable,
        opts: PrintOptions,
    ) -> EvalResult<String> {
        let prec = op.precedence();

        let left_str = self.node_to_string(left, vars, opts)?;
        let wrap_left = self
            .printed_op(left)?
            .is_some_and(|sub| sub.precedence() < prec);
        let left_str = wrap_if(&left_str, wrap_left);

        if op == OpKind::Add {
            if let Some(operand) = self.negated_operand(right, vars, opts)? {
                return Ok(format!("{left_str} - {operand}"));
            }
        }

        let right_str = self.node_to_string(right, vars, opts)?;
        if opts.unicode_exponents
            && op == OpKind::Pow
            && regex_is_match!(r"^[0-9]+$", &right_str)
        {
            return Ok(format!("{left_str}{}", raise_superscript(&right_str)));
        }

        // Only a chain of one associative operator may drop its parentheses on the right
        let wrap_right = self.printed_op(right)?.is_some_and(|sub| {
            sub.precedence() < prec
                || (sub.precedence() == prec && !(sub == op && op.is_commutative()))
        });
        let right_str = wrap_if(&right_str, wrap_right);

        Ok(if op == OpKind::Pow {
            format!("{left_str}{op}{right_str}")
        } else {
            format!("{left_str} {op} {right_str}")
        })
    }

    /// `-1 * x` and negative constants.
    fn is_negation(&self, id: NodeId) -> EvalResult<bool> {
        Ok(match self.node(id)? {
            Node::Number(value) => value < 0.0,
            Node::Operation {
                op: OpKind::Mul,
                left: Some(left),
                ..
            } => self.node(left)?.as_number() == Some(-1.0),
            _ => false,
        })
    }

    /// What a negation subtracts from zero, ready to follow a `-`.
    fn negated_operand(
        &self,
        id: NodeId,
        vars: &VariableTable,
        opts: PrintOptions,
    ) -> EvalResult<Option<String>> {
        if !self.is_negation(id)? {
            return Ok(None);
        }
        Ok(match self.node(id)? {
            Node::Number(value) => Some((-value).to_string()),
            Node::Operation {
                right: Some(right), ..
            } => {
                let operand = self.node_to_string(right, vars, opts)?;
                let wrap = self
                    .printed_op(right)?
                    .is_some_and(|sub| sub.precedence() <= OpKind::Sub.precedence());
                Some(wrap_if(&operand, wrap))
            }
            _ => None,
        })
    }

    /// The infix operator a node prints as, `None` when it never needs parentheses.
    fn printed_op(&self, id: NodeId) -> EvalResult<Option<OpKind>> {
        if self.is_negation(id)? {
            return Ok(Some(OpKind::Sub));
        }
        Ok(match self.node(id)? {
            Node::Operation { op, .. } if !op.is_function() => Some(op),
            _ => None,
        })
    }

    /// LaTeX rendering built from each operator's template.
    pub fn node_to_latex(&self, id: NodeId, vars: &VariableTable) -> EvalResult<String> {
        Ok(match self.view(id, vars)? {
            NodeView::Number(value) => value.to_string(),
            NodeView::Variable(name) => name.to_owned(),
            NodeView::Operation { op, left, right } => {
                let (left, right) = operands(id, op, left, right)?;
                let wrapped = |child: NodeId| -> EvalResult<String> {
                    let latex = self.node_to_latex(child, vars)?;
                    let loose = op.precedence() <= OpKind::Mul.precedence()
                        && self
                            .printed_op(child)?
                            .is_some_and(|sub| sub.precedence() < op.precedence());
                    Ok(if loose {
                        format!("\\left({latex}\\right)")
                    } else {
                        latex
                    })
                };

                let mut latex = op.latex_template().replace("%r", &wrapped(right)?);
                if let Some(left) = left {
                    latex = latex.replace("%l", &wrapped(left)?);
                }
                latex
            }
        })
    }
}

/// Infix rendering of a whole tree, created by [`Tree::display`].
pub struct TreeDisplay<'a> {
    tree: &'a Tree,
    vars: &'a VariableTable,
    opts: PrintOptions,
}

impl TreeDisplay<'_> {
    pub fn to_latex(&self) -> EvalResult<String> {
        let root = self.tree.root().ok_or(EvalError::EmptyTree)?;
        self.tree.node_to_latex(root, self.vars)
    }
}

impl Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(root) = self.tree.root() else {
            return f.write_str("<empty>");
        };
        match self.tree.node_to_string(root, self.vars, self.opts) {
            Ok(s) => f.write_str(&s),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}
