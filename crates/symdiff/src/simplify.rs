//! Constant folding and trivial-identity elimination, run alternately until neither changes the
//! tree.

use approx::abs_diff_eq;
use log::{debug, trace};

use crate::eval::{EvalResult, operands};
use crate::tree::{Node, NodeId, OpKind, Tree, TreeResult};

/// Tolerance used when matching the constants 0 and 1 in identities
pub const EPSILON: f64 = 1e-9;

type Pass = fn(&mut Tree, NodeId) -> EvalResult<(NodeId, bool)>;

struct Children {
    op: OpKind,
    left: Option<NodeId>,
    right: NodeId,
    modified: bool,
}

#[derive(Debug, Clone, Copy)]
enum Rewrite {
    Keep(NodeId),
    Negate(NodeId),
    Constant(f64),
}

impl Tree {
    /// Simplifies the tree in place and returns the number of rounds it took.
    ///
    /// The root may be replaced. An empty tree is left alone.
    pub fn simplify(&mut self) -> EvalResult<usize> {
        let before = self.size();
        let mut rounds = 0;

        while let Some(root) = self.root() {
            rounds += 1;
            let (root, folded) = self.fold_constants(root)?;
            self.set_root(Some(root));
            let (root, rewritten) = self.eliminate_trivial(root)?;
            self.set_root(Some(root));

            if !folded && !rewritten {
                break;
            }
        }

        debug!(
            "simplified {before} nodes down to {} in {rounds} rounds",
            self.size()
        );
        Ok(rounds)
    }

    /// Replaces every operation whose operands are all constants by its value.
    fn fold_constants(&mut self, id: NodeId) -> EvalResult<(NodeId, bool)> {
        let Some(Children {
            op,
            left,
            right,
            modified,
        }) = self.rewrite_children(id, Self::fold_constants)?
        else {
            return Ok((id, false));
        };

        let left = match left {
            Some(left) => self.node(left)?.as_number(),
            None => Some(f64::NAN),
        };
        let (Some(left), Some(right)) = (left, self.node(right)?.as_number()) else {
            return Ok((id, modified));
        };

        let value = op.apply(left, right);
        trace!("folded {op} at {id} into {value}");
        Ok((self.replace(id, |tree| tree.num(value))?, true))
    }

    /// Collapses additions of zero, multiplications by one and similar identities.
    fn eliminate_trivial(&mut self, id: NodeId) -> EvalResult<(NodeId, bool)> {
        let Some(Children {
            op,
            left,
            right,
            modified,
        }) = self.rewrite_children(id, Self::eliminate_trivial)?
        else {
            return Ok((id, false));
        };
        let Some(left) = left else {
            return Ok((id, modified));
        };

        use OpKind::*;
        use Rewrite::*;
        let rewrite = match op {
            Add if self.is_constant(left, 0.0)? => Keep(right),
            Add if self.is_constant(right, 0.0)? => Keep(left),
            Sub if self.is_constant(left, 0.0)? => Negate(right),
            Sub if self.is_constant(right, 0.0)? => Keep(left),
            Mul if self.is_constant(left, 1.0)? => Keep(right),
            Mul if self.is_constant(right, 1.0)? => Keep(left),
            Mul if self.is_constant(left, 0.0)? || self.is_constant(right, 0.0)? => Constant(0.0),
            Div if self.is_constant(right, 1.0)? => Keep(left),
            Div if self.is_constant(left, 0.0)? => Constant(0.0),
            Pow if self.is_constant(right, 1.0)? => Keep(left),
            Pow if self.is_constant(right, 0.0)? || self.is_constant(left, 1.0)? => Constant(1.0),
            _ => return Ok((id, modified)),
        };

        trace!("rewrote {op} at {id} as {rewrite:?}");
        let new = self.replace(id, |tree| match rewrite {
            Keep(child) => tree.duplicate(child),
            Negate(child) => {
                let copy = tree.duplicate(child)?;
                tree.neg(copy)
            }
            Constant(value) => tree.num(value),
        })?;
        Ok((new, true))
    }

    /// Runs `pass` over both children of an operation and relinks the results.
    fn rewrite_children(&mut self, id: NodeId, pass: Pass) -> EvalResult<Option<Children>> {
        let Node::Operation { op, left, right } = self.node(id)? else {
            return Ok(None);
        };
        let (left, right) = operands(id, op, left, right)?;

        let mut modified = false;
        let left = match left {
            Some(left) => {
                let (left, changed) = pass(self, left)?;
                modified |= changed;
                Some(left)
            }
            None => None,
        };
        let (right, changed) = pass(self, right)?;
        modified |= changed;

        self.fill(id, Node::Operation {
            op,
            left,
            right: Some(right),
        })?;
        Ok(Some(Children {
            op,
            left,
            right,
            modified,
        }))
    }

    /// Builds the replacement first, then frees the old subtree.
    fn replace(
        &mut self,
        id: NodeId,
        build: impl FnOnce(&mut Self) -> TreeResult<NodeId>,
    ) -> TreeResult<NodeId> {
        let new = build(self)?;
        self.delete(&mut Some(id));
        Ok(new)
    }

    fn is_constant(&self, id: NodeId, value: f64) -> TreeResult<bool> {
        Ok(self
            .node(id)?
            .as_number()
            .is_some_and(|num| abs_diff_eq!(num, value, epsilon = EPSILON)))
    }
}
