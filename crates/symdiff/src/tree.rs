use std::collections::TryReserveError;
use std::fmt::Display;

use thiserror::Error;

pub mod operators;
pub use operators::*;

mod build;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node {
    Number(f64),
    Variable(usize),
    Operation {
        op: OpKind,
        left: Option<NodeId>,
        right: Option<NodeId>,
    },
}

impl Node {
    pub const UNSET: Self = Self::Number(f64::NAN);

    pub fn as_number(&self) -> Option<f64> {
        if let Self::Number(num) = self {
            Some(*num)
        } else {
            None
        }
    }

    pub fn children(&self) -> (Option<NodeId>, Option<NodeId>) {
        match self {
            Self::Operation { left, right, .. } => (*left, *right),
            Self::Number(..) | Self::Variable(..) => (None, None),
        }
    }
}

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("could not allocate room for {requested} more {what}")]
    Allocation {
        what: &'static str,
        requested: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("node {0} does not exist in this tree")]
    InvalidNode(NodeId),
    #[error("node {0} is reachable more than once")]
    SharedNode(NodeId),
    #[error("operation {op} at node {id} has children that do not match its arity")]
    BadArity { op: OpKind, id: NodeId },
    #[error("tree tracks {tracked} nodes but {reachable} are reachable from the root")]
    SizeMismatch { tracked: usize, reachable: usize },
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Arena of nodes with a designated root.
///
/// Every live node is owned by exactly one parent or by the root slot. Deleted slots are reused
/// by later allocations.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: Option<NodeId>,
    size: usize,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: Option<NodeId>) {
        self.root = root;
    }

    /// Number of live nodes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Allocates a node holding an unset number and no children.
    pub fn create_node(&mut self) -> TreeResult<NodeId> {
        let id = if let Some(slot) = self.free.pop() {
            self.nodes[slot] = Some(Node::UNSET);
            slot
        } else {
            self.nodes
                .try_reserve(1)
                .map_err(|source| TreeError::Allocation {
                    what: "tree nodes",
                    requested: 1,
                    source,
                })?;
            self.nodes.push(Some(Node::UNSET));
            self.nodes.len() - 1
        };
        self.size += 1;
        Ok(NodeId(id))
    }

    /// Overwrites the payload and children of an existing node.
    pub fn fill(&mut self, id: NodeId, node: Node) -> TreeResult<()> {
        let slot = self
            .nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(TreeError::InvalidNode(id))?;
        *slot = node;
        Ok(())
    }

    pub fn new_node(&mut self, node: Node) -> TreeResult<NodeId> {
        let id = self.create_node()?;
        self.fill(id, node)?;
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> TreeResult<Node> {
        self.get(id).copied().ok_or(TreeError::InvalidNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Deep copy of a subtree of this tree. The copy shares no nodes with the original.
    pub fn duplicate(&mut self, id: NodeId) -> TreeResult<NodeId> {
        let node = match self.node(id)? {
            Node::Operation { op, left, right } => {
                let left = left.map(|child| self.duplicate(child)).transpose()?;
                let right = right.map(|child| self.duplicate(child)).transpose()?;
                Node::Operation { op, left, right }
            }
            leaf => leaf,
        };
        self.new_node(node)
    }

    /// Deep copy of a subtree of `src` into this tree.
    pub fn graft(&mut self, src: &Tree, id: NodeId) -> TreeResult<NodeId> {
        let node = match src.node(id)? {
            Node::Operation { op, left, right } => {
                let left = left.map(|child| self.graft(src, child)).transpose()?;
                let right = right.map(|child| self.graft(src, child)).transpose()?;
                Node::Operation { op, left, right }
            }
            leaf => leaf,
        };
        self.new_node(node)
    }

    /// Frees a subtree and clears the handle that owned it.
    pub fn delete(&mut self, handle: &mut Option<NodeId>) {
        let Some(id) = handle.take() else {
            return;
        };
        let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) else {
            return;
        };
        let (mut left, mut right) = node.children();
        self.delete(&mut left);
        self.delete(&mut right);
        self.free.push(id.0);
        self.size -= 1;
        if self.root == Some(id) {
            self.root = None;
        }
    }

    pub fn clear(&mut self) {
        let mut root = self.root;
        self.delete(&mut root);
        self.root = None;
    }

    pub fn is_leaf(&self, id: NodeId) -> TreeResult<bool> {
        Ok(matches!(self.node(id)?.children(), (None, None)))
    }

    pub fn has_one_child(&self, id: NodeId) -> TreeResult<bool> {
        Ok(matches!(
            self.node(id)?.children(),
            (Some(_), None) | (None, Some(_))
        ))
    }

    pub fn has_both_children(&self, id: NodeId) -> TreeResult<bool> {
        Ok(matches!(self.node(id)?.children(), (Some(_), Some(_))))
    }

    /// Checks arity, ownership and size bookkeeping of everything reachable from the root.
    pub fn verify(&self) -> TreeResult<()> {
        let mut seen = vec![false; self.nodes.len()];
        let mut reachable = 0;
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();

        while let Some(id) = stack.pop() {
            let node = self.node(id)?;
            if std::mem::replace(&mut seen[id.0], true) {
                return Err(TreeError::SharedNode(id));
            }
            reachable += 1;

            if let Node::Operation { op, left, right } = node {
                if right.is_none() || left.is_some() != op.is_binary() {
                    return Err(TreeError::BadArity { op, id });
                }
            }
            let (left, right) = node.children();
            stack.extend(left);
            stack.extend(right);
        }

        if reachable == self.size {
            Ok(())
        } else {
            Err(TreeError::SizeMismatch {
                tracked: self.size,
                reachable,
            })
        }
    }

    /// Structural equality of two subtrees, treating NaN constants as equal.
    pub fn same_shape(&self, a: NodeId, other: &Tree, b: NodeId) -> TreeResult<bool> {
        Ok(match (self.node(a)?, other.node(b)?) {
            (Node::Number(x), Node::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
            (Node::Variable(i), Node::Variable(j)) => i == j,
            (
                Node::Operation {
                    op: op_a,
                    left: left_a,
                    right: right_a,
                },
                Node::Operation {
                    op: op_b,
                    left: left_b,
                    right: right_b,
                },
            ) => {
                op_a == op_b
                    && self.same_child(left_a, other, left_b)?
                    && self.same_child(right_a, other, right_b)?
            }
            _ => false,
        })
    }

    fn same_child(&self, a: Option<NodeId>, other: &Tree, b: Option<NodeId>) -> TreeResult<bool> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => self.same_shape(a, other, b),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tree: &mut Tree) -> NodeId {
        // sin(x0) * 2
        let x = tree.var(0).unwrap();
        let sin = tree.unary(OpKind::Sin, x).unwrap();
        let two = tree.num(2.0).unwrap();
        let root = tree.mul(sin, two).unwrap();
        tree.set_root(Some(root));
        root
    }

    #[test]
    fn create_and_fill() {
        let mut tree = Tree::new();
        let id = tree.create_node().unwrap();
        assert!(tree.node(id).unwrap().as_number().unwrap().is_nan());
        tree.fill(id, Node::Number(4.0)).unwrap();
        assert_eq!(tree.node(id).unwrap(), Node::Number(4.0));
        assert_eq!(tree.size(), 1);
        assert!(tree.is_leaf(id).unwrap());
    }

    #[test]
    fn arity_queries() {
        let mut tree = Tree::new();
        let root = sample(&mut tree);
        assert!(tree.has_both_children(root).unwrap());
        let (_, Some(_)) = tree.node(root).unwrap().children() else {
            panic!("missing right child");
        };
        let (Some(sin), _) = tree.node(root).unwrap().children() else {
            panic!("missing left child");
        };
        assert!(tree.has_one_child(sin).unwrap());
        assert!(!tree.is_leaf(sin).unwrap());
        tree.verify().unwrap();
    }

    #[test]
    fn delete_frees_subtree_and_reuses_slots() {
        let mut tree = Tree::new();
        let root = sample(&mut tree);
        assert_eq!(tree.size(), 4);

        let mut handle = Some(root);
        tree.delete(&mut handle);
        assert_eq!(handle, None);
        assert_eq!(tree.size(), 0);
        assert!(tree.is_empty());
        assert!(matches!(tree.node(root), Err(TreeError::InvalidNode(_))));

        let reused = tree.num(1.0).unwrap();
        assert!(reused.index() < 4);
        tree.verify().unwrap_err();
        tree.set_root(Some(reused));
        tree.verify().unwrap();
    }

    #[test]
    fn copies_are_disjoint() {
        let mut tree = Tree::new();
        let root = sample(&mut tree);
        let copy = tree.duplicate(root).unwrap();
        assert_ne!(copy, root);
        assert_eq!(tree.size(), 8);
        assert!(tree.same_shape(root, &tree, copy).unwrap());

        let mut other = Tree::new();
        let grafted = other.graft(&tree, root).unwrap();
        other.set_root(Some(grafted));
        other.verify().unwrap();
        assert!(tree.same_shape(root, &other, grafted).unwrap());

        let mut handle = Some(copy);
        tree.delete(&mut handle);
        tree.verify().unwrap();
        assert_eq!(tree.size(), 4);
    }

    #[test]
    fn verify_detects_sharing_and_bad_arity() {
        let mut tree = Tree::new();
        let x = tree.var(0).unwrap();
        let shared = tree.add(x, x).unwrap();
        tree.set_root(Some(shared));
        assert!(matches!(tree.verify(), Err(TreeError::SharedNode(_))));

        let mut tree = Tree::new();
        let x = tree.var(0).unwrap();
        let bad = tree
            .new_node(Node::Operation {
                op: OpKind::Sin,
                left: Some(x),
                right: None,
            })
            .unwrap();
        tree.set_root(Some(bad));
        assert!(matches!(tree.verify(), Err(TreeError::BadArity { .. })));
    }

    #[test]
    fn nan_constants_share_shape() {
        let mut tree = Tree::new();
        let a = tree.num(f64::NAN).unwrap();
        let b = tree.num(f64::NAN).unwrap();
        let c = tree.num(1.0).unwrap();
        assert!(tree.same_shape(a, &tree, b).unwrap());
        assert!(!tree.same_shape(a, &tree, c).unwrap());
    }
}
