//! Shorthand constructors used by the parser, simplifier and derivative rules.
//!
//! Every constructor allocates a fresh node and takes ownership of the children passed in.

use super::{Node, NodeId, OpKind, Tree, TreeResult};

impl Tree {
    pub fn num(&mut self, value: f64) -> TreeResult<NodeId> {
        self.new_node(Node::Number(value))
    }

    pub fn var(&mut self, index: usize) -> TreeResult<NodeId> {
        self.new_node(Node::Variable(index))
    }

    pub fn unary(&mut self, op: OpKind, operand: NodeId) -> TreeResult<NodeId> {
        self.new_node(Node::Operation {
            op,
            left: None,
            right: Some(operand),
        })
    }

    pub fn binary(&mut self, op: OpKind, left: NodeId, right: NodeId) -> TreeResult<NodeId> {
        self.new_node(Node::Operation {
            op,
            left: Some(left),
            right: Some(right),
        })
    }

    pub fn add(&mut self, left: NodeId, right: NodeId) -> TreeResult<NodeId> {
        self.binary(OpKind::Add, left, right)
    }

    pub fn sub(&mut self, left: NodeId, right: NodeId) -> TreeResult<NodeId> {
        self.binary(OpKind::Sub, left, right)
    }

    pub fn mul(&mut self, left: NodeId, right: NodeId) -> TreeResult<NodeId> {
        self.binary(OpKind::Mul, left, right)
    }

    pub fn div(&mut self, left: NodeId, right: NodeId) -> TreeResult<NodeId> {
        self.binary(OpKind::Div, left, right)
    }

    pub fn pow(&mut self, base: NodeId, exponent: NodeId) -> TreeResult<NodeId> {
        self.binary(OpKind::Pow, base, exponent)
    }

    /// `base ^ value` with a fresh constant exponent
    pub fn pow_num(&mut self, base: NodeId, value: f64) -> TreeResult<NodeId> {
        let exponent = self.num(value)?;
        self.pow(base, exponent)
    }

    /// `-1 * operand`
    pub fn neg(&mut self, operand: NodeId) -> TreeResult<NodeId> {
        let minus_one = self.num(-1.0)?;
        self.mul(minus_one, operand)
    }

    pub fn ln(&mut self, operand: NodeId) -> TreeResult<NodeId> {
        self.unary(OpKind::Ln, operand)
    }
}
