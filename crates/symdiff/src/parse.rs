//! Recursive-descent parser for infix expressions.
//!
//! ```text
//! Grammar     ::= Expression Spaces End
//! Expression  ::= Term { ('+'|'-') Spaces Term }*
//! Term        ::= Power { ('*'|'/') Spaces Power }*
//! Power       ::= Primary { '^' Spaces Primary }*
//! Primary     ::= Spaces ( '(' Expression ')' | Number | Function | Variable ) Spaces
//! Number      ::= digit+ ('.' digit+)?
//! Function    ::= keyword Spaces '(' Expression ( ',' Expression )? ')'
//! Variable    ::= (alpha|'_') (alpha|digit|'_')*
//! ```
//!
//! Every binary operator, `^` included, is left-associative.

use lazy_regex::regex_find;
use log::debug;
use thiserror::Error;

use crate::tree::{NodeId, OpKind, Tree, TreeError};
use crate::variables::VariableTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Expected {
    #[strum(serialize = "a number, function, variable or '('")]
    Primary,
    #[strum(serialize = "a number")]
    Number,
    #[strum(serialize = "'('")]
    OpenParen,
    #[strum(serialize = "')'")]
    CloseParen,
    #[strum(serialize = "','")]
    Comma,
    #[strum(serialize = "end of input")]
    End,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at position {position}: expected {kind}")]
    Syntax { kind: Expected, position: usize },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl ParseError {
    /// Byte offset of the offending input, if this is a syntax error
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Syntax { position, .. } => Some(*position),
            Self::Tree(_) => None,
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses `source` into a new tree, interning every identifier into `vars`.
///
/// No partial tree is returned on failure, although variables met before the error stay
/// registered.
pub fn parse(source: &str, vars: &mut VariableTable) -> ParseResult<Tree> {
    let mut parser = Parser::new(source, vars);
    let root = parser.grammar()?;
    let mut tree = parser.tree;
    tree.set_root(Some(root));
    debug!(
        "parsed {source:?} into {} nodes, {} variables known",
        tree.size(),
        vars.len()
    );
    Ok(tree)
}

struct Parser<'src, 'vars> {
    source: &'src str,
    pos: usize,
    tree: Tree,
    vars: &'vars mut VariableTable,
}

impl<'src, 'vars> Parser<'src, 'vars> {
    fn new(source: &'src str, vars: &'vars mut VariableTable) -> Self {
        Self {
            source,
            pos: 0,
            tree: Tree::new(),
            vars,
        }
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn error(&self, kind: Expected) -> ParseError {
        ParseError::Syntax {
            kind,
            position: self.pos,
        }
    }

    fn skip_spaces(&mut self) {
        let trimmed = self.rest().trim_start_matches(|c: char| c.is_ascii_whitespace());
        self.pos = self.source.len() - trimmed.len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, kind: Expected) -> ParseResult<()> {
        if self.eat(c) { Ok(()) } else { Err(self.error(kind)) }
    }

    /// Consumes the next character if it is one of the given infix operators.
    fn infix(&mut self, accepted: &[OpKind]) -> Option<OpKind> {
        let op = self
            .rest()
            .chars()
            .next()
            .and_then(OpKind::from_infix)
            .filter(|op| accepted.contains(op))?;
        self.pos += 1;
        Some(op)
    }

    fn grammar(&mut self) -> ParseResult<NodeId> {
        let root = self.expression()?;
        self.skip_spaces();
        if self.rest().is_empty() {
            Ok(root)
        } else {
            Err(self.error(Expected::End))
        }
    }

    fn expression(&mut self) -> ParseResult<NodeId> {
        let mut node = self.term()?;
        while let Some(op) = self.infix(&[OpKind::Add, OpKind::Sub]) {
            self.skip_spaces();
            let rhs = self.term()?;
            node = self.tree.binary(op, node, rhs)?;
        }
        Ok(node)
    }

    fn term(&mut self) -> ParseResult<NodeId> {
        let mut node = self.power()?;
        while let Some(op) = self.infix(&[OpKind::Mul, OpKind::Div]) {
            self.skip_spaces();
            let rhs = self.power()?;
            node = self.tree.binary(op, node, rhs)?;
        }
        Ok(node)
    }

    fn power(&mut self) -> ParseResult<NodeId> {
        let mut node = self.primary()?;
        while let Some(op) = self.infix(&[OpKind::Pow]) {
            self.skip_spaces();
            let rhs = self.primary()?;
            node = self.tree.binary(op, node, rhs)?;
        }
        Ok(node)
    }

    fn primary(&mut self) -> ParseResult<NodeId> {
        self.skip_spaces();

        let node = if self.eat('(') {
            let inner = self.expression()?;
            self.expect(')', Expected::CloseParen)?;
            inner
        } else if let Some(digits) = regex_find!(r"^[0-9]+(?:\.[0-9]+)?", self.rest()) {
            self.number(digits)?
        } else if let Some(name) = regex_find!(r"^[A-Za-z_][A-Za-z0-9_]*", self.rest()) {
            // Keywords are matched against the whole identifier, so `sinx` is a variable
            match OpKind::from_keyword(name) {
                Some(op) => {
                    self.pos += name.len();
                    self.function(op)?
                }
                None => self.variable(name)?,
            }
        } else {
            return Err(self.error(Expected::Primary));
        };

        self.skip_spaces();
        Ok(node)
    }

    fn number(&mut self, digits: &str) -> ParseResult<NodeId> {
        let value: f64 = digits.parse().map_err(|_| self.error(Expected::Number))?;
        self.pos += digits.len();
        Ok(self.tree.num(value)?)
    }

    fn function(&mut self, op: OpKind) -> ParseResult<NodeId> {
        self.skip_spaces();
        self.expect('(', Expected::OpenParen)?;
        let first = self.expression()?;

        let node = if op.is_binary() {
            self.expect(',', Expected::Comma)?;
            let second = self.expression()?;
            self.tree.binary(op, first, second)?
        } else {
            self.tree.unary(op, first)?
        };

        self.expect(')', Expected::CloseParen)?;
        Ok(node)
    }

    fn variable(&mut self, name: &str) -> ParseResult<NodeId> {
        let index = self.vars.find_or_add(name)?;
        self.pos += name.len();
        Ok(self.tree.var(index)?)
    }
}
