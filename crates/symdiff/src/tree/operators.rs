use std::fmt::Display;

use strum::{EnumIter, IntoEnumIterator};

#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, EnumIter)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Log,
    Ln,
    Sin,
    Cos,
    Tan,
    Cot,
    Asin,
    Acos,
    Atan,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Coth,
}

impl OpKind {
    pub const INFIX: [Self; 5] = [Self::Add, Self::Sub, Self::Mul, Self::Div, Self::Pow];

    /// Function name as written in source text, `None` for infix operators
    pub fn keyword(self) -> Option<&'static str> {
        use OpKind::*;
        Some(match self {
            Add | Sub | Mul | Div | Pow => return None,
            Log => "log",
            Ln => "ln",
            Sin => "sin",
            Cos => "cos",
            Tan => "tg",
            Cot => "ctg",
            Asin => "arcsin",
            Acos => "arccos",
            Atan => "arctg",
            Acot => "arcctg",
            Sinh => "sh",
            Cosh => "ch",
            Tanh => "th",
            Coth => "cth",
        })
    }

    pub fn symbol(self) -> &'static str {
        use OpKind::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Pow => "^",
            func => func.keyword().unwrap_or("?"),
        }
    }

    pub fn from_keyword(name: &str) -> Option<Self> {
        Self::iter().find(|op| op.keyword() == Some(name))
    }

    pub fn from_infix(c: char) -> Option<Self> {
        Self::INFIX
            .into_iter()
            .find(|op| op.symbol().starts_with(c))
    }

    pub fn is_function(self) -> bool {
        self.keyword().is_some()
    }

    /// Number of operands. Unary operators only ever use the right child.
    pub fn arity(self) -> usize {
        use OpKind::*;
        match self {
            Add | Sub | Mul | Div | Pow | Log => 2,
            _ => 1,
        }
    }

    pub fn is_binary(self) -> bool {
        self.arity() == 2
    }

    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul)
    }

    pub fn precedence(self) -> u8 {
        use OpKind::*;
        match self {
            Add | Sub => 1,
            Mul | Div => 2,
            Pow => 3,
            _ => 4,
        }
    }

    /// Layout used by the LaTeX renderer; `%l` and `%r` stand for the children.
    pub fn latex_template(self) -> &'static str {
        use OpKind::*;
        match self {
            Add => "%l + %r",
            Sub => "%l - %r",
            Mul => "%l \\cdot %r",
            Div => "\\frac {%l}{%r}",
            Pow => "{(%l)} ^ {%r}",
            Log => "\\log_{%l} (%r)",
            Ln => "\\ln {(%r)}",
            Sin => "\\sin (%r)",
            Cos => "\\cos (%r)",
            Tan => "\\tan (%r)",
            Cot => "\\ctan (%r)",
            Asin => "\\arcsin (%r)",
            Acos => "\\arccos (%r)",
            Atan => "\\arctg (%r)",
            Acot => "\\arcctg (%r)",
            Sinh => "\\sh (%r)",
            Cosh => "\\ch (%r)",
            Tanh => "\\th (%r)",
            Coth => "\\cth (%r)",
        }
    }

    /// Closed-form value of the operator. `left` is ignored by unary operators.
    ///
    /// Domain errors and division by zero come out as NaN or infinities.
    pub fn apply(self, left: f64, right: f64) -> f64 {
        use OpKind::*;
        match self {
            Add => left + right,
            Sub => left - right,
            Mul => left * right,
            Div => left / right,
            Pow => left.powf(right),
            Log => right.ln() / left.ln(),
            Ln => right.ln(),
            Sin => right.sin(),
            Cos => right.cos(),
            Tan => right.tan(),
            Cot => 1.0 / right.tan(),
            Asin => right.asin(),
            Acos => right.acos(),
            Atan => right.atan(),
            // Reciprocal of arctangent, not the inverse cotangent
            Acot => 1.0 / right.atan(),
            Sinh => right.sinh(),
            Cosh => right.cosh(),
            Tanh => right.tanh(),
            Coth => 1.0 / right.tanh(),
        }
    }
}

impl Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}
