use serde::{Deserialize, Serialize};

use crate::compiler::{symtab::SymId, Position};

pub type ExpressionList = Vec<Expression>;

/// An expression of the syntax tree. Every node carries the position of
/// the source text it came from. Identifiers have already been resolved to
/// symbols by the front end.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Integer(Position, i64),
    Real(Position, f64),
    Identifier(Position, SymId),
    Indexed {
        pos: Position,
        array: SymId,
        index: Box<Expression>,
    },
    FunctionCall {
        pos: Position,
        function: SymId,
        args: ExpressionList,
    },
    /// Conversion of `expr` to the type `ty`. Only inserted by the type
    /// checker.
    Cast {
        pos: Position,
        ty: SymId,
        expr: Box<Expression>,
    },
    UnaryOp(Position, UnaryOperator, Box<Expression>),
    /// `ty` is the result type, set by the type checker.
    BinaryOp {
        pos: Position,
        op: BinaryOperator,
        ty: Option<SymId>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// The result of a relation is always an integer. `operand_ty` is the
    /// type both operands are compared at, set by the type checker.
    Relation {
        pos: Position,
        op: RelationOperator,
        operand_ty: Option<SymId>,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn pos(&self) -> Position {
        use Expression::*;
        match self {
            Integer(pos, _) | Real(pos, _) | Identifier(pos, _) | UnaryOp(pos, ..) => *pos,
            Indexed { pos, .. }
            | FunctionCall { pos, .. }
            | Cast { pos, .. }
            | BinaryOp { pos, .. }
            | Relation { pos, .. } => *pos,
        }
    }

    pub fn binary(pos: Position, op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            pos,
            op,
            ty: None,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn relation(
        pos: Position,
        op: RelationOperator,
        left: Expression,
        right: Expression,
    ) -> Self {
        Expression::Relation {
            pos,
            op,
            operand_ty: None,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(pos: Position, op: UnaryOperator, expr: Expression) -> Self {
        Expression::UnaryOp(pos, op, Box::new(expr))
    }

    pub fn indexed(pos: Position, array: SymId, index: Expression) -> Self {
        Expression::Indexed {
            pos,
            array,
            index: Box::new(index),
        }
    }

    /// Wrap this expression in a cast to `ty`, in place.
    pub fn cast_to(&mut self, ty: SymId) {
        let pos = self.pos();
        let inner = std::mem::replace(self, Expression::Integer(pos, 0));
        *self = Expression::Cast {
            pos,
            ty,
            expr: Box::new(inner),
        };
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Integer(..) | Expression::Real(..))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOperator {
    Add,
    Sub,
    Mult,
    Divide,
    Idiv,
    Mod,
    And,
    Or,
}

impl BinaryOperator {
    /// Evaluate the operator over integers the way the target machine does.
    /// Returns `None` if the operator is not defined over integers or if
    /// the result would trap.
    pub fn eval_int(&self, l: i64, r: i64) -> Option<i64> {
        use BinaryOperator::*;
        match self {
            Add => Some(l.wrapping_add(r)),
            Sub => Some(l.wrapping_sub(r)),
            Mult => Some(l.wrapping_mul(r)),
            Idiv => l.checked_div(r),
            Mod => l.checked_rem(r),
            And => Some((l != 0 && r != 0) as i64),
            Or => Some((l != 0 || r != 0) as i64),
            Divide => None,
        }
    }

    /// Evaluate the operator over reals. Returns `None` if the operator is
    /// not defined over reals.
    pub fn eval_real(&self, l: f64, r: f64) -> Option<f64> {
        use BinaryOperator::*;
        match self {
            Add => Some(l + r),
            Sub => Some(l - r),
            Mult => Some(l * r),
            Divide if r != 0.0 => Some(l / r),
            _ => None,
        }
    }
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        use BinaryOperator::*;
        match self {
            Add => f.write_str("+"),
            Sub => f.write_str("-"),
            Mult => f.write_str("*"),
            Divide => f.write_str("/"),
            Idiv => f.write_str("div"),
            Mod => f.write_str("mod"),
            And => f.write_str("and"),
            Or => f.write_str("or"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationOperator {
    Eq,
    Ne,
    Lt,
    Gt,
}

impl RelationOperator {
    pub fn eval_int(&self, l: i64, r: i64) -> bool {
        use RelationOperator::*;
        match self {
            Eq => l == r,
            Ne => l != r,
            Lt => l < r,
            Gt => l > r,
        }
    }

    pub fn eval_real(&self, l: f64, r: f64) -> bool {
        use RelationOperator::*;
        match self {
            Eq => l == r,
            Ne => l != r,
            Lt => l < r,
            Gt => l > r,
        }
    }
}

impl std::fmt::Display for RelationOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        use RelationOperator::*;
        match self {
            Eq => f.write_str("="),
            Ne => f.write_str("<>"),
            Lt => f.write_str("<"),
            Gt => f.write_str(">"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOperator {
    Negate,
    Not,
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            UnaryOperator::Negate => f.write_str("-"),
            UnaryOperator::Not => f.write_str("not"),
        }
    }
}
