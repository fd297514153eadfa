use crate::compiler::{symtab::SymId, Position};

use super::{Expression, ExpressionList};

pub type StatementList = Vec<Statement>;
pub type ElsifList = Vec<Elsif>;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `target` is either an `Identifier` or an `Indexed` expression.
    Assign {
        pos: Position,
        target: Expression,
        value: Expression,
    },
    ProcedureCall {
        pos: Position,
        routine: SymId,
        args: ExpressionList,
    },
    While {
        pos: Position,
        cond: Expression,
        body: StatementList,
    },
    If {
        pos: Position,
        cond: Expression,
        body: StatementList,
        elsifs: ElsifList,
        otherwise: Option<StatementList>,
    },
    Return {
        pos: Position,
        value: Option<Expression>,
    },
}

impl Statement {
    pub fn pos(&self) -> Position {
        match self {
            Statement::Assign { pos, .. }
            | Statement::ProcedureCall { pos, .. }
            | Statement::While { pos, .. }
            | Statement::If { pos, .. }
            | Statement::Return { pos, .. } => *pos,
        }
    }
}

/// An `elsif` arm of an `if` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Elsif {
    pub pos: Position,
    pub cond: Expression,
    pub body: StatementList,
}
