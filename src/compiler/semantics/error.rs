use std::fmt::Display;

use crate::compiler::ast::{BinaryOperator, RelationOperator};

/// Which operand of a binary operator is at fault.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Side {
    Left,
    Right,
    Both,
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Side::Left => "Left side",
            Side::Right => "Right side",
            Side::Both => "Both sides",
        })
    }
}

/// Errors generated during semantic analysis of a compilation unit. None of
/// these stop the compilation; each is reported and analysis continues.
#[derive(Clone, Debug, PartialEq)]
pub enum SemanticError {
    Redeclaration(String),
    InvalidIndexType,
    WhilePredicate,
    IfPredicate,
    ElsifPredicate,
    ProcedureReturnsValue,
    FunctionBadReturnType,
    FunctionNoReturnValue,
    FunctionMustReturn,
    NotInvalidType,
    NegateInvalidType,
    OperandsInvalidType(BinaryOperator),
    ExpectedInteger(BinaryOperator, Side),
    RelationVoid(RelationOperator),
    RelationInvalidType(RelationOperator),
    AssignError,
    AssignInvalidType,
    ParameterError(String),
}

impl Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticError::Redeclaration(name) => {
                f.write_fmt(format_args!("Redeclaration: {}", name))
            }
            SemanticError::InvalidIndexType => f.write_str("Index of an array must be an integer"),
            SemanticError::WhilePredicate => {
                f.write_str("Condition of a while statement must be an integer")
            }
            SemanticError::IfPredicate => {
                f.write_str("Condition of an if statement must be an integer")
            }
            SemanticError::ElsifPredicate => {
                f.write_str("Condition of an elsif arm must be an integer")
            }
            SemanticError::ProcedureReturnsValue => {
                f.write_str("A procedure cannot return a value")
            }
            SemanticError::FunctionBadReturnType => {
                f.write_str("Returned value does not match the function's type")
            }
            SemanticError::FunctionNoReturnValue => {
                f.write_str("A function must return a value when it returns")
            }
            SemanticError::FunctionMustReturn => f.write_str("A function must return a value."),
            SemanticError::NotInvalidType => f.write_str("Operand of not must be an integer"),
            SemanticError::NegateInvalidType => {
                f.write_str("Operand of unary minus must be an integer or a real")
            }
            SemanticError::OperandsInvalidType(op) => f.write_fmt(format_args!(
                "Operands of {} must be integers or reals",
                op
            )),
            SemanticError::ExpectedInteger(op, side) => f.write_fmt(format_args!(
                "{} of {} must be of integer type",
                side, op
            )),
            SemanticError::RelationVoid(op) => {
                f.write_fmt(format_args!("Operand of {} cannot be void", op))
            }
            SemanticError::RelationInvalidType(op) => f.write_fmt(format_args!(
                "Operands of {} cannot be compared",
                op
            )),
            SemanticError::AssignError => f.write_str("Cannot assign real values to integers"),
            SemanticError::AssignInvalidType => {
                f.write_str("Type of the assigned value does not match the target")
            }
            SemanticError::ParameterError(name) => f.write_fmt(format_args!(
                "Type error of parameters in function/procedure {}",
                name
            )),
        }
    }
}
