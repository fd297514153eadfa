use std::fmt::Display;

use super::{symtab::SymId, Position};

/// Represents all errors that are generated from within the Compiler
/// module and its submodules and that can be traced back to the input.
///
/// This type captures the metadata which is common to all such errors,
/// the position in the source where the error was found (when the front end
/// provided one), and handles formatting it along with the inner error.
///
/// The inner error is specific to the submodule which raised it. E.g. the
/// type checker stores a [`SemanticError`](super::semantics::SemanticError)
/// in the `inner` field.
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerError<IE> {
    pos: Option<Position>,
    inner: IE,
}

impl<IE> CompilerError<IE> {
    pub fn new(pos: Option<Position>, inner: IE) -> Self {
        CompilerError { pos, inner }
    }

    pub fn inner(&self) -> &IE {
        &self.inner
    }

    pub fn into_inner(self) -> IE {
        self.inner
    }

    pub fn position(&self) -> Option<Position> {
        self.pos
    }

    pub fn line(&self) -> Option<u32> {
        self.pos.map(|p| p.line)
    }
}

impl<IE: Display> Display for CompilerError<IE> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.pos {
            Some(pos) => f.write_fmt(format_args!("{}: {}", pos, self.inner)),
            None => f.write_fmt(format_args!("{}", self.inner)),
        }
    }
}

/// A configured capacity of the compiler was exceeded. The unit cannot
/// be compiled without raising the limit.
#[derive(Clone, Debug, PartialEq)]
pub enum LimitError {
    StringTooLong(usize),
    PoolExhausted(usize),
    TableFull(usize),
    NestingTooDeep(usize),
    TooManyTemporaries(usize),
}

impl Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitError::StringTooLong(len) => f.write_fmt(format_args!(
                "String of {} bytes exceeds the 255 byte limit of the string pool",
                len
            )),
            LimitError::PoolExhausted(max) => {
                f.write_fmt(format_args!("String pool exhausted ({} bytes)", max))
            }
            LimitError::TableFull(max) => {
                f.write_fmt(format_args!("Symbol table full ({} symbols)", max))
            }
            LimitError::NestingTooDeep(max) => f.write_fmt(format_args!(
                "Blocks nested deeper than the maximum of {}",
                max
            )),
            LimitError::TooManyTemporaries(max) => f.write_fmt(format_args!(
                "More than {} temporary variables generated",
                max
            )),
        }
    }
}

/// An invariant of the compiler was violated. These cannot be caused by
/// well formed input and always abort the compilation.
#[derive(Clone, Debug, PartialEq)]
pub enum InternalError {
    UnknownSymbol(SymId),
    NotCallable(SymId),
    NotArray(SymId),
    InvalidTypeSize(SymId),
    UnsupportedAddress(SymId),
    ConstantFetch(SymId),
    VoidTemporary,
    TemporaryClash(SymId),
    UntypedExpression,
    InvalidAssignTarget,
    ParameterOutsideRoutine(SymId),
    ScopeUnderflow,
    NopQuad(usize),
    MissingOperand(usize),
}

impl Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InternalError::UnknownSymbol(id) => {
                f.write_fmt(format_args!("Symbol {} is not in the symbol table", id))
            }
            InternalError::NotCallable(id) => {
                f.write_fmt(format_args!("Symbol {} is not a procedure or function", id))
            }
            InternalError::NotArray(id) => {
                f.write_fmt(format_args!("Symbol {} is not an array", id))
            }
            InternalError::InvalidTypeSize(id) => {
                f.write_fmt(format_args!("Cannot compute the size of type {}", id))
            }
            InternalError::UnsupportedAddress(id) => f.write_fmt(format_args!(
                "Symbol {} does not have a frame address",
                id
            )),
            InternalError::ConstantFetch(id) => f.write_fmt(format_args!(
                "Constant {} cannot be fetched into a register",
                id
            )),
            InternalError::VoidTemporary => {
                f.write_str("Cannot generate a temporary of type void")
            }
            InternalError::TemporaryClash(id) => f.write_fmt(format_args!(
                "Temporary {} is already declared in this scope",
                id
            )),
            InternalError::UntypedExpression => {
                f.write_str("Expression reached code generation without a type")
            }
            InternalError::InvalidAssignTarget => {
                f.write_str("Target of an assignment must be a variable or an array element")
            }
            InternalError::ParameterOutsideRoutine(id) => f.write_fmt(format_args!(
                "Parameter {} declared outside of a procedure or function",
                id
            )),
            InternalError::ScopeUnderflow => f.write_str("Closed more scopes than were opened"),
            InternalError::NopQuad(idx) => {
                f.write_fmt(format_args!("Quad {} is a nop and cannot be expanded", idx))
            }
            InternalError::MissingOperand(idx) => {
                f.write_fmt(format_args!("Quad {} is missing an operand", idx))
            }
        }
    }
}

/// Any error which stops the compilation of a unit.
#[derive(Debug)]
pub enum FatalError {
    Limit(LimitError),
    Internal(InternalError),
    Io(std::io::Error),
}

impl Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FatalError::Limit(le) => f.write_fmt(format_args!("Limit exceeded: {}", le)),
            FatalError::Internal(ie) => f.write_fmt(format_args!("Internal error: {}", ie)),
            FatalError::Io(ioe) => f.write_fmt(format_args!("IO error: {}", ioe)),
        }
    }
}

impl From<LimitError> for FatalError {
    fn from(le: LimitError) -> Self {
        FatalError::Limit(le)
    }
}

impl From<InternalError> for FatalError {
    fn from(ie: InternalError) -> Self {
        FatalError::Internal(ie)
    }
}

impl From<std::io::Error> for FatalError {
    fn from(ioe: std::io::Error) -> Self {
        FatalError::Io(ioe)
    }
}
