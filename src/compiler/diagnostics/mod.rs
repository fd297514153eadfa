use log::warn;

use super::{semantics::SemanticError, CompilerError};

/// Receives the recoverable errors found while compiling a unit. Reporting
/// an error never stops the compiler, so a single run can find every error
/// in the unit.
pub trait Diagnostics {
    fn report(&mut self, error: CompilerError<SemanticError>);

    fn error_count(&self) -> usize;

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// A [`Diagnostics`] sink which logs every error as it is reported and
/// keeps them for the driver to print.
#[derive(Debug, Default)]
pub struct ErrorLog {
    errors: Vec<CompilerError<SemanticError>>,
}

impl ErrorLog {
    pub fn new() -> ErrorLog {
        ErrorLog { errors: vec![] }
    }

    pub fn errors(&self) -> &[CompilerError<SemanticError>] {
        &self.errors
    }

    /// Returns true if any reported error has the given kind.
    pub fn contains(&self, kind: &SemanticError) -> bool {
        self.errors.iter().any(|e| e.inner() == kind)
    }
}

impl Diagnostics for ErrorLog {
    fn report(&mut self, error: CompilerError<SemanticError>) {
        warn!("{}", error);
        self.errors.push(error);
    }

    fn error_count(&self) -> usize {
        self.errors.len()
    }
}
