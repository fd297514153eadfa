/*!
 Semantic analysis of a callable's body. Determines the type of every
 expression, checks that the types match the restrictions of the language,
 and inserts the implicit conversions from integer to real.
 */
mod error;
mod type_checker;

#[cfg(test)]
mod tests;

pub use error::{SemanticError, Side};
pub use type_checker::{type_check, TypeChecker};
