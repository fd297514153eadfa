/*!
 The compiler backend for Ember: the language of nested procedures and
 functions over `integer` and `real` values.

 A compilation unit flows through these stages, one callable at a time,
 once the callable's declarations are complete:

 1. The [`symtab`] is populated with the callable's declarations (done by
    the front end or by the [`crate::project`] loader).
 2. [`semantics`] type checks the body, inserting `Cast` nodes where an
    integer is widened to a real.
 3. [`optimize`] folds constant subtrees into literals.
 4. [`quads`] lowers the folded tree into a flat list of quadruples.
 5. [`codegen`] expands the quadruples into x86-64 assembly.

 Errors come in three tiers. Recoverable [`semantics::SemanticError`]s are
 collected by the [`diagnostics`] sink and suppress emission of the unit.
 [`LimitError`]s mean a configured capacity was exceeded and
 [`InternalError`]s mean an invariant of the compiler itself was broken;
 both abort the compilation through [`FatalError`].
 */
pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod optimize;
pub mod quads;
pub mod semantics;
pub mod stringpool;
pub mod symtab;
pub mod x86;

mod compilation;
mod config;
mod error;
mod position;

pub use compilation::Compilation;
pub use config::{CompilerConfig, TableLimits};
pub use error::{CompilerError, FatalError, InternalError, LimitError};
pub use position::Position;
