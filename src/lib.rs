pub mod result;

pub mod cli;
pub mod compiler;
pub mod project;

pub use cli::*;
pub use compiler::{
    stringpool::{PoolIndex, StringPool},
    symtab::{SymId, SymbolTable},
    Compilation, CompilerConfig, FatalError,
};
pub use project::{compile_unit, load_unit, read_unit, LoadError, Unit};
