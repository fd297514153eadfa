/*!
 Compilation units described as data. A [`Unit`] is read from a YAML or a
 JSON document and [`load_unit`] feeds it through the compiler as a parser
 would: declarations are entered into the symbol table, names are resolved
 to symbols, and every callable is compiled once its declarations are
 complete. [`compile_unit`] does the same but keeps the assembly back
 until the unit is known to be free of errors.
 */
mod loader;
mod unit;


pub use loader::{compile_unit, load_unit, LoadError};
pub use unit::{
    ArrayDecl, Block, ConstDecl, Literal, RoutineDecl, SourceElsif, SourceExpr, SourceStatement,
    read_unit, Unit, VarDecl,
};
