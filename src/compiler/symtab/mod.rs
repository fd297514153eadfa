/*!
 The scoped symbol table: every named entity of a compilation unit, the
 string pool holding their names, the hash table used to resolve names in
 the innermost visible scope, and the layout of each callable's activation
 record.
 */
mod dump;
mod symbol;
mod table;


pub use dump::DumpDetail;
pub use symbol::{ConstValue, Routine, SymId, SymTag, Symbol, SymbolKind};
pub use table::{Installed, SymbolTable, ILLEGAL_ARRAY_CARD, STACK_WIDTH};
