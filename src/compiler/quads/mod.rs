/*!
 The quadruple intermediate representation and the lowering of a folded
 syntax tree into it.

 Every value an expression computes is given a symbol: variables and
 parameters stand for themselves and everything else is written into a
 temporary generated in the environment being lowered. Control flow uses
 label numbers drawn from the symbol table's label counter, so they never
 collide with the labels of callables.
 */
mod lower;
mod quad;


pub use lower::{lower, QuadGenerator};
pub use quad::{QuadArg, QuadList, QuadOp, Quadruple};
