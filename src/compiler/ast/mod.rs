/*!
 The syntax tree of a callable's body. Parents own their children, and the
 later stages rewrite the tree in place by moving a replacement node into
 the parent's slot.
 */
mod expression;
mod statement;

pub use expression::{
    BinaryOperator, Expression, ExpressionList, RelationOperator, UnaryOperator,
};
pub use statement::{Elsif, ElsifList, Statement, StatementList};
