/*!
 Constant folding: rewrites every subtree whose value is known at compile
 time into a literal. Runs after type checking, so it relies on the result
 types recorded on operator nodes and on the `Cast` nodes inserted by the
 type checker.
 */
use log::{debug, trace};
use stdext::function_name;

use crate::compiler::{
    ast::{Expression, Statement, StatementList, UnaryOperator},
    symtab::{ConstValue, SymId, SymbolKind, SymbolTable},
    InternalError, Position,
};


/// Fold the constants in the body of the callable `env`.
pub fn fold(
    symtab: &SymbolTable,
    env: SymId,
    body: &mut StatementList,
) -> Result<(), InternalError> {
    debug!("Folding constants in {}", symtab.name(env));
    ConstantFolder::new(symtab).fold_statements(body)
}

pub struct ConstantFolder<'a> {
    symtab: &'a SymbolTable,
}

impl<'a> ConstantFolder<'a> {
    pub fn new(symtab: &'a SymbolTable) -> ConstantFolder<'a> {
        ConstantFolder { symtab }
    }

    pub fn fold_statements(&self, stmts: &mut StatementList) -> Result<(), InternalError> {
        for stmt in stmts.iter_mut() {
            self.fold_statement(stmt)?;
        }
        Ok(())
    }

    pub fn fold_statement(&self, stmt: &mut Statement) -> Result<(), InternalError> {
        match stmt {
            Statement::Assign { target, value, .. } => {
                // The target is a location, only its index can be folded
                if let Expression::Indexed { index, .. } = target {
                    self.fold_expression(index)?;
                }
                self.fold_expression(value)
            }
            Statement::ProcedureCall { args, .. } => {
                for arg in args.iter_mut() {
                    self.fold_expression(arg)?;
                }
                Ok(())
            }
            Statement::While { cond, body, .. } => {
                self.fold_expression(cond)?;
                self.fold_statements(body)
            }
            Statement::If {
                cond,
                body,
                elsifs,
                otherwise,
                ..
            } => {
                self.fold_expression(cond)?;
                self.fold_statements(body)?;
                for elsif in elsifs.iter_mut() {
                    self.fold_expression(&mut elsif.cond)?;
                    self.fold_statements(&mut elsif.body)?;
                }
                match otherwise {
                    Some(stmts) => self.fold_statements(stmts),
                    None => Ok(()),
                }
            }
            Statement::Return { value, .. } => match value {
                Some(value) => self.fold_expression(value),
                None => Ok(()),
            },
        }
    }

    /// Fold an expression in place. Children are folded first, so a whole
    /// constant tree collapses into a single literal.
    pub fn fold_expression(&self, expr: &mut Expression) -> Result<(), InternalError> {
        let folded = match expr {
            Expression::Integer(..) | Expression::Real(..) => None,
            Expression::Identifier(pos, id) => match self.symtab.get_symbol(*id)?.kind {
                SymbolKind::Constant(value) => Some(literal(*pos, value)),
                _ => None,
            },
            Expression::Indexed { index, .. } => {
                self.fold_expression(index)?;
                None
            }
            Expression::FunctionCall { args, .. } => {
                for arg in args.iter_mut() {
                    self.fold_expression(arg)?;
                }
                None
            }
            Expression::Cast { pos, ty, expr } => {
                self.fold_expression(expr)?;
                match **expr {
                    Expression::Integer(_, v) if *ty == self.symtab.real_type() => {
                        Some(Expression::Real(*pos, v as f64))
                    }
                    _ => None,
                }
            }
            Expression::UnaryOp(pos, op, operand) => {
                self.fold_expression(operand)?;
                match (op, &**operand) {
                    (UnaryOperator::Negate, Expression::Integer(_, v)) => {
                        Some(Expression::Integer(*pos, v.wrapping_neg()))
                    }
                    (UnaryOperator::Negate, Expression::Real(_, v)) => {
                        Some(Expression::Real(*pos, -v))
                    }
                    (UnaryOperator::Not, Expression::Integer(_, v)) => {
                        Some(Expression::Integer(*pos, (*v == 0) as i64))
                    }
                    _ => None,
                }
            }
            Expression::BinaryOp {
                pos,
                op,
                ty,
                left,
                right,
            } => {
                self.fold_expression(left)?;
                self.fold_expression(right)?;
                match (&**left, &**right) {
                    (Expression::Integer(_, l), Expression::Integer(_, r))
                        if *ty == Some(self.symtab.integer_type()) =>
                    {
                        op.eval_int(*l, *r).map(|v| Expression::Integer(*pos, v))
                    }
                    (Expression::Real(_, l), Expression::Real(_, r))
                        if *ty == Some(self.symtab.real_type()) =>
                    {
                        op.eval_real(*l, *r).map(|v| Expression::Real(*pos, v))
                    }
                    _ => None,
                }
            }
            Expression::Relation {
                pos,
                op,
                operand_ty,
                left,
                right,
            } => {
                self.fold_expression(left)?;
                self.fold_expression(right)?;
                let holds = match (&**left, &**right) {
                    (Expression::Integer(_, l), Expression::Integer(_, r))
                        if *operand_ty == Some(self.symtab.integer_type()) =>
                    {
                        Some(op.eval_int(*l, *r))
                    }
                    (Expression::Real(_, l), Expression::Real(_, r))
                        if *operand_ty == Some(self.symtab.real_type()) =>
                    {
                        Some(op.eval_real(*l, *r))
                    }
                    _ => None,
                };
                holds.map(|h| Expression::Integer(*pos, h as i64))
            }
        };

        if let Some(folded) = folded {
            trace!("{}: {:?}", function_name!(), folded);
            *expr = folded;
        }
        Ok(())
    }
}

fn literal(pos: Position, value: ConstValue) -> Expression {
    match value {
        ConstValue::Integer(i) => Expression::Integer(pos, i),
        ConstValue::Real(r) => Expression::Real(pos, r),
    }
}
