use log::{debug, trace};
use stdext::function_name;

use crate::compiler::{
    ast::{
        BinaryOperator, Expression, ExpressionList, RelationOperator, Statement, StatementList,
        UnaryOperator,
    },
    symtab::{ConstValue, SymId, SymbolKind, SymbolTable},
    FatalError, InternalError,
};

use super::{QuadArg, QuadList, QuadOp, Quadruple};

/// Lower the type checked and folded body of the callable `env`.
///
/// `env` must be the current environment of `symtab`: the temporaries the
/// body needs are allocated in its activation record.
pub fn lower(
    symtab: &mut SymbolTable,
    env: SymId,
    body: &StatementList,
) -> Result<QuadList, FatalError> {
    debug!("Lowering {}", symtab.name(env));
    let mut gen = QuadGenerator::new(symtab);
    gen.lower_statements(body)?;
    Ok(gen.finish())
}

pub struct QuadGenerator<'a> {
    symtab: &'a mut SymbolTable,
    quads: QuadList,
}

impl<'a> QuadGenerator<'a> {
    pub fn new(symtab: &'a mut SymbolTable) -> QuadGenerator<'a> {
        let last_label = symtab.get_next_label();
        QuadGenerator {
            symtab,
            quads: QuadList::new(last_label),
        }
    }

    /// Close the list with the label every return jumps to.
    pub fn finish(mut self) -> QuadList {
        let last = self.quads.last_label();
        self.emit(QuadOp::Labl, QuadArg::Int(last), QuadArg::Unused, QuadArg::Unused);
        self.quads
    }

    fn emit(&mut self, op: QuadOp, arg1: QuadArg, arg2: QuadArg, arg3: QuadArg) {
        let quad = Quadruple::new(op, arg1, arg2, arg3);
        trace!("{}: {}", function_name!(), quad);
        self.quads.push(quad);
    }

    fn is_real(&self, ty: SymId) -> bool {
        ty == self.symtab.real_type()
    }

    pub fn lower_statements(&mut self, stmts: &StatementList) -> Result<(), FatalError> {
        for stmt in stmts {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    pub fn lower_statement(&mut self, stmt: &Statement) -> Result<(), FatalError> {
        match stmt {
            Statement::Assign { target, value, .. } => {
                let value_ty = self.type_of(value)?;
                let value = self.lower_expression(value)?;
                match target {
                    Expression::Identifier(_, id) => {
                        let op = if self.is_real(value_ty) {
                            QuadOp::Rassign
                        } else {
                            QuadOp::Iassign
                        };
                        self.emit(op, QuadArg::Sym(value), QuadArg::Unused, QuadArg::Sym(*id));
                    }
                    Expression::Indexed { array, index, .. } => {
                        let index = self.lower_expression(index)?;
                        let int = self.symtab.integer_type();
                        let address = self.symtab.gen_temp_var(int)?;
                        self.emit(
                            QuadOp::Lindex,
                            QuadArg::Sym(*array),
                            QuadArg::Sym(index),
                            QuadArg::Sym(address),
                        );
                        let op = if self.is_real(value_ty) {
                            QuadOp::Rstore
                        } else {
                            QuadOp::Istore
                        };
                        self.emit(
                            op,
                            QuadArg::Sym(value),
                            QuadArg::Unused,
                            QuadArg::Sym(address),
                        );
                    }
                    _ => return Err(InternalError::InvalidAssignTarget.into()),
                }
                Ok(())
            }
            Statement::ProcedureCall { routine, args, .. } => {
                let nparams = self.lower_params(args)?;
                self.emit(
                    QuadOp::Call,
                    QuadArg::Sym(*routine),
                    QuadArg::Int(nparams),
                    QuadArg::Unused,
                );
                Ok(())
            }
            Statement::While { cond, body, .. } => {
                let top = self.symtab.get_next_label();
                let exit = self.symtab.get_next_label();
                self.label(top);
                self.jump_if_false(cond, exit)?;
                self.lower_statements(body)?;
                self.jump(top);
                self.label(exit);
                Ok(())
            }
            Statement::If {
                cond,
                body,
                elsifs,
                otherwise,
                ..
            } => {
                let end = self.symtab.get_next_label();

                let mut next = self.symtab.get_next_label();
                self.jump_if_false(cond, next)?;
                self.lower_statements(body)?;
                self.jump(end);

                for elsif in elsifs {
                    self.label(next);
                    next = self.symtab.get_next_label();
                    self.jump_if_false(&elsif.cond, next)?;
                    self.lower_statements(&elsif.body)?;
                    self.jump(end);
                }

                self.label(next);
                if let Some(otherwise) = otherwise {
                    self.lower_statements(otherwise)?;
                }
                self.label(end);
                Ok(())
            }
            Statement::Return { value, .. } => {
                let last = self.quads.last_label();
                match value {
                    Some(value) => {
                        let ty = self.type_of(value)?;
                        let value = self.lower_expression(value)?;
                        let op = if self.is_real(ty) {
                            QuadOp::Rreturn
                        } else {
                            QuadOp::Ireturn
                        };
                        self.emit(op, QuadArg::Int(last), QuadArg::Sym(value), QuadArg::Unused);
                    }
                    None => self.jump(last),
                }
                Ok(())
            }
        }
    }

    fn label(&mut self, label: i64) {
        self.emit(QuadOp::Labl, QuadArg::Int(label), QuadArg::Unused, QuadArg::Unused);
    }

    fn jump(&mut self, label: i64) {
        self.emit(QuadOp::Jmp, QuadArg::Int(label), QuadArg::Unused, QuadArg::Unused);
    }

    fn jump_if_false(&mut self, cond: &Expression, label: i64) -> Result<(), FatalError> {
        let cond = self.lower_expression(cond)?;
        self.emit(QuadOp::Jmpf, QuadArg::Int(label), QuadArg::Sym(cond), QuadArg::Unused);
        Ok(())
    }

    /// Evaluate all arguments, then pass them in declaration order. Returns
    /// the number of parameters passed.
    fn lower_params(&mut self, args: &ExpressionList) -> Result<i64, FatalError> {
        let mut values = vec![];
        for arg in args {
            values.push(self.lower_expression(arg)?);
        }
        for value in &values {
            self.emit(QuadOp::Param, QuadArg::Sym(*value), QuadArg::Unused, QuadArg::Unused);
        }
        Ok(values.len() as i64)
    }

    /// The type of the value an expression computes.
    fn type_of(&self, expr: &Expression) -> Result<SymId, InternalError> {
        match expr {
            Expression::Integer(..) | Expression::Relation { .. } => Ok(self.symtab.integer_type()),
            Expression::Real(..) => Ok(self.symtab.real_type()),
            Expression::Identifier(_, id)
            | Expression::Indexed { array: id, .. }
            | Expression::FunctionCall { function: id, .. } => self.symtab.get_symbol_type(*id),
            Expression::Cast { ty, .. } => Ok(*ty),
            Expression::UnaryOp(_, _, operand) => self.type_of(operand),
            Expression::BinaryOp { ty, .. } => ty.ok_or(InternalError::UntypedExpression),
        }
    }

    /// Lower an expression and return the symbol holding its value.
    pub fn lower_expression(&mut self, expr: &Expression) -> Result<SymId, FatalError> {
        match expr {
            Expression::Integer(_, v) => self.load(ConstValue::Integer(*v)),
            Expression::Real(_, v) => self.load(ConstValue::Real(*v)),
            Expression::Identifier(_, id) => {
                let kind = self.symtab.get_symbol(*id)?.kind;
                match kind {
                    SymbolKind::Variable | SymbolKind::Parameter { .. } => Ok(*id),
                    SymbolKind::Constant(value) => self.load(value),
                    _ => Err(InternalError::UnsupportedAddress(*id).into()),
                }
            }
            Expression::Indexed { array, index, .. } => {
                let ty = self.symtab.get_symbol_type(*array)?;
                let index = self.lower_expression(index)?;
                let dest = self.symtab.gen_temp_var(ty)?;
                let op = if self.is_real(ty) {
                    QuadOp::Rrindex
                } else {
                    QuadOp::Irindex
                };
                self.emit(op, QuadArg::Sym(*array), QuadArg::Sym(index), QuadArg::Sym(dest));
                Ok(dest)
            }
            Expression::FunctionCall { function, args, .. } => {
                let ty = self.symtab.get_symbol_type(*function)?;
                let nparams = self.lower_params(args)?;
                let dest = self.symtab.gen_temp_var(ty)?;
                self.emit(
                    QuadOp::Call,
                    QuadArg::Sym(*function),
                    QuadArg::Int(nparams),
                    QuadArg::Sym(dest),
                );
                Ok(dest)
            }
            Expression::Cast { ty, expr, .. } => {
                let src = self.lower_expression(expr)?;
                let dest = self.symtab.gen_temp_var(*ty)?;
                self.emit(QuadOp::Itor, QuadArg::Sym(src), QuadArg::Unused, QuadArg::Sym(dest));
                Ok(dest)
            }
            Expression::UnaryOp(_, op, operand) => {
                let ty = self.type_of(operand)?;
                let src = self.lower_expression(operand)?;
                let dest = self.symtab.gen_temp_var(ty)?;
                let op = match op {
                    UnaryOperator::Not => QuadOp::Inot,
                    UnaryOperator::Negate if self.is_real(ty) => QuadOp::Ruminus,
                    UnaryOperator::Negate => QuadOp::Iuminus,
                };
                self.emit(op, QuadArg::Sym(src), QuadArg::Unused, QuadArg::Sym(dest));
                Ok(dest)
            }
            Expression::BinaryOp {
                op, ty, left, right, ..
            } => {
                let ty = ty.ok_or(InternalError::UntypedExpression)?;
                let left = self.lower_expression(left)?;
                let right = self.lower_expression(right)?;
                let dest = self.symtab.gen_temp_var(ty)?;
                let op = binary_op(*op, self.is_real(ty));
                self.emit(op, QuadArg::Sym(left), QuadArg::Sym(right), QuadArg::Sym(dest));
                Ok(dest)
            }
            Expression::Relation {
                op,
                operand_ty,
                left,
                right,
                ..
            } => {
                let operand_ty = operand_ty.ok_or(InternalError::UntypedExpression)?;
                let left = self.lower_expression(left)?;
                let right = self.lower_expression(right)?;
                let int = self.symtab.integer_type();
                let dest = self.symtab.gen_temp_var(int)?;
                let op = relation_op(*op, self.is_real(operand_ty));
                self.emit(op, QuadArg::Sym(left), QuadArg::Sym(right), QuadArg::Sym(dest));
                Ok(dest)
            }
        }
    }

    /// Load a literal into a fresh temporary. Reals travel as their bit
    /// pattern.
    fn load(&mut self, value: ConstValue) -> Result<SymId, FatalError> {
        let (op, ty, bits) = match value {
            ConstValue::Integer(i) => (QuadOp::Iload, self.symtab.integer_type(), i),
            ConstValue::Real(r) => (QuadOp::Rload, self.symtab.real_type(), SymbolTable::ieee(r)),
        };
        let dest = self.symtab.gen_temp_var(ty)?;
        self.emit(op, QuadArg::Int(bits), QuadArg::Unused, QuadArg::Sym(dest));
        Ok(dest)
    }
}

fn binary_op(op: BinaryOperator, real: bool) -> QuadOp {
    match (op, real) {
        (BinaryOperator::Add, true) => QuadOp::Rplus,
        (BinaryOperator::Add, false) => QuadOp::Iplus,
        (BinaryOperator::Sub, true) => QuadOp::Rminus,
        (BinaryOperator::Sub, false) => QuadOp::Iminus,
        (BinaryOperator::Mult, true) => QuadOp::Rmult,
        (BinaryOperator::Mult, false) => QuadOp::Imult,
        (BinaryOperator::Divide, _) => QuadOp::Rdivide,
        (BinaryOperator::Idiv, _) => QuadOp::Idivide,
        (BinaryOperator::Mod, _) => QuadOp::Imod,
        (BinaryOperator::And, _) => QuadOp::Iand,
        (BinaryOperator::Or, _) => QuadOp::Ior,
    }
}

fn relation_op(op: RelationOperator, real: bool) -> QuadOp {
    match (op, real) {
        (RelationOperator::Eq, true) => QuadOp::Req,
        (RelationOperator::Eq, false) => QuadOp::Ieq,
        (RelationOperator::Ne, true) => QuadOp::Rne,
        (RelationOperator::Ne, false) => QuadOp::Ine,
        (RelationOperator::Lt, true) => QuadOp::Rlt,
        (RelationOperator::Lt, false) => QuadOp::Ilt,
        (RelationOperator::Gt, true) => QuadOp::Rgt,
        (RelationOperator::Gt, false) => QuadOp::Igt,
    }
}
