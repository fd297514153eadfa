use log::{debug, trace};
use stdext::function_name;

use crate::compiler::{
    ast::{
        BinaryOperator, Elsif, Expression, ExpressionList, RelationOperator, Statement,
        StatementList, UnaryOperator,
    },
    diagnostics::Diagnostics,
    symtab::{SymId, SymTag, SymbolKind, SymbolTable},
    CompilerError, InternalError, Position,
};

use super::error::{SemanticError, Side};

/// The type checker only fails on an internal error. Type errors in the
/// input are reported to the diagnostics sink and the offending node is
/// given the type `void`.
type TypeResult = Result<SymId, InternalError>;

/// Type check the body of the callable `env`.
pub fn type_check(
    symtab: &SymbolTable,
    diag: &mut dyn Diagnostics,
    env: SymId,
    body: &mut StatementList,
) -> Result<(), InternalError> {
    let mut checker = TypeChecker::new(symtab, diag, env);
    checker.check_body(body)
}

/// Computes the type of every node in a body and checks that the types are
/// used correctly. Where an integer is used in a real context, the checker
/// wraps it in a `Cast` to real.
pub struct TypeChecker<'a> {
    symtab: &'a SymbolTable,
    diag: &'a mut dyn Diagnostics,

    /// The procedure or function whose body is being checked.
    env: SymId,

    /// Set when a `return` statement is found in the body.
    has_return: bool,
}

impl<'a> TypeChecker<'a> {
    pub fn new(
        symtab: &'a SymbolTable,
        diag: &'a mut dyn Diagnostics,
        env: SymId,
    ) -> TypeChecker<'a> {
        TypeChecker {
            symtab,
            diag,
            env,
            has_return: false,
        }
    }

    pub fn check_body(&mut self, body: &mut StatementList) -> Result<(), InternalError> {
        debug!("Type checking {}", self.symtab.name(self.env));
        self.has_return = false;

        self.check_statements(body)?;

        let symtab = self.symtab;
        let env = symtab.get_symbol(self.env)?;
        if env.tag() == SymTag::Function && !self.has_return {
            self.report(env.pos, SemanticError::FunctionMustReturn);
        }
        Ok(())
    }

    fn report(&mut self, pos: Option<Position>, error: SemanticError) {
        self.diag.report(CompilerError::new(pos, error))
    }

    fn int(&self) -> SymId {
        self.symtab.integer_type()
    }

    fn real(&self) -> SymId {
        self.symtab.real_type()
    }

    fn void(&self) -> SymId {
        self.symtab.void_type()
    }

    fn is_numeric(&self, ty: SymId) -> bool {
        ty == self.int() || ty == self.real()
    }

    fn check_statements(&mut self, stmts: &mut StatementList) -> Result<(), InternalError> {
        for stmt in stmts.iter_mut() {
            self.check_statement(stmt)?;
        }
        Ok(())
    }

    pub fn check_statement(&mut self, stmt: &mut Statement) -> Result<(), InternalError> {
        match stmt {
            Statement::Assign { pos, target, value } => self.check_assign(*pos, target, value),
            Statement::ProcedureCall { pos, routine, args } => {
                self.check_parameters(*pos, *routine, args)
            }
            Statement::While { pos, cond, body } => {
                if self.check_expression(cond)? != self.int() {
                    self.report(Some(*pos), SemanticError::WhilePredicate);
                }
                self.check_statements(body)
            }
            Statement::If {
                pos,
                cond,
                body,
                elsifs,
                otherwise,
            } => {
                if self.check_expression(cond)? != self.int() {
                    self.report(Some(*pos), SemanticError::IfPredicate);
                }
                self.check_statements(body)?;
                for elsif in elsifs.iter_mut() {
                    self.check_elsif(elsif)?;
                }
                match otherwise {
                    Some(stmts) => self.check_statements(stmts),
                    None => Ok(()),
                }
            }
            Statement::Return { pos, value } => self.check_return(*pos, value.as_mut()),
        }
    }

    fn check_elsif(&mut self, elsif: &mut Elsif) -> Result<(), InternalError> {
        if self.check_expression(&mut elsif.cond)? != self.int() {
            self.report(Some(elsif.pos), SemanticError::ElsifPredicate);
        }
        self.check_statements(&mut elsif.body)
    }

    fn check_assign(
        &mut self,
        pos: Position,
        target: &mut Expression,
        value: &mut Expression,
    ) -> Result<(), InternalError> {
        let lty = self.check_expression(target)?;
        let rty = self.check_expression(value)?;

        if lty == rty {
            // Nothing to do
        } else if lty == self.int() && rty == self.real() {
            self.report(Some(pos), SemanticError::AssignError);
        } else if lty == self.real() && rty == self.int() {
            value.cast_to(self.real());
        } else {
            self.report(Some(pos), SemanticError::AssignInvalidType);
        }
        Ok(())
    }

    fn check_return(
        &mut self,
        pos: Position,
        value: Option<&mut Expression>,
    ) -> Result<(), InternalError> {
        self.has_return = true;

        let symtab = self.symtab;
        let env = symtab.get_symbol(self.env)?;
        match value {
            None => {
                if env.tag() == SymTag::Function {
                    self.report(Some(pos), SemanticError::FunctionNoReturnValue);
                }
            }
            Some(value) => {
                let ty = self.check_expression(value)?;
                if env.tag() != SymTag::Function {
                    self.report(Some(pos), SemanticError::ProcedureReturnsValue);
                } else if ty != env.ty {
                    self.report(Some(pos), SemanticError::FunctionBadReturnType);
                }
            }
        }
        Ok(())
    }

    /// Check the actual parameters of a call against the formal parameters
    /// of `callee`. Both lists are walked from their last element back to
    /// their first; an integer actual passed for a real formal is cast. Any
    /// other mismatch, including a different number of parameters, fails
    /// the whole call with a single error.
    fn check_parameters(
        &mut self,
        pos: Position,
        callee: SymId,
        args: &mut ExpressionList,
    ) -> Result<(), InternalError> {
        let symtab = self.symtab;
        let routine = symtab.get_routine(callee)?;

        let mut actual_types = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            actual_types.push(self.check_expression(arg)?);
        }

        let mut formal = routine.last_parameter;
        let mut remaining = args.len();
        let matches = loop {
            match (formal, remaining) {
                (None, 0) => break true,
                (None, _) | (Some(_), 0) => break false,
                (Some(param), n) => {
                    let param = symtab.get_symbol(param)?;
                    let actual = actual_types[n - 1];
                    if param.ty == actual {
                        // Nothing to do
                    } else if param.ty == self.real() && actual == self.int() {
                        args[n - 1].cast_to(self.real());
                    } else {
                        break false;
                    }

                    formal = match param.kind {
                        SymbolKind::Parameter { preceding, .. } => preceding,
                        _ => None,
                    };
                    remaining = n - 1;
                }
            }
        };

        if !matches {
            self.report(
                Some(pos),
                SemanticError::ParameterError(symtab.name(callee).into()),
            );
        }
        Ok(())
    }

    pub fn check_expression(&mut self, expr: &mut Expression) -> TypeResult {
        let ty = match expr {
            Expression::Integer(..) => self.int(),
            Expression::Real(..) => self.real(),
            Expression::Identifier(_, id) => {
                let sym = self.symtab.get_symbol(*id)?;
                if sym.tag() == SymTag::NameType {
                    *id
                } else {
                    sym.ty
                }
            }
            Expression::Indexed { pos, array, index } => {
                if self.check_expression(index)? != self.int() {
                    self.report(Some(*pos), SemanticError::InvalidIndexType);
                }
                self.symtab.get_symbol_type(*array)?
            }
            Expression::FunctionCall {
                pos,
                function,
                args,
            } => {
                self.check_parameters(*pos, *function, args)?;
                self.symtab.get_symbol_type(*function)?
            }
            Expression::Cast { ty, expr, .. } => {
                self.check_expression(expr)?;
                *ty
            }
            Expression::UnaryOp(pos, op, operand) => {
                let ty = self.check_expression(operand)?;
                match op {
                    UnaryOperator::Negate if self.is_numeric(ty) => ty,
                    UnaryOperator::Negate => {
                        self.report(Some(*pos), SemanticError::NegateInvalidType);
                        self.void()
                    }
                    UnaryOperator::Not if ty == self.int() => ty,
                    UnaryOperator::Not => {
                        self.report(Some(*pos), SemanticError::NotInvalidType);
                        self.void()
                    }
                }
            }
            Expression::BinaryOp {
                pos,
                op,
                ty,
                left,
                right,
            } => {
                let lty = self.check_expression(left)?;
                let rty = self.check_expression(right)?;
                let result = match op {
                    BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mult => {
                        self.unify_arithmetic(*pos, *op, (lty, &mut **left), (rty, &mut **right))
                    }
                    BinaryOperator::Divide => {
                        self.unify_divide(*pos, *op, (lty, &mut **left), (rty, &mut **right))
                    }
                    BinaryOperator::Idiv
                    | BinaryOperator::Mod
                    | BinaryOperator::And
                    | BinaryOperator::Or => self.check_integer_operands(*pos, *op, lty, rty),
                };
                *ty = Some(result);
                result
            }
            Expression::Relation {
                pos,
                op,
                operand_ty,
                left,
                right,
            } => {
                let lty = self.check_expression(left)?;
                let rty = self.check_expression(right)?;
                match self.unify_relation(*pos, *op, (lty, &mut **left), (rty, &mut **right)) {
                    Some(unified) => {
                        *operand_ty = Some(unified);
                        self.int()
                    }
                    None => self.void(),
                }
            }
        };

        trace!("{}: {:?} -> {}", function_name!(), expr.pos(), ty);
        Ok(ty)
    }

    /// Addition, subtraction and multiplication. Integer operands give an
    /// integer; a mix of integer and real operands gives a real, with the
    /// integer side cast.
    fn unify_arithmetic(
        &mut self,
        pos: Position,
        op: BinaryOperator,
        (lty, left): (SymId, &mut Expression),
        (rty, right): (SymId, &mut Expression),
    ) -> SymId {
        if lty == self.int() && rty == self.int() {
            self.int()
        } else if self.is_numeric(lty) && self.is_numeric(rty) {
            self.cast_integer_sides((lty, left), (rty, right));
            self.real()
        } else {
            self.report(Some(pos), SemanticError::OperandsInvalidType(op));
            self.void()
        }
    }

    /// Division with `/` always gives a real.
    fn unify_divide(
        &mut self,
        pos: Position,
        op: BinaryOperator,
        (lty, left): (SymId, &mut Expression),
        (rty, right): (SymId, &mut Expression),
    ) -> SymId {
        if self.is_numeric(lty) && self.is_numeric(rty) {
            self.cast_integer_sides((lty, left), (rty, right));
            self.real()
        } else {
            self.report(Some(pos), SemanticError::OperandsInvalidType(op));
            self.void()
        }
    }

    fn check_integer_operands(
        &mut self,
        pos: Position,
        op: BinaryOperator,
        lty: SymId,
        rty: SymId,
    ) -> SymId {
        let side = match (lty == self.int(), rty == self.int()) {
            (true, true) => return self.int(),
            (false, true) => Side::Left,
            (true, false) => Side::Right,
            (false, false) => Side::Both,
        };
        self.report(Some(pos), SemanticError::ExpectedInteger(op, side));
        self.void()
    }

    /// Returns the type the operands are compared at, or `None` if they
    /// cannot be compared.
    fn unify_relation(
        &mut self,
        pos: Position,
        op: RelationOperator,
        (lty, left): (SymId, &mut Expression),
        (rty, right): (SymId, &mut Expression),
    ) -> Option<SymId> {
        if lty == self.void() || rty == self.void() {
            self.report(Some(pos), SemanticError::RelationVoid(op));
            None
        } else if lty == rty && self.is_numeric(lty) {
            Some(lty)
        } else if self.is_numeric(lty) && self.is_numeric(rty) {
            self.cast_integer_sides((lty, left), (rty, right));
            Some(self.real())
        } else {
            self.report(Some(pos), SemanticError::RelationInvalidType(op));
            None
        }
    }

    fn cast_integer_sides(
        &self,
        (lty, left): (SymId, &mut Expression),
        (rty, right): (SymId, &mut Expression),
    ) {
        if lty == self.int() {
            left.cast_to(self.real());
        }
        if rty == self.int() {
            right.cast_to(self.real());
        }
    }
}
