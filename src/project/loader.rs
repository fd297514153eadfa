use std::io::Write;

use log::{debug, trace};
use stdext::function_name;

use crate::compiler::{
    ast::{Elsif, Expression, ExpressionList, Statement, StatementList, UnaryOperator},
    codegen::CodeGenerator,
    diagnostics::Diagnostics,
    symtab::{ConstValue, SymId, SymTag},
    Compilation, FatalError, Position,
};

use super::unit::{Block, Literal, RoutineDecl, SourceExpr, SourceStatement, Unit, VarDecl};

/// The ways loading a unit can fail.
#[derive(Debug)]
pub enum LoadError {
    /// The unit is malformed: it uses names it never declares, or uses a
    /// declared name as something it is not. Every such error in the unit
    /// is listed.
    Unit(Vec<String>),
    Fatal(FatalError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Unit(errs) => f.write_fmt(format_args!("{} error(s) in unit", errs.len())),
            LoadError::Fatal(fe) => f.write_fmt(format_args!("{}", fe)),
        }
    }
}

impl From<FatalError> for LoadError {
    fn from(fe: FatalError) -> Self {
        LoadError::Fatal(fe)
    }
}

/// Enter the declarations of `unit` into the symbol table of `comp` and
/// compile each of its callables, innermost first, with `generator`.
///
/// Declarations are entered the way a parser enters them: each callable is
/// entered in its enclosing scope, then its scope is opened, its parameters,
/// locals and nested callables are entered, its body is compiled, and its
/// scope is closed. Semantic errors are collected in `comp`. Once the unit
/// is found to be malformed no more assembly is generated, but the rest of
/// the unit is still loaded so that every error is reported.
pub fn load_unit<W: Write>(
    unit: &Unit,
    comp: &mut Compilation,
    generator: &mut CodeGenerator<W>,
) -> Result<(), LoadError> {
    let mut loader = Loader::new(comp, generator);
    loader.load_program(unit)?;
    if loader.errors.is_empty() {
        Ok(())
    } else {
        Err(LoadError::Unit(loader.errors))
    }
}

/// Load and compile `unit`, returning its assembly.
///
/// The assembly is kept in memory until the whole unit is compiled. If any
/// semantic error is reported, `None` is returned and nothing is emitted,
/// not even the callables which were compiled before the first error.
pub fn compile_unit(unit: &Unit, comp: &mut Compilation) -> Result<Option<Vec<u8>>, LoadError> {
    let mut out = vec![];
    {
        let mut gen = comp.generator(&mut out);
        load_unit(unit, comp, &mut gen)?;
    }

    if comp.errors().has_errors() {
        debug!(
            "Discarding the assembly of {}: {} error(s) reported",
            unit.name,
            comp.errors().error_count()
        );
        Ok(None)
    } else {
        Ok(Some(out))
    }
}

/// Identifiers start with a letter, followed by letters, digits and
/// underscores. Names the compiler generates for itself are never
/// identifiers.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

struct Loader<'a, W: Write> {
    comp: &'a mut Compilation,
    generator: &'a mut CodeGenerator<W>,
    errors: Vec<String>,

    /// Every declaration and statement is given the next line, in the order
    /// they are loaded.
    line: u32,
}

impl<'a, W: Write> Loader<'a, W> {
    fn new(comp: &'a mut Compilation, generator: &'a mut CodeGenerator<W>) -> Loader<'a, W> {
        Loader {
            comp,
            generator,
            errors: vec![],
            line: 0,
        }
    }

    fn next_pos(&mut self) -> Position {
        self.line += 1;
        Position::new(self.line, 1)
    }

    fn error(&mut self, pos: Position, msg: String) {
        debug!("{}: {}", pos, msg);
        self.errors.push(format!("{}: {}", pos, msg));
    }

    fn load_program(&mut self, unit: &Unit) -> Result<(), FatalError> {
        let pos = self.next_pos();
        let prog = self.declare_routine(pos, &unit.name, None)?;
        self.load_block(prog, &[], &unit.block)
    }

    fn load_routine(&mut self, decl: &RoutineDecl) -> Result<(), FatalError> {
        let pos = self.next_pos();
        let env = match &decl.returns {
            Some(ty) => match self.resolve_type(pos, ty) {
                Some(ty) => self.declare_routine(pos, &decl.name, Some(ty))?,
                None => None,
            },
            None => self.declare_routine(pos, &decl.name, None)?,
        };
        self.load_block(env, &decl.params, &decl.block)
    }

    /// Enter a procedure, or a function returning `returns`, in the current
    /// scope. Returns `None` if the routine gets no symbol of its own: its
    /// name is not an identifier, or the name is already declared in this
    /// scope and the redeclaration has been reported.
    fn declare_routine(
        &mut self,
        pos: Position,
        name: &str,
        returns: Option<SymId>,
    ) -> Result<Option<SymId>, FatalError> {
        if !self.check_identifier(pos, name) {
            return Ok(None);
        }

        let (st, log) = self.comp.declarations();
        let first_new = st.len();
        let id = match returns {
            Some(ty) => st.enter_function(log, name, Some(pos), ty)?,
            None => st.enter_procedure(log, name, Some(pos))?,
        };
        if id.index() < first_new {
            debug!("{} keeps its first declaration", name);
            Ok(None)
        } else {
            Ok(Some(id))
        }
    }

    /// Load the declarations and body of the routine `env`.
    ///
    /// A routine without a symbol of its own is still loaded, so that the
    /// errors in it are reported, but its scope belongs to the enclosing
    /// environment: its parameters are entered as plain variables and its
    /// body is never compiled.
    fn load_block(
        &mut self,
        env: Option<SymId>,
        params: &[VarDecl],
        block: &Block,
    ) -> Result<(), FatalError> {
        let anchor = match env {
            Some(env) => env,
            None => self.comp.symtab().current_environment(),
        };
        trace!("{}: {}", function_name!(), self.comp.symtab().name(anchor));
        self.comp.symtab_mut().open_scope_of(anchor)?;

        for param in params {
            let pos = self.next_pos();
            if !self.check_identifier(pos, &param.name) {
                continue;
            }
            if let Some(ty) = self.resolve_type(pos, &param.ty) {
                let (st, log) = self.comp.declarations();
                if env.is_some() {
                    st.enter_parameter(log, &param.name, Some(pos), ty)?;
                } else {
                    st.enter_variable(log, &param.name, Some(pos), ty)?;
                }
            }
        }

        for decl in &block.consts {
            let pos = self.next_pos();
            if !self.check_identifier(pos, &decl.name) {
                continue;
            }
            let value = match decl.value {
                Literal::Integer(i) => ConstValue::Integer(i),
                Literal::Real(r) => ConstValue::Real(r),
            };
            let (st, log) = self.comp.declarations();
            st.enter_constant(log, &decl.name, Some(pos), value)?;
        }

        for decl in &block.vars {
            let pos = self.next_pos();
            if !self.check_identifier(pos, &decl.name) {
                continue;
            }
            if let Some(ty) = self.resolve_type(pos, &decl.ty) {
                let (st, log) = self.comp.declarations();
                st.enter_variable(log, &decl.name, Some(pos), ty)?;
            }
        }

        for decl in &block.arrays {
            let pos = self.next_pos();
            if !self.check_identifier(pos, &decl.name) {
                continue;
            }
            if let Some(ty) = self.resolve_type(pos, &decl.ty) {
                let (st, log) = self.comp.declarations();
                st.enter_array(log, &decl.name, Some(pos), ty, decl.size)?;
            }
        }

        for routine in &block.routines {
            self.load_routine(routine)?;
        }

        let mut body = self.resolve_statements(&block.body);
        match env {
            Some(env) if self.errors.is_empty() => {
                self.comp.compile_routine(env, &mut body, &mut *self.generator)?;
            }
            _ => debug!(
                "Not compiling a body in the scope of {}",
                self.comp.symtab().name(anchor)
            ),
        }

        self.comp.symtab_mut().close_scope()?;
        Ok(())
    }

    fn check_identifier(&mut self, pos: Position, name: &str) -> bool {
        if is_identifier(name) {
            true
        } else {
            self.error(pos, format!("{} is not a valid identifier", name));
            false
        }
    }

    fn resolve_type(&mut self, pos: Position, name: &str) -> Option<SymId> {
        let id = self.lookup(pos, name)?;
        match self.comp.symtab().get_symbol_tag(id) {
            Ok(SymTag::NameType) => Some(id),
            _ => {
                self.error(pos, format!("{} is not a type", name));
                None
            }
        }
    }

    fn lookup(&mut self, pos: Position, name: &str) -> Option<SymId> {
        let id = if is_identifier(name) {
            self.comp.symtab().lookup_symbol(name)
        } else {
            None
        };
        if id.is_none() {
            self.error(pos, format!("Undeclared identifier {}", name));
        }
        id
    }

    /// Look up `name` and check that it is declared as one of `tags`.
    fn lookup_as(
        &mut self,
        pos: Position,
        name: &str,
        tags: &[SymTag],
        what: &str,
    ) -> Option<SymId> {
        let id = self.lookup(pos, name)?;
        match self.comp.symtab().get_symbol_tag(id) {
            Ok(tag) if tags.contains(&tag) => Some(id),
            _ => {
                self.error(pos, format!("{} is not {}", name, what));
                None
            }
        }
    }

    fn resolve_statements(&mut self, stmts: &[SourceStatement]) -> StatementList {
        stmts
            .iter()
            .filter_map(|s| self.resolve_statement(s))
            .collect()
    }

    fn resolve_statement(&mut self, stmt: &SourceStatement) -> Option<Statement> {
        let pos = self.next_pos();
        match stmt {
            SourceStatement::Assign { target, value } => {
                let target = self.resolve_target(pos, target);
                let value = self.resolve_expression(pos, value);
                Some(Statement::Assign {
                    pos,
                    target: target?,
                    value: value?,
                })
            }
            SourceStatement::Call { name, args } => {
                let routine = self.lookup_as(pos, name, &[SymTag::Procedure], "a procedure");
                let args = self.resolve_args(pos, args);
                Some(Statement::ProcedureCall {
                    pos,
                    routine: routine?,
                    args: args?,
                })
            }
            SourceStatement::While { cond, body } => {
                let cond = self.resolve_expression(pos, cond);
                let body = self.resolve_statements(body);
                Some(Statement::While {
                    pos,
                    cond: cond?,
                    body,
                })
            }
            SourceStatement::If {
                cond,
                body,
                elsif,
                otherwise,
            } => {
                let cond = self.resolve_expression(pos, cond);
                let body = self.resolve_statements(body);
                let elsifs = elsif
                    .iter()
                    .filter_map(|arm| {
                        let pos = self.next_pos();
                        let cond = self.resolve_expression(pos, &arm.cond);
                        let body = self.resolve_statements(&arm.body);
                        Some(Elsif {
                            pos,
                            cond: cond?,
                            body,
                        })
                    })
                    .collect();
                let otherwise = otherwise.as_ref().map(|o| self.resolve_statements(o));
                Some(Statement::If {
                    pos,
                    cond: cond?,
                    body,
                    elsifs,
                    otherwise,
                })
            }
            SourceStatement::Return { value } => {
                let value = match value {
                    Some(v) => Some(self.resolve_expression(pos, v)?),
                    None => None,
                };
                Some(Statement::Return { pos, value })
            }
        }
    }

    fn resolve_target(&mut self, pos: Position, target: &SourceExpr) -> Option<Expression> {
        match target {
            SourceExpr::Name(name) => {
                let id = self.lookup_as(
                    pos,
                    name,
                    &[SymTag::Variable, SymTag::Parameter],
                    "a variable",
                )?;
                Some(Expression::Identifier(pos, id))
            }
            SourceExpr::Index { .. } => self.resolve_expression(pos, target),
            _ => {
                self.error(
                    pos,
                    "Target of an assignment must be a variable or an array element".into(),
                );
                None
            }
        }
    }

    /// Resolve every argument, so that errors in all of them are reported.
    fn resolve_args(&mut self, pos: Position, args: &[SourceExpr]) -> Option<ExpressionList> {
        let resolved: Vec<_> = args
            .iter()
            .map(|a| self.resolve_expression(pos, a))
            .collect();
        resolved.into_iter().collect()
    }

    fn resolve_expression(&mut self, pos: Position, expr: &SourceExpr) -> Option<Expression> {
        match expr {
            SourceExpr::Int(i) => Some(Expression::Integer(pos, *i)),
            SourceExpr::Real(r) => Some(Expression::Real(pos, *r)),
            SourceExpr::Name(name) => {
                let id = self.lookup_as(
                    pos,
                    name,
                    &[SymTag::Constant, SymTag::Variable, SymTag::Parameter],
                    "a constant or a variable",
                )?;
                Some(Expression::Identifier(pos, id))
            }
            SourceExpr::Index { array, index } => {
                let array = self.lookup_as(pos, array, &[SymTag::Array], "an array");
                let index = self.resolve_expression(pos, index);
                Some(Expression::indexed(pos, array?, index?))
            }
            SourceExpr::Call { name, args } => {
                let function = self.lookup_as(pos, name, &[SymTag::Function], "a function");
                let args = self.resolve_args(pos, args);
                Some(Expression::FunctionCall {
                    pos,
                    function: function?,
                    args: args?,
                })
            }
            SourceExpr::Neg(operand) => {
                let operand = self.resolve_expression(pos, operand)?;
                Some(Expression::unary(pos, UnaryOperator::Negate, operand))
            }
            SourceExpr::Not(operand) => {
                let operand = self.resolve_expression(pos, operand)?;
                Some(Expression::unary(pos, UnaryOperator::Not, operand))
            }
            SourceExpr::Binary { op, left, right } => {
                let left = self.resolve_expression(pos, left);
                let right = self.resolve_expression(pos, right);
                Some(Expression::binary(pos, *op, left?, right?))
            }
            SourceExpr::Relation { op, left, right } => {
                let left = self.resolve_expression(pos, left);
                let right = self.resolve_expression(pos, right);
                Some(Expression::relation(pos, *op, left?, right?))
            }
        }
    }
}
