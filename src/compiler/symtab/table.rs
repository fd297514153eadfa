use log::{debug, trace};
use stdext::function_name;

use crate::compiler::{
    diagnostics::Diagnostics,
    semantics::SemanticError,
    stringpool::{capitalize, hash, PoolIndex, StringPool},
    CompilerError, FatalError, InternalError, LimitError, Position, TableLimits,
};

use super::symbol::{ConstValue, Routine, SymId, SymTag, Symbol, SymbolKind};

/// Width in bytes of every stack slot, and of both `integer` and `real`.
pub const STACK_WIDTH: i64 = 8;

/// Cardinality given to an array whose declared bounds were invalid.
pub const ILLEGAL_ARRAY_CARD: i64 = -1;

/// The result of [`SymbolTable::install_symbol`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Installed {
    /// A new symbol was created at the current level.
    New(SymId),

    /// A symbol with the same name was already declared at the current
    /// level. The existing symbol is left unchanged.
    Existing(SymId),
}

impl Installed {
    pub fn id(&self) -> SymId {
        match self {
            Installed::New(id) | Installed::Existing(id) => *id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    env: SymId,

    /// Index of the first symbol installed while this scope is open.
    first: usize,
}

/**
The scoped symbol table of a compilation unit.

Symbols are stored in declaration order and are never removed: a symbol's
[`SymId`] stays valid for the whole compilation. Name resolution goes through
a chained hash table keyed on the (capitalized) identifier. A new symbol is
linked at the head of its bucket, so it shadows every older symbol of the
same name, and remembers the head it displaced in its `hash_link`.

The block table is a display of the callables whose scopes are open: entry
`n` is the procedure or function owning level `n`. Entry 0 is the implicit
global environment, `GLOBAL.`, which also owns the predefined names.
 */
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    hash_table: Vec<Option<SymId>>,
    pool: StringPool,
    block_table: Vec<Scope>,
    label_nr: i64,
    temp_nr: usize,
    limits: TableLimits,

    void_type: SymId,
    integer_type: SymId,
    real_type: SymId,
}

impl SymbolTable {
    /// Create a symbol table holding the predefined environment: the global
    /// procedure, the types `VOID`, `INTEGER` and `REAL`, and the builtin
    /// routines `READ`, `WRITE` and `TRUNC`.
    pub fn new(limits: &TableLimits) -> Result<SymbolTable, FatalError> {
        let mut st = SymbolTable {
            symbols: vec![],
            hash_table: vec![None; limits.max_hash.max(1)],
            pool: StringPool::new(limits.base_pool_size, limits.max_pool_size),
            block_table: vec![Scope {
                env: SymId::new(0),
                first: 0,
            }],
            label_nr: -1,
            temp_nr: 0,
            limits: limits.clone(),
            void_type: SymId::new(0),
            integer_type: SymId::new(0),
            real_type: SymId::new(0),
        };

        let global = st.install_routine("global.", None, false)?;

        st.void_type = st.install_nametype("void")?;
        st.integer_type = st.install_nametype("integer")?;
        st.real_type = st.install_nametype("real")?;
        st.set_symbol_type(global, st.void_type)?;

        let read = st.install_routine("read", None, true)?;
        st.set_symbol_type(read, st.integer_type)?;

        let write = st.install_routine("write", None, false)?;
        st.set_symbol_type(write, st.void_type)?;
        st.install_builtin_parameter(write, "int-arg", st.integer_type)?;

        let trunc = st.install_routine("trunc", None, true)?;
        st.set_symbol_type(trunc, st.integer_type)?;
        st.install_builtin_parameter(trunc, "real-arg", st.real_type)?;

        Ok(st)
    }

    pub fn void_type(&self) -> SymId {
        self.void_type
    }

    pub fn integer_type(&self) -> SymId {
        self.integer_type
    }

    pub fn real_type(&self) -> SymId {
        self.real_type
    }

    pub fn current_level(&self) -> usize {
        self.block_table.len() - 1
    }

    /// The procedure or function which owns the innermost open scope.
    pub fn current_environment(&self) -> SymId {
        self.block_table[self.current_level()].env
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SymId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(idx, sym)| (SymId::new(idx), sym))
    }

    pub fn pool(&self) -> &StringPool {
        &self.pool
    }

    pub(super) fn hash_table(&self) -> &[Option<SymId>] {
        &self.hash_table
    }

    pub fn get_symbol(&self, id: SymId) -> Result<&Symbol, InternalError> {
        self.symbols
            .get(id.index())
            .ok_or(InternalError::UnknownSymbol(id))
    }

    fn get_symbol_mut(&mut self, id: SymId) -> Result<&mut Symbol, InternalError> {
        self.symbols
            .get_mut(id.index())
            .ok_or(InternalError::UnknownSymbol(id))
    }

    pub fn get_symbol_type(&self, id: SymId) -> Result<SymId, InternalError> {
        self.get_symbol(id).map(|s| s.ty)
    }

    pub fn get_symbol_tag(&self, id: SymId) -> Result<SymTag, InternalError> {
        self.get_symbol(id).map(|s| s.tag())
    }

    pub fn set_symbol_type(&mut self, id: SymId, ty: SymId) -> Result<(), InternalError> {
        self.get_symbol_mut(id)?.ty = ty;
        Ok(())
    }

    /// The routine data of a procedure or function symbol.
    pub fn get_routine(&self, id: SymId) -> Result<&Routine, InternalError> {
        self.get_symbol(id)?
            .routine()
            .ok_or(InternalError::NotCallable(id))
    }

    /// The text of a symbol's name.
    pub fn name(&self, id: SymId) -> &str {
        match self.symbols.get(id.index()) {
            Some(sym) => self.pool.lookup(sym.name),
            None => "",
        }
    }

    /// Intern a string in the pool of this table.
    pub fn pool_install(&mut self, s: &str) -> Result<PoolIndex, LimitError> {
        self.pool.install(s)
    }

    pub fn pool_lookup(&self, idx: PoolIndex) -> &str {
        self.pool.lookup(idx)
    }

    pub fn pool_compare(&self, a: PoolIndex, b: PoolIndex) -> bool {
        self.pool.compare(a, b)
    }

    /// Drop the most recently installed string from the pool.
    pub fn pool_forget(&mut self, idx: PoolIndex) -> bool {
        self.pool.forget(idx)
    }

    /// Get the next assembly label number. The counter starts at -1, which
    /// is taken by the global environment, so the first user callable is
    /// given the first label after the builtins.
    pub fn get_next_label(&mut self) -> i64 {
        let label = self.label_nr;
        self.label_nr += 1;
        label
    }

    /// The bit pattern of a real, so real constants can travel through
    /// integer operand slots.
    pub fn ieee(d: f64) -> i64 {
        d.to_bits() as i64
    }

    /// Size in bytes of a value of the given type.
    pub fn get_size(&self, ty: SymId) -> Result<i64, InternalError> {
        if ty == self.integer_type || ty == self.real_type {
            Ok(STACK_WIDTH)
        } else if ty == self.void_type {
            debug!("Size of void requested");
            Ok(0)
        } else {
            Err(InternalError::InvalidTypeSize(ty))
        }
    }

    /// Open the scope of the most recently installed symbol, which must be a
    /// procedure or function.
    pub fn open_scope(&mut self) -> Result<(), FatalError> {
        let anchor = SymId::new(self.symbols.len().saturating_sub(1));
        self.open_scope_of(anchor)
    }

    /// Open a scope owned by `env`, which must be a procedure or function.
    ///
    /// The owner need not be the latest symbol. A redeclared routine has no
    /// symbol of its own, so its declarations can be scoped under the
    /// enclosing environment instead.
    pub fn open_scope_of(&mut self, env: SymId) -> Result<(), FatalError> {
        if self.block_table.len() >= self.limits.max_block {
            return Err(LimitError::NestingTooDeep(self.limits.max_block).into());
        }
        if !self.get_symbol(env)?.is_callable() {
            return Err(InternalError::NotCallable(env).into());
        }

        self.block_table.push(Scope {
            env,
            first: self.symbols.len(),
        });
        debug!(
            "Open scope of {} at level {}",
            self.name(env),
            self.current_level()
        );
        Ok(())
    }

    /// Close the innermost scope and return the callable owning the scope
    /// which encloses it. Every symbol declared in the closed scope is
    /// unlinked from the hash table, so it can no longer be found by name.
    pub fn close_scope(&mut self) -> Result<SymId, InternalError> {
        if self.current_level() == 0 {
            return Err(InternalError::ScopeUnderflow);
        }

        let level = self.current_level();
        let scope = self.block_table[level];

        // Newest first, so each bucket unwinds to the head it had when the
        // scope was opened.
        for sym in self.symbols[scope.first..].iter().rev() {
            if sym.level == level {
                self.hash_table[sym.back_link] = sym.hash_link;
            }
        }

        self.block_table.pop();
        debug!("Close scope of {} at level {}", self.name(scope.env), level);
        Ok(self.current_environment())
    }

    /// Find the visible symbol with the given name. The innermost
    /// declaration shadows any outer declaration of the same name.
    pub fn lookup_symbol(&self, name: &str) -> Option<SymId> {
        let name = capitalize(name);
        let mut cur = self.hash_table[hash(&name, self.hash_table.len())];
        while let Some(id) = cur {
            let sym = &self.symbols[id.index()];
            if self.pool.lookup(sym.name) == name {
                return Some(id);
            }
            cur = sym.hash_link;
        }
        None
    }

    /// Install a symbol with the given name and kind at the current level.
    /// If a symbol with that name is already declared at the current level
    /// then it is returned unchanged instead.
    pub fn install_symbol(
        &mut self,
        name: &str,
        pos: Option<Position>,
        kind: SymbolKind,
    ) -> Result<Installed, LimitError> {
        let name = capitalize(name);
        let level = self.current_level();

        if let Some(found) = self.lookup_symbol(&name) {
            if self.symbols[found.index()].level == level {
                return Ok(Installed::Existing(found));
            }
        }

        if self.symbols.len() >= self.limits.max_symbols {
            return Err(LimitError::TableFull(self.limits.max_symbols));
        }

        let pool_idx = match self.pool.find(&name) {
            Some(idx) => idx,
            None => self.pool.install(&name)?,
        };

        let bucket = hash(&name, self.hash_table.len());
        let id = SymId::new(self.symbols.len());
        self.symbols.push(Symbol {
            name: pool_idx,
            ty: self.void_type,
            level,
            offset: 0,
            hash_link: self.hash_table[bucket],
            back_link: bucket,
            pos,
            kind,
        });
        self.hash_table[bucket] = Some(id);

        trace!("{}: {} -> {} at level {}", function_name!(), name, id, level);
        Ok(Installed::New(id))
    }

    /// Install a symbol, reporting a redeclaration if the name is already
    /// declared at the current level.
    fn declare(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        kind: SymbolKind,
    ) -> Result<Installed, FatalError> {
        let installed = self.install_symbol(name, pos, kind)?;
        if let Installed::Existing(id) = installed {
            diag.report(CompilerError::new(
                pos,
                SemanticError::Redeclaration(self.name(id).into()),
            ));
        }
        Ok(installed)
    }

    /// Reserve `size` bytes in the activation record of the current
    /// environment and return the offset of the reservation.
    fn allocate(&mut self, size: i64) -> Result<i64, InternalError> {
        let env = self.current_environment();
        let routine = self
            .get_symbol_mut(env)?
            .routine_mut()
            .ok_or(InternalError::NotCallable(env))?;
        let offset = routine.ar_size;
        routine.ar_size += size;
        Ok(offset)
    }

    pub fn enter_constant(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        value: ConstValue,
    ) -> Result<SymId, FatalError> {
        let ty = match value {
            ConstValue::Integer(_) => self.integer_type,
            ConstValue::Real(_) => self.real_type,
        };

        match self.declare(diag, name, pos, SymbolKind::Constant(value))? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                self.set_symbol_type(id, ty)?;
                Ok(id)
            }
        }
    }

    pub fn enter_variable(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        ty: SymId,
    ) -> Result<SymId, FatalError> {
        match self.declare(diag, name, pos, SymbolKind::Variable)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                let size = self.get_size(ty)?;
                let offset = self.allocate(size)?;
                let sym = self.get_symbol_mut(id)?;
                sym.ty = ty;
                sym.offset = offset;
                Ok(id)
            }
        }
    }

    /// Enter an array of `cardinality` elements of type `ty`. An array with
    /// an illegal cardinality is entered but takes no space in the
    /// activation record.
    pub fn enter_array(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        ty: SymId,
        cardinality: i64,
    ) -> Result<SymId, FatalError> {
        let kind = SymbolKind::Array {
            cardinality,
            index_type: self.integer_type,
        };

        match self.declare(diag, name, pos, kind)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                let offset = if cardinality >= 0 {
                    let size = self.get_size(ty)?;
                    self.allocate(size * cardinality)?
                } else {
                    debug!("Array {} has an illegal cardinality", name);
                    self.get_routine(self.current_environment())?.ar_size
                };
                let sym = self.get_symbol_mut(id)?;
                sym.ty = ty;
                sym.offset = offset;
                Ok(id)
            }
        }
    }

    pub fn enter_function(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        ty: SymId,
    ) -> Result<SymId, FatalError> {
        let label = self.label_nr;
        let kind = SymbolKind::Function(Routine::new(label));
        match self.declare(diag, name, pos, kind)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                self.get_next_label();
                self.set_symbol_type(id, ty)?;
                Ok(id)
            }
        }
    }

    pub fn enter_procedure(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
    ) -> Result<SymId, FatalError> {
        let label = self.label_nr;
        let kind = SymbolKind::Procedure(Routine::new(label));
        match self.declare(diag, name, pos, kind)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                self.get_next_label();
                self.set_symbol_type(id, self.void_type)?;
                Ok(id)
            }
        }
    }

    /// Enter a parameter of the current environment, which must be a
    /// procedure or function whose scope has just been opened.
    ///
    /// The new parameter becomes the last in the environment's parameter
    /// list. Each parameter's offset is the total size of the parameters
    /// declared after it, so the offset of every earlier parameter grows by
    /// the size of the new one.
    pub fn enter_parameter(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
        ty: SymId,
    ) -> Result<SymId, FatalError> {
        let env = self.current_environment();
        if !self.get_symbol(env)?.is_callable() {
            return Err(InternalError::ParameterOutsideRoutine(env).into());
        }

        let size = self.get_size(ty)?;
        let kind = SymbolKind::Parameter {
            size,
            preceding: None,
        };
        match self.declare(diag, name, pos, kind)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                self.link_parameter(env, id, ty, size)?;
                Ok(id)
            }
        }
    }

    fn link_parameter(
        &mut self,
        env: SymId,
        param: SymId,
        ty: SymId,
        size: i64,
    ) -> Result<(), InternalError> {
        let routine = self
            .get_symbol_mut(env)?
            .routine_mut()
            .ok_or(InternalError::NotCallable(env))?;
        let preceding = routine.last_parameter;
        routine.last_parameter = Some(param);

        let mut cur = preceding;
        while let Some(id) = cur {
            let sym = self.get_symbol_mut(id)?;
            sym.offset += size;
            cur = match sym.kind {
                SymbolKind::Parameter { preceding, .. } => preceding,
                _ => None,
            };
        }

        let sym = self.get_symbol_mut(param)?;
        sym.ty = ty;
        sym.offset = 0;
        sym.kind = SymbolKind::Parameter { size, preceding };
        Ok(())
    }

    pub fn enter_nametype(
        &mut self,
        diag: &mut dyn Diagnostics,
        name: &str,
        pos: Option<Position>,
    ) -> Result<SymId, FatalError> {
        match self.declare(diag, name, pos, SymbolKind::NameType)? {
            Installed::Existing(id) => Ok(id),
            Installed::New(id) => {
                self.set_symbol_type(id, self.void_type)?;
                Ok(id)
            }
        }
    }

    /// Generate a temporary variable of the given type in the current
    /// environment. Temporaries are named `$1`, `$2`, ... which cannot clash
    /// with an identifier. Reusing a symbol already declared under that name
    /// is an internal error.
    pub fn gen_temp_var(&mut self, ty: SymId) -> Result<SymId, FatalError> {
        if ty == self.void_type {
            return Err(InternalError::VoidTemporary.into());
        }
        if self.temp_nr >= self.limits.max_temp_vars {
            return Err(LimitError::TooManyTemporaries(self.limits.max_temp_vars).into());
        }

        self.temp_nr += 1;
        let name = format!("${}", self.temp_nr);
        let id = match self.install_symbol(&name, None, SymbolKind::Variable)? {
            Installed::New(id) => id,
            Installed::Existing(id) => return Err(InternalError::TemporaryClash(id).into()),
        };
        let size = self.get_size(ty)?;
        let offset = self.allocate(size)?;
        let sym = self.get_symbol_mut(id)?;
        sym.ty = ty;
        sym.offset = offset;
        Ok(id)
    }

    fn install_nametype(&mut self, name: &str) -> Result<SymId, FatalError> {
        let id = self.install_symbol(name, None, SymbolKind::NameType)?.id();
        self.set_symbol_type(id, id)?;
        Ok(id)
    }

    fn install_routine(
        &mut self,
        name: &str,
        pos: Option<Position>,
        is_function: bool,
    ) -> Result<SymId, FatalError> {
        let routine = Routine::new(self.get_next_label());
        let kind = if is_function {
            SymbolKind::Function(routine)
        } else {
            SymbolKind::Procedure(routine)
        };
        Ok(self.install_symbol(name, pos, kind)?.id())
    }

    /// The builtins are declared at level 0, so their parameters are linked
    /// directly to the routine rather than the current environment.
    fn install_builtin_parameter(
        &mut self,
        routine: SymId,
        name: &str,
        ty: SymId,
    ) -> Result<SymId, FatalError> {
        let size = self.get_size(ty)?;
        let kind = SymbolKind::Parameter {
            size,
            preceding: None,
        };
        let id = self.install_symbol(name, None, kind)?.id();
        self.link_parameter(routine, id, ty, size)?;
        Ok(id)
    }
}
