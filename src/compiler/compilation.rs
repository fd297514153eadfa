use std::io::Write;

use log::{debug, info};

use super::{
    ast::StatementList,
    codegen::CodeGenerator,
    diagnostics::{Diagnostics, ErrorLog},
    optimize::fold,
    quads::lower,
    semantics::type_check,
    symtab::{SymId, SymbolTable},
    CompilerConfig, FatalError,
};

/// The state shared by every callable of a compilation unit: the symbol
/// table, the log of semantic errors, and the configuration the unit is
/// compiled with.
pub struct Compilation {
    symtab: SymbolTable,
    errors: ErrorLog,
    config: CompilerConfig,
}

impl Compilation {
    pub fn new(config: CompilerConfig) -> Result<Compilation, FatalError> {
        let symtab = SymbolTable::new(&config.limits)?;
        Ok(Compilation {
            symtab,
            errors: ErrorLog::new(),
            config,
        })
    }

    pub fn symtab(&self) -> &SymbolTable {
        &self.symtab
    }

    pub fn symtab_mut(&mut self) -> &mut SymbolTable {
        &mut self.symtab
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Borrow the symbol table together with the error log, which is what
    /// the `enter_*` operations of the table need.
    pub fn declarations(&mut self) -> (&mut SymbolTable, &mut ErrorLog) {
        (&mut self.symtab, &mut self.errors)
    }

    /// A code generator writing to `out`, tracing as configured.
    pub fn generator<W: Write>(&self, out: W) -> CodeGenerator<W> {
        CodeGenerator::new(out, self.config.assembler_trace)
    }

    /// Compile the body of the callable `env`, whose declarations must be
    /// complete and whose scope must still be open.
    ///
    /// The body is always type checked, so that every error in the unit is
    /// reported, but once any error has been reported no more assembly is
    /// emitted. Returns true if assembly was emitted for `env`.
    pub fn compile_routine<W: Write>(
        &mut self,
        env: SymId,
        body: &mut StatementList,
        generator: &mut CodeGenerator<W>,
    ) -> Result<bool, FatalError> {
        debug!("Compiling {}", self.symtab.name(env));
        type_check(&self.symtab, &mut self.errors, env, body)?;
        if self.errors.has_errors() {
            info!(
                "Skipping code generation for {}: {} error(s) reported",
                self.symtab.name(env),
                self.errors.error_count()
            );
            return Ok(false);
        }

        fold(&self.symtab, env, body)?;
        let quads = lower(&mut self.symtab, env, body)?;
        generator.generate(&mut self.symtab, env, &quads)?;
        Ok(true)
    }
}
