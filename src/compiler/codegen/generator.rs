use std::io::Write;

use log::{debug, error, trace};
use stdext::function_name;

use crate::compiler::{
    quads::{QuadList, QuadOp, Quadruple},
    symtab::{SymId, SymbolKind, SymbolTable, STACK_WIDTH},
    x86::assembly::{imm, label, reg, Inst, Operand, Reg},
    FatalError, InternalError,
};

/// Writes the assembly of one callable at a time to an output sink. The
/// sink is flushed after every callable and again when the generator is
/// dropped, so nothing written is lost when generation is aborted.
pub struct CodeGenerator<W: Write> {
    out: W,
    trace: bool,
}

impl<W: Write> CodeGenerator<W> {
    /// `trace` interleaves the output with comments naming each prologue,
    /// quadruple and epilogue.
    pub fn new(out: W, trace: bool) -> CodeGenerator<W> {
        CodeGenerator { out, trace }
    }

    /// Emit the prologue, the expanded body and the epilogue of `env`.
    pub fn generate(
        &mut self,
        symtab: &mut SymbolTable,
        env: SymId,
        quads: &QuadList,
    ) -> Result<(), FatalError> {
        debug!("Generating {} ({} quads)", symtab.name(env), quads.len());
        self.prologue(symtab, env)?;
        self.expand(symtab, quads)?;
        self.epilogue(symtab, env)?;
        self.out.flush()?;
        Ok(())
    }

    fn emit(&mut self, inst: Inst) -> Result<(), FatalError> {
        writeln!(self.out, "{}", inst)?;
        Ok(())
    }

    fn prologue(&mut self, symtab: &SymbolTable, env: SymId) -> Result<(), FatalError> {
        let sym = symtab.get_symbol(env)?;
        let routine = sym.routine().ok_or(InternalError::NotCallable(env))?;
        let ar_size = align(routine.ar_size);
        let level = sym.level as i64;
        let name = symtab.name(env);

        self.emit(Inst::Routine(routine.label_nr, name.into()))?;
        if self.trace {
            self.emit(Inst::Comment(format!("PROLOGUE ({})", name)))?;
        }

        self.emit(Inst::Push(reg(Reg::Rbp)))?;
        self.emit(Inst::Mov(reg(Reg::Rcx), reg(Reg::Rsp)))?;
        // Copy the enclosing levels of the caller's display
        for i in 1..=level {
            self.emit(Inst::Push(Operand::MemoryAddr(Reg::Rbp, -STACK_WIDTH * i)))?;
        }
        self.emit(Inst::Push(reg(Reg::Rcx)))?;
        self.emit(Inst::Mov(reg(Reg::Rbp), reg(Reg::Rcx)))?;
        self.emit(Inst::Sub(reg(Reg::Rsp), imm(ar_size)))
    }

    fn epilogue(&mut self, symtab: &SymbolTable, env: SymId) -> Result<(), FatalError> {
        if self.trace {
            self.emit(Inst::Comment(format!("EPILOGUE ({})", symtab.name(env))))?;
        }
        self.emit(Inst::Leave)?;
        self.emit(Inst::Ret)
    }

    /// The display level and the frame offset of a parameter, variable or
    /// array.
    pub fn find(symtab: &SymbolTable, id: SymId) -> Result<(usize, i64), InternalError> {
        let sym = symtab.get_symbol(id)?;
        match sym.kind {
            // Skip the saved rbp and the return address
            SymbolKind::Parameter { size, .. } => Ok((sym.level, STACK_WIDTH + sym.offset + size)),
            SymbolKind::Variable | SymbolKind::Array { .. } => {
                let display = STACK_WIDTH * (sym.level as i64 + 1);
                Ok((sym.level, -(display + sym.offset)))
            }
            _ => Err(InternalError::UnsupportedAddress(id)),
        }
    }

    /// Like [`find`](Self::find) but for a value about to be read.
    fn locate(symtab: &SymbolTable, id: SymId) -> Result<(usize, i64), InternalError> {
        match symtab.get_symbol(id)?.kind {
            SymbolKind::Constant(_) => Err(InternalError::ConstantFetch(id)),
            _ => Self::find(symtab, id),
        }
    }

    /// Load the frame pointer of `level` into `rcx`.
    fn frame_address(&mut self, level: usize) -> Result<(), FatalError> {
        self.emit(Inst::Mov(
            reg(Reg::Rcx),
            Operand::MemoryAddr(Reg::Rbp, -STACK_WIDTH * level as i64),
        ))
    }

    fn fetch(&mut self, symtab: &SymbolTable, id: SymId, dest: Reg) -> Result<(), FatalError> {
        let (level, offset) = Self::locate(symtab, id)?;
        self.frame_address(level)?;
        self.emit(Inst::Mov(reg(dest), Operand::MemoryAddr(Reg::Rcx, offset)))
    }

    /// Push a real value onto the x87 stack.
    fn fetch_float(&mut self, symtab: &SymbolTable, id: SymId) -> Result<(), FatalError> {
        let (level, offset) = Self::locate(symtab, id)?;
        self.frame_address(level)?;
        self.emit(Inst::Fld(Operand::QWord(Reg::Rcx, offset)))
    }

    fn store(&mut self, symtab: &SymbolTable, src: Reg, id: SymId) -> Result<(), FatalError> {
        let (level, offset) = Self::find(symtab, id)?;
        self.frame_address(level)?;
        self.emit(Inst::Mov(Operand::MemoryAddr(Reg::Rcx, offset), reg(src)))
    }

    /// Pop the top of the x87 stack into a real variable.
    fn store_float(&mut self, symtab: &SymbolTable, id: SymId) -> Result<(), FatalError> {
        let (level, offset) = Self::find(symtab, id)?;
        self.frame_address(level)?;
        self.emit(Inst::Fstp(Operand::QWord(Reg::Rcx, offset)))
    }

    /// Load the address of the first element of an array into `dest`.
    /// Elements are laid out towards lower addresses.
    fn array_address(&mut self, symtab: &SymbolTable, id: SymId, dest: Reg) -> Result<(), FatalError> {
        let (level, offset) = Self::find(symtab, id)?;
        self.frame_address(level)?;
        self.emit(Inst::Sub(reg(Reg::Rcx), imm(-offset)))?;
        self.emit(Inst::Mov(reg(dest), reg(Reg::Rcx)))
    }

    /// Load the address of the indexed element of an array into `rax`.
    fn element_address(&mut self, symtab: &SymbolTable, q: &Quadruple, nr: usize) -> Result<(), FatalError> {
        self.array_address(symtab, q.sym1(nr)?, Reg::Rax)?;
        self.fetch(symtab, q.sym2(nr)?, Reg::Rcx)?;
        self.emit(Inst::IMul(reg(Reg::Rcx), imm(STACK_WIDTH)))?;
        self.emit(Inst::Sub(reg(Reg::Rax), reg(Reg::Rcx)))
    }

    /// Finish a comparison: `rax` is set to `taken` when the preceding
    /// conditional jump to `target` was taken, to `fallthrough` otherwise, and
    /// stored into `dest`.
    fn select(
        &mut self,
        symtab: &SymbolTable,
        target: i64,
        join: i64,
        fallthrough: i64,
        taken: i64,
        dest: SymId,
    ) -> Result<(), FatalError> {
        self.emit(Inst::Mov(reg(Reg::Rax), imm(fallthrough)))?;
        self.emit(Inst::Jmp(label(join)))?;
        self.emit(Inst::Label(target))?;
        self.emit(Inst::Mov(reg(Reg::Rax), imm(taken)))?;
        self.emit(Inst::Label(join))?;
        self.store(symtab, Reg::Rax, dest)
    }

    fn int_binary(
        &mut self,
        symtab: &SymbolTable,
        q: &Quadruple,
        nr: usize,
        op: fn(Operand, Operand) -> Inst,
    ) -> Result<(), FatalError> {
        self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
        self.fetch(symtab, q.sym2(nr)?, Reg::Rcx)?;
        self.emit(op(reg(Reg::Rax), reg(Reg::Rcx)))?;
        self.store(symtab, Reg::Rax, q.sym3(nr)?)
    }

    fn real_binary(
        &mut self,
        symtab: &SymbolTable,
        q: &Quadruple,
        nr: usize,
        op: Inst,
    ) -> Result<(), FatalError> {
        self.fetch_float(symtab, q.sym1(nr)?)?;
        self.fetch_float(symtab, q.sym2(nr)?)?;
        self.emit(op)?;
        self.store_float(symtab, q.sym3(nr)?)
    }

    /// `quotient` selects between the quotient in `rax` and the remainder
    /// in `rdx`.
    fn int_divide(
        &mut self,
        symtab: &SymbolTable,
        q: &Quadruple,
        nr: usize,
        quotient: bool,
    ) -> Result<(), FatalError> {
        self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
        self.fetch(symtab, q.sym2(nr)?, Reg::Rcx)?;
        self.emit(Inst::Cqo)?;
        self.emit(Inst::IDiv(Reg::Rcx))?;
        let result = if quotient { Reg::Rax } else { Reg::Rdx };
        self.store(symtab, result, q.sym3(nr)?)
    }

    fn int_compare(
        &mut self,
        symtab: &mut SymbolTable,
        q: &Quadruple,
        nr: usize,
        jump: fn(Operand) -> Inst,
    ) -> Result<(), FatalError> {
        let target = symtab.get_next_label();
        let join = symtab.get_next_label();
        self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
        self.fetch(symtab, q.sym2(nr)?, Reg::Rcx)?;
        self.emit(Inst::Cmp(reg(Reg::Rax), reg(Reg::Rcx)))?;
        self.emit(jump(label(target)))?;
        self.select(symtab, target, join, 0, 1, q.sym3(nr)?)
    }

    /// `fcomip` compares `ST(0)` with `ST(1)`, so the ordered relations load
    /// their right operand first.
    fn real_compare(
        &mut self,
        symtab: &mut SymbolTable,
        q: &Quadruple,
        nr: usize,
        jump: fn(Operand) -> Inst,
        reversed: bool,
    ) -> Result<(), FatalError> {
        let target = symtab.get_next_label();
        let join = symtab.get_next_label();
        let (first, second) = if reversed {
            (q.sym2(nr)?, q.sym1(nr)?)
        } else {
            (q.sym1(nr)?, q.sym2(nr)?)
        };
        self.fetch_float(symtab, first)?;
        self.fetch_float(symtab, second)?;
        self.emit(Inst::Fcomip(Operand::St(0), Operand::St(1)))?;
        self.emit(Inst::Fstp(Operand::St(0)))?;
        self.emit(jump(label(target)))?;
        self.select(symtab, target, join, 0, 1, q.sym3(nr)?)
    }

    /// `and` and `or` short circuit on their left operand: `and` jumps to
    /// the false branch on a zero operand and `or` to the true branch on a
    /// non zero one.
    fn logical(
        &mut self,
        symtab: &mut SymbolTable,
        q: &Quadruple,
        nr: usize,
        is_and: bool,
    ) -> Result<(), FatalError> {
        let target = symtab.get_next_label();
        let join = symtab.get_next_label();
        let jump: fn(Operand) -> Inst = if is_and { Inst::Je } else { Inst::Jne };
        for operand in [q.sym1(nr)?, q.sym2(nr)?].iter() {
            self.fetch(symtab, *operand, Reg::Rax)?;
            self.emit(Inst::Cmp(reg(Reg::Rax), imm(0)))?;
            self.emit(jump(label(target)))?;
        }
        let (fallthrough, taken) = if is_and { (1, 0) } else { (0, 1) };
        self.select(symtab, target, join, fallthrough, taken, q.sym3(nr)?)
    }

    /// Expand every quadruple of the list in order. Labels are emitted
    /// before the trace comment of their quadruple so a jump never skips
    /// the trace.
    pub fn expand(&mut self, symtab: &mut SymbolTable, quads: &QuadList) -> Result<(), FatalError> {
        for (idx, q) in quads.iter().enumerate() {
            let nr = idx + 1;
            trace!("{}: {} {}", function_name!(), nr, q);

            if q.op == QuadOp::Labl {
                self.emit(Inst::Label(q.int1(nr)?))?;
            }
            if self.trace {
                self.emit(Inst::Comment(format!("QUAD {}: {}", nr, q)))?;
            }

            self.expand_quad(symtab, q, nr).map_err(|e| {
                error!("Failed to expand quad {}: {}", nr, q);
                e
            })?;
        }
        Ok(())
    }

    fn expand_quad(&mut self, symtab: &mut SymbolTable, q: &Quadruple, nr: usize) -> Result<(), FatalError> {
        use QuadOp::*;
        match q.op {
            Rload | Iload => {
                self.emit(Inst::Mov(reg(Reg::Rax), imm(q.int1(nr)?)))?;
                self.store(symtab, Reg::Rax, q.sym3(nr)?)
            }
            Inot => {
                let target = symtab.get_next_label();
                let join = symtab.get_next_label();
                self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
                self.emit(Inst::Cmp(reg(Reg::Rax), imm(0)))?;
                self.emit(Inst::Je(label(target)))?;
                self.select(symtab, target, join, 0, 1, q.sym3(nr)?)
            }
            Ruminus => {
                self.fetch_float(symtab, q.sym1(nr)?)?;
                self.emit(Inst::Fchs)?;
                self.store_float(symtab, q.sym3(nr)?)
            }
            Iuminus => {
                self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
                self.emit(Inst::Neg(Reg::Rax))?;
                self.store(symtab, Reg::Rax, q.sym3(nr)?)
            }
            Rplus => self.real_binary(symtab, q, nr, Inst::Faddp),
            Iplus => self.int_binary(symtab, q, nr, Inst::Add),
            Rminus => self.real_binary(symtab, q, nr, Inst::Fsubp),
            Iminus => self.int_binary(symtab, q, nr, Inst::Sub),
            Ior => self.logical(symtab, q, nr, false),
            Iand => self.logical(symtab, q, nr, true),
            Rmult => self.real_binary(symtab, q, nr, Inst::Fmulp),
            Imult => self.int_binary(symtab, q, nr, Inst::IMul),
            Rdivide => self.real_binary(symtab, q, nr, Inst::Fdivp),
            Idivide => self.int_divide(symtab, q, nr, true),
            Imod => self.int_divide(symtab, q, nr, false),
            Req => self.real_compare(symtab, q, nr, Inst::Je, false),
            Ieq => self.int_compare(symtab, q, nr, Inst::Je),
            Rne => self.real_compare(symtab, q, nr, Inst::Jne, false),
            Ine => self.int_compare(symtab, q, nr, Inst::Jne),
            Rlt => self.real_compare(symtab, q, nr, Inst::Jb, true),
            Ilt => self.int_compare(symtab, q, nr, Inst::Jl),
            Rgt => self.real_compare(symtab, q, nr, Inst::Ja, true),
            Igt => self.int_compare(symtab, q, nr, Inst::Jg),
            Rstore | Istore => {
                self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
                self.fetch(symtab, q.sym3(nr)?, Reg::Rcx)?;
                self.emit(Inst::Mov(Operand::MemoryAddr(Reg::Rcx, 0), reg(Reg::Rax)))
            }
            Rassign | Iassign => {
                self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
                self.store(symtab, Reg::Rax, q.sym3(nr)?)
            }
            Param => {
                self.fetch(symtab, q.sym1(nr)?, Reg::Rax)?;
                self.emit(Inst::Push(reg(Reg::Rax)))
            }
            Call => {
                let callee = q.sym1(nr)?;
                let routine = *symtab.get_routine(callee)?;
                let is_function = matches!(symtab.get_symbol(callee)?.kind, SymbolKind::Function(_));
                self.emit(Inst::Call(label(routine.label_nr)))?;
                if is_function {
                    self.store(symtab, Reg::Rax, q.sym3(nr)?)?;
                }
                // Pop the parameters
                self.emit(Inst::Add(reg(Reg::Rsp), imm(STACK_WIDTH * q.int2(nr)?)))
            }
            Rreturn | Ireturn => {
                self.fetch(symtab, q.sym2(nr)?, Reg::Rax)?;
                self.emit(Inst::Jmp(label(q.int1(nr)?)))
            }
            Lindex => {
                self.element_address(symtab, q, nr)?;
                self.store(symtab, Reg::Rax, q.sym3(nr)?)
            }
            Rrindex | Irindex => {
                self.element_address(symtab, q, nr)?;
                self.emit(Inst::Mov(reg(Reg::Rax), Operand::MemoryAddr(Reg::Rax, 0)))?;
                self.store(symtab, Reg::Rax, q.sym3(nr)?)
            }
            Itor => {
                let (level, offset) = Self::locate(symtab, q.sym1(nr)?)?;
                self.frame_address(level)?;
                self.emit(Inst::Fild(Operand::QWord(Reg::Rcx, offset)))?;
                self.store_float(symtab, q.sym3(nr)?)
            }
            Jmp => self.emit(Inst::Jmp(label(q.int1(nr)?))),
            Jmpf => {
                self.fetch(symtab, q.sym2(nr)?, Reg::Rax)?;
                self.emit(Inst::Cmp(reg(Reg::Rax), imm(0)))?;
                self.emit(Inst::Je(label(q.int1(nr)?)))
            }
            // Emitted before the trace comment
            Labl => Ok(()),
            Nop => Err(InternalError::NopQuad(nr).into()),
        }
    }
}

impl<W: Write> Drop for CodeGenerator<W> {
    fn drop(&mut self) {
        if let Err(e) = self.out.flush() {
            error!("Failed to flush the assembly output: {}", e);
        }
    }
}

/// Round a frame size up to the stack width.
fn align(size: i64) -> i64 {
    (size + STACK_WIDTH - 1) / STACK_WIDTH * STACK_WIDTH
}
