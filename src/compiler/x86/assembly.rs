use std::fmt::*;

/*
Instructions are written in Intel syntax, one per line:

```
L3:			# PROG
		push	rbp
		mov	rcx, rsp
		mov	rax, [rcx-16]
		fld	qword ptr [rcx+24]
L7:
```

Mnemonics and operands are separated by a tab and every instruction is
indented by two tabs, so labels stand out in the first column.
*/

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Rcx,
    Rdx,
    Rbp,
    Rsp,
}

impl Display for Reg {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Reg::*;
        match self {
            Rax => f.write_str("rax"),
            Rcx => f.write_str("rcx"),
            Rdx => f.write_str("rdx"),
            Rbp => f.write_str("rbp"),
            Rsp => f.write_str("rsp"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Register(Reg),
    Integer(i64),
    /// A memory location at a displacement from a register.
    MemoryAddr(Reg, i64),
    /// A 64 bit floating point memory location, for the x87 loads and
    /// stores.
    QWord(Reg, i64),
    /// The numbered label `L<n>`.
    Label(i64),
    /// An x87 stack register.
    St(u8),
}

fn write_addr(f: &mut Formatter<'_>, reg: Reg, d: i64) -> Result {
    if d < 0 {
        f.write_fmt(format_args!("[{}-{}]", reg, -d))
    } else if d > 0 {
        f.write_fmt(format_args!("[{}+{}]", reg, d))
    } else {
        f.write_fmt(format_args!("[{}]", reg))
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Operand::*;
        match self {
            Register(reg) => f.write_fmt(format_args!("{}", reg)),
            Integer(i) => f.write_fmt(format_args!("{}", i)),
            MemoryAddr(reg, d) => write_addr(f, *reg, *d),
            QWord(reg, d) => {
                f.write_str("qword ptr ")?;
                write_addr(f, *reg, *d)
            }
            Label(n) => f.write_fmt(format_args!("L{}", n)),
            St(i) => f.write_fmt(format_args!("ST({})", i)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    /// The entry label of a callable, annotated with its name.
    Routine(i64, String),
    Label(i64),
    Comment(String),

    Jmp(Operand),
    Je(Operand),
    Jne(Operand),
    Jl(Operand),
    Jg(Operand),
    Jb(Operand),
    Ja(Operand),
    Call(Operand),
    Leave,
    Ret,

    Push(Operand),
    Mov(Operand, Operand),

    Add(Operand, Operand),
    Sub(Operand, Operand),
    IMul(Operand, Operand),
    IDiv(Reg),
    Cqo,
    Neg(Reg),
    Cmp(Operand, Operand),

    Fld(Operand),
    Fild(Operand),
    Fstp(Operand),
    Fchs,
    Faddp,
    Fsubp,
    Fmulp,
    Fdivp,
    Fcomip(Operand, Operand),
}

impl Display for Inst {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        use Inst::*;
        // Indent instruction?
        match self {
            Routine(..) | Label(_) => (),
            _ => f.write_str("\t\t")?,
        };

        match self {
            Routine(lbl, name) => f.write_fmt(format_args!("L{}:\t\t\t# {}", lbl, name)),
            Label(lbl) => f.write_fmt(format_args!("L{}:", lbl)),
            Comment(comment) => f.write_fmt(format_args!("# {}", comment)),

            Jmp(a) => f.write_fmt(format_args!("jmp\t{}", a)),
            Je(a) => f.write_fmt(format_args!("je\t{}", a)),
            Jne(a) => f.write_fmt(format_args!("jne\t{}", a)),
            Jl(a) => f.write_fmt(format_args!("jl\t{}", a)),
            Jg(a) => f.write_fmt(format_args!("jg\t{}", a)),
            Jb(a) => f.write_fmt(format_args!("jb\t{}", a)),
            Ja(a) => f.write_fmt(format_args!("ja\t{}", a)),
            Call(a) => f.write_fmt(format_args!("call\t{}", a)),
            Leave => f.write_str("leave"),
            Ret => f.write_str("ret"),

            Push(a) => f.write_fmt(format_args!("push\t{}", a)),
            Mov(a, b) => f.write_fmt(format_args!("mov\t{}, {}", a, b)),

            Add(a, b) => f.write_fmt(format_args!("add\t{}, {}", a, b)),
            Sub(a, b) => f.write_fmt(format_args!("sub\t{}, {}", a, b)),
            IMul(a, b) => f.write_fmt(format_args!("imul\t{}, {}", a, b)),
            IDiv(a) => f.write_fmt(format_args!("idiv\t{}", a)),
            Cqo => f.write_str("cqo"),
            Neg(a) => f.write_fmt(format_args!("neg\t{}", a)),
            Cmp(a, b) => f.write_fmt(format_args!("cmp\t{}, {}", a, b)),

            Fld(a) => f.write_fmt(format_args!("fld\t{}", a)),
            Fild(a) => f.write_fmt(format_args!("fild\t{}", a)),
            Fstp(a) => f.write_fmt(format_args!("fstp\t{}", a)),
            Fchs => f.write_str("fchs"),
            Faddp => f.write_str("faddp"),
            Fsubp => f.write_str("fsubp"),
            Fmulp => f.write_str("fmulp"),
            Fdivp => f.write_str("fdivp"),
            Fcomip(a, b) => f.write_fmt(format_args!("fcomip\t{}, {}", a, b)),
        }
    }
}

/// Shorthand for a register operand.
pub fn reg(r: Reg) -> Operand {
    Operand::Register(r)
}

/// Shorthand for an immediate operand.
pub fn imm(i: i64) -> Operand {
    Operand::Integer(i)
}

/// Shorthand for a label operand.
pub fn label(n: i64) -> Operand {
    Operand::Label(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operands() {
        for (op, expected) in vec![
            (reg(Reg::Rax), "rax"),
            (imm(-3), "-3"),
            (Operand::MemoryAddr(Reg::Rbp, -16), "[rbp-16]"),
            (Operand::MemoryAddr(Reg::Rcx, 24), "[rcx+24]"),
            (Operand::MemoryAddr(Reg::Rax, 0), "[rax]"),
            (Operand::QWord(Reg::Rcx, -8), "qword ptr [rcx-8]"),
            (label(12), "L12"),
            (Operand::St(1), "ST(1)"),
        ] {
            assert_eq!(op.to_string(), expected);
        }
    }

    #[test]
    fn test_instructions() {
        for (inst, expected) in vec![
            (Inst::Routine(3, "PROG".into()), "L3:\t\t\t# PROG"),
            (Inst::Label(7), "L7:"),
            (Inst::Comment("EPILOGUE".into()), "\t\t# EPILOGUE"),
            (Inst::Mov(reg(Reg::Rcx), reg(Reg::Rsp)), "\t\tmov\trcx, rsp"),
            (
                Inst::Push(Operand::MemoryAddr(Reg::Rbp, -8)),
                "\t\tpush\t[rbp-8]",
            ),
            (Inst::IDiv(Reg::Rcx), "\t\tidiv\trcx"),
            (Inst::Jmp(label(4)), "\t\tjmp\tL4"),
            (
                Inst::Fcomip(Operand::St(0), Operand::St(1)),
                "\t\tfcomip\tST(0), ST(1)",
            ),
            (Inst::Leave, "\t\tleave"),
        ] {
            assert_eq!(inst.to_string(), expected);
        }
    }
}
