use crate::compiler::{symtab::SymId, InternalError};

/// The operations of the intermediate representation. The `i` and `r`
/// prefixes select the integer or the real variant of an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuadOp {
    Rload,
    Iload,
    Inot,
    Ruminus,
    Iuminus,
    Rplus,
    Iplus,
    Rminus,
    Iminus,
    Ior,
    Iand,
    Rmult,
    Imult,
    Rdivide,
    Idivide,
    Imod,
    Req,
    Ieq,
    Rne,
    Ine,
    Rlt,
    Ilt,
    Rgt,
    Igt,
    Rstore,
    Istore,
    Rassign,
    Iassign,
    Call,
    Rreturn,
    Ireturn,
    Lindex,
    Rrindex,
    Irindex,
    Itor,
    Jmp,
    Jmpf,
    Param,
    Labl,
    Nop,
}

impl std::fmt::Display for QuadOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use QuadOp::*;
        let op = match self {
            Rload => "q_rload",
            Iload => "q_iload",
            Inot => "q_inot",
            Ruminus => "q_ruminus",
            Iuminus => "q_iuminus",
            Rplus => "q_rplus",
            Iplus => "q_iplus",
            Rminus => "q_rminus",
            Iminus => "q_iminus",
            Ior => "q_ior",
            Iand => "q_iand",
            Rmult => "q_rmult",
            Imult => "q_imult",
            Rdivide => "q_rdivide",
            Idivide => "q_idivide",
            Imod => "q_imod",
            Req => "q_req",
            Ieq => "q_ieq",
            Rne => "q_rne",
            Ine => "q_ine",
            Rlt => "q_rlt",
            Ilt => "q_ilt",
            Rgt => "q_rgt",
            Igt => "q_igt",
            Rstore => "q_rstore",
            Istore => "q_istore",
            Rassign => "q_rassign",
            Iassign => "q_iassign",
            Call => "q_call",
            Rreturn => "q_rreturn",
            Ireturn => "q_ireturn",
            Lindex => "q_lindex",
            Rrindex => "q_rrindex",
            Irindex => "q_irindex",
            Itor => "q_itor",
            Jmp => "q_jmp",
            Jmpf => "q_jmpf",
            Param => "q_param",
            Labl => "q_labl",
            Nop => "q_nop",
        };
        f.write_str(op)
    }
}

/// An operand slot of a quadruple. What a slot holds depends on the
/// operation: a symbol, a literal (a value, a label number or a count), or
/// nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QuadArg {
    Sym(SymId),
    Int(i64),
    Unused,
}

impl std::fmt::Display for QuadArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuadArg::Sym(id) => f.write_fmt(format_args!("#{}", id)),
            QuadArg::Int(i) => f.write_fmt(format_args!("{}", i)),
            QuadArg::Unused => f.write_str("-"),
        }
    }
}

/// A three address instruction.
///
/// | op | arg1 | arg2 | arg3 |
/// |----|------|------|------|
/// | `iload`, `rload` | value | | dest |
/// | `inot`, `iuminus`, `ruminus`, `itor`, `iassign`, `rassign` | src | | dest |
/// | arithmetic, logic and relations | left | right | dest |
/// | `istore`, `rstore` | value | | address |
/// | `lindex`, `irindex`, `rrindex` | array | index | dest |
/// | `call` | routine | #params | dest (functions only) |
/// | `ireturn`, `rreturn` | label | value | |
/// | `jmpf` | label | condition | |
/// | `jmp`, `labl` | label | | |
/// | `param` | value | | |
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quadruple {
    pub op: QuadOp,
    pub arg1: QuadArg,
    pub arg2: QuadArg,
    pub arg3: QuadArg,
}

impl Quadruple {
    pub fn new(op: QuadOp, arg1: QuadArg, arg2: QuadArg, arg3: QuadArg) -> Quadruple {
        Quadruple {
            op,
            arg1,
            arg2,
            arg3,
        }
    }

    pub fn sym1(&self, idx: usize) -> Result<SymId, InternalError> {
        as_sym(self.arg1, idx)
    }

    pub fn sym2(&self, idx: usize) -> Result<SymId, InternalError> {
        as_sym(self.arg2, idx)
    }

    pub fn sym3(&self, idx: usize) -> Result<SymId, InternalError> {
        as_sym(self.arg3, idx)
    }

    pub fn int1(&self, idx: usize) -> Result<i64, InternalError> {
        as_int(self.arg1, idx)
    }

    pub fn int2(&self, idx: usize) -> Result<i64, InternalError> {
        as_int(self.arg2, idx)
    }
}

fn as_sym(arg: QuadArg, idx: usize) -> Result<SymId, InternalError> {
    match arg {
        QuadArg::Sym(id) => Ok(id),
        _ => Err(InternalError::MissingOperand(idx)),
    }
}

fn as_int(arg: QuadArg, idx: usize) -> Result<i64, InternalError> {
    match arg {
        QuadArg::Int(i) => Ok(i),
        _ => Err(InternalError::MissingOperand(idx)),
    }
}

impl std::fmt::Display for Quadruple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "({}, {}, {}, {})",
            self.op, self.arg1, self.arg2, self.arg3
        ))
    }
}

/// The quadruples of a single callable's body. `last_label` is the label
/// of the callable's epilogue, which every return jumps to.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadList {
    quads: Vec<Quadruple>,
    last_label: i64,
}

impl QuadList {
    pub fn new(last_label: i64) -> QuadList {
        QuadList {
            quads: vec![],
            last_label,
        }
    }

    pub fn last_label(&self) -> i64 {
        self.last_label
    }

    pub fn push(&mut self, quad: Quadruple) {
        self.quads.push(quad)
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<Quadruple> {
        self.quads.iter()
    }
}

impl std::fmt::Display for QuadList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, quad) in self.quads.iter().enumerate() {
            f.write_fmt(format_args!("{:>4}: {}\n", idx + 1, quad))?;
        }
        Ok(())
    }
}
