use std::{cell::Cell, cmp::Ordering, collections::HashMap, io::Write, rc::Rc};

use crate::compiler::{
    ast::*,
    diagnostics::{Diagnostics, ErrorLog},
    optimize::fold,
    quads::{lower, QuadArg, QuadList, QuadOp, Quadruple},
    semantics::type_check,
    symtab::{ConstValue, SymId, SymbolTable},
    FatalError, InternalError, Position, TableLimits,
};

use super::*;

/// Executes the integer subset of the emitted assembly, from the first
/// instruction until the `leave` of the epilogue.
struct Machine {
    regs: HashMap<String, i64>,
    mem: HashMap<i64, i64>,
    flags: Ordering,
}

impl Machine {
    fn new(rbp: i64, rsp: i64) -> Machine {
        let mut regs = HashMap::new();
        regs.insert("rbp".to_string(), rbp);
        regs.insert("rsp".to_string(), rsp);
        Machine {
            regs,
            mem: HashMap::new(),
            flags: Ordering::Equal,
        }
    }

    fn reg(&self, r: &str) -> i64 {
        *self.regs.get(r).unwrap_or(&0)
    }

    fn load(&self, addr: i64) -> i64 {
        *self.mem.get(&addr).unwrap_or(&0)
    }

    fn push(&mut self, v: i64) {
        let rsp = self.reg("rsp") - 8;
        self.regs.insert("rsp".into(), rsp);
        self.mem.insert(rsp, v);
    }

    fn address(&self, op: &str) -> Option<i64> {
        let inner = op.strip_prefix('[')?.strip_suffix(']')?;
        let addr = if let Some(pos) = inner.find(|c| c == '+' || c == '-') {
            let disp: i64 = inner[pos + 1..].parse().unwrap();
            let base = self.reg(&inner[..pos]);
            if &inner[pos..pos + 1] == "+" {
                base + disp
            } else {
                base - disp
            }
        } else {
            self.reg(inner)
        };
        Some(addr)
    }

    fn value(&self, op: &str) -> i64 {
        match self.address(op) {
            Some(addr) => self.load(addr),
            None => match op.parse() {
                Ok(v) => v,
                Err(_) => self.reg(op),
            },
        }
    }

    fn set(&mut self, op: &str, v: i64) {
        match self.address(op) {
            Some(addr) => {
                self.mem.insert(addr, v);
            }
            None => {
                self.regs.insert(op.into(), v);
            }
        }
    }

    fn run(&mut self, asm: &str) {
        let mut labels = HashMap::new();
        let mut code = vec![];
        for line in asm.lines() {
            if line.starts_with('L') {
                let name = &line[..line.find(':').unwrap()];
                labels.insert(name.to_string(), code.len());
            } else if !line.trim().starts_with('#') {
                code.push(line.trim());
            }
        }

        let mut pc = 0;
        let mut steps = 0;
        while pc < code.len() {
            steps += 1;
            assert!(steps < 100_000, "Runaway program");

            let mut parts = code[pc].splitn(2, '\t');
            let mnemonic = parts.next().unwrap();
            let ops: Vec<&str> = parts.next().map(|o| o.split(", ").collect()).unwrap_or_default();
            pc += 1;

            let jump = |cond: bool, pc: &mut usize| {
                if cond {
                    *pc = labels[ops[0]];
                }
            };
            match mnemonic {
                "push" => {
                    let v = self.value(ops[0]);
                    self.push(v);
                }
                "mov" => {
                    let v = self.value(ops[1]);
                    self.set(ops[0], v);
                }
                "add" => {
                    let v = self.value(ops[0]).wrapping_add(self.value(ops[1]));
                    self.set(ops[0], v);
                }
                "sub" => {
                    let v = self.value(ops[0]).wrapping_sub(self.value(ops[1]));
                    self.set(ops[0], v);
                }
                "imul" => {
                    let v = self.value(ops[0]).wrapping_mul(self.value(ops[1]));
                    self.set(ops[0], v);
                }
                "neg" => {
                    let v = -self.value(ops[0]);
                    self.set(ops[0], v);
                }
                "cqo" => {
                    let rdx = if self.reg("rax") < 0 { -1 } else { 0 };
                    self.regs.insert("rdx".into(), rdx);
                }
                "idiv" => {
                    let (rax, divisor) = (self.reg("rax"), self.value(ops[0]));
                    self.regs.insert("rax".into(), rax / divisor);
                    self.regs.insert("rdx".into(), rax % divisor);
                }
                "cmp" => self.flags = self.value(ops[0]).cmp(&self.value(ops[1])),
                "jmp" => jump(true, &mut pc),
                "je" => jump(self.flags == Ordering::Equal, &mut pc),
                "jne" => jump(self.flags != Ordering::Equal, &mut pc),
                "jl" => jump(self.flags == Ordering::Less, &mut pc),
                "jg" => jump(self.flags == Ordering::Greater, &mut pc),
                "leave" => return,
                other => panic!("Unsupported instruction: {}", other),
            }
        }
    }
}

fn pos() -> Position {
    Position::new(1, 1)
}

fn id(sym: SymId) -> Expression {
    Expression::Identifier(pos(), sym)
}

fn int(v: i64) -> Expression {
    Expression::Integer(pos(), v)
}

fn assign(target: Expression, value: Expression) -> Statement {
    Statement::Assign {
        pos: pos(),
        target,
        value,
    }
}

fn quad(op: QuadOp, arg1: QuadArg, arg2: QuadArg, arg3: QuadArg) -> Quadruple {
    Quadruple::new(op, arg1, arg2, arg3)
}

fn generate(st: &mut SymbolTable, env: SymId, quads: &QuadList, trace: bool) -> String {
    let mut buf = vec![];
    {
        let mut gen = CodeGenerator::new(&mut buf, trace);
        gen.generate(st, env, quads).unwrap();
    }
    String::from_utf8(buf).unwrap()
}

/// Run the body of `env` through the whole backend.
fn compile(st: &mut SymbolTable, env: SymId, mut body: StatementList) -> String {
    let mut log = ErrorLog::new();
    type_check(st, &mut log, env, &mut body).unwrap();
    assert_eq!(log.error_count(), 0);
    fold(st, env, &mut body).unwrap();
    let quads = lower(st, env, &body).unwrap();
    generate(st, env, &quads, false)
}

fn frame_offset(st: &SymbolTable, sym: SymId) -> i64 {
    CodeGenerator::<Vec<u8>>::find(st, sym).unwrap().1
}

fn new_program() -> (SymbolTable, ErrorLog, SymId) {
    let mut st = SymbolTable::new(&TableLimits::default()).unwrap();
    let mut log = ErrorLog::new();
    let prog = st.enter_procedure(&mut log, "prog", None).unwrap();
    st.open_scope().unwrap();
    (st, log, prog)
}

#[test]
fn test_procedure_text() {
    let (mut st, mut log, prog) = new_program();
    let a = st
        .enter_variable(&mut log, "a", None, st.integer_type())
        .unwrap();

    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Iload, QuadArg::Int(7), QuadArg::Unused, QuadArg::Sym(a)));
    quads.push(quad(QuadOp::Labl, QuadArg::Int(4), QuadArg::Unused, QuadArg::Unused));

    let asm = generate(&mut st, prog, &quads, false);
    assert_eq!(
        asm,
        "L3:\t\t\t# PROG\n\
         \t\tpush\trbp\n\
         \t\tmov\trcx, rsp\n\
         \t\tpush\trcx\n\
         \t\tmov\trbp, rcx\n\
         \t\tsub\trsp, 8\n\
         \t\tmov\trax, 7\n\
         \t\tmov\trcx, [rbp-8]\n\
         \t\tmov\t[rcx-16], rax\n\
         L4:\n\
         \t\tleave\n\
         \t\tret\n"
    );
}

#[test]
fn test_nested_prologue_copies_display() {
    let (mut st, mut log, _) = new_program();
    let inner = st.enter_procedure(&mut log, "inner", None).unwrap();
    st.open_scope().unwrap();
    st.enter_array(&mut log, "v", None, st.integer_type(), 3)
        .unwrap();

    let quads = QuadList::new(10);
    let asm = generate(&mut st, inner, &quads, false);
    let lines: Vec<&str> = asm.lines().collect();
    assert_eq!(
        lines,
        vec![
            "L4:\t\t\t# INNER",
            "\t\tpush\trbp",
            "\t\tmov\trcx, rsp",
            "\t\tpush\t[rbp-8]",
            "\t\tpush\trcx",
            "\t\tmov\trbp, rcx",
            "\t\tsub\trsp, 24",
            "\t\tleave",
            "\t\tret",
        ]
    );
}

#[test]
fn test_trace_comments() {
    let (mut st, mut log, prog) = new_program();
    let a = st
        .enter_variable(&mut log, "a", None, st.integer_type())
        .unwrap();
    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Iassign, QuadArg::Sym(a), QuadArg::Unused, QuadArg::Sym(a)));
    quads.push(quad(QuadOp::Labl, QuadArg::Int(4), QuadArg::Unused, QuadArg::Unused));

    let asm = generate(&mut st, prog, &quads, true);
    let comments: Vec<&str> = asm
        .lines()
        .filter(|l| l.trim_start().starts_with('#'))
        .map(|l| l.trim_start())
        .collect();
    assert_eq!(
        comments,
        vec![
            format!("# PROLOGUE (PROG)"),
            format!("# QUAD 1: (q_iassign, #{}, -, #{})", a, a),
            format!("# QUAD 2: (q_labl, 4, -, -)"),
            format!("# EPILOGUE (PROG)"),
        ]
    );

    // The label comes before the trace of its quad
    let lines: Vec<&str> = asm.lines().collect();
    let label = lines.iter().position(|l| *l == "L4:").unwrap();
    assert_eq!(lines[label + 1], "\t\t# QUAD 2: (q_labl, 4, -, -)");
}

#[test]
fn test_find() {
    let (mut st, mut log, _) = new_program();
    let a = st
        .enter_variable(&mut log, "a", None, st.integer_type())
        .unwrap();
    let f = st
        .enter_function(&mut log, "f", None, st.integer_type())
        .unwrap();
    st.open_scope().unwrap();
    let p1 = st
        .enter_parameter(&mut log, "p1", None, st.integer_type())
        .unwrap();
    let p2 = st
        .enter_parameter(&mut log, "p2", None, st.real_type())
        .unwrap();
    let b = st
        .enter_variable(&mut log, "b", None, st.integer_type())
        .unwrap();

    type Gen = CodeGenerator<Vec<u8>>;
    assert_eq!(Gen::find(&st, a).unwrap(), (1, -16));
    assert_eq!(Gen::find(&st, b).unwrap(), (2, -24));
    assert_eq!(Gen::find(&st, p2).unwrap(), (2, 16));
    assert_eq!(Gen::find(&st, p1).unwrap(), (2, 24));
    assert_eq!(
        Gen::find(&st, f).unwrap_err(),
        InternalError::UnsupportedAddress(f)
    );
}

#[test]
fn test_integer_arithmetic_executes() {
    let (mut st, mut log, prog) = new_program();
    let mut var = |name: &str| {
        st.enter_variable(&mut log, name, None, st.integer_type())
            .unwrap()
    };
    let a = var("a");
    let b = var("b");
    let zero = var("zero");
    let results: Vec<SymId> = (0..14).map(|i| var(&format!("r{}", i))).collect();

    use QuadArg::*;
    let end = st.get_next_label();
    let mut quads = QuadList::new(end);
    quads.push(quad(QuadOp::Iload, Int(17), Unused, Sym(a)));
    quads.push(quad(QuadOp::Iload, Int(-5), Unused, Sym(b)));
    quads.push(quad(QuadOp::Iload, Int(0), Unused, Sym(zero)));
    let binary = vec![
        (QuadOp::Iplus, a, b, 12),
        (QuadOp::Iminus, a, b, 22),
        (QuadOp::Imult, a, b, -85),
        (QuadOp::Idivide, a, b, -3),
        (QuadOp::Imod, a, b, 2),
        (QuadOp::Ilt, a, b, 0),
        (QuadOp::Igt, a, b, 1),
        (QuadOp::Ieq, a, a, 1),
        (QuadOp::Ine, a, a, 0),
        (QuadOp::Iand, a, zero, 0),
        (QuadOp::Ior, zero, b, 1),
    ];
    for ((op, l, r, _), dest) in binary.iter().zip(results.iter()) {
        quads.push(quad(*op, Sym(*l), Sym(*r), Sym(*dest)));
    }
    quads.push(quad(QuadOp::Inot, Sym(zero), Unused, Sym(results[11])));
    quads.push(quad(QuadOp::Iuminus, Sym(a), Unused, Sym(results[12])));
    quads.push(quad(QuadOp::Iand, Sym(a), Sym(b), Sym(results[13])));
    quads.push(quad(QuadOp::Labl, Int(end), Unused, Unused));

    let asm = generate(&mut st, prog, &quads, false);
    let mut m = Machine::new(10_000, 10_000);
    m.run(&asm);
    let frame = m.reg("rbp");

    let mut expected: Vec<i64> = binary.iter().map(|b| b.3).collect();
    expected.extend(vec![1, -17, 1]);
    for (dest, value) in results.iter().zip(expected) {
        assert_eq!(m.load(frame + frame_offset(&st, *dest)), value);
    }
}

#[test]
fn test_arrays_execute() {
    let (mut st, mut log, prog) = new_program();
    let v = st
        .enter_array(&mut log, "v", None, st.integer_type(), 5)
        .unwrap();
    let i = st
        .enter_variable(&mut log, "i", None, st.integer_type())
        .unwrap();
    let r = st
        .enter_variable(&mut log, "r", None, st.integer_type())
        .unwrap();

    let asm = compile(
        &mut st,
        prog,
        vec![
            assign(id(i), int(3)),
            assign(Expression::indexed(pos(), v, id(i)), int(99)),
            assign(
                id(r),
                Expression::binary(
                    pos(),
                    BinaryOperator::Add,
                    Expression::indexed(pos(), v, int(3)),
                    int(1),
                ),
            ),
        ],
    );

    let mut m = Machine::new(10_000, 10_000);
    m.run(&asm);
    let frame = m.reg("rbp");
    let base = frame + frame_offset(&st, v);
    assert_eq!(m.load(base - 3 * 8), 99);
    assert_eq!(m.load(frame + frame_offset(&st, r)), 100);
}

#[test]
fn test_while_loop_executes() {
    let (mut st, mut log, prog) = new_program();
    let i = st
        .enter_variable(&mut log, "i", None, st.integer_type())
        .unwrap();
    let s = st
        .enter_variable(&mut log, "s", None, st.integer_type())
        .unwrap();
    let ten = st
        .enter_constant(&mut log, "ten", None, ConstValue::Integer(10))
        .unwrap();

    let asm = compile(
        &mut st,
        prog,
        vec![
            assign(id(i), id(ten)),
            assign(id(s), int(0)),
            Statement::While {
                pos: pos(),
                cond: Expression::relation(pos(), RelationOperator::Gt, id(i), int(0)),
                body: vec![
                    assign(id(s), Expression::binary(pos(), BinaryOperator::Add, id(s), id(i))),
                    assign(id(i), Expression::binary(pos(), BinaryOperator::Sub, id(i), int(1))),
                ],
            },
        ],
    );

    let mut m = Machine::new(10_000, 10_000);
    m.run(&asm);
    let frame = m.reg("rbp");
    assert_eq!(m.load(frame + frame_offset(&st, s)), 55);
    assert_eq!(m.load(frame + frame_offset(&st, i)), 0);
}

#[test]
fn test_parameters_execute() {
    let mut st = SymbolTable::new(&TableLimits::default()).unwrap();
    let mut log = ErrorLog::new();
    let f = st
        .enter_function(&mut log, "f", None, st.integer_type())
        .unwrap();
    st.open_scope().unwrap();
    let a = st
        .enter_parameter(&mut log, "a", None, st.integer_type())
        .unwrap();
    let b = st
        .enter_parameter(&mut log, "b", None, st.integer_type())
        .unwrap();

    let asm = compile(
        &mut st,
        f,
        vec![Statement::Return {
            pos: pos(),
            value: Some(Expression::binary(pos(), BinaryOperator::Sub, id(a), id(b))),
        }],
    );

    // The caller pushes the parameters in order, then the return address
    let mut m = Machine::new(10_000, 10_000);
    m.push(50);
    m.push(8);
    m.push(0);
    m.run(&asm);
    assert_eq!(m.reg("rax"), 42);
}

#[test]
fn test_outer_variable_through_display() {
    let (mut st, mut log, _) = new_program();
    let x = st
        .enter_variable(&mut log, "x", None, st.integer_type())
        .unwrap();
    let inner = st.enter_procedure(&mut log, "inner", None).unwrap();
    st.open_scope().unwrap();

    let asm = compile(&mut st, inner, vec![assign(id(x), int(5))]);

    // The caller is the outer procedure, whose own frame is in its display
    let outer_frame = 10_000;
    let mut m = Machine::new(outer_frame, outer_frame - 64);
    m.mem.insert(outer_frame - 8, outer_frame);
    m.run(&asm);
    assert_ne!(m.reg("rbp"), outer_frame);
    assert_eq!(m.load(outer_frame + frame_offset(&st, x)), 5);
}

#[test]
fn test_real_operations_text() {
    let (mut st, mut log, prog) = new_program();
    let x = st.enter_variable(&mut log, "x", None, st.real_type()).unwrap();
    let y = st.enter_variable(&mut log, "y", None, st.real_type()).unwrap();
    let r = st
        .enter_variable(&mut log, "r", None, st.integer_type())
        .unwrap();
    let i = st
        .enter_variable(&mut log, "i", None, st.integer_type())
        .unwrap();

    use QuadArg::*;
    let mut quads = QuadList::new(st.get_next_label());
    quads.push(quad(QuadOp::Rlt, Sym(x), Sym(y), Sym(r)));
    quads.push(quad(QuadOp::Rminus, Sym(x), Sym(y), Sym(x)));
    quads.push(quad(QuadOp::Itor, Sym(i), Unused, Sym(y)));
    quads.push(quad(QuadOp::Labl, Int(4), Unused, Unused));
    let asm = generate(&mut st, prog, &quads, false);
    let body: Vec<&str> = asm.lines().skip(6).collect();

    // x at -16, y at -24, r at -32 and i at -40. Labels 5 and 6 are taken by
    // the comparison.
    assert_eq!(
        body,
        vec![
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfld\tqword ptr [rcx-24]",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfld\tqword ptr [rcx-16]",
            "\t\tfcomip\tST(0), ST(1)",
            "\t\tfstp\tST(0)",
            "\t\tjb\tL5",
            "\t\tmov\trax, 0",
            "\t\tjmp\tL6",
            "L5:",
            "\t\tmov\trax, 1",
            "L6:",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tmov\t[rcx-32], rax",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfld\tqword ptr [rcx-16]",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfld\tqword ptr [rcx-24]",
            "\t\tfsubp",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfstp\tqword ptr [rcx-16]",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfild\tqword ptr [rcx-40]",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tfstp\tqword ptr [rcx-24]",
            "L4:",
            "\t\tleave",
            "\t\tret",
        ]
    );
}

#[test]
fn test_calls_text() {
    let (mut st, mut log, prog) = new_program();
    let a = st
        .enter_variable(&mut log, "a", None, st.integer_type())
        .unwrap();
    let f = st
        .enter_function(&mut log, "f", None, st.integer_type())
        .unwrap();
    st.open_scope().unwrap();
    st.enter_parameter(&mut log, "p", None, st.integer_type())
        .unwrap();
    st.close_scope().unwrap();

    use QuadArg::*;
    let mut quads = QuadList::new(5);
    quads.push(quad(QuadOp::Param, Sym(a), Unused, Unused));
    quads.push(quad(QuadOp::Call, Sym(f), Int(1), Sym(a)));
    quads.push(quad(QuadOp::Call, Sym(prog), Int(0), Unused));
    quads.push(quad(QuadOp::Labl, Int(5), Unused, Unused));
    let asm = generate(&mut st, prog, &quads, false);
    let body: Vec<&str> = asm.lines().skip(6).collect();
    assert_eq!(
        body,
        vec![
            "\t\tmov\trcx, [rbp-8]",
            "\t\tmov\trax, [rcx-16]",
            "\t\tpush\trax",
            "\t\tcall\tL4",
            "\t\tmov\trcx, [rbp-8]",
            "\t\tmov\t[rcx-16], rax",
            "\t\tadd\trsp, 8",
            "\t\tcall\tL3",
            "\t\tadd\trsp, 0",
            "L5:",
            "\t\tleave",
            "\t\tret",
        ]
    );
}

#[test]
fn test_fatal_conditions() {
    let (mut st, mut log, prog) = new_program();
    let a = st
        .enter_variable(&mut log, "a", None, st.integer_type())
        .unwrap();
    let c = st
        .enter_constant(&mut log, "c", None, ConstValue::Integer(1))
        .unwrap();

    let mut buf = vec![];
    let mut gen = CodeGenerator::new(&mut buf, false);

    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Nop, QuadArg::Unused, QuadArg::Unused, QuadArg::Unused));
    match gen.generate(&mut st, prog, &quads) {
        Err(FatalError::Internal(InternalError::NopQuad(1))) => (),
        r => panic!("Expected a nop error, got {:?}", r),
    }

    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Iassign, QuadArg::Sym(c), QuadArg::Unused, QuadArg::Sym(a)));
    match gen.generate(&mut st, prog, &quads) {
        Err(FatalError::Internal(InternalError::ConstantFetch(id))) => assert_eq!(id, c),
        r => panic!("Expected a constant fetch error, got {:?}", r),
    }

    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Iassign, QuadArg::Sym(prog), QuadArg::Unused, QuadArg::Sym(a)));
    match gen.generate(&mut st, prog, &quads) {
        Err(FatalError::Internal(InternalError::UnsupportedAddress(id))) => assert_eq!(id, prog),
        r => panic!("Expected an address error, got {:?}", r),
    }

    let mut quads = QuadList::new(4);
    quads.push(quad(QuadOp::Iassign, QuadArg::Int(1), QuadArg::Unused, QuadArg::Sym(a)));
    match gen.generate(&mut st, prog, &quads) {
        Err(FatalError::Internal(InternalError::MissingOperand(1))) => (),
        r => panic!("Expected a missing operand error, got {:?}", r),
    }

    match gen.generate(&mut st, a, &QuadList::new(4)) {
        Err(FatalError::Internal(InternalError::NotCallable(id))) => assert_eq!(id, a),
        r => panic!("Expected a not callable error, got {:?}", r),
    }
}

struct FlushCounter(Rc<Cell<usize>>);

impl Write for FlushCounter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.set(self.0.get() + 1);
        Ok(())
    }
}

#[test]
fn test_output_is_flushed_on_drop() {
    let flushes = Rc::new(Cell::new(0));
    {
        let _gen = CodeGenerator::new(FlushCounter(flushes.clone()), false);
    }
    assert_eq!(flushes.get(), 1);
}
