use crate::compiler::{
    ast::*,
    diagnostics::{Diagnostics, ErrorLog},
    semantics::{type_check, SemanticError, Side, TypeChecker},
    symtab::{SymId, SymbolTable},
    InternalError, Position, TableLimits,
};

/// A program with some globals and two routines:
///
/// ```text
/// procedure prog;
///   var i: integer; x: real; v: array[10] of real;
///   function f(a: integer; b: real): real;
///   procedure p;
/// ```
struct Fixture {
    st: SymbolTable,
    log: ErrorLog,
    prog: SymId,
    i: SymId,
    x: SymId,
    v: SymId,
    f: SymId,
    p: SymId,
}

fn setup() -> Fixture {
    let mut st = SymbolTable::new(&TableLimits::default()).unwrap();
    let mut log = ErrorLog::new();

    let prog = st.enter_procedure(&mut log, "prog", None).unwrap();
    st.open_scope().unwrap();
    let i = st
        .enter_variable(&mut log, "i", None, st.integer_type())
        .unwrap();
    let x = st.enter_variable(&mut log, "x", None, st.real_type()).unwrap();
    let v = st
        .enter_array(&mut log, "v", None, st.real_type(), 10)
        .unwrap();

    let f = st
        .enter_function(&mut log, "f", Some(pos(2)), st.real_type())
        .unwrap();
    st.open_scope().unwrap();
    st.enter_parameter(&mut log, "a", None, st.integer_type())
        .unwrap();
    st.enter_parameter(&mut log, "b", None, st.real_type())
        .unwrap();
    st.close_scope().unwrap();

    let p = st.enter_procedure(&mut log, "p", None).unwrap();
    st.open_scope().unwrap();
    st.close_scope().unwrap();

    assert_eq!(log.error_count(), 0);
    Fixture {
        st,
        log,
        prog,
        i,
        x,
        v,
        f,
        p,
    }
}

fn pos(col: u32) -> Position {
    Position::new(1, col)
}

fn int(v: i64) -> Expression {
    Expression::Integer(pos(0), v)
}

fn real(v: f64) -> Expression {
    Expression::Real(pos(0), v)
}

fn id(sym: SymId) -> Expression {
    Expression::Identifier(pos(0), sym)
}

fn check(fx: &mut Fixture, expr: &mut Expression) -> SymId {
    let mut checker = TypeChecker::new(&fx.st, &mut fx.log, fx.prog);
    checker.check_expression(expr).unwrap()
}

fn kinds(log: &ErrorLog) -> Vec<SemanticError> {
    log.errors().iter().map(|e| e.inner().clone()).collect()
}

#[test]
fn test_literals_and_identifiers() {
    let mut fx = setup();
    let integer = fx.st.integer_type();
    let real_ty = fx.st.real_type();
    for (mut expr, expected) in vec![
        (int(1), integer),
        (real(1.5), real_ty),
        (id(fx.i), integer),
        (id(fx.x), real_ty),
        (id(integer), integer),
        (Expression::indexed(pos(0), fx.v, int(2)), real_ty),
    ] {
        assert_eq!(check(&mut fx, &mut expr), expected);
    }
    assert_eq!(fx.log.error_count(), 0);
}

#[test]
fn test_mixed_add_casts_integer_side() {
    let mut fx = setup();
    let mut expr = Expression::binary(pos(3), BinaryOperator::Add, id(fx.i), real(2.5));
    let ty = check(&mut fx, &mut expr);

    let real_ty = fx.st.real_type();
    assert_eq!(ty, real_ty);
    assert_eq!(
        expr,
        Expression::BinaryOp {
            pos: pos(3),
            op: BinaryOperator::Add,
            ty: Some(real_ty),
            left: Box::new(Expression::Cast {
                pos: pos(0),
                ty: real_ty,
                expr: Box::new(id(fx.i)),
            }),
            right: Box::new(real(2.5)),
        }
    );
    assert_eq!(fx.log.error_count(), 0);
}

#[test]
fn test_arithmetic() {
    let mut fx = setup();
    let integer = fx.st.integer_type();
    let real_ty = fx.st.real_type();

    let mut expr = Expression::binary(pos(0), BinaryOperator::Mult, int(2), int(3));
    assert_eq!(check(&mut fx, &mut expr), integer);

    let mut expr = Expression::binary(pos(0), BinaryOperator::Sub, real(2.0), real(3.0));
    assert_eq!(check(&mut fx, &mut expr), real_ty);
    if let Expression::BinaryOp { left, right, .. } = &expr {
        assert!(left.is_literal() && right.is_literal());
    }

    // Division always gives a real
    let mut expr = Expression::binary(pos(0), BinaryOperator::Divide, int(2), int(3));
    assert_eq!(check(&mut fx, &mut expr), real_ty);
    match &expr {
        Expression::BinaryOp { left, right, .. } => {
            assert!(matches!(**left, Expression::Cast { .. }));
            assert!(matches!(**right, Expression::Cast { .. }));
        }
        _ => panic!("Expected a BinaryOp"),
    }
    assert_eq!(fx.log.error_count(), 0);
}

#[test]
fn test_integer_operators() {
    for (op, l, r, expected) in vec![
        (BinaryOperator::Idiv, real(1.0), int(2), Some(Side::Left)),
        (BinaryOperator::Mod, int(1), real(2.0), Some(Side::Right)),
        (BinaryOperator::And, real(1.0), real(2.0), Some(Side::Both)),
        (BinaryOperator::Or, int(1), int(0), None),
    ] {
        let mut fx = setup();
        let mut expr = Expression::binary(pos(4), op, l, r);
        let ty = check(&mut fx, &mut expr);
        match expected {
            Some(side) => {
                assert_eq!(ty, fx.st.void_type());
                assert_eq!(kinds(&fx.log), vec![SemanticError::ExpectedInteger(op, side)]);
            }
            None => {
                assert_eq!(ty, fx.st.integer_type());
                assert_eq!(fx.log.error_count(), 0);
            }
        }
    }
}

#[test]
fn test_relations() {
    let mut fx = setup();
    let mut expr = Expression::relation(pos(0), RelationOperator::Lt, id(fx.i), id(fx.x));
    assert_eq!(check(&mut fx, &mut expr), fx.st.integer_type());
    match &expr {
        Expression::Relation {
            operand_ty, left, ..
        } => {
            assert_eq!(*operand_ty, Some(fx.st.real_type()));
            assert!(matches!(**left, Expression::Cast { .. }));
        }
        _ => panic!("Expected a Relation"),
    }

    // A procedure call has no value
    let call = Expression::FunctionCall {
        pos: pos(0),
        function: fx.p,
        args: vec![],
    };
    let mut expr = Expression::relation(pos(9), RelationOperator::Eq, call, int(1));
    assert_eq!(check(&mut fx, &mut expr), fx.st.void_type());
    assert_eq!(
        kinds(&fx.log),
        vec![SemanticError::RelationVoid(RelationOperator::Eq)]
    );
}

#[test]
fn test_assign_real_to_integer_does_not_mutate() {
    let mut fx = setup();
    let mut body = vec![Statement::Assign {
        pos: pos(1),
        target: id(fx.i),
        value: real(1.5),
    }];
    let before = body.clone();
    type_check(&fx.st, &mut fx.log, fx.prog, &mut body).unwrap();
    assert_eq!(body, before);
    assert!(fx.log.contains(&SemanticError::AssignError));
    assert_eq!(fx.log.error_count(), 1);
}

#[test]
fn test_assign_integer_to_real_casts() {
    let mut fx = setup();
    let mut body = vec![Statement::Assign {
        pos: pos(1),
        target: Expression::indexed(pos(1), fx.v, int(0)),
        value: id(fx.i),
    }];
    type_check(&fx.st, &mut fx.log, fx.prog, &mut body).unwrap();
    match &body[0] {
        Statement::Assign { value, .. } => assert_eq!(
            *value,
            Expression::Cast {
                pos: pos(0),
                ty: fx.st.real_type(),
                expr: Box::new(id(fx.i))
            }
        ),
        _ => panic!("Expected an Assign"),
    }
    assert_eq!(fx.log.error_count(), 0);
}

#[test]
fn test_parameters() {
    // f(a: integer; b: real)
    let mut fx = setup();
    let mut call = Expression::FunctionCall {
        pos: pos(5),
        function: fx.f,
        args: vec![int(1), int(2)],
    };
    assert_eq!(check(&mut fx, &mut call), fx.st.real_type());
    assert_eq!(fx.log.error_count(), 0);
    match &call {
        Expression::FunctionCall { args, .. } => {
            assert_eq!(args[0], int(1));
            assert!(matches!(args[1], Expression::Cast { .. }));
        }
        _ => panic!("Expected a FunctionCall"),
    }

    for args in vec![vec![int(1)], vec![real(1.0), real(2.0)], vec![int(1), int(2), int(3)]] {
        let mut fx = setup();
        let mut call = Expression::FunctionCall {
            pos: pos(5),
            function: fx.f,
            args,
        };
        check(&mut fx, &mut call);
        assert_eq!(kinds(&fx.log), vec![SemanticError::ParameterError("F".into())]);
    }
}

#[test]
fn test_builtin_parameters() {
    let mut fx = setup();
    let write = fx.st.lookup_symbol("write").unwrap();
    let trunc = fx.st.lookup_symbol("trunc").unwrap();
    let mut body = vec![Statement::ProcedureCall {
        pos: pos(1),
        routine: write,
        args: vec![Expression::FunctionCall {
            pos: pos(2),
            function: trunc,
            args: vec![int(7)],
        }],
    }];
    type_check(&fx.st, &mut fx.log, fx.prog, &mut body).unwrap();
    assert_eq!(fx.log.error_count(), 0);
}

#[test]
fn test_conditions() {
    let mut fx = setup();
    let mut body = vec![
        Statement::While {
            pos: pos(1),
            cond: real(1.0),
            body: vec![],
        },
        Statement::If {
            pos: pos(2),
            cond: real(1.0),
            body: vec![],
            elsifs: vec![Elsif {
                pos: pos(3),
                cond: real(2.0),
                body: vec![],
            }],
            otherwise: Some(vec![Statement::Assign {
                pos: pos(4),
                target: id(fx.i),
                value: Expression::indexed(pos(4), fx.v, real(1.0)),
            }]),
        },
    ];
    type_check(&fx.st, &mut fx.log, fx.prog, &mut body).unwrap();
    assert_eq!(
        kinds(&fx.log),
        vec![
            SemanticError::WhilePredicate,
            SemanticError::IfPredicate,
            SemanticError::ElsifPredicate,
            SemanticError::InvalidIndexType,
            SemanticError::AssignError,
        ]
    );
}

#[test]
fn test_unary() {
    let mut fx = setup();
    let mut expr = Expression::unary(pos(0), UnaryOperator::Negate, real(1.0));
    assert_eq!(check(&mut fx, &mut expr), fx.st.real_type());

    let mut expr = Expression::unary(pos(0), UnaryOperator::Not, int(1));
    assert_eq!(check(&mut fx, &mut expr), fx.st.integer_type());

    let mut expr = Expression::unary(pos(0), UnaryOperator::Not, real(1.0));
    assert_eq!(check(&mut fx, &mut expr), fx.st.void_type());
    assert_eq!(kinds(&fx.log), vec![SemanticError::NotInvalidType]);
}

#[test]
fn test_returns() {
    let ret = |value| Statement::Return { pos: pos(1), value };

    // (callable is a function, body, expected errors)
    for (in_function, mut body, expected) in vec![
        (true, vec![ret(Some(real(1.0)))], vec![]),
        (true, vec![], vec![SemanticError::FunctionMustReturn]),
        (
            true,
            vec![ret(Some(int(1)))],
            vec![SemanticError::FunctionBadReturnType],
        ),
        (true, vec![ret(None)], vec![SemanticError::FunctionNoReturnValue]),
        (false, vec![ret(None)], vec![]),
        (false, vec![], vec![]),
        (
            false,
            vec![ret(Some(int(1)))],
            vec![SemanticError::ProcedureReturnsValue],
        ),
    ] {
        let mut fx = setup();
        let env = if in_function { fx.f } else { fx.p };
        type_check(&fx.st, &mut fx.log, env, &mut body).unwrap();
        assert_eq!(kinds(&fx.log), expected);
    }
}

#[test]
fn test_must_return_is_reported_at_declaration() {
    let mut fx = setup();
    type_check(&fx.st, &mut fx.log, fx.f, &mut vec![]).unwrap();
    assert_eq!(fx.log.errors()[0].position(), Some(pos(2)));
}

#[test]
fn test_call_of_non_routine_is_internal_error() {
    let mut fx = setup();
    let mut call = Expression::FunctionCall {
        pos: pos(0),
        function: fx.i,
        args: vec![],
    };
    let mut checker = TypeChecker::new(&fx.st, &mut fx.log, fx.prog);
    assert_eq!(
        checker.check_expression(&mut call),
        Err(InternalError::NotCallable(fx.i))
    );
}
