#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use fz_diagnostic::ErrorCode;
use fz_ir::{AccessSite, ClazzId, ClazzKind, ClazzPool, Expr, NoTailCalls, Span};

use super::intrinsics::{lookup, Instr32, Instr64, Intrinsic};
use crate::bytecode::Cond;
use crate::test_helpers::{
    call_global, call_site, compile, compile_with, i32_call, i32_op, main_routine, matching, run,
    set_field, set_result, Machine, Trap, Value,
};
use crate::{names, ConstantPolicy, JvmBackend, JvmError, JvmOptions};

/// `if cond then a else b` as a match on `bool`.
fn if_else(pool: &mut ClazzPool, caller: ClazzId, cond: Expr, then: Expr, otherwise: Expr) -> Expr {
    matching(
        pool,
        caller,
        ClazzId::BOOL,
        cond,
        vec![(vec![1], None, then), (vec![0], None, otherwise)],
    )
}

/// A routine `name` returning `value`.
fn returning(pool: &mut ClazzPool, name: &str, result: ClazzId, value: Expr) -> ClazzId {
    let cl = main_routine(pool, name, result);
    let body = set_result(pool, cl, value);
    pool.set_body(cl, body);
    cl
}

#[test]
fn intrinsic_table() {
    assert_eq!(lookup("i32.infix +"), Some(Intrinsic::IntOp(Instr32::Add)));
    assert_eq!(lookup("u8.infix *"), Some(Intrinsic::IntOp(Instr32::Mul)));
    assert_eq!(lookup("u64.infix -"), Some(Intrinsic::LongOp(Instr64::Sub)));
    assert_eq!(lookup("i16.infix <="), Some(Intrinsic::IntCmp(Cond::ICmpLe)));
    assert_eq!(lookup("i64.infix !="), Some(Intrinsic::LongCmp(Cond::Ne)));
    assert_eq!(lookup("fuzion.std.panic"), Some(Intrinsic::Panic));
    assert_eq!(lookup("f64.infix +"), None);
    assert_eq!(lookup("i32.infix %"), None);
    assert_eq!(lookup("i32"), None);
}

#[test]
fn int_arithmetic() {
    let mut pool = ClazzPool::new();
    let plus = i32_op(&mut pool, "+", ClazzId::I32);
    let times = i32_op(&mut pool, "*", ClazzId::I32);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let product = i32_call(&mut pool, main, times, Expr::i32(6), Expr::i32(7));
    let sum = i32_call(&mut pool, main, plus, product, Expr::i32(-2));
    let body = set_result(&mut pool, main, sum);
    pool.set_body(main, body);

    let program = compile(&pool);
    assert_eq!(run(&program, &pool, main, Vec::new()), Ok(Some(Value::Int(40))));
}

#[test]
fn long_arithmetic_and_comparison() {
    let mut pool = ClazzPool::new();
    let minus = pool.declare("i64.infix -", ClazzKind::Intrinsic, ClazzId::I64, ClazzId::I64);
    let less = pool.declare("i64.infix <", ClazzKind::Intrinsic, ClazzId::I64, ClazzId::BOOL);
    let main = main_routine(&mut pool, "main", ClazzId::I64);
    let site = call_site(&mut pool, main, ClazzId::I64, minus);
    let difference = Expr::call(site, Expr::i64(1 << 40), vec![Expr::i64(1)]);
    let site = call_site(&mut pool, main, ClazzId::I64, less);
    let cond = Expr::call(site, Expr::i64(-3), vec![Expr::i64(2)]);
    let then = set_result(&mut pool, main, difference);
    let otherwise = set_result(&mut pool, main, Expr::i64(0));
    let body = if_else(&mut pool, main, cond, then, otherwise);
    pool.set_body(main, body);

    let program = compile(&pool);
    assert_eq!(
        run(&program, &pool, main, Vec::new()),
        Ok(Some(Value::Long((1 << 40) - 1)))
    );
}

#[test]
fn routine_arguments() {
    let mut pool = ClazzPool::new();
    let minus = i32_op(&mut pool, "-", ClazzId::I32);
    let sub = main_routine(&mut pool, "sub", ClazzId::I32);
    pool.arg(sub, "a", ClazzId::I32);
    pool.arg(sub, "b", ClazzId::I64);
    pool.arg(sub, "c", ClazzId::I32);
    let value = i32_call(&mut pool, sub, minus, Expr::Arg(0), Expr::Arg(2));
    let body = set_result(&mut pool, sub, value);
    pool.set_body(sub, body);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let call = call_global(&mut pool, main, sub, vec![Expr::i32(10), Expr::i64(99), Expr::i32(3)]);
    let body = set_result(&mut pool, main, call);
    pool.set_body(main, body);

    let program = compile(&pool);
    assert_eq!(run(&program, &pool, main, Vec::new()), Ok(Some(Value::Int(7))));
    let desc = &program
        .class(&names::class(&pool, sub))
        .unwrap()
        .methods
        .iter()
        .find(|m| m.name == names::ROUTINE)
        .unwrap()
        .desc;
    assert_eq!(desc.to_string(), "(IJI)I");
}

/// `count(n, acc) = if n = 0 then acc else count(n - 1, acc + 1)`.
fn counter(pool: &mut ClazzPool) -> ClazzId {
    let eq = i32_op(pool, "=", ClazzId::BOOL);
    let plus = i32_op(pool, "+", ClazzId::I32);
    let minus = i32_op(pool, "-", ClazzId::I32);
    let count = main_routine(pool, "count", ClazzId::I32);
    pool.arg(count, "n", ClazzId::I32);
    pool.arg(count, "acc", ClazzId::I32);

    let done = i32_call(pool, count, eq, Expr::Arg(0), Expr::i32(0));
    let n = i32_call(pool, count, minus, Expr::Arg(0), Expr::i32(1));
    let acc = i32_call(pool, count, plus, Expr::Arg(1), Expr::i32(1));
    let recurse = call_global(pool, count, count, vec![n, acc]);
    let then = set_result(pool, count, Expr::Arg(1));
    let otherwise = set_result(pool, count, recurse);
    let body = if_else(pool, count, done, then, otherwise);
    pool.set_body(count, body);
    count
}

#[test]
fn self_tail_call_runs_in_constant_stack() {
    let mut pool = ClazzPool::new();
    let count = counter(&mut pool);
    let program = compile(&pool);

    let depth_for = |n: i32| {
        let mut machine = Machine::new(&program);
        let result = machine.call_static(
            &names::class(&pool, count),
            names::ROUTINE,
            vec![Value::Int(n), Value::Int(0)],
        );
        assert_eq!(result, Ok(Some(Value::Int(n))));
        machine.max_depth
    };
    assert_eq!(depth_for(100_000), 1);
    assert_eq!(depth_for(10), depth_for(100_000));
}

#[test]
fn tail_calls_can_be_disabled() {
    let mut pool = ClazzPool::new();
    let count = counter(&mut pool);
    let (program, _) = compile_with(&pool, JvmOptions::default().with_tail_calls(false));
    let program = program.unwrap();

    let mut machine = Machine::new(&program);
    let result = machine.call_static(
        &names::class(&pool, count),
        names::ROUTINE,
        vec![Value::Int(50), Value::Int(0)],
    );
    assert_eq!(result, Ok(Some(Value::Int(50))));
    assert_eq!(machine.max_depth, 51);
}

#[test]
fn oracle_decides_tail_position() {
    let mut pool = ClazzPool::new();
    let count = counter(&mut pool);
    let options = JvmOptions::default();
    let mut diagnostics = options.diagnostic_queue();
    let program = JvmBackend::with_options(&pool, options)
        .with_oracle(&NoTailCalls)
        .compile(&mut diagnostics)
        .unwrap();

    let mut machine = Machine::new(&program);
    let result = machine.call_static(
        &names::class(&pool, count),
        names::ROUTINE,
        vec![Value::Int(20), Value::Int(5)],
    );
    assert_eq!(result, Ok(Some(Value::Int(25))));
    assert_eq!(machine.max_depth, 21);
}

/// `Animal` with heirs `Dog`, `Cat` and `Cow`; `name` returns 1, 2 and 3.
/// `Cow.name` keeps a reference to its outer instance.
struct Zoo {
    pool: ClazzPool,
    animal: ClazzId,
    name: ClazzId,
    heirs: Vec<(ClazzId, ClazzId)>,
}

fn zoo() -> Zoo {
    let mut pool = ClazzPool::new();
    let animal = pool.ref_type("Animal", ClazzId::UNIVERSE);
    let name = pool.declare("Animal.name", ClazzKind::Abstract, animal, ClazzId::I32);
    let mut heirs = Vec::new();
    for (value, kind) in [(1, "Dog"), (2, "Cat"), (3, "Cow")] {
        let ty = pool.ref_type(kind, ClazzId::UNIVERSE);
        pool.set_body(ty, Expr::Unit);
        let f = pool.function(&format!("{kind}.name"), ty, ClazzId::I32);
        if kind == "Cow" {
            pool.add_outer_ref(f);
        }
        let body = set_result(&mut pool, f, Expr::i32(value));
        pool.set_body(f, body);
        heirs.push((ty, f));
    }
    let types: Vec<ClazzId> = heirs.iter().map(|&(ty, _)| ty).collect();
    pool.set_heirs(animal, &types);
    Zoo {
        pool,
        animal,
        name,
        heirs,
    }
}

/// A routine calling `Animal.name` on a new instance of `ty`, with the
/// given reachable targets.
fn speak(zoo: &mut Zoo, ty: ClazzId, targets: Vec<(ClazzId, ClazzId)>) -> ClazzId {
    let pool = &mut zoo.pool;
    let main = main_routine(pool, &format!("speak{}", ty.raw()), ClazzId::I32);
    let receiver = call_global(pool, main, ty, Vec::new());
    let site = pool.add_site(AccessSite::call(main, zoo.animal, zoo.name).with_targets(targets));
    let body = set_result(pool, main, Expr::call(site, receiver, Vec::new()));
    pool.set_body(main, body);
    main
}

#[test]
fn dynamic_dispatch_matches_static_resolution() {
    let mut zoo = zoo();
    let heirs = zoo.heirs.clone();
    let mut mains = Vec::new();
    for &(ty, f) in &heirs {
        let dynamic = speak(&mut zoo, ty, heirs.clone());
        let fixed = speak(&mut zoo, ty, vec![(ty, f)]);
        mains.push((dynamic, fixed));
    }
    let pool = &zoo.pool;
    let program = compile(pool);

    for (expected, (dynamic, fixed)) in (1..).zip(mains) {
        let by_dispatch = run(&program, pool, dynamic, Vec::new());
        let by_call = run(&program, pool, fixed, Vec::new());
        assert_eq!(by_dispatch, Ok(Some(Value::Int(expected))));
        assert_eq!(by_dispatch, by_call);
    }

    let intf = names::interface(pool, zoo.animal);
    let method = names::dynamic_function(pool, zoo.name);
    let interface = program.class(&intf).unwrap();
    assert!(interface.is_interface());
    assert!(interface.has_method(&method));
    for &(ty, _) in &heirs {
        let class = program.class(&names::class(pool, ty)).unwrap();
        assert!(class.implements(&intf));
        let stubs = class.methods.iter().filter(|m| m.name == method).count();
        assert_eq!(stubs, 1, "{}", class.name);
    }
}

#[test]
fn access_without_targets_traps_when_value_needed() {
    let mut pool = ClazzPool::new();
    let ghost = pool.declare("ghost", ClazzKind::Routine, ClazzId::UNIVERSE, ClazzId::I32);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let site = pool.add_site(AccessSite::call(main, ClazzId::UNIVERSE, ghost).with_targets([]));
    let body = set_result(&mut pool, main, Expr::call(site, Expr::Unit, Vec::new()));
    pool.set_body(main, body);

    let (program, diagnostics) = compile_with(&pool, JvmOptions::default());
    let program = program.unwrap();
    let found: Vec<(ErrorCode, bool)> = diagnostics
        .diagnostics()
        .iter()
        .map(|d| (d.code, d.is_error()))
        .collect();
    assert_eq!(found, vec![(ErrorCode::E5004, false)]);
    assert_eq!(
        run(&program, &pool, main, Vec::new()),
        Err(Trap::Fatal("no targets for access of `ghost`".to_owned()))
    );
}

#[test]
fn access_without_targets_is_dropped_when_unused() {
    let mut pool = ClazzPool::new();
    let nothing = pool.declare("nothing", ClazzKind::Routine, ClazzId::UNIVERSE, ClazzId::UNIT);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let site = pool.add_site(AccessSite::call(main, ClazzId::UNIVERSE, nothing).with_targets([]));
    let result = set_result(&mut pool, main, Expr::i32(7));
    pool.set_body(
        main,
        Expr::Seq(vec![Expr::call(site, Expr::Unit, Vec::new()), result]),
    );

    let (program, diagnostics) = compile_with(&pool, JvmOptions::default());
    assert!(diagnostics.diagnostics().is_empty());
    assert_eq!(
        run(&program.unwrap(), &pool, main, Vec::new()),
        Ok(Some(Value::Int(7)))
    );
}

#[test]
fn abstract_call_is_reported() {
    let mut pool = ClazzPool::new();
    let vague = pool.declare("vague", ClazzKind::Abstract, ClazzId::UNIVERSE, ClazzId::I32);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let site = pool.add_site(
        AccessSite::call(main, ClazzId::UNIVERSE, vague).with_span(Span::new(3, 9)),
    );
    let call = Expr::call(site, Expr::Unit, Vec::new());
    let body = set_result(&mut pool, main, call);
    pool.set_body(main, body);

    let (result, diagnostics) = compile_with(&pool, JvmOptions::default());
    assert!(matches!(result, Err(JvmError::ErrorsReported(_))));
    assert_eq!(diagnostics.error_count(), 1);
    let diagnostic = &diagnostics.diagnostics()[0];
    assert_eq!(diagnostic.code, ErrorCode::E5001);
    assert_eq!(diagnostic.primary_span(), Some(Span::new(3, 9)));
    assert_eq!(diagnostic.message, "call to abstract feature `vague`");
    assert!(diagnostic.notes.iter().any(|n| n.contains("`main`")));
}

#[test]
fn missing_intrinsic_is_reported() {
    let mut pool = ClazzPool::new();
    let modulo = i32_op(&mut pool, "%", ClazzId::I32);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let value = i32_call(&mut pool, main, modulo, Expr::i32(7), Expr::i32(2));
    let body = set_result(&mut pool, main, value);
    pool.set_body(main, body);

    let (result, diagnostics) = compile_with(&pool, JvmOptions::default());
    assert!(matches!(result, Err(JvmError::ErrorsReported(_))));
    let codes: Vec<ErrorCode> = diagnostics.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![ErrorCode::E5002]);
}

#[test]
fn panic_intrinsic_terminates() {
    let mut pool = ClazzPool::new();
    let panic = pool.declare("fuzion.std.panic", ClazzKind::Intrinsic, ClazzId::UNIVERSE, ClazzId::VOID);
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let call = call_global(&mut pool, main, panic, vec![Expr::string("boom")]);
    let result = set_result(&mut pool, main, Expr::i32(1));
    pool.set_body(main, Expr::Seq(vec![call, result]));

    let program = compile(&pool);
    assert_eq!(
        run(&program, &pool, main, Vec::new()),
        Err(Trap::Fatal("boom".to_owned()))
    );
}

#[test]
fn scalar_constants() {
    let mut pool = ClazzPool::new();
    let long = returning(&mut pool, "long", ClazzId::I64, Expr::i64(-5));
    let byte = returning(
        &mut pool,
        "byte",
        ClazzId::U8,
        Expr::Const {
            clazz: ClazzId::U8,
            data: vec![200],
        },
    );
    let char = returning(
        &mut pool,
        "char",
        ClazzId::U16,
        Expr::Const {
            clazz: ClazzId::U16,
            data: 50_000u16.to_le_bytes().to_vec(),
        },
    );
    let double = returning(
        &mut pool,
        "double",
        ClazzId::F64,
        Expr::Const {
            clazz: ClazzId::F64,
            data: 1.5f64.to_le_bytes().to_vec(),
        },
    );
    let truth = returning(&mut pool, "truth", ClazzId::BOOL, Expr::bool(true));

    let program = compile(&pool);
    let results: Vec<Option<Value>> = [long, byte, char, double, truth]
        .into_iter()
        .map(|cl| run(&program, &pool, cl, Vec::new()).unwrap())
        .collect();
    assert_eq!(
        results,
        vec![
            Some(Value::Long(-5)),
            Some(Value::Int(-56)),
            Some(Value::Int(50_000)),
            Some(Value::Double(1.5f64.to_bits())),
            Some(Value::Int(1)),
        ]
    );
}

#[test]
fn malformed_constant_is_reported() {
    let mut pool = ClazzPool::new();
    let main = returning(
        &mut pool,
        "main",
        ClazzId::I32,
        Expr::Const {
            clazz: ClazzId::I32,
            data: vec![1, 2],
        },
    );
    pool.set_span(main, Span::new(20, 24));
    let (result, diagnostics) = compile_with(&pool, JvmOptions::default());
    assert!(matches!(result, Err(JvmError::ErrorsReported(_))));
    let diagnostic = &diagnostics.diagnostics()[0];
    assert_eq!(diagnostic.code, ErrorCode::E5003);
    assert_eq!(diagnostic.primary_span(), Some(Span::new(20, 24)));
}

/// `greet` returning "hello", set twice.
fn greeter(pool: &mut ClazzPool) -> ClazzId {
    let greet = main_routine(pool, "greet", ClazzId::CONST_STRING);
    let first = set_result(pool, greet, Expr::string("hello"));
    let second = set_result(pool, greet, Expr::string("hello"));
    pool.set_body(greet, Expr::Seq(vec![first, second]));
    greet
}

#[test]
fn strings_loaded_at_use_site() {
    let mut pool = ClazzPool::new();
    let greet = greeter(&mut pool);
    let program = compile(&pool);
    assert!(program.class(names::CONSTANTS_CLASS).is_none());
    assert_eq!(
        run(&program, &pool, greet, Vec::new()),
        Ok(Some(Value::Str("hello".to_owned())))
    );
}

#[test]
fn strings_preallocated_once() {
    let mut pool = ClazzPool::new();
    let greet = greeter(&mut pool);
    let options = JvmOptions::default().with_constants(ConstantPolicy::Preallocated);
    let (program, _) = compile_with(&pool, options);
    let program = program.unwrap();

    let constants = program.class(names::CONSTANTS_CLASS).unwrap();
    let fields: Vec<&str> = constants.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["fzConst_0"]);
    assert!(constants.fields[0].is_static());
    assert!(constants.has_method("<clinit>"));
    assert_eq!(
        run(&program, &pool, greet, Vec::new()),
        Ok(Some(Value::Str("hello".to_owned())))
    );
}

#[test]
fn traces_calls_and_returns() {
    let mut pool = ClazzPool::new();
    let seven = returning(&mut pool, "seven", ClazzId::I32, Expr::i32(7));
    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let call = call_global(&mut pool, main, seven, Vec::new());
    let body = set_result(&mut pool, main, call);
    pool.set_body(main, body);

    let options = JvmOptions::default()
        .with_trace_calls(true)
        .with_trace_returns(true);
    let (program, _) = compile_with(&pool, options);
    let program = program.unwrap();
    let mut machine = Machine::new(&program);
    let result = machine.call_static(&names::class(&pool, main), names::ROUTINE, Vec::new());
    assert_eq!(result, Ok(Some(Value::Int(7))));
    assert_eq!(
        machine.traces,
        vec!["call seven", "return from seven", "return from main"]
    );
}

#[test]
fn boxed_target_is_unwrapped() {
    let mut pool = ClazzPool::new();
    let point = pool.value_type("Point", ClazzId::UNIVERSE);
    let x = pool.arg(point, "x", ClazzId::I32);
    let init = set_field(&mut pool, point, x, Expr::Arg(0));
    pool.set_body(point, init);
    let boxed = pool.boxed(point);

    let main = main_routine(&mut pool, "main", ClazzId::I32);
    let value = call_global(&mut pool, main, point, vec![Expr::i32(5)]);
    let boxed_value = Expr::boxed(value, point, boxed);
    let site = call_site(&mut pool, main, boxed, x);
    let read = Expr::call(site, boxed_value, Vec::new());
    let body = set_result(&mut pool, main, read);
    pool.set_body(main, body);

    let program = compile(&pool);
    let class = program.class(&names::class(&pool, boxed)).unwrap();
    assert!(class.has_field(names::BOXED_VALUE_FIELD));
    assert!(class.has_method(names::BOX_METHOD));
    assert_eq!(run(&program, &pool, main, Vec::new()), Ok(Some(Value::Int(5))));
}

#[test]
fn every_method_is_verified() {
    let mut zoo = zoo();
    let heirs = zoo.heirs.clone();
    speak(&mut zoo, heirs[0].0, heirs.clone());
    counter(&mut zoo.pool);
    let program = compile(&zoo.pool);
    for class in &program.classes {
        for method in &class.methods {
            assert_eq!(
                method.code.is_some(),
                method.info.is_some(),
                "{}.{}",
                class.name,
                method.name
            );
        }
    }
}
