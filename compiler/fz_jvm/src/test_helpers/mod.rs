//! Shared helpers for backend tests: building small programs, compiling
//! them and running the result.

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod exec;

use fz_diagnostic::{DiagnosticConfig, DiagnosticQueue};
use fz_ir::{AccessSite, ClazzId, ClazzPool, Expr, MatchCase, MatchSite, SiteId};

use crate::{names, CompiledProgram, JvmBackend, JvmError, JvmOptions};

pub use exec::{Machine, Trap, Value};

/// Compile `pool` with `options`, returning the result and all diagnostics.
pub fn compile_with(pool: &ClazzPool, options: JvmOptions) -> (Result<CompiledProgram, JvmError>, DiagnosticQueue) {
    let options = options.with_diagnostics(DiagnosticConfig::unlimited());
    let mut diagnostics = options.diagnostic_queue();
    let result = JvmBackend::with_options(pool, options).compile(&mut diagnostics);
    (result, diagnostics)
}

/// Compile `pool` with default options; panics on failure.
pub fn compile(pool: &ClazzPool) -> CompiledProgram {
    let (result, _) = compile_with(pool, JvmOptions::default());
    result.unwrap_or_else(|e| panic!("compilation failed: {e}"))
}

/// Run routine `cl` without outer instance.
pub fn run(program: &CompiledProgram, pool: &ClazzPool, cl: ClazzId, args: Vec<Value>) -> Result<Option<Value>, Trap> {
    Machine::new(program).call_static(&names::class(pool, cl), names::ROUTINE, args)
}

/// A routine `name` in the universe returning `result` through its result
/// field.
pub fn main_routine(pool: &mut ClazzPool, name: &str, result: ClazzId) -> ClazzId {
    pool.function(name, ClazzId::UNIVERSE, result)
}

/// `field := value` on the current instance of `owner`.
pub fn set_field(pool: &mut ClazzPool, owner: ClazzId, field: ClazzId, value: Expr) -> Expr {
    let site = pool.add_site(AccessSite::assign(owner, owner, field));
    Expr::assign(site, Expr::Current, value)
}

/// `result := value` in routine `cl`.
pub fn set_result(pool: &mut ClazzPool, cl: ClazzId, value: Expr) -> Expr {
    let field = pool.result_field(cl).expect("routine has a result field");
    set_field(pool, cl, field, value)
}

/// A read of `field` of the current instance of `owner`.
pub fn get_field(pool: &mut ClazzPool, owner: ClazzId, field: ClazzId) -> Expr {
    let site = pool.add_site(AccessSite::call(owner, owner, field));
    Expr::call(site, Expr::Current, Vec::new())
}

/// A call site in `caller` with the single target (`target_clazz`, `called`).
pub fn call_site(pool: &mut ClazzPool, caller: ClazzId, target_clazz: ClazzId, called: ClazzId) -> SiteId {
    pool.add_site(AccessSite::call(caller, target_clazz, called))
}

/// A call of `called` on the universe.
pub fn call_global(pool: &mut ClazzPool, caller: ClazzId, called: ClazzId, args: Vec<Expr>) -> Expr {
    let site = call_site(pool, caller, ClazzId::UNIVERSE, called);
    Expr::call(site, Expr::Unit, args)
}

/// A match in `caller` on `subject` of `choice` with one case per entry
/// of `cases`: (tags, body).
pub fn matching(
    pool: &mut ClazzPool,
    caller: ClazzId,
    choice: ClazzId,
    subject: Expr,
    cases: Vec<(Vec<usize>, Option<ClazzId>, Expr)>,
) -> Expr {
    let (site_cases, bodies): (Vec<MatchCase>, Vec<Expr>) = cases
        .into_iter()
        .map(|(tags, field, body)| {
            let case = MatchCase::new(tags);
            let case = match field {
                Some(f) => case.binding(f),
                None => case,
            };
            (case, body)
        })
        .unzip();
    let site = pool.add_match(MatchSite::new(caller, choice, site_cases));
    Expr::matching(site, subject, bodies)
}

/// Intrinsic `i32.infix <op>` returning `result`.
pub fn i32_op(pool: &mut ClazzPool, op: &str, result: ClazzId) -> ClazzId {
    pool.declare(
        &format!("i32.infix {op}"),
        fz_ir::ClazzKind::Intrinsic,
        ClazzId::I32,
        result,
    )
}

/// `lhs <op> rhs` on `i32` values through intrinsic `op`.
pub fn i32_call(pool: &mut ClazzPool, caller: ClazzId, op: ClazzId, lhs: Expr, rhs: Expr) -> Expr {
    let site = call_site(pool, caller, ClazzId::I32, op);
    Expr::call(site, lhs, vec![rhs])
}
