use pretty_assertions::assert_eq;

use super::*;
use crate::{AccessSite, MatchCase, MatchSite};

/// `count(n i32) i32` with a self call in the position chosen by `body`.
fn counter(body: impl FnOnce(&mut ClazzPool, ClazzId, SiteId) -> Expr) -> (ClazzPool, ClazzId, SiteId) {
    let mut pool = ClazzPool::new();
    let count = pool.function("count", ClazzId::UNIVERSE, ClazzId::I32);
    pool.arg(count, "n", ClazzId::I32);
    let call = pool.add_site(AccessSite::call(count, ClazzId::UNIVERSE, count));
    let body = body(&mut pool, count, call);
    pool.set_body(count, body);
    (pool, count, call)
}

fn assign_result(pool: &mut ClazzPool, cl: ClazzId, value: Expr) -> Expr {
    let result = pool.result_field(cl).unwrap_or(ClazzId::VOID);
    let site = pool.add_site(AccessSite::assign(cl, cl, result));
    Expr::assign(site, Expr::Current, value)
}

#[test]
fn call_assigned_to_result_is_tail() {
    let (pool, count, call) = counter(|pool, cl, call| {
        let recurse = Expr::call(call, Expr::Unit, vec![Expr::Arg(0)]);
        assign_result(pool, cl, recurse)
    });
    let analysis = TailCallAnalysis::new(&pool);
    assert!(analysis.is_tail_call(count, call));
    assert_eq!(analysis.len(), 1);
}

#[test]
fn call_followed_by_more_code_is_not_tail() {
    let (pool, count, call) = counter(|pool, cl, call| {
        let recurse = Expr::call(call, Expr::Unit, vec![Expr::Arg(0)]);
        let first = assign_result(pool, cl, recurse);
        let second = assign_result(pool, cl, Expr::i32(0));
        Expr::Seq(vec![first, second])
    });
    let analysis = TailCallAnalysis::new(&pool);
    assert!(!analysis.is_tail_call(count, call));
}

#[test]
fn call_in_last_match_case_is_tail() {
    let (pool, count, call) = counter(|pool, cl, call| {
        let m = pool.add_match(MatchSite::new(
            cl,
            ClazzId::BOOL,
            vec![MatchCase::new([0]), MatchCase::new([1])],
        ));
        let recurse = Expr::call(call, Expr::Unit, vec![Expr::Arg(0)]);
        let on_false = assign_result(pool, cl, recurse);
        let on_true = assign_result(pool, cl, Expr::Arg(0));
        Expr::matching(m, Expr::bool(true), vec![on_false, on_true])
    });
    let analysis = TailCallAnalysis::new(&pool);
    assert!(analysis.is_tail_call(count, call));
}

#[test]
fn call_used_as_argument_is_not_tail() {
    let (pool, count, call) = counter(|pool, cl, call| {
        let inner = Expr::call(call, Expr::Unit, vec![Expr::Arg(0)]);
        let outer_site = pool.add_site(AccessSite::call(cl, ClazzId::UNIVERSE, cl));
        let outer = Expr::call(outer_site, Expr::Unit, vec![inner]);
        assign_result(pool, cl, outer)
    });
    let analysis = TailCallAnalysis::new(&pool);
    assert!(!analysis.is_tail_call(count, call));
}

#[test]
fn no_tail_calls_oracle() {
    let (_, count, call) = counter(|_, _, call| Expr::call(call, Expr::Unit, vec![Expr::Arg(0)]));
    assert!(!NoTailCalls.is_tail_call(count, call));
}
