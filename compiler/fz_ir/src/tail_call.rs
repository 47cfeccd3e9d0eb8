//! Tail-call position analysis.
//!
//! A call is in tail position when nothing of the calling routine runs after
//! it returns: it is the last expression of the body, the value assigned to
//! the result field by the last expression, or in tail position within a
//! case of a match that is itself last.

use rustc_hash::FxHashSet;

use crate::{ClazzId, ClazzKind, ClazzPool, Expr, SiteId};

#[cfg(test)]
mod tests;

/// Answers whether a call site is in tail position of its caller.
pub trait TailCallOracle {
    fn is_tail_call(&self, caller: ClazzId, site: SiteId) -> bool;
}

/// Oracle that never reports a tail call.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoTailCalls;

impl TailCallOracle for NoTailCalls {
    fn is_tail_call(&self, _caller: ClazzId, _site: SiteId) -> bool {
        false
    }
}

/// Tail positions of all routine bodies of a pool, computed up front.
#[derive(Clone, Debug, Default)]
pub struct TailCallAnalysis {
    tail_sites: FxHashSet<(ClazzId, SiteId)>,
}

impl TailCallAnalysis {
    pub fn new(pool: &ClazzPool) -> Self {
        let mut analysis = TailCallAnalysis::default();
        for cl in pool.ids() {
            if pool.kind(cl) != ClazzKind::Routine {
                continue;
            }
            if let Some(body) = pool.body(cl) {
                analysis.scan(pool, cl, body);
            }
        }
        analysis
    }

    /// Number of call sites found in tail position.
    pub fn len(&self) -> usize {
        self.tail_sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tail_sites.is_empty()
    }

    fn scan(&mut self, pool: &ClazzPool, cl: ClazzId, expr: &Expr) {
        match expr.last() {
            Expr::Call { site, .. } => {
                if pool.site(*site).is_call {
                    self.tail_sites.insert((cl, *site));
                }
            }
            Expr::Assign {
                site,
                target,
                value,
            } => {
                let assigns_result = pool.result_field(cl) == Some(pool.site(*site).accessed)
                    && matches!(**target, Expr::Current);
                if assigns_result {
                    if let Expr::Call { site, .. } = value.last() {
                        if pool.site(*site).is_call {
                            self.tail_sites.insert((cl, *site));
                        }
                    }
                }
            }
            Expr::Match { cases, .. } => {
                for case in cases {
                    self.scan(pool, cl, case);
                }
            }
            _ => {}
        }
    }
}

impl TailCallOracle for TailCallAnalysis {
    fn is_tail_call(&self, caller: ClazzId, site: SiteId) -> bool {
        self.tail_sites.contains(&(caller, site))
    }
}
