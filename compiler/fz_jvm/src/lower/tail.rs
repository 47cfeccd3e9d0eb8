//! Self tail calls.
//!
//! A call of the routine being compiled in tail position stores the new
//! arguments into the parameter slots and jumps back to the start of the
//! routine, so deep recursion runs in constant stack space.

use tracing::debug;

use fz_ir::SiteId;

use crate::bytecode::{Code, Instr};
use crate::JvmError;

use super::{Lowered, RoutineLowerer, Val};

impl RoutineLowerer<'_, '_> {
    /// Whether the call at `site` can be compiled as a jump.
    pub(super) fn is_tail_call(&self, site: SiteId) -> bool {
        let cl = self.cx.cl;
        let s = self.pool().site(site);
        self.cg.options.tail_calls
            && s.is_call
            && s.caller == cl
            && matches!(s.targets.as_slice(), [(_, cc)] if *cc == cl)
            && self.cg.oracle.is_tail_call(cl, site)
    }

    pub(super) fn tail_call(
        &mut self,
        site: SiteId,
        tvalue: Val,
        args: Vec<Val>,
    ) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        let types = &self.cg.types;
        let cl = self.cx.cl;
        if args.len() != pool.args(cl).len() {
            return Err(JvmError::internal(format!(
                "tail call of `{}` with {} arguments, expected {}",
                pool.name(cl),
                args.len(),
                pool.args(cl).len()
            )));
        }
        debug!(routine = pool.name(cl), site = site.raw(), "tail call as jump");

        let mut code = Code::new();
        let mut stores = Vec::new();
        match (types.outer_slot(cl), pool.outer(cl)) {
            (Some(slot), Some(outer)) => {
                let ty = types.java_type(outer);
                code.append(tvalue.cast_to(&ty).code);
                stores.push(Instr::Store(ty, slot));
            }
            _ => code.append(tvalue.drop()),
        }
        for (i, a) in args.into_iter().enumerate() {
            let ty = types.java_type(pool.arg_clazz(cl, i));
            code.append(a.code);
            if !ty.is_void() {
                stores.push(Instr::Store(ty, types.arg_slot(cl, i)));
            }
        }
        code.extend(stores.into_iter().rev());

        let has_instance = types.has_instance(cl);
        let labels = self.cx.tail_labels();
        let target = if has_instance {
            labels.before_prolog
        } else {
            labels.after_prolog
        };
        Ok(Lowered::unreachable(code.then(Instr::Goto(target))))
    }
}
