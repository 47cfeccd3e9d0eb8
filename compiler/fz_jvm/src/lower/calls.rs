//! Calls, field accesses and boxing.

use fz_ir::{ClazzId, ClazzKind, SiteId, Span};

use crate::bytecode::{Code, FieldRef, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef};
use crate::codegen::{trace, trap};
use crate::{names, JvmError, JvmProblem};

use super::{Lowered, RoutineLowerer, Val};

impl RoutineLowerer<'_, '_> {
    /// Lower the call at `site` on target value `tvalue`.
    pub(super) fn call(
        &mut self,
        site: SiteId,
        tvalue: Val,
        args: Vec<Val>,
    ) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        let prefix = if self.cg.options.trace_calls {
            trace(format!("call {}", pool.name(pool.site(site).accessed)))
        } else {
            Code::new()
        };
        let lowered = if self.is_tail_call(site) {
            self.tail_call(site, tvalue, args)?
        } else {
            self.access(site, tvalue, args)?
        };
        Ok(lowered.after(prefix))
    }

    /// Lower the assignment at `site` of `value` to a field of `tvalue`.
    pub(super) fn assign(
        &mut self,
        site: SiteId,
        tvalue: Val,
        value: Val,
    ) -> Result<Lowered, JvmError> {
        self.access(site, tvalue, vec![value])
    }

    /// Lower an access depending on the number of reachable targets.
    fn access(&mut self, site: SiteId, tvalue: Val, args: Vec<Val>) -> Result<Lowered, JvmError> {
        let s = self.pool().site(site);
        match s.targets.as_slice() {
            [] => Ok(self.no_targets(site, tvalue, args)),
            &[(tt, cc)] => self.static_access(tt, cc, s.is_call, s.span, tvalue, args),
            _ => self.dynamic_access(site, tvalue, args),
        }
    }

    /// An access no target can reach at run time. Operands are still
    /// evaluated.
    fn no_targets(&mut self, site: SiteId, tvalue: Val, args: Vec<Val>) -> Lowered {
        let pool = self.pool();
        let s = pool.site(site);
        let mut code = tvalue.drop();
        for a in args {
            code.append(a.drop());
        }
        let result = pool.result(s.accessed);
        let needed = s.is_call
            && (pool.is_void_type(result) || !self.cg.types.java_type(result).is_void());
        if needed {
            let problem = JvmProblem::NoTargets {
                called: pool.name(s.accessed).to_owned(),
                span: s.span,
            };
            Lowered::unreachable(code.and(self.cg.report(problem)))
        } else {
            tracing::trace!(accessed = pool.name(s.accessed), "eliminated access without targets");
            Lowered::stmts(code.and(Code::comment(format!(
                "access of {} eliminated",
                pool.name(s.accessed)
            ))))
        }
    }

    /// Access feature `cc` on a target of known type `tt`.
    pub(super) fn static_access(
        &mut self,
        tt: ClazzId,
        cc: ClazzId,
        is_call: bool,
        span: Span,
        tvalue: Val,
        mut args: Vec<Val>,
    ) -> Result<Lowered, JvmError> {
        let tvalue = self.unbox_target(tt, cc, tvalue);
        if is_call {
            self.static_call(cc, span, tvalue, args)
        } else {
            let value = args.pop().unwrap_or_else(Val::unit);
            self.assign_field(cc, tvalue, value)
        }
    }

    /// Unwrap a boxed target when the accessed feature belongs to the
    /// wrapped value type.
    fn unbox_target(&self, tt: ClazzId, cc: ClazzId, tvalue: Val) -> Val {
        let pool = self.pool();
        let types = &self.cg.types;
        let Some(value) = pool.boxed_value(tt) else {
            return tvalue;
        };
        if pool.outer(cc).is_some_and(|o| pool.is_ref(o)) {
            return tvalue;
        }
        let vt = types.java_type(value);
        if vt.is_void() {
            return Val::effect(tvalue.drop());
        }
        let class = types.class_name(tt);
        let field = FieldRef::new(class.clone(), names::BOXED_VALUE_FIELD, vt.clone());
        let code = tvalue
            .cast_to(&JavaType::Object(class))
            .code
            .then(Instr::GetField(field));
        Val::new(code, vt)
    }

    fn static_call(
        &mut self,
        cc: ClazzId,
        span: Span,
        tvalue: Val,
        args: Vec<Val>,
    ) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        match pool.kind(cc) {
            ClazzKind::Abstract => {
                let code = drop_all(tvalue, args);
                let problem = JvmProblem::AbstractCall {
                    called: pool.name(cc).to_owned(),
                    caller: pool.name(self.cx.cl).to_owned(),
                    span,
                };
                Ok(Lowered::unreachable(code.and(self.cg.report(problem))))
            }
            ClazzKind::Intrinsic => Ok(self.intrinsic(cc, span, tvalue, args)),
            ClazzKind::Routine | ClazzKind::Native => Ok(self.routine_call(cc, tvalue, args)),
            ClazzKind::Field => Ok(self.read_field(cc, tvalue)),
            ClazzKind::Choice => Err(JvmError::internal(format!(
                "call of choice type `{}`",
                pool.name(cc)
            ))),
        }
    }

    /// `invokestatic` of the method implementing routine `cc`.
    fn routine_call(&mut self, cc: ClazzId, tvalue: Val, args: Vec<Val>) -> Lowered {
        let pool = self.pool();
        let types = &self.cg.types;
        let result = pool.result(cc);
        if !types.needs_class_file(cc) {
            return Lowered::stmts(drop_all(tvalue, args));
        }
        let desc = types.descriptor(cc);
        let mut code = if types.has_outer_ref(cc) {
            let outer = desc.params.first().cloned().unwrap_or(JavaType::Void);
            tvalue.cast_to(&outer).code
        } else {
            tvalue.drop()
        };
        for a in args {
            code.append(a.code);
        }
        let ret = desc.ret.clone();
        code.push(Instr::Invoke(
            InvokeKind::Static,
            MethodRef::new(types.class_name(cc), names::ROUTINE, desc),
        ));
        if pool.is_void_type(result) {
            let message = format!("return from {}, which never returns", pool.name(cc));
            return Lowered::unreachable(code.and(Code::pop(&ret)).and(trap(&message)));
        }
        Lowered::value(Val::new(code, ret))
    }

    /// Read field `f` of `tvalue`.
    fn read_field(&mut self, f: ClazzId, tvalue: Val) -> Lowered {
        let pool = self.pool();
        let types = &self.cg.types;
        if pool.outer(f).is_some_and(|o| types.is_scalar(o)) {
            return Lowered::value(tvalue);
        }
        if !types.field_exists(f) {
            tracing::trace!(field = pool.name(f), "eliminated read of field without data");
            let code = tvalue
                .drop()
                .and(Code::comment(format!("read of {} eliminated", pool.name(f))));
            return Lowered::stmts(code);
        }
        let field = types.field_ref(f);
        let ty = field.ty.clone();
        let code = tvalue
            .cast_to(&JavaType::Object(field.class.clone()))
            .code
            .then(Instr::GetField(field));
        Lowered::value(Val::new(code, ty))
    }

    /// Write `value` to field `f` of `tvalue`, copying value instances.
    pub(super) fn assign_field(
        &mut self,
        f: ClazzId,
        tvalue: Val,
        value: Val,
    ) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        if !self.cg.types.field_exists(f) {
            tracing::trace!(field = pool.name(f), "eliminated write of field without data");
            let code = tvalue
                .drop()
                .and(value.drop())
                .and(Code::comment(format!("write of {} eliminated", pool.name(f))));
            return Ok(Lowered::stmts(code));
        }
        let field = self.cg.types.field_ref(f);
        let value = self.cg.clone_value(pool.result(f), value)?;
        let code = tvalue
            .cast_to(&JavaType::Object(field.class.clone()))
            .code
            .and(value.code)
            .then(Instr::PutField(field));
        Ok(Lowered::stmts(code))
    }

    /// Wrap value `v` of clazz `from` in an instance of boxed clazz `to`.
    pub(super) fn box_value(&mut self, v: Val, from: ClazzId, to: ClazzId) -> Result<Val, JvmError> {
        let pool = self.pool();
        if pool.is_ref(from) {
            return Ok(v);
        }
        let class = self.cg.types.class_name(to);
        let vt = self.cg.types.java_type(from);
        let v = self.cg.clone_value(from, v)?;
        let params = if vt.is_void() { Vec::new() } else { vec![vt] };
        let ty = JavaType::Object(class.clone());
        let code = v.code.then(Instr::Invoke(
            InvokeKind::Static,
            MethodRef::new(class, names::BOX_METHOD, MethodDescriptor::new(params, ty.clone())),
        ));
        Ok(Val::new(code, ty))
    }
}

/// Evaluate and discard all operands.
fn drop_all(tvalue: Val, args: Vec<Val>) -> Code {
    args.into_iter().fold(tvalue.drop(), |code, a| code.and(a.drop()))
}
