//! Dynamic dispatch.
//!
//! An access with several reachable targets becomes an `invokeinterface`
//! of a method synthesized for the accessed feature. The interface is the
//! one of the static target type; every concrete target type implements it
//! with a stub that performs the static access for that type.

use tracing::debug;

use fz_ir::{ClazzId, SiteId, Span};

use crate::bytecode::{
    Code, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef, MethodShape,
};
use crate::codegen::{trap, Codegen};
use crate::{names, JvmError};

use super::{Lowered, RoutineCx, RoutineLowerer, Val};

impl RoutineLowerer<'_, '_> {
    pub(super) fn dynamic_access(
        &mut self,
        site: SiteId,
        tvalue: Val,
        args: Vec<Val>,
    ) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        let s = pool.site(site);
        let cc0 = s.accessed;
        let intf = self.cg.types.interface_name(s.target_clazz);
        let dname = names::dynamic_function(pool, cc0);
        let desc = self.cg.types.dyn_descriptor(cc0, s.is_call);

        self.cg
            .classes
            .interface(&intf)
            .add_method(MethodShape::new_abstract(dname.clone(), desc.clone()));
        for &(tt, cc) in &s.targets {
            self.cg.add_stub(tt, cc, &intf, &dname, &desc, s.is_call, s.span)?;
        }

        let mut code = tvalue.cast_to(&JavaType::Object(intf.clone())).code;
        for a in args {
            code.append(a.code);
        }
        let ret = desc.ret.clone();
        code.push(Instr::Invoke(
            InvokeKind::Interface,
            MethodRef::new(intf, dname, desc),
        ));
        if !s.is_call {
            return Ok(Lowered::stmts(code));
        }
        if pool.is_void_type(pool.result(cc0)) {
            let message = format!("return from {}, which never returns", pool.name(cc0));
            return Ok(Lowered::unreachable(code.and(trap(&message))));
        }
        Ok(Lowered::value(Val::new(code, ret)))
    }
}

impl Codegen<'_> {
    /// Implement interface method `dname` in the class of `tt` by a static
    /// access of `cc`. Installed once per (type, method).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_stub(
        &mut self,
        tt: ClazzId,
        cc: ClazzId,
        intf: &str,
        dname: &str,
        desc: &MethodDescriptor,
        is_call: bool,
        span: Span,
    ) -> Result<(), JvmError> {
        if !self.stubs.insert((tt, dname.to_owned())) {
            return Ok(());
        }
        let class = self.types.class_name(tt);
        debug!(class = %class, method = dname, "synthesizing dispatch stub");

        let this = JavaType::Object(class.clone());
        let tvalue = Val::new(Code::of(Instr::Load(this.clone(), 0)), this);
        let mut slot = 1;
        let args: Vec<Val> = desc
            .params
            .iter()
            .map(|ty| {
                let v = Val::new(Code::of(Instr::Load(ty.clone(), slot)), ty.clone());
                slot += ty.slots();
                v
            })
            .collect();

        let cx = RoutineCx::detached(tt, slot);
        let mut lowerer = RoutineLowerer::new(self, cx);
        let lowered = lowerer.static_access(tt, cc, is_call, span, tvalue, args)?;
        let mut code = lowered.stmts;
        if let Some(v) = lowered.value {
            code.append(v.cast_to(&desc.ret).code);
            code.push(Instr::Return(desc.ret.clone()));
        }

        let shape = self.classes.class(&class);
        shape.add_interface(intf);
        shape.add_method(MethodShape::new_instance(dname, desc.clone(), code));
        Ok(())
    }
}
