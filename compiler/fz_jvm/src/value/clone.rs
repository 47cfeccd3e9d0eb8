//! Copying value instances.

use tracing::debug;

use fz_ir::ClazzId;
use fz_stack::ensure_sufficient_stack;

use crate::bytecode::{
    Code, Cond, Instr, InvokeKind, JavaType, Label, MethodDescriptor, MethodRef, MethodShape,
};
use crate::codegen::Codegen;
use crate::lower::Val;
use crate::{names, JvmError};

impl Codegen<'_> {
    /// `v` itself, or a copy of it if values of `cl` need copying.
    pub(crate) fn clone_value(&mut self, cl: ClazzId, v: Val) -> Result<Val, JvmError> {
        if !self.types.needs_copy(cl) {
            return Ok(v);
        }
        let clone = self.clone_code(cl)?;
        Ok(Val::new(v.code.and(clone), v.ty))
    }

    /// Code replacing the instance of `cl` on top of the stack by a copy.
    pub(crate) fn clone_code(&mut self, cl: ClazzId) -> Result<Code, JvmError> {
        let class = self.types.class_name(cl);
        let ty = JavaType::Object(class.clone());
        if self.value_methods.insert((cl, names::CLONE_METHOD)) {
            ensure_sufficient_stack(|| self.clone_method(cl))?;
        }
        Ok(Code::of(Instr::Invoke(
            InvokeKind::Static,
            MethodRef::new(class, names::CLONE_METHOD, clone_descriptor(ty)),
        )))
    }

    /// Synthesize `fzClone`: `null` stays `null`, otherwise a new instance
    /// with every field copied, nested values through their own `fzClone`.
    fn clone_method(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        let class = self.types.class_name(cl);
        let ty = JavaType::Object(class.clone());
        debug!(class = %class, "synthesizing clone");

        let l_copy = Label::fresh();
        let mut code = Code::of(Instr::Load(ty.clone(), 0))
            .then(Instr::If(Cond::NonNull, l_copy))
            .then(Instr::AConstNull)
            .then(Instr::Return(ty.clone()))
            .then(Instr::Bind(l_copy))
            .then(Instr::New(class.clone()))
            .then(Instr::Dup)
            .then(Instr::Invoke(
                InvokeKind::Special,
                MethodRef::new(class.clone(), "<init>", MethodDescriptor::void()),
            ))
            .then(Instr::Store(ty.clone(), 1));

        for f in self.value_fields(cl) {
            code.push(Instr::Load(ty.clone(), 1));
            code.push(Instr::Load(ty.clone(), 0));
            code.push(Instr::GetField(f.field.clone()));
            if let Some(nested) = f.nested {
                code.append(self.clone_code(nested)?);
            }
            code.push(Instr::PutField(f.field));
        }
        code.push(Instr::Load(ty.clone(), 1));
        code.push(Instr::Return(ty.clone()));

        self.classes.class(&class).add_method(MethodShape::new_static(
            names::CLONE_METHOD,
            clone_descriptor(ty),
            code,
        ));
        Ok(())
    }
}

fn clone_descriptor(ty: JavaType) -> MethodDescriptor {
    MethodDescriptor::new(vec![ty.clone()], ty)
}
