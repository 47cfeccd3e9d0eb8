//! Structural equality of values.
//!
//! Numbers are compared on their raw bits, so `NaN` equals itself and
//! `0.0` differs from `-0.0`. References are compared by identity.

use tracing::debug;

use fz_ir::ClazzId;
use fz_stack::ensure_sufficient_stack;

use crate::bytecode::{
    Code, Cond, Instr, InvokeKind, JavaType, Label, MethodDescriptor, MethodRef, MethodShape,
};
use crate::codegen::Codegen;
use crate::lower::Val;
use crate::{names, JvmError};

/// Code converting a value of type `ty` on top of the stack to the `int`
/// or `long` holding its bits. Nothing for other types.
pub(crate) fn raw_bits(ty: &JavaType) -> Code {
    let (class, name, from, to) = match ty {
        JavaType::Float => ("java/lang/Float", "floatToRawIntBits", JavaType::Float, JavaType::Int),
        JavaType::Double => (
            "java/lang/Double",
            "doubleToRawLongBits",
            JavaType::Double,
            JavaType::Long,
        ),
        _ => return Code::new(),
    };
    Code::of(Instr::Invoke(
        InvokeKind::Static,
        MethodRef::new(class, name, MethodDescriptor::new(vec![from], to)),
    ))
}

/// Code consuming two values of type `ty` (after [`raw_bits`]) and jumping
/// to `target` if they differ.
pub(crate) fn jump_if_different(ty: &JavaType, target: Label) -> Code {
    match ty {
        JavaType::Long | JavaType::Double => {
            Code::of(Instr::LCmp).then(Instr::If(Cond::Ne, target))
        }
        JavaType::Object(_) => Code::of(Instr::If(Cond::ACmpNe, target)),
        JavaType::Void => Code::new(),
        JavaType::Boolean
        | JavaType::Byte
        | JavaType::Short
        | JavaType::Char
        | JavaType::Int
        | JavaType::Float => Code::of(Instr::If(Cond::ICmpNe, target)),
    }
}

impl Codegen<'_> {
    /// Whether values `a` and `b` of `cl` are equal, as a `boolean`.
    pub(crate) fn equals_value(&mut self, cl: ClazzId, a: Val, b: Val) -> Result<Val, JvmError> {
        let ty = self.types.java_type(cl);
        if ty.is_void() {
            let code = a.drop().and(b.drop()).then(Instr::IConst(1));
            return Ok(Val::new(code, JavaType::Boolean));
        }
        if self.types.needs_copy(cl) {
            let equals = self.equals_code(cl)?;
            let code = a.code.and(b.code).and(equals);
            return Ok(Val::new(code, JavaType::Boolean));
        }
        let l_different = Label::fresh();
        let l_end = Label::fresh();
        let code = a
            .code
            .and(raw_bits(&ty))
            .and(b.code)
            .and(raw_bits(&ty))
            .and(jump_if_different(&ty, l_different))
            .then(Instr::IConst(1))
            .then(Instr::Goto(l_end))
            .then(Instr::Bind(l_different))
            .then(Instr::IConst(0))
            .then(Instr::Bind(l_end));
        Ok(Val::new(code, JavaType::Boolean))
    }

    /// Code replacing two instances of `cl` on the stack by whether they
    /// are equal.
    pub(crate) fn equals_code(&mut self, cl: ClazzId) -> Result<Code, JvmError> {
        let class = self.types.class_name(cl);
        let ty = JavaType::Object(class.clone());
        if self.value_methods.insert((cl, names::EQUALS_METHOD)) {
            ensure_sufficient_stack(|| self.equals_method(cl))?;
        }
        Ok(Code::of(Instr::Invoke(
            InvokeKind::Static,
            MethodRef::new(class, names::EQUALS_METHOD, equals_descriptor(ty)),
        )))
    }

    /// Synthesize `fzEquals`: two `null`s are equal, `null` differs from
    /// any instance, instances are equal if all their fields are.
    fn equals_method(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        let class = self.types.class_name(cl);
        let ty = JavaType::Object(class.clone());
        debug!(class = %class, "synthesizing equality");

        let l_a = Label::fresh();
        let l_true = Label::fresh();
        let l_false = Label::fresh();
        let mut code = Code::of(Instr::Load(ty.clone(), 0))
            .then(Instr::If(Cond::NonNull, l_a))
            .then(Instr::Load(ty.clone(), 1))
            .then(Instr::If(Cond::Null, l_true))
            .then(Instr::Goto(l_false))
            .then(Instr::Bind(l_a))
            .then(Instr::Load(ty.clone(), 1))
            .then(Instr::If(Cond::Null, l_false));

        for f in self.value_fields(cl) {
            let field_ty = f.field.ty.clone();
            code.push(Instr::Load(ty.clone(), 0));
            code.push(Instr::GetField(f.field.clone()));
            match f.nested {
                Some(nested) => {
                    code.push(Instr::Load(ty.clone(), 1));
                    code.push(Instr::GetField(f.field));
                    code.append(self.equals_code(nested)?);
                    code.push(Instr::If(Cond::Eq, l_false));
                }
                None => {
                    code.append(raw_bits(&field_ty));
                    code.push(Instr::Load(ty.clone(), 1));
                    code.push(Instr::GetField(f.field));
                    code.append(raw_bits(&field_ty));
                    code.append(jump_if_different(&field_ty, l_false));
                }
            }
        }

        code.push(Instr::Bind(l_true));
        code.push(Instr::IConst(1));
        code.push(Instr::Return(JavaType::Boolean));
        code.push(Instr::Bind(l_false));
        code.push(Instr::IConst(0));
        code.push(Instr::Return(JavaType::Boolean));

        self.classes.class(&class).add_method(MethodShape::new_static(
            names::EQUALS_METHOD,
            equals_descriptor(ty),
            code,
        ));
        Ok(())
    }
}

fn equals_descriptor(ty: JavaType) -> MethodDescriptor {
    MethodDescriptor::new(vec![ty.clone(), ty], JavaType::Boolean)
}
