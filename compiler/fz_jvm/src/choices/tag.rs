//! Injecting a value into a choice.

use fz_ir::ClazzId;

use crate::bytecode::{Code, FieldRef, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef};
use crate::codegen::Codegen;
use crate::layout::RepresentationKind;
use crate::lower::{RoutineLowerer, Val};
use crate::{names, JvmError};

use super::synthesize::tag_const;

impl RoutineLowerer<'_, '_> {
    /// Lower tagging `v` of `value_clazz` as alternative `tag` of `choice`.
    pub(crate) fn tag(
        &mut self,
        v: Val,
        value_clazz: ClazzId,
        choice: ClazzId,
        tag: usize,
    ) -> Result<Val, JvmError> {
        let pool = self.cg.pool;
        if pool.choices(choice).get(tag) != Some(&value_clazz) {
            return Err(JvmError::internal(format!(
                "`{}` is not alternative {tag} of `{}`",
                pool.name(value_clazz),
                pool.name(choice)
            )));
        }
        self.cg.tag_value(v, choice, tag)
    }
}

impl Codegen<'_> {
    /// The choice value of `choice` holding `v` as alternative `tag`.
    pub(crate) fn tag_value(&mut self, v: Val, choice: ClazzId, tag: usize) -> Result<Val, JvmError> {
        let pool = self.pool;
        let alt = pool.choice(choice, tag);
        let ty = self.types.java_type(choice);
        match self.types.kind(choice) {
            RepresentationKind::Voidlike => Err(JvmError::internal(format!(
                "tagging a value of void choice `{}`",
                pool.name(choice)
            ))),
            RepresentationKind::Unitlike => Ok(Val::effect(v.drop())),
            RepresentationKind::Boollike => {
                let rank = self
                    .types
                    .layout()
                    .int_value_for_tag(choice, tag)
                    .ok_or_else(|| void_tag(pool.name(choice), tag))?;
                let code = v.drop().then(Instr::IConst(tag_const(rank)?));
                Ok(Val::new(code, ty))
            }
            RepresentationKind::Intlike => {
                let code = v.drop().then(Instr::IConst(tag_const(tag)?));
                Ok(Val::new(code, ty))
            }
            RepresentationKind::Nullable | RepresentationKind::RefsAndUnits if pool.is_ref(alt) => {
                Ok(Val::new(v.code, ty))
            }
            RepresentationKind::Nullable => Ok(Val::new(v.drop().then(Instr::AConstNull), ty)),
            RepresentationKind::RefsAndUnits => {
                let class = self.types.class_name(choice);
                let singleton = FieldRef::new(
                    class.clone(),
                    names::choice_unit(tag),
                    JavaType::Object(class),
                );
                Ok(Val::new(v.drop().then(Instr::GetStatic(singleton)), ty))
            }
            RepresentationKind::General => {
                let class = self.types.class_name(choice);
                let (mut code, payload) = match self.choice_entry(choice, tag) {
                    Some(entry) => (Code::new(), Some((entry, self.clone_value(alt, v)?))),
                    None => (v.drop(), None),
                };
                code.push(Instr::New(class.clone()));
                code.push(Instr::Dup);
                code.push(Instr::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(class, "<init>", MethodDescriptor::void()),
                ));
                code.push(Instr::Dup);
                code.push(Instr::IConst(tag_const(tag)?));
                code.push(Instr::PutField(self.tag_field(choice)));
                if let Some((entry, payload)) = payload {
                    code.push(Instr::Dup);
                    code.append(payload.code);
                    code.push(Instr::PutField(entry));
                }
                Ok(Val::new(code, ty))
            }
        }
    }
}

fn void_tag(choice: &str, tag: usize) -> JvmError {
    JvmError::internal(format!("alternative {tag} of `{choice}` is void"))
}
