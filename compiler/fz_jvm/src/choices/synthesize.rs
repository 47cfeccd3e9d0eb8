//! Classes of choice values.

use tracing::debug;

use fz_ir::ClazzId;

use crate::bytecode::{
    Code, FieldRef, FieldShape, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef,
    MethodShape, JAVA_LANG_OBJECT,
};
use crate::codegen::Codegen;
use crate::layout::RepresentationKind;
use crate::{names, JvmError};

impl Codegen<'_> {
    /// Declare the class (and interface) of choice `cl`, if its kind needs
    /// one.
    pub(crate) fn create_choice_class(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        match self.types.kind(cl) {
            RepresentationKind::RefsAndUnits => self.create_refs_and_units(cl),
            RepresentationKind::General => self.create_general(cl),
            RepresentationKind::Voidlike
            | RepresentationKind::Unitlike
            | RepresentationKind::Boollike
            | RepresentationKind::Intlike
            | RepresentationKind::Nullable => Ok(()),
        }
    }

    fn create_refs_and_units(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        let pool = self.pool;
        let intf = self.types.interface_name(cl);
        let class = self.types.class_name(cl);
        let get_tag = names::get_tag(cl);
        let tag_desc = MethodDescriptor::new(Vec::new(), JavaType::Int);
        debug!(choice = pool.name(cl), interface = %intf, "synthesizing marker interface");

        self.classes
            .interface(&intf)
            .add_method(MethodShape::new_abstract(get_tag.clone(), tag_desc.clone()));

        let this = JavaType::Object(class.clone());
        let tag_field = FieldRef::new(class.clone(), names::TAG_FIELD, JavaType::Int);
        let init_desc = MethodDescriptor::new(vec![JavaType::Int], JavaType::Void);
        let init = Code::of(Instr::Load(this.clone(), 0))
            .then(Instr::Invoke(
                InvokeKind::Special,
                MethodRef::new(JAVA_LANG_OBJECT, "<init>", MethodDescriptor::void()),
            ))
            .then(Instr::Load(this.clone(), 0))
            .then(Instr::Load(JavaType::Int, 1))
            .then(Instr::PutField(tag_field.clone()))
            .then(Instr::Return(JavaType::Void));
        let own_tag = Code::of(Instr::Load(this.clone(), 0))
            .then(Instr::GetField(tag_field))
            .then(Instr::Return(JavaType::Int));

        let mut singletons = Code::new();
        for (tag, &alt) in pool.choices(cl).iter().enumerate() {
            if pool.is_void_type(alt) {
                continue;
            }
            let tag_value = tag_const(tag)?;
            if pool.is_ref(alt) {
                let returns_tag = Code::of(Instr::IConst(tag_value)).then(Instr::Return(JavaType::Int));
                for &heir in pool.instantiated_heirs(alt) {
                    let heir_class = self.classes.class(&self.types.class_name(heir));
                    heir_class.add_interface(&intf);
                    heir_class.add_method(MethodShape::new_instance(
                        get_tag.clone(),
                        tag_desc.clone(),
                        returns_tag.clone(),
                    ));
                }
            } else {
                let field = FieldRef::new(class.clone(), names::choice_unit(tag), this.clone());
                singletons.push(Instr::New(class.clone()));
                singletons.push(Instr::Dup);
                singletons.push(Instr::IConst(tag_value));
                singletons.push(Instr::Invoke(
                    InvokeKind::Special,
                    MethodRef::new(class.clone(), "<init>", init_desc.clone()),
                ));
                singletons.push(Instr::PutStatic(field));
            }
        }

        let shape = self.classes.class(&class);
        shape.add_interface(&intf);
        shape.add_field(FieldShape::instance(names::TAG_FIELD, JavaType::Int));
        for (tag, &alt) in pool.choices(cl).iter().enumerate() {
            if !pool.is_void_type(alt) && !pool.is_ref(alt) {
                shape.add_field(FieldShape::constant(names::choice_unit(tag), this.clone()));
            }
        }
        shape.add_method(MethodShape::new_instance("<init>", init_desc, init));
        shape.add_method(MethodShape::new_instance(get_tag, tag_desc, own_tag));
        shape.add_to_clinit(singletons);
        Ok(())
    }

    fn create_general(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        let pool = self.pool;
        let class = self.types.class_name(cl);
        debug!(choice = pool.name(cl), class = %class, "synthesizing choice class");
        let entries: Vec<FieldRef> = (0..pool.num_choices(cl))
            .filter_map(|tag| self.choice_entry(cl, tag))
            .collect();
        let shape = self.classes.class(&class);
        shape.add_field(FieldShape::instance(names::TAG_FIELD, JavaType::Int));
        for entry in entries {
            shape.add_field(FieldShape::instance(entry.name, entry.ty));
        }
        Ok(())
    }

    /// Field of general choice `cl` holding the payload of alternative
    /// `tag`. Ref alternatives share one field.
    pub(crate) fn choice_entry(&self, cl: ClazzId, tag: usize) -> Option<FieldRef> {
        let pool = self.pool;
        let alt = *pool.choices(cl).get(tag)?;
        let class = self.types.class_name(cl);
        if pool.is_ref(alt) {
            return Some(FieldRef::new(class, names::CHOICE_REF_FIELD, JavaType::any()));
        }
        let ty = self.types.java_type(alt);
        (!ty.is_void()).then(|| FieldRef::new(class, names::choice_entry(tag), ty))
    }

    /// The field holding the tag of general or refs-and-units choice `cl`.
    pub(crate) fn tag_field(&self, cl: ClazzId) -> FieldRef {
        FieldRef::new(self.types.class_name(cl), names::TAG_FIELD, JavaType::Int)
    }
}

/// `tag` as an `int` constant.
pub(crate) fn tag_const(tag: usize) -> Result<i32, JvmError> {
    i32::try_from(tag).map_err(|_| JvmError::internal(format!("tag {tag} out of range")))
}
