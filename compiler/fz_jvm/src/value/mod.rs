//! Value semantics for heap-allocated values.
//!
//! Instances of value types and general choices live on the JVM heap, but
//! must behave like values: storing one makes a copy, and equality compares
//! contents. Both are synthesized as static methods on the value's class,
//! `fzClone` and `fzEquals`, created on first use.

use fz_ir::ClazzId;

use crate::bytecode::FieldRef;
use crate::codegen::Codegen;

mod clone;
mod compare;


/// One field copied or compared by the synthesized methods.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ValueField {
    pub field: FieldRef,
    /// Value clazz of the field contents if they are copied and compared
    /// through their own methods.
    pub nested: Option<ClazzId>,
}

impl Codegen<'_> {
    /// Fields making up a value of `cl`.
    pub(crate) fn value_fields(&self, cl: ClazzId) -> Vec<ValueField> {
        let pool = self.pool;
        let types = &self.types;
        if pool.is_choice(cl) {
            let mut fields = vec![ValueField {
                field: self.tag_field(cl),
                nested: None,
            }];
            for (tag, &alt) in pool.choices(cl).iter().enumerate() {
                let Some(field) = self.choice_entry(cl, tag) else {
                    continue;
                };
                if fields.iter().any(|f| f.field.name == field.name) {
                    continue;
                }
                let nested = types.needs_copy(alt).then_some(alt);
                fields.push(ValueField { field, nested });
            }
            return fields;
        }
        pool.fields(cl)
            .iter()
            .filter(|&&f| types.field_exists(f))
            .map(|&f| {
                let ty = pool.result(f);
                let nested = (!pool.is_outer_ref(f) && types.needs_copy(ty)).then_some(ty);
                ValueField {
                    field: types.field_ref(f),
                    nested,
                }
            })
            .collect()
    }
}
