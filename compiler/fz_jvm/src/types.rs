//! Mapping of clazzes to JVM types, classes and slots.

use fz_ir::{ClazzId, ClazzKind, ClazzPool, SpecialClazz};

use crate::bytecode::{FieldRef, JavaType, MethodDescriptor};
use crate::layout::{LayoutClassifier, RepresentationKind};
use crate::names;

/// Clazz to JVM type mapping for one compilation.
pub struct Types<'pool> {
    pool: &'pool ClazzPool,
    layout: LayoutClassifier<'pool>,
}

impl<'pool> Types<'pool> {
    pub fn new(pool: &'pool ClazzPool) -> Self {
        Types {
            pool,
            layout: LayoutClassifier::new(pool),
        }
    }

    pub fn pool(&self) -> &'pool ClazzPool {
        self.pool
    }

    pub fn layout(&self) -> &LayoutClassifier<'pool> {
        &self.layout
    }

    /// Representation of choice `cl`.
    pub fn kind(&self, cl: ClazzId) -> RepresentationKind {
        self.layout.kind(cl)
    }

    /// Numeric built-ins whose value is the instance itself.
    pub fn is_scalar(&self, cl: ClazzId) -> bool {
        self.pool.special(cl).is_some_and(SpecialClazz::is_scalar)
    }

    /// Whether ref clazz `cl` has instantiated heirs other than itself.
    pub fn has_real_heirs(&self, cl: ClazzId) -> bool {
        match self.pool.instantiated_heirs(cl) {
            [] => false,
            [only] => *only != cl,
            _ => true,
        }
    }

    pub fn class_name(&self, cl: ClazzId) -> String {
        names::class(self.pool, cl)
    }

    pub fn interface_name(&self, cl: ClazzId) -> String {
        names::interface(self.pool, cl)
    }

    /// JVM type of values of clazz `cl`. `Void` if values carry no data.
    pub fn java_type(&self, cl: ClazzId) -> JavaType {
        let pool = self.pool;
        if let Some(special) = pool.special(cl) {
            match special {
                SpecialClazz::Void | SpecialClazz::Unit | SpecialClazz::Universe => {
                    return JavaType::Void
                }
                SpecialClazz::I8 | SpecialClazz::U8 => return JavaType::Byte,
                SpecialClazz::I16 => return JavaType::Short,
                SpecialClazz::U16 => return JavaType::Char,
                SpecialClazz::I32 | SpecialClazz::U32 => return JavaType::Int,
                SpecialClazz::I64 | SpecialClazz::U64 => return JavaType::Long,
                SpecialClazz::F32 => return JavaType::Float,
                SpecialClazz::F64 => return JavaType::Double,
                SpecialClazz::ConstString => return JavaType::string(),
                SpecialClazz::Bool => {}
            }
        }
        if pool.is_choice(cl) {
            return match self.kind(cl) {
                RepresentationKind::Voidlike | RepresentationKind::Unitlike => JavaType::Void,
                RepresentationKind::Boollike => JavaType::Boolean,
                RepresentationKind::Intlike => JavaType::Int,
                RepresentationKind::Nullable => pool
                    .choices(cl)
                    .iter()
                    .find(|&&c| pool.is_ref(c))
                    .map_or_else(JavaType::any, |&c| self.java_type(c)),
                RepresentationKind::RefsAndUnits => JavaType::Object(self.interface_name(cl)),
                RepresentationKind::General => JavaType::Object(self.class_name(cl)),
            };
        }
        if pool.is_ref(cl) {
            return if self.has_real_heirs(cl) {
                JavaType::Object(self.interface_name(cl))
            } else {
                JavaType::Object(self.class_name(cl))
            };
        }
        if pool.is_unit_type(cl) {
            return JavaType::Void;
        }
        JavaType::Object(self.class_name(cl))
    }

    /// Whether a class is generated for `cl`.
    pub fn needs_class_file(&self, cl: ClazzId) -> bool {
        let pool = self.pool;
        match pool.kind(cl) {
            ClazzKind::Choice => self.kind(cl).needs_class_file(),
            ClazzKind::Routine | ClazzKind::Native => {
                let plain = matches!(pool.special(cl), None | Some(SpecialClazz::Universe));
                let empty = pool.is_unit_type(cl) && pool.body(cl).is_none();
                plain && !empty
            }
            ClazzKind::Field | ClazzKind::Intrinsic | ClazzKind::Abstract => false,
        }
    }

    /// Whether a routine call allocates an instance for `cl`.
    pub fn has_instance(&self, cl: ClazzId) -> bool {
        self.pool.kind(cl) == ClazzKind::Routine
            && self.needs_class_file(cl)
            && !self.pool.is_unit_type(cl)
    }

    /// Type of the instance of routine `cl` while its code runs.
    pub fn instance_type(&self, cl: ClazzId) -> JavaType {
        JavaType::Object(self.class_name(cl))
    }

    /// Whether routine `cl` receives its outer instance.
    pub fn has_outer_ref(&self, cl: ClazzId) -> bool {
        self.pool
            .outer_ref(cl)
            .is_some_and(|or| !self.java_type(self.pool.result(or)).is_void())
    }

    fn outer_type(&self, cl: ClazzId) -> JavaType {
        self.pool
            .outer(cl)
            .map_or(JavaType::Void, |o| self.java_type(o))
    }

    /// Descriptor of the static method implementing routine `cl`.
    pub fn descriptor(&self, cl: ClazzId) -> MethodDescriptor {
        let mut params = Vec::new();
        if self.has_outer_ref(cl) {
            params.push(self.outer_type(cl));
        }
        params.extend(self.arg_types(cl));
        MethodDescriptor::new(params, self.java_type(self.pool.result(cl)))
    }

    /// Descriptor of the interface method dispatching to `cc`: the call's
    /// arguments for calls, the assigned value for assignments.
    pub fn dyn_descriptor(&self, cc: ClazzId, is_call: bool) -> MethodDescriptor {
        if is_call {
            MethodDescriptor::new(self.arg_types(cc), self.java_type(self.pool.result(cc)))
        } else {
            let value = self.java_type(self.pool.result(cc));
            let params = if value.is_void() { Vec::new() } else { vec![value] };
            MethodDescriptor::new(params, JavaType::Void)
        }
    }

    /// JVM types of the arguments of `cl` that carry data.
    pub fn arg_types(&self, cl: ClazzId) -> Vec<JavaType> {
        self.pool
            .args(cl)
            .iter()
            .map(|&a| self.java_type(self.pool.result(a)))
            .filter(|t| !t.is_void())
            .collect()
    }

    /// Local slot of the outer instance, if passed.
    pub fn outer_slot(&self, cl: ClazzId) -> Option<u16> {
        self.has_outer_ref(cl).then_some(0)
    }

    /// Local slot of argument `i` of routine `cl`.
    pub fn arg_slot(&self, cl: ClazzId, i: usize) -> u16 {
        let pool = self.pool;
        let outer = if self.has_outer_ref(cl) {
            self.outer_type(cl).slots()
        } else {
            0
        };
        outer
            + pool.args(cl)[..i]
                .iter()
                .map(|&a| self.java_type(pool.result(a)).slots())
                .sum::<u16>()
    }

    /// Local slot of the current instance of routine `cl`.
    pub fn current_slot(&self, cl: ClazzId) -> u16 {
        self.arg_slot(cl, self.pool.args(cl).len())
    }

    /// JVM type of the values stored in field `f`.
    pub fn field_type(&self, f: ClazzId) -> JavaType {
        self.java_type(self.pool.result(f))
    }

    /// Whether field `f` is present in its outer clazz' class.
    pub fn field_exists(&self, f: ClazzId) -> bool {
        self.pool
            .outer(f)
            .is_some_and(|owner| self.has_instance(owner))
            && !self.field_type(f).is_void()
    }

    pub fn field_ref(&self, f: ClazzId) -> FieldRef {
        let owner = self.pool.outer(f).unwrap_or(ClazzId::UNIVERSE);
        FieldRef::new(
            self.class_name(owner),
            names::field(self.pool, f),
            self.field_type(f),
        )
    }

    /// Whether values of `cl` live on the heap but have value semantics, so
    /// a copy must be made when they are stored.
    pub fn needs_copy(&self, cl: ClazzId) -> bool {
        let pool = self.pool;
        if pool.is_ref(cl) {
            return false;
        }
        match pool.kind(cl) {
            ClazzKind::Choice => self.kind(cl) == RepresentationKind::General,
            ClazzKind::Routine => self.has_instance(cl),
            _ => false,
        }
    }
}
