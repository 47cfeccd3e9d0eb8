//! The backend driver.
//!
//! Compilation runs in fixed phases over all clazzes of the pool:
//! 1. class shells: a class for every clazz that needs one, an interface
//!    for every ref clazz with several heirs;
//! 2. fields: instance fields, choice classes, boxing support;
//! 3. code: one static method per routine, plus whatever dispatch stubs and
//!    value methods the code needs;
//! 4. emission: the constants class, then verification of every method.

use tracing::debug;

use fz_diagnostic::DiagnosticQueue;
use fz_ir::{ClazzId, ClazzKind, ClazzPool, TailCallAnalysis, TailCallOracle};

use crate::bytecode::{
    ClassShape, Code, FieldRef, FieldShape, Instr, InvokeKind, JavaType, MethodDescriptor,
    MethodRef, MethodShape,
};
use crate::codegen::Codegen;
use crate::{names, JvmError, JvmOptions};

/// Result of a successful compilation.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledProgram {
    /// Classes and interfaces in creation order, all verified.
    pub classes: Vec<ClassShape>,
}

impl CompiledProgram {
    pub fn class(&self, name: &str) -> Option<&ClassShape> {
        self.classes.iter().find(|c| c.name == name)
    }
}

/// JVM backend for one program.
pub struct JvmBackend<'a> {
    pool: &'a ClazzPool,
    options: JvmOptions,
    tail_calls: TailCallAnalysis,
    oracle: Option<&'a dyn TailCallOracle>,
}

impl<'a> JvmBackend<'a> {
    /// A backend with default options, finding tail calls itself.
    pub fn new(pool: &'a ClazzPool) -> Self {
        Self::with_options(pool, JvmOptions::default())
    }

    pub fn with_options(pool: &'a ClazzPool, options: JvmOptions) -> Self {
        JvmBackend {
            pool,
            options,
            tail_calls: TailCallAnalysis::new(pool),
            oracle: None,
        }
    }

    /// Use `oracle` to decide which calls are in tail position.
    #[must_use]
    pub fn with_oracle(mut self, oracle: &'a dyn TailCallOracle) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn options(&self) -> &JvmOptions {
        &self.options
    }

    /// Compile all clazzes. Problems in the program are reported to
    /// `diagnostics`; if any of them is an error, compilation still runs all
    /// phases and then fails with [`JvmError::ErrorsReported`].
    pub fn compile(&self, diagnostics: &mut DiagnosticQueue) -> Result<CompiledProgram, JvmError> {
        let oracle: &dyn TailCallOracle = match self.oracle {
            Some(oracle) => oracle,
            None => &self.tail_calls,
        };
        let mut cg = Codegen::new(self.pool, oracle, &self.options, diagnostics);
        cg.create_class_shells();
        cg.create_fields()?;
        cg.create_code()?;
        let classes = cg.emit()?;
        if let Some(proof) = diagnostics.has_errors() {
            return Err(JvmError::ErrorsReported(proof));
        }
        debug!(classes = classes.len(), "compilation finished");
        Ok(CompiledProgram { classes })
    }
}

impl Codegen<'_> {
    fn create_class_shells(&mut self) {
        let pool = self.pool;
        for cl in pool.ids() {
            if pool.kind(cl) != ClazzKind::Choice && self.types.needs_class_file(cl) {
                self.classes.class(&self.types.class_name(cl));
            }
            if pool.is_ref(cl) && self.types.has_real_heirs(cl) {
                let intf = self.types.interface_name(cl);
                debug!(clazz = pool.name(cl), interface = %intf, "ref type with several heirs");
                self.classes.interface(&intf);
                for &heir in pool.instantiated_heirs(cl) {
                    self.classes
                        .class(&self.types.class_name(heir))
                        .add_interface(&intf);
                }
            }
        }
    }

    fn create_fields(&mut self) -> Result<(), JvmError> {
        let pool = self.pool;
        for cl in pool.ids() {
            if pool.is_choice(cl) {
                self.create_choice_class(cl)?;
                continue;
            }
            if self.types.has_instance(cl) {
                let fields: Vec<FieldShape> = pool
                    .fields(cl)
                    .iter()
                    .filter(|&&f| self.types.field_exists(f))
                    .map(|&f| FieldShape::instance(names::field(pool, f), self.types.field_type(f)))
                    .collect();
                let class = self.classes.class(&self.types.class_name(cl));
                for field in fields {
                    class.add_field(field);
                }
            }
            if let Some(value) = pool.boxed_value(cl) {
                self.create_box(cl, value);
            }
        }
        Ok(())
    }

    /// The field holding the wrapped value and the static `fzBox` method
    /// creating an instance of boxed clazz `cl`.
    fn create_box(&mut self, cl: ClazzId, value: ClazzId) {
        let class = self.types.class_name(cl);
        let ty = JavaType::Object(class.clone());
        let vt = self.types.java_type(value);
        let mut code = Code::of(Instr::New(class.clone()))
            .then(Instr::Dup)
            .then(Instr::Invoke(
                InvokeKind::Special,
                MethodRef::new(class.clone(), "<init>", MethodDescriptor::void()),
            ));
        let params = if vt.is_void() {
            Vec::new()
        } else {
            code.push(Instr::Dup);
            code.push(Instr::Load(vt.clone(), 0));
            code.push(Instr::PutField(FieldRef::new(
                class.clone(),
                names::BOXED_VALUE_FIELD,
                vt.clone(),
            )));
            vec![vt.clone()]
        };
        code.push(Instr::Return(ty.clone()));

        let shape = self.classes.class(&class);
        if !vt.is_void() {
            shape.add_field(FieldShape::instance(names::BOXED_VALUE_FIELD, vt));
        }
        shape.add_method(MethodShape::new_static(
            names::BOX_METHOD,
            MethodDescriptor::new(params, ty),
            code,
        ));
    }

    fn create_code(&mut self) -> Result<(), JvmError> {
        let pool = self.pool;
        for cl in pool.ids() {
            if matches!(pool.kind(cl), ClazzKind::Routine | ClazzKind::Native)
                && self.types.needs_class_file(cl)
            {
                self.compile_routine(cl)?;
            }
        }
        Ok(())
    }

    fn emit(mut self) -> Result<Vec<ClassShape>, JvmError> {
        let constants = std::mem::take(&mut self.constants);
        constants.emit(&mut self.classes);
        self.classes.finish()
    }
}
