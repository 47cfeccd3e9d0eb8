//! State shared by all code generation phases.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use fz_diagnostic::DiagnosticQueue;
use fz_ir::{ClazzId, ClazzPool, TailCallOracle};

use crate::bytecode::{ClassShape, Code, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef};
use crate::lower::constants::Constants;
use crate::names;
use crate::types::Types;
use crate::{JvmError, JvmOptions, JvmProblem};

/// All classes and interfaces created so far, in creation order.
#[derive(Debug, Default)]
pub struct ClassFiles {
    order: Vec<String>,
    by_name: FxHashMap<String, ClassShape>,
}

impl ClassFiles {
    /// The class `name`, created on first use.
    pub fn class(&mut self, name: &str) -> &mut ClassShape {
        let order = &mut self.order;
        self.by_name.entry(name.to_owned()).or_insert_with(|| {
            order.push(name.to_owned());
            ClassShape::class(name)
        })
    }

    /// The interface `name`, created on first use.
    pub fn interface(&mut self, name: &str) -> &mut ClassShape {
        let order = &mut self.order;
        self.by_name.entry(name.to_owned()).or_insert_with(|| {
            order.push(name.to_owned());
            ClassShape::interface(name)
        })
    }

    /// Finish and verify every class, in creation order.
    pub fn finish(mut self) -> Result<Vec<ClassShape>, JvmError> {
        let mut classes = Vec::with_capacity(self.order.len());
        for name in &self.order {
            let Some(mut class) = self.by_name.remove(name) else {
                return Err(JvmError::internal(format!("class `{name}` registered twice")));
            };
            class
                .finish()
                .map_err(|(method, source)| JvmError::Malformed {
                    class: name.clone(),
                    method,
                    source,
                })?;
            classes.push(class);
        }
        Ok(classes)
    }
}

/// Code generator for one program.
pub struct Codegen<'a> {
    pub(crate) pool: &'a ClazzPool,
    pub(crate) types: Types<'a>,
    pub(crate) options: &'a JvmOptions,
    pub(crate) oracle: &'a dyn TailCallOracle,
    pub(crate) diagnostics: &'a mut DiagnosticQueue,
    pub(crate) classes: ClassFiles,
    pub(crate) constants: Constants,
    /// Stubs already installed: (concrete type, dispatch method name).
    pub(crate) stubs: FxHashSet<(ClazzId, String)>,
    /// Synthesized value methods already installed: (clazz, method name).
    pub(crate) value_methods: FxHashSet<(ClazzId, &'static str)>,
}

impl<'a> Codegen<'a> {
    pub fn new(
        pool: &'a ClazzPool,
        oracle: &'a dyn TailCallOracle,
        options: &'a JvmOptions,
        diagnostics: &'a mut DiagnosticQueue,
    ) -> Self {
        Codegen {
            pool,
            types: Types::new(pool),
            options,
            oracle,
            diagnostics,
            classes: ClassFiles::default(),
            constants: Constants::default(),
            stubs: FxHashSet::default(),
            value_methods: FxHashSet::default(),
        }
    }

    /// Report `problem` and return the trap replacing the failing code.
    pub(crate) fn report(&mut self, problem: JvmProblem) -> Code {
        let message = problem.trap_message();
        warn!(code = %problem.code(), "{message}");
        if problem.is_error() {
            self.diagnostics.emit_error(problem.into_diagnostic());
        } else {
            self.diagnostics.add(problem.into_diagnostic());
        }
        trap(&message)
    }
}

/// Code that terminates the program with `message`. Never falls through.
pub(crate) fn trap(message: &str) -> Code {
    Code::of(Instr::Ldc(message.to_owned()))
        .then(Instr::Invoke(
            InvokeKind::Static,
            MethodRef::new(
                names::RUNTIME_CLASS,
                names::RUNTIME_FATAL,
                MethodDescriptor::new(vec![JavaType::string()], JavaType::Void),
            ),
        ))
        .and(Code::endless_loop())
}

/// Code printing `message` through the runtime's trace support.
pub(crate) fn trace(message: String) -> Code {
    Code::of(Instr::Ldc(message)).then(Instr::Invoke(
        InvokeKind::Static,
        MethodRef::new(
            names::RUNTIME_CLASS,
            names::RUNTIME_TRACE,
            MethodDescriptor::new(vec![JavaType::string()], JavaType::Void),
        ),
    ))
}
