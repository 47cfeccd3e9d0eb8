//! Lowering of routine bodies to instructions.
//!
//! [`RoutineLowerer`] walks a routine's [`Expr`] tree. Every expression
//! lowers to a [`Lowered`]: statements that run first and a value
//! expression that pushes the result, or no value if control never gets
//! past the expression (a trap, a tail call, a call of a `void` feature).
//!
//! The lowerer is split across files by concern:
//! - `calls.rs`: accesses, static calls, field reads and writes, boxing
//! - `dispatch.rs`: dynamic dispatch through synthesized interfaces
//! - `tail.rs`: self tail calls as jumps
//! - `intrinsics.rs`: inline code for intrinsic features
//! - `constants.rs`: constants and the preallocated constant pool

use fz_ir::{ClazzId, Expr};
use fz_stack::ensure_sufficient_stack;

use crate::bytecode::{Code, Instr, InvokeKind, JavaType, Label, MethodDescriptor, MethodRef, MethodShape};
use crate::codegen::{trace, Codegen};
use crate::types::Types;
use crate::{names, JvmError};

mod calls;
pub(crate) mod constants;
mod dispatch;
mod intrinsics;
mod tail;

#[cfg(test)]
mod tests;

/// Code producing one value.
#[derive(Clone, Debug, PartialEq)]
pub struct Val {
    pub code: Code,
    pub ty: JavaType,
}

impl Val {
    pub fn new(code: Code, ty: JavaType) -> Self {
        Val { code, ty }
    }

    /// The unit value.
    pub fn unit() -> Self {
        Val::new(Code::new(), JavaType::Void)
    }

    /// A unit value produced by code run for its effect.
    pub fn effect(code: Code) -> Self {
        Val::new(code, JavaType::Void)
    }

    /// Evaluate and discard.
    pub fn drop(self) -> Code {
        let pop = Code::pop(&self.ty);
        self.code.and(pop)
    }

    /// Narrow a reference to `ty` if it is statically of a different type.
    #[must_use]
    pub fn cast_to(self, ty: &JavaType) -> Val {
        match (&self.ty, ty) {
            (JavaType::Object(from), JavaType::Object(to))
                if from != to && to != crate::bytecode::JAVA_LANG_OBJECT =>
            {
                Val::new(self.code.then(Instr::CheckCast(to.clone())), ty.clone())
            }
            _ => self,
        }
    }

    /// Whether evaluating this value later instead of now makes no difference.
    fn is_stable(&self) -> bool {
        self.code.instrs().iter().all(|i| {
            matches!(
                i,
                Instr::Comment(_)
                    | Instr::IConst(_)
                    | Instr::LConst(_)
                    | Instr::FConst(_)
                    | Instr::DConst(_)
                    | Instr::AConstNull
                    | Instr::Ldc(_)
                    | Instr::Load(..)
                    | Instr::GetStatic(_)
            )
        })
    }
}

/// Result of lowering one expression.
#[derive(Clone, Debug, PartialEq)]
pub struct Lowered {
    pub stmts: Code,
    /// `None` if control does not continue after `stmts`.
    pub value: Option<Val>,
}

impl Lowered {
    pub fn value(value: Val) -> Self {
        Lowered {
            stmts: Code::new(),
            value: Some(value),
        }
    }

    /// Statements producing the unit value.
    pub fn stmts(stmts: Code) -> Self {
        Lowered {
            stmts,
            value: Some(Val::unit()),
        }
    }

    /// Statements after which control does not continue.
    pub fn unreachable(stmts: Code) -> Self {
        Lowered { stmts, value: None }
    }

    /// The same result with `code` run first.
    #[must_use]
    pub fn after(mut self, code: Code) -> Self {
        self.stmts = code.and(self.stmts);
        self
    }

    /// Statements evaluating the expression and discarding its value, and
    /// whether control continues afterwards.
    pub fn into_stmt(self) -> (Code, bool) {
        match self.value {
            Some(v) => (self.stmts.and(v.drop()), true),
            None => (self.stmts, false),
        }
    }
}

/// Loop-head labels of a routine with self tail calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TailLabels {
    /// Before the current instance is allocated.
    pub before_prolog: Label,
    /// After the current instance is allocated.
    pub after_prolog: Label,
}

/// Per-routine state: slot allocation and tail-call labels.
#[derive(Clone, Debug)]
pub struct RoutineCx {
    pub cl: ClazzId,
    next_local: u16,
    tail: Option<TailLabels>,
    /// Slot and type of the current instance, if the routine has one.
    current: Option<(u16, JavaType)>,
}

impl RoutineCx {
    pub fn new(types: &Types<'_>, cl: ClazzId) -> Self {
        let slot = types.current_slot(cl);
        let current = types
            .has_instance(cl)
            .then(|| (slot, types.instance_type(cl)));
        RoutineCx {
            cl,
            next_local: slot + u16::from(current.is_some()),
            tail: None,
            current,
        }
    }

    /// Context for code outside any routine, e.g. a stub, whose first
    /// `first_free` slots are taken by parameters.
    pub fn detached(cl: ClazzId, first_free: u16) -> Self {
        RoutineCx {
            cl,
            next_local: first_free,
            tail: None,
            current: None,
        }
    }

    /// A fresh local slot for a value of type `ty`.
    pub fn alloc_local(&mut self, ty: &JavaType) -> u16 {
        let slot = self.next_local;
        self.next_local += ty.slots();
        slot
    }

    /// Loop-head labels, created on first use.
    pub fn tail_labels(&mut self) -> TailLabels {
        *self.tail.get_or_insert_with(|| TailLabels {
            before_prolog: Label::fresh(),
            after_prolog: Label::fresh(),
        })
    }

    pub fn current_slot(&self) -> Option<(u16, &JavaType)> {
        self.current.as_ref().map(|(slot, ty)| (*slot, ty))
    }
}

/// Lowers the body of one routine.
pub struct RoutineLowerer<'c, 'a> {
    pub(crate) cg: &'c mut Codegen<'a>,
    pub(crate) cx: RoutineCx,
}

impl<'c, 'a> RoutineLowerer<'c, 'a> {
    pub fn new(cg: &'c mut Codegen<'a>, cx: RoutineCx) -> Self {
        RoutineLowerer { cg, cx }
    }

    fn pool(&self) -> &'a fz_ir::ClazzPool {
        self.cg.pool
    }

    /// The current instance, or unit if the routine has none.
    pub fn current(&self) -> Val {
        match self.cx.current_slot() {
            Some((slot, ty)) => Val::new(Code::of(Instr::Load(ty.clone(), slot)), ty.clone()),
            None => Val::unit(),
        }
    }

    pub fn lower(&mut self, expr: &Expr) -> Result<Lowered, JvmError> {
        ensure_sufficient_stack(|| self.lower_expr(expr))
    }

    /// Lower `expr` for its effect only.
    pub fn lower_stmt(&mut self, expr: &Expr) -> Result<(Code, bool), JvmError> {
        Ok(self.lower(expr)?.into_stmt())
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        let cl = self.cx.cl;
        match expr {
            Expr::Unit => Ok(Lowered::value(Val::unit())),
            Expr::Const { clazz, data } => self.constant(*clazz, data),
            Expr::Current => Ok(Lowered::value(self.current())),
            Expr::Outer => {
                let val = match (self.cg.types.outer_slot(cl), pool.outer(cl)) {
                    (Some(slot), Some(outer)) => {
                        let ty = self.cg.types.java_type(outer);
                        Val::new(Code::of(Instr::Load(ty.clone(), slot)), ty)
                    }
                    _ => Val::unit(),
                };
                Ok(Lowered::value(val))
            }
            Expr::Arg(i) => {
                if *i >= pool.args(cl).len() {
                    return Err(JvmError::internal(format!(
                        "argument {i} of `{}` does not exist",
                        pool.name(cl)
                    )));
                }
                let ty = self.cg.types.java_type(pool.arg_clazz(cl, *i));
                let val = if ty.is_void() {
                    Val::unit()
                } else {
                    let slot = self.cg.types.arg_slot(cl, *i);
                    Val::new(Code::of(Instr::Load(ty.clone(), slot)), ty)
                };
                Ok(Lowered::value(val))
            }
            Expr::Call { site, target, args } => {
                let operands = std::iter::once(&**target).chain(args);
                let (stmts, vals) = match self.lower_operands(operands)? {
                    Operands::Values(stmts, vals) => (stmts, vals),
                    Operands::Unreachable(stmts) => return Ok(Lowered::unreachable(stmts)),
                };
                let mut vals = vals.into_iter();
                let tvalue = vals.next().unwrap_or_else(Val::unit);
                Ok(self.call(*site, tvalue, vals.collect())?.after(stmts))
            }
            Expr::Assign {
                site,
                target,
                value,
            } => {
                let operands = [&**target, &**value];
                let (stmts, vals) = match self.lower_operands(operands.into_iter())? {
                    Operands::Values(stmts, vals) => (stmts, vals),
                    Operands::Unreachable(stmts) => return Ok(Lowered::unreachable(stmts)),
                };
                let mut vals = vals.into_iter();
                let tvalue = vals.next().unwrap_or_else(Val::unit);
                let value = vals.next().unwrap_or_else(Val::unit);
                Ok(self.assign(*site, tvalue, value)?.after(stmts))
            }
            Expr::Match {
                site,
                subject,
                cases,
            } => {
                let subject = self.lower(subject)?;
                let Some(sub) = subject.value else {
                    return Ok(Lowered::unreachable(subject.stmts));
                };
                let mut bodies = Vec::with_capacity(cases.len());
                for case in cases {
                    bodies.push(self.lower_stmt(case)?.0);
                }
                let (code, continues) = self.match_choice(*site, sub, bodies)?;
                let lowered = if continues {
                    Lowered::stmts(code)
                } else {
                    Lowered::unreachable(code)
                };
                Ok(lowered.after(subject.stmts))
            }
            Expr::Tag {
                value,
                value_clazz,
                choice,
                tag,
            } => {
                let lowered = self.lower(value)?;
                let Some(v) = lowered.value else {
                    return Ok(Lowered::unreachable(lowered.stmts));
                };
                let tagged = self.tag(v, *value_clazz, *choice, *tag)?;
                Ok(Lowered::value(tagged).after(lowered.stmts))
            }
            Expr::Box { value, from, to } => {
                let lowered = self.lower(value)?;
                let Some(v) = lowered.value else {
                    return Ok(Lowered::unreachable(lowered.stmts));
                };
                let boxed = self.box_value(v, *from, *to)?;
                Ok(Lowered::value(boxed).after(lowered.stmts))
            }
            Expr::Equals { clazz, lhs, rhs } => {
                let (stmts, vals) = match self.lower_operands([&**lhs, &**rhs].into_iter())? {
                    Operands::Values(stmts, vals) => (stmts, vals),
                    Operands::Unreachable(stmts) => return Ok(Lowered::unreachable(stmts)),
                };
                let mut vals = vals.into_iter();
                let a = vals.next().unwrap_or_else(Val::unit);
                let b = vals.next().unwrap_or_else(Val::unit);
                let eq = self.cg.equals_value(*clazz, a, b)?;
                Ok(Lowered::value(eq).after(stmts))
            }
            Expr::Seq(exprs) => {
                let Some((last, init)) = exprs.split_last() else {
                    return Ok(Lowered::value(Val::unit()));
                };
                let mut stmts = Code::new();
                for e in init {
                    let (code, reachable) = self.lower_stmt(e)?;
                    stmts.append(code);
                    if !reachable {
                        return Ok(Lowered::unreachable(stmts));
                    }
                }
                Ok(self.lower(last)?.after(stmts))
            }
        }
    }

    /// Lower operands left to right. A value whose evaluation could be
    /// affected by the statements of a later operand is stored in a fresh
    /// local first, so operands are evaluated in order.
    fn lower_operands<'e>(
        &mut self,
        exprs: impl Iterator<Item = &'e Expr>,
    ) -> Result<Operands, JvmError> {
        let mut stmts = Code::new();
        let mut vals: Vec<Val> = Vec::new();
        for e in exprs {
            let lowered = self.lower(e)?;
            if lowered.stmts.has_effect() {
                for v in &mut vals {
                    if !v.is_stable() {
                        stmts.append(self.spill(v));
                    }
                }
            }
            stmts.append(lowered.stmts);
            match lowered.value {
                Some(v) => vals.push(v),
                None => return Ok(Operands::Unreachable(stmts)),
            }
        }
        Ok(Operands::Values(stmts, vals))
    }

    /// Evaluate `v` now into a local, leaving a load in its place.
    fn spill(&mut self, v: &mut Val) -> Code {
        let code = std::mem::take(&mut v.code);
        if v.ty.is_void() {
            return code;
        }
        let slot = self.cx.alloc_local(&v.ty);
        v.code = Code::of(Instr::Load(v.ty.clone(), slot));
        code.then(Instr::Store(v.ty.clone(), slot))
    }

    /// Allocate the current instance and store the outer reference in it.
    fn prolog(&self) -> Code {
        let types = &self.cg.types;
        let pool = self.pool();
        let cl = self.cx.cl;
        let Some((slot, ty)) = self.cx.current_slot() else {
            return Code::new();
        };
        let class = types.class_name(cl);
        let mut code = Code::of(Instr::New(class.clone()))
            .then(Instr::Dup)
            .then(Instr::Invoke(
                InvokeKind::Special,
                MethodRef::new(class, "<init>", MethodDescriptor::void()),
            ))
            .then(Instr::Store(ty.clone(), slot));
        if let (Some(or), Some(outer_slot), Some(outer)) =
            (pool.outer_ref(cl), types.outer_slot(cl), pool.outer(cl))
        {
            if types.field_exists(or) {
                code.push(Instr::Load(ty.clone(), slot));
                code.push(Instr::Load(types.java_type(outer), outer_slot));
                code.push(Instr::PutField(types.field_ref(or)));
            }
        }
        code
    }

    /// Return the routine's result.
    fn epilog(&self) -> Result<Code, JvmError> {
        let types = &self.cg.types;
        let pool = self.pool();
        let cl = self.cx.cl;
        let ret = types.java_type(pool.result(cl));
        let mut code = if self.cg.options.trace_returns {
            trace(format!("return from {}", pool.name(cl)))
        } else {
            Code::new()
        };
        if ret.is_void() {
            return Ok(code.then(Instr::Return(JavaType::Void)));
        }
        let current = self.current();
        match pool.result_field(cl) {
            Some(rf) if types.field_exists(rf) => {
                code.append(current.code);
                code.push(Instr::GetField(types.field_ref(rf)));
            }
            None if pool.is_constructor(cl) && !current.ty.is_void() => {
                code.append(current.cast_to(&ret).code);
            }
            _ => {
                return Err(JvmError::internal(format!(
                    "no result available for `{}`",
                    pool.name(cl)
                )))
            }
        }
        Ok(code.then(Instr::Return(ret)))
    }
}

/// Lowered operands of a call, assignment or comparison.
enum Operands {
    Values(Code, Vec<Val>),
    /// An operand does not produce a value; the statements so far.
    Unreachable(Code),
}

impl Codegen<'_> {
    /// Generate the static method implementing routine `cl`.
    pub(crate) fn compile_routine(&mut self, cl: ClazzId) -> Result<(), JvmError> {
        let pool = self.pool;
        let Some(body) = pool.body(cl) else {
            return Ok(());
        };
        tracing::trace!(routine = pool.name(cl), "compiling routine");
        let cx = RoutineCx::new(&self.types, cl);
        let mut lowerer = RoutineLowerer::new(self, cx);
        let prolog = lowerer.prolog();
        let (body_code, reachable) = lowerer.lower_stmt(body)?;
        let epilog = if reachable {
            lowerer.epilog()?
        } else {
            Code::new()
        };
        let tail = lowerer.cx.tail;

        let mut code = Code::new();
        if let Some(labels) = tail {
            code.push(Instr::Bind(labels.before_prolog));
        }
        code.append(prolog);
        if let Some(labels) = tail {
            code.push(Instr::Bind(labels.after_prolog));
        }
        code.append(body_code);
        code.append(epilog);

        let desc = self.types.descriptor(cl);
        let class = self.types.class_name(cl);
        self.classes
            .class(&class)
            .add_method(MethodShape::new_static(names::ROUTINE, desc, code));
        Ok(())
    }
}
