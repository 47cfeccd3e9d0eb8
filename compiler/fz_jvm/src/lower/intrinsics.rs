//! Inline code for intrinsic features.
//!
//! Intrinsics are looked up by the qualified name of the feature. The
//! target value is the left operand of infix operators.

use fz_ir::{ClazzId, Span};

use crate::bytecode::{Code, Cond, Instr, InvokeKind, JavaType, MethodDescriptor, MethodRef};
use crate::{names, JvmProblem};

use super::{Lowered, RoutineLowerer, Val};

/// Operation performed by an intrinsic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Intrinsic {
    /// Binary `int` arithmetic.
    IntOp(Instr32),
    /// Binary `int` comparison yielding `bool`.
    IntCmp(Cond),
    /// Binary `long` arithmetic.
    LongOp(Instr64),
    /// Binary `long` comparison yielding `bool`.
    LongCmp(Cond),
    /// Terminate with the message given as argument.
    Panic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Instr32 {
    Add,
    Sub,
    Mul,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) enum Instr64 {
    Add,
    Sub,
    Mul,
}

pub(super) fn lookup(name: &str) -> Option<Intrinsic> {
    let (ty, op) = name.split_once(".infix ").unwrap_or((name, ""));
    let int = matches!(ty, "i8" | "i16" | "i32" | "u8" | "u16" | "u32");
    let long = matches!(ty, "i64" | "u64");
    let intrinsic = match op {
        "+" if int => Intrinsic::IntOp(Instr32::Add),
        "-" if int => Intrinsic::IntOp(Instr32::Sub),
        "*" if int => Intrinsic::IntOp(Instr32::Mul),
        "+" if long => Intrinsic::LongOp(Instr64::Add),
        "-" if long => Intrinsic::LongOp(Instr64::Sub),
        "*" if long => Intrinsic::LongOp(Instr64::Mul),
        "=" | "!=" | "<" | "<=" | ">" | ">=" if int || long => {
            let cond = comparison(op, long)?;
            if long {
                Intrinsic::LongCmp(cond)
            } else {
                Intrinsic::IntCmp(cond)
            }
        }
        "" if name == "fuzion.std.panic" => Intrinsic::Panic,
        _ => return None,
    };
    Some(intrinsic)
}

/// Condition of comparison `op`: on two `int`s, or on the result of
/// `lcmp` for `long`s.
fn comparison(op: &str, long: bool) -> Option<Cond> {
    let (int, zero) = match op {
        "=" => (Cond::ICmpEq, Cond::Eq),
        "!=" => (Cond::ICmpNe, Cond::Ne),
        "<" => (Cond::ICmpLt, Cond::Lt),
        "<=" => (Cond::ICmpLe, Cond::Le),
        ">" => (Cond::ICmpGt, Cond::Gt),
        ">=" => (Cond::ICmpGe, Cond::Ge),
        _ => return None,
    };
    Some(if long { zero } else { int })
}

/// `1` if `cond` holds, `0` otherwise.
fn bool_of(cond: Cond) -> Code {
    Code::branch(cond, Code::of(Instr::IConst(1)), Code::of(Instr::IConst(0)))
}

impl RoutineLowerer<'_, '_> {
    pub(super) fn intrinsic(
        &mut self,
        cc: ClazzId,
        span: Span,
        tvalue: Val,
        args: Vec<Val>,
    ) -> Lowered {
        let pool = self.pool();
        let name = pool.name(cc);
        let ret = self.cg.types.java_type(pool.result(cc));
        let Some(intrinsic) = lookup(name) else {
            let code = args.into_iter().fold(tvalue.drop(), |c, a| c.and(a.drop()));
            let problem = JvmProblem::MissingIntrinsic {
                name: name.to_owned(),
                span,
            };
            return Lowered::unreachable(code.and(self.cg.report(problem)));
        };

        let mut operands = tvalue.code;
        for a in args {
            operands.append(a.code);
        }
        let code = match intrinsic {
            Intrinsic::IntOp(op) => operands.then(match op {
                Instr32::Add => Instr::IAdd,
                Instr32::Sub => Instr::ISub,
                Instr32::Mul => Instr::IMul,
            }),
            Intrinsic::LongOp(op) => operands.then(match op {
                Instr64::Add => Instr::LAdd,
                Instr64::Sub => Instr::LSub,
                Instr64::Mul => Instr::LMul,
            }),
            Intrinsic::IntCmp(cond) => operands.and(bool_of(cond)),
            Intrinsic::LongCmp(cond) => operands.then(Instr::LCmp).and(bool_of(cond)),
            Intrinsic::Panic => {
                let code = operands
                    .then(Instr::Invoke(
                        InvokeKind::Static,
                        MethodRef::new(
                            names::RUNTIME_CLASS,
                            names::RUNTIME_FATAL,
                            MethodDescriptor::new(vec![JavaType::string()], JavaType::Void),
                        ),
                    ))
                    .and(Code::endless_loop());
                return Lowered::unreachable(code);
            }
        };
        Lowered::value(Val::new(code, ret))
    }
}
