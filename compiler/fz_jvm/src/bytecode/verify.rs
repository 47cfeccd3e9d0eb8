//! Stack and local-slot verification.
//!
//! Runs one forward pass over a method's instructions tracking the operand
//! stack and local slots. Every label gets the state of all edges reaching
//! it; forward edges are merged, backward edges must conform to the frame
//! recorded when the label was bound. The result carries the maximum stack
//! depth, the number of locals and the frames needed for stack map tables.

use rustc_hash::{FxHashMap, FxHashSet};

use super::{Code, Instr, InvokeKind, JavaType, Label, VType};

/// Verification state at one label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackMapFrame {
    pub label: Label,
    pub locals: Vec<VType>,
    pub stack: Vec<VType>,
}

/// Facts about verified code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// Maximum operand stack depth in words.
    pub max_stack: u16,
    /// Number of local slots used, parameters included.
    pub max_locals: u16,
    /// One frame per reachable label, in code order.
    pub frames: Vec<StackMapFrame>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("stack underflow at instruction {at}")]
    Underflow { at: usize },
    #[error("instruction {at} expects {expected} but found {found:?}")]
    TypeMismatch {
        at: usize,
        expected: String,
        found: VType,
    },
    #[error("instruction {at} reads local {slot} holding {found:?}")]
    BadLocal { at: usize, slot: u16, found: VType },
    #[error("inconsistent states at {label}: {first:?} vs {second:?}")]
    Inconsistent {
        label: Label,
        first: Vec<VType>,
        second: Vec<VType>,
    },
    #[error("{remaining} value(s) left on the stack at return (instruction {at})")]
    Unbalanced { at: usize, remaining: usize },
    #[error("label {0} is bound twice")]
    DuplicateLabel(Label),
    #[error("jump to label {0} which is never bound")]
    UnboundLabel(Label),
    #[error("jump to label {0} placed in unreachable code")]
    DeadTarget(Label),
    #[error("execution falls off the end of the code")]
    FallsOffEnd,
}

#[derive(Clone, Debug)]
struct State {
    locals: Vec<VType>,
    stack: Vec<VType>,
}

impl State {
    fn pop(&mut self, at: usize) -> Result<VType, VerifyError> {
        self.stack.pop().ok_or(VerifyError::Underflow { at })
    }

    fn pop_as(&mut self, at: usize, ty: &JavaType) -> Result<VType, VerifyError> {
        let v = self.pop(at)?;
        if v.conforms_to(ty) {
            Ok(v)
        } else {
            Err(VerifyError::TypeMismatch {
                at,
                expected: ty.descriptor(),
                found: v,
            })
        }
    }

    fn pop_kind(&mut self, at: usize, expected: &VType) -> Result<VType, VerifyError> {
        let v = self.pop(at)?;
        if v.is_assignable_to(expected) {
            Ok(v)
        } else {
            Err(VerifyError::TypeMismatch {
                at,
                expected: format!("{expected:?}"),
                found: v,
            })
        }
    }

    fn pop_narrow(&mut self, at: usize) -> Result<VType, VerifyError> {
        let v = self.pop(at)?;
        if v.is_wide() {
            Err(VerifyError::TypeMismatch {
                at,
                expected: "a one-word value".to_owned(),
                found: v,
            })
        } else {
            Ok(v)
        }
    }

    fn push(&mut self, v: VType) {
        self.stack.push(v);
    }

    fn words(&self) -> u16 {
        self.stack.iter().map(VType::words).sum()
    }

    fn set_local(&mut self, slot: u16, v: VType) {
        let slot = usize::from(slot);
        let wide = v.is_wide();
        let needed = slot + if wide { 2 } else { 1 };
        if self.locals.len() < needed {
            self.locals.resize(needed, VType::Top);
        }
        // A value overwriting the upper half of a wide value invalidates it.
        if slot > 0 && self.locals[slot - 1].is_wide() {
            self.locals[slot - 1] = VType::Top;
        }
        self.locals[slot] = v;
        if wide {
            self.locals[slot + 1] = VType::Top;
        }
    }

    fn merge(&self, other: &State, label: Label) -> Result<State, VerifyError> {
        let inconsistent = || VerifyError::Inconsistent {
            label,
            first: self.stack.clone(),
            second: other.stack.clone(),
        };
        if self.stack.len() != other.stack.len() {
            return Err(inconsistent());
        }
        let stack = self
            .stack
            .iter()
            .zip(&other.stack)
            .map(|(a, b)| a.merge_stack(b))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(inconsistent)?;

        let len = self.locals.len().max(other.locals.len());
        let mut locals: Vec<VType> = (0..len)
            .map(|i| match (self.locals.get(i), other.locals.get(i)) {
                (Some(a), Some(b)) => a.merge_local(b),
                _ => VType::Top,
            })
            .collect();
        while locals.last() == Some(&VType::Top) {
            locals.pop();
        }
        Ok(State { locals, stack })
    }

    /// Whether this state may flow into a label whose frame is `frame`.
    fn conforms_to(&self, frame: &State) -> bool {
        self.stack.len() == frame.stack.len()
            && self
                .stack
                .iter()
                .zip(&frame.stack)
                .all(|(a, b)| a.is_assignable_to(b))
            && frame
                .locals
                .iter()
                .enumerate()
                .all(|(i, b)| self.locals.get(i).unwrap_or(&VType::Top).is_assignable_to(b))
    }
}

struct Verifier<'a> {
    ret: &'a JavaType,
    pending: FxHashMap<Label, State>,
    bound: FxHashMap<Label, State>,
    dead_labels: FxHashSet<Label>,
    info: CodeInfo,
}

impl Verifier<'_> {
    fn jump(&mut self, label: Label, state: State) -> Result<(), VerifyError> {
        if let Some(frame) = self.bound.get(&label) {
            if state.conforms_to(frame) {
                return Ok(());
            }
            return Err(VerifyError::Inconsistent {
                label,
                first: frame.stack.clone(),
                second: state.stack,
            });
        }
        if self.dead_labels.contains(&label) {
            return Err(VerifyError::DeadTarget(label));
        }
        let merged = match self.pending.remove(&label) {
            Some(prev) => prev.merge(&state, label)?,
            None => state,
        };
        self.pending.insert(label, merged);
        Ok(())
    }

    fn bind(&mut self, label: Label, fallthrough: Option<State>) -> Result<Option<State>, VerifyError> {
        if self.bound.contains_key(&label) || self.dead_labels.contains(&label) {
            return Err(VerifyError::DuplicateLabel(label));
        }
        let incoming = self.pending.remove(&label);
        let state = match (fallthrough, incoming) {
            (Some(a), Some(b)) => a.merge(&b, label)?,
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => {
                self.dead_labels.insert(label);
                return Ok(None);
            }
        };
        self.info.frames.push(StackMapFrame {
            label,
            locals: state.locals.clone(),
            stack: state.stack.clone(),
        });
        self.bound.insert(label, state.clone());
        Ok(Some(state))
    }

    fn step(&mut self, at: usize, instr: &Instr, s: &mut State) -> Result<bool, VerifyError> {
        match instr {
            Instr::Comment(_) => {}
            Instr::IConst(_) => s.push(VType::Int),
            Instr::LConst(_) => s.push(VType::Long),
            Instr::FConst(_) => s.push(VType::Float),
            Instr::DConst(_) => s.push(VType::Double),
            Instr::AConstNull => s.push(VType::Null),
            Instr::Ldc(_) => s.push(VType::Object(super::JAVA_LANG_STRING.to_owned())),
            Instr::Load(ty, slot) => {
                let found = s
                    .locals
                    .get(usize::from(*slot))
                    .cloned()
                    .unwrap_or(VType::Top);
                if !found.conforms_to(ty) {
                    return Err(VerifyError::BadLocal {
                        at,
                        slot: *slot,
                        found,
                    });
                }
                // Loaded references keep their precise type.
                let pushed = if ty.is_ref() {
                    found
                } else {
                    ty.vtype().unwrap_or(VType::Top)
                };
                s.push(pushed);
            }
            Instr::Store(ty, slot) => {
                let v = s.pop_as(at, ty)?;
                let stored = if ty.is_ref() {
                    v
                } else {
                    ty.vtype().unwrap_or(VType::Top)
                };
                s.set_local(*slot, stored);
            }
            Instr::Pop => {
                s.pop_narrow(at)?;
            }
            Instr::Pop2 => {
                let v = s.pop(at)?;
                if !v.is_wide() {
                    s.pop_narrow(at)?;
                }
            }
            Instr::Dup => {
                let v = s.pop_narrow(at)?;
                s.push(v.clone());
                s.push(v);
            }
            Instr::DupX1 => {
                let v1 = s.pop_narrow(at)?;
                let v2 = s.pop_narrow(at)?;
                s.push(v1.clone());
                s.push(v2);
                s.push(v1);
            }
            Instr::Swap => {
                let v1 = s.pop_narrow(at)?;
                let v2 = s.pop_narrow(at)?;
                s.push(v1);
                s.push(v2);
            }
            Instr::IAdd | Instr::ISub | Instr::IMul => {
                s.pop_kind(at, &VType::Int)?;
                s.pop_kind(at, &VType::Int)?;
                s.push(VType::Int);
            }
            Instr::LAdd | Instr::LSub | Instr::LMul => {
                s.pop_kind(at, &VType::Long)?;
                s.pop_kind(at, &VType::Long)?;
                s.push(VType::Long);
            }
            Instr::LCmp => {
                s.pop_kind(at, &VType::Long)?;
                s.pop_kind(at, &VType::Long)?;
                s.push(VType::Int);
            }
            Instr::New(class) => s.push(VType::Object(class.clone())),
            Instr::CheckCast(class) => {
                s.pop_kind(at, &VType::Null)?;
                s.push(VType::Object(class.clone()));
            }
            Instr::GetField(f) => {
                s.pop_kind(at, &VType::Null)?;
                s.push(f.ty.vtype().unwrap_or(VType::Top));
            }
            Instr::PutField(f) => {
                s.pop_as(at, &f.ty)?;
                s.pop_kind(at, &VType::Null)?;
            }
            Instr::GetStatic(f) => s.push(f.ty.vtype().unwrap_or(VType::Top)),
            Instr::PutStatic(f) => {
                s.pop_as(at, &f.ty)?;
            }
            Instr::Invoke(kind, m) => {
                for p in m.desc.params.iter().rev() {
                    s.pop_as(at, p)?;
                }
                if *kind != InvokeKind::Static {
                    s.pop_kind(at, &VType::Null)?;
                }
                if let Some(v) = m.desc.ret.vtype() {
                    s.push(v);
                }
            }
            Instr::If(cond, label) => {
                let expected = if cond.on_refs() { VType::Null } else { VType::Int };
                for _ in 0..cond.operands() {
                    s.pop_kind(at, &expected)?;
                }
                self.jump(*label, s.clone())?;
            }
            Instr::Goto(label) => {
                self.jump(*label, s.clone())?;
                return Ok(false);
            }
            // Bound by `verify` before stepping.
            Instr::Bind(_) => {}
            Instr::Return(ty) => {
                if !ty.is_void() {
                    s.pop_as(at, ty)?;
                }
                if ty != self.ret {
                    return Err(VerifyError::TypeMismatch {
                        at,
                        expected: self.ret.descriptor(),
                        found: ty.vtype().unwrap_or(VType::Top),
                    });
                }
                if !s.stack.is_empty() {
                    return Err(VerifyError::Unbalanced {
                        at,
                        remaining: s.stack.len(),
                    });
                }
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Verifies `code` of a method whose parameters (receiver first for
/// instance methods) start out in `locals` and which returns `ret`.
pub fn verify(code: &Code, locals: Vec<VType>, ret: &JavaType) -> Result<CodeInfo, VerifyError> {
    let mut v = Verifier {
        ret,
        pending: FxHashMap::default(),
        bound: FxHashMap::default(),
        dead_labels: FxHashSet::default(),
        info: CodeInfo::default(),
    };
    let mut max_locals = locals.len();
    let mut state = Some(State {
        locals,
        stack: Vec::new(),
    });

    for (at, instr) in code.instrs().iter().enumerate() {
        if let Instr::Bind(label) = instr {
            state = v.bind(*label, state.take())?;
            continue;
        }
        let Some(s) = state.as_mut() else {
            continue;
        };
        let continues = v.step(at, instr, s)?;
        v.info.max_stack = v.info.max_stack.max(s.words());
        max_locals = max_locals.max(s.locals.len());
        if !continues {
            state = None;
        }
    }

    if state.is_some() {
        return Err(VerifyError::FallsOffEnd);
    }
    if let Some(label) = v.pending.keys().min() {
        return Err(VerifyError::UnboundLabel(*label));
    }
    v.info.max_locals = u16::try_from(max_locals).unwrap_or(u16::MAX);
    Ok(v.info)
}

/// Initial locals of a method: receiver (if any) and parameters.
pub fn parameter_locals(receiver: Option<&str>, params: &[JavaType]) -> Vec<VType> {
    let mut locals = Vec::new();
    if let Some(class) = receiver {
        locals.push(VType::Object(class.to_owned()));
    }
    for p in params {
        if let Some(v) = p.vtype() {
            let wide = v.is_wide();
            locals.push(v);
            if wide {
                locals.push(VType::Top);
            }
        }
    }
    locals
}
