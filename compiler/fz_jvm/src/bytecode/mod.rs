//! Instruction model.
//!
//! Generated code is a flat list of [`Instr`] with symbolic [`Label`]s.
//! Binary encoding (opcodes, constant pool, offsets) is left to the class
//! file writer; this module only guarantees that the instruction lists are
//! well formed, which [`verify`] checks.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

mod class;
mod types;
pub mod verify;

pub use class::{AccessFlags, ClassShape, FieldShape, MethodShape};
pub use types::{JavaType, MethodDescriptor, VType, JAVA_LANG_OBJECT, JAVA_LANG_STRING};
pub use verify::{CodeInfo, StackMapFrame, VerifyError};


/// A jump target.
///
/// Labels are unique for the lifetime of the process, so code fragments
/// built independently can be concatenated without renaming.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

static NEXT_LABEL: AtomicU32 = AtomicU32::new(0);

impl Label {
    /// A label distinct from every label created before.
    pub fn fresh() -> Self {
        Label(NEXT_LABEL.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Branch condition of [`Instr::If`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Cond {
    /// `int` compared with zero.
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
    /// Two `int`s compared.
    ICmpEq,
    ICmpNe,
    ICmpLt,
    ICmpGe,
    ICmpGt,
    ICmpLe,
    /// Two references compared by identity.
    ACmpEq,
    ACmpNe,
    /// A reference compared with `null`.
    Null,
    NonNull,
}

impl Cond {
    /// The condition that holds exactly when `self` does not.
    #[must_use]
    pub fn negate(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::ICmpEq => Cond::ICmpNe,
            Cond::ICmpNe => Cond::ICmpEq,
            Cond::ICmpLt => Cond::ICmpGe,
            Cond::ICmpGe => Cond::ICmpLt,
            Cond::ICmpGt => Cond::ICmpLe,
            Cond::ICmpLe => Cond::ICmpGt,
            Cond::ACmpEq => Cond::ACmpNe,
            Cond::ACmpNe => Cond::ACmpEq,
            Cond::Null => Cond::NonNull,
            Cond::NonNull => Cond::Null,
        }
    }

    /// Number of values popped.
    pub fn operands(self) -> usize {
        match self {
            Cond::Eq | Cond::Ne | Cond::Lt | Cond::Ge | Cond::Gt | Cond::Le => 1,
            Cond::Null | Cond::NonNull => 1,
            _ => 2,
        }
    }

    /// Whether the operands are references.
    pub fn on_refs(self) -> bool {
        matches!(self, Cond::ACmpEq | Cond::ACmpNe | Cond::Null | Cond::NonNull)
    }
}

/// How a method is invoked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    Static,
    Special,
    Virtual,
    Interface,
}

/// A field of a class.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: String,
    pub name: String,
    pub ty: JavaType,
}

impl FieldRef {
    pub fn new(class: impl Into<String>, name: impl Into<String>, ty: JavaType) -> Self {
        FieldRef {
            class: class.into(),
            name: name.into(),
            ty,
        }
    }
}

/// A method of a class or interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: String,
    pub name: String,
    pub desc: MethodDescriptor,
}

impl MethodRef {
    pub fn new(class: impl Into<String>, name: impl Into<String>, desc: MethodDescriptor) -> Self {
        MethodRef {
            class: class.into(),
            name: name.into(),
            desc,
        }
    }
}

/// One instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    /// No code; kept in listings.
    Comment(String),
    IConst(i32),
    LConst(i64),
    /// `float` constant given by its raw bits.
    FConst(u32),
    /// `double` constant given by its raw bits.
    DConst(u64),
    AConstNull,
    /// String constant.
    Ldc(String),
    Load(JavaType, u16),
    Store(JavaType, u16),
    Pop,
    Pop2,
    Dup,
    DupX1,
    Swap,
    IAdd,
    ISub,
    IMul,
    LAdd,
    LSub,
    LMul,
    LCmp,
    New(String),
    CheckCast(String),
    GetField(FieldRef),
    PutField(FieldRef),
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    Invoke(InvokeKind, MethodRef),
    If(Cond, Label),
    Goto(Label),
    /// Places a label at this point.
    Bind(Label),
    /// Returns a value of the given type, or nothing for `Void`.
    Return(JavaType),
}

impl Instr {
    /// Whether execution never continues with the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(self, Instr::Goto(_) | Instr::Return(_))
    }
}

/// An instruction sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Code(Vec<Instr>);

impl Code {
    pub const fn new() -> Self {
        Code(Vec::new())
    }

    pub fn of(instr: Instr) -> Self {
        Code(vec![instr])
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Code::of(Instr::Comment(text.into()))
    }

    pub fn push(&mut self, instr: Instr) {
        self.0.push(instr);
    }

    pub fn append(&mut self, other: Code) {
        self.0.extend(other.0);
    }

    /// This code followed by `instr`.
    #[must_use]
    pub fn then(mut self, instr: Instr) -> Self {
        self.0.push(instr);
        self
    }

    /// This code followed by `other`.
    #[must_use]
    pub fn and(mut self, other: Code) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether any instruction other than a comment is present.
    pub fn has_effect(&self) -> bool {
        self.0.iter().any(|i| !matches!(i, Instr::Comment(_)))
    }

    pub fn instrs(&self) -> &[Instr] {
        &self.0
    }

    /// Whether execution may continue after the last instruction.
    pub fn falls_through(&self) -> bool {
        self.0
            .iter()
            .rev()
            .find(|i| !matches!(i, Instr::Comment(_)))
            .map_or(true, |i| !i.ends_flow())
    }

    /// Runs `taken` if `cond` holds, `other` otherwise.
    pub fn branch(cond: Cond, taken: Code, other: Code) -> Code {
        let l_taken = Label::fresh();
        let l_end = Label::fresh();
        let mut code = Code::of(Instr::If(cond, l_taken));
        let other_falls_through = other.falls_through();
        code.append(other);
        if other_falls_through {
            code.push(Instr::Goto(l_end));
        }
        code.push(Instr::Bind(l_taken));
        code.append(taken);
        code.push(Instr::Bind(l_end));
        code
    }

    /// Runs `taken` only if `cond` holds.
    pub fn when(cond: Cond, taken: Code) -> Code {
        let l_skip = Label::fresh();
        Code::of(Instr::If(cond.negate(), l_skip))
            .and(taken)
            .then(Instr::Bind(l_skip))
    }

    /// A loop that never ends. Used after calls that do not return.
    pub fn endless_loop() -> Code {
        let l = Label::fresh();
        Code(vec![Instr::Bind(l), Instr::Goto(l)])
    }

    /// Discards a value of type `ty` from the stack.
    pub fn pop(ty: &JavaType) -> Code {
        match ty {
            JavaType::Void => Code::new(),
            t if t.is_wide() => Code::of(Instr::Pop2),
            _ => Code::of(Instr::Pop),
        }
    }
}

impl From<Instr> for Code {
    fn from(instr: Instr) -> Self {
        Code::of(instr)
    }
}

impl FromIterator<Instr> for Code {
    fn from_iter<T: IntoIterator<Item = Instr>>(iter: T) -> Self {
        Code(iter.into_iter().collect())
    }
}

impl Extend<Instr> for Code {
    fn extend<T: IntoIterator<Item = Instr>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Code {
    type Item = Instr;
    type IntoIter = std::vec::IntoIter<Instr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
