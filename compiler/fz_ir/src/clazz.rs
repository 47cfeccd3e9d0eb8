//! Clazz handles and declarations.
//!
//! A clazz is one fully instantiated feature, field or choice of the
//! monomorphized program. Clazzes are stored in a [`ClazzPool`](crate::ClazzPool)
//! and referenced by their 32-bit [`ClazzId`].

use std::fmt;

use smallvec::SmallVec;

use crate::{Expr, Span};

/// A 32-bit index into the clazz pool.
///
/// Clazzes are compared by index equality, never structurally.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct ClazzId(u32);

impl ClazzId {
    // === Pre-interned clazzes ===
    // Created by `ClazzPool::new` in this order.

    /// The universe, outermost clazz of every program.
    pub const UNIVERSE: Self = Self(0);
    /// The `void` type: no values exist.
    pub const VOID: Self = Self(1);
    /// The `unit` type: exactly one value, no data.
    pub const UNIT: Self = Self(2);
    /// The built-in `bool` choice of `FALSE | TRUE`.
    pub const BOOL: Self = Self(3);
    /// `bool.FALSE`, a unit type.
    pub const FALSE: Self = Self(4);
    /// `bool.TRUE`, a unit type.
    pub const TRUE: Self = Self(5);
    pub const I8: Self = Self(6);
    pub const I16: Self = Self(7);
    pub const I32: Self = Self(8);
    pub const I64: Self = Self(9);
    pub const U8: Self = Self(10);
    pub const U16: Self = Self(11);
    pub const U32: Self = Self(12);
    pub const U64: Self = Self(13);
    pub const F32: Self = Self(14);
    pub const F64: Self = Self(15);
    /// Compile-time constant strings.
    pub const CONST_STRING: Self = Self(16);

    /// Number of pre-interned clazzes.
    pub const PREDEFINED_COUNT: u32 = 17;

    /// Create an id from a raw value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ClazzId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClazzId({})", self.0)
    }
}

impl fmt::Display for ClazzId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a clazz is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ClazzKind {
    /// A feature with code: constructor or function.
    Routine,
    /// A data field of its outer clazz.
    Field,
    /// A sum type.
    Choice,
    /// Built into the backend; code comes from the intrinsic table.
    Intrinsic,
    /// Declared without implementation.
    Abstract,
    /// Implemented outside the program.
    Native,
}

/// Clazzes with built-in meaning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpecialClazz {
    Universe,
    Void,
    Unit,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    ConstString,
}

impl SpecialClazz {
    /// Numeric scalars whose value is the outer instance itself.
    pub const fn is_scalar(self) -> bool {
        matches!(
            self,
            SpecialClazz::I8
                | SpecialClazz::I16
                | SpecialClazz::I32
                | SpecialClazz::I64
                | SpecialClazz::U8
                | SpecialClazz::U16
                | SpecialClazz::U32
                | SpecialClazz::U64
                | SpecialClazz::F32
                | SpecialClazz::F64
        )
    }

    /// Source-level name.
    pub const fn name(self) -> &'static str {
        match self {
            SpecialClazz::Universe => "universe",
            SpecialClazz::Void => "void",
            SpecialClazz::Unit => "unit",
            SpecialClazz::Bool => "bool",
            SpecialClazz::I8 => "i8",
            SpecialClazz::I16 => "i16",
            SpecialClazz::I32 => "i32",
            SpecialClazz::I64 => "i64",
            SpecialClazz::U8 => "u8",
            SpecialClazz::U16 => "u16",
            SpecialClazz::U32 => "u32",
            SpecialClazz::U64 => "u64",
            SpecialClazz::F32 => "f32",
            SpecialClazz::F64 => "f64",
            SpecialClazz::ConstString => "Const_String",
        }
    }
}

/// Declaration of one clazz.
///
/// Built with [`Clazz::new`] and the `with_*` methods, then added to a pool.
/// Relations that need the clazz's own id (fields, heirs, bodies) are set
/// through the pool's builder API afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Clazz {
    /// Qualified name, e.g. `i32.infix +`. Intrinsics are looked up by it.
    pub name: String,
    pub kind: ClazzKind,
    /// Enclosing clazz. `None` only for the universe.
    pub outer: Option<ClazzId>,
    pub is_ref: bool,
    /// Wrapped value clazz if this is a boxed (ref) view of a value type.
    pub boxed_value: Option<ClazzId>,
    pub special: Option<SpecialClazz>,
    /// Alternatives of a choice, in declaration order. Tags index this list.
    pub choices: SmallVec<[ClazzId; 4]>,
    /// Instantiated heirs, including the clazz itself when it is instantiated.
    pub heirs: Vec<ClazzId>,
    /// Data fields, in declaration order.
    pub fields: Vec<ClazzId>,
    /// Argument fields, in declaration order. Also listed in `fields`.
    pub args: Vec<ClazzId>,
    /// Result clazz of a routine, or the type of a field.
    pub result: ClazzId,
    /// Field holding a function's result. `None` for constructors.
    pub result_field: Option<ClazzId>,
    /// Field holding the reference to the outer instance.
    pub outer_ref: Option<ClazzId>,
    /// Set on the outer-ref field itself.
    pub is_outer_ref: bool,
    pub body: Option<Expr>,
    pub span: Span,
}

impl Clazz {
    /// Create a declaration with no relations.
    pub fn new(name: impl Into<String>, kind: ClazzKind) -> Self {
        Clazz {
            name: name.into(),
            kind,
            outer: None,
            is_ref: false,
            boxed_value: None,
            special: None,
            choices: SmallVec::new(),
            heirs: Vec::new(),
            fields: Vec::new(),
            args: Vec::new(),
            result: ClazzId::UNIT,
            result_field: None,
            outer_ref: None,
            is_outer_ref: false,
            body: None,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_outer(mut self, outer: ClazzId) -> Self {
        self.outer = Some(outer);
        self
    }

    #[must_use]
    pub fn with_ref(mut self, is_ref: bool) -> Self {
        self.is_ref = is_ref;
        self
    }

    #[must_use]
    pub fn with_result(mut self, result: ClazzId) -> Self {
        self.result = result;
        self
    }

    #[must_use]
    pub fn with_special(mut self, special: SpecialClazz) -> Self {
        self.special = Some(special);
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: impl IntoIterator<Item = ClazzId>) -> Self {
        self.choices = choices.into_iter().collect();
        self
    }
}
