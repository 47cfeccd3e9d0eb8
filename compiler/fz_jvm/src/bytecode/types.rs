//! JVM value types, verification types and method descriptors.

use std::fmt;

/// Internal name of `java.lang.Object`.
pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";
/// Internal name of `java.lang.String`.
pub const JAVA_LANG_STRING: &str = "java/lang/String";

/// Type of a value as seen by JVM instructions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JavaType {
    /// No value. Unit-typed values have this type.
    Void,
    Boolean,
    Byte,
    Short,
    Char,
    Int,
    Long,
    Float,
    Double,
    /// Reference to an instance of the class or interface with this internal name.
    Object(String),
}

impl JavaType {
    pub fn object(name: impl Into<String>) -> Self {
        JavaType::Object(name.into())
    }

    /// `java.lang.Object`, the supertype of all references.
    pub fn any() -> Self {
        JavaType::Object(JAVA_LANG_OBJECT.to_owned())
    }

    pub fn string() -> Self {
        JavaType::Object(JAVA_LANG_STRING.to_owned())
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JavaType::Void)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, JavaType::Object(_))
    }

    /// `long` and `double` take two slots and two stack words.
    pub fn is_wide(&self) -> bool {
        matches!(self, JavaType::Long | JavaType::Double)
    }

    /// Number of local variable slots a value of this type occupies.
    pub fn slots(&self) -> u16 {
        match self {
            JavaType::Void => 0,
            JavaType::Long | JavaType::Double => 2,
            _ => 1,
        }
    }

    /// Internal class name of a reference type.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JavaType::Object(name) => Some(name),
            _ => None,
        }
    }

    /// Verification type of a value of this type.
    pub fn vtype(&self) -> Option<VType> {
        match self {
            JavaType::Void => None,
            JavaType::Boolean | JavaType::Byte | JavaType::Short | JavaType::Char | JavaType::Int => {
                Some(VType::Int)
            }
            JavaType::Long => Some(VType::Long),
            JavaType::Float => Some(VType::Float),
            JavaType::Double => Some(VType::Double),
            JavaType::Object(name) => Some(VType::Object(name.clone())),
        }
    }

    /// Field or parameter descriptor, e.g. `I` or `Ljava/lang/String;`.
    pub fn descriptor(&self) -> String {
        match self {
            JavaType::Void => "V".to_owned(),
            JavaType::Boolean => "Z".to_owned(),
            JavaType::Byte => "B".to_owned(),
            JavaType::Short => "S".to_owned(),
            JavaType::Char => "C".to_owned(),
            JavaType::Int => "I".to_owned(),
            JavaType::Long => "J".to_owned(),
            JavaType::Float => "F".to_owned(),
            JavaType::Double => "D".to_owned(),
            JavaType::Object(name) => format!("L{name};"),
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Verification type of a stack entry or local slot.
///
/// Wide values are one stack entry; in locals, the slot after a wide value
/// holds `Top`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum VType {
    /// Unusable: uninitialized or conflicting.
    Top,
    Int,
    Float,
    Long,
    Double,
    Null,
    Object(String),
}

impl VType {
    pub fn is_ref(&self) -> bool {
        matches!(self, VType::Null | VType::Object(_))
    }

    pub fn is_wide(&self) -> bool {
        matches!(self, VType::Long | VType::Double)
    }

    /// Stack words taken by a value of this type.
    pub fn words(&self) -> u16 {
        if self.is_wide() {
            2
        } else {
            1
        }
    }

    /// Whether a value of this type may be used where `expected` is required.
    ///
    /// References are not checked against the class hierarchy.
    pub fn is_assignable_to(&self, expected: &VType) -> bool {
        match (self, expected) {
            (_, VType::Top) => true,
            (a, b) if a.is_ref() && b.is_ref() => true,
            (a, b) => a == b,
        }
    }

    /// Whether this matches the parameter or field type `ty`.
    pub fn conforms_to(&self, ty: &JavaType) -> bool {
        match ty.vtype() {
            Some(expected) => self.is_assignable_to(&expected),
            None => false,
        }
    }

    /// Join of two stack entries at a control-flow merge.
    pub fn merge_stack(&self, other: &VType) -> Option<VType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (VType::Null, b @ VType::Object(_)) | (b @ VType::Object(_), VType::Null) => {
                Some(b.clone())
            }
            (VType::Object(_), VType::Object(_)) => Some(VType::Object(JAVA_LANG_OBJECT.to_owned())),
            _ => None,
        }
    }

    /// Join of two local slots at a control-flow merge.
    pub fn merge_local(&self, other: &VType) -> VType {
        self.merge_stack(other).unwrap_or(VType::Top)
    }
}

/// Parameter and return types of a method.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<JavaType>,
    pub ret: JavaType,
}

impl MethodDescriptor {
    pub fn new(params: Vec<JavaType>, ret: JavaType) -> Self {
        MethodDescriptor { params, ret }
    }

    /// `()V`.
    pub fn void() -> Self {
        MethodDescriptor::new(Vec::new(), JavaType::Void)
    }

    /// Slots taken by the parameters, not counting a receiver.
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(JavaType::slots).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for p in &self.params {
            f.write_str(&p.descriptor())?;
        }
        write!(f, "){}", self.ret.descriptor())
    }
}
