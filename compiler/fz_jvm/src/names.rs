//! Names of generated classes, fields and methods.
//!
//! Names embed the clazz id, so they are unique without a global registry.
//! Characters that are not ASCII alphanumeric are replaced by `_`.

use fz_ir::{ClazzId, ClazzPool};

/// Method holding the code of a routine.
pub const ROUTINE: &str = "fzRoutine";
/// `int` field with the tag of a choice instance.
pub const TAG_FIELD: &str = "fzTag";
/// Field shared by all ref alternatives of a general choice.
pub const CHOICE_REF_FIELD: &str = "fzChoiceRef";
/// Field of a boxed clazz holding the wrapped value.
pub const BOXED_VALUE_FIELD: &str = "fzValue";
/// Static method of a boxed clazz creating an instance.
pub const BOX_METHOD: &str = "fzBox";
/// Static method copying a value instance.
pub const CLONE_METHOD: &str = "fzClone";
/// Static method comparing two value instances.
pub const EQUALS_METHOD: &str = "fzEquals";
/// Class holding preallocated constants.
pub const CONSTANTS_CLASS: &str = "fzConstants";

/// Runtime support class provided with the generated code.
pub const RUNTIME_CLASS: &str = "dev/flang/be/jvm/runtime/Runtime";
/// `Runtime.fatal(String)`: reports an error and terminates.
pub const RUNTIME_FATAL: &str = "fatal";
/// `Runtime.trace(String)`: prints a trace message.
pub const RUNTIME_TRACE: &str = "trace";

fn mangle(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Class implementing clazz `cl`.
pub fn class(pool: &ClazzPool, cl: ClazzId) -> String {
    format!("fzC_{}_{}", mangle(pool.name(cl)), cl.raw())
}

/// Interface of a ref clazz with several heirs, or the marker interface of
/// a choice.
pub fn interface(pool: &ClazzPool, cl: ClazzId) -> String {
    format!("fzI_{}_{}", mangle(pool.name(cl)), cl.raw())
}

/// Field holding data field `f` in its outer clazz' class.
pub fn field(pool: &ClazzPool, f: ClazzId) -> String {
    let name = pool.name(f);
    let short = name.rsplit('.').next().unwrap_or(name);
    format!("fzF_{}_{}", f.raw(), mangle(short))
}

/// Interface method dispatching to implementations of feature `cc`.
pub fn dynamic_function(pool: &ClazzPool, cc: ClazzId) -> String {
    format!("fzD_{}_{}", cc.raw(), mangle(pool.name(cc)))
}

/// Method returning the tag of a value of choice `choice`.
pub fn get_tag(choice: ClazzId) -> String {
    format!("fzGetTag_{}", choice.raw())
}

/// Field of a general choice holding the payload of alternative `tag`.
pub fn choice_entry(tag: usize) -> String {
    format!("fzChoice_{tag}")
}

/// Static singleton of a refs-and-units choice for unit alternative `tag`.
pub fn choice_unit(tag: usize) -> String {
    format!("fzUnit_{tag}")
}

/// Static field holding the `n`-th preallocated constant.
pub fn constant(n: usize) -> String {
    format!("fzConst_{n}")
}
