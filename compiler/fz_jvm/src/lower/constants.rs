//! Constants.
//!
//! Numeric constants are pushed directly. Strings are either loaded at the
//! use site or, with [`ConstantPolicy::Preallocated`], created once when
//! the constants class is initialized and read from a static field.

use rustc_hash::FxHashMap;
use tracing::debug;

use fz_ir::{ClazzId, SpecialClazz};

use crate::bytecode::{Code, FieldRef, FieldShape, Instr, JavaType};
use crate::codegen::ClassFiles;
use crate::{names, ConstantPolicy, JvmError, JvmProblem};

use super::{Lowered, RoutineLowerer, Val};

/// Preallocated constants, one static field each.
#[derive(Debug, Default)]
pub struct Constants {
    fields: FxHashMap<(ClazzId, Vec<u8>), usize>,
    /// Initialization of all fields, in allocation order.
    init: Code,
}

impl Constants {
    /// The field holding the string constant `value` of `clazz`, created on
    /// first use.
    pub fn intern(&mut self, clazz: ClazzId, data: &[u8], value: &str) -> FieldRef {
        let next = self.fields.len();
        let n = *self.fields.entry((clazz, data.to_vec())).or_insert_with(|| {
            let field = FieldRef::new(names::CONSTANTS_CLASS, names::constant(next), JavaType::string());
            self.init.push(Instr::Ldc(value.to_owned()));
            self.init.push(Instr::PutStatic(field));
            next
        });
        FieldRef::new(names::CONSTANTS_CLASS, names::constant(n), JavaType::string())
    }

    /// Add the constants class, if any constant was preallocated.
    pub(crate) fn emit(self, classes: &mut ClassFiles) {
        if self.fields.is_empty() {
            return;
        }
        debug!(count = self.fields.len(), "emitting preallocated constants");
        let class = classes.class(names::CONSTANTS_CLASS);
        let mut numbered: Vec<usize> = self.fields.into_values().collect();
        numbered.sort_unstable();
        for n in numbered {
            class.add_field(FieldShape::constant(names::constant(n), JavaType::string()));
        }
        class.add_to_clinit(self.init);
    }
}

fn le_bytes<const N: usize>(data: &[u8]) -> Option<[u8; N]> {
    data.try_into().ok()
}

/// Code pushing the numeric or boolean constant `data` of `special`.
fn scalar(special: SpecialClazz, data: &[u8]) -> Option<Val> {
    let (instr, ty) = match special {
        SpecialClazz::Bool => (
            Instr::IConst(i32::from(le_bytes::<1>(data)?[0] != 0)),
            JavaType::Boolean,
        ),
        SpecialClazz::I8 => (
            Instr::IConst(i32::from(i8::from_le_bytes(le_bytes(data)?))),
            JavaType::Byte,
        ),
        SpecialClazz::U8 => (
            Instr::IConst(i32::from(i8::from_le_bytes(le_bytes(data)?))),
            JavaType::Byte,
        ),
        SpecialClazz::I16 => (
            Instr::IConst(i32::from(i16::from_le_bytes(le_bytes(data)?))),
            JavaType::Short,
        ),
        SpecialClazz::U16 => (
            Instr::IConst(i32::from(u16::from_le_bytes(le_bytes(data)?))),
            JavaType::Char,
        ),
        SpecialClazz::I32 | SpecialClazz::U32 => {
            (Instr::IConst(i32::from_le_bytes(le_bytes(data)?)), JavaType::Int)
        }
        SpecialClazz::I64 | SpecialClazz::U64 => {
            (Instr::LConst(i64::from_le_bytes(le_bytes(data)?)), JavaType::Long)
        }
        SpecialClazz::F32 => (Instr::FConst(u32::from_le_bytes(le_bytes(data)?)), JavaType::Float),
        SpecialClazz::F64 => {
            (Instr::DConst(u64::from_le_bytes(le_bytes(data)?)), JavaType::Double)
        }
        SpecialClazz::Void
        | SpecialClazz::Unit
        | SpecialClazz::Universe
        | SpecialClazz::ConstString => return None,
    };
    Some(Val::new(Code::of(instr), ty))
}

impl RoutineLowerer<'_, '_> {
    pub(super) fn constant(&mut self, clazz: ClazzId, data: &[u8]) -> Result<Lowered, JvmError> {
        let pool = self.pool();
        let val = match pool.special(clazz) {
            Some(SpecialClazz::ConstString) => std::str::from_utf8(data).ok().map(|s| {
                match self.cg.options.constants {
                    ConstantPolicy::AtUseSite => {
                        Val::new(Code::of(Instr::Ldc(s.to_owned())), JavaType::string())
                    }
                    ConstantPolicy::Preallocated => {
                        let field = self.cg.constants.intern(clazz, data, s);
                        Val::new(Code::of(Instr::GetStatic(field)), JavaType::string())
                    }
                }
            }),
            Some(special) => scalar(special, data),
            None => None,
        };
        match val {
            Some(val) => Ok(Lowered::value(val)),
            None => {
                let problem = JvmProblem::UnsupportedConstant {
                    clazz: pool.name(clazz).to_owned(),
                    span: pool.span(self.cx.cl),
                };
                Ok(Lowered::unreachable(self.cg.report(problem)))
            }
        }
    }
}
