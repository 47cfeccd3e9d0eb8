//! Matching on choice values.
//!
//! A match is compiled to a dispatch that leaves the subject (and for some
//! kinds its tag) on the stack and jumps to one entry block per non-void
//! alternative. An entry block pops what dispatch left behind, binds the
//! payload if the case asks for it and jumps to the body of its case. Each
//! body is emitted once. A tag no case handles gets a trap as its entry.

use smallvec::SmallVec;

use fz_ir::{ClazzId, MatchId};

use crate::bytecode::{
    Code, Cond, Instr, InvokeKind, JavaType, Label, MethodDescriptor, MethodRef,
};
use crate::codegen::trap;
use crate::layout::RepresentationKind;
use crate::lower::{RoutineLowerer, Val};
use crate::{names, JvmError};

use super::synthesize::tag_const;

/// Entry block for one alternative.
struct Entry {
    label: Label,
    code: Code,
    /// Index of the case handling the alternative.
    case: Option<usize>,
    tag: usize,
}

impl RoutineLowerer<'_, '_> {
    /// Lower a match of `sub` at `site`; `bodies[i]` is the code of case
    /// `i`. Returns the code and whether control continues after it.
    pub(crate) fn match_choice(
        &mut self,
        site: MatchId,
        sub: Val,
        bodies: Vec<Code>,
    ) -> Result<(Code, bool), JvmError> {
        let pool = self.cg.pool;
        let m = pool.match_site(site);
        let cl = m.subject;
        if bodies.len() != m.cases.len() {
            return Err(JvmError::internal(format!(
                "match on `{}` has {} cases but {} bodies",
                pool.name(cl),
                m.cases.len(),
                bodies.len()
            )));
        }
        let case_of = |tag: usize| m.cases.iter().position(|c| c.tags.contains(&tag));
        let tags: SmallVec<[usize; 4]> = (0..pool.num_choices(cl))
            .filter(|&t| !pool.is_void_type(pool.choice(cl, t)))
            .collect();
        let entries = |code: &dyn Fn(usize) -> Code| -> Vec<Entry> {
            tags.iter()
                .map(|&tag| Entry {
                    label: Label::fresh(),
                    code: code(tag),
                    case: case_of(tag),
                    tag,
                })
                .collect()
        };

        let kind = self.cg.types.kind(cl);
        let (dispatch, entries) = match kind {
            RepresentationKind::Voidlike => {
                let code = sub.drop().and(trap(&format!("match on void `{}`", pool.name(cl))));
                return Ok((code, false));
            }
            RepresentationKind::Unitlike => {
                let mut reached = tags.iter().filter_map(|&t| case_of(t));
                return match (reached.next(), reached.next()) {
                    (Some(case), None) => {
                        let body = bodies.into_iter().nth(case).unwrap_or_default();
                        let reachable = body.falls_through();
                        Ok((sub.drop().and(body), reachable))
                    }
                    _ => Err(JvmError::internal(format!(
                        "unit choice `{}` needs exactly one matching case",
                        pool.name(cl)
                    ))),
                };
            }
            RepresentationKind::Boollike => {
                let entries = entries(&|_| Code::new());
                if let [first, second] = entries.as_slice() {
                    if let (Some(a), Some(b)) = (first.case, second.case) {
                        if a == b {
                            let body = bodies.into_iter().nth(a).unwrap_or_default();
                            let reachable = body.falls_through();
                            return Ok((sub.drop().and(body), reachable));
                        }
                    }
                    let dispatch = sub
                        .code
                        .then(Instr::If(Cond::Ne, second.label))
                        .then(Instr::Goto(first.label));
                    (dispatch, entries)
                } else {
                    return Err(JvmError::internal(format!(
                        "bool-like choice `{}` without two alternatives",
                        pool.name(cl)
                    )));
                }
            }
            RepresentationKind::Intlike => {
                let entries = entries(&|_| Code::of(Instr::Pop));
                let dispatch = sub.code.and(cascade(&entries, |e| tag_const(e.tag))?);
                (dispatch, entries)
            }
            RepresentationKind::Nullable => {
                let entries = entries(&|tag| {
                    if pool.is_ref(pool.choice(cl, tag)) {
                        self.bind(case_of(tag).and_then(|c| m.cases[c].field), false)
                    } else {
                        Code::of(Instr::Pop)
                    }
                });
                let (null_entry, ref_entry) = match entries.as_slice() {
                    [a, b] if !pool.is_ref(pool.choice(cl, a.tag)) => (a, b),
                    [a, b] => (b, a),
                    _ => {
                        return Err(JvmError::internal(format!(
                            "nullable choice `{}` without two alternatives",
                            pool.name(cl)
                        )))
                    }
                };
                let dispatch = sub
                    .code
                    .then(Instr::Dup)
                    .then(Instr::If(Cond::NonNull, ref_entry.label))
                    .then(Instr::Goto(null_entry.label));
                (dispatch, entries)
            }
            RepresentationKind::RefsAndUnits => {
                let intf = self.cg.types.interface_name(cl);
                let entries = entries(&|tag| {
                    let alt = pool.choice(cl, tag);
                    let field = case_of(tag).and_then(|c| m.cases[c].field);
                    let bind = if pool.is_ref(alt) {
                        self.bind(field, true)
                    } else {
                        Code::of(Instr::Pop)
                    };
                    Code::of(Instr::Pop).and(bind)
                });
                let get_tag = MethodRef::new(
                    intf,
                    names::get_tag(cl),
                    MethodDescriptor::new(Vec::new(), JavaType::Int),
                );
                let dispatch = sub
                    .code
                    .then(Instr::Dup)
                    .then(Instr::Invoke(InvokeKind::Interface, get_tag))
                    .and(cascade(&entries, |e| tag_const(e.tag))?);
                (dispatch, entries)
            }
            RepresentationKind::General => {
                let mut entries = Vec::with_capacity(tags.len());
                for &tag in &tags {
                    let alt = pool.choice(cl, tag);
                    let field = case_of(tag).and_then(|c| m.cases[c].field);
                    let bind = match (field, self.cg.choice_entry(cl, tag)) {
                        (Some(f), Some(entry)) => {
                            let clone = if self.cg.types.needs_copy(alt) {
                                Some(self.cg.clone_code(alt)?)
                            } else {
                                None
                            };
                            let cast = entry.ty.is_ref();
                            self.bind_read(f, Code::of(Instr::GetField(entry)), cast, clone)
                        }
                        _ => Code::of(Instr::Pop),
                    };
                    entries.push(Entry {
                        label: Label::fresh(),
                        code: Code::of(Instr::Pop).and(bind),
                        case: case_of(tag),
                        tag,
                    });
                }
                let dispatch = sub
                    .code
                    .then(Instr::Dup)
                    .then(Instr::GetField(self.cg.tag_field(cl)))
                    .and(cascade(&entries, |e| tag_const(e.tag))?);
                (dispatch, entries)
            }
        };

        Ok(assemble(dispatch, entries, bodies, pool.name(cl)))
    }

    /// Code storing the value on top of the stack into `field` of the
    /// current instance, or dropping it.
    fn bind(&self, field: Option<ClazzId>, cast: bool) -> Code {
        match field {
            Some(f) => self.bind_read(f, Code::new(), cast, None),
            None => Code::of(Instr::Pop),
        }
    }

    /// Like [`Self::bind`] for the value `read` computes from the top of
    /// the stack. With `cast`, the value is narrowed to the field's type.
    fn bind_read(&self, f: ClazzId, read: Code, cast: bool, clone: Option<Code>) -> Code {
        let types = &self.cg.types;
        let current = self.current();
        if !types.field_exists(f) || current.ty.is_void() {
            return Code::of(Instr::Pop);
        }
        let field = types.field_ref(f);
        let mut code = current.code.then(Instr::Swap).and(read);
        if let Some(class) = field.ty.class_name().filter(|_| cast) {
            code.push(Instr::CheckCast(class.to_owned()));
        }
        if let Some(clone) = clone {
            code.append(clone);
        }
        code.push(Instr::PutField(field));
        code
    }
}

/// Compare the `int` on top of the stack with each entry's value and jump
/// to the first match. The last entry is taken without a comparison; the
/// compared value stays on the stack.
fn cascade(
    entries: &[Entry],
    value: impl Fn(&Entry) -> Result<i32, JvmError>,
) -> Result<Code, JvmError> {
    let mut code = Code::new();
    let Some((last, init)) = entries.split_last() else {
        return Ok(code);
    };
    for e in init {
        code.push(Instr::Dup);
        code.push(Instr::IConst(value(e)?));
        code.push(Instr::If(Cond::ICmpEq, e.label));
    }
    code.push(Instr::Goto(last.label));
    Ok(code)
}

/// Entry blocks followed by the bodies of all cases reached from them.
fn assemble(dispatch: Code, entries: Vec<Entry>, bodies: Vec<Code>, choice: &str) -> (Code, bool) {
    let l_end = Label::fresh();
    let body_labels: Vec<Label> = bodies.iter().map(|_| Label::fresh()).collect();
    let mut reached = vec![false; bodies.len()];

    let mut code = dispatch;
    for e in entries {
        code.push(Instr::Bind(e.label));
        code.append(e.code);
        match e.case {
            Some(case) => {
                reached[case] = true;
                code.push(Instr::Goto(body_labels[case]));
            }
            None => code.append(trap(&format!(
                "unreachable: no case for alternative {} of `{choice}`",
                e.tag
            ))),
        }
    }

    let mut continues = false;
    for ((body, label), reached) in bodies.into_iter().zip(body_labels).zip(reached) {
        if !reached {
            continue;
        }
        code.push(Instr::Bind(label));
        if body.falls_through() {
            continues = true;
            code.append(body);
            code.push(Instr::Goto(l_end));
        } else {
            code.append(body);
        }
    }
    if continues {
        code.push(Instr::Bind(l_end));
    }
    (code, continues)
}
