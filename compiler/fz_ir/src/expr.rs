//! Routine bodies.
//!
//! A body is a tree of [`Expr`] nodes. Expressions either produce a value
//! (possibly of a unit type) or are evaluated for their effect only.

use crate::{ClazzId, MatchId, SiteId};

/// One node of a routine body.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Expr {
    /// The unit value.
    Unit,
    /// A constant of `clazz` given by its little-endian serialized bytes.
    Const { clazz: ClazzId, data: Vec<u8> },
    /// The instance of the routine being executed.
    Current,
    /// The outer instance passed to the routine.
    Outer,
    /// The `i`-th argument.
    Arg(usize),
    /// A call (or field read) through an access site.
    Call {
        site: SiteId,
        target: Box<Expr>,
        args: Vec<Expr>,
    },
    /// A field write through an access site.
    Assign {
        site: SiteId,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// Matches `subject`; `cases[i]` is the body for the site's `i`-th case.
    Match {
        site: MatchId,
        subject: Box<Expr>,
        cases: Vec<Expr>,
    },
    /// Injects a value of `value_clazz` into `choice` at alternative `tag`.
    Tag {
        value: Box<Expr>,
        value_clazz: ClazzId,
        choice: ClazzId,
        tag: usize,
    },
    /// Boxes a value of `from` into the ref clazz `to`.
    Box {
        value: Box<Expr>,
        from: ClazzId,
        to: ClazzId,
    },
    /// Structural equality of two values of `clazz`, yielding `bool`.
    Equals {
        clazz: ClazzId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Evaluates all expressions; the value of the last one is the result.
    Seq(Vec<Expr>),
}

impl Expr {
    pub fn call(site: SiteId, target: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            site,
            target: Box::new(target),
            args,
        }
    }

    pub fn assign(site: SiteId, target: Expr, value: Expr) -> Self {
        Expr::Assign {
            site,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn matching(site: MatchId, subject: Expr, cases: Vec<Expr>) -> Self {
        Expr::Match {
            site,
            subject: Box::new(subject),
            cases,
        }
    }

    pub fn tag(value: Expr, value_clazz: ClazzId, choice: ClazzId, tag: usize) -> Self {
        Expr::Tag {
            value: Box::new(value),
            value_clazz,
            choice,
            tag,
        }
    }

    pub fn boxed(value: Expr, from: ClazzId, to: ClazzId) -> Self {
        Expr::Box {
            value: Box::new(value),
            from,
            to,
        }
    }

    pub fn equals(clazz: ClazzId, lhs: Expr, rhs: Expr) -> Self {
        Expr::Equals {
            clazz,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// An `i32` constant.
    pub fn i32(value: i32) -> Self {
        Expr::Const {
            clazz: ClazzId::I32,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// An `i64` constant.
    pub fn i64(value: i64) -> Self {
        Expr::Const {
            clazz: ClazzId::I64,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// A `bool` constant.
    pub fn bool(value: bool) -> Self {
        Expr::Const {
            clazz: ClazzId::BOOL,
            data: vec![u8::from(value)],
        }
    }

    /// A constant string.
    pub fn string(value: &str) -> Self {
        Expr::Const {
            clazz: ClazzId::CONST_STRING,
            data: value.as_bytes().to_vec(),
        }
    }

    /// The last expression evaluated, looking through sequences.
    pub fn last(&self) -> &Expr {
        match self {
            Expr::Seq(exprs) => exprs.last().map_or(self, Expr::last),
            _ => self,
        }
    }
}
