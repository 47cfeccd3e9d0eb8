//! Program graph for the Fuzion JVM backend.
//!
//! The front end resolves and monomorphizes a program into clazzes: one per
//! instantiated feature, field and choice type. This crate holds that graph
//! and the query API the backend reads it through.
//!
//! # Contents
//!
//! - [`ClazzId`], [`Clazz`], [`ClazzKind`], [`SpecialClazz`]: clazz handles
//!   and declarations
//! - [`ClazzPool`]: storage, queries and the builder API
//! - [`AccessSite`], [`MatchSite`]: calls, assignments and matches with the
//!   reachable targets computed by the front end
//! - [`Expr`]: routine bodies
//! - [`TailCallOracle`]: tail-position queries

mod clazz;
mod expr;
mod pool;
mod site;
mod span;
mod tail_call;

pub use clazz::{Clazz, ClazzId, ClazzKind, SpecialClazz};
pub use expr::Expr;
pub use pool::ClazzPool;
pub use site::{AccessSite, MatchCase, MatchId, MatchSite, SiteId};
pub use span::Span;
pub use tail_call::{NoTailCalls, TailCallAnalysis, TailCallOracle};
