//! Choice values: classes, tagging and matching.
//!
//! The [`RepresentationKind`](crate::RepresentationKind) of a choice decides
//! everything here:
//! - `synthesize.rs` creates the classes and interfaces values live in,
//! - `tag.rs` turns a value of one alternative into a choice value,
//! - `matching.rs` branches on the alternative a choice value holds.

mod matching;
mod synthesize;
mod tag;
