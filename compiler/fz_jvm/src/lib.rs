//! Value representation and dispatch engine of the Fuzion JVM backend.
//!
//! Decides how values of every clazz are laid out on the JVM, synthesizes
//! the classes and interfaces those layouts need and lowers routine bodies
//! to verified instruction lists:
//!
//! - [`layout`]: one [`RepresentationKind`] per choice type
//! - `choices`: choice classes, tagging and matching
//! - `lower`: calls, dynamic dispatch, tail calls, constants
//! - `value`: copy and equality for heap-allocated values
//! - [`bytecode`]: instructions, class shapes and the verifier
//!
//! [`JvmBackend::compile`] drives all of it:
//!
//! ```text
//! let backend = JvmBackend::with_options(&pool, JvmOptions::default());
//! let program = backend.compile(&mut diagnostics)?;
//! ```

pub mod bytecode;
pub mod layout;
pub mod names;

mod backend;
mod choices;
mod codegen;
mod error;
mod lower;
mod options;
mod types;
mod value;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use backend::{CompiledProgram, JvmBackend};
pub use error::{JvmError, JvmProblem};
pub use layout::{ChoiceCensus, LayoutClassifier, RepresentationKind};
pub use options::{ConstantPolicy, JvmOptions};
