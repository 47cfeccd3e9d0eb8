//! Diagnostics for the backend.
//!
//! Every diagnostic carries:
//! - an error code for searchability,
//! - a message (what went wrong),
//! - optional labeled spans (where),
//! - optional notes (context).
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] is type-level proof that at least one error was
//! emitted into a [`DiagnosticQueue`]. Compilation entry points return it
//! when they finish best-effort after reporting errors:
//!
//! ```text
//! let guarantee = queue.emit_error(diagnostic);
//! fn compile(..) -> Result<CompiledProgram, JvmError> { ... }
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
