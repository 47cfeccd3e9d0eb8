//! Backend errors.
//!
//! Two channels:
//! - [`JvmError`] aborts compilation (internal inconsistencies) or reports
//!   that errors were emitted once all phases ran.
//! - [`JvmProblem`] describes a problem in the input program. It becomes a
//!   diagnostic in the shared queue, a runtime trap takes the place of the
//!   failing code, and compilation continues.

use fz_diagnostic::{Diagnostic, ErrorCode, ErrorGuaranteed};
use fz_ir::Span;

use crate::bytecode::VerifyError;

#[derive(Debug, thiserror::Error)]
pub enum JvmError {
    /// The backend reached a state its input should have ruled out.
    #[error("internal error in JVM backend: {0}")]
    Internal(String),
    /// Generated code failed verification.
    #[error("generated code for `{class}.{method}` is malformed: {source}")]
    Malformed {
        class: String,
        method: String,
        #[source]
        source: VerifyError,
    },
    /// Compilation finished, but errors were reported.
    #[error("compilation failed: {0}")]
    ErrorsReported(ErrorGuaranteed),
}

impl JvmError {
    pub fn internal(message: impl Into<String>) -> Self {
        JvmError::Internal(message.into())
    }
}

impl From<ErrorGuaranteed> for JvmError {
    fn from(proof: ErrorGuaranteed) -> Self {
        JvmError::ErrorsReported(proof)
    }
}

/// A problem in the input program found during code generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JvmProblem {
    /// A call to an abstract feature is reachable.
    AbstractCall {
        called: String,
        caller: String,
        span: Span,
    },
    /// The intrinsic table has no entry for a reachable intrinsic.
    MissingIntrinsic { name: String, span: Span },
    /// A constant whose clazz or data cannot be materialized.
    UnsupportedConstant { clazz: String, span: Span },
    /// A call whose result is needed has no possible target.
    NoTargets { called: String, span: Span },
}

impl JvmProblem {
    pub fn code(&self) -> ErrorCode {
        match self {
            JvmProblem::AbstractCall { .. } => ErrorCode::E5001,
            JvmProblem::MissingIntrinsic { .. } => ErrorCode::E5002,
            JvmProblem::UnsupportedConstant { .. } => ErrorCode::E5003,
            JvmProblem::NoTargets { .. } => ErrorCode::E5004,
        }
    }

    /// Whether the problem stops the program from being usable. A call
    /// without targets only traps at run time if it is ever executed.
    pub fn is_error(&self) -> bool {
        !matches!(self, JvmProblem::NoTargets { .. })
    }

    /// Message used for the runtime trap replacing the failing code.
    pub fn trap_message(&self) -> String {
        match self {
            JvmProblem::AbstractCall { called, .. } => {
                format!("call to abstract feature `{called}`")
            }
            JvmProblem::MissingIntrinsic { name, .. } => {
                format!("missing implementation of intrinsic `{name}`")
            }
            JvmProblem::UnsupportedConstant { clazz, .. } => {
                format!("unsupported constant of type `{clazz}`")
            }
            JvmProblem::NoTargets { called, .. } => {
                format!("no targets for access of `{called}`")
            }
        }
    }

    pub fn into_diagnostic(self) -> Diagnostic {
        let code = self.code();
        let message = self.trap_message();
        let base = if self.is_error() {
            Diagnostic::error(code)
        } else {
            Diagnostic::warning(code)
        };
        match self {
            JvmProblem::AbstractCall { caller, span, .. } => base
                .with_message(message)
                .with_label(span, "called here")
                .with_note(format!("called from `{caller}`"))
                .with_note("an heir must implement the feature for this call to succeed"),
            JvmProblem::MissingIntrinsic { span, .. } => base
                .with_message(message)
                .with_label(span, "intrinsic used here"),
            JvmProblem::UnsupportedConstant { span, .. } => base
                .with_message(message)
                .with_label(span, "constant used here"),
            JvmProblem::NoTargets { span, .. } => base
                .with_message(message)
                .with_label(span, "accessed here")
                .with_note("executing this access terminates the program"),
        }
    }
}
