//! Error codes for backend diagnostics.
//!
//! The first digit names the phase, following the front end's numbering:
//! - E5xxx: code generation
//! - E9xxx: internal compiler errors

use std::fmt;

/// Error codes for all backend diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Codegen Errors (E5xxx)
    /// Call to an abstract feature that has no concrete implementation
    E5001,
    /// No backend implementation for an intrinsic
    E5002,
    /// Constant of a clazz the backend cannot materialize
    E5003,
    /// Access site without any possible target
    E5004,

    // Internal Errors (E9xxx)
    /// Internal compiler error
    E9001,
}

impl ErrorCode {
    /// The code as it appears in rendered output, e.g. `"E5001"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E5001 => "E5001",
            ErrorCode::E5002 => "E5002",
            ErrorCode::E5003 => "E5003",
            ErrorCode::E5004 => "E5004",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Short human description used by `--explain`-style lookups.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::E5001 => "call to abstract feature",
            ErrorCode::E5002 => "missing intrinsic implementation",
            ErrorCode::E5003 => "unsupported constant",
            ErrorCode::E5004 => "access without targets",
            ErrorCode::E9001 => "internal compiler error",
        }
    }

    /// Returns `true` for code generation errors (E5xxx).
    pub fn is_codegen_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E5001 | ErrorCode::E5002 | ErrorCode::E5003 | ErrorCode::E5004
        )
    }

    /// Returns `true` for internal compiler errors (E9xxx).
    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
