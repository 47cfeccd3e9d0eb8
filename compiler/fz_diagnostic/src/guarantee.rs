//! Proof that an error was emitted.

use std::fmt;

/// Zero-sized proof token that at least one error diagnostic was emitted.
///
/// Only obtainable through [`DiagnosticQueue`](crate::DiagnosticQueue) or
/// [`ErrorGuaranteed::from_error_count`], so a function returning it cannot
/// fail silently.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    pub(crate) fn new() -> Self {
        ErrorGuaranteed(())
    }

    /// `Some` proof if `count` is non-zero.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then(Self::new)
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("error(s) emitted")
    }
}

impl std::error::Error for ErrorGuaranteed {}
