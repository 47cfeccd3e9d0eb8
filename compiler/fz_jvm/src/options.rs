//! Backend configuration.

use fz_diagnostic::{DiagnosticConfig, DiagnosticQueue};

/// How constant strings are materialized.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstantPolicy {
    /// Each use site loads the constant itself.
    #[default]
    AtUseSite,
    /// Each distinct constant is created once at program start and kept in
    /// a static field.
    Preallocated,
}

/// Options of one backend run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JvmOptions {
    pub constants: ConstantPolicy,
    /// Turn self-recursive calls in tail position into jumps.
    pub tail_calls: bool,
    /// Emit a runtime trace message before every call.
    pub trace_calls: bool,
    /// Emit a runtime trace message before every return.
    pub trace_returns: bool,
    pub diagnostics: DiagnosticConfig,
}

impl Default for JvmOptions {
    fn default() -> Self {
        JvmOptions {
            constants: ConstantPolicy::AtUseSite,
            tail_calls: true,
            trace_calls: false,
            trace_returns: false,
            diagnostics: DiagnosticConfig::default(),
        }
    }
}

impl JvmOptions {
    #[must_use]
    pub fn with_constants(mut self, policy: ConstantPolicy) -> Self {
        self.constants = policy;
        self
    }

    #[must_use]
    pub fn with_tail_calls(mut self, enabled: bool) -> Self {
        self.tail_calls = enabled;
        self
    }

    #[must_use]
    pub fn with_trace_calls(mut self, enabled: bool) -> Self {
        self.trace_calls = enabled;
        self
    }

    #[must_use]
    pub fn with_trace_returns(mut self, enabled: bool) -> Self {
        self.trace_returns = enabled;
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, config: DiagnosticConfig) -> Self {
        self.diagnostics = config;
        self
    }

    /// An empty queue configured for a compilation with these options.
    pub fn diagnostic_queue(&self) -> DiagnosticQueue {
        DiagnosticQueue::with_config(self.diagnostics.clone())
    }
}
