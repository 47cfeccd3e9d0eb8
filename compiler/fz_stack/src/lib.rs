//! Stack growth for deeply recursive backend passes.
//!
//! Value records can nest other value records and general choices to
//! arbitrary depth, and routine bodies can nest expressions just as deeply.
//! The clone/equality synthesizers and the expression lowerer recurse over
//! that structure, so each recursive step goes through
//! [`ensure_sufficient_stack`], which grows the native stack on demand.
//!
//! On `wasm32` the helper is a plain call.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first growing the stack if less than the red zone remains.
///
/// ```text
/// fn clone_method(&mut self, cl: ClazzId) -> Result<MethodRef, JvmError> {
///     ensure_sufficient_stack(|| self.clone_method_uncached(cl))
/// }
/// ```
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Direct call; wasm manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests;
