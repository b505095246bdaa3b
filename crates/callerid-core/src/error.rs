//! # Error Types
//!
//! Caller identification has exactly one way to fail: the stack is not deep
//! enough for the requested skip count. Everything else (missing debug info,
//! missing build metadata, unknown owning crate) degrades to empty fields in
//! [`CallerInfo`](crate::types::CallerInfo) instead of an error.
//!
//! We use `thiserror` to generate the `Error` implementation and messages.

use thiserror::Error;

/// Error returned by caller lookups.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerError
{
    /// No stack frame exists `skip` frames above the caller of the query.
    ///
    /// This happens when a caller asks to skip past the bottom of the stack,
    /// e.g. from a thread entry point with a large skip count. Retrying cannot
    /// change the outcome; callers should log without caller metadata.
    #[error("No stack frame {skip} frame(s) above the caller")]
    NoFrames
    {
        /// Skip count that was requested
        skip: usize,
    },
}

/// Convenience type alias for `Result<T, CallerError>`
///
/// ```rust
/// use callerid_core::error::CallerResult;
/// fn foo() -> CallerResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type CallerResult<T> = std::result::Result<T, CallerError>;
