//! # callerid-core
//!
//! Identifies the code that called you: function, source location, owning
//! crate and that crate's version, for a frame `skip` levels up the stack.
//!
//! ```rust
//! #[inline(never)]
//! fn handler()
//! {
//!     let info = callerid_core::caller_info(0).unwrap();
//!     assert!(info.function().ends_with("handler"));
//!     println!("{info}");
//! }
//!
//! handler();
//! ```
//!
//! ## Pipeline
//!
//! - [`unwind`]: capture one return address relative to a frame anchor
//! - [`symbols`]: symbolicate it and cache results per call site
//! - [`attribution`]: map the function to a crate (dependency, main module or
//!   path heuristic)
//! - [`build_info`]: the process's embedded dependency manifest, read once
//! - [`registry`]: the component tying these together
//!
//! Results are computed once per call site and shared as `Arc<CallerInfo>`,
//! so logging hot paths pay for a stack walk and a map lookup only.
//!
//! ## Best effort
//!
//! Stripped binaries resolve to empty names and locations, and binaries
//! without an embedded dependency manifest attribute crates by path alone.
//! The only error is a stack shallower than the requested skip.

pub mod attribution;
pub mod build_info;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod symbols;
pub mod types;
pub mod unwind;

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::debug;

pub use error::{CallerError, CallerResult};
pub use registry::{registry, CallerRegistry};
pub use types::{CallSiteKey, CallerInfo, ModuleIdentity};
pub use unwind::{BacktraceSource, FrameAnchor, StackSource};

static ENTRY_ANCHOR: Lazy<FrameAnchor> = Lazy::new(|| {
    let entry: fn(usize) -> CallerResult<Arc<CallerInfo>> = caller_info;
    FrameAnchor::new(entry as usize)
});

/// Caller of the function calling `caller_info`, `skip` frames further up.
///
/// `skip = 0` names the function that called `caller_info`, `skip = 1` its
/// caller, and so on. Frames are physical: a function inlined into its caller
/// shares that caller's frame.
///
/// Repeated calls from the same call site return the same `Arc`.
///
/// ## Errors
///
/// [`CallerError::NoFrames`] if the stack has fewer than `skip + 1` frames
/// above the calling function.
#[inline(never)]
pub fn caller_info(skip: usize) -> CallerResult<Arc<CallerInfo>>
{
    let result = registry().resolve_anchored(&ENTRY_ANCHOR, skip);
    if let Err(err) = &result {
        debug!("caller lookup failed: {err}");
    }
    result
}
