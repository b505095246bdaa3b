//! Common imports for hosts

pub use crate::attribution::{attribute, guess_module};
pub use crate::build_info::{process_build, BuildSnapshot};
pub use crate::error::{CallerError, CallerResult};
pub use crate::registry::{registry, CallerRegistry};
pub use crate::types::{CallSiteKey, CallerInfo, ModuleIdentity};
pub use crate::unwind::{BacktraceSource, FrameAnchor, StackSource};
pub use crate::caller_info;
