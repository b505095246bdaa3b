//! Caller identity returned by lookups.

use std::fmt;

use serde::Serialize;

use super::{ModuleIdentity, ResolvedFrame};

/// Who called: function, source location and owning crate.
///
/// Values are immutable once built and shared through the resolution cache as
/// `Arc<CallerInfo>`. Unknown parts are empty strings (line `0`); that is a
/// normal outcome for stripped binaries or processes without embedded build
/// metadata.
///
/// `Display` renders a compact single line suitable for log fields:
///
/// ```text
/// my_app::handlers::login (src/handlers.rs:42) [my_app@0.3.1]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CallerInfo
{
    function: String,
    file: String,
    line: u32,
    module: String,
    module_version: String,
}

impl CallerInfo
{
    /// Combine a resolved frame with its module attribution.
    pub fn new(frame: ResolvedFrame, module: ModuleIdentity) -> Self
    {
        Self {
            function: frame.function,
            file: frame.file,
            line: frame.line,
            module: module.path,
            module_version: module.version,
        }
    }

    /// Fully qualified function path (`crate::module::function`).
    pub fn function(&self) -> &str
    {
        &self.function
    }

    /// Source file of the call site, or empty.
    pub fn file(&self) -> &str
    {
        &self.file
    }

    /// Source line of the call site, or `0`.
    pub fn line(&self) -> u32
    {
        self.line
    }

    /// Owning crate, or empty.
    pub fn module(&self) -> &str
    {
        &self.module
    }

    /// Owning crate's version, or empty.
    pub fn module_version(&self) -> &str
    {
        &self.module_version
    }
}

impl fmt::Display for CallerInfo
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.function.is_empty() {
            write!(f, "<unknown>")?;
        } else {
            write!(f, "{}", self.function)?;
        }
        if !self.file.is_empty() {
            write!(f, " ({}:{})", self.file, self.line)?;
        }
        if !self.module.is_empty() {
            write!(f, " [{}", self.module)?;
            if !self.module_version.is_empty() {
                write!(f, "@{}", self.module_version)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
