//! Module (crate) identity.

use std::fmt;

use serde::Serialize;

/// A versioned, independently distributable unit of code.
///
/// `path` is the crate's import path as it appears at the start of symbol
/// names (`serde_json`, not `serde-json`). Either field may be empty, which
/// means "unknown" and is never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleIdentity
{
    pub path: String,
    pub version: String,
}

impl ModuleIdentity
{
    /// Identity for module `path` at `version` (either may be empty).
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self
    {
        Self {
            path: path.into(),
            version: version.into(),
        }
    }

    /// Identity with neither a path nor a version.
    pub fn unknown() -> Self
    {
        Self::default()
    }

    /// Whether both the path and the version are empty.
    pub fn is_unknown(&self) -> bool
    {
        self.path.is_empty() && self.version.is_empty()
    }

    /// Whether `path` (an owning path such as `serde_json::de`) lives in this
    /// module.
    ///
    /// The match must end on a `::` boundary, so `serde` does not own
    /// `serde_json::from_str`. An empty module path owns nothing.
    pub fn owns(&self, path: &str) -> bool
    {
        if self.path.is_empty() {
            return false;
        }
        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    }
}

impl fmt::Display for ModuleIdentity
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match (self.path.is_empty(), self.version.is_empty()) {
            (true, _) => write!(f, "<unknown>"),
            (false, true) => write!(f, "{}", self.path),
            (false, false) => write!(f, "{}@{}", self.path, self.version),
        }
    }
}
