//! Symbolication results for a single stack frame.

use std::path::PathBuf;

use super::CallSiteKey;

/// Raw answer from a symbolication primitive.
///
/// Every field is optional: stripped binaries have no file/line data, and
/// some frames (JIT code, foreign libraries without symbols) have no name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolRecord
{
    /// Linkage name as found in the binary (possibly mangled).
    pub name: Option<String>,
    /// Source file of the call site.
    pub file: Option<PathBuf>,
    /// Source line of the call site.
    pub line: Option<u32>,
}

impl SymbolRecord
{
    /// Record with just a name, as produced for binaries without line tables.
    pub fn named(name: impl Into<String>) -> Self
    {
        Self {
            name: Some(name.into()),
            file: None,
            line: None,
        }
    }
}

/// A call site resolved to `(key, function, file, line)`.
///
/// Unknown parts are empty strings and line `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame
{
    /// Return address the frame was captured at.
    pub key: CallSiteKey,
    /// Demangled, hash-free function path.
    pub function: String,
    /// Source file, or empty.
    pub file: String,
    /// Source line, or `0`.
    pub line: u32,
}
