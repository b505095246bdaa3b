//! Symbol demangling utilities.
//!
//! Symbolication hands back linkage names. For Rust code these are mangled
//! (legacy `_ZN...E` or v0 `_R...`). Callers want the source path
//! `crate::module::function`, which is also what module attribution matches
//! against, so names are demangled in alternate mode: no trailing
//! `::h0123456789abcdef` hash and no v0 crate disambiguators.
//!
//! Names that are not Rust-mangled (C, C++, or already demangled by the
//! platform) pass through unchanged.

use rustc_demangle::try_demangle;

/// Convert a linkage name into the function path reported to callers.
///
/// ```rust
/// use callerid_core::symbols::function_name;
///
/// assert_eq!(function_name("_ZN7my_crate4util5parse17h0123456789abcdefE"), "my_crate::util::parse");
/// assert_eq!(function_name("my_crate::util::parse"), "my_crate::util::parse");
/// assert_eq!(function_name("memcpy"), "memcpy");
/// ```
pub fn function_name(raw: &str) -> String
{
    match try_demangle(raw) {
        Ok(demangled) => format!("{demangled:#}"),
        Err(_) => raw.to_string(),
    }
}
