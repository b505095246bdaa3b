//! # Module attribution
//!
//! Decides which crate owns a function, best-effort, in three tiers:
//!
//! 1. **Dependency match**: the function's path starts with a dependency's
//!    import path. The longest matching path wins; equal paths (two versions
//!    of one crate) resolve to the first in snapshot order.
//! 2. **Main module**: a build snapshot exists but no dependency matched, so
//!    the code belongs to the executable itself (this includes `std`, which
//!    is not listed as a dependency).
//! 3. **Heuristic**: no build snapshot at all; guess from the path alone with
//!    [`guess_module`].
//!
//! No tier fails. An empty module is a legitimate answer.

use crate::build_info::BuildSnapshot;
use crate::types::ModuleIdentity;

/// Trailing path segments that name a code-organization directory rather
/// than a module of their own.
pub const NON_MODULE_SEGMENTS: &[&str] = &["pkg", "internal"];

/// Attribute `function` to its owning module.
///
/// ```rust
/// use callerid_core::attribution::attribute;
/// use callerid_core::build_info::BuildSnapshot;
/// use callerid_core::types::ModuleIdentity;
///
/// let build = BuildSnapshot::new(
///     ModuleIdentity::new("my_app", "0.3.1"),
///     vec![ModuleIdentity::new("serde", "1.0.200"), ModuleIdentity::new("serde_json", "1.0.120")],
/// );
///
/// assert_eq!(attribute("serde_json::de::from_str", Some(&build)), ModuleIdentity::new("serde_json", "1.0.120"));
/// assert_eq!(attribute("my_app::main", Some(&build)), ModuleIdentity::new("my_app", "0.3.1"));
/// assert_eq!(attribute("my_app::handlers::login", None), ModuleIdentity::new("my_app", ""));
/// ```
pub fn attribute(function: &str, build: Option<&BuildSnapshot>) -> ModuleIdentity
{
    let Some(build) = build else {
        return ModuleIdentity::new(guess_module(function), "");
    };

    let path = owning_path(function);
    let mut best: Option<&ModuleIdentity> = None;
    for dependency in build.dependencies() {
        if dependency.owns(&path) && best.map_or(true, |current| dependency.path.len() > current.path.len()) {
            best = Some(dependency);
        }
    }

    best.unwrap_or_else(|| build.main_module()).clone()
}

/// Guess a module from the function path alone.
///
/// Splits the owning path on `::` and drops the function (or type) segment
/// together with the module that defines it, keeping at least one segment.
/// Trailing [`NON_MODULE_SEGMENTS`] are then dropped while more than one
/// segment is left. Compiler-generated segments such as `{{closure}}` are
/// ignored.
///
/// ```rust
/// use callerid_core::attribution::guess_module;
///
/// assert_eq!(guess_module("acme::org::repo::pkg::internal::sub::Foo"), "acme::org::repo");
/// assert_eq!(guess_module("my_app::handlers::login"), "my_app");
/// assert_eq!(guess_module("my_app::run"), "my_app");
/// assert_eq!(guess_module("main"), "");
/// ```
pub fn guess_module(function: &str) -> String
{
    let path = owning_path(function);
    let mut segments: Vec<&str> = path
        .split("::")
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .collect();

    segments.pop();
    if segments.len() > 1 {
        segments.pop();
    }
    while segments.len() > 1 && segments.last().is_some_and(|last| NON_MODULE_SEGMENTS.contains(last)) {
        segments.pop();
    }
    segments.join("::")
}

/// The plain path that owns `function`.
///
/// `<Type as Trait>::method` and `<Type>::method` are owned by `Type`, even
/// when the impl lives in the trait's crate: `<Vec<T> as serde::Serialize>`
/// attributes to `alloc`, not `serde`. Reference, pointer and `dyn` prefixes
/// and generic arguments are dropped.
pub fn owning_path(function: &str) -> String
{
    let name = strip_type_prefixes(function.trim());
    match name.strip_prefix('<') {
        Some(inner) => owning_path(qualified_self(inner)),
        None => strip_generics(name),
    }
}

fn strip_type_prefixes(mut name: &str) -> &str
{
    const PREFIXES: &[&str] = &["&", "*const ", "*mut ", "mut ", "dyn ", "impl ", "(", "["];
    while let Some(rest) = PREFIXES.iter().find_map(|prefix| name.strip_prefix(prefix)) {
        name = rest.trim_start();
    }
    name
}

/// Self type of a qualified path, given the text after its opening `<`.
fn qualified_self(inner: &str) -> &str
{
    let mut depth = 0usize;
    for (index, ch) in inner.char_indices() {
        match ch {
            '>' if inner[..index].ends_with('-') => {}
            '<' => depth += 1,
            '>' if depth == 0 => return &inner[..index],
            '>' => depth -= 1,
            ' ' if depth == 0 && inner[index..].starts_with(" as ") => return &inner[..index],
            _ => {}
        }
    }
    inner
}

fn strip_generics(name: &str) -> String
{
    let mut out = String::with_capacity(name.len());
    let mut depth = 0usize;
    let mut previous = '\0';
    for ch in name.chars() {
        match ch {
            '<' => depth += 1,
            '>' if depth > 0 && previous != '-' => depth -= 1,
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
        previous = ch;
    }
    out
}
