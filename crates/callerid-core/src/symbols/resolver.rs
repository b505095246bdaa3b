//! Frame resolution: skip count -> call site -> function, file, line.

use tracing::debug;

use super::demangle::function_name;
use crate::error::{CallerError, CallerResult};
use crate::types::{CallSiteKey, ResolvedFrame};
use crate::unwind::{FrameAnchor, StackSource};

/// Resolves one stack frame through a [`StackSource`].
///
/// Resolution is split in two so the cheap half can run on every lookup:
/// [`call_site`](Self::call_site) only walks the stack, while
/// [`symbolicate`](Self::symbolicate) reads debug info and is only needed on
/// a cache miss.
#[derive(Debug, Default)]
pub struct FrameResolver<S>
{
    source: S,
}

impl<S: StackSource> FrameResolver<S>
{
    /// Resolver over `source`.
    pub fn new(source: S) -> Self
    {
        Self { source }
    }

    /// The underlying stack source.
    pub fn source(&self) -> &S
    {
        &self.source
    }

    /// Return address of the frame `skip` frames above `anchor`.
    ///
    /// ## Errors
    ///
    /// [`CallerError::NoFrames`] if the stack is shallower than `skip`.
    pub fn call_site(&self, anchor: &FrameAnchor, skip: usize) -> CallerResult<CallSiteKey>
    {
        self.source.capture(anchor, skip).ok_or_else(|| {
            debug!(skip, "stack shallower than requested skip");
            CallerError::NoFrames { skip }
        })
    }

    /// Function, file and line for `key`. Missing debug info yields empty
    /// fields rather than an error.
    pub fn symbolicate(&self, key: CallSiteKey) -> ResolvedFrame
    {
        let record = self.source.symbolicate(key);
        ResolvedFrame {
            key,
            function: record.name.as_deref().map(function_name).unwrap_or_default(),
            file: record
                .file
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            line: record.line.unwrap_or(0),
        }
    }

    /// Capture and symbolicate in one step.
    ///
    /// ## Errors
    ///
    /// [`CallerError::NoFrames`] if the stack is shallower than `skip`.
    pub fn resolve_frame(&self, anchor: &FrameAnchor, skip: usize) -> CallerResult<ResolvedFrame>
    {
        let key = self.call_site(anchor, skip)?;
        Ok(self.symbolicate(key))
    }
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use super::*;
    use crate::types::SymbolRecord;

    /// Stack of (return address, symbol) pairs, innermost first, starting
    /// just above the anchor.
    struct ScriptedStack(Vec<(usize, SymbolRecord)>);

    impl StackSource for ScriptedStack
    {
        fn capture(&self, _anchor: &FrameAnchor, skip: usize) -> Option<CallSiteKey>
        {
            self.0.get(skip).map(|(ip, _)| CallSiteKey::new(*ip))
        }

        fn symbolicate(&self, key: CallSiteKey) -> SymbolRecord
        {
            self.0
                .iter()
                .find(|(ip, _)| *ip == key.value())
                .map(|(_, symbol)| symbol.clone())
                .unwrap_or_default()
        }
    }

    fn stack() -> FrameResolver<ScriptedStack>
    {
        FrameResolver::new(ScriptedStack(vec![
            (
                0x1010,
                SymbolRecord {
                    name: Some("_ZN3app8handlers5login17h0123456789abcdefE".into()),
                    file: Some(PathBuf::from("src/handlers.rs")),
                    line: Some(42),
                },
            ),
            (0x2020, SymbolRecord::named("app::server::dispatch")),
            (0x3030, SymbolRecord::default()),
        ]))
    }

    #[test]
    fn resolves_demangled_frame()
    {
        let resolver = stack();
        let anchor = FrameAnchor::new(0);
        let frame = resolver.resolve_frame(&anchor, 0).unwrap();

        assert_eq!(frame.key, CallSiteKey::new(0x1010));
        assert_eq!(frame.function, "app::handlers::login");
        assert_eq!(frame.file, "src/handlers.rs");
        assert_eq!(frame.line, 42);
    }

    #[test]
    fn each_skip_moves_one_frame()
    {
        let resolver = stack();
        let anchor = FrameAnchor::new(0);
        assert_eq!(resolver.resolve_frame(&anchor, 1).unwrap().function, "app::server::dispatch");
        assert_eq!(resolver.call_site(&anchor, 2).unwrap(), CallSiteKey::new(0x3030));
    }

    #[test]
    fn missing_debug_info_is_empty_not_error()
    {
        let resolver = stack();
        let frame = resolver.resolve_frame(&FrameAnchor::new(0), 2).unwrap();
        assert_eq!(frame.function, "");
        assert_eq!(frame.file, "");
        assert_eq!(frame.line, 0);
    }

    #[test]
    fn too_deep_is_no_frames()
    {
        let resolver = stack();
        let err = resolver.resolve_frame(&FrameAnchor::new(0), 3).unwrap_err();
        assert_eq!(err, CallerError::NoFrames { skip: 3 });
    }
}
