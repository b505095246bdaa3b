//! # Caller registry
//!
//! The owned component behind caller lookups: a frame resolver, the build
//! snapshot used for attribution, and the resolution cache.
//!
//! ```text
//! skip ──► capture call site ──► cache hit? ──yes──► Arc<CallerInfo>
//!                                   │ no
//!                                   ▼
//!                symbolicate ──► attribute ──► store ──► Arc<CallerInfo>
//! ```
//!
//! Hosts normally use the process-wide registry through
//! [`caller_info`](crate::caller_info). Owning a `CallerRegistry` directly is
//! useful with a custom [`StackSource`] (tests drive it with scripted stacks)
//! or a build snapshot obtained some other way.

use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::attribution::attribute;
use crate::build_info::{process_build, BuildSnapshot};
use crate::error::CallerResult;
use crate::symbols::{FrameResolver, ResolutionCache};
use crate::types::CallerInfo;
use crate::unwind::{BacktraceSource, FrameAnchor, StackSource};

static PROCESS_REGISTRY: Lazy<CallerRegistry> = Lazy::new(|| CallerRegistry::new(BacktraceSource, process_build()));

/// The process-wide registry: real stack, process build snapshot.
pub fn registry() -> &'static CallerRegistry
{
    &PROCESS_REGISTRY
}

/// Resolves, attributes and caches callers for one stack source.
#[derive(Debug)]
pub struct CallerRegistry<S = BacktraceSource>
{
    resolver: FrameResolver<S>,
    build: Option<Arc<BuildSnapshot>>,
    cache: ResolutionCache,
    anchor: FrameAnchor,
}

type Lookup<S> = fn(&CallerRegistry<S>, usize) -> CallerResult<Arc<CallerInfo>>;

impl<S: StackSource> CallerRegistry<S>
{
    /// Registry over `source`. Without a build snapshot every attribution
    /// uses the path heuristic.
    pub fn new(source: S, build: Option<Arc<BuildSnapshot>>) -> Self
    {
        let entry: Lookup<S> = Self::caller_info;
        Self {
            resolver: FrameResolver::new(source),
            build,
            cache: ResolutionCache::new(),
            anchor: FrameAnchor::new(entry as usize),
        }
    }

    /// Caller of this method, `skip` frames further up.
    ///
    /// `skip = 0` is the function that called `caller_info`.
    ///
    /// ## Errors
    ///
    /// [`CallerError::NoFrames`](crate::CallerError::NoFrames) if the stack is
    /// shallower than `skip`.
    #[inline(never)]
    pub fn caller_info(&self, skip: usize) -> CallerResult<Arc<CallerInfo>>
    {
        let result = self.resolve_anchored(&self.anchor, skip);
        if let Err(err) = &result {
            debug!("caller lookup failed: {err}");
        }
        result
    }

    /// Caller of `anchor`'s entry function, `skip` frames further up.
    ///
    /// Lets a host wrap the lookup in its own helper (a logging macro backend,
    /// say) and count frames from that helper instead of from this crate. The
    /// helper must be `#[inline(never)]` and must use the result after the
    /// call so its frame stays on the stack.
    ///
    /// ## Errors
    ///
    /// [`CallerError::NoFrames`](crate::CallerError::NoFrames) if the stack is
    /// shallower than `skip`.
    pub fn resolve_anchored(&self, anchor: &FrameAnchor, skip: usize) -> CallerResult<Arc<CallerInfo>>
    {
        let key = self.resolver.call_site(anchor, skip)?;
        if let Some(info) = self.cache.lookup(key) {
            trace!(call_site = %key, "caller cache hit");
            return Ok(info);
        }

        // No lock is held while symbolicating; a racing thread may compute
        // the same entry, and `store` keeps whichever lands first.
        let frame = self.resolver.symbolicate(key);
        let module = attribute(&frame.function, self.build.as_deref());
        Ok(self.cache.store(key, CallerInfo::new(frame, module)))
    }

    /// Build snapshot used for attribution, if any.
    pub fn build_snapshot(&self) -> Option<&BuildSnapshot>
    {
        self.build.as_deref()
    }

    /// Number of distinct call sites resolved so far.
    pub fn cached_call_sites(&self) -> usize
    {
        self.cache.len()
    }

    /// The frame resolver and, through it, the stack source.
    pub fn resolver(&self) -> &FrameResolver<S>
    {
        &self.resolver
    }
}
