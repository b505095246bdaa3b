//! # Stack capture
//!
//! The narrow boundary between caller identification and the runtime's
//! unwinder: capture one return address, and symbolicate one return address.
//! Everything above this module works on [`CallSiteKey`]s and
//! [`SymbolRecord`]s, so it can be driven by scripted stacks in tests.
//!
//! ## Counting frames
//!
//! A skip count is relative to a [`FrameAnchor`]: the physical frame of the
//! public entry function. Frames below the anchor belong to this crate (and
//! to the unwinder), and how many there are depends on inlining decisions, so
//! they are never counted. The first frame above the anchor is skip `0`, the
//! caller of the entry function.
//!
//! Skip counts are physical frames. If the caller was inlined into its own
//! caller, both share one frame; symbolication reports the innermost
//! (inlined) function for that frame.
//!
//! ## Locking
//!
//! The `backtrace` crate serializes every walk and every symbol lookup
//! through one process-wide lock. [`BacktraceSource`] only holds it for the
//! walk itself. Symbolication, and the symbol-table search for an anchor
//! whose frame could not be recognized from unwind info, run afterwards
//! against the [`ProcessImage`](crate::symbols::ProcessImage).

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use smallvec::SmallVec;
use tracing::trace;

use crate::symbols::process_image;
use crate::types::{CallSiteKey, SymbolRecord};

/// Frames recorded inline while looking for the anchor.
type Walked = SmallVec<[usize; 32]>;

/// Stack capture and symbolication primitives.
pub trait StackSource: Send + Sync
{
    /// Return address of the frame `skip` frames above `anchor`'s frame, or
    /// `None` if the stack is not that deep (or the anchor is not on it).
    fn capture(&self, anchor: &FrameAnchor, skip: usize) -> Option<CallSiteKey>;

    /// Function name and source location of the code at `key`.
    fn symbolicate(&self, key: CallSiteKey) -> SymbolRecord;
}

/// Marks the entry function from which skip counts start.
///
/// Built from the entry function's address. A frame belongs to the entry
/// function when its return address is one already seen there, when unwind
/// info names the entry function as its start, or, failing both, when the
/// symbol table does. Every return address found inside the entry function is
/// remembered, so an entry function may reach the lookup from any number of
/// call sites.
///
/// The entry function must be `#[inline(never)]` and must not tail-call into
/// the lookup, otherwise its frame is not on the stack.
#[derive(Debug)]
pub struct FrameAnchor
{
    entry: usize,
    return_sites: RwLock<Vec<usize>>,
}

impl FrameAnchor
{
    /// Anchor on the function starting at `entry` (a function pointer cast to
    /// `usize`).
    pub fn new(entry: usize) -> Self
    {
        Self {
            entry,
            return_sites: RwLock::new(Vec::new()),
        }
    }

    /// Start address of the entry function.
    pub fn entry(&self) -> usize
    {
        self.entry
    }

    /// Return addresses inside the entry function seen so far.
    pub fn return_sites(&self) -> Vec<usize>
    {
        self.return_sites.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Remember `ip` as a return address inside the entry function.
    pub fn record(&self, ip: usize)
    {
        let mut sites = self.return_sites.write().unwrap_or_else(PoisonError::into_inner);
        if !sites.contains(&ip) {
            trace!(entry = self.entry, return_site = ip, "frame anchor located");
            sites.push(ip);
        }
    }

    /// Index of the anchor frame in `walked` (return addresses, innermost
    /// first), matching by function start as reported by `function_start`.
    /// The match is recorded.
    pub fn locate(&self, walked: &[usize], function_start: impl Fn(usize) -> Option<usize>) -> Option<usize>
    {
        let index = walked.iter().position(|ip| function_start(*ip) == Some(self.entry))?;
        self.record(walked[index]);
        Some(index)
    }
}

/// [`StackSource`] backed by the platform unwinder, symbolicating through the
/// process image.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktraceSource;

impl StackSource for BacktraceSource
{
    #[inline(never)]
    fn capture(&self, anchor: &FrameAnchor, skip: usize) -> Option<CallSiteKey>
    {
        let mut walked = Walked::new();
        let mut found = None;
        let mut remaining = skip;
        let mut site = None;

        {
            let known = anchor.return_sites.read().unwrap_or_else(PoisonError::into_inner);
            backtrace::trace(|frame| {
                let ip = frame.ip() as usize;
                if found.is_none() {
                    if known.contains(&ip) || frame.symbol_address() as usize == anchor.entry {
                        found = Some(ip);
                    } else {
                        walked.push(ip);
                    }
                    return true;
                }
                if remaining > 0 {
                    remaining -= 1;
                    return true;
                }
                site = Some(CallSiteKey::new(ip));
                false
            });
        }

        if let Some(ip) = found {
            anchor.record(ip);
            return site;
        }

        // Unwind info did not name the anchor (Apple targets report the ip
        // as the symbol address); `walked` now holds the whole stack.
        let image = process_image()?;
        let index = anchor.locate(&walked, |ip| image.function_start(ip))?;
        walked.get(index + 1 + skip).copied().map(CallSiteKey::new)
    }

    fn symbolicate(&self, key: CallSiteKey) -> SymbolRecord
    {
        process_image()
            .and_then(|image| image.symbolicate(key.value()))
            .unwrap_or_else(|| unwinder_symbolicate(key))
    }
}

/// Symbolicate through the unwinder, for code outside the process image or
/// executables the image cannot be loaded from.
fn unwinder_symbolicate(key: CallSiteKey) -> SymbolRecord
{
    let mut record = SymbolRecord::default();
    let mut innermost = true;

    // Inlined call sites yield one symbol per inlining level, innermost
    // first.
    backtrace::resolve(key.as_ptr(), |symbol| {
        if !innermost {
            return;
        }
        innermost = false;
        record.name = symbol.name().map(|name| match name.as_str() {
            Some(raw) => raw.to_string(),
            None => name.to_string(),
        });
        record.file = symbol.filename().map(Path::to_path_buf);
        record.line = symbol.lineno();
    });

    record
}
