//! # Resolution Cache
//!
//! Memoizes caller lookups by call-site address.
//!
//! Attribution is deterministic for a given binary, so an entry never changes
//! once stored and readers never re-validate. Entries are never evicted: the
//! number of distinct call sites in a program is bounded by its code size.
//!
//! ## Locking
//!
//! The map sits behind a `RwLock`. Lookups take the read lock, so they only
//! wait for a writer that is in the middle of a single insert. The expensive
//! part of a miss (symbolication and attribution) runs with no lock held;
//! [`ResolutionCache::store`] takes the write lock just for the insert.
//!
//! ## Usage
//!
//! ```rust
//! use callerid_core::symbols::ResolutionCache;
//! use callerid_core::types::{CallSiteKey, CallerInfo, ModuleIdentity, ResolvedFrame};
//!
//! let cache = ResolutionCache::new();
//! let key = CallSiteKey::new(0x4000);
//! assert!(cache.lookup(key).is_none());
//!
//! let frame = ResolvedFrame { key, function: "app::run".into(), file: String::new(), line: 0 };
//! let stored = cache.store(key, CallerInfo::new(frame, ModuleIdentity::unknown()));
//! assert_eq!(cache.lookup(key).as_deref(), Some(&*stored));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::trace;

use crate::types::{CallSiteKey, CallerInfo};

/// Concurrent, unbounded, write-once map from call site to caller info.
#[derive(Debug, Default)]
pub struct ResolutionCache
{
    entries: RwLock<HashMap<CallSiteKey, Arc<CallerInfo>>>,
}

impl ResolutionCache
{
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Cached info for `key`, if a previous lookup stored it.
    pub fn lookup(&self, key: CallSiteKey) -> Option<Arc<CallerInfo>>
    {
        // A panicking writer cannot leave a half-inserted entry behind, so a
        // poisoned map is still consistent.
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).cloned()
    }

    /// Store `info` for `key` and return the entry now in the cache.
    ///
    /// If another thread stored `key` first, its entry is kept and returned;
    /// both threads computed the same value, so every caller ends up sharing
    /// one `Arc`.
    pub fn store(&self, key: CallSiteKey, info: CallerInfo) -> Arc<CallerInfo>
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_insert_with(|| {
            trace!(call_site = %key, function = info.function(), "caching caller");
            Arc::new(info)
        });
        Arc::clone(entry)
    }

    /// Number of distinct call sites cached so far.
    pub fn len(&self) -> usize
    {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no call site has been cached yet.
    pub fn is_empty(&self) -> bool
    {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests
{
    use std::thread;

    use super::*;
    use crate::types::{ModuleIdentity, ResolvedFrame};

    fn info(key: CallSiteKey, function: &str) -> CallerInfo
    {
        let frame = ResolvedFrame {
            key,
            function: function.into(),
            file: "src/lib.rs".into(),
            line: 10,
        };
        CallerInfo::new(frame, ModuleIdentity::new("app", "1.2.3"))
    }

    #[test]
    fn miss_then_hit()
    {
        let cache = ResolutionCache::new();
        let key = CallSiteKey::new(0x1000);

        assert!(cache.is_empty());
        assert!(cache.lookup(key).is_none());

        let stored = cache.store(key, info(key, "app::run"));
        let hit = cache.lookup(key).expect("entry stored");
        assert!(Arc::ptr_eq(&stored, &hit));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_store_wins()
    {
        let cache = ResolutionCache::new();
        let key = CallSiteKey::new(0x2000);

        let first = cache.store(key, info(key, "app::first"));
        let second = cache.store(key, info(key, "app::second"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.function(), "app::first");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_collide()
    {
        let cache = ResolutionCache::new();
        let a = CallSiteKey::new(0x10);
        let b = CallSiteKey::new(0x20);
        cache.store(a, info(a, "app::a"));
        cache.store(b, info(b, "app::b"));

        assert_eq!(cache.lookup(a).unwrap().function(), "app::a");
        assert_eq!(cache.lookup(b).unwrap().function(), "app::b");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_stores_share_one_entry()
    {
        let cache = Arc::new(ResolutionCache::new());
        let key = CallSiteKey::new(0x3000);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let mine = cache.store(key, info(key, "app::hot"));
                    let seen = cache.lookup(key).expect("entry present after store");
                    assert!(Arc::ptr_eq(&mine, &seen));
                    mine
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
