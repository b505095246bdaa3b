//! # Types
//!
//! Value types shared by the resolver, the attributor and the cache.

pub mod call_site;
pub mod caller;
pub mod frame;
pub mod module;

// Re-export all public types
pub use call_site::CallSiteKey;
pub use caller::CallerInfo;
pub use frame::{ResolvedFrame, SymbolRecord};
pub use module::ModuleIdentity;
