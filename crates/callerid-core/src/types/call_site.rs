//! Call-site key type.

use std::ffi::c_void;
use std::fmt;

/// Opaque identifier for one point in the compiled program.
///
/// The value is the return address of a stack frame. It is unique per call
/// site for the lifetime of the process, but not across restarts or rebuilds
/// (ASLR and relinking move code around). It is only ever used as a cache key
/// and handed back to the symbolication primitive; nothing reads memory
/// through it.
///
/// ## Example
///
/// ```rust
/// use callerid_core::types::CallSiteKey;
///
/// let key = CallSiteKey::from(0x1234_5678_usize);
/// assert_eq!(key.value(), 0x1234_5678);
/// assert_eq!(key.to_string(), "0x0000000012345678");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSiteKey(usize);

impl CallSiteKey
{
    /// Build a key from a raw instruction address.
    pub const fn new(address: usize) -> Self
    {
        CallSiteKey(address)
    }

    /// Raw instruction address.
    pub const fn value(self) -> usize
    {
        self.0
    }

    /// Address as the untyped pointer symbolication APIs expect.
    pub(crate) fn as_ptr(self) -> *mut c_void
    {
        self.0 as *mut c_void
    }
}

impl From<usize> for CallSiteKey
{
    fn from(value: usize) -> Self
    {
        CallSiteKey(value)
    }
}

impl From<*mut c_void> for CallSiteKey
{
    fn from(ip: *mut c_void) -> Self
    {
        CallSiteKey(ip as usize)
    }
}

impl fmt::Display for CallSiteKey
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}
