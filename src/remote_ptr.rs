//! Typed addresses in a tracee's address space.

use std::fmt;
use std::marker::PhantomData;

/// An address in the tracee's virtual address space, tagged with the type it
/// is expected to point at. The tag is bookkeeping only; nothing is ever
/// dereferenced locally.
pub struct RemotePtr<T> {
    addr: u64,
    phantom: PhantomData<*const T>,
}

impl<T> RemotePtr<T> {
    pub fn new(addr: u64) -> RemotePtr<T> {
        RemotePtr {
            addr,
            phantom: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.addr == 0
    }

    pub fn as_u64(&self) -> u64 {
        self.addr
    }

    /// Byte offset; the tag is deliberately not scaled because syscall
    /// arguments address raw bytes.
    pub fn add_bytes(&self, offset: u64) -> RemotePtr<T> {
        RemotePtr::new(self.addr.wrapping_add(offset))
    }

    pub fn cast<U>(&self) -> RemotePtr<U> {
        RemotePtr::new(self.addr)
    }
}

impl<T> Copy for RemotePtr<T> {}

impl<T> Clone for RemotePtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> fmt::Debug for RemotePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr)
    }
}

impl<T> From<u64> for RemotePtr<T> {
    fn from(addr: u64) -> Self {
        RemotePtr::new(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_offsets() {
        let p: RemotePtr<u8> = RemotePtr::new(0);
        assert!(p.is_null());
        let q = p.add_bytes(16);
        assert_eq!(q.as_u64(), 16);
        let r: RemotePtr<u16> = q.cast();
        assert_eq!(r.as_u64(), 16);
    }
}
