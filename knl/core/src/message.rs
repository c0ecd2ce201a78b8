//! Message payload descriptors

use crate::{KnlError, KnlResult};

/// A caller-owned payload passed through a queue by address.
///
/// The kernel stores and hands back the address and size verbatim; it never
/// copies or dereferences the payload. The caller keeps the payload alive
/// for as long as the message is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Message {
    pub addr: usize,
    pub size: usize,
}

impl Message {
    pub const fn new(addr: usize, size: usize) -> Self {
        Self { addr, size }
    }

    /// Describe a value by its address and size
    pub fn from_ref<T>(value: &T) -> Self {
        Self {
            addr: value as *const T as usize,
            size: core::mem::size_of::<T>(),
        }
    }

    /// Describe a byte buffer by its address and length
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            addr: bytes.as_ptr() as usize,
            size: bytes.len(),
        }
    }

    /// Whether the payload address is null
    pub const fn is_null(&self) -> bool {
        self.addr == 0
    }

    /// Reject null payloads
    pub const fn check(self) -> KnlResult<Self> {
        if self.is_null() {
            Err(KnlError::ObjPtrNull)
        } else {
            Ok(self)
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Message {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Message({=usize:#x}, {=usize})", self.addr, self.size);
    }
}
