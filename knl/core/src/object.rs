//! Checked type tags for kernel objects.
//!
//! Every kernel object embeds a [`KnlObj`] that is stamped with its
//! [`KnlObjType`] at creation and cleared at destruction. Operations verify
//! the tag first, which catches stale, uninitialized and mistyped handles.
//! Verification can be compiled out with the `object-verify` feature.

use core::cell::Cell;
use critical_section::Mutex;

use crate::{KnlError, KnlResult};

/// Kinds of kernel object that carry a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnlObjType {
    Task,
    Timer,
    MsgQueue,
    MmblkPool,
    Fifo,
    Queue,
}

#[cfg(feature = "defmt")]
impl defmt::Format for KnlObjType {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Task => defmt::write!(fmt, "Task"),
            Self::Timer => defmt::write!(fmt, "Timer"),
            Self::MsgQueue => defmt::write!(fmt, "MsgQueue"),
            Self::MmblkPool => defmt::write!(fmt, "MmblkPool"),
            Self::Fifo => defmt::write!(fmt, "Fifo"),
            Self::Queue => defmt::write!(fmt, "Queue"),
        }
    }
}

/// Type tag embedded in a kernel object
pub struct KnlObj {
    tag: Mutex<Cell<Option<KnlObjType>>>,
}

impl KnlObj {
    /// A tag stamped with `ty`
    pub const fn new(ty: KnlObjType) -> Self {
        Self {
            tag: Mutex::new(Cell::new(Some(ty))),
        }
    }

    /// A tag that fails every verification until [`init`](Self::init)
    pub const fn uninit() -> Self {
        Self {
            tag: Mutex::new(Cell::new(None)),
        }
    }

    pub fn init(&self, ty: KnlObjType) {
        critical_section::with(|cs| self.tag.borrow(cs).set(Some(ty)));
    }

    pub fn deinit(&self) {
        critical_section::with(|cs| self.tag.borrow(cs).set(None));
    }

    /// Current tag, `None` once destroyed
    pub fn kind(&self) -> Option<KnlObjType> {
        critical_section::with(|cs| self.tag.borrow(cs).get())
    }

    /// Whether the tag is present and equal to `ty`
    pub fn is(&self, ty: KnlObjType) -> bool {
        self.kind() == Some(ty)
    }

    /// Fails with [`KnlError::ObjInvalid`] unless the tag is `ty`
    #[cfg(feature = "object-verify")]
    pub fn verify(&self, ty: KnlObjType) -> KnlResult<()> {
        if self.is(ty) {
            Ok(())
        } else {
            log::warn!("object verify failed: expected {:?}, found {:?}", ty, self.kind());
            Err(KnlError::ObjInvalid)
        }
    }

    #[cfg(not(feature = "object-verify"))]
    #[inline]
    pub fn verify(&self, _ty: KnlObjType) -> KnlResult<()> {
        Ok(())
    }
}

impl Default for KnlObj {
    fn default() -> Self {
        Self::uninit()
    }
}

impl core::fmt::Debug for KnlObj {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KnlObj").field("tag", &self.kind()).finish()
    }
}
