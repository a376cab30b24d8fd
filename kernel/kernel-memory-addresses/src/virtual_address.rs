use crate::{BlockClass, BlockSize, MemoryAddress};
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Virtual memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes addresses in the
/// translated kernel address space.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(pub(crate) MemoryAddress);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u32) -> Self {
        Self(MemoryAddress::new(v))
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0.as_u32()
    }

    #[inline]
    #[must_use]
    pub const fn as_addr(self) -> MemoryAddress {
        self.0
    }

    /// Whether the address is aligned to block size `S`.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: BlockSize>(self) -> bool {
        self.0.is_aligned::<S>()
    }

    /// Whether the address is aligned to the class's block size.
    #[inline]
    #[must_use]
    pub const fn is_class_aligned(self, class: BlockClass) -> bool {
        self.0.is_class_aligned(class)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:08x})", self.as_u32())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.as_u32())
    }
}

impl From<u32> for VirtualAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for VirtualAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self::new(self.as_u32().checked_add(rhs).expect("VirtualAddress add"))
    }
}

impl AddAssign<u32> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl Sub<Self> for VirtualAddress {
    type Output = u32;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.as_u32()
            .checked_sub(rhs.as_u32())
            .expect("VirtualAddress sub")
    }
}
