use crate::{BlockClass, BlockSize, MemoryAddress};
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Physical memory address.
///
/// A thin wrapper around [`MemoryAddress`] that denotes **physical** addresses
/// (RAM or a memory-mapped register block). Like
/// [`VirtualAddress`](crate::VirtualAddress), this type carries intent and
/// prevents accidental VA/PA mix-ups.
///
/// ### Notes
/// - Translation entries store a block-aligned physical base with the low
///   `S::SHIFT` bits cleared; use [`is_aligned`](Self::is_aligned) before
///   installing.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(pub(crate) MemoryAddress);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

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

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:08x})", self.as_u32())
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.as_u32())
    }
}

impl From<u32> for PhysicalAddress {
    #[inline]
    fn from(v: u32) -> Self {
        Self::new(v)
    }
}

impl Add<u32> for PhysicalAddress {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u32) -> Self::Output {
        Self::new(self.as_u32().checked_add(rhs).expect("PhysicalAddress add"))
    }
}

impl AddAssign<u32> for PhysicalAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u32) {
        *self = *self + rhs;
    }
}

impl Sub<Self> for PhysicalAddress {
    type Output = u32;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.as_u32()
            .checked_sub(rhs.as_u32())
            .expect("PhysicalAddress sub")
    }
}
