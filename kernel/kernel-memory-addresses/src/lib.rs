//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the raw 32-bit addresses used by the
//! block-mapping and TLB-reload code.
//!
//! ## Overview
//!
//! The target CPU has a 32-bit address space and a software-loaded TLB that
//! only understands two block sizes. This module provides a minimal set of
//! types that prevent mixing virtual and physical addresses at compile time
//! while remaining zero-cost wrappers around `u32` values:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`MemoryAddress`] | A raw 32-bit address, either physical or virtual. |
//! | [`VirtualAddress`] | An address in the translated (kernel) address space. |
//! | [`PhysicalAddress`] | A bus address (RAM or a register block). |
//!
//! ## Block Sizes
//!
//! The two translation block sizes the hardware supports are available both
//! as marker types implementing [`BlockSize`] (for type-level alignment
//! reasoning) and as the runtime [`BlockClass`] enum (for tiling loops):
//!
//! - [`Size512K`] — 512 KiB blocks ([`BlockClass::Medium`])
//! - [`Size8M`] — 8 MiB blocks ([`BlockClass::Large`])
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`
//!   and `Hash`.
//! - Alignment helpers are `const fn` and assume power-of-two alignments.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::fmt;
use core::hash::Hash;

mod physical_address;
mod virtual_address;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Sealed trait pattern to restrict `BlockSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for the translation block sizes the hardware supports.
pub trait BlockSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Display + fmt::Debug
{
    /// Block size in bytes (power of two).
    const SIZE: u32;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;

    fn as_str() -> &'static str;
}

/// 512 KiB block (`524_288` bytes), the medium block class.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size512K;
impl sealed::Sealed for Size512K {}
impl BlockSize for Size512K {
    const SIZE: u32 = 512 * 1024;
    const SHIFT: u32 = 19;

    fn as_str() -> &'static str {
        "512K"
    }
}

/// 8 MiB block (`8_388_608` bytes), the large block class.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size8M;
impl sealed::Sealed for Size8M {}
impl BlockSize for Size8M {
    const SIZE: u32 = 8 * 1024 * 1024;
    const SHIFT: u32 = 23;

    fn as_str() -> &'static str {
        "8M"
    }
}

impl fmt::Display for Size512K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Display for Size8M {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Debug for Size512K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Debug for Size8M {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

/// Runtime selector between the two supported block classes.
///
/// Tiling code iterates over mixed-size runs and needs the block size as a
/// value; [`BlockSize`] markers cover the type-level side.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum BlockClass {
    /// 512 KiB block ([`Size512K`]).
    Medium,
    /// 8 MiB block ([`Size8M`]).
    Large,
}

impl BlockClass {
    /// Block size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Medium => Size512K::SIZE,
            Self::Large => Size8M::SIZE,
        }
    }

    /// log2 of the block size.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Medium => Size512K::SHIFT,
            Self::Large => Size8M::SHIFT,
        }
    }
}

impl fmt::Display for BlockClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Medium => f.write_str(Size512K::as_str()),
            Self::Large => f.write_str(Size8M::as_str()),
        }
    }
}

/// A memory address as it is used in pointers.
///
/// See [`PhysicalAddress`] and [`VirtualAddress`] for the intent-carrying
/// wrappers.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemoryAddress(pub u32);

impl MemoryAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Whether the address is a multiple of `S::SIZE`.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: BlockSize>(self) -> bool {
        self.0 & (S::SIZE - 1) == 0
    }

    /// Whether the address is a multiple of the class's block size.
    #[inline]
    #[must_use]
    pub const fn is_class_aligned(self, class: BlockClass) -> bool {
        self.0 & (class.size() - 1) == 0
    }
}

impl fmt::Display for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl fmt::Debug for MemoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x} (@{} KiB)", self.0, self.0 / 1024)
    }
}

impl From<u32> for MemoryAddress {
    #[inline]
    fn from(addr: u32) -> Self {
        Self::new(addr)
    }
}

/// Align `x` down to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be non-zero and a power of two; the bit-trick formula relies
///   on that property and performs no runtime checks.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_down;
/// assert_eq!(align_down(0x0012_3456, 0x8_0000), 0x0010_0000);
/// assert_eq!(align_down(0x0080_0000, 0x80_0000), 0x0080_0000);
/// ```
#[inline]
#[must_use]
pub const fn align_down(x: u32, a: u32) -> u32 {
    x & !(a - 1)
}

/// Align `x` up to the nearest multiple of `a`.
///
/// ### Preconditions
/// - `a` must be non-zero and a power of two.
/// - `x + (a - 1)` must not overflow `u32`. In debug builds an overflow
///   panics; addresses near the top of the address space must not be
///   aligned upwards.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::align_up;
/// assert_eq!(align_up(0x0030_0000, 0x80_0000), 0x0080_0000);
/// assert_eq!(align_up(0x0080_0000, 0x80_0000), 0x0080_0000);
/// ```
#[inline]
#[must_use]
pub const fn align_up(x: u32, a: u32) -> u32 {
    (x + a - 1) & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_sizes_match_markers() {
        assert_eq!(BlockClass::Medium.size(), Size512K::SIZE);
        assert_eq!(BlockClass::Large.size(), Size8M::SIZE);
        assert_eq!(1u32 << BlockClass::Medium.shift(), BlockClass::Medium.size());
        assert_eq!(1u32 << BlockClass::Large.shift(), BlockClass::Large.size());
    }

    #[test]
    fn alignment_checks() {
        let a = MemoryAddress::new(0x0080_0000);
        assert!(a.is_aligned::<Size512K>());
        assert!(a.is_aligned::<Size8M>());
        let b = MemoryAddress::new(0x0068_0000);
        assert!(b.is_aligned::<Size512K>());
        assert!(!b.is_aligned::<Size8M>());
        assert!(b.is_class_aligned(BlockClass::Medium));
        assert!(!b.is_class_aligned(BlockClass::Large));
    }

    #[test]
    fn align_helpers() {
        assert_eq!(align_up(0, Size8M::SIZE), 0);
        assert_eq!(align_up(1, Size8M::SIZE), Size8M::SIZE);
        assert_eq!(align_down(Size8M::SIZE - 1, Size8M::SIZE), 0);
        assert_eq!(align_down(Size8M::SIZE, Size8M::SIZE), Size8M::SIZE);
    }
}
