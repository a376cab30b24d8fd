//! # Early-Boot Block Mapping
//!
//! Software-loaded TLB management for the early boot path of a 32-bit CPU.
//! RAM is mapped linearly at a fixed virtual offset using two block sizes
//! (medium blocks of 512 KiB and large blocks of 8 MiB), chosen greedily so
//! a range is covered by the fewest translation entries.
//!
//! The crate is built around three seams the caller provides:
//!
//! * [`BootAlloc`] hands out physical frames for translation structures,
//! * [`PhysMapper`] turns a physical address into a usable reference while
//!   translation is not yet (fully) active,
//! * [`TlbCache`] receives flush and pin requests for the hardware TLB.
//!
//! [`MmuBootstrap`] drives the boot phases on top of [`BlockTable`], the
//! two-level translation structure, and the chunk tiler in [`tiler`].

#![cfg_attr(not(any(test, doctest)), no_std)]

mod boot;
mod entry;
mod fault;
mod table;
#[cfg(test)]
pub(crate) mod testing;
pub mod tiler;

pub use boot::{BootPhase, MmuBootstrap};
pub use entry::{BlockDirectory, BlockEntry, LargeGroup, MediumTable, SlotDescriptor};
pub use fault::Fault;
pub use table::{BlockTable, InstallMode};

use bitflags::bitflags;
use kernel_info::memory::PAGE_OFFSET;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

bitflags! {
    /// Access rights and caching attributes of a block mapping.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Protection: u8 {
        /// Stores to the block are permitted.
        const WRITABLE = 1 << 0;
        /// Instruction fetch from the block is permitted.
        const EXECUTABLE = 1 << 1;
        /// The block bypasses the cache (device memory).
        const CACHE_INHIBITED = 1 << 2;
    }
}

impl Protection {
    /// Kernel text before the hardening phases have run: the coarse mapping
    /// must remain both writable and executable until init code is done.
    pub const KERNEL_TEXT: Self = Self::WRITABLE.union(Self::EXECUTABLE);

    /// Kernel data: writable, never executable.
    pub const KERNEL_RW: Self = Self::WRITABLE;

    /// Hardened kernel text and rodata: executable, never writable.
    pub const KERNEL_ROX: Self = Self::EXECUTABLE;

    /// Memory-mapped hardware registers: writable, uncached.
    pub const KERNEL_IO: Self = Self::WRITABLE.union(Self::CACHE_INHIBITED);
}

/// Physical frame source for translation structures during early boot.
///
/// Implementations are simple bump allocators over memory below the visible
/// limit; nothing allocated through this trait is ever freed.
pub trait BootAlloc {
    /// Allocates `size` bytes aligned to `align`, or `None` when the early
    /// pool is exhausted.
    fn alloc(&mut self, size: u32, align: u32) -> Option<PhysicalAddress>;

    /// Raises (or initially clamps) the physical limit below which the
    /// allocator may place data.
    fn set_visible_limit(&mut self, limit: PhysicalAddress);
}

/// Access to physical memory while translation is not yet fully active.
pub trait PhysMapper {
    /// Reinterprets the memory at `pa` as a `T`.
    ///
    /// ### Safety
    ///
    /// `pa` must point to memory that is reachable, sufficiently aligned for
    /// `T`, and not aliased by another live reference.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}

/// Hardware TLB maintenance requests.
pub trait TlbCache {
    /// Drops any cached translations for the virtual range `[start, end)`.
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress);

    /// Pins (or unpins) the translation entries covering physical
    /// `[start, end)` of the linear map so they survive TLB pressure.
    fn pin_region(&mut self, start: PhysicalAddress, end: PhysicalAddress, pin: bool);
}

/// Virtual address of `pa` in the linear RAM map.
#[inline]
#[must_use]
pub const fn linear_va(pa: PhysicalAddress) -> VirtualAddress {
    VirtualAddress::new(PAGE_OFFSET.wrapping_add(pa.as_u32()))
}
