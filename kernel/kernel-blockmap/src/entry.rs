//! # Translation Structures
//!
//! The two-level block translation structure walked by the TLB miss handler.
//!
//! The first level is a [`BlockDirectory`] of 1024 [`SlotDescriptor`]s, each
//! covering 4 MiB of virtual space. A slot either points at a [`MediumTable`]
//! of eight 512 KiB entries, or (together with its odd neighbour) at a
//! [`LargeGroup`] holding the single shared entry of one 8 MiB block.

use crate::Protection;
use bitfield_struct::bitfield;
use kernel_info::memory::{DIRECTORY_SLOTS, DIRECTORY_SLOT_SPAN};
use kernel_memory_addresses::{BlockClass, PhysicalAddress, VirtualAddress};

/// Entries per medium table: one per 512 KiB sub-span of a 4 MiB slot.
pub const MEDIUM_ENTRIES: usize = 8;

/// One block translation entry as the miss handler reads it.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct BlockEntry {
    /// The entry maps a block.
    pub present: bool,
    /// The entry maps a large (8 MiB) block; otherwise medium (512 KiB).
    pub large: bool,
    /// Stores permitted.
    pub writable: bool,
    /// Instruction fetch permitted.
    pub executable: bool,
    /// Cache bypassed.
    pub cache_inhibited: bool,
    #[bits(14)]
    __: u16,
    /// Bits 31..19 of the physical block base.
    #[bits(13)]
    base_bits_31_19: u16,
}

impl BlockEntry {
    /// Builds a live entry mapping `pa` with the given class and rights.
    #[must_use]
    pub fn make(pa: PhysicalAddress, class: BlockClass, prot: Protection) -> Self {
        Self::new()
            .with_present(true)
            .with_large(matches!(class, BlockClass::Large))
            .with_base(pa)
            .with_protection(prot)
    }

    /// Physical base address of the mapped block.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new((self.base_bits_31_19() as u32) << 19)
    }

    #[inline]
    #[must_use]
    pub const fn with_base(self, pa: PhysicalAddress) -> Self {
        self.with_base_bits_31_19((pa.as_u32() >> 19) as u16)
    }

    /// The entry's block class.
    #[inline]
    #[must_use]
    pub const fn class(self) -> BlockClass {
        if self.large() {
            BlockClass::Large
        } else {
            BlockClass::Medium
        }
    }

    /// The protection flags encoded in the entry.
    #[must_use]
    pub fn protection(self) -> Protection {
        let mut prot = Protection::empty();
        prot.set(Protection::WRITABLE, self.writable());
        prot.set(Protection::EXECUTABLE, self.executable());
        prot.set(Protection::CACHE_INHIBITED, self.cache_inhibited());
        prot
    }

    /// Replaces the protection flags, leaving base and class untouched.
    #[must_use]
    pub fn with_protection(self, prot: Protection) -> Self {
        self.with_writable(prot.contains(Protection::WRITABLE))
            .with_executable(prot.contains(Protection::EXECUTABLE))
            .with_cache_inhibited(prot.contains(Protection::CACHE_INHIBITED))
    }
}

/// One first-level directory slot covering 4 MiB of virtual space.
#[bitfield(u32)]
#[derive(Eq, PartialEq)]
pub struct SlotDescriptor {
    /// The slot points at a second-level structure.
    pub present: bool,
    /// The slot participates in a large block and points at a
    /// [`LargeGroup`]; otherwise a [`MediumTable`].
    pub large: bool,
    #[bits(3)]
    __: u8,
    /// Bits 31..5 of the second-level structure's physical address.
    #[bits(27)]
    table_bits_31_5: u32,
}

impl SlotDescriptor {
    /// Builds a live descriptor pointing at the structure at `table`.
    #[must_use]
    pub const fn make(table: PhysicalAddress, large: bool) -> Self {
        Self::new()
            .with_present(true)
            .with_large(large)
            .with_table_bits_31_5(table.as_u32() >> 5)
    }

    /// Physical address of the second-level structure.
    #[inline]
    #[must_use]
    pub const fn table(self) -> PhysicalAddress {
        PhysicalAddress::new(self.table_bits_31_5() << 5)
    }
}

/// The first-level translation directory: one frame, 1024 slots, 4 GiB of
/// coverage.
#[repr(C, align(4096))]
pub struct BlockDirectory {
    /// Slot `i` covers virtual `[i * 4 MiB, (i + 1) * 4 MiB)`.
    pub slots: [SlotDescriptor; DIRECTORY_SLOTS],
}

impl BlockDirectory {
    /// Resets every slot to not-present.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = SlotDescriptor::new();
        }
    }
}

/// Second-level table of eight medium entries, one per 512 KiB sub-span.
#[repr(C, align(32))]
pub struct MediumTable {
    pub entries: [BlockEntry; MEDIUM_ENTRIES],
}

impl MediumTable {
    /// Resets every entry to not-present.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = BlockEntry::new();
        }
    }
}

/// Second-level holder of one large block's single entry, shared by the two
/// directory slots the block spans.
#[repr(C, align(32))]
pub struct LargeGroup {
    pub entry: BlockEntry,
}

/// First-level slot index of `va`.
#[inline]
#[must_use]
pub const fn slot_index(va: VirtualAddress) -> usize {
    (va.as_u32() / DIRECTORY_SLOT_SPAN) as usize
}

/// Index of `va`'s medium entry within its slot's [`MediumTable`].
#[inline]
#[must_use]
pub const fn medium_index(va: VirtualAddress) -> usize {
    ((va.as_u32() >> 19) & 0x7) as usize
}

const _: () = {
    assert!(size_of::<BlockDirectory>() == 4096);
    assert!(size_of::<MediumTable>() == 32);
    assert!(align_of::<LargeGroup>() == 32);
};
