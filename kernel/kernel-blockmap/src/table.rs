//! # Block Table
//!
//! Owner of the two-level translation structure and home of the entry
//! installer. Installation has two modes: [`InstallMode::Create`] builds new
//! entries (allocating second-level structures on demand) and is only legal
//! while the bootstrap allocator is live; [`InstallMode::Update`] tightens
//! the protection of existing entries and never allocates.

use crate::entry::{
    BlockDirectory, BlockEntry, LargeGroup, MediumTable, medium_index, slot_index,
};
use crate::{BootAlloc, Fault, PhysMapper, Protection, SlotDescriptor};
use kernel_memory_addresses::{BlockClass, PhysicalAddress, VirtualAddress};

/// How an install call treats the target entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InstallMode {
    /// The entry must not exist yet; second-level structures are allocated
    /// as needed.
    Create,
    /// The entry must already exist; only its protection changes.
    Update,
}

/// The two-level block translation structure.
///
/// Holds the physical root of the directory and the mapper used to reach
/// translation structures. The `bootstrap_retired` flag latches once dynamic
/// allocation comes online; from then on [`InstallMode::Create`] is refused,
/// since new structures would have to come from the retired bootstrap pool.
pub struct BlockTable<'m, M> {
    root: PhysicalAddress,
    mapper: &'m M,
    bootstrap_retired: bool,
}

impl<'m, M: PhysMapper> BlockTable<'m, M> {
    /// Allocates and zeroes the first-level directory.
    pub fn create<A: BootAlloc>(mapper: &'m M, alloc: &mut A) -> Result<Self, Fault> {
        let root = alloc
            .alloc(size_of::<BlockDirectory>() as u32, 4096)
            .ok_or(Fault::OutOfEarlyMemory)?;
        let table = Self {
            root,
            mapper,
            bootstrap_retired: false,
        };
        table.directory().clear();
        Ok(table)
    }

    /// Physical address of the first-level directory.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Latches the end of the bootstrap allocation window.
    pub fn retire_bootstrap(&mut self) {
        self.bootstrap_retired = true;
    }

    #[inline]
    #[must_use]
    pub const fn bootstrap_retired(&self) -> bool {
        self.bootstrap_retired
    }

    /// Installs or updates the translation entry for one block.
    ///
    /// `va` and `pa` must both be aligned to `class`. In create mode the
    /// target must be empty; in update mode it must hold a live entry of the
    /// same class, and only its protection is replaced.
    pub fn install<A: BootAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: Protection,
        class: BlockClass,
        mode: InstallMode,
    ) -> Result<(), Fault> {
        if !va.is_class_aligned(class) {
            return Err(Fault::Misaligned {
                addr: va.as_u32(),
                class,
            });
        }
        if !pa.is_class_aligned(class) {
            return Err(Fault::Misaligned {
                addr: pa.as_u32(),
                class,
            });
        }
        if mode == InstallMode::Create && self.bootstrap_retired {
            return Err(Fault::BootstrapRetired);
        }
        match class {
            BlockClass::Medium => self.install_medium(alloc, va, pa, prot, mode),
            BlockClass::Large => self.install_large(alloc, va, pa, prot, mode),
        }
    }

    /// The live entry covering `va`, if any.
    #[must_use]
    pub fn entry_at(&self, va: VirtualAddress) -> Option<BlockEntry> {
        let desc = self.directory().slots[slot_index(va)];
        if !desc.present() {
            return None;
        }
        let entry = if desc.large() {
            self.large_group(desc.table()).entry
        } else {
            self.medium_table(desc.table()).entries[medium_index(va)]
        };
        entry.present().then_some(entry)
    }

    fn install_medium<A: BootAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: Protection,
        mode: InstallMode,
    ) -> Result<(), Fault> {
        let slot = slot_index(va);
        let desc = self.directory().slots[slot];
        let table_pa = match (mode, desc.present()) {
            (InstallMode::Create, true) | (InstallMode::Update, true) => {
                if desc.large() {
                    return Err(Fault::ClassMismatch { va: va.as_u32() });
                }
                desc.table()
            }
            (InstallMode::Create, false) => {
                let table_pa = alloc
                    .alloc(size_of::<MediumTable>() as u32, align_of::<MediumTable>() as u32)
                    .ok_or(Fault::OutOfEarlyMemory)?;
                self.medium_table(table_pa).clear();
                self.directory().slots[slot] = SlotDescriptor::make(table_pa, false);
                table_pa
            }
            (InstallMode::Update, false) => {
                return Err(Fault::EntryMissing { va: va.as_u32() });
            }
        };
        let entry = &mut self.medium_table(table_pa).entries[medium_index(va)];
        Self::write_entry(entry, va, pa, prot, BlockClass::Medium, mode)
    }

    fn install_large<A: BootAlloc>(
        &self,
        alloc: &mut A,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: Protection,
        mode: InstallMode,
    ) -> Result<(), Fault> {
        // An 8 MiB block spans two consecutive slots; both reference the
        // same group so the miss handler finds one entry either way.
        let slot = slot_index(va);
        let lo = self.directory().slots[slot];
        let hi = self.directory().slots[slot + 1];
        let group_pa = match (mode, lo.present()) {
            (InstallMode::Create, true) | (InstallMode::Update, true) => {
                if !lo.large() || hi != lo {
                    return Err(Fault::ClassMismatch { va: va.as_u32() });
                }
                lo.table()
            }
            (InstallMode::Create, false) => {
                if hi.present() {
                    return Err(Fault::ClassMismatch { va: va.as_u32() });
                }
                let group_pa = alloc
                    .alloc(size_of::<LargeGroup>() as u32, align_of::<LargeGroup>() as u32)
                    .ok_or(Fault::OutOfEarlyMemory)?;
                self.large_group(group_pa).entry = BlockEntry::new();
                let desc = SlotDescriptor::make(group_pa, true);
                self.directory().slots[slot] = desc;
                self.directory().slots[slot + 1] = desc;
                group_pa
            }
            (InstallMode::Update, false) => {
                return Err(Fault::EntryMissing { va: va.as_u32() });
            }
        };
        let entry = &mut self.large_group(group_pa).entry;
        Self::write_entry(entry, va, pa, prot, BlockClass::Large, mode)
    }

    fn write_entry(
        entry: &mut BlockEntry,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: Protection,
        class: BlockClass,
        mode: InstallMode,
    ) -> Result<(), Fault> {
        match mode {
            InstallMode::Create => {
                if entry.present() {
                    return Err(Fault::EntryPresent { va: va.as_u32() });
                }
                *entry = BlockEntry::make(pa, class, prot);
            }
            InstallMode::Update => {
                if !entry.present() {
                    return Err(Fault::EntryMissing { va: va.as_u32() });
                }
                *entry = entry.with_protection(prot);
            }
        }
        Ok(())
    }

    #[allow(clippy::mut_from_ref)]
    fn directory(&self) -> &mut BlockDirectory {
        // The structure lives in early memory this table exclusively owns.
        unsafe { self.mapper.phys_to_mut(self.root) }
    }

    #[allow(clippy::mut_from_ref)]
    fn medium_table(&self, pa: PhysicalAddress) -> &mut MediumTable {
        unsafe { self.mapper.phys_to_mut(pa) }
    }

    #[allow(clippy::mut_from_ref)]
    fn large_group(&self, pa: PhysicalAddress) -> &mut LargeGroup {
        unsafe { self.mapper.phys_to_mut(pa) }
    }
}
