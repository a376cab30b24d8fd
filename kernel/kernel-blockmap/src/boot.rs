//! # Boot Orchestrator
//!
//! Drives the MMU through its boot phases: map the low text region, extend
//! the linear map to the top of RAM, then progressively tighten protections
//! once init code has finished. Also owns the one-shot hardware register
//! window and the O(1) address translator over the established windows.

use crate::table::{BlockTable, InstallMode};
use crate::tiler::map_chunk;
use crate::{BootAlloc, Fault, PhysMapper, Protection, TlbCache, linear_va};
use kernel_info::boot::{MmuConfig, SectionLayout};
use kernel_info::memory::{
    INITIAL_VISIBLE_LIMIT, IO_WINDOW_PHYS, IO_WINDOW_SIZE, IO_WINDOW_VIRT, PAGE_OFFSET,
};
use kernel_memory_addresses::{
    BlockClass, BlockSize, PhysicalAddress, Size8M, VirtualAddress, align_up,
};

/// Progress of the boot-time mapping sequence.
///
/// Phases are monotonic; each transition runs exactly once. The rodata
/// phase is optional and independent of the no-execute phase, so
/// [`BootPhase::RodataEnforced`] is only reached once both have run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum BootPhase {
    /// No RAM is block-mapped yet.
    Unmapped,
    /// The low text region is mapped; under debug paging this is final.
    TextMapped,
    /// The linear map reaches the top of RAM.
    FullyMapped,
    /// Init text has lost execute rights and the data region is pinned.
    NxEnforced,
    /// Text and rodata are additionally read-only.
    RodataEnforced,
}

/// Boot-time owner of the block table and the phase state machine.
///
/// Single-threaded by construction: everything here runs on the boot CPU
/// before any other context exists, so no locking is involved.
pub struct MmuBootstrap<'m, A, M, T> {
    table: BlockTable<'m, M>,
    alloc: A,
    tlb: T,
    config: MmuConfig,
    layout: SectionLayout,
    phase: BootPhase,
    /// Physical top of the established linear map.
    mapped_limit: u32,
    io_window_mapped: bool,
    nx_done: bool,
    rodata_done: bool,
}

impl<'m, A, M, T> MmuBootstrap<'m, A, M, T>
where
    A: BootAlloc,
    M: PhysMapper,
    T: TlbCache,
{
    /// Creates the (empty) block table and the phase tracker.
    pub fn new(
        mapper: &'m M,
        mut alloc: A,
        tlb: T,
        config: MmuConfig,
        layout: SectionLayout,
    ) -> Result<Self, Fault> {
        let table = BlockTable::create(mapper, &mut alloc)?;
        Ok(Self {
            table,
            alloc,
            tlb,
            config,
            layout,
            phase: BootPhase::Unmapped,
            mapped_limit: 0,
            io_window_mapped: false,
            nx_done: false,
            rodata_done: false,
        })
    }

    /// Clamps the first physical memory block to what early boot can use.
    ///
    /// The kernel runs out of the first block, so it must start at physical
    /// zero; anything beyond the initial visible limit only becomes usable
    /// after [`Self::mapin_ram`] has extended the linear map.
    pub fn clamp_initial_memory(
        &mut self,
        base: PhysicalAddress,
        size: u32,
    ) -> Result<u32, Fault> {
        if base.as_u32() != 0 {
            return Err(Fault::FirstBlockNotAtZero);
        }
        let clamped = size.min(INITIAL_VISIBLE_LIMIT);
        self.alloc.set_visible_limit(PhysicalAddress::new(clamped));
        Ok(clamped)
    }

    /// Maps the hardware register window: one uncached medium block at a
    /// fixed virtual address. Idempotent; later calls are no-ops.
    pub fn map_io_window(&mut self) -> Result<(), Fault> {
        if self.io_window_mapped {
            return Ok(());
        }
        self.io_window_mapped = true;
        self.table.install(
            &mut self.alloc,
            VirtualAddress::new(IO_WINDOW_VIRT),
            PhysicalAddress::new(IO_WINDOW_PHYS),
            Protection::KERNEL_IO,
            BlockClass::Medium,
            InstallMode::Create,
        )?;
        log::debug!("register window mapped at 0x{IO_WINDOW_VIRT:08x}");
        Ok(())
    }

    /// Establishes the linear RAM map up to `top` and returns the physical
    /// top actually mapped.
    ///
    /// The kernel image region is mapped executable up to a boundary that
    /// depends on the hardening options; the rest is mapped as data. Under
    /// debug paging only the text region is mapped and the returned top
    /// shrinks accordingly.
    pub fn mapin_ram(&mut self, top: PhysicalAddress) -> Result<PhysicalAddress, Fault> {
        if self.phase != BootPhase::Unmapped {
            return Err(Fault::PhaseRepeated);
        }
        let mut top = top.as_u32();
        if top < self.layout.init_text_end.as_u32() {
            return Err(Fault::TopBelowInitText { top });
        }
        self.map_io_window()?;

        let boundary = self.text_boundary(true);
        let init_end = self.init_text_boundary();
        map_chunk(
            &self.table,
            &mut self.alloc,
            &mut self.tlb,
            PhysicalAddress::zero(),
            PhysicalAddress::new(boundary),
            Protection::KERNEL_TEXT,
            InstallMode::Create,
        )?;
        self.phase = BootPhase::TextMapped;

        if self.config.strict_debug_paging {
            // No blanket executable map of RAM in this mode; the usable top
            // shrinks to what was just mapped.
            top = boundary;
        } else {
            map_chunk(
                &self.table,
                &mut self.alloc,
                &mut self.tlb,
                PhysicalAddress::new(boundary),
                PhysicalAddress::new(init_end),
                Protection::KERNEL_TEXT,
                InstallMode::Create,
            )?;
            map_chunk(
                &self.table,
                &mut self.alloc,
                &mut self.tlb,
                PhysicalAddress::new(init_end),
                PhysicalAddress::new(top),
                Protection::KERNEL_RW,
                InstallMode::Create,
            )?;
            self.phase = BootPhase::FullyMapped;
        }

        if top > INITIAL_VISIBLE_LIMIT {
            self.alloc.set_visible_limit(PhysicalAddress::new(top));
        }
        self.mapped_limit = top;
        log::debug!("linear map established up to 0x{top:08x} ({:?})", self.phase);
        Ok(PhysicalAddress::new(top))
    }

    /// Revokes execute rights from the init text region and pins the data
    /// region's translations.
    pub fn mark_initmem_nx(&mut self) -> Result<(), Fault> {
        if self.nx_done {
            return Err(Fault::PhaseRepeated);
        }
        if self.phase < BootPhase::TextMapped {
            return Err(Fault::PhaseOrder);
        }
        if !self.config.strict_debug_paging {
            // Re-protect everything from the text boundary through the end
            // of init text as data; the executable map of that span is no
            // longer needed.
            let boundary = self.text_boundary(false);
            let init_end = self.init_text_boundary();
            map_chunk(
                &self.table,
                &mut self.alloc,
                &mut self.tlb,
                PhysicalAddress::new(boundary),
                PhysicalAddress::new(init_end),
                Protection::KERNEL_RW,
                InstallMode::Update,
            )?;
        }
        self.tlb.pin_region(
            PhysicalAddress::zero(),
            PhysicalAddress::new(self.mapped_limit),
            true,
        );
        self.nx_done = true;
        self.phase = if self.rodata_done {
            BootPhase::RodataEnforced
        } else {
            BootPhase::NxEnforced
        };
        log::info!("init text no longer executable");
        Ok(())
    }

    /// Makes kernel text and rodata read-only.
    ///
    /// Requires the strict hardening option; may run before or after
    /// [`Self::mark_initmem_nx`], but only once.
    pub fn mark_rodata_ro(&mut self) -> Result<(), Fault> {
        if !self.config.strict_kernel_rwx {
            return Err(Fault::HardeningDisabled);
        }
        if self.rodata_done {
            return Err(Fault::PhaseRepeated);
        }
        if self.phase < BootPhase::TextMapped {
            return Err(Fault::PhaseOrder);
        }
        let boundary = self.layout.init_text_start;
        map_chunk(
            &self.table,
            &mut self.alloc,
            &mut self.tlb,
            PhysicalAddress::zero(),
            boundary,
            Protection::KERNEL_ROX,
            InstallMode::Update,
        )?;
        if self.config.pin_rodata {
            self.tlb.pin_region(PhysicalAddress::zero(), boundary, true);
        }
        self.rodata_done = true;
        if self.nx_done {
            self.phase = BootPhase::RodataEnforced;
        }
        log::info!("kernel text and rodata are read-only");
        Ok(())
    }

    /// Marks dynamic allocation as online; no new block entries may be
    /// created from here on.
    pub fn retire_bootstrap(&mut self) {
        self.table.retire_bootstrap();
    }

    /// Physical address behind `va`, if `va` lies in an established window.
    #[must_use]
    pub fn physical_of(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        let v = va.as_u32();
        if self.io_window_mapped
            && v >= IO_WINDOW_VIRT
            && v - IO_WINDOW_VIRT < IO_WINDOW_SIZE
        {
            return Some(PhysicalAddress::new(IO_WINDOW_PHYS + (v - IO_WINDOW_VIRT)));
        }
        if v >= PAGE_OFFSET && v - PAGE_OFFSET < self.mapped_limit {
            return Some(PhysicalAddress::new(v - PAGE_OFFSET));
        }
        None
    }

    /// Virtual address mapping `pa`, if `pa` lies in an established window.
    #[must_use]
    pub fn virtual_of(&self, pa: PhysicalAddress) -> Option<VirtualAddress> {
        let p = pa.as_u32();
        if self.io_window_mapped
            && p >= IO_WINDOW_PHYS
            && p - IO_WINDOW_PHYS < IO_WINDOW_SIZE
        {
            return Some(VirtualAddress::new(IO_WINDOW_VIRT + (p - IO_WINDOW_PHYS)));
        }
        if p < self.mapped_limit {
            return Some(linear_va(pa));
        }
        None
    }

    #[inline]
    #[must_use]
    pub const fn phase(&self) -> BootPhase {
        self.phase
    }

    /// Physical top of the linear map; zero before [`Self::mapin_ram`].
    #[inline]
    #[must_use]
    pub const fn mapped_limit(&self) -> u32 {
        self.mapped_limit
    }

    #[must_use]
    pub const fn table(&self) -> &BlockTable<'m, M> {
        &self.table
    }

    /// The bootstrap allocator, e.g. to hand out remaining early memory.
    #[must_use]
    pub const fn allocator(&self) -> &A {
        &self.alloc
    }

    /// End of the executable text chunk.
    ///
    /// With either hardening option active the boundary is the exact start
    /// of init text so the regions can diverge later; otherwise the coarse
    /// large-block boundary past the resident text. The no-execute phase
    /// only honours the strict option, since debug paging never mapped
    /// beyond the boundary in the first place.
    fn text_boundary(&self, include_debug: bool) -> u32 {
        let strict =
            self.config.strict_kernel_rwx || (include_debug && self.config.strict_debug_paging);
        if strict {
            self.layout.init_text_start.as_u32()
        } else {
            align_up(self.layout.text_end.as_u32(), Size8M::SIZE)
        }
    }

    /// End of init text, rounded out to the block boundary it was mapped
    /// with.
    fn init_text_boundary(&self) -> u32 {
        align_up(self.layout.init_text_end.as_u32(), Size8M::SIZE)
    }
}
