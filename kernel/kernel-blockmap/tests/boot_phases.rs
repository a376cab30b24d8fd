//! Full boot sequence walked against mock hardware: clamp, map, harden,
//! translate.

use kernel_blockmap::{
    BlockTable, BootAlloc, BootPhase, Fault, InstallMode, MmuBootstrap, PhysMapper, Protection,
    TlbCache,
};
use kernel_info::boot::{MmuConfig, SectionLayout};
use kernel_info::memory::{IO_WINDOW_PHYS, IO_WINDOW_VIRT, PAGE_OFFSET};
use kernel_memory_addresses::{BlockClass, PhysicalAddress, VirtualAddress, align_up};

#[repr(C, align(4096))]
#[derive(Copy, Clone)]
struct Frame([u8; 4096]);

/// Pool of frames standing in for low physical memory.
struct FakeRam {
    frames: Vec<Frame>,
}

impl FakeRam {
    fn new(frames: usize) -> Self {
        Self {
            frames: vec![Frame([0; 4096]); frames],
        }
    }
}

impl PhysMapper for FakeRam {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let base = self.frames.as_ptr().cast::<u8>().cast_mut();
        unsafe { &mut *base.add(pa.as_u32() as usize).cast::<T>() }
    }
}

struct Bump {
    next: u32,
    end: u32,
    visible_limit: Option<u32>,
}

impl Bump {
    fn new(ram: &FakeRam) -> Self {
        Self {
            next: 0,
            end: (ram.frames.len() * 4096) as u32,
            visible_limit: None,
        }
    }
}

impl BootAlloc for Bump {
    fn alloc(&mut self, size: u32, align: u32) -> Option<PhysicalAddress> {
        let start = align_up(self.next, align);
        let end = start.checked_add(size)?;
        (end <= self.end).then(|| {
            self.next = end;
            PhysicalAddress::new(start)
        })
    }

    fn set_visible_limit(&mut self, limit: PhysicalAddress) {
        self.visible_limit = Some(limit.as_u32());
    }
}

#[derive(Default)]
struct Tlb {
    flushes: Vec<(u32, u32)>,
    pins: Vec<(u32, u32, bool)>,
}

impl TlbCache for Tlb {
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        self.flushes.push((start.as_u32(), end.as_u32()));
    }

    fn pin_region(&mut self, start: PhysicalAddress, end: PhysicalAddress, pin: bool) {
        self.pins.push((start.as_u32(), end.as_u32(), pin));
    }
}

fn layout() -> SectionLayout {
    SectionLayout {
        text_end: PhysicalAddress::new(0x0030_0000),
        init_text_start: PhysicalAddress::new(0x0050_0000),
        init_text_end: PhysicalAddress::new(0x0061_0000),
    }
}

fn boot(
    ram: &FakeRam,
    config: MmuConfig,
) -> MmuBootstrap<'_, Bump, FakeRam, Tlb> {
    MmuBootstrap::new(ram, Bump::new(ram), Tlb::default(), config, layout()).unwrap()
}

fn linear(offset: u32) -> VirtualAddress {
    VirtualAddress::new(PAGE_OFFSET + offset)
}

#[test]
fn coarse_boot_on_small_ram() {
    let ram = FakeRam::new(8);
    let mut mmu = boot(&ram, MmuConfig::default());

    assert_eq!(
        mmu.clamp_initial_memory(PhysicalAddress::zero(), 0x0400_0000),
        Ok(0x0200_0000)
    );

    // 7 MiB of RAM: below the rounded 8 MiB text boundary, above the end of
    // init text. The whole image region still gets its large executable
    // block; the usable top stays at the requested 7 MiB.
    let top = mmu.mapin_ram(PhysicalAddress::new(0x0070_0000)).unwrap();
    assert_eq!(top.as_u32(), 0x0070_0000);
    assert_eq!(mmu.phase(), BootPhase::FullyMapped);

    let text = mmu.table().entry_at(linear(0)).unwrap();
    assert_eq!(text.class(), BlockClass::Large);
    assert_eq!(text.base(), PhysicalAddress::zero());
    assert_eq!(text.protection(), Protection::KERNEL_TEXT);
    // Both halves of the large block resolve to the same entry.
    assert_eq!(mmu.table().entry_at(linear(0x0040_0000)), Some(text));
    // Nothing beyond the single large block was created.
    assert!(mmu.table().entry_at(linear(0x0080_0000)).is_none());
}

#[test]
fn strict_boot_walks_every_phase() {
    let ram = FakeRam::new(16);
    let config = MmuConfig {
        strict_kernel_rwx: true,
        pin_rodata: true,
        strict_debug_paging: false,
    };
    let mut mmu = boot(&ram, config);

    mmu.clamp_initial_memory(PhysicalAddress::zero(), 0x0800_0000)
        .unwrap();
    let top = mmu.mapin_ram(PhysicalAddress::new(0x0800_0000)).unwrap();
    assert_eq!(top.as_u32(), 0x0800_0000);
    assert_eq!(mmu.phase(), BootPhase::FullyMapped);
    // The visible limit followed the mapping top past the initial window.
    assert_eq!(mmu.allocator().visible_limit, Some(0x0800_0000));

    // Strict layout: text up to init text start is medium-granular so the
    // regions can diverge; RAM past the rounded init end is large data
    // blocks.
    let text = mmu.table().entry_at(linear(0)).unwrap();
    assert_eq!(text.class(), BlockClass::Medium);
    assert_eq!(text.protection(), Protection::KERNEL_TEXT);
    let data = mmu.table().entry_at(linear(0x0400_0000)).unwrap();
    assert_eq!(data.class(), BlockClass::Large);
    assert_eq!(data.protection(), Protection::KERNEL_RW);

    // Dynamic allocation comes online; mapping creation is over.
    mmu.retire_bootstrap();

    // Hardening may still update protections.
    mmu.mark_rodata_ro().unwrap();
    assert_eq!(
        mmu.table().entry_at(linear(0)).unwrap().protection(),
        Protection::KERNEL_ROX
    );
    mmu.mark_initmem_nx().unwrap();
    assert_eq!(mmu.phase(), BootPhase::RodataEnforced);
    assert_eq!(
        mmu.table()
            .entry_at(linear(0x0050_0000))
            .unwrap()
            .protection(),
        Protection::KERNEL_RW
    );

    // Protection only ever tightened; bases never moved.
    assert_eq!(
        mmu.table().entry_at(linear(0)).unwrap().base(),
        PhysicalAddress::zero()
    );

    // Translator agrees with the established windows.
    assert_eq!(
        mmu.physical_of(linear(0x0123_4000)),
        Some(PhysicalAddress::new(0x0123_4000))
    );
    assert_eq!(
        mmu.virtual_of(PhysicalAddress::new(IO_WINDOW_PHYS + 0x100)),
        Some(VirtualAddress::new(IO_WINDOW_VIRT + 0x100))
    );
    assert!(mmu.physical_of(VirtualAddress::new(0x0040_0000)).is_none());
}

#[test]
fn phase_misuse_is_fatal_but_detected() {
    let ram = FakeRam::new(8);
    let mut mmu = boot(&ram, MmuConfig::default());

    assert_eq!(mmu.mark_initmem_nx(), Err(Fault::PhaseOrder));
    assert_eq!(
        mmu.clamp_initial_memory(PhysicalAddress::new(0x0008_0000), 0x0100_0000),
        Err(Fault::FirstBlockNotAtZero)
    );

    mmu.mapin_ram(PhysicalAddress::new(0x0100_0000)).unwrap();
    assert_eq!(
        mmu.mapin_ram(PhysicalAddress::new(0x0100_0000)),
        Err(Fault::PhaseRepeated)
    );
    mmu.mark_initmem_nx().unwrap();
    assert_eq!(mmu.mark_initmem_nx(), Err(Fault::PhaseRepeated));
}

#[test]
fn manual_window_installation_round_trips() {
    // Drive the table directly, as a miss handler's maintenance path would.
    let ram = FakeRam::new(8);
    let mut alloc = Bump::new(&ram);
    let table = BlockTable::create(&ram, &mut alloc).unwrap();

    let va = VirtualAddress::new(0xD000_0000);
    let pa = PhysicalAddress::new(0x0100_0000);
    table
        .install(
            &mut alloc,
            va,
            pa,
            Protection::KERNEL_IO,
            BlockClass::Medium,
            InstallMode::Create,
        )
        .unwrap();

    let entry = table.entry_at(va).unwrap();
    assert_eq!(entry.base(), pa);
    assert!(entry.cache_inhibited());
    assert!(table.entry_at(VirtualAddress::new(0xD008_0000)).is_none());
}
