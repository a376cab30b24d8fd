//! # Memory Layout
//!
//! The fixed addresses of the early-boot virtual memory layout. RAM is
//! block-mapped linearly at [`PAGE_OFFSET`]; the hardware register window is
//! a single medium block at a fixed address well above the linear map.

use kernel_memory_addresses::{BlockSize, Size512K, Size8M};

/// Virtual base of the linear RAM map.
///
/// Physical address `pa` of block-mapped RAM is reachable at
/// `PAGE_OFFSET + pa`.
pub const PAGE_OFFSET: u32 = 0xC000_0000;

/// Physical base of the memory-mapped hardware register block.
pub const IO_WINDOW_PHYS: u32 = 0xFF00_0000;

/// Virtual base of the hardware register window.
///
/// Chosen outside the linear map so the window can never shadow block-mapped
/// RAM.
pub const IO_WINDOW_VIRT: u32 = 0xFFE8_0000;

/// Size of the hardware register window: exactly one medium block.
pub const IO_WINDOW_SIZE: u32 = Size512K::SIZE;

/// Physical memory visible to the bootstrap allocator before the MMU
/// bootstrap raises the limit.
///
/// Until `mapin_ram` has run, only the low 32 MiB are addressable; handing
/// the allocator more than that would let it place data the kernel cannot
/// reach.
pub const INITIAL_VISIBLE_LIMIT: u32 = 0x0200_0000;

/// Span of virtual space covered by one first-level directory slot.
pub const DIRECTORY_SLOT_SPAN: u32 = 0x0040_0000;

/// Number of first-level directory slots (covers the full 4 GiB space).
pub const DIRECTORY_SLOTS: usize = 1024;

const _: () = {
    // The register window must not intersect the linear map, which tops out
    // at PAGE_OFFSET + the largest block-mappable RAM span.
    assert!(IO_WINDOW_VIRT > PAGE_OFFSET);
    assert!(IO_WINDOW_VIRT % Size512K::SIZE == 0);
    assert!(IO_WINDOW_PHYS % Size512K::SIZE == 0);
    assert!(PAGE_OFFSET % Size8M::SIZE == 0);
    assert!(INITIAL_VISIBLE_LIMIT % Size8M::SIZE == 0);
    assert!(DIRECTORY_SLOT_SPAN as u64 * DIRECTORY_SLOTS as u64 == 1 << 32);
    // One large block spans exactly two directory slots.
    assert!(Size8M::SIZE == 2 * DIRECTORY_SLOT_SPAN);
    assert!(DIRECTORY_SLOT_SPAN / Size512K::SIZE == 8);
};
