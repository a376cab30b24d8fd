//! # Range Tiler
//!
//! Covers a physical range with the fewest block entries: medium blocks
//! bridge from the start up to the first large-block boundary, large blocks
//! cover the aligned middle, and medium blocks again cover the tail.
//!
//! [`BlockPlan`] is the pure tiling iterator; [`map_chunk`] drives it
//! through the installer and issues the TLB flush an update requires.

use crate::table::{BlockTable, InstallMode};
use crate::{BootAlloc, Fault, PhysMapper, Protection, TlbCache, linear_va};
use kernel_memory_addresses::{BlockClass, BlockSize, PhysicalAddress, Size512K, Size8M};

/// Greedy tiling of `[start, end)` into `(base, class)` blocks.
///
/// Yields blocks in ascending address order; consecutive blocks are
/// adjacent, and every large block is aligned to its own size. An empty or
/// inverted range yields nothing.
pub struct BlockPlan {
    cursor: u32,
    end: u32,
}

impl BlockPlan {
    /// Plans the tiling of `[start, end)`.
    ///
    /// Both boundaries must be aligned to the medium block size.
    pub fn new(start: PhysicalAddress, end: PhysicalAddress) -> Result<Self, Fault> {
        for addr in [start, end] {
            if !addr.is_aligned::<Size512K>() {
                return Err(Fault::UnalignedChunk { addr: addr.as_u32() });
            }
        }
        Ok(Self {
            cursor: start.as_u32(),
            end: end.as_u32(),
        })
    }
}

impl Iterator for BlockPlan {
    type Item = (PhysicalAddress, BlockClass);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.end {
            return None;
        }
        // A large block fits when the cursor sits on a large boundary and
        // the remaining span covers one.
        let class = if self.cursor % Size8M::SIZE == 0 && self.end - self.cursor >= Size8M::SIZE {
            BlockClass::Large
        } else {
            BlockClass::Medium
        };
        let base = self.cursor;
        self.cursor += class.size();
        Some((PhysicalAddress::new(base), class))
    }
}

/// Maps (or re-protects) the linear-map chunk covering physical
/// `[start, end)`.
///
/// Every block of the plan is installed at `PAGE_OFFSET + base` with the
/// given protection. In update mode the affected virtual range is flushed
/// once afterwards so stale translations cannot outlive the change; create
/// mode maps previously unmapped space and needs no flush.
pub fn map_chunk<A, M, T>(
    table: &BlockTable<'_, M>,
    alloc: &mut A,
    tlb: &mut T,
    start: PhysicalAddress,
    end: PhysicalAddress,
    prot: Protection,
    mode: InstallMode,
) -> Result<(), Fault>
where
    A: BootAlloc,
    M: PhysMapper,
    T: TlbCache,
{
    let mut installed = 0_u32;
    for (base, class) in BlockPlan::new(start, end)? {
        table.install(alloc, linear_va(base), base, prot, class, mode)?;
        installed += 1;
    }
    if mode == InstallMode::Update && installed > 0 {
        tlb.flush_range(linear_va(start), linear_va(end));
    }
    log::trace!(
        "chunk [0x{:08x}, 0x{:08x}): {installed} blocks, {prot:?}, {mode:?}",
        start.as_u32(),
        end.as_u32(),
    );
    Ok(())
}
