//! Mock hardware seams for unit tests: a bump allocator over an owned frame
//! pool, a mapper that treats physical addresses as offsets into that pool,
//! and a TLB that records the requests it receives.

use crate::{BootAlloc, PhysMapper, TlbCache};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress, align_up};

/// One page-aligned backing frame.
#[repr(C, align(4096))]
#[derive(Copy, Clone)]
pub struct Frame([u8; 4096]);

/// Contiguous pool of zeroed frames; physical address 0 is the pool start.
pub struct FramePool {
    frames: Vec<Frame>,
}

impl FramePool {
    pub fn new(frames: usize) -> Self {
        Self {
            frames: vec![Frame([0; 4096]); frames],
        }
    }

    pub fn len_bytes(&self) -> u32 {
        (self.frames.len() * 4096) as u32
    }
}

impl PhysMapper for FramePool {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let base = self.frames.as_ptr().cast::<u8>().cast_mut();
        unsafe { &mut *base.add(pa.as_u32() as usize).cast::<T>() }
    }
}

/// Bump allocator over the low portion of a [`FramePool`].
pub struct BumpAlloc {
    next: u32,
    end: u32,
    pub visible_limit: Option<u32>,
}

impl BumpAlloc {
    pub fn new(pool: &FramePool) -> Self {
        Self {
            next: 0,
            end: pool.len_bytes(),
            visible_limit: None,
        }
    }

    /// An allocator with no memory at all, for exhaustion tests.
    pub fn exhausted() -> Self {
        Self {
            next: 0,
            end: 0,
            visible_limit: None,
        }
    }
}

impl BootAlloc for BumpAlloc {
    fn alloc(&mut self, size: u32, align: u32) -> Option<PhysicalAddress> {
        let start = align_up(self.next, align);
        let end = start.checked_add(size)?;
        if end > self.end {
            return None;
        }
        self.next = end;
        Some(PhysicalAddress::new(start))
    }

    fn set_visible_limit(&mut self, limit: PhysicalAddress) {
        self.visible_limit = Some(limit.as_u32());
    }
}

/// TLB that records every flush and pin request.
#[derive(Default)]
pub struct RecordingTlb {
    pub flushes: Vec<(u32, u32)>,
    pub pins: Vec<(u32, u32, bool)>,
}

impl TlbCache for RecordingTlb {
    fn flush_range(&mut self, start: VirtualAddress, end: VirtualAddress) {
        self.flushes.push((start.as_u32(), end.as_u32()));
    }

    fn pin_region(&mut self, start: PhysicalAddress, end: PhysicalAddress, pin: bool) {
        self.pins.push((start.as_u32(), end.as_u32(), pin));
    }
}
