use kernel_memory_addresses::BlockClass;

/// Boot-fatal mapping failures.
///
/// Every error in this crate indicates a broken invariant during early boot;
/// callers report the fault and halt rather than attempt recovery.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Fault {
    /// An address handed to the installer is not aligned to its block class.
    #[error("address 0x{addr:08x} is not aligned to a {class} block")]
    Misaligned {
        /// The offending address.
        addr: u32,
        /// The block class the address was meant for.
        class: BlockClass,
    },

    /// A chunk boundary is not aligned to the medium block size.
    #[error("chunk boundary 0x{addr:08x} is not aligned to 512 KiB")]
    UnalignedChunk {
        /// The offending boundary.
        addr: u32,
    },

    /// Create-mode install found a live entry at the target address.
    #[error("translation entry already present at 0x{va:08x}")]
    EntryPresent {
        /// Virtual address of the duplicate mapping.
        va: u32,
    },

    /// Update-mode install found no entry at the target address.
    #[error("no translation entry at 0x{va:08x}")]
    EntryMissing {
        /// Virtual address of the missing mapping.
        va: u32,
    },

    /// An install targeted a region already mapped with the other block
    /// class.
    #[error("block class mismatch at 0x{va:08x}")]
    ClassMismatch {
        /// Virtual address of the conflicting mapping.
        va: u32,
    },

    /// Create-mode install after the bootstrap allocator was retired.
    #[error("entry creation attempted after dynamic allocation came online")]
    BootstrapRetired,

    /// The bootstrap allocator could not satisfy a structure allocation.
    #[error("out of early boot memory")]
    OutOfEarlyMemory,

    /// The first physical memory block does not start at address zero.
    #[error("first memory block does not start at physical 0")]
    FirstBlockNotAtZero,

    /// The requested mapping top does not cover the kernel image.
    #[error("mapping top 0x{top:08x} lies below the end of init text")]
    TopBelowInitText {
        /// The requested top.
        top: u32,
    },

    /// A boot phase was entered before its predecessor completed.
    #[error("boot phases entered out of order")]
    PhaseOrder,

    /// A run-once boot phase was entered a second time.
    #[error("boot phase already completed")]
    PhaseRepeated,

    /// Rodata protection requested without the hardening option enabled.
    #[error("rodata protection requires strict kernel rwx")]
    HardeningDisabled,
}
