//! # Boot Configuration
//!
//! Carrier structs filled in by early startup code and handed to the MMU
//! bootstrap: where the linker placed the kernel sections, and which
//! hardening options this boot runs with.

use kernel_memory_addresses::PhysicalAddress;

/// Physical section boundaries provided by the linker script.
///
/// The kernel image is loaded at physical 0; these are the boundaries the
/// protection phases tile against. `text_end <= init_text_start <
/// init_text_end` and all three lie within the initially visible memory.
#[derive(Copy, Clone, Debug)]
pub struct SectionLayout {
    /// End of the permanently resident kernel code.
    pub text_end: PhysicalAddress,
    /// Start of the initialization-only code.
    pub init_text_start: PhysicalAddress,
    /// End of the initialization-only code.
    pub init_text_end: PhysicalAddress,
}

/// Boot-time MMU configuration flags.
///
/// These mirror the kernel build/boot options; they are fixed for the
/// lifetime of a boot.
#[derive(Copy, Clone, Debug, Default)]
pub struct MmuConfig {
    /// Separate permanently executable kernel text from initialization-only
    /// text so the latter can lose execute rights after boot, and allow
    /// rodata to become read-only.
    pub strict_kernel_rwx: bool,
    /// Debug mode that forbids large contiguous executable regions; mapping
    /// stops at the text boundary and the effective top shrinks.
    pub strict_debug_paging: bool,
    /// Keep the rodata region's TLB entries pinned after it becomes
    /// read-only (requires `strict_kernel_rwx`).
    pub pin_rodata: bool,
}
