//! # Boot-Time Kernel Information
//!
//! Fixed memory-layout constants and the small carrier structs handed to the
//! MMU bootstrap code: the linker-provided section boundaries and the boot
//! configuration flags.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot;
pub mod memory;
