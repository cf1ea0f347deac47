//! Reset path for bare-metal RISC-V images.
//!
//! `_reset` (in `.init`) loads `gp` and `sp` from the linker script and calls
//! `_start`, which prepares RAM and enters the image's `extern "C" fn main()`
//! exactly once. The pure pieces (layout checks, RAM copy loops, boot stage
//! tracking, the boot log, ELF inspection) are plain functions so tests run
//! in a std environment while the firmware stays no_std.

#![cfg_attr(not(test), no_std)]

#[cfg(not(target_os = "none"))]
extern crate alloc;

pub mod boot;
pub mod layout;
pub mod logging;
pub mod ram;

#[cfg(feature = "heap")]
pub mod heap;

#[cfg(not(target_os = "none"))]
pub mod image;

#[cfg(all(any(target_arch = "riscv32", target_arch = "riscv64"), target_os = "none"))]
mod reset;
#[cfg(all(any(target_arch = "riscv32", target_arch = "riscv64"), target_os = "none"))]
pub mod start;

pub use bootabi::LogLevel;
pub use layout::{LayoutError, MemoryLayout};
